//! Shared harness for the integration tests: launches the fixture binary
//! under ptrace with ASLR disabled and its stdout piped back to the test,
//! so marker-function addresses can be read out before any breakpoint is
//! installed. Kept out of `src/launch.rs` because ASLR-disabling and
//! stdout redirection are test-only concerns, not part of the engine's
//! own contract.

use std::ffi::CString;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::os::unix::io::FromRawFd;

use nix::sys::ptrace;
use nix::sys::signal::Signal;
use nix::sys::wait::{waitpid, WaitStatus};
use nix::unistd::{close, dup2, execv, fork, pipe, ForkResult, Pid};

/// A fixture process, already traced and stopped right after it printed
/// its marker addresses (via a self-raised `SIGSTOP`).
pub struct TracedFixture {
    pub pid: Pid,
    pub addr_start: u64,
    pub addr_end: u64,
}

/// Forks and execs `tests/fixtures/loop_target.rs` (built as the
/// `loop_target_fixture` bin target), with `iterations` passed as its
/// sole argument. Blocks until the fixture has printed its marker
/// addresses and stopped itself.
pub fn spawn_fixture(iterations: u32) -> TracedFixture {
    let exe = env!("CARGO_BIN_EXE_loop_target_fixture");
    let (read_fd, write_fd) = pipe().expect("pipe");

    match unsafe { fork() }.expect("fork") {
        ForkResult::Child => {
            close(read_fd).ok();
            dup2(write_fd, 1).expect("dup2 stdout");
            close(write_fd).ok();

            unsafe {
                libc::personality(libc::ADDR_NO_RANDOMIZE as u64);
            }
            ptrace::traceme().expect("traceme");

            let path = CString::new(exe).unwrap();
            let arg0 = path.clone();
            let arg1 = CString::new(iterations.to_string()).unwrap();
            let _ = execv(&path, &[arg0, arg1]);
            std::process::exit(127);
        }
        ForkResult::Parent { child } => {
            close(write_fd).ok();

            match waitpid(child, None).expect("wait for initial stop") {
                WaitStatus::Stopped(_, Signal::SIGTRAP) => {}
                other => panic!("unexpected initial stop: {other:?}"),
            }

            ptrace::cont(child, None).expect("cont to marker print");

            match waitpid(child, None).expect("wait for self-raised stop") {
                WaitStatus::Stopped(_, Signal::SIGSTOP) => {}
                other => panic!("unexpected stop waiting for markers: {other:?}"),
            }

            let mut reader = BufReader::new(unsafe { File::from_raw_fd(read_fd) });
            let mut line = String::new();
            reader.read_line(&mut line).expect("read marker line");
            let mut parts = line.trim().split_whitespace();
            let addr_start = u64::from_str_radix(parts.next().unwrap(), 16).unwrap();
            let addr_end = u64::from_str_radix(parts.next().unwrap(), 16).unwrap();

            TracedFixture {
                pid: child,
                addr_start,
                addr_end,
            }
        }
    }
}
