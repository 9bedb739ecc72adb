//! Linux `perf_event_open(2)` backend for [`super::EventsProvider`].
//!
//! Grounded on `gz-rust-perfcnt`'s `linux::mod` (the raw syscall wrapper
//! and `perf_event_attr` construction) and `anp-perf_events`'s `fd.rs`
//! (the `PerfFile`-style fd ownership and errno-to-error mapping).

use std::io;
use std::os::unix::io::RawFd;

use libc::{c_int, c_ulong};
use nix::unistd::Pid;

use crate::error::{EngineError, EngineResult};
use crate::sample::CounterVector;

use super::{EventsProvider, EVENT_COUNT};

// perf_event.h constants not exposed by `libc`.
const PERF_TYPE_HARDWARE: u32 = 0;
const PERF_FORMAT_GROUP: u64 = 1 << 3;
const PERF_EVENT_IOC_RESET: c_ulong = 0x2403;
const PERF_EVENT_IOC_ENABLE: c_ulong = 0x2400;
const PERF_EVENT_IOC_DISABLE: c_ulong = 0x2401;
const PERF_IOC_FLAG_GROUP: c_int = 1;

const PERF_COUNT_HW_CPU_CYCLES: u64 = 0;
const PERF_COUNT_HW_INSTRUCTIONS: u64 = 1;
const PERF_COUNT_HW_CACHE_REFERENCES: u64 = 2;
const PERF_COUNT_HW_CACHE_MISSES: u64 = 3;
const PERF_COUNT_HW_BRANCH_MISSES: u64 = 5;

/// The region's fixed event list and the order their deltas appear in a
/// report row.
const EVENTS: [u64; EVENT_COUNT] = [
    PERF_COUNT_HW_CPU_CYCLES,
    PERF_COUNT_HW_INSTRUCTIONS,
    PERF_COUNT_HW_CACHE_REFERENCES,
    PERF_COUNT_HW_CACHE_MISSES,
    PERF_COUNT_HW_BRANCH_MISSES,
];

#[repr(C)]
#[derive(Default)]
struct PerfEventAttr {
    type_: u32,
    size: u32,
    config: u64,
    sample_period_or_freq: u64,
    sample_type: u64,
    read_format: u64,
    flags: u64,
    wakeup_events_or_watermark: u32,
    bp_type: u32,
    bp_addr_or_config1: u64,
    bp_len_or_config2: u64,
    branch_sample_type: u64,
    sample_regs_user: u64,
    sample_stack_user: u32,
    clockid: i32,
    sample_regs_intr: u64,
    aux_watermark: u32,
    sample_max_stack: u16,
    __reserved_2: u16,
}

const DISABLED: u64 = 1 << 0;
const EXCLUDE_KERNEL: u64 = 1 << 5;
const EXCLUDE_HV: u64 = 1 << 6;

unsafe fn perf_event_open(
    attr: *const PerfEventAttr,
    pid: c_int,
    cpu: c_int,
    group_fd: c_int,
    flags: c_ulong,
) -> io::Result<RawFd> {
    let ret = libc::syscall(libc::SYS_perf_event_open, attr, pid, cpu, group_fd, flags);
    if ret < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(ret as RawFd)
    }
}

unsafe fn ioctl_group(fd: RawFd, request: c_ulong) -> io::Result<()> {
    if libc::ioctl(fd, request, PERF_IOC_FLAG_GROUP) < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(())
    }
}

/// An open counter group: one leader fd plus its sibling member fds, all
/// read together via `PERF_FORMAT_GROUP`.
pub struct LinuxPerfEvents {
    leader: Option<RawFd>,
    members: Vec<RawFd>,
}

impl LinuxPerfEvents {
    pub fn new() -> Self {
        LinuxPerfEvents {
            leader: None,
            members: Vec::new(),
        }
    }

    fn leader_fd(&self) -> EngineResult<RawFd> {
        self.leader
            .ok_or_else(|| EngineError::StartupFailure("counters not configured".into()))
    }

    /// Reads the group in one `read(2)`: `nr` followed by `nr` raw
    /// counter values (spec §4.2: no normalization, no scaling — the
    /// kernel's own monotonic running totals).
    fn read_group(&self) -> EngineResult<CounterVector> {
        let fd = self.leader_fd()?;
        let mut buf = [0u64; 1 + EVENT_COUNT];
        let bytes_wanted = std::mem::size_of_val(&buf);
        let n = unsafe {
            libc::read(
                fd,
                buf.as_mut_ptr() as *mut libc::c_void,
                bytes_wanted,
            )
        };
        if n < 0 {
            return Err(EngineError::PmuUnavailable(io::Error::last_os_error()));
        }
        let nr = buf[0] as usize;
        Ok(buf[1..1 + nr].to_vec())
    }
}

impl Default for LinuxPerfEvents {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for LinuxPerfEvents {
    fn drop(&mut self) {
        if let Some(fd) = self.leader.take() {
            unsafe { libc::close(fd) };
        }
        for fd in self.members.drain(..) {
            unsafe { libc::close(fd) };
        }
    }
}

impl EventsProvider for LinuxPerfEvents {
    fn configure(&mut self, pid: Pid) -> EngineResult<()> {
        let mut leader_fd: Option<RawFd> = None;
        let mut members = Vec::with_capacity(EVENT_COUNT - 1);

        for &config in EVENTS.iter() {
            let mut attr = PerfEventAttr::default();
            attr.type_ = PERF_TYPE_HARDWARE;
            attr.size = std::mem::size_of::<PerfEventAttr>() as u32;
            attr.config = config;
            attr.read_format = PERF_FORMAT_GROUP;
            attr.flags = DISABLED | EXCLUDE_KERNEL | EXCLUDE_HV;

            let group_fd = leader_fd.unwrap_or(-1);
            let fd = unsafe { perf_event_open(&attr, pid.as_raw(), -1, group_fd, 0) }
                .map_err(EngineError::PmuUnavailable)?;

            match leader_fd {
                None => leader_fd = Some(fd),
                Some(_) => members.push(fd),
            }
        }

        self.leader = leader_fd;
        self.members = members;
        Ok(())
    }

    fn begin(&mut self) -> EngineResult<CounterVector> {
        let fd = self.leader_fd()?;
        unsafe {
            ioctl_group(fd, PERF_EVENT_IOC_RESET).map_err(EngineError::PmuUnavailable)?;
            ioctl_group(fd, PERF_EVENT_IOC_ENABLE).map_err(EngineError::PmuUnavailable)?;
        }
        self.read_group()
    }

    fn end(&mut self) -> EngineResult<CounterVector> {
        let values = self.read_group()?;
        let fd = self.leader_fd()?;
        unsafe {
            ioctl_group(fd, PERF_EVENT_IOC_DISABLE).map_err(EngineError::PmuUnavailable)?;
        }
        Ok(values)
    }
}
