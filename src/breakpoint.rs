//! C1: software breakpoints via INT3 injection (spec §2, §4.1).
//!
//! Grounded on the `Breakpoint` struct in tarpaulin's breakpoint handling
//! and on `cs110l`'s `Inferior::write_byte` / `set_breakpoint`: a
//! breakpoint is just "the original byte at `addr`, with `0xCC` poked
//! over it", and removing it means writing the original byte back.

use nix::sys::ptrace;
use nix::unistd::Pid;

/// The x86-64 `INT3` opcode used to trap into the tracer.
const INT3: u8 = 0xcc;

/// Reads and writes a tracee's address space one machine word at a time.
/// Abstracted out of [`Breakpoint`] so the byte-patching logic can be unit
/// tested without a real tracee (spec §8: "breakpoint byte round-trip via
/// a fake memory backend").
pub trait TraceeMemory {
    fn peek_word(&self, addr: u64) -> nix::Result<i64>;
    fn poke_word(&self, addr: u64, word: i64) -> nix::Result<()>;
}

/// A live ptrace-attached tracee, addressed by pid.
pub struct PtraceMemory(pub Pid);

impl TraceeMemory for PtraceMemory {
    fn peek_word(&self, addr: u64) -> nix::Result<i64> {
        ptrace::read(self.0, addr as ptrace::AddressType).map(|w| w as i64)
    }

    fn poke_word(&self, addr: u64, word: i64) -> nix::Result<()> {
        unsafe { ptrace::write(self.0, addr as ptrace::AddressType, word as usize as *mut libc::c_void) }
    }
}

/// A software breakpoint installed at a single address. Holds the
/// original byte so it can be removed (or stepped over) later.
pub struct Breakpoint {
    addr: u64,
    original_byte: u8,
    installed: bool,
}

impl Breakpoint {
    /// Reads the word at `addr`, remembers its low byte, and pokes `INT3`
    /// over it.
    pub fn install(mem: &dyn TraceeMemory, addr: u64) -> nix::Result<Self> {
        let word = mem.peek_word(addr)?;
        let original_byte = (word & 0xff) as u8;
        let patched = (word & !0xff) | INT3 as i64;
        mem.poke_word(addr, patched)?;
        Ok(Breakpoint {
            addr,
            original_byte,
            installed: true,
        })
    }

    pub fn addr(&self) -> u64 {
        self.addr
    }

    pub fn is_installed(&self) -> bool {
        self.installed
    }

    /// Writes the original byte back, leaving the rest of the word
    /// untouched.
    pub fn remove(&mut self, mem: &dyn TraceeMemory) -> nix::Result<()> {
        if !self.installed {
            return Ok(());
        }
        let word = mem.peek_word(self.addr)?;
        let restored = (word & !0xff) | self.original_byte as i64;
        mem.poke_word(self.addr, restored)?;
        self.installed = false;
        Ok(())
    }

}

/// Rewinds a trapped tracee's instruction pointer back onto the
/// breakpoint address it just executed `INT3` at. ptrace reports `rip`
/// one byte past the trap (spec §4.1 "rewind RIP by one").
pub fn rewind_after_trap(pid: Pid) -> nix::Result<()> {
    let mut regs = ptrace::getregs(pid)?;
    regs.rip -= 1;
    ptrace::setregs(pid, regs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::HashMap;

    /// An in-memory stand-in for a tracee's address space, keyed by
    /// 8-byte-aligned word address.
    struct FakeMemory {
        words: RefCell<HashMap<u64, i64>>,
    }

    impl FakeMemory {
        fn new(addr: u64, word: i64) -> Self {
            let mut words = HashMap::new();
            words.insert(addr, word);
            FakeMemory {
                words: RefCell::new(words),
            }
        }
    }

    impl TraceeMemory for FakeMemory {
        fn peek_word(&self, addr: u64) -> nix::Result<i64> {
            Ok(*self.words.borrow().get(&addr).expect("unmapped address"))
        }

        fn poke_word(&self, addr: u64, word: i64) -> nix::Result<()> {
            self.words.borrow_mut().insert(addr, word);
            Ok(())
        }
    }

    #[test]
    fn install_preserves_original_byte_for_removal() {
        let mem = FakeMemory::new(0x1000, 0x1122_3344_5566_7788u64 as i64);
        let mut bp = Breakpoint::install(&mem, 0x1000).unwrap();
        assert!(bp.is_installed());
        assert_eq!(mem.peek_word(0x1000).unwrap() & 0xff, INT3 as i64);

        bp.remove(&mem).unwrap();
        assert!(!bp.is_installed());
        assert_eq!(mem.peek_word(0x1000).unwrap(), 0x1122_3344_5566_7788u64 as i64);
    }

    #[test]
    fn remove_is_idempotent() {
        let mem = FakeMemory::new(0x3000, 0x00);
        let mut bp = Breakpoint::install(&mem, 0x3000).unwrap();
        bp.remove(&mem).unwrap();
        bp.remove(&mem).unwrap();
        assert_eq!(mem.peek_word(0x3000).unwrap(), 0x00);
    }
}
