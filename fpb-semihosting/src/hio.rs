//! Host I/O over the ARM semihosting protocol.
//!
//! This is a convenience transport for development logs only — it is not
//! part of the framed command/response protocol the host tool speaks to
//! the device over serial. It exists so firmware built against this crate
//! can report boot messages, panics, and debug traces to a debugger host
//! without consuming the serial link the Command Processor owns.

/// A semihosting file handle, as returned by `SYS_OPEN`.
#[derive(Clone, Copy)]
pub struct HostStream {
    fd: usize,
}

/// An error raised by a semihosting operation.
#[derive(Clone, Copy, Debug)]
pub struct HostError;

impl From<HostError> for () {
    fn from(_: HostError) -> Self {}
}

impl core::fmt::Write for HostStream {
    fn write_str(&mut self, s: &str) -> core::fmt::Result {
        self.write_all(s.as_bytes()).map_err(|_| core::fmt::Error)
    }
}

impl HostStream {
    fn write_all(&mut self, mut bytes: &[u8]) -> Result<(), HostError> {
        while !bytes.is_empty() {
            match write(self.fd, bytes) {
                Ok(()) => return Ok(()),
                Err(n) if n == bytes.len() => return Err(HostError),
                Err(n) => bytes = &bytes[bytes.len() - n..],
            }
        }
        Ok(())
    }
}

/// Opens a semihosting host stream for the console's standard output.
pub fn hstdout() -> Result<HostStream, HostError> {
    open(":tt\0", 4).map(|fd| HostStream { fd })
}

/// Opens a semihosting host stream for the console's standard error.
pub fn hstderr() -> Result<HostStream, HostError> {
    open(":tt\0", 8).map(|fd| HostStream { fd })
}

// Semihosting operation numbers (ARM semihosting specification, §5).
const SYS_OPEN: usize = 0x01;
const SYS_WRITE: usize = 0x05;

fn open(name: &str, mode: usize) -> Result<usize, HostError> {
    let name = name.as_bytes();
    let block = [name.as_ptr() as usize, mode, name.len() - 1];
    let fd = unsafe { syscall(SYS_OPEN, &block) };
    if fd as isize == -1 {
        Err(HostError)
    } else {
        Ok(fd)
    }
}

/// Writes `bytes` to file handle `fd`. On partial write, returns `Err` with
/// the number of bytes *not* written, matching the semihosting `SYS_WRITE`
/// return convention.
fn write(fd: usize, bytes: &[u8]) -> Result<(), usize> {
    let block = [fd, bytes.as_ptr() as usize, bytes.len()];
    let ret = unsafe { syscall(SYS_WRITE, &block) };
    if ret == 0 {
        Ok(())
    } else {
        Err(ret)
    }
}

#[cfg(all(target_arch = "arm", not(feature = "no-semihosting")))]
unsafe fn syscall(op: usize, block: &[usize]) -> usize {
    let r;
    core::arch::asm!(
        "bkpt #0xAB",
        in("r0") op,
        in("r1") block.as_ptr(),
        lateout("r0") r,
        options(nostack),
    );
    r
}

#[cfg(any(not(target_arch = "arm"), feature = "no-semihosting"))]
unsafe fn syscall(_op: usize, _block: &[usize]) -> usize {
    // Host-side test builds and the `no-semihosting` feature both stub out
    // the trap: there is no debugger on the other end to service it.
    usize::MAX
}
