//! `SYS_EXIT` semihosting call, used by the `exit` feature of `fpb-panic`
//! to make a QEMU-hosted test process exit with a status code instead of
//! looping forever after a panic.

/// Status code reported to the semihosting host on a successful run.
pub const EXIT_SUCCESS: i32 = 0x20026;
/// Status code reported to the semihosting host on a failing run.
pub const EXIT_FAILURE: i32 = 1;

const SYS_EXIT: usize = 0x18;

/// Reports `status` to the semihosting host and halts.
///
/// On real hardware this call simply traps into the attached debugger;
/// it does not return. Discouraged outside test/emulation builds: it can
/// leave a hardware debugger in an inconsistent state (see `fpb-panic`).
pub fn exit(status: i32) -> ! {
    unsafe {
        syscall(SYS_EXIT, status as usize);
    }
    loop {
        crate::export::hstderr_str("semihosting exit did not halt execution\n");
    }
}

#[cfg(all(target_arch = "arm", not(feature = "no-semihosting")))]
unsafe fn syscall(op: usize, arg: usize) {
    core::arch::asm!(
        "bkpt #0xAB",
        in("r0") op,
        in("r1") arg,
        lateout("r0") _,
        options(nostack),
    );
}

#[cfg(any(not(target_arch = "arm"), feature = "no-semihosting"))]
unsafe fn syscall(_op: usize, _arg: usize) {}
