//! Command Processor: tokenized dispatch, response framing, and the
//! handlers that tie the slot table, allocator, FPB driver, trampoline
//! bank, DebugMonitor redirect table and VFS together.
//!
//! Every terminal response starts with `[FLOK] ` or `[FLERR] ` and ends
//! with `[FLEND]\n`; streaming lines (per-slot, directory entries) carry no
//! prefix. All output goes through a caller-supplied [`Sink`] — nothing
//! here picks a transport.

use core::fmt::Write as _;

use fpb_core::peripheral::dcb;
use fpb_core::peripheral::fpb::{Fpb, RegisterBlock};
use fpb_proto::codec::{self, CodecError};
use fpb_proto::crc16_ccitt;
use fpb_proto::markers::{END_MARKER, ERR_PREFIX, OK_PREFIX, VERSION_PREFIX};

use crate::alloc::BlockAllocator;
use crate::debugmon::RedirectTable;
use crate::error::LoaderError;
use crate::sink::{Sink, SinkWriter};
use crate::slot::{Backend, SlotTable};
use crate::trampoline::TrampolineBank;
use crate::vfs::{OpenFlags, Vfs, VfsError, Whence};

/// Upper bound on a single `upload`/`fwrite` payload this processor will
/// decode in one command. Chosen to comfortably hold one host-side upload
/// chunk (§4.8 splits uploads into chunks well under this) without
/// requiring an allocator for decode scratch space.
const MAX_PAYLOAD: usize = 1024;
/// Base64 encoding of [`MAX_PAYLOAD`] bytes, for `fread`'s reply.
const MAX_PAYLOAD_B64: usize = ((MAX_PAYLOAD + 2) / 3) * 4;
/// Concurrently open file handles the VFS command surface tracks.
const MAX_OPEN_FILES: usize = 4;

struct Pending {
    addr: u32,
    size: u32,
}

/// Device-side command processor.
///
/// `N` is the slot/comparator capacity (see [`SlotTable`]); `V` selects the
/// VFS back-end wired in for the `f*` commands.
pub struct Processor<'a, const N: usize, V: Vfs> {
    pool: &'a mut [u8],
    pool_base: u32,
    alloc: BlockAllocator,
    slots: SlotTable<N>,
    fpb: Fpb,
    regs: &'a RegisterBlock,
    dcb: &'a dcb::RegisterBlock,
    trampolines: TrampolineBank<N>,
    redirects: RedirectTable<N>,
    debugmon_ready: bool,
    vfs: V,
    open_files: [Option<crate::vfs::Handle>; MAX_OPEN_FILES],
    pending: Option<Pending>,
    version: &'static str,
    build_info: &'static str,
}

impl<'a, const N: usize, V: Vfs> Processor<'a, N, V> {
    /// Builds a processor over a fresh block pool starting at `pool_base`,
    /// a trampoline bank addressing stubs at `stub_base`/`stub_stride`, and
    /// the given VFS back-end. `version`/`build_info` are device-binary
    /// constants surfaced by `info`.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        pool: &'a mut [u8],
        pool_base: u32,
        block_size: usize,
        regs: &'a RegisterBlock,
        dcb: &'a dcb::RegisterBlock,
        stub_base: u32,
        stub_stride: u32,
        vfs: V,
        version: &'static str,
        build_info: &'static str,
    ) -> Self {
        let mut alloc = BlockAllocator::new();
        alloc.init(pool, block_size);
        Processor {
            pool,
            pool_base,
            alloc,
            slots: SlotTable::new(),
            fpb: Fpb::new(),
            regs,
            dcb,
            trampolines: TrampolineBank::new(stub_base, stub_stride),
            redirects: RedirectTable::new(),
            debugmon_ready: false,
            vfs,
            open_files: [None; MAX_OPEN_FILES],
            pending: None,
            version,
            build_info,
        }
    }

    fn offset_of(&self, addr: u32) -> Option<usize> {
        addr.checked_sub(self.pool_base).map(|d| d as usize)
    }

    /// Dispatches one already-tokenized command line. `argv[0]` onward are
    /// `--flag value` pairs; the command name itself is read from the
    /// mandatory `--cmd` flag, matching the `fl --cmd NAME ...` CLI shape.
    pub fn dispatch<S: Sink>(&mut self, argv: &[&str], sink: &mut S) {
        let Some(cmd) = flag(argv, "--cmd") else {
            emit_err(sink, format_args!("{}", LoaderError::MissingArgument("--cmd")));
            return;
        };

        match cmd {
            "ping" => emit_ok(sink, format_args!("PONG")),
            "info" => self.cmd_info(sink),
            "echo" => self.cmd_echo(argv, sink),
            "alloc" => self.cmd_alloc(argv, sink),
            "upload" => self.cmd_upload(argv, sink),
            "patch" => self.cmd_patch(argv, sink),
            "tpatch" => self.cmd_tpatch(argv, sink),
            "dpatch" => self.cmd_dpatch(argv, sink),
            "unpatch" => self.cmd_unpatch(argv, sink),
            "fopen" => self.cmd_fopen(argv, sink),
            "fclose" => self.cmd_fclose(argv, sink),
            "fread" => self.cmd_fread(argv, sink),
            "fwrite" => self.cmd_fwrite(argv, sink),
            "fseek" => self.cmd_fseek(argv, sink),
            "fstat" => self.cmd_fstat(argv, sink),
            "flist" => self.cmd_flist(argv, sink),
            "fremove" => self.cmd_fremove(argv, sink),
            "fmkdir" => self.cmd_fmkdir(argv, sink),
            _ => emit_err(sink, format_args!("{}", LoaderError::UnknownCommand)),
        }
    }

    fn cmd_info<S: Sink>(&mut self, sink: &mut S) {
        stream_line(sink, format_args!("{VERSION_PREFIX}{}", self.version));
        stream_line(sink, format_args!("Build: {}", self.build_info));
        let used: u32 = self.slots.iter().filter(|(_, s)| s.active).map(|(_, s)| s.code_size).sum();
        stream_line(sink, format_args!("Used: {used} bytes"));
        stream_line(sink, format_args!("Slots: {}/{}", self.slots.active_count(), self.slots.capacity()));
        let transfer = if self.vfs.available() { "available" } else { "unavailable" };
        stream_line(sink, format_args!("File transfer: {transfer}"));
        for (k, slot) in self.slots.iter() {
            if slot.active {
                stream_line(
                    sink,
                    format_args!("Slot {k}: {:#010x} -> {:#010x}, {} bytes", slot.original_addr, slot.target_addr, slot.code_size),
                );
            }
        }
        emit_ok(sink, format_args!("Info complete"));
    }

    fn cmd_echo<S: Sink>(&mut self, argv: &[&str], sink: &mut S) {
        let Some(data) = flag(argv, "--data") else {
            emit_err(sink, format_args!("{}", LoaderError::MissingArgument("--data")));
            return;
        };
        match codec::hex_decoded_len(data) {
            Ok(n) => {
                let crc = crc16_ccitt(data.as_bytes());
                emit_ok(sink, format_args!("ECHO {n} Bytes, CRC {crc:#06x}"));
            }
            Err(_) => emit_err(sink, format_args!("{}", LoaderError::InvalidArgument("--data"))),
        }
    }

    fn cmd_alloc<S: Sink>(&mut self, argv: &[&str], sink: &mut S) {
        let Some(size) = flag(argv, "--size").and_then(|s| s.parse::<usize>().ok()) else {
            emit_err(sink, format_args!("{}", LoaderError::MissingArgument("--size")));
            return;
        };

        if let Some(pending) = self.pending.take() {
            if let Some(off) = self.offset_of(pending.addr) {
                self.alloc.free(self.pool, off);
            }
        }

        match self.alloc.alloc(self.pool, size) {
            Some(off) => {
                let addr = self.pool_base + off as u32;
                self.pending = Some(Pending { addr, size: size as u32 });
                emit_ok(sink, format_args!("Allocated {size} at {addr:#010x}"));
            }
            None => emit_err(sink, format_args!("{}", LoaderError::AllocFailed)),
        }
    }

    fn decode_payload<'b>(&self, data: &str, scratch: &'b mut [u8; MAX_PAYLOAD]) -> Result<&'b [u8], LoaderError> {
        let decode_result = if codec::looks_like_base64(data) {
            codec::base64_decode(data, scratch)
        } else {
            codec::hex_decode(data, scratch)
        };
        match decode_result {
            Ok(n) => Ok(&scratch[..n]),
            Err(CodecError::BufferTooSmall) => Err(LoaderError::InvalidArgument("--data (too large)")),
            Err(_) => Err(LoaderError::InvalidArgument("--data")),
        }
    }

    fn cmd_upload<S: Sink>(&mut self, argv: &[&str], sink: &mut S) {
        let Some(data) = flag(argv, "--data") else {
            emit_err(sink, format_args!("{}", LoaderError::MissingArgument("--data")));
            return;
        };
        let Some(offset) = flag(argv, "--addr").and_then(parse_u32) else {
            emit_err(sink, format_args!("{}", LoaderError::MissingArgument("--addr")));
            return;
        };
        let Some(pending) = &self.pending else {
            emit_err(sink, format_args!("{}", LoaderError::AllocFailed));
            return;
        };

        let mut scratch = [0u8; MAX_PAYLOAD];
        let bytes = match self.decode_payload(data, &mut scratch) {
            Ok(b) => b,
            Err(e) => {
                emit_err(sink, format_args!("{e}"));
                return;
            }
        };

        if let Some(given) = flag(argv, "--crc").and_then(parse_u16) {
            let computed = crc16_ccitt(bytes);
            if given != computed {
                if let Some(pending) = self.pending.take() {
                    if let Some(off) = self.offset_of(pending.addr) {
                        self.alloc.free(self.pool, off);
                    }
                }
                emit_err(sink, format_args!("{}", LoaderError::CrcMismatch { given, computed }));
                return;
            }
        }

        let pending_addr = pending.addr;
        let Some(base_off) = self.offset_of(pending_addr) else {
            emit_err(sink, format_args!("{}", LoaderError::InvalidArgument("--addr")));
            return;
        };
        let dest_off = base_off + offset as usize;
        if dest_off + bytes.len() > self.pool.len() {
            emit_err(sink, format_args!("{}", LoaderError::InvalidArgument("--addr")));
            return;
        }
        self.pool[dest_off..dest_off + bytes.len()].copy_from_slice(bytes);

        let dest_addr = self.pool_base + dest_off as u32;
        emit_ok(sink, format_args!("Uploaded {} bytes to {:#010x}", bytes.len(), dest_addr));
    }

    fn patch_args(argv: &[&str]) -> Result<(usize, u32, u32), LoaderError> {
        let k = flag(argv, "--comp").and_then(|s| s.parse::<usize>().ok()).ok_or(LoaderError::MissingArgument("--comp"))?;
        let orig = flag(argv, "--orig").and_then(parse_u32).ok_or(LoaderError::MissingArgument("--orig"))?;
        let target = flag(argv, "--target").and_then(parse_u32).ok_or(LoaderError::MissingArgument("--target"))?;
        Ok((k, orig, target))
    }

    fn take_pending(&mut self) -> Result<Pending, LoaderError> {
        self.pending.take().ok_or(LoaderError::AllocFailed)
    }

    fn cmd_patch<S: Sink>(&mut self, argv: &[&str], sink: &mut S) {
        let (k, orig, target) = match Self::patch_args(argv) {
            Ok(v) => v,
            Err(e) => return emit_err(sink, format_args!("{e}")),
        };
        let pending = match self.take_pending() {
            Ok(p) => p,
            Err(e) => return emit_err(sink, format_args!("{e}")),
        };
        if self.fpb.init(self.regs).is_err() {
            self.pending = Some(pending);
            return emit_err(sink, format_args!("{}", LoaderError::HardwareUnavailable));
        }
        if self.fpb.program_remap(self.regs, k, orig, target).is_err() {
            self.pending = Some(pending);
            return emit_err(sink, format_args!("{}", LoaderError::InvalidComparator));
        }
        self.slots.assign(k, orig & !1, target | 1, pending.size, pending.addr, Backend::Direct);
        emit_ok(sink, format_args!("Patch {k}: {:#010x} -> {:#010x}", orig & !1, target | 1));
    }

    fn cmd_tpatch<S: Sink>(&mut self, argv: &[&str], sink: &mut S) {
        let (k, orig, target) = match Self::patch_args(argv) {
            Ok(v) => v,
            Err(e) => return emit_err(sink, format_args!("{e}")),
        };
        let pending = match self.take_pending() {
            Ok(p) => p,
            Err(e) => return emit_err(sink, format_args!("{e}")),
        };
        if self.fpb.init(self.regs).is_err() {
            self.pending = Some(pending);
            return emit_err(sink, format_args!("{}", LoaderError::HardwareUnavailable));
        }
        if self.trampolines.program(&mut self.fpb, self.regs, k, orig, target).is_err() {
            self.pending = Some(pending);
            return emit_err(sink, format_args!("{}", LoaderError::InvalidComparator));
        }
        self.slots.assign(k, orig & !1, target | 1, pending.size, pending.addr, Backend::Trampoline);
        emit_ok(sink, format_args!("Patch {k}: {:#010x} -> {:#010x}", orig & !1, target | 1));
    }

    fn cmd_dpatch<S: Sink>(&mut self, argv: &[&str], sink: &mut S) {
        let (k, orig, target) = match Self::patch_args(argv) {
            Ok(v) => v,
            Err(e) => return emit_err(sink, format_args!("{e}")),
        };
        let pending = match self.take_pending() {
            Ok(p) => p,
            Err(e) => return emit_err(sink, format_args!("{e}")),
        };
        if self.fpb.init(self.regs).is_err() {
            self.pending = Some(pending);
            return emit_err(sink, format_args!("{}", LoaderError::HardwareUnavailable));
        }
        if !self.debugmon_ready {
            self.dcb.enable_debug_monitor();
            self.debugmon_ready = true;
        }
        if self.fpb.program_breakpoint(self.regs, k, orig).is_err() {
            self.pending = Some(pending);
            return emit_err(sink, format_args!("{}", LoaderError::InvalidComparator));
        }
        self.redirects.register(k, orig, target);
        self.slots.assign(k, orig & !1, target | 1, pending.size, pending.addr, Backend::DebugMonitor);
        emit_ok(sink, format_args!("Patch {k}: {:#010x} -> {:#010x}", orig & !1, target | 1));
    }

    fn clear_backend(&mut self, k: usize, backend: Backend) {
        match backend {
            Backend::Direct => self.fpb.clear(self.regs, k),
            Backend::Trampoline => self.trampolines.clear(&mut self.fpb, self.regs, k),
            Backend::DebugMonitor => {
                self.fpb.clear(self.regs, k);
                self.redirects.clear(k);
            }
        }
    }

    fn cmd_unpatch<S: Sink>(&mut self, argv: &[&str], sink: &mut S) {
        if has_flag(argv, "--all") {
            for k in 0..N {
                if let Some(slot) = self.slots.get(k) {
                    self.clear_backend(k, slot.backend);
                }
            }
            let (freed, count) = self.slots.clear_all();
            for &addr in &freed[..count] {
                if let Some(off) = self.offset_of(addr) {
                    self.alloc.free(self.pool, off);
                }
            }
            emit_ok(sink, format_args!("Cleared all {count} slots, memory freed"));
            return;
        }

        let Some(k) = flag(argv, "--comp").and_then(|s| s.parse::<usize>().ok()) else {
            emit_err(sink, format_args!("{}", LoaderError::MissingArgument("--comp")));
            return;
        };
        let Some(backend) = self.slots.get(k).map(|s| s.backend) else {
            emit_err(sink, format_args!("{}", LoaderError::InvalidComparator));
            return;
        };
        self.clear_backend(k, backend);
        if let Some(addr) = self.slots.clear(k) {
            if let Some(off) = self.offset_of(addr) {
                self.alloc.free(self.pool, off);
            }
        }
        emit_ok(sink, format_args!("Cleared slot {k}, memory freed"));
    }

    fn free_fd(&mut self, fd: usize) -> Option<crate::vfs::Handle> {
        self.open_files.get_mut(fd).and_then(|slot| slot.take())
    }

    fn cmd_fopen<S: Sink>(&mut self, argv: &[&str], sink: &mut S) {
        let Some(path) = flag(argv, "--path") else {
            emit_err(sink, format_args!("{}", LoaderError::MissingArgument("--path")));
            return;
        };
        let Some(flags) = flag(argv, "--mode").and_then(OpenFlags::from_mode_str) else {
            emit_err(sink, format_args!("{}", LoaderError::MissingArgument("--mode")));
            return;
        };
        let Some(fd) = self.open_files.iter().position(|h| h.is_none()) else {
            emit_err(sink, format_args!("{}", LoaderError::FilesystemError));
            return;
        };
        match self.vfs.open(path, flags) {
            Ok(handle) => {
                self.open_files[fd] = Some(handle);
                emit_ok(sink, format_args!("Opened fd={fd}"));
            }
            Err(_) => emit_err(sink, format_args!("{}", LoaderError::FilesystemError)),
        }
    }

    fn cmd_fclose<S: Sink>(&mut self, argv: &[&str], sink: &mut S) {
        let Some(fd) = flag(argv, "--fd").and_then(|s| s.parse::<usize>().ok()) else {
            emit_err(sink, format_args!("{}", LoaderError::MissingArgument("--fd")));
            return;
        };
        let Some(handle) = self.free_fd(fd) else {
            emit_err(sink, format_args!("{}", LoaderError::InvalidArgument("--fd")));
            return;
        };
        match self.vfs.close(handle) {
            Ok(()) => emit_ok(sink, format_args!("Closed")),
            Err(_) => emit_err(sink, format_args!("{}", LoaderError::FilesystemError)),
        }
    }

    fn cmd_fread<S: Sink>(&mut self, argv: &[&str], sink: &mut S) {
        let Some(fd) = flag(argv, "--fd").and_then(|s| s.parse::<usize>().ok()) else {
            emit_err(sink, format_args!("{}", LoaderError::MissingArgument("--fd")));
            return;
        };
        let Some(len) = flag(argv, "--len").and_then(|s| s.parse::<usize>().ok()) else {
            emit_err(sink, format_args!("{}", LoaderError::MissingArgument("--len")));
            return;
        };
        let Some(&Some(handle)) = self.open_files.get(fd) else {
            emit_err(sink, format_args!("{}", LoaderError::InvalidArgument("--fd")));
            return;
        };
        let len = len.min(MAX_PAYLOAD);
        let mut buf = [0u8; MAX_PAYLOAD];
        match self.vfs.read(handle, &mut buf[..len]) {
            Ok(n) => {
                let crc = crc16_ccitt(&buf[..n]);
                let mut b64 = [0u8; MAX_PAYLOAD_B64];
                let b64_len = codec::base64_encode(&buf[..n], &mut b64).unwrap_or(0);
                let text = core::str::from_utf8(&b64[..b64_len]).unwrap_or("");
                emit_ok(sink, format_args!("FREAD {n} bytes crc={crc:#06x} data={text}"));
            }
            Err(_) => emit_err(sink, format_args!("{}", LoaderError::FilesystemError)),
        }
    }

    fn cmd_fwrite<S: Sink>(&mut self, argv: &[&str], sink: &mut S) {
        let Some(fd) = flag(argv, "--fd").and_then(|s| s.parse::<usize>().ok()) else {
            emit_err(sink, format_args!("{}", LoaderError::MissingArgument("--fd")));
            return;
        };
        let Some(data) = flag(argv, "--data") else {
            emit_err(sink, format_args!("{}", LoaderError::MissingArgument("--data")));
            return;
        };
        let Some(&Some(handle)) = self.open_files.get(fd) else {
            emit_err(sink, format_args!("{}", LoaderError::InvalidArgument("--fd")));
            return;
        };

        let mut scratch = [0u8; MAX_PAYLOAD];
        let bytes = match self.decode_payload(data, &mut scratch) {
            Ok(b) => b,
            Err(e) => return emit_err(sink, format_args!("{e}")),
        };

        if let Some(given) = flag(argv, "--crc").and_then(parse_u16) {
            let computed = crc16_ccitt(bytes);
            if given != computed {
                return emit_err(sink, format_args!("{}", LoaderError::CrcMismatch { given, computed }));
            }
        }

        match self.vfs.write(handle, bytes) {
            Ok(n) => emit_ok(sink, format_args!("Wrote {n} bytes")),
            Err(_) => emit_err(sink, format_args!("{}", LoaderError::FilesystemError)),
        }
    }

    fn cmd_fseek<S: Sink>(&mut self, argv: &[&str], sink: &mut S) {
        let Some(fd) = flag(argv, "--fd").and_then(|s| s.parse::<usize>().ok()) else {
            emit_err(sink, format_args!("{}", LoaderError::MissingArgument("--fd")));
            return;
        };
        let Some(offset) = flag(argv, "--addr").and_then(|s| s.parse::<i64>().ok()) else {
            emit_err(sink, format_args!("{}", LoaderError::MissingArgument("--addr")));
            return;
        };
        let Some(&Some(handle)) = self.open_files.get(fd) else {
            emit_err(sink, format_args!("{}", LoaderError::InvalidArgument("--fd")));
            return;
        };
        match self.vfs.lseek(handle, offset, Whence::Start) {
            Ok(pos) => emit_ok(sink, format_args!("Seek to {pos}")),
            Err(_) => emit_err(sink, format_args!("{}", LoaderError::FilesystemError)),
        }
    }

    fn cmd_fstat<S: Sink>(&mut self, argv: &[&str], sink: &mut S) {
        let Some(path) = flag(argv, "--path") else {
            emit_err(sink, format_args!("{}", LoaderError::MissingArgument("--path")));
            return;
        };
        match self.vfs.stat(path) {
            Ok(stat) => emit_ok(sink, format_args!("size={} dir={}", stat.size, stat.is_dir)),
            Err(VfsError::NotFound) => emit_err(sink, format_args!("{}", LoaderError::InvalidArgument("--path"))),
            Err(_) => emit_err(sink, format_args!("{}", LoaderError::FilesystemError)),
        }
    }

    fn cmd_flist<S: Sink>(&mut self, argv: &[&str], sink: &mut S) {
        let path = flag(argv, "--path").unwrap_or("/");
        let dir = match self.vfs.opendir(path) {
            Ok(d) => d,
            Err(_) => return emit_err(sink, format_args!("{}", LoaderError::FilesystemError)),
        };
        let result = self.vfs.readdir(dir, &mut |entry| {
            let mut line: heapless_line::Line = heapless_line::Line::new();
            let _ = write!(line, "{}\t{}", entry.name, if entry.is_dir { "dir" } else { "file" });
            stream_line(sink, format_args!("{}", line.as_str()));
            true
        });
        let _ = self.vfs.closedir(dir);
        match result {
            Ok(_) => emit_ok(sink, format_args!("Listing complete")),
            Err(_) => emit_err(sink, format_args!("{}", LoaderError::FilesystemError)),
        }
    }

    fn cmd_fremove<S: Sink>(&mut self, argv: &[&str], sink: &mut S) {
        let Some(path) = flag(argv, "--path") else {
            emit_err(sink, format_args!("{}", LoaderError::MissingArgument("--path")));
            return;
        };
        match self.vfs.unlink(path) {
            Ok(()) => emit_ok(sink, format_args!("Removed")),
            Err(_) => emit_err(sink, format_args!("{}", LoaderError::FilesystemError)),
        }
    }

    fn cmd_fmkdir<S: Sink>(&mut self, argv: &[&str], sink: &mut S) {
        let Some(path) = flag(argv, "--path") else {
            emit_err(sink, format_args!("{}", LoaderError::MissingArgument("--path")));
            return;
        };
        match self.vfs.mkdir(path) {
            Ok(()) => emit_ok(sink, format_args!("Created")),
            Err(_) => emit_err(sink, format_args!("{}", LoaderError::FilesystemError)),
        }
    }
}

/// A fixed-capacity byte buffer used only to assemble one `flist` line
/// before handing it to the sink; avoids pulling in `alloc` for a single
/// `write!` call.
mod heapless_line {
    use core::fmt;

    pub struct Line {
        data: [u8; 96],
        len: usize,
    }

    impl Line {
        pub const fn new() -> Self {
            Line { data: [0; 96], len: 0 }
        }

        pub fn as_str(&self) -> &str {
            core::str::from_utf8(&self.data[..self.len]).unwrap_or("")
        }
    }

    impl fmt::Write for Line {
        fn write_str(&mut self, s: &str) -> fmt::Result {
            let bytes = s.as_bytes();
            let n = bytes.len().min(self.data.len() - self.len);
            self.data[self.len..self.len + n].copy_from_slice(&bytes[..n]);
            self.len += n;
            Ok(())
        }
    }
}

fn flag<'a>(argv: &[&'a str], name: &str) -> Option<&'a str> {
    let mut iter = argv.iter();
    while let Some(&tok) = iter.next() {
        if tok == name {
            return iter.next().copied();
        }
    }
    None
}

fn has_flag(argv: &[&str], name: &str) -> bool {
    argv.iter().any(|&t| t == name)
}

fn parse_u32(s: &str) -> Option<u32> {
    match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16).ok(),
        None => s.parse::<u32>().ok(),
    }
}

fn parse_u16(s: &str) -> Option<u16> {
    let hex = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X"))?;
    u16::from_str_radix(hex, 16).ok()
}

fn emit_ok<S: Sink>(sink: &mut S, line: core::fmt::Arguments) {
    let mut w = SinkWriter(sink);
    let _ = w.write_str(OK_PREFIX);
    let _ = w.write_fmt(line);
    let _ = w.write_str("\n");
    let _ = w.write_str(END_MARKER);
    let _ = w.write_str("\n");
    sink.flush();
}

fn emit_err<S: Sink>(sink: &mut S, line: core::fmt::Arguments) {
    let mut w = SinkWriter(sink);
    let _ = w.write_str(ERR_PREFIX);
    let _ = w.write_fmt(line);
    let _ = w.write_str("\n");
    let _ = w.write_str(END_MARKER);
    let _ = w.write_str("\n");
    sink.flush();
}

fn stream_line<S: Sink>(sink: &mut S, line: core::fmt::Arguments) {
    let mut w = SinkWriter(sink);
    let _ = w.write_fmt(line);
    let _ = w.write_str("\n");
    sink.flush();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::BufSink;
    use crate::vfs::{NullVfs, RamVfs};

    fn make_regs() -> alloc_regs::Boxed {
        alloc_regs::alloc_register_block()
    }

    fn make_dcb() -> alloc_regs::BoxedDcb {
        alloc_regs::alloc_dcb_block()
    }

    mod alloc_regs {
        use fpb_core::peripheral::dcb::RegisterBlock as DcbRegs;
        use fpb_core::peripheral::fpb::RegisterBlock;
        use std::alloc::{alloc_zeroed, Layout};

        pub struct Boxed(pub *mut RegisterBlock);
        pub struct BoxedDcb(pub *mut DcbRegs);

        pub fn alloc_register_block() -> Boxed {
            let layout = Layout::new::<RegisterBlock>();
            let ptr = unsafe { alloc_zeroed(layout) } as *mut RegisterBlock;
            assert!(!ptr.is_null());
            Boxed(ptr)
        }

        pub fn alloc_dcb_block() -> BoxedDcb {
            let layout = Layout::new::<DcbRegs>();
            let ptr = unsafe { alloc_zeroed(layout) } as *mut DcbRegs;
            assert!(!ptr.is_null());
            BoxedDcb(ptr)
        }

        impl core::ops::Deref for Boxed {
            type Target = RegisterBlock;
            fn deref(&self) -> &RegisterBlock {
                unsafe { &*self.0 }
            }
        }

        impl core::ops::Deref for BoxedDcb {
            type Target = DcbRegs;
            fn deref(&self) -> &DcbRegs {
                unsafe { &*self.0 }
            }
        }
    }

    #[test]
    fn ping_responds_pong() {
        let mut pool = std::vec![0u8; 4096];
        let regs = make_regs();
        let dcb = make_dcb();
        unsafe { regs.ctrl.write(6 << 4) };
        let mut fpbproc: Processor<'_, 6, NullVfs> = Processor::new(&mut pool, 0x2000_1000, 64, &regs, &dcb, 0x0800_4000, 16, NullVfs, "0.1.0", "test");
        let mut out = BufSink::new();
        fpbproc.dispatch(&["--cmd", "ping"], &mut out);
        assert_eq!(out.as_str(), "[FLOK] PONG\n[FLEND]\n");
    }

    #[test]
    fn alloc_then_stats_scenario_matches_literal_response() {
        let mut pool = std::vec![0u8; 4096];
        let regs = make_regs();
        let dcb = make_dcb();
        unsafe { regs.ctrl.write(6 << 4) };
        let mut p: Processor<'_, 6, NullVfs> = Processor::new(&mut pool, 0x2000_1000, 64, &regs, &dcb, 0x0800_4000, 16, NullVfs, "0.1.0", "test");
        let mut out = BufSink::new();
        p.dispatch(&["--cmd", "alloc", "--size", "128"], &mut out);
        assert_eq!(out.as_str(), "[FLOK] Allocated 128 at 0x20001000\n[FLEND]\n");
        assert_eq!(p.alloc.stats(p.pool).used, 2);
    }

    #[test]
    fn upload_then_crc_mismatch_frees_pending() {
        let mut pool = std::vec![0u8; 4096];
        let regs = make_regs();
        let dcb = make_dcb();
        unsafe { regs.ctrl.write(6 << 4) };
        let mut p: Processor<'_, 6, NullVfs> = Processor::new(&mut pool, 0x2000_1000, 64, &regs, &dcb, 0x0800_4000, 16, NullVfs, "0.1.0", "test");
        let mut out = BufSink::new();
        p.dispatch(&["--cmd", "alloc", "--size", "128"], &mut out);

        let mut out = BufSink::new();
        p.dispatch(&["--cmd", "upload", "--data", "48656c6c6f", "--addr", "0", "--crc", "0x0000"], &mut out);
        assert_eq!(out.as_str(), "[FLERR] CRC mismatch: 0x0000 != 0xd26e\n[FLEND]\n");
        assert_eq!(p.alloc.stats(p.pool).used, 0);
    }

    #[test]
    fn upload_with_correct_crc_writes_bytes() {
        let mut pool = std::vec![0u8; 4096];
        let regs = make_regs();
        let dcb = make_dcb();
        unsafe { regs.ctrl.write(6 << 4) };
        let mut p: Processor<'_, 6, NullVfs> = Processor::new(&mut pool, 0x2000_1000, 64, &regs, &dcb, 0x0800_4000, 16, NullVfs, "0.1.0", "test");
        let mut out = BufSink::new();
        p.dispatch(&["--cmd", "alloc", "--size", "128"], &mut out);
        let crc = crc16_ccitt(b"Hello");
        let crc_hex = std::format!("{crc:#06x}");
        let mut out = BufSink::new();
        p.dispatch(&["--cmd", "upload", "--data", "48656c6c6f", "--addr", "0", "--crc", &crc_hex], &mut out);
        assert_eq!(out.as_str(), "[FLOK] Uploaded 5 bytes to 0x20001000\n[FLEND]\n");
        assert_eq!(&p.pool[0..5], b"Hello");
    }

    #[test]
    fn unpatch_all_reports_cleared_count_and_frees_allocations() {
        let mut pool = std::vec![0u8; 4096];
        let regs = make_regs();
        let dcb = make_dcb();
        unsafe { regs.ctrl.write(6 << 4) };
        let mut p: Processor<'_, 6, NullVfs> = Processor::new(&mut pool, 0x2000_1000, 64, &regs, &dcb, 0x0800_4000, 16, NullVfs, "0.1.0", "test");

        for _ in 0..3 {
            let mut out = BufSink::new();
            p.dispatch(&["--cmd", "alloc", "--size", "64"], &mut out);
        }
        // Only the last `alloc` has a pending allocation (earlier ones were
        // implicitly freed per the "alloc replaces pending" rule); patch
        // three distinct comparators by re-allocating between each patch.
        let mut out = BufSink::new();
        p.dispatch(&["--cmd", "patch", "--comp", "0", "--orig", "0x08001000", "--target", "0x20001001"], &mut out);
        p.dispatch(&["--cmd", "alloc", "--size", "64"], &mut out);
        p.dispatch(&["--cmd", "patch", "--comp", "1", "--orig", "0x08001100", "--target", "0x20001041"], &mut out);
        p.dispatch(&["--cmd", "alloc", "--size", "64"], &mut out);
        p.dispatch(&["--cmd", "patch", "--comp", "2", "--orig", "0x08001200", "--target", "0x20001081"], &mut out);

        let mut out = BufSink::new();
        p.dispatch(&["--cmd", "unpatch", "--all"], &mut out);
        assert_eq!(out.as_str(), "[FLOK] Cleared all 3 slots, memory freed\n[FLEND]\n");
        assert_eq!(p.alloc.stats(p.pool).used, 0);
        assert_eq!(p.slots.active_count(), 0);
    }

    #[test]
    fn unknown_command_reports_unknown() {
        let mut pool = std::vec![0u8; 4096];
        let regs = make_regs();
        let dcb = make_dcb();
        let mut p: Processor<'_, 6, NullVfs> = Processor::new(&mut pool, 0x2000_1000, 64, &regs, &dcb, 0x0800_4000, 16, NullVfs, "0.1.0", "test");
        let mut out = BufSink::new();
        p.dispatch(&["--cmd", "bogus"], &mut out);
        assert_eq!(out.as_str(), "[FLERR] Unknown command\n[FLEND]\n");
    }

    #[test]
    fn file_transfer_round_trips_through_ram_vfs() {
        let mut pool = std::vec![0u8; 4096];
        let regs = make_regs();
        let dcb = make_dcb();
        let fs: RamVfs<4, 256> = RamVfs::new();
        let mut p: Processor<'_, 6, RamVfs<4, 256>> = Processor::new(&mut pool, 0x2000_1000, 64, &regs, &dcb, 0x0800_4000, 16, fs, "0.1.0", "test");

        let mut out = BufSink::new();
        p.dispatch(&["--cmd", "fopen", "--path", "/a.txt", "--mode", "w"], &mut out);
        assert_eq!(out.as_str(), "[FLOK] Opened fd=0\n[FLEND]\n");

        let mut out = BufSink::new();
        p.dispatch(&["--cmd", "fwrite", "--fd", "0", "--data", "48656c6c6f"], &mut out);
        assert_eq!(out.as_str(), "[FLOK] Wrote 5 bytes\n[FLEND]\n");

        let mut out = BufSink::new();
        p.dispatch(&["--cmd", "fclose", "--fd", "0"], &mut out);
        assert_eq!(out.as_str(), "[FLOK] Closed\n[FLEND]\n");
    }
}
