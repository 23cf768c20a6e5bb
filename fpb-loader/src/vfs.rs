//! File transfer: a polymorphic VFS capability set driven by the `f*`
//! commands.
//!
//! Real back-ends (POSIX, libc `FILE*`, FAT) are explicitly out of scope
//! for this core — only their interface is specified. This module defines
//! that interface as a [`Vfs`] trait object, plus two in-tree back-ends: a
//! [`NullVfs`] for builds that compile file transfer out, and a
//! [`RamVfs`] in-memory filesystem used by host-side tests and by MCUs
//! with no mounted storage.

use bitflags::bitflags;

bitflags! {
    /// Open-mode flags, translated from the command line's `r`/`w`/`a`/`+`
    /// mode string.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct OpenFlags: u8 {
        /// Open for reading.
        const READ = 1 << 0;
        /// Open for writing.
        const WRITE = 1 << 1;
        /// Create the file if it doesn't exist.
        const CREATE = 1 << 2;
        /// Writes append rather than overwrite.
        const APPEND = 1 << 3;
        /// Truncate an existing file to zero length.
        const TRUNCATE = 1 << 4;
    }
}

impl OpenFlags {
    /// Translates a POSIX-`fopen`-style mode string (`r`, `w`, `a`, with an
    /// optional trailing `+`) to a flag set.
    pub fn from_mode_str(mode: &str) -> Option<OpenFlags> {
        let (base, plus) = match mode.strip_suffix('+') {
            Some(rest) => (rest, true),
            None => (mode, false),
        };
        let mut flags = match base {
            "r" => OpenFlags::READ,
            "w" => OpenFlags::WRITE | OpenFlags::CREATE | OpenFlags::TRUNCATE,
            "a" => OpenFlags::WRITE | OpenFlags::CREATE | OpenFlags::APPEND,
            _ => return None,
        };
        if plus {
            flags |= OpenFlags::READ | OpenFlags::WRITE;
        }
        Some(flags)
    }
}

/// Seek origin for [`Vfs::lseek`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Whence {
    /// Relative to the start of the file.
    Start,
    /// Relative to the current offset.
    Current,
    /// Relative to the end of the file.
    End,
}

/// An open file or directory handle, opaque to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Handle(pub u32);

/// File/directory metadata returned by [`Vfs::stat`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Stat {
    /// Size in bytes (0 for directories).
    pub size: u64,
    /// Whether the entry is a directory.
    pub is_dir: bool,
}

/// A single entry yielded while iterating a directory.
#[derive(Debug, Clone, Copy)]
pub struct DirEntry<'a> {
    /// Entry name (not a full path).
    pub name: &'a str,
    /// Whether the entry is itself a directory.
    pub is_dir: bool,
}

/// Errors a back-end can report. Kept small and back-end-agnostic; a
/// handler formats the response text directly from the variant rather
/// than carrying an owned message (no heap).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VfsError {
    /// No back-end is mounted (file transfer compiled out).
    Unavailable,
    /// The path does not name an existing entry.
    NotFound,
    /// The handle does not name an open file/directory.
    InvalidHandle,
    /// The back-end's fixed capacity (files, directory entries, bytes) is
    /// exhausted.
    OutOfSpace,
    /// The path already exists where an exclusive operation disallows it.
    AlreadyExists,
    /// The operation is not valid for the handle's kind (e.g. `read` on a
    /// directory handle).
    InvalidOperation,
}

/// Directory listing uses a callback-per-entry interface (rather than
/// returning a collection) to bound memory, per §4.7.
pub trait Vfs {
    /// Whether this back-end actually serves file transfer, as opposed to
    /// rejecting every call with [`VfsError::Unavailable`]. `info`'s
    /// "file transfer availability" line reports this rather than assuming
    /// a mounted `Vfs` is always a real one.
    fn available(&self) -> bool {
        true
    }
    /// Opens `path` with `flags`, returning a handle for subsequent calls.
    fn open(&mut self, path: &str, flags: OpenFlags) -> Result<Handle, VfsError>;
    /// Closes a handle previously returned by [`open`](Self::open).
    fn close(&mut self, handle: Handle) -> Result<(), VfsError>;
    /// Reads into `buf`, returning the number of bytes read (0 at EOF).
    fn read(&mut self, handle: Handle, buf: &mut [u8]) -> Result<usize, VfsError>;
    /// Writes `data`, returning the number of bytes written.
    fn write(&mut self, handle: Handle, data: &[u8]) -> Result<usize, VfsError>;
    /// Repositions the handle's offset, returning the new absolute offset.
    fn lseek(&mut self, handle: Handle, offset: i64, whence: Whence) -> Result<u64, VfsError>;
    /// Flushes any buffered writes.
    fn fsync(&mut self, handle: Handle) -> Result<(), VfsError>;
    /// Queries metadata for `path` without opening it.
    fn stat(&mut self, path: &str) -> Result<Stat, VfsError>;
    /// Opens `path` as a directory for iteration.
    fn opendir(&mut self, path: &str) -> Result<Handle, VfsError>;
    /// Invokes `f` once per remaining directory entry, stopping early if
    /// `f` returns `false`. Returns whether iteration reached the end.
    fn readdir(&mut self, dir: Handle, f: &mut dyn FnMut(DirEntry) -> bool) -> Result<bool, VfsError>;
    /// Closes a directory handle previously returned by
    /// [`opendir`](Self::opendir).
    fn closedir(&mut self, dir: Handle) -> Result<(), VfsError>;
    /// Removes a file.
    fn unlink(&mut self, path: &str) -> Result<(), VfsError>;
    /// Removes an empty directory.
    fn rmdir(&mut self, path: &str) -> Result<(), VfsError>;
    /// Creates a directory.
    fn mkdir(&mut self, path: &str) -> Result<(), VfsError>;
    /// Renames/moves `from` to `to`.
    fn rename(&mut self, from: &str, to: &str) -> Result<(), VfsError>;
}

/// A back-end that refuses every operation. Selected when file transfer is
/// compiled out; `info`'s "file transfer availability" field reflects
/// this by checking [`NullVfs`] vs. a real back-end at the type level
/// through whichever `Vfs` the device binary wires into the Command
/// Processor.
#[derive(Default)]
pub struct NullVfs;

impl Vfs for NullVfs {
    fn available(&self) -> bool {
        false
    }
    fn open(&mut self, _path: &str, _flags: OpenFlags) -> Result<Handle, VfsError> {
        Err(VfsError::Unavailable)
    }
    fn close(&mut self, _handle: Handle) -> Result<(), VfsError> {
        Err(VfsError::Unavailable)
    }
    fn read(&mut self, _handle: Handle, _buf: &mut [u8]) -> Result<usize, VfsError> {
        Err(VfsError::Unavailable)
    }
    fn write(&mut self, _handle: Handle, _data: &[u8]) -> Result<usize, VfsError> {
        Err(VfsError::Unavailable)
    }
    fn lseek(&mut self, _handle: Handle, _offset: i64, _whence: Whence) -> Result<u64, VfsError> {
        Err(VfsError::Unavailable)
    }
    fn fsync(&mut self, _handle: Handle) -> Result<(), VfsError> {
        Err(VfsError::Unavailable)
    }
    fn stat(&mut self, _path: &str) -> Result<Stat, VfsError> {
        Err(VfsError::Unavailable)
    }
    fn opendir(&mut self, _path: &str) -> Result<Handle, VfsError> {
        Err(VfsError::Unavailable)
    }
    fn readdir(&mut self, _dir: Handle, _f: &mut dyn FnMut(DirEntry) -> bool) -> Result<bool, VfsError> {
        Err(VfsError::Unavailable)
    }
    fn closedir(&mut self, _dir: Handle) -> Result<(), VfsError> {
        Err(VfsError::Unavailable)
    }
    fn unlink(&mut self, _path: &str) -> Result<(), VfsError> {
        Err(VfsError::Unavailable)
    }
    fn rmdir(&mut self, _path: &str) -> Result<(), VfsError> {
        Err(VfsError::Unavailable)
    }
    fn mkdir(&mut self, _path: &str) -> Result<(), VfsError> {
        Err(VfsError::Unavailable)
    }
    fn rename(&mut self, _from: &str, _to: &str) -> Result<(), VfsError> {
        Err(VfsError::Unavailable)
    }
}

const MAX_NAME: usize = 32;

#[derive(Clone, Copy)]
struct RamFile<const FILE_CAP: usize> {
    name: [u8; MAX_NAME],
    name_len: u8,
    data: [u8; FILE_CAP],
    len: usize,
    live: bool,
}

impl<const FILE_CAP: usize> RamFile<FILE_CAP> {
    const fn empty() -> Self {
        RamFile { name: [0; MAX_NAME], name_len: 0, data: [0; FILE_CAP], len: 0, live: false }
    }

    fn name(&self) -> &str {
        core::str::from_utf8(&self.name[..self.name_len as usize]).unwrap_or("")
    }
}

/// An in-memory, flat-namespace filesystem: no directories beyond the
/// implicit root. Intended for host-side tests and MCUs with no mounted
/// storage, not as a production back-end (POSIX/libc/FAT own that role,
/// per §4.7's explicit out-of-scope list).
pub struct RamVfs<const MAX_FILES: usize, const FILE_CAP: usize> {
    files: [RamFile<FILE_CAP>; MAX_FILES],
    open_offsets: [u64; MAX_FILES],
    dir_cursor: usize,
    dir_open: bool,
}

impl<const MAX_FILES: usize, const FILE_CAP: usize> Default for RamVfs<MAX_FILES, FILE_CAP> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const MAX_FILES: usize, const FILE_CAP: usize> RamVfs<MAX_FILES, FILE_CAP> {
    /// Creates an empty filesystem.
    pub const fn new() -> Self {
        RamVfs {
            files: [RamFile::empty(); MAX_FILES],
            open_offsets: [0; MAX_FILES],
            dir_cursor: 0,
            dir_open: false,
        }
    }

    fn strip_root(path: &str) -> &str {
        path.strip_prefix('/').unwrap_or(path)
    }

    fn find(&self, name: &str) -> Option<usize> {
        self.files.iter().position(|f| f.live && f.name() == name)
    }

    fn find_or_create(&mut self, name: &str, create: bool) -> Result<usize, VfsError> {
        if let Some(i) = self.find(name) {
            return Ok(i);
        }
        if !create {
            return Err(VfsError::NotFound);
        }
        if name.len() > MAX_NAME {
            return Err(VfsError::OutOfSpace);
        }
        let slot = self.files.iter().position(|f| !f.live).ok_or(VfsError::OutOfSpace)?;
        let file = &mut self.files[slot];
        file.name[..name.len()].copy_from_slice(name.as_bytes());
        file.name_len = name.len() as u8;
        file.len = 0;
        file.live = true;
        Ok(slot)
    }
}

impl<const MAX_FILES: usize, const FILE_CAP: usize> Vfs for RamVfs<MAX_FILES, FILE_CAP> {
    fn open(&mut self, path: &str, flags: OpenFlags) -> Result<Handle, VfsError> {
        let name = Self::strip_root(path);
        let idx = self.find_or_create(name, flags.contains(OpenFlags::CREATE))?;
        if flags.contains(OpenFlags::TRUNCATE) {
            self.files[idx].len = 0;
        }
        self.open_offsets[idx] = if flags.contains(OpenFlags::APPEND) { self.files[idx].len as u64 } else { 0 };
        Ok(Handle(idx as u32))
    }

    fn close(&mut self, _handle: Handle) -> Result<(), VfsError> {
        Ok(())
    }

    fn read(&mut self, handle: Handle, buf: &mut [u8]) -> Result<usize, VfsError> {
        let idx = handle.0 as usize;
        let file = self.files.get(idx).filter(|f| f.live).ok_or(VfsError::InvalidHandle)?;
        let off = self.open_offsets[idx] as usize;
        if off >= file.len {
            return Ok(0);
        }
        let n = buf.len().min(file.len - off);
        buf[..n].copy_from_slice(&file.data[off..off + n]);
        self.open_offsets[idx] += n as u64;
        Ok(n)
    }

    fn write(&mut self, handle: Handle, data: &[u8]) -> Result<usize, VfsError> {
        let idx = handle.0 as usize;
        let file = self.files.get_mut(idx).filter(|f| f.live).ok_or(VfsError::InvalidHandle)?;
        let off = self.open_offsets[idx] as usize;
        if off >= FILE_CAP {
            return Err(VfsError::OutOfSpace);
        }
        let n = data.len().min(FILE_CAP - off);
        file.data[off..off + n].copy_from_slice(&data[..n]);
        file.len = file.len.max(off + n);
        self.open_offsets[idx] += n as u64;
        Ok(n)
    }

    fn lseek(&mut self, handle: Handle, offset: i64, whence: Whence) -> Result<u64, VfsError> {
        let idx = handle.0 as usize;
        let file = self.files.get(idx).filter(|f| f.live).ok_or(VfsError::InvalidHandle)?;
        let base = match whence {
            Whence::Start => 0i64,
            Whence::Current => self.open_offsets[idx] as i64,
            Whence::End => file.len as i64,
        };
        let new_off = (base + offset).max(0) as u64;
        self.open_offsets[idx] = new_off;
        Ok(new_off)
    }

    fn fsync(&mut self, _handle: Handle) -> Result<(), VfsError> {
        Ok(())
    }

    fn stat(&mut self, path: &str) -> Result<Stat, VfsError> {
        let name = Self::strip_root(path);
        let idx = self.find(name).ok_or(VfsError::NotFound)?;
        Ok(Stat { size: self.files[idx].len as u64, is_dir: false })
    }

    fn opendir(&mut self, path: &str) -> Result<Handle, VfsError> {
        if !Self::strip_root(path).is_empty() {
            return Err(VfsError::NotFound);
        }
        self.dir_cursor = 0;
        self.dir_open = true;
        Ok(Handle(0))
    }

    fn readdir(&mut self, dir: Handle, f: &mut dyn FnMut(DirEntry) -> bool) -> Result<bool, VfsError> {
        if !self.dir_open || dir.0 != 0 {
            return Err(VfsError::InvalidHandle);
        }
        while self.dir_cursor < MAX_FILES {
            let file = &self.files[self.dir_cursor];
            self.dir_cursor += 1;
            if file.live && !f(DirEntry { name: file.name(), is_dir: false }) {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn closedir(&mut self, _dir: Handle) -> Result<(), VfsError> {
        self.dir_open = false;
        Ok(())
    }

    fn unlink(&mut self, path: &str) -> Result<(), VfsError> {
        let name = Self::strip_root(path);
        let idx = self.find(name).ok_or(VfsError::NotFound)?;
        self.files[idx].live = false;
        Ok(())
    }

    fn rmdir(&mut self, _path: &str) -> Result<(), VfsError> {
        Err(VfsError::InvalidOperation)
    }

    fn mkdir(&mut self, _path: &str) -> Result<(), VfsError> {
        Err(VfsError::InvalidOperation)
    }

    fn rename(&mut self, from: &str, to: &str) -> Result<(), VfsError> {
        let from = Self::strip_root(from);
        let to = Self::strip_root(to);
        if self.find(to).is_some() {
            return Err(VfsError::AlreadyExists);
        }
        let idx = self.find(from).ok_or(VfsError::NotFound)?;
        if to.len() > MAX_NAME {
            return Err(VfsError::OutOfSpace);
        }
        let file = &mut self.files[idx];
        file.name[..to.len()].copy_from_slice(to.as_bytes());
        file.name_len = to.len() as u8;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_strings_translate_to_expected_flags() {
        assert_eq!(OpenFlags::from_mode_str("r"), Some(OpenFlags::READ));
        assert_eq!(OpenFlags::from_mode_str("w"), Some(OpenFlags::WRITE | OpenFlags::CREATE | OpenFlags::TRUNCATE));
        assert!(OpenFlags::from_mode_str("w+").unwrap().contains(OpenFlags::READ));
        assert_eq!(OpenFlags::from_mode_str("x"), None);
    }

    #[test]
    fn write_then_read_back_round_trips() {
        let mut fs: RamVfs<4, 64> = RamVfs::new();
        let h = fs.open("/a.txt", OpenFlags::from_mode_str("w").unwrap()).unwrap();
        assert_eq!(fs.write(h, b"hello").unwrap(), 5);
        fs.lseek(h, 0, Whence::Start).unwrap();
        let mut buf = [0u8; 5];
        assert_eq!(fs.read(h, &mut buf).unwrap(), 5);
        assert_eq!(&buf, b"hello");
    }

    #[test]
    fn readdir_visits_every_live_file() {
        let mut fs: RamVfs<4, 64> = RamVfs::new();
        fs.open("/a", OpenFlags::from_mode_str("w").unwrap()).unwrap();
        fs.open("/b", OpenFlags::from_mode_str("w").unwrap()).unwrap();
        let dir = fs.opendir("/").unwrap();
        let mut seen = std::vec::Vec::new();
        fs.readdir(dir, &mut |e| {
            seen.push(std::string::String::from(e.name));
            true
        })
        .unwrap();
        seen.sort();
        assert_eq!(seen, std::vec!["a", "b"]);
    }

    #[test]
    fn unlink_then_stat_reports_not_found() {
        let mut fs: RamVfs<4, 64> = RamVfs::new();
        fs.open("/a", OpenFlags::from_mode_str("w").unwrap()).unwrap();
        fs.unlink("/a").unwrap();
        assert_eq!(fs.stat("/a"), Err(VfsError::NotFound));
    }

    #[test]
    fn null_vfs_rejects_every_operation() {
        let mut fs = NullVfs;
        assert_eq!(fs.open("/a", OpenFlags::READ), Err(VfsError::Unavailable));
        assert!(!fs.available());
    }

    #[test]
    fn ram_vfs_reports_available() {
        let fs: RamVfs<4, 256> = RamVfs::default();
        assert!(fs.available());
    }
}
