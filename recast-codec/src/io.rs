//! Custom byte-stream I/O.
//!
//! Adapts a plain seekable file to the library's read/seek callback
//! contract. The callback context is a typed [`MediaSource`] behind a
//! stable heap address; the trampolines recover it from the opaque pointer
//! the library hands back.

use libc::{c_int, c_void, SEEK_CUR, SEEK_END, SEEK_SET};
use recast_core::{Error, Result};
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use ffmpeg_sys_next as ffi;

/// Byte count handed to the library for its probe/read buffer, before
/// padding.
pub(crate) const IO_BUFFER_SIZE: usize = 32 * 1024;

/// A readable, seekable media file serving a demuxer through custom I/O.
pub struct MediaSource {
    file: File,
    size: u64,
    path: PathBuf,
}

impl MediaSource {
    /// Open the file and record its length; the length answers the
    /// library's stream-size queries without moving the read position.
    pub fn open(path: &Path) -> Result<Box<Self>> {
        let file = File::open(path).map_err(|source| Error::IoOpen {
            path: path.to_path_buf(),
            source,
        })?;
        let size = file
            .metadata()
            .map_err(|source| Error::IoOpen {
                path: path.to_path_buf(),
                source,
            })?
            .len();
        Ok(Box::new(Self {
            file,
            size,
            path: path.to_path_buf(),
        }))
    }

    /// Total file length in bytes.
    pub fn len(&self) -> u64 {
        self.size
    }

    /// Whether the file is empty.
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// The path the source was opened from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_into(&mut self, buffer: &mut [u8]) -> std::io::Result<usize> {
        self.file.read(buffer)
    }

    fn seek_to(&mut self, target: SeekFrom) -> std::io::Result<u64> {
        self.file.seek(target)
    }

    fn position(&mut self) -> std::io::Result<u64> {
        self.file.stream_position()
    }
}

/// Read callback: copy up to `len` bytes into the library's buffer.
/// Returns the byte count, `AVERROR_EOF` at end of file, or an I/O error.
pub(crate) unsafe extern "C" fn read_trampoline(
    opaque: *mut c_void,
    buffer: *mut u8,
    len: c_int,
) -> c_int {
    if opaque.is_null() || buffer.is_null() || len <= 0 {
        return ffi::AVERROR(libc::EINVAL);
    }
    let source = &mut *(opaque as *mut MediaSource);
    let slice = std::slice::from_raw_parts_mut(buffer, len as usize);
    match source.read_into(slice) {
        Ok(0) => ffi::AVERROR_EOF,
        Ok(read) => read as c_int,
        Err(_) => ffi::AVERROR(libc::EIO),
    }
}

/// Seek callback. `AVSEEK_SIZE` reports the stream length without moving;
/// the remaining whence values behave like `lseek`.
pub(crate) unsafe extern "C" fn seek_trampoline(
    opaque: *mut c_void,
    offset: i64,
    whence: c_int,
) -> i64 {
    if opaque.is_null() {
        return ffi::AVERROR(libc::EINVAL) as i64;
    }
    let source = &mut *(opaque as *mut MediaSource);

    if whence & ffi::AVSEEK_SIZE as i32 != 0 {
        return source.len() as i64;
    }

    let result = match whence & !(ffi::AVSEEK_FORCE as i32) {
        SEEK_SET => source.seek_to(SeekFrom::Start(offset.max(0) as u64)),
        SEEK_CUR => source.seek_to(SeekFrom::Current(offset)),
        SEEK_END => source.seek_to(SeekFrom::End(offset)),
        _ => return ffi::AVERROR(libc::EINVAL) as i64,
    };
    match result.and_then(|_| source.position()) {
        Ok(pos) => pos as i64,
        Err(_) => ffi::AVERROR(libc::EIO) as i64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn sample_file(bytes: &[u8]) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sample.bin");
        File::create(&path).unwrap().write_all(bytes).unwrap();
        (dir, path)
    }

    #[test]
    fn test_open_records_length() {
        let (_dir, path) = sample_file(b"0123456789");
        let source = MediaSource::open(&path).unwrap();
        assert_eq!(source.len(), 10);
        assert!(!source.is_empty());
    }

    #[test]
    fn test_open_missing_file_is_io_open() {
        let err = MediaSource::open(Path::new("/no/such/file.mkv")).unwrap_err();
        assert!(matches!(err, Error::IoOpen { .. }));
    }

    #[test]
    fn test_read_trampoline_reads_and_reports_eof() {
        let (_dir, path) = sample_file(b"abcdef");
        let mut source = MediaSource::open(&path).unwrap();
        let opaque = source.as_mut() as *mut MediaSource as *mut c_void;

        let mut buffer = [0u8; 4];
        let n = unsafe { read_trampoline(opaque, buffer.as_mut_ptr(), 4) };
        assert_eq!(n, 4);
        assert_eq!(&buffer, b"abcd");

        let n = unsafe { read_trampoline(opaque, buffer.as_mut_ptr(), 4) };
        assert_eq!(n, 2);

        let n = unsafe { read_trampoline(opaque, buffer.as_mut_ptr(), 4) };
        assert_eq!(n, ffi::AVERROR_EOF);
    }

    #[test]
    fn test_seek_trampoline_whence_modes() {
        let (_dir, path) = sample_file(b"0123456789");
        let mut source = MediaSource::open(&path).unwrap();
        let opaque = source.as_mut() as *mut MediaSource as *mut c_void;

        unsafe {
            assert_eq!(seek_trampoline(opaque, 0, ffi::AVSEEK_SIZE as i32), 10);
            assert_eq!(seek_trampoline(opaque, 4, SEEK_SET), 4);
            assert_eq!(seek_trampoline(opaque, 2, SEEK_CUR), 6);
            assert_eq!(seek_trampoline(opaque, 0, SEEK_END), 10);
            assert!(seek_trampoline(opaque, 0, 99) < 0);
        }
    }
}
