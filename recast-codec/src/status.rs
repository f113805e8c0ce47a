//! Error codes and push/pull verb outcomes.

use ffmpeg_sys_next as ffi;
use libc::{c_char, c_int};
use std::ffi::CStr;
use std::fmt;

/// A raw error code returned by the codec library, rendered through
/// `av_strerror` for display.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct AvError(pub c_int);

impl AvError {
    /// The library's textual description of this error.
    pub fn message(&self) -> String {
        let mut buffer = [0 as c_char; 256];
        let text = unsafe {
            if ffi::av_strerror(self.0, buffer.as_mut_ptr(), buffer.len()) < 0 {
                return format!("unknown error {}", self.0);
            }
            CStr::from_ptr(buffer.as_ptr())
        };
        text.to_string_lossy().into_owned()
    }
}

impl fmt::Display for AvError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message(), self.0)
    }
}

impl fmt::Debug for AvError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AvError({}, {:?})", self.0, self.message())
    }
}

/// Outcome of one of the four push/pull codec verbs (and of the filter
/// sink's pull variants, which follow the same protocol).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecStatus {
    /// The call consumed or produced data.
    Ok,
    /// The codec needs the opposite verb before this one can make progress.
    Again,
    /// The codec is fully drained.
    Eof,
    /// Unrecoverable error.
    Fatal(AvError),
}

impl CodecStatus {
    /// Map a raw return code onto the verb protocol.
    pub(crate) fn from_raw(ret: c_int) -> Self {
        if ret >= 0 {
            CodecStatus::Ok
        } else if ret == ffi::AVERROR(libc::EAGAIN) {
            CodecStatus::Again
        } else if ret == ffi::AVERROR_EOF {
            CodecStatus::Eof
        } else {
            CodecStatus::Fatal(AvError(ret))
        }
    }
}

/// Shorthand for fallible library calls that only distinguish success from
/// failure.
pub(crate) fn check(ret: c_int) -> Result<c_int, AvError> {
    if ret < 0 {
        Err(AvError(ret))
    } else {
        Ok(ret)
    }
}
