//! RAII wrapper over the library frame.

use ffmpeg_sys_next as ffi;
use recast_core::{Error, Result};

/// One decompressed unit: a video picture or a block of audio samples.
pub struct Frame {
    ptr: *mut ffi::AVFrame,
}

unsafe impl Send for Frame {}

impl Frame {
    /// Allocate an empty frame.
    pub fn new() -> Result<Self> {
        let ptr = unsafe { ffi::av_frame_alloc() };
        if ptr.is_null() {
            return Err(Error::Alloc { what: "frame" });
        }
        Ok(Self { ptr })
    }

    /// Drop the buffer references, keeping the frame reusable.
    pub fn unref(&mut self) {
        unsafe { ffi::av_frame_unref(self.ptr) };
    }

    /// Presentation timestamp of the frame.
    pub fn pts(&self) -> i64 {
        unsafe { (*self.ptr).pts }
    }

    /// Number of audio samples held; zero for video frames.
    pub fn nb_samples(&self) -> i32 {
        unsafe { (*self.ptr).nb_samples }
    }

    pub(crate) fn as_mut_ptr(&mut self) -> *mut ffi::AVFrame {
        self.ptr
    }

    pub(crate) fn as_ptr(&self) -> *const ffi::AVFrame {
        self.ptr
    }
}

impl Drop for Frame {
    fn drop(&mut self) {
        unsafe { ffi::av_frame_free(&mut self.ptr) };
    }
}
