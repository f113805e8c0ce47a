//! RAII wrapper over the library packet.

use ffmpeg_sys_next as ffi;
use recast_core::{Error, Result, NOPTS};

/// One compressed unit of a stream, owned by the pipeline.
pub struct Packet {
    ptr: *mut ffi::AVPacket,
}

// The packet is owned by a single pipeline thread at a time.
unsafe impl Send for Packet {}

impl Packet {
    /// Allocate an empty packet.
    pub fn new() -> Result<Self> {
        let ptr = unsafe { ffi::av_packet_alloc() };
        if ptr.is_null() {
            return Err(Error::Alloc { what: "packet" });
        }
        Ok(Self { ptr })
    }

    /// Drop the payload reference, keeping the packet reusable.
    pub fn unref(&mut self) {
        unsafe { ffi::av_packet_unref(self.ptr) };
    }

    pub fn pts(&self) -> i64 {
        unsafe { (*self.ptr).pts }
    }

    pub fn set_pts(&mut self, pts: i64) {
        unsafe { (*self.ptr).pts = pts };
    }

    pub fn dts(&self) -> i64 {
        unsafe { (*self.ptr).dts }
    }

    pub fn set_dts(&mut self, dts: i64) {
        unsafe { (*self.ptr).dts = dts };
    }

    pub fn duration(&self) -> i64 {
        unsafe { (*self.ptr).duration }
    }

    pub fn set_duration(&mut self, duration: i64) {
        unsafe { (*self.ptr).duration = duration };
    }

    /// Index of the stream this packet belongs to.
    pub fn stream_index(&self) -> usize {
        unsafe { (*self.ptr).stream_index.max(0) as usize }
    }

    pub fn set_stream_index(&mut self, index: usize) {
        unsafe { (*self.ptr).stream_index = index as i32 };
    }

    /// Payload size in bytes.
    pub fn size(&self) -> usize {
        unsafe { (*self.ptr).size.max(0) as usize }
    }

    /// Borrow the payload.
    pub fn data(&self) -> &[u8] {
        unsafe {
            let data = (*self.ptr).data;
            if data.is_null() || (*self.ptr).size <= 0 {
                &[]
            } else {
                std::slice::from_raw_parts(data, (*self.ptr).size as usize)
            }
        }
    }

    /// Whether the presentation timestamp is defined.
    pub fn has_pts(&self) -> bool {
        self.pts() != NOPTS
    }

    /// Whether the decode timestamp is defined.
    pub fn has_dts(&self) -> bool {
        self.dts() != NOPTS
    }

    pub(crate) fn as_ptr(&self) -> *const ffi::AVPacket {
        self.ptr
    }

    pub(crate) fn as_mut_ptr(&mut self) -> *mut ffi::AVPacket {
        self.ptr
    }
}

impl Drop for Packet {
    fn drop(&mut self) {
        unsafe { ffi::av_packet_free(&mut self.ptr) };
    }
}
