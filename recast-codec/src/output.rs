//! Muxer side of the adapter.

use crate::encoder::Encoder;
use crate::input::{path_cstring, stream_time_base, InputContext};
use crate::packet::Packet;
use crate::status::{check, AvError};
use ffmpeg_sys_next as ffi;
use recast_core::{Error, Result, TimeBase, NOPTS};
use std::ffi::CString;
use std::path::{Path, PathBuf};
use std::ptr;

/// Handle to one stream of the output container.
#[derive(Debug, Clone, Copy)]
pub struct OutStream {
    index: usize,
}

impl OutStream {
    /// Index of the stream inside the output container.
    pub fn index(&self) -> usize {
        self.index
    }
}

/// An output container being written.
pub struct OutputContext {
    ctx: *mut ffi::AVFormatContext,
    path: PathBuf,
    file_open: bool,
    header_written: bool,
}

unsafe impl Send for OutputContext {}

impl OutputContext {
    /// Allocate an output container for the given path. The container
    /// format is forced by name since the target extensions are not ones
    /// the library can guess from.
    ///
    /// Callers must hold the library section guard across container
    /// construction, stream creation and the header write.
    pub fn create(path: &Path, container: &str) -> Result<Self> {
        let c_path = path_cstring(path);
        let c_format = CString::new(container).expect("container names are static");
        let mut ctx: *mut ffi::AVFormatContext = ptr::null_mut();
        let ret = unsafe {
            ffi::avformat_alloc_output_context2(
                &mut ctx,
                ptr::null(),
                c_format.as_ptr(),
                c_path.as_ptr(),
            )
        };
        if ret < 0 || ctx.is_null() {
            return Err(Error::OutputCreate {
                path: path.to_path_buf(),
                detail: AvError(ret).to_string(),
            });
        }
        Ok(Self {
            ctx,
            path: path.to_path_buf(),
            file_open: false,
            header_written: false,
        })
    }

    /// Whether the container wants codec headers out-of-band; encoders
    /// must be opened with the matching flag.
    pub fn wants_global_header(&self) -> bool {
        unsafe { ((*(*self.ctx).oformat).flags & ffi::AVFMT_GLOBALHEADER as i32) != 0 }
    }

    /// Create an output stream fed by an encoder.
    pub fn add_encoded_stream(&mut self, encoder: &Encoder) -> Result<OutStream> {
        unsafe {
            let stream = ffi::avformat_new_stream(self.ctx, encoder.codec_ptr());
            if stream.is_null() {
                return Err(Error::Alloc {
                    what: "output stream",
                });
            }
            let ret = ffi::avcodec_parameters_from_context((*stream).codecpar, encoder.as_ptr());
            if ret < 0 {
                return Err(Error::ParamCopy {
                    stream: encoder.kind().name(),
                    path: self.path.clone(),
                    detail: AvError(ret).to_string(),
                });
            }
            (*stream).time_base = crate::encoder::to_av_rational(encoder.time_base().as_rational());
            Ok(OutStream {
                index: (*stream).index as usize,
            })
        }
    }

    /// Create an output stream that copies an input stream's parameters
    /// verbatim.
    pub fn add_copy_stream(
        &mut self,
        input: &InputContext,
        input_index: usize,
        kind: &'static str,
    ) -> Result<OutStream> {
        unsafe {
            let source = input.stream_ptr(input_index);
            let stream = ffi::avformat_new_stream(self.ctx, ptr::null());
            if stream.is_null() {
                return Err(Error::Alloc {
                    what: "output stream",
                });
            }
            let ret = ffi::avcodec_parameters_copy((*stream).codecpar, (*source).codecpar);
            if ret < 0 {
                return Err(Error::ParamCopy {
                    stream: kind,
                    path: self.path.clone(),
                    detail: AvError(ret).to_string(),
                });
            }
            (*stream).time_base = (*source).time_base;
            if (*source).duration != NOPTS {
                (*stream).duration = (*source).duration;
            }
            Ok(OutStream {
                index: (*stream).index as usize,
            })
        }
    }

    /// Open the on-disk file when the format needs one.
    pub fn open_file(&mut self) -> Result<()> {
        unsafe {
            if ((*(*self.ctx).oformat).flags & ffi::AVFMT_NOFILE as i32) != 0 {
                return Ok(());
            }
            let c_path = path_cstring(&self.path);
            let ret = ffi::avio_open(&mut (*self.ctx).pb, c_path.as_ptr(), ffi::AVIO_FLAG_WRITE as i32);
            if ret < 0 {
                return Err(Error::IoWrite {
                    path: self.path.clone(),
                    source: std::io::Error::other(AvError(ret).to_string()),
                });
            }
            self.file_open = true;
        }
        Ok(())
    }

    /// Write the container header.
    pub fn write_header(&mut self) -> Result<()> {
        let ret = unsafe { ffi::avformat_write_header(self.ctx, ptr::null_mut()) };
        if ret < 0 {
            return Err(Error::OutputCreate {
                path: self.path.clone(),
                detail: format!("header: {}", AvError(ret)),
            });
        }
        self.header_written = true;
        Ok(())
    }

    /// The stream's time base as adjusted by the muxer; only meaningful
    /// after the header has been written.
    pub fn stream_time_base(&self, stream: OutStream) -> TimeBase {
        unsafe {
            let st = *(*self.ctx).streams.add(stream.index);
            stream_time_base(st)
        }
    }

    /// Interleaved write of one packet; the muxer takes ownership of the
    /// payload.
    pub fn write_interleaved(&mut self, packet: &mut Packet) -> std::result::Result<(), AvError> {
        check(unsafe { ffi::av_interleaved_write_frame(self.ctx, packet.as_mut_ptr()) })?;
        Ok(())
    }

    /// Finalize the container: flush interleaving buffers and write the
    /// trailer.
    pub fn write_trailer(&mut self) -> Result<()> {
        if !self.header_written {
            return Ok(());
        }
        let ret = unsafe { ffi::av_write_trailer(self.ctx) };
        if ret != 0 {
            return Err(Error::Trailer {
                path: self.path.clone(),
                detail: AvError(ret).to_string(),
            });
        }
        Ok(())
    }

    /// The path being written.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for OutputContext {
    fn drop(&mut self) {
        unsafe {
            if self.file_open && !(*self.ctx).pb.is_null() {
                ffi::avio_closep(&mut (*self.ctx).pb);
            }
            ffi::avformat_free_context(self.ctx);
        }
    }
}
