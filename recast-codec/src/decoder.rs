//! Decoder contexts.

use crate::frame::Frame;
use crate::input::{stream_time_base, InputContext};
use crate::packet::Packet;
use crate::status::{AvError, CodecStatus};
use ffmpeg_sys_next as ffi;
use recast_core::{Error, Result, StreamKind, TimeBase};
use std::path::Path;
use std::ptr;

/// An open decoder bound to one input stream.
pub struct Decoder {
    ctx: *mut ffi::AVCodecContext,
    kind: StreamKind,
    time_base: TimeBase,
}

unsafe impl Send for Decoder {}

impl Decoder {
    /// Allocate a decoder for the given input stream, copy the stream's
    /// codec parameters into it and open it.
    pub fn open(input: &InputContext, index: usize, kind: StreamKind) -> Result<Self> {
        let stream = input.stream_ptr(index);
        let path = input.path();
        unsafe {
            let par = (*stream).codecpar;
            let codec = ffi::avcodec_find_decoder((*par).codec_id);
            if codec.is_null() {
                return Err(decoder_open_error(kind, path, "no decoder found".into()));
            }

            let mut ctx = ffi::avcodec_alloc_context3(codec);
            if ctx.is_null() {
                return Err(Error::Alloc {
                    what: "decoder context",
                });
            }

            let ret = ffi::avcodec_parameters_to_context(ctx, par);
            if ret < 0 {
                ffi::avcodec_free_context(&mut ctx);
                return Err(Error::ParamCopy {
                    stream: kind.name(),
                    path: path.to_path_buf(),
                    detail: AvError(ret).to_string(),
                });
            }

            (*ctx).pkt_timebase = (*stream).time_base;
            if kind == StreamKind::Video {
                let rate = (*stream).avg_frame_rate;
                if rate.num > 0 && rate.den > 0 {
                    (*ctx).framerate = rate;
                }
            }

            let ret = ffi::avcodec_open2(ctx, codec, ptr::null_mut());
            if ret < 0 {
                ffi::avcodec_free_context(&mut ctx);
                return Err(decoder_open_error(kind, path, AvError(ret).to_string()));
            }

            Ok(Self {
                ctx,
                kind,
                time_base: stream_time_base(stream),
            })
        }
    }

    /// The role of the stream this decoder serves.
    pub fn kind(&self) -> StreamKind {
        self.kind
    }

    /// The input stream's time base.
    pub fn time_base(&self) -> TimeBase {
        self.time_base
    }

    /// Push one demuxed packet, or `None` to begin draining.
    pub fn send_packet(&mut self, packet: Option<&Packet>) -> CodecStatus {
        let ptr = packet.map_or(ptr::null(), Packet::as_ptr);
        CodecStatus::from_raw(unsafe { ffi::avcodec_send_packet(self.ctx, ptr) })
    }

    /// Pull one decoded frame.
    pub fn receive_frame(&mut self, frame: &mut Frame) -> CodecStatus {
        CodecStatus::from_raw(unsafe { ffi::avcodec_receive_frame(self.ctx, frame.as_mut_ptr()) })
    }

    /// Reset the decoder's internal buffers after draining.
    pub fn flush_buffers(&mut self) {
        unsafe { ffi::avcodec_flush_buffers(self.ctx) };
    }

    /// Audio channel count reported by the decoder.
    pub fn channels(&self) -> u16 {
        unsafe { (*self.ctx).ch_layout.nb_channels.max(0) as u16 }
    }

    /// Audio sample rate reported by the decoder.
    pub fn sample_rate(&self) -> i32 {
        unsafe { (*self.ctx).sample_rate }
    }

    /// Source bit rate, zero when the container does not report one.
    pub fn bit_rate(&self) -> i64 {
        unsafe { (*self.ctx).bit_rate }
    }

    pub(crate) fn as_ptr(&self) -> *const ffi::AVCodecContext {
        self.ctx
    }
}

impl Drop for Decoder {
    fn drop(&mut self) {
        unsafe { ffi::avcodec_free_context(&mut self.ctx) };
    }
}

fn decoder_open_error(kind: StreamKind, path: &Path, detail: String) -> Error {
    Error::DecoderOpen {
        stream: kind.name(),
        path: path.to_path_buf(),
        detail,
    }
}
