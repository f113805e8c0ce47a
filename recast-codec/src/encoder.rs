//! Encoder contexts.
//!
//! Encoders are configured from the matching decoder plus the target
//! profile: the video encoder inherits geometry, frame rate and time base
//! from the source; the audio encoder is told its sample format, rate,
//! channel layout and a `1/sample_rate` time base.

use crate::decoder::Decoder;
use crate::frame::Frame;
use crate::ids;
use crate::packet::Packet;
use crate::status::{AvError, CodecStatus};
use ffmpeg_sys_next as ffi;
use recast_core::{AudioCodec, Error, Rational, Result, StreamKind, TimeBase, VideoCodec};
use std::ffi::CString;
use std::path::Path;
use std::ptr;

/// Fallback video bit rate when the source container reports none.
const FALLBACK_VIDEO_BIT_RATE: i64 = 1_500_000;

/// An open encoder for one output stream.
pub struct Encoder {
    ctx: *mut ffi::AVCodecContext,
    codec: *const ffi::AVCodec,
    kind: StreamKind,
    time_base: TimeBase,
}

unsafe impl Send for Encoder {}

impl Encoder {
    /// Open a video encoder configured from the source decoder.
    pub fn open_video(
        target: VideoCodec,
        decoder: &Decoder,
        global_header: bool,
        path: &Path,
    ) -> Result<Self> {
        let id = ids::video_codec_id(target);
        unsafe {
            let codec = ffi::avcodec_find_encoder(id);
            if codec.is_null() {
                return Err(encoder_open_error(
                    StreamKind::Video,
                    path,
                    format!("no encoder for {}", ids::codec_name(id)),
                ));
            }

            let mut ctx = ffi::avcodec_alloc_context3(codec);
            if ctx.is_null() {
                return Err(Error::Alloc {
                    what: "encoder context",
                });
            }

            let dec = decoder.as_ptr();
            (*ctx).time_base = to_av_rational(decoder.time_base().as_rational());
            (*ctx).width = (*dec).width;
            (*ctx).height = (*dec).height;
            (*ctx).sample_aspect_ratio = (*dec).sample_aspect_ratio;
            (*ctx).framerate = (*dec).framerate;
            (*ctx).pix_fmt = first_pix_fmt(codec);
            (*ctx).bit_rate = (*dec).bit_rate * 9 / 10;
            if (*ctx).bit_rate == 0 {
                (*ctx).bit_rate = FALLBACK_VIDEO_BIT_RATE;
            }
            if global_header {
                (*ctx).flags |= ffi::AV_CODEC_FLAG_GLOBAL_HEADER as i32;
            }

            let mut options = encoder_options(false);
            let ret = ffi::avcodec_open2(ctx, codec, &mut options);
            ffi::av_dict_free(&mut options);
            if ret < 0 {
                ffi::avcodec_free_context(&mut ctx);
                return Err(encoder_open_error(
                    StreamKind::Video,
                    path,
                    AvError(ret).to_string(),
                ));
            }

            Ok(Self {
                ctx,
                codec,
                kind: StreamKind::Video,
                time_base: decoder.time_base(),
            })
        }
    }

    /// Open an audio encoder configured from the source decoder and the
    /// configured channel budget.
    pub fn open_audio(
        target: AudioCodec,
        decoder: &Decoder,
        channels: u8,
        bitrate_kbps: u32,
        global_header: bool,
        path: &Path,
    ) -> Result<Self> {
        let id = ids::audio_codec_id(target);
        unsafe {
            let codec = ffi::avcodec_find_encoder(id);
            if codec.is_null() {
                return Err(encoder_open_error(
                    StreamKind::Audio,
                    path,
                    format!("no encoder for {}", ids::codec_name(id)),
                ));
            }

            let mut ctx = ffi::avcodec_alloc_context3(codec);
            if ctx.is_null() {
                return Err(Error::Alloc {
                    what: "encoder context",
                });
            }

            let sample_rate = decoder.sample_rate().max(1);
            let channel_count = (channels as i32).min(decoder.channels().max(1) as i32);

            (*ctx).sample_fmt = first_sample_fmt(codec);
            (*ctx).sample_rate = sample_rate;
            ffi::av_channel_layout_default(&mut (*ctx).ch_layout, channel_count);
            (*ctx).bit_rate = decoder.bit_rate();
            if (*ctx).bit_rate == 0 {
                (*ctx).bit_rate = i64::from(bitrate_kbps) * 1000;
            }
            (*ctx).time_base = ffi::AVRational {
                num: 1,
                den: sample_rate,
            };
            if global_header {
                (*ctx).flags |= ffi::AV_CODEC_FLAG_GLOBAL_HEADER as i32;
            }

            let mut options = encoder_options(true);
            let ret = ffi::avcodec_open2(ctx, codec, &mut options);
            ffi::av_dict_free(&mut options);
            if ret < 0 {
                ffi::avcodec_free_context(&mut ctx);
                return Err(encoder_open_error(
                    StreamKind::Audio,
                    path,
                    AvError(ret).to_string(),
                ));
            }

            Ok(Self {
                ctx,
                codec,
                kind: StreamKind::Audio,
                time_base: TimeBase(Rational::new(1, sample_rate as i64)),
            })
        }
    }

    /// The role of the stream this encoder feeds.
    pub fn kind(&self) -> StreamKind {
        self.kind
    }

    /// The encoder's time base: the source stream's for video, one over
    /// the sample rate for audio.
    pub fn time_base(&self) -> TimeBase {
        self.time_base
    }

    /// Fixed frame size demanded by the codec, or zero when frames may be
    /// any length.
    pub fn frame_size(&self) -> i32 {
        unsafe { (*self.ctx).frame_size }
    }

    /// Push one filtered frame, or `None` to begin draining.
    pub fn send_frame(&mut self, frame: Option<&Frame>) -> CodecStatus {
        let ptr = frame.map_or(ptr::null(), Frame::as_ptr);
        CodecStatus::from_raw(unsafe { ffi::avcodec_send_frame(self.ctx, ptr) })
    }

    /// Pull one encoded packet.
    pub fn receive_packet(&mut self, packet: &mut Packet) -> CodecStatus {
        CodecStatus::from_raw(unsafe { ffi::avcodec_receive_packet(self.ctx, packet.as_mut_ptr()) })
    }

    /// Reset the encoder's internal buffers after draining.
    pub fn flush_buffers(&mut self) {
        unsafe { ffi::avcodec_flush_buffers(self.ctx) };
    }

    pub(crate) fn as_ptr(&self) -> *const ffi::AVCodecContext {
        self.ctx
    }

    pub(crate) fn codec_ptr(&self) -> *const ffi::AVCodec {
        self.codec
    }
}

impl Drop for Encoder {
    fn drop(&mut self) {
        unsafe { ffi::avcodec_free_context(&mut self.ctx) };
    }
}

/// Options applied to every encoder open: let the codec pick its thread
/// count, and allow the experimental-grade audio encoders the targets
/// require.
unsafe fn encoder_options(audio: bool) -> *mut ffi::AVDictionary {
    let mut dict: *mut ffi::AVDictionary = ptr::null_mut();
    let threads = CString::new("threads").expect("static key");
    let auto = CString::new("auto").expect("static value");
    ffi::av_dict_set(&mut dict, threads.as_ptr(), auto.as_ptr(), 0);
    if audio {
        let strict = CString::new("strict").expect("static key");
        let experimental = CString::new("experimental").expect("static value");
        ffi::av_dict_set(&mut dict, strict.as_ptr(), experimental.as_ptr(), 0);
    }
    dict
}

unsafe fn first_pix_fmt(codec: *const ffi::AVCodec) -> ffi::AVPixelFormat {
    let list = (*codec).pix_fmts;
    if list.is_null() || *list == ffi::AVPixelFormat::AV_PIX_FMT_NONE {
        ffi::AVPixelFormat::AV_PIX_FMT_YUV420P
    } else {
        *list
    }
}

unsafe fn first_sample_fmt(codec: *const ffi::AVCodec) -> ffi::AVSampleFormat {
    let list = (*codec).sample_fmts;
    if list.is_null() || *list == ffi::AVSampleFormat::AV_SAMPLE_FMT_NONE {
        ffi::AVSampleFormat::AV_SAMPLE_FMT_FLTP
    } else {
        *list
    }
}

pub(crate) fn to_av_rational(r: Rational) -> ffi::AVRational {
    ffi::AVRational {
        num: r.num as i32,
        den: r.den as i32,
    }
}

fn encoder_open_error(kind: StreamKind, path: &Path, detail: String) -> Error {
    Error::EncoderOpen {
        stream: kind.name(),
        path: path.to_path_buf(),
        detail,
    }
}
