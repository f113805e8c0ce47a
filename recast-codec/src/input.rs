//! Demuxer side of the adapter: open a container over custom I/O, probe
//! it, and read packets.

use crate::ids;
use crate::io::{self, MediaSource};
use crate::packet::Packet;
use crate::status::{AvError, CodecStatus};
use ffmpeg_sys_next as ffi;
use libc::c_void;
use recast_core::{Error, Rational, Result, StreamDesc, StreamKind, TimeBase, NOPTS};
use std::ffi::{CStr, CString};
use std::path::{Path, PathBuf};
use std::ptr;
use tracing::debug;

/// Analysis window handed to the probe step: a thousand times the
/// library's five-second default, so containers with distant keyframes
/// still report accurate durations.
const ANALYZE_WINDOW: i64 = 5_000_000 * 1000;

/// An open input container served through a [`MediaSource`].
pub struct InputContext {
    ctx: *mut ffi::AVFormatContext,
    pb: *mut ffi::AVIOContext,
    // Held alive behind a stable address for the I/O trampolines.
    _source: Box<MediaSource>,
    size: u64,
    path: PathBuf,
}

unsafe impl Send for InputContext {}

impl InputContext {
    /// Attach the byte stream, open the container and probe its streams.
    ///
    /// Callers must hold the library section guard (see
    /// [`crate::lock::library_section`]) across this call.
    pub fn open(path: &Path) -> Result<Self> {
        debug!("opening {} through custom io", path.display());
        let mut source = MediaSource::open(path)?;
        let size = source.len();
        let opaque = source.as_mut() as *mut MediaSource as *mut c_void;

        unsafe {
            let buffer = ffi::av_malloc(
                io::IO_BUFFER_SIZE + ffi::AV_INPUT_BUFFER_PADDING_SIZE as usize,
            ) as *mut u8;
            if buffer.is_null() {
                return Err(Error::Alloc { what: "io buffer" });
            }

            let mut pb = ffi::avio_alloc_context(
                buffer,
                io::IO_BUFFER_SIZE as i32,
                0,
                opaque,
                Some(io::read_trampoline),
                None,
                Some(io::seek_trampoline),
            );
            if pb.is_null() {
                ffi::av_free(buffer as *mut c_void);
                return Err(Error::Alloc { what: "io context" });
            }
            (*pb).seekable = 0;
            (*pb).write_flag = 0;

            let mut ctx = ffi::avformat_alloc_context();
            if ctx.is_null() {
                free_pb(&mut pb);
                return Err(Error::Alloc {
                    what: "input context",
                });
            }
            (*ctx).pb = pb;
            (*ctx).flags |= ffi::AVFMT_FLAG_CUSTOM_IO as i32;

            let c_path = path_cstring(path);
            let ret = ffi::avformat_open_input(&mut ctx, c_path.as_ptr(), ptr::null(), ptr::null_mut());
            if ret < 0 {
                // The library frees the context on failed open.
                free_pb(&mut pb);
                return Err(Error::Probe {
                    path: path.to_path_buf(),
                    detail: AvError(ret).to_string(),
                });
            }

            Ok(Self {
                ctx,
                pb,
                _source: source,
                size,
                path: path.to_path_buf(),
            })
        }
    }

    /// Analyze the container until codec parameters for every stream are
    /// known.
    pub fn find_stream_info(&mut self) -> Result<()> {
        unsafe {
            (*self.ctx).max_analyze_duration = ANALYZE_WINDOW;
            let ret = ffi::avformat_find_stream_info(self.ctx, ptr::null_mut());
            if ret < 0 {
                return Err(Error::Probe {
                    path: self.path.clone(),
                    detail: AvError(ret).to_string(),
                });
            }
            if (*self.ctx).nb_streams == 0 {
                return Err(Error::NoStreams {
                    path: self.path.clone(),
                });
            }
        }
        Ok(())
    }

    /// Owned descriptions of the audio, video and subtitle streams.
    pub fn streams(&self) -> Vec<StreamDesc> {
        let mut streams = Vec::new();
        unsafe {
            for index in 0..(*self.ctx).nb_streams as usize {
                let stream = *(*self.ctx).streams.add(index);
                let par = (*stream).codecpar;
                let kind = match (*par).codec_type {
                    ffi::AVMediaType::AVMEDIA_TYPE_AUDIO => StreamKind::Audio,
                    ffi::AVMediaType::AVMEDIA_TYPE_VIDEO => StreamKind::Video,
                    ffi::AVMediaType::AVMEDIA_TYPE_SUBTITLE => StreamKind::Subtitle,
                    _ => continue,
                };
                let start_time = match (*stream).start_time {
                    NOPTS => None,
                    value => Some(value),
                };
                streams.push(StreamDesc {
                    index,
                    kind,
                    codec: ids::codec_tag((*par).codec_id),
                    language: stream_language(stream),
                    channels: (*par).ch_layout.nb_channels.max(0) as u16,
                    time_base: stream_time_base(stream),
                    start_time,
                });
            }
        }
        streams
    }

    /// The library's preferred stream of the given kind, optionally
    /// biased toward a wanted index.
    pub fn best_stream(&self, kind: StreamKind, hint: Option<usize>) -> Option<usize> {
        let media_type = match kind {
            StreamKind::Audio => ffi::AVMediaType::AVMEDIA_TYPE_AUDIO,
            StreamKind::Video => ffi::AVMediaType::AVMEDIA_TYPE_VIDEO,
            StreamKind::Subtitle => ffi::AVMediaType::AVMEDIA_TYPE_SUBTITLE,
        };
        let wanted = hint.map_or(-1, |index| index as i32);
        let ret = unsafe {
            ffi::av_find_best_stream(self.ctx, media_type, wanted, -1, ptr::null_mut(), 0)
        };
        if ret >= 0 {
            Some(ret as usize)
        } else {
            None
        }
    }

    /// Demux the next packet.
    pub fn read_packet(&mut self, packet: &mut Packet) -> CodecStatus {
        CodecStatus::from_raw(unsafe { ffi::av_read_frame(self.ctx, packet.as_mut_ptr()) })
    }

    /// Current byte position of the demuxer in the input.
    pub fn position(&self) -> u64 {
        unsafe { (*self.pb).pos.max(0) as u64 }
    }

    /// Total input size in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// The path the input was opened from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub(crate) fn stream_ptr(&self, index: usize) -> *mut ffi::AVStream {
        unsafe {
            debug_assert!(index < (*self.ctx).nb_streams as usize);
            *(*self.ctx).streams.add(index)
        }
    }
}

impl Drop for InputContext {
    fn drop(&mut self) {
        unsafe {
            ffi::avformat_close_input(&mut self.ctx);
            free_pb(&mut self.pb);
        }
    }
}

/// Release a custom I/O context and the buffer the library may have
/// swapped in; both belong to the library allocator.
unsafe fn free_pb(pb: &mut *mut ffi::AVIOContext) {
    if pb.is_null() {
        return;
    }
    if !(**pb).buffer.is_null() {
        ffi::av_free((**pb).buffer as *mut c_void);
        (**pb).buffer = ptr::null_mut();
    }
    ffi::avio_context_free(pb);
}

pub(crate) fn stream_time_base(stream: *const ffi::AVStream) -> TimeBase {
    let tb = unsafe { (*stream).time_base };
    if tb.num <= 0 || tb.den <= 0 {
        TimeBase::MILLIS
    } else {
        TimeBase(Rational::new(tb.num as i64, tb.den as i64))
    }
}

fn stream_language(stream: *const ffi::AVStream) -> Option<String> {
    unsafe {
        let key = CString::new("language").expect("static key");
        let entry = ffi::av_dict_get((*stream).metadata, key.as_ptr(), ptr::null(), 0);
        if entry.is_null() || (*entry).value.is_null() {
            return None;
        }
        Some(
            CStr::from_ptr((*entry).value)
                .to_string_lossy()
                .to_lowercase(),
        )
    }
}

pub(crate) fn path_cstring(path: &Path) -> CString {
    let bytes: Vec<u8> = path
        .as_os_str()
        .as_encoded_bytes()
        .iter()
        .copied()
        .filter(|&b| b != 0)
        .collect();
    CString::new(bytes).expect("nul bytes removed")
}
