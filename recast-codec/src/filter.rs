//! Filter graphs bridging decoder output to encoder input.
//!
//! Audio runs through `abuffer → aformat → abuffersink`, video through
//! `buffer → format → buffersink`. Graphs are allocated, wired linearly
//! and configured; any failure is fatal to the file being processed.
//!
//! Some containers declare malformed audio channel layouts. Source-filter
//! initialization therefore walks a ladder: the decoder's declared layout
//! first, then the default layout for the decoder's channel count, and as
//! a last resort the layout is forced onto the filter's option object
//! directly before initialization.

use crate::decoder::Decoder;
use crate::encoder::Encoder;
use crate::frame::Frame;
use crate::status::{AvError, CodecStatus};
use ffmpeg_sys_next as ffi;
use libc::{c_char, c_void};
use recast_core::{Error, Result, StreamKind, TimeBase};
use std::ffi::{CStr, CString};
use std::path::Path;
use std::ptr;
use tracing::debug;

/// A configured filter graph with one source and one sink.
pub struct FilterGraph {
    graph: *mut ffi::AVFilterGraph,
    src: *mut ffi::AVFilterContext,
    sink: *mut ffi::AVFilterContext,
}

unsafe impl Send for FilterGraph {}

impl FilterGraph {
    /// Build the audio graph for one transcoded stream.
    pub fn audio(decoder: &Decoder, encoder: &Encoder, path: &Path) -> Result<Self> {
        let kind = StreamKind::Audio;
        unsafe {
            let mut builder = Builder::new(kind, path)?;

            let dec = decoder.as_ptr();
            let enc = encoder.as_ptr();
            let sample_fmt = sample_fmt_name((*dec).sample_fmt);
            let time_base = decoder.time_base();
            let sample_rate = (*dec).sample_rate;

            // Layout ladder: declared, then default for the channel count.
            let mut candidates = Vec::new();
            if ffi::av_channel_layout_check(&(*dec).ch_layout) != 0 {
                if let Some(desc) = describe_layout(&(*dec).ch_layout) {
                    candidates.push(desc);
                }
            }
            let mut default_layout = default_channel_layout((*dec).ch_layout.nb_channels.max(1));
            if let Some(desc) = describe_layout(&default_layout) {
                if !candidates.contains(&desc) {
                    candidates.push(desc);
                }
            }

            let mut src = ptr::null_mut();
            for layout in &candidates {
                let args = audio_source_args(
                    &sample_fmt,
                    time_base,
                    sample_rate,
                    layout,
                );
                match builder.init_filter("abuffer", "src", Some(&args)) {
                    Ok(ctx) => {
                        src = ctx;
                        break;
                    }
                    Err(_) => continue,
                }
            }
            if src.is_null() {
                // Last rung: force the layout onto the option object before
                // initializing the filter.
                debug!(
                    "declared channel layout rejected for {}, forcing the default",
                    path.display()
                );
                let ctx = builder.alloc_filter("abuffer", "src")?;
                set_str_option(ctx, "sample_fmt", &sample_fmt);
                set_str_option(
                    ctx,
                    "time_base",
                    &format!("{}/{}", time_base.0.num, time_base.0.den),
                );
                set_str_option(ctx, "sample_rate", &sample_rate.to_string());
                let name = CString::new("channel_layout").expect("static option");
                ffi::av_opt_set_chlayout(
                    ctx as *mut c_void,
                    name.as_ptr(),
                    &default_layout,
                    ffi::AV_OPT_SEARCH_CHILDREN as i32,
                );
                let ret = ffi::avfilter_init_str(ctx, ptr::null());
                if ret < 0 {
                    ffi::av_channel_layout_uninit(&mut default_layout);
                    return Err(builder.build_error(AvError(ret).to_string()));
                }
                src = ctx;
            }
            ffi::av_channel_layout_uninit(&mut default_layout);

            let enc_layout = describe_layout(&(*enc).ch_layout).unwrap_or_else(|| "stereo".into());
            let format_args = audio_format_args(
                &sample_fmt_name((*enc).sample_fmt),
                (*enc).sample_rate,
                &enc_layout,
            );
            let format = builder.init_filter("aformat", "aformat", Some(&format_args))?;
            let sink = builder.init_filter("abuffersink", "sink", None)?;

            builder.link(src, format)?;
            builder.link(format, sink)?;
            builder.configure()?;

            Ok(Self {
                graph: builder.take(),
                src,
                sink,
            })
        }
    }

    /// Build the video graph for one transcoded stream.
    pub fn video(decoder: &Decoder, encoder: &Encoder, path: &Path) -> Result<Self> {
        unsafe {
            let mut builder = Builder::new(StreamKind::Video, path)?;

            let dec = decoder.as_ptr();
            let enc = encoder.as_ptr();
            let sar = (*dec).sample_aspect_ratio;
            let args = video_source_args(
                (*dec).width,
                (*dec).height,
                &pix_fmt_name((*dec).pix_fmt),
                decoder.time_base(),
                if sar.num > 0 && sar.den > 0 {
                    (sar.num, sar.den)
                } else {
                    (0, 1)
                },
            );
            let src = builder.init_filter("buffer", "src", Some(&args))?;

            let format_args = format!("pix_fmts={}", pix_fmt_name((*enc).pix_fmt));
            let format = builder.init_filter("format", "format", Some(&format_args))?;
            let sink = builder.init_filter("buffersink", "sink", None)?;

            builder.link(src, format)?;
            builder.link(format, sink)?;
            builder.configure()?;

            Ok(Self {
                graph: builder.take(),
                src,
                sink,
            })
        }
    }

    /// Push one decoded frame into the source filter, or `None` to signal
    /// end of stream.
    pub fn push(&mut self, frame: Option<&mut Frame>) -> CodecStatus {
        let ptr = frame.map_or(ptr::null_mut(), Frame::as_mut_ptr);
        CodecStatus::from_raw(unsafe { ffi::av_buffersrc_add_frame(self.src, ptr) })
    }

    /// Pull one filtered frame from the sink.
    pub fn pull_frame(&mut self, frame: &mut Frame) -> CodecStatus {
        CodecStatus::from_raw(unsafe {
            ffi::av_buffersink_get_frame(self.sink, frame.as_mut_ptr())
        })
    }

    /// Pull exactly `samples` audio samples from the sink, for encoders
    /// with a fixed frame size.
    pub fn pull_samples(&mut self, frame: &mut Frame, samples: i32) -> CodecStatus {
        CodecStatus::from_raw(unsafe {
            ffi::av_buffersink_get_samples(self.sink, frame.as_mut_ptr(), samples)
        })
    }
}

impl Drop for FilterGraph {
    fn drop(&mut self) {
        unsafe { ffi::avfilter_graph_free(&mut self.graph) };
    }
}

/// Incremental graph construction with the error context on hand.
struct Builder<'a> {
    graph: *mut ffi::AVFilterGraph,
    kind: StreamKind,
    path: &'a Path,
}

impl<'a> Builder<'a> {
    unsafe fn new(kind: StreamKind, path: &'a Path) -> Result<Self> {
        let graph = ffi::avfilter_graph_alloc();
        if graph.is_null() {
            return Err(Error::Alloc {
                what: "filter graph",
            });
        }
        Ok(Self { graph, kind, path })
    }

    unsafe fn alloc_filter(
        &mut self,
        filter: &str,
        name: &str,
    ) -> Result<*mut ffi::AVFilterContext> {
        let c_filter = CString::new(filter).expect("static filter name");
        let definition = ffi::avfilter_get_by_name(c_filter.as_ptr());
        if definition.is_null() {
            return Err(self.build_error(format!("filter '{filter}' unavailable")));
        }
        let c_name = CString::new(name).expect("static instance name");
        let ctx = ffi::avfilter_graph_alloc_filter(self.graph, definition, c_name.as_ptr());
        if ctx.is_null() {
            return Err(self.build_error(format!("can't allocate '{filter}'")));
        }
        Ok(ctx)
    }

    /// Allocate and initialize a filter in one step; a failed
    /// initialization releases the half-built filter so the caller may
    /// retry with different arguments.
    unsafe fn init_filter(
        &mut self,
        filter: &str,
        name: &str,
        args: Option<&str>,
    ) -> Result<*mut ffi::AVFilterContext> {
        let ctx = self.alloc_filter(filter, name)?;
        let c_args = args.map(|a| CString::new(a).expect("no interior nul in filter args"));
        let ret = ffi::avfilter_init_str(
            ctx,
            c_args.as_ref().map_or(ptr::null(), |a| a.as_ptr()),
        );
        if ret < 0 {
            ffi::avfilter_free(ctx);
            return Err(self.build_error(format!("'{filter}': {}", AvError(ret))));
        }
        Ok(ctx)
    }

    unsafe fn link(
        &mut self,
        from: *mut ffi::AVFilterContext,
        to: *mut ffi::AVFilterContext,
    ) -> Result<()> {
        let ret = ffi::avfilter_link(from, 0, to, 0);
        if ret < 0 {
            return Err(Error::FilterLink {
                stream: self.kind.name(),
                path: self.path.to_path_buf(),
                detail: AvError(ret).to_string(),
            });
        }
        Ok(())
    }

    unsafe fn configure(&mut self) -> Result<()> {
        let ret = ffi::avfilter_graph_config(self.graph, ptr::null_mut());
        if ret < 0 {
            return Err(Error::FilterConfig {
                stream: self.kind.name(),
                path: self.path.to_path_buf(),
                detail: AvError(ret).to_string(),
            });
        }
        Ok(())
    }

    fn build_error(&self, detail: String) -> Error {
        Error::FilterBuild {
            stream: self.kind.name(),
            path: self.path.to_path_buf(),
            detail,
        }
    }

    /// Hand the graph to the finished [`FilterGraph`]; after this the
    /// builder must not free it.
    fn take(&mut self) -> *mut ffi::AVFilterGraph {
        std::mem::replace(&mut self.graph, ptr::null_mut())
    }
}

impl Drop for Builder<'_> {
    fn drop(&mut self) {
        if !self.graph.is_null() {
            unsafe { ffi::avfilter_graph_free(&mut self.graph) };
        }
    }
}

fn audio_source_args(sample_fmt: &str, time_base: TimeBase, rate: i32, layout: &str) -> String {
    format!(
        "sample_fmt={}:time_base={}/{}:sample_rate={}:channel_layout={}",
        sample_fmt, time_base.0.num, time_base.0.den, rate, layout
    )
}

fn audio_format_args(sample_fmt: &str, rate: i32, layout: &str) -> String {
    format!(
        "sample_fmts={}:sample_rates={}:channel_layouts={}",
        sample_fmt, rate, layout
    )
}

fn video_source_args(
    width: i32,
    height: i32,
    pix_fmt: &str,
    time_base: TimeBase,
    sar: (i32, i32),
) -> String {
    format!(
        "width={}:height={}:pix_fmt={}:time_base={}/{}:pixel_aspect={}/{}",
        width, height, pix_fmt, time_base.0.num, time_base.0.den, sar.0, sar.1
    )
}

unsafe fn set_str_option(ctx: *mut ffi::AVFilterContext, name: &str, value: &str) {
    let c_name = CString::new(name).expect("static option name");
    let c_value = CString::new(value).expect("no interior nul in option value");
    ffi::av_opt_set(
        ctx as *mut c_void,
        c_name.as_ptr(),
        c_value.as_ptr(),
        ffi::AV_OPT_SEARCH_CHILDREN as i32,
    );
}

unsafe fn default_channel_layout(channels: i32) -> ffi::AVChannelLayout {
    let mut layout: ffi::AVChannelLayout = std::mem::zeroed();
    ffi::av_channel_layout_default(&mut layout, channels);
    layout
}

fn describe_layout(layout: *const ffi::AVChannelLayout) -> Option<String> {
    let mut buffer = [0 as c_char; 128];
    unsafe {
        let ret = ffi::av_channel_layout_describe(layout, buffer.as_mut_ptr(), buffer.len());
        if ret < 0 {
            return None;
        }
        Some(
            CStr::from_ptr(buffer.as_ptr())
                .to_string_lossy()
                .into_owned(),
        )
    }
}

fn sample_fmt_name(fmt: ffi::AVSampleFormat) -> String {
    unsafe {
        let name = ffi::av_get_sample_fmt_name(fmt);
        if name.is_null() {
            "fltp".to_string()
        } else {
            CStr::from_ptr(name).to_string_lossy().into_owned()
        }
    }
}

fn pix_fmt_name(fmt: ffi::AVPixelFormat) -> String {
    unsafe {
        let name = ffi::av_get_pix_fmt_name(fmt);
        if name.is_null() {
            "yuv420p".to_string()
        } else {
            CStr::from_ptr(name).to_string_lossy().into_owned()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use recast_core::Rational;

    #[test]
    fn test_audio_source_args_shape() {
        let args = audio_source_args(
            "fltp",
            TimeBase(Rational::new(1, 48000)),
            48000,
            "5.1",
        );
        assert_eq!(
            args,
            "sample_fmt=fltp:time_base=1/48000:sample_rate=48000:channel_layout=5.1"
        );
    }

    #[test]
    fn test_audio_format_args_shape() {
        assert_eq!(
            audio_format_args("s16", 44100, "stereo"),
            "sample_fmts=s16:sample_rates=44100:channel_layouts=stereo"
        );
    }

    #[test]
    fn test_video_source_args_shape() {
        let args = video_source_args(
            1920,
            1080,
            "yuv420p",
            TimeBase(Rational::new(1, 1000)),
            (0, 1),
        );
        assert_eq!(
            args,
            "width=1920:height=1080:pix_fmt=yuv420p:time_base=1/1000:pixel_aspect=0/1"
        );
    }
}
