//! # Recast Codec
//!
//! A thin, typed facade over the FFmpeg libraries (`libavformat`,
//! `libavcodec`, `libavfilter`, `libavutil`) exposing only the verbs the
//! transcoding pipeline needs: open a container over a custom byte stream,
//! find decoders and encoders, build filter graphs, push and pull packets
//! and frames, rescale timestamps, and write output containers.
//!
//! Raw `AV*` types never leave this crate. Every wrapper owns the resources
//! it allocates and releases them on drop, so a pipeline that unwinds early
//! leaks nothing.
//!
//! The library's non-reentrant paths (opening inputs, probing, allocating
//! output contexts) are serialized process-wide through the [`lock`]
//! module.

pub mod decoder;
pub mod encoder;
pub mod filter;
pub mod frame;
pub mod ids;
pub mod input;
pub mod io;
pub mod lock;
pub mod output;
pub mod packet;
mod status;

pub use decoder::Decoder;
pub use encoder::Encoder;
pub use filter::FilterGraph;
pub use frame::Frame;
pub use input::InputContext;
pub use io::MediaSource;
pub use lock::{library_section, LockManager, LockOp};
pub use output::{OutStream, OutputContext};
pub use packet::Packet;
pub use status::{AvError, CodecStatus};
