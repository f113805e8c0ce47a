//! # Recast Pipeline
//!
//! The per-file transcoding pipeline: decide what each stream needs, then
//! drive demux → decode → filter → encode → mux with a subtitle side path.
//!
//! A pipeline runs synchronously on its own thread, reports to its host
//! through an event channel, polls a shared stop flag at every packet
//! boundary, and releases every codec resource on any exit path.

pub mod plan;
pub mod srt;

mod pipeline;

pub use pipeline::{PipelineState, TranscodingPipeline};
pub use plan::{StreamAction, StreamPlan, StreamSelection, SubtitlePlan};
pub use srt::SrtWriter;
