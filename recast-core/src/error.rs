//! Error types for the recast transcoder.
//!
//! Every failure is per-file unless noted otherwise: a pipeline that hits
//! one of these reports it on its event channel, cleans up and terminates
//! without affecting other running pipelines. Configuration errors are the
//! exception; they reject the whole job set before any pipeline starts.

use std::path::PathBuf;
use thiserror::Error;

/// Configuration errors, raised before any pipeline starts.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The configured video/audio codec pair is not permitted.
    #[error("codec pair {video}+{audio} is not supported (VP8/VP9 pair with Vorbis, H.264/H.265 with AAC)")]
    InvalidCodecPair { video: String, audio: String },

    /// Audio channel count outside the accepted range.
    #[error("audio channel count {0} is outside the accepted range [2, 7]")]
    ChannelsOutOfRange(u8),
}

/// Main error type for the recast transcoder.
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid configuration; rejects the whole job set.
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// The input file exists but cannot be opened for reading.
    #[error("can't open '{path}' for reading: {source}")]
    IoOpen {
        path: PathBuf,
        source: std::io::Error,
    },

    /// An output file cannot be created or written.
    #[error("can't write '{path}': {source}")]
    IoWrite {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A partial output file could not be removed during cleanup.
    #[error("can't remove '{path}': {source}")]
    IoRemove {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A target output file already exists.
    #[error("output file '{path}' already exists")]
    OutputExists { path: PathBuf },

    /// The demuxer could not open or analyze the input.
    #[error("can't probe '{path}': {detail}")]
    Probe { path: PathBuf, detail: String },

    /// The container holds no streams at all.
    #[error("'{path}' contains no streams")]
    NoStreams { path: PathBuf },

    /// No audio stream could be selected.
    #[error("no suitable audio stream in '{path}'")]
    NoAudio { path: PathBuf },

    /// No video stream could be selected.
    #[error("no video stream in '{path}': {detail}")]
    NoVideo { path: PathBuf, detail: String },

    /// A decoder could not be found or opened.
    #[error("can't open {stream} decoder for '{path}': {detail}")]
    DecoderOpen {
        stream: &'static str,
        path: PathBuf,
        detail: String,
    },

    /// An encoder could not be found or opened.
    #[error("can't open {stream} encoder for '{path}': {detail}")]
    EncoderOpen {
        stream: &'static str,
        path: PathBuf,
        detail: String,
    },

    /// Codec parameters could not be copied between contexts.
    #[error("can't copy {stream} codec parameters for '{path}': {detail}")]
    ParamCopy {
        stream: &'static str,
        path: PathBuf,
        detail: String,
    },

    /// A filter or filter graph could not be allocated or initialized.
    #[error("can't build {stream} filter graph for '{path}': {detail}")]
    FilterBuild {
        stream: &'static str,
        path: PathBuf,
        detail: String,
    },

    /// Filters could not be connected.
    #[error("can't connect {stream} filters for '{path}': {detail}")]
    FilterLink {
        stream: &'static str,
        path: PathBuf,
        detail: String,
    },

    /// The assembled filter graph failed configuration.
    #[error("can't configure {stream} filter graph for '{path}': {detail}")]
    FilterConfig {
        stream: &'static str,
        path: PathBuf,
        detail: String,
    },

    /// Sending a packet to a decoder failed.
    #[error("error sending packet to {stream} decoder for '{path}': {detail}")]
    PacketSend {
        stream: &'static str,
        path: PathBuf,
        detail: String,
    },

    /// Receiving a frame from a decoder or filter sink failed.
    #[error("error receiving {stream} frame for '{path}': {detail}")]
    FrameReceive {
        stream: &'static str,
        path: PathBuf,
        detail: String,
    },

    /// Sending a frame to a filter source or encoder failed.
    #[error("error sending {stream} frame for '{path}': {detail}")]
    FrameSend {
        stream: &'static str,
        path: PathBuf,
        detail: String,
    },

    /// Receiving a packet from an encoder failed.
    #[error("error receiving packet from {stream} encoder for '{path}': {detail}")]
    PacketReceive {
        stream: &'static str,
        path: PathBuf,
        detail: String,
    },

    /// The output container could not be allocated or its header written.
    #[error("can't create output container '{path}': {detail}")]
    OutputCreate { path: PathBuf, detail: String },

    /// The muxer rejected a packet.
    #[error("error writing {stream} packet to output for '{path}': {detail}")]
    Mux {
        stream: &'static str,
        path: PathBuf,
        detail: String,
    },

    /// The container trailer could not be written.
    #[error("can't write trailer for '{path}': {detail}")]
    Trailer { path: PathBuf, detail: String },

    /// The subtitle side path failed.
    #[error("can't write subtitle file '{path}': {detail}")]
    SubtitleWrite { path: PathBuf, detail: String },

    /// A codec-library allocation failed.
    #[error("codec library allocation failed: {what}")]
    Alloc { what: &'static str },

    /// The job was cancelled. Not a failure; a distinct terminal state.
    #[error("cancelled")]
    Cancelled,
}

impl Error {
    /// Check whether this is the cancellation sentinel rather than a
    /// failure.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }

    /// Check whether this error rejects the whole job set rather than a
    /// single file.
    #[must_use]
    pub fn is_global(&self) -> bool {
        matches!(self, Error::Config(_))
    }
}

/// Result type alias using the recast error type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_carries_path() {
        let err = Error::OutputExists {
            path: PathBuf::from("/tmp/movie.avi.mp4"),
        };
        assert_eq!(
            err.to_string(),
            "output file '/tmp/movie.avi.mp4' already exists"
        );
    }

    #[test]
    fn test_config_error_conversion() {
        let err: Error = ConfigError::ChannelsOutOfRange(9).into();
        assert!(err.is_global());
        assert!(!err.is_cancelled());
    }

    #[test]
    fn test_cancelled_is_not_global() {
        assert!(Error::Cancelled.is_cancelled());
        assert!(!Error::Cancelled.is_global());
    }
}
