//! Codec profiles.
//!
//! A profile is a plain value describing the target codec family. Anything
//! codec-specific the pipeline needs (the output extension, the companion
//! audio codec) is a pure function of it.

use crate::config::{AudioCodec, VideoCodec};
use std::fmt;

/// Target codec profile for one transcoding run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CodecProfile {
    video: VideoCodec,
}

impl CodecProfile {
    /// Profile for the given target video codec.
    pub fn new(video: VideoCodec) -> Self {
        Self { video }
    }

    /// The target video codec.
    pub fn video_codec(&self) -> VideoCodec {
        self.video
    }

    /// The audio codec that pairs with this video codec.
    pub fn companion_audio(&self) -> AudioCodec {
        match self.video {
            VideoCodec::Vp8 | VideoCodec::Vp9 => AudioCodec::Vorbis,
            VideoCodec::H264 | VideoCodec::H265 => AudioCodec::Aac,
        }
    }

    /// Extension appended to the source file name to form the output file
    /// name, dot included.
    pub fn output_extension(&self) -> &'static str {
        match self.video {
            VideoCodec::Vp8 => ".vp8",
            VideoCodec::Vp9 => ".vp9",
            VideoCodec::H264 | VideoCodec::H265 => ".mp4",
        }
    }

    /// Container format name used when the extension alone is ambiguous to
    /// the muxer. The VP-family outputs are WebM in disguise.
    pub fn container_name(&self) -> &'static str {
        match self.video {
            VideoCodec::Vp8 | VideoCodec::Vp9 => "webm",
            VideoCodec::H264 | VideoCodec::H265 => "mp4",
        }
    }
}

impl From<VideoCodec> for CodecProfile {
    fn from(video: VideoCodec) -> Self {
        Self::new(video)
    }
}

impl fmt::Display for CodecProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}+{}", self.video, self.companion_audio())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_follows_video_codec() {
        assert_eq!(CodecProfile::new(VideoCodec::Vp8).output_extension(), ".vp8");
        assert_eq!(CodecProfile::new(VideoCodec::Vp9).output_extension(), ".vp9");
        assert_eq!(CodecProfile::new(VideoCodec::H264).output_extension(), ".mp4");
        assert_eq!(CodecProfile::new(VideoCodec::H265).output_extension(), ".mp4");
    }

    #[test]
    fn test_companion_audio() {
        assert_eq!(
            CodecProfile::new(VideoCodec::Vp9).companion_audio(),
            AudioCodec::Vorbis
        );
        assert_eq!(
            CodecProfile::new(VideoCodec::H265).companion_audio(),
            AudioCodec::Aac
        );
    }

    #[test]
    fn test_container_name() {
        assert_eq!(CodecProfile::new(VideoCodec::Vp8).container_name(), "webm");
        assert_eq!(CodecProfile::new(VideoCodec::H264).container_name(), "mp4");
    }
}
