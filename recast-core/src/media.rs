//! Stream descriptions.
//!
//! The codec adapter reduces each input stream to one of these owned
//! records so the planning logic can run without touching library types.

use crate::config::{AudioCodec, VideoCodec};
use crate::rational::TimeBase;
use std::fmt;

/// The role of a stream inside a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamKind {
    Audio,
    Video,
    Subtitle,
}

impl StreamKind {
    /// Lowercase name used in log and error messages.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Audio => "audio",
            Self::Video => "video",
            Self::Subtitle => "subtitle",
        }
    }
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What a stream is encoded as, reduced to the cases the planner cares
/// about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodecTag {
    /// A video codec recast can target.
    Video(VideoCodec),
    /// An audio codec recast can target.
    Audio(AudioCodec),
    /// SubRip text subtitles.
    Subrip,
    /// Anything else, carrying the library's codec name.
    Other(String),
}

impl CodecTag {
    /// Whether this stream is already encoded as the given video codec.
    pub fn is_video(&self, codec: VideoCodec) -> bool {
        matches!(self, Self::Video(v) if *v == codec)
    }

    /// Whether this stream is already encoded as the given audio codec.
    pub fn is_audio(&self, codec: AudioCodec) -> bool {
        matches!(self, Self::Audio(a) if *a == codec)
    }
}

impl fmt::Display for CodecTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Video(v) => write!(f, "{v}"),
            Self::Audio(a) => write!(f, "{a}"),
            Self::Subrip => write!(f, "SubRip"),
            Self::Other(name) => f.write_str(name),
        }
    }
}

/// One input stream as reported by the demuxer.
#[derive(Debug, Clone)]
pub struct StreamDesc {
    /// Index of the stream inside the container.
    pub index: usize,
    /// Stream role.
    pub kind: StreamKind,
    /// Codec the stream is encoded with.
    pub codec: CodecTag,
    /// `language` metadata tag, lowercased, if present.
    pub language: Option<String>,
    /// Channel count; zero for non-audio streams.
    pub channels: u16,
    /// The stream's time base.
    pub time_base: TimeBase,
    /// Timestamp of the first frame in the stream's own time base.
    pub start_time: Option<i64>,
}

impl StreamDesc {
    /// Whether the stream's language tag matches the given ISO tag.
    pub fn language_is(&self, tag: &str) -> bool {
        self.language.as_deref() == Some(tag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codec_tag_matching() {
        assert!(CodecTag::Video(VideoCodec::H264).is_video(VideoCodec::H264));
        assert!(!CodecTag::Video(VideoCodec::H264).is_video(VideoCodec::Vp9));
        assert!(CodecTag::Audio(AudioCodec::Aac).is_audio(AudioCodec::Aac));
        assert!(!CodecTag::Subrip.is_audio(AudioCodec::Aac));
        assert!(!CodecTag::Other("mp3".into()).is_audio(AudioCodec::Aac));
    }

    #[test]
    fn test_language_matching() {
        let desc = StreamDesc {
            index: 1,
            kind: StreamKind::Audio,
            codec: CodecTag::Audio(AudioCodec::Aac),
            language: Some("eng".into()),
            channels: 2,
            time_base: TimeBase::MILLIS,
            start_time: None,
        };
        assert!(desc.language_is("eng"));
        assert!(!desc.language_is("spa"));
    }
}
