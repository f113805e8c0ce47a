//! Per-file stream planning.
//!
//! Given the stream table of an open input and the configuration, decide
//! which audio, video and subtitle streams participate and whether each
//! needs transcoding, copying or extraction. The logic is pure so the
//! decision matrix can be tested without touching the codec library.

use recast_core::{
    CodecTag, Configuration, Error, Result, StreamDesc, StreamKind,
};
use std::path::Path;
use tracing::debug;

/// What happens to a selected audio or video stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamAction {
    /// Re-encode to the configured codec.
    Transcode,
    /// Pass packets through unchanged.
    Copy,
}

/// A selected audio or video stream and its fate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamSelection {
    /// Container index of the selected stream.
    pub index: usize,
    pub action: StreamAction,
}

/// The subtitle side of the plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubtitlePlan {
    /// No subtitle work: extraction disabled or no subtitle stream.
    None,
    /// Extract the SubRip stream at this index to a sidecar file.
    Extract { index: usize },
    /// A subtitle stream was chosen but is not SubRip; log and skip,
    /// never fatal.
    NotSubrip { index: usize },
}

/// The per-file decision record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamPlan {
    pub audio: StreamSelection,
    pub video: StreamSelection,
    pub subtitle: SubtitlePlan,
}

impl StreamPlan {
    /// Decide what each stream needs.
    ///
    /// `best_video` is the demuxer's preferred video stream; without one
    /// the file fails. Audio and subtitle selection prefer the configured
    /// language and otherwise keep the first stream of their kind.
    pub fn analyze(
        path: &Path,
        streams: &[StreamDesc],
        best_video: Option<usize>,
        config: &Configuration,
    ) -> Result<Self> {
        let audio_index = select_by_language(
            streams,
            StreamKind::Audio,
            config.preferred_audio_language.iso_tag(),
        )
        .ok_or_else(|| Error::NoAudio {
            path: path.to_path_buf(),
        })?;

        let video_index = best_video.ok_or_else(|| Error::NoVideo {
            path: path.to_path_buf(),
            detail: "no stream of the kind exists".into(),
        })?;

        let audio_desc = desc(streams, audio_index);
        let audio_action = match audio_desc {
            Some(desc)
                if desc.codec.is_audio(config.audio_codec)
                    && desc.channels == u16::from(config.audio_channels_num) =>
            {
                StreamAction::Copy
            }
            _ => StreamAction::Transcode,
        };

        let video_action = match desc(streams, video_index) {
            Some(desc) if desc.codec.is_video(config.video_codec) => StreamAction::Copy,
            _ => StreamAction::Transcode,
        };

        let subtitle = if config.extract_subtitles {
            match select_by_language(
                streams,
                StreamKind::Subtitle,
                config.preferred_subtitle_language.iso_tag(),
            ) {
                Some(index) => match desc(streams, index) {
                    Some(d) if d.codec == CodecTag::Subrip => SubtitlePlan::Extract { index },
                    _ => SubtitlePlan::NotSubrip { index },
                },
                None => SubtitlePlan::None,
            }
        } else {
            SubtitlePlan::None
        };

        let plan = Self {
            audio: StreamSelection {
                index: audio_index,
                action: audio_action,
            },
            video: StreamSelection {
                index: video_index,
                action: video_action,
            },
            subtitle,
        };
        debug!(?plan, "stream plan for {}", path.display());
        Ok(plan)
    }

    /// Whether the file needs any work at all. A file needing none is
    /// reported as already in the correct format and skipped.
    pub fn needs_processing(&self) -> bool {
        self.audio.action == StreamAction::Transcode
            || self.video.action == StreamAction::Transcode
            || matches!(self.subtitle, SubtitlePlan::Extract { .. })
    }

    /// Whether a media output container is created. Subtitle-only work
    /// produces just the sidecar file.
    pub fn needs_media_output(&self) -> bool {
        self.audio.action == StreamAction::Transcode
            || self.video.action == StreamAction::Transcode
    }

    /// Human-readable summary of the work, e.g. "transcoding audio and
    /// video" or "extracting subtitles".
    pub fn summary(&self) -> Option<String> {
        let mut parts = Vec::new();
        if self.audio.action == StreamAction::Transcode {
            parts.push("audio");
        }
        if self.video.action == StreamAction::Transcode {
            parts.push("video");
        }
        let transcoding = !parts.is_empty();
        if matches!(self.subtitle, SubtitlePlan::Extract { .. }) {
            parts.push("extracting subtitles");
        }
        let joined = match parts.as_slice() {
            [] => return None,
            [one] => (*one).to_string(),
            [first, second] => format!("{first} and {second}"),
            [first, second, third] => format!("{first}, {second} and {third}"),
            _ => "unknown".to_string(),
        };
        Some(if transcoding {
            format!("transcoding {joined}")
        } else {
            joined
        })
    }
}

fn desc(streams: &[StreamDesc], index: usize) -> Option<&StreamDesc> {
    streams.iter().find(|s| s.index == index)
}

/// First stream of the kind, unless one matches the preferred language
/// tag.
fn select_by_language(
    streams: &[StreamDesc],
    kind: StreamKind,
    preferred: Option<&str>,
) -> Option<usize> {
    let mut selected = None;
    for stream in streams.iter().filter(|s| s.kind == kind) {
        if selected.is_none() {
            selected = Some(stream.index);
        }
        if let Some(tag) = preferred {
            if stream.language_is(tag) {
                return Some(stream.index);
            }
        }
    }
    selected
}

#[cfg(test)]
mod tests {
    use super::*;
    use recast_core::{AudioCodec, Language, TimeBase, VideoCodec};
    use std::path::PathBuf;

    fn stream(index: usize, kind: StreamKind, codec: CodecTag) -> StreamDesc {
        StreamDesc {
            index,
            kind,
            codec,
            language: None,
            channels: if kind == StreamKind::Audio { 2 } else { 0 },
            time_base: TimeBase::MILLIS,
            start_time: Some(0),
        }
    }

    fn with_language(mut desc: StreamDesc, tag: &str) -> StreamDesc {
        desc.language = Some(tag.to_string());
        desc
    }

    fn h264_aac_config() -> Configuration {
        Configuration {
            video_codec: VideoCodec::H264,
            audio_codec: AudioCodec::Aac,
            extract_subtitles: false,
            ..Configuration::default()
        }
    }

    fn path() -> PathBuf {
        PathBuf::from("/videos/sample.mkv")
    }

    #[test]
    fn test_matching_input_is_copied_and_skipped() {
        let streams = vec![
            stream(0, StreamKind::Video, CodecTag::Video(VideoCodec::H264)),
            stream(1, StreamKind::Audio, CodecTag::Audio(AudioCodec::Aac)),
        ];
        let plan = StreamPlan::analyze(&path(), &streams, Some(0), &h264_aac_config()).unwrap();
        assert_eq!(plan.audio.action, StreamAction::Copy);
        assert_eq!(plan.video.action, StreamAction::Copy);
        assert_eq!(plan.subtitle, SubtitlePlan::None);
        assert!(!plan.needs_processing());
        assert!(!plan.needs_media_output());
        assert_eq!(plan.summary(), None);
    }

    #[test]
    fn test_codec_mismatch_forces_transcode() {
        let streams = vec![
            stream(0, StreamKind::Video, CodecTag::Other("mpeg4".into())),
            stream(1, StreamKind::Audio, CodecTag::Other("mp3".into())),
        ];
        let plan = StreamPlan::analyze(&path(), &streams, Some(0), &h264_aac_config()).unwrap();
        assert_eq!(plan.audio.action, StreamAction::Transcode);
        assert_eq!(plan.video.action, StreamAction::Transcode);
        assert!(plan.needs_processing());
        assert!(plan.needs_media_output());
        assert_eq!(plan.summary().unwrap(), "transcoding audio and video");
    }

    #[test]
    fn test_channel_mismatch_forces_audio_transcode() {
        let mut audio = stream(1, StreamKind::Audio, CodecTag::Audio(AudioCodec::Aac));
        audio.channels = 6;
        let streams = vec![
            stream(0, StreamKind::Video, CodecTag::Video(VideoCodec::H264)),
            audio,
        ];
        let plan = StreamPlan::analyze(&path(), &streams, Some(0), &h264_aac_config()).unwrap();
        assert_eq!(plan.audio.action, StreamAction::Transcode);
        assert_eq!(plan.video.action, StreamAction::Copy);
        assert_eq!(plan.summary().unwrap(), "transcoding audio");
    }

    #[test]
    fn test_language_preference_overrides_first_audio() {
        let streams = vec![
            stream(0, StreamKind::Video, CodecTag::Video(VideoCodec::H264)),
            with_language(
                stream(1, StreamKind::Audio, CodecTag::Audio(AudioCodec::Aac)),
                "jpn",
            ),
            with_language(
                stream(2, StreamKind::Audio, CodecTag::Audio(AudioCodec::Aac)),
                "spa",
            ),
        ];
        let mut config = h264_aac_config();
        config.preferred_audio_language = Language::Spanish;
        let plan = StreamPlan::analyze(&path(), &streams, Some(0), &config).unwrap();
        assert_eq!(plan.audio.index, 2);

        config.preferred_audio_language = Language::English;
        let plan = StreamPlan::analyze(&path(), &streams, Some(0), &config).unwrap();
        assert_eq!(plan.audio.index, 1, "no match keeps the first stream");
    }

    #[test]
    fn test_missing_audio_is_fatal() {
        let streams = vec![stream(0, StreamKind::Video, CodecTag::Video(VideoCodec::H264))];
        let err = StreamPlan::analyze(&path(), &streams, Some(0), &h264_aac_config()).unwrap_err();
        assert!(matches!(err, Error::NoAudio { .. }));
    }

    #[test]
    fn test_missing_video_is_fatal() {
        let streams = vec![stream(0, StreamKind::Audio, CodecTag::Audio(AudioCodec::Aac))];
        let err = StreamPlan::analyze(&path(), &streams, None, &h264_aac_config()).unwrap_err();
        assert!(matches!(err, Error::NoVideo { .. }));
    }

    #[test]
    fn test_subrip_subtitle_is_extracted() {
        let streams = vec![
            stream(0, StreamKind::Video, CodecTag::Video(VideoCodec::H264)),
            stream(1, StreamKind::Audio, CodecTag::Audio(AudioCodec::Aac)),
            stream(2, StreamKind::Subtitle, CodecTag::Subrip),
        ];
        let mut config = h264_aac_config();
        config.extract_subtitles = true;
        let plan = StreamPlan::analyze(&path(), &streams, Some(0), &config).unwrap();
        assert_eq!(plan.subtitle, SubtitlePlan::Extract { index: 2 });
        assert!(plan.needs_processing());
        assert!(!plan.needs_media_output(), "subtitle-only work has no media output");
        assert_eq!(plan.summary().unwrap(), "extracting subtitles");
    }

    #[test]
    fn test_non_subrip_subtitle_is_skipped_not_fatal() {
        let streams = vec![
            stream(0, StreamKind::Video, CodecTag::Video(VideoCodec::H264)),
            stream(1, StreamKind::Audio, CodecTag::Audio(AudioCodec::Aac)),
            stream(2, StreamKind::Subtitle, CodecTag::Other("ass".into())),
        ];
        let mut config = h264_aac_config();
        config.extract_subtitles = true;
        let plan = StreamPlan::analyze(&path(), &streams, Some(0), &config).unwrap();
        assert_eq!(plan.subtitle, SubtitlePlan::NotSubrip { index: 2 });
        assert!(!plan.needs_processing());
    }

    #[test]
    fn test_subtitle_language_preference() {
        let streams = vec![
            stream(0, StreamKind::Video, CodecTag::Video(VideoCodec::H264)),
            stream(1, StreamKind::Audio, CodecTag::Audio(AudioCodec::Aac)),
            with_language(stream(2, StreamKind::Subtitle, CodecTag::Subrip), "spa"),
            with_language(stream(3, StreamKind::Subtitle, CodecTag::Subrip), "eng"),
        ];
        let mut config = h264_aac_config();
        config.extract_subtitles = true;
        config.preferred_subtitle_language = Language::English;
        let plan = StreamPlan::analyze(&path(), &streams, Some(0), &config).unwrap();
        assert_eq!(plan.subtitle, SubtitlePlan::Extract { index: 3 });
    }

    #[test]
    fn test_summary_with_all_three_parts() {
        let streams = vec![
            stream(0, StreamKind::Video, CodecTag::Other("mpeg2video".into())),
            stream(1, StreamKind::Audio, CodecTag::Other("ac3".into())),
            stream(2, StreamKind::Subtitle, CodecTag::Subrip),
        ];
        let mut config = h264_aac_config();
        config.extract_subtitles = true;
        let plan = StreamPlan::analyze(&path(), &streams, Some(0), &config).unwrap();
        assert_eq!(
            plan.summary().unwrap(),
            "transcoding audio, video and extracting subtitles"
        );
    }

    #[test]
    fn test_best_video_hint_wins_over_first() {
        let streams = vec![
            stream(0, StreamKind::Video, CodecTag::Other("mjpeg".into())),
            stream(1, StreamKind::Video, CodecTag::Video(VideoCodec::H264)),
            stream(2, StreamKind::Audio, CodecTag::Audio(AudioCodec::Aac)),
        ];
        let plan = StreamPlan::analyze(&path(), &streams, Some(1), &h264_aac_config()).unwrap();
        assert_eq!(plan.video.index, 1);
        assert_eq!(plan.video.action, StreamAction::Copy);
    }
}
