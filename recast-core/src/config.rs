//! The transcoder configuration record.
//!
//! The configuration is loaded by the host (CLI), validated once, and then
//! handed to the core by value. Pipelines never mutate it.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Target video codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoCodec {
    Vp8,
    Vp9,
    H264,
    H265,
}

impl fmt::Display for VideoCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Vp8 => write!(f, "VP8"),
            Self::Vp9 => write!(f, "VP9"),
            Self::H264 => write!(f, "H.264"),
            Self::H265 => write!(f, "H.265"),
        }
    }
}

/// Target audio codec.
///
/// Only Vorbis and AAC are permitted outputs; which one is legal follows
/// from the video codec family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioCodec {
    Vorbis,
    Aac,
}

impl fmt::Display for AudioCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Vorbis => write!(f, "Vorbis"),
            Self::Aac => write!(f, "AAC"),
        }
    }
}

/// Preferred track language for audio and subtitle selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    /// No preference; the first stream of the kind wins.
    #[default]
    Default,
    English,
    Spanish,
}

impl Language {
    /// The ISO 639-2 tag used in container metadata, if any.
    pub fn iso_tag(&self) -> Option<&'static str> {
        match self {
            Self::Default => None,
            Self::English => Some("eng"),
            Self::Spanish => Some("spa"),
        }
    }
}

/// Lowest accepted audio channel count.
pub const MIN_AUDIO_CHANNELS: u8 = 2;
/// Highest accepted audio channel count.
pub const MAX_AUDIO_CHANNELS: u8 = 7;

/// The immutable transcoder configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Configuration {
    /// Directory scanned for input files.
    pub root_directory: PathBuf,
    /// Number of simultaneously running pipelines.
    pub number_of_threads: usize,
    /// Target video codec.
    pub video_codec: VideoCodec,
    /// Target video bitrate in kbit/s; unused on the copy path.
    pub video_bitrate: u32,
    /// Target audio codec; must match the video codec family.
    pub audio_codec: AudioCodec,
    /// Target audio bitrate in kbit/s.
    pub audio_bitrate: u32,
    /// Output audio channel count, clamped to `[2, 7]`.
    pub audio_channels_num: u8,
    /// Preferred language when more than one audio stream exists.
    pub preferred_audio_language: Language,
    /// Whether to extract an embedded SubRip track to a sidecar file.
    pub extract_subtitles: bool,
    /// Preferred language when more than one subtitle stream exists.
    pub preferred_subtitle_language: Language,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            root_directory: home_directory(),
            number_of_threads: default_thread_count(),
            video_codec: VideoCodec::Vp8,
            video_bitrate: 1000,
            audio_codec: AudioCodec::Vorbis,
            audio_bitrate: 128,
            audio_channels_num: 2,
            preferred_audio_language: Language::Default,
            extract_subtitles: true,
            preferred_subtitle_language: Language::Default,
        }
    }
}

impl Configuration {
    /// Check whether a video/audio codec pair is permitted: the VP family
    /// pairs with Vorbis, the H.26x family with AAC.
    pub fn is_valid_pair(video: VideoCodec, audio: AudioCodec) -> bool {
        match video {
            VideoCodec::Vp8 | VideoCodec::Vp9 => audio == AudioCodec::Vorbis,
            VideoCodec::H264 | VideoCodec::H265 => audio == AudioCodec::Aac,
        }
    }

    /// Validate the record. A configuration that fails here rejects the
    /// whole job set; no pipeline starts.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !Self::is_valid_pair(self.video_codec, self.audio_codec) {
            return Err(ConfigError::InvalidCodecPair {
                video: self.video_codec.to_string(),
                audio: self.audio_codec.to_string(),
            });
        }
        if !(MIN_AUDIO_CHANNELS..=MAX_AUDIO_CHANNELS).contains(&self.audio_channels_num) {
            return Err(ConfigError::ChannelsOutOfRange(self.audio_channels_num));
        }
        Ok(())
    }

    /// The worker budget actually used: the configured thread count
    /// clamped to `[1, hardware_concurrency]`.
    pub fn effective_threads(&self) -> usize {
        self.number_of_threads.clamp(1, hardware_concurrency())
    }

    /// Clamp the channel count into the accepted range instead of
    /// rejecting it.
    pub fn set_audio_channels(&mut self, channels: u8) {
        self.audio_channels_num = channels.clamp(MIN_AUDIO_CHANNELS, MAX_AUDIO_CHANNELS);
    }

    /// Load a configuration from a JSON file, falling back to defaults when
    /// the file is missing or unreadable. The stored root directory is
    /// walked up to the nearest existing ancestor, then to the user's home.
    pub fn load(path: &Path) -> Self {
        let mut config = match fs::read(path) {
            Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or_else(|err| {
                tracing::warn!("ignoring malformed configuration {}: {err}", path.display());
                Self::default()
            }),
            Err(_) => Self::default(),
        };
        config.root_directory = valid_directory_check(&config.root_directory);
        config
    }

    /// Persist the configuration as JSON.
    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut stored = self.clone();
        stored.root_directory = valid_directory_check(&self.root_directory);
        let json = serde_json::to_vec_pretty(&stored).expect("configuration serializes");
        fs::write(path, json)
    }
}

/// Walk up from `directory` to the nearest existing directory; fall back to
/// the user's home when the whole chain is gone.
pub fn valid_directory_check(directory: &Path) -> PathBuf {
    let mut current = directory.to_path_buf();
    while !current.as_os_str().is_empty() && !current.is_dir() {
        match current.parent() {
            Some(parent) => current = parent.to_path_buf(),
            None => break,
        }
    }
    if current.as_os_str().is_empty() || !current.is_dir() {
        home_directory()
    } else {
        current
    }
}

/// Number of hardware threads available to the process.
pub fn hardware_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

fn default_thread_count() -> usize {
    (hardware_concurrency() / 2).max(1)
}

fn home_directory() -> PathBuf {
    std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_documented_table() {
        let config = Configuration::default();
        assert_eq!(config.video_codec, VideoCodec::Vp8);
        assert_eq!(config.audio_codec, AudioCodec::Vorbis);
        assert_eq!(config.video_bitrate, 1000);
        assert_eq!(config.audio_bitrate, 128);
        assert_eq!(config.audio_channels_num, 2);
        assert!(config.extract_subtitles);
        assert_eq!(config.preferred_audio_language, Language::Default);
        assert!(config.number_of_threads >= 1);
    }

    #[test]
    fn test_codec_pair_validity() {
        assert!(Configuration::is_valid_pair(VideoCodec::Vp8, AudioCodec::Vorbis));
        assert!(Configuration::is_valid_pair(VideoCodec::Vp9, AudioCodec::Vorbis));
        assert!(Configuration::is_valid_pair(VideoCodec::H264, AudioCodec::Aac));
        assert!(Configuration::is_valid_pair(VideoCodec::H265, AudioCodec::Aac));
        assert!(!Configuration::is_valid_pair(VideoCodec::Vp8, AudioCodec::Aac));
        assert!(!Configuration::is_valid_pair(VideoCodec::H264, AudioCodec::Vorbis));
    }

    #[test]
    fn test_validate_rejects_bad_pair() {
        let config = Configuration {
            video_codec: VideoCodec::Vp8,
            audio_codec: AudioCodec::Aac,
            ..Configuration::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidCodecPair { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_channel_range() {
        let mut config = Configuration::default();
        config.audio_channels_num = 1;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ChannelsOutOfRange(1))
        ));
        config.audio_channels_num = 8;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_set_audio_channels_clamps() {
        let mut config = Configuration::default();
        config.set_audio_channels(1);
        assert_eq!(config.audio_channels_num, 2);
        config.set_audio_channels(12);
        assert_eq!(config.audio_channels_num, 7);
        config.set_audio_channels(5);
        assert_eq!(config.audio_channels_num, 5);
    }

    #[test]
    fn test_effective_threads_clamps() {
        let mut config = Configuration::default();
        config.number_of_threads = 0;
        assert_eq!(config.effective_threads(), 1);
        config.number_of_threads = usize::MAX;
        assert_eq!(config.effective_threads(), hardware_concurrency());
    }

    #[test]
    fn test_persistence_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("recast.json");

        let mut config = Configuration::default();
        config.video_codec = VideoCodec::H265;
        config.audio_codec = AudioCodec::Aac;
        config.audio_channels_num = 6;
        config.extract_subtitles = false;
        config.root_directory = dir.path().to_path_buf();
        config.save(&path).unwrap();

        let loaded = Configuration::load(&path);
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_load_missing_file_yields_defaults() {
        let loaded = Configuration::load(Path::new("/nonexistent/recast.json"));
        assert_eq!(loaded.video_codec, VideoCodec::Vp8);
    }

    #[test]
    fn test_valid_directory_check_walks_up() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("a/b/c");
        assert_eq!(valid_directory_check(&missing), dir.path());
    }
}
