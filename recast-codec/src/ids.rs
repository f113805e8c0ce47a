//! Mapping between recast codec enums and library codec ids.

use ffmpeg_sys_next as ffi;
use ffmpeg_sys_next::AVCodecID;
use recast_core::{AudioCodec, CodecTag, VideoCodec};
use std::ffi::CStr;

/// Library codec id for a target video codec.
pub(crate) fn video_codec_id(codec: VideoCodec) -> AVCodecID {
    match codec {
        VideoCodec::Vp8 => AVCodecID::AV_CODEC_ID_VP8,
        VideoCodec::Vp9 => AVCodecID::AV_CODEC_ID_VP9,
        VideoCodec::H264 => AVCodecID::AV_CODEC_ID_H264,
        VideoCodec::H265 => AVCodecID::AV_CODEC_ID_HEVC,
    }
}

/// Library codec id for a target audio codec.
pub(crate) fn audio_codec_id(codec: AudioCodec) -> AVCodecID {
    match codec {
        AudioCodec::Vorbis => AVCodecID::AV_CODEC_ID_VORBIS,
        AudioCodec::Aac => AVCodecID::AV_CODEC_ID_AAC,
    }
}

/// Reduce a library codec id to the planner's view of the world.
pub(crate) fn codec_tag(id: AVCodecID) -> CodecTag {
    match id {
        AVCodecID::AV_CODEC_ID_VP8 => CodecTag::Video(VideoCodec::Vp8),
        AVCodecID::AV_CODEC_ID_VP9 => CodecTag::Video(VideoCodec::Vp9),
        AVCodecID::AV_CODEC_ID_H264 => CodecTag::Video(VideoCodec::H264),
        AVCodecID::AV_CODEC_ID_HEVC => CodecTag::Video(VideoCodec::H265),
        AVCodecID::AV_CODEC_ID_VORBIS => CodecTag::Audio(AudioCodec::Vorbis),
        AVCodecID::AV_CODEC_ID_AAC => CodecTag::Audio(AudioCodec::Aac),
        AVCodecID::AV_CODEC_ID_SUBRIP => CodecTag::Subrip,
        other => CodecTag::Other(codec_name(other)),
    }
}

/// The library's short name for a codec id.
pub(crate) fn codec_name(id: AVCodecID) -> String {
    unsafe {
        let name = ffi::avcodec_get_name(id);
        if name.is_null() {
            return "unknown".to_string();
        }
        CStr::from_ptr(name).to_string_lossy().into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_ids_round_trip_through_tags() {
        for video in [
            VideoCodec::Vp8,
            VideoCodec::Vp9,
            VideoCodec::H264,
            VideoCodec::H265,
        ] {
            assert_eq!(codec_tag(video_codec_id(video)), CodecTag::Video(video));
        }
        for audio in [AudioCodec::Vorbis, AudioCodec::Aac] {
            assert_eq!(codec_tag(audio_codec_id(audio)), CodecTag::Audio(audio));
        }
    }

    #[test]
    fn test_subrip_maps_to_subtitle_tag() {
        assert_eq!(codec_tag(AVCodecID::AV_CODEC_ID_SUBRIP), CodecTag::Subrip);
    }

    #[test]
    fn test_unknown_codec_keeps_library_name() {
        match codec_tag(AVCodecID::AV_CODEC_ID_MP3) {
            CodecTag::Other(name) => assert_eq!(name, "mp3"),
            other => panic!("expected Other, got {other:?}"),
        }
    }
}
