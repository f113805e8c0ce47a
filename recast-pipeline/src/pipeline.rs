//! The per-file transcoding pipeline.
//!
//! One pipeline owns every codec resource it allocates: the input context
//! and its custom I/O, per-stream decoders, encoders and filter graphs,
//! the output container and the subtitle sidecar. Teardown happens in
//! reverse allocation order through drop on every exit path, including
//! cancellation and mid-loop failure.

use crate::plan::{StreamAction, StreamPlan, StreamSelection, SubtitlePlan};
use crate::srt::SrtWriter;
use recast_codec::{
    library_section, CodecStatus, Decoder, Encoder, FilterGraph, Frame, InputContext, OutStream,
    OutputContext, Packet,
};
use recast_core::{
    CodecProfile, Configuration, Error, EventSender, Result, Rounding, StreamDesc, StreamKind,
    TimeBase,
};
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Phase of a running pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Init,
    Analyzing,
    OutputOpen,
    Running,
    Flushing,
    Closing,
    Done,
    Cancelled,
    Failed,
}

/// One audio or video stream routed into the output container.
struct StreamSlot {
    input_index: usize,
    kind: StreamKind,
    transcode: bool,
    decoder: Decoder,
    encoder: Option<Encoder>,
    graph: Option<FilterGraph>,
    out: OutStream,
    /// Fixed encoder frame size; zero when frames may be any length.
    frame_size: i32,
    /// Time base the packets handed to the muxer are counted in.
    codec_tb: TimeBase,
    /// The muxer's stream time base, known once the header is written.
    out_tb: TimeBase,
    /// Next output presentation timestamp for fixed-frame audio.
    pts: i64,
    /// Forced decode timestamp counter for video; last known DTS
    /// otherwise.
    dts: i64,
}

/// The subtitle side path.
struct SubtitleSlot {
    input_index: usize,
    time_base: TimeBase,
    /// Earliest start timestamp among all input streams, used to shift
    /// cues so the first one lands near zero.
    start_dts: i64,
    writer: SrtWriter,
}

struct Workers {
    output: Option<OutputContext>,
    audio: Option<StreamSlot>,
    video: Option<StreamSlot>,
    subtitle: Option<SubtitleSlot>,
}

/// The per-file transcoding pipeline.
pub struct TranscodingPipeline {
    path: PathBuf,
    config: Arc<Configuration>,
    events: EventSender,
    cancel: Arc<AtomicBool>,
    state: PipelineState,
    media_output: Option<PathBuf>,
    subtitle_output: Option<PathBuf>,
}

impl TranscodingPipeline {
    /// Bind a pipeline to one input file. Nothing is opened until
    /// [`run`](Self::run).
    pub fn new(
        path: PathBuf,
        config: Arc<Configuration>,
        events: EventSender,
        cancel: Arc<AtomicBool>,
    ) -> Self {
        Self {
            path,
            config,
            events,
            cancel,
            state: PipelineState::Init,
            media_output: None,
            subtitle_output: None,
        }
    }

    /// Current phase.
    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Run the pipeline to a terminal state, consuming it. Exactly one
    /// `finished` event is emitted, after a final `progress(100)`.
    pub fn run(mut self) {
        info!("transcoding {}", self.path.display());
        match self.execute() {
            Ok(()) => {
                self.state = PipelineState::Done;
                self.events.progress(100);
                self.events.finished(false, false);
            }
            Err(err) if err.is_cancelled() => {
                self.state = PipelineState::Cancelled;
                self.events.info(format!(
                    "Transcoding of '{}' has been cancelled.",
                    self.file_name()
                ));
                self.remove_partial_outputs();
                self.events.progress(100);
                self.events.finished(true, false);
            }
            Err(err) => {
                self.state = PipelineState::Failed;
                warn!("{}: {err}", self.path.display());
                self.events.error(err.to_string());
                self.remove_partial_outputs();
                self.events.progress(100);
                self.events.finished(false, true);
            }
        }
    }

    fn execute(&mut self) -> Result<()> {
        self.ensure_not_cancelled()?;
        self.state = PipelineState::Analyzing;
        self.check_input_readable()?;

        let mut input = {
            let _section = library_section();
            let mut input = InputContext::open(&self.path)?;
            input.find_stream_info()?;
            input
        };
        let streams = input.streams();
        let best_video = input.best_stream(StreamKind::Video, None);
        let plan = StreamPlan::analyze(&self.path, &streams, best_video, &self.config)?;

        if let SubtitlePlan::NotSubrip { .. } = plan.subtitle {
            self.events.info(format!(
                "Subtitle exists for '{}' but it's not in SubRip format.",
                self.file_name()
            ));
        }

        if !plan.needs_processing() {
            self.events.info(format!(
                "Not processed: '{}' is already in the correct format",
                self.file_name()
            ));
            return Ok(());
        }
        self.ensure_not_cancelled()?;

        let profile = CodecProfile::new(self.config.video_codec);
        if plan.needs_media_output() {
            self.media_output = Some(output_media_path(&self.path, profile));
        }
        if matches!(plan.subtitle, SubtitlePlan::Extract { .. }) {
            self.subtitle_output = Some(output_subtitle_path(&self.path));
        }
        self.check_output_writable()?;

        if let Some(summary) = plan.summary() {
            self.events
                .info(format!("Processing '{}': {summary}", self.file_name()));
        }

        self.state = PipelineState::OutputOpen;
        self.ensure_not_cancelled()?;
        let mut workers = self.open_outputs(&input, &streams, &plan, profile)?;

        self.state = PipelineState::Running;
        let mut frame = Frame::new()?;
        let mut enc_packet = Packet::new()?;
        self.main_loop(&mut input, &mut workers, &mut frame, &mut enc_packet)?;

        self.state = PipelineState::Flushing;
        self.flush_streams(&mut workers, &mut frame, &mut enc_packet)?;
        if let Some(subtitle) = workers.subtitle.take() {
            subtitle.writer.finish()?;
        }

        self.state = PipelineState::Closing;
        if let Some(output) = workers.output.as_mut() {
            output.write_trailer()?;
        }
        drop(workers);
        self.state = PipelineState::Done;
        Ok(())
    }

    /// The input must be readable before any library state is touched.
    fn check_input_readable(&self) -> Result<()> {
        File::open(&self.path)
            .map(drop)
            .map_err(|source| Error::IoOpen {
                path: self.path.clone(),
                source,
            })
    }

    /// Refuse to clobber existing outputs, and prove the directory is
    /// writable by creating and removing each target.
    fn check_output_writable(&self) -> Result<()> {
        for path in [&self.media_output, &self.subtitle_output]
            .into_iter()
            .flatten()
        {
            if path.exists() {
                return Err(Error::OutputExists { path: path.clone() });
            }
            File::create(path).map_err(|source| Error::IoWrite {
                path: path.clone(),
                source,
            })?;
            let _ = fs::remove_file(path);
        }
        Ok(())
    }

    fn open_outputs(
        &self,
        input: &InputContext,
        streams: &[StreamDesc],
        plan: &StreamPlan,
        profile: CodecProfile,
    ) -> Result<Workers> {
        let _section = library_section();
        let mut workers = Workers {
            output: None,
            audio: None,
            video: None,
            subtitle: None,
        };

        if let Some(media_path) = &self.media_output {
            let mut output = OutputContext::create(media_path, profile.container_name())?;
            let global_header = output.wants_global_header();

            let mut video =
                self.build_slot(input, plan.video, StreamKind::Video, &mut output, global_header, profile)?;
            let mut audio =
                self.build_slot(input, plan.audio, StreamKind::Audio, &mut output, global_header, profile)?;

            output.open_file()?;
            output.write_header()?;

            // The muxer may have adjusted the stream time bases.
            video.out_tb = output.stream_time_base(video.out);
            audio.out_tb = output.stream_time_base(audio.out);

            workers.output = Some(output);
            workers.audio = Some(audio);
            workers.video = Some(video);
        }

        if let SubtitlePlan::Extract { index } = plan.subtitle {
            let desc = streams
                .iter()
                .find(|s| s.index == index)
                .ok_or_else(|| Error::NoStreams {
                    path: self.path.clone(),
                })?;
            let start_dts = streams.iter().filter_map(|s| s.start_time).min().unwrap_or(0);
            let subtitle_path = self
                .subtitle_output
                .clone()
                .unwrap_or_else(|| output_subtitle_path(&self.path));
            let writer = SrtWriter::create(&subtitle_path)?;
            debug!(
                "extracting subtitles from stream {index} to {}",
                subtitle_path.display()
            );
            workers.subtitle = Some(SubtitleSlot {
                input_index: index,
                time_base: desc.time_base,
                start_dts,
                writer,
            });
        }

        Ok(workers)
    }

    fn build_slot(
        &self,
        input: &InputContext,
        selection: StreamSelection,
        kind: StreamKind,
        output: &mut OutputContext,
        global_header: bool,
        profile: CodecProfile,
    ) -> Result<StreamSlot> {
        let decoder = Decoder::open(input, selection.index, kind)?;
        let input_tb = decoder.time_base();

        match selection.action {
            StreamAction::Transcode => {
                let encoder = match kind {
                    StreamKind::Video => Encoder::open_video(
                        profile.video_codec(),
                        &decoder,
                        global_header,
                        &self.path,
                    )?,
                    StreamKind::Audio => Encoder::open_audio(
                        self.config.audio_codec,
                        &decoder,
                        self.config.audio_channels_num,
                        self.config.audio_bitrate,
                        global_header,
                        &self.path,
                    )?,
                    StreamKind::Subtitle => unreachable!("subtitles are never encoded"),
                };
                let graph = match kind {
                    StreamKind::Video => FilterGraph::video(&decoder, &encoder, &self.path)?,
                    StreamKind::Audio => FilterGraph::audio(&decoder, &encoder, &self.path)?,
                    StreamKind::Subtitle => unreachable!(),
                };
                let out = output.add_encoded_stream(&encoder)?;
                let codec_tb = match kind {
                    StreamKind::Audio => encoder.time_base(),
                    _ => input_tb,
                };
                Ok(StreamSlot {
                    input_index: selection.index,
                    kind,
                    transcode: true,
                    frame_size: encoder.frame_size(),
                    decoder,
                    encoder: Some(encoder),
                    graph: Some(graph),
                    out,
                    codec_tb,
                    out_tb: codec_tb,
                    pts: 0,
                    dts: 0,
                })
            }
            StreamAction::Copy => {
                let out = output.add_copy_stream(input, selection.index, kind.name())?;
                Ok(StreamSlot {
                    input_index: selection.index,
                    kind,
                    transcode: false,
                    frame_size: 0,
                    decoder,
                    encoder: None,
                    graph: None,
                    out,
                    codec_tb: input_tb,
                    out_tb: input_tb,
                    pts: 0,
                    dts: 0,
                })
            }
        }
    }

    fn main_loop(
        &self,
        input: &mut InputContext,
        workers: &mut Workers,
        frame: &mut Frame,
        enc_packet: &mut Packet,
    ) -> Result<()> {
        let mut packet = Packet::new()?;
        let input_size = input.size();
        let mut last_progress = 0u8;

        loop {
            self.ensure_not_cancelled()?;

            match input.read_packet(&mut packet) {
                CodecStatus::Ok => {}
                CodecStatus::Eof => break,
                CodecStatus::Again => {
                    packet.unref();
                    continue;
                }
                CodecStatus::Fatal(err) => {
                    return Err(Error::Probe {
                        path: self.path.clone(),
                        detail: format!("reading packet: {err}"),
                    })
                }
            }

            if input_size > 0 {
                let current = (input.position().saturating_mul(100) / input_size).min(100) as u8;
                // The byte position can step backwards when the demuxer
                // seeks; reported progress never does.
                if current > last_progress {
                    last_progress = current;
                    self.events.progress(current);
                }
            }

            let index = packet.stream_index();
            self.route_packet(workers, index, &mut packet, frame, enc_packet)?;
            packet.unref();
        }
        Ok(())
    }

    fn route_packet(
        &self,
        workers: &mut Workers,
        index: usize,
        packet: &mut Packet,
        frame: &mut Frame,
        enc_packet: &mut Packet,
    ) -> Result<()> {
        if let (Some(slot), Some(output)) = (workers.audio.as_mut(), workers.output.as_mut()) {
            if slot.input_index == index {
                return if slot.transcode {
                    self.process_packet(slot, Some(packet), frame, enc_packet, output)
                } else {
                    self.write_copy(slot, packet, output)
                };
            }
        }
        if let (Some(slot), Some(output)) = (workers.video.as_mut(), workers.output.as_mut()) {
            if slot.input_index == index {
                return if slot.transcode {
                    self.process_packet(slot, Some(packet), frame, enc_packet, output)
                } else {
                    self.write_copy(slot, packet, output)
                };
            }
        }
        if let Some(subtitle) = workers.subtitle.as_mut() {
            if subtitle.input_index == index {
                return self.write_srt_packet(subtitle, packet);
            }
        }
        Ok(())
    }

    /// Decode → filter → encode → mux one packet, or drain everything
    /// when `packet` is `None`.
    fn process_packet(
        &self,
        slot: &mut StreamSlot,
        packet: Option<&Packet>,
        frame: &mut Frame,
        enc_packet: &mut Packet,
        output: &mut OutputContext,
    ) -> Result<()> {
        match slot.decoder.send_packet(packet) {
            CodecStatus::Ok | CodecStatus::Eof => {}
            // The decoder is drained after every packet, so backpressure
            // here means the stream is broken.
            CodecStatus::Again => {
                return Err(self.loop_error(slot.kind, LoopStage::PacketSend, "EAGAIN"))
            }
            CodecStatus::Fatal(err) => {
                return Err(self.loop_error(slot.kind, LoopStage::PacketSend, &err.to_string()))
            }
        }

        let flushing = packet.is_none();
        loop {
            match slot.decoder.receive_frame(frame) {
                CodecStatus::Ok => {
                    let pushed = match slot.graph.as_mut() {
                        Some(graph) => graph.push(Some(frame)),
                        None => CodecStatus::Ok,
                    };
                    if let CodecStatus::Fatal(err) = pushed {
                        return Err(self.loop_error(
                            slot.kind,
                            LoopStage::FrameSend,
                            &err.to_string(),
                        ));
                    }
                    self.drain_graph(slot, frame, enc_packet, output, flushing)?;
                }
                CodecStatus::Again | CodecStatus::Eof => break,
                CodecStatus::Fatal(err) => {
                    return Err(self.loop_error(
                        slot.kind,
                        LoopStage::FrameReceive,
                        &err.to_string(),
                    ))
                }
            }
        }

        if flushing {
            if let Some(graph) = slot.graph.as_mut() {
                if let CodecStatus::Fatal(err) = graph.push(None) {
                    return Err(self.loop_error(slot.kind, LoopStage::FrameSend, &err.to_string()));
                }
            }
            self.drain_graph(slot, frame, enc_packet, output, true)?;

            let sent = match slot.encoder.as_mut() {
                Some(encoder) => encoder.send_frame(None),
                None => CodecStatus::Ok,
            };
            if let CodecStatus::Fatal(err) = sent {
                return Err(self.loop_error(slot.kind, LoopStage::FrameSend, &err.to_string()));
            }
            self.drain_encoder(slot, enc_packet, output)?;
        }
        Ok(())
    }

    /// Pull filtered frames from the sink and feed the encoder. Audio
    /// encoders with a fixed frame size are fed exact-length frames until
    /// the flush, when the remainder comes out short.
    fn drain_graph(
        &self,
        slot: &mut StreamSlot,
        frame: &mut Frame,
        enc_packet: &mut Packet,
        output: &mut OutputContext,
        flushing: bool,
    ) -> Result<()> {
        loop {
            let pulled = {
                let graph = match slot.graph.as_mut() {
                    Some(graph) => graph,
                    None => return Ok(()),
                };
                if slot.frame_size > 0 && !flushing {
                    graph.pull_samples(frame, slot.frame_size)
                } else {
                    graph.pull_frame(frame)
                }
            };
            match pulled {
                CodecStatus::Again | CodecStatus::Eof => return Ok(()),
                CodecStatus::Fatal(err) => {
                    return Err(self.loop_error(
                        slot.kind,
                        LoopStage::FrameReceive,
                        &err.to_string(),
                    ))
                }
                CodecStatus::Ok => {
                    let sent = match slot.encoder.as_mut() {
                        Some(encoder) => encoder.send_frame(Some(frame)),
                        None => CodecStatus::Ok,
                    };
                    frame.unref();
                    match sent {
                        CodecStatus::Ok | CodecStatus::Again | CodecStatus::Eof => {}
                        CodecStatus::Fatal(err) => {
                            return Err(self.loop_error(
                                slot.kind,
                                LoopStage::FrameSend,
                                &err.to_string(),
                            ))
                        }
                    }
                    self.drain_encoder(slot, enc_packet, output)?;
                }
            }
        }
    }

    fn drain_encoder(
        &self,
        slot: &mut StreamSlot,
        enc_packet: &mut Packet,
        output: &mut OutputContext,
    ) -> Result<()> {
        loop {
            let received = match slot.encoder.as_mut() {
                Some(encoder) => encoder.receive_packet(enc_packet),
                None => return Ok(()),
            };
            match received {
                CodecStatus::Ok => {
                    if slot.kind == StreamKind::Audio {
                        // Fixed-size audio frames get densely packed
                        // output timestamps in the encoder time base.
                        enc_packet.set_pts(slot.pts);
                        enc_packet.set_dts(slot.pts);
                        enc_packet.set_duration(i64::from(slot.frame_size));
                        slot.pts += i64::from(slot.frame_size);
                    }
                    self.write_av_packet(slot, enc_packet, output)?;
                }
                CodecStatus::Again | CodecStatus::Eof => return Ok(()),
                CodecStatus::Fatal(err) => {
                    return Err(self.loop_error(
                        slot.kind,
                        LoopStage::PacketReceive,
                        &err.to_string(),
                    ))
                }
            }
        }
    }

    /// Assign the output stream, repair missing timestamps, rescale into
    /// the muxer's time base and write interleaved.
    fn write_av_packet(
        &self,
        slot: &mut StreamSlot,
        packet: &mut Packet,
        output: &mut OutputContext,
    ) -> Result<()> {
        packet.set_stream_index(slot.out.index());

        if slot.kind == StreamKind::Video {
            // Forced monotone video timestamps survive variable-rate
            // containers; the frame duration is one codec tick.
            packet.set_pts(slot.dts);
            packet.set_dts(slot.dts);
            slot.dts += 1;
            packet.set_duration(1);
        } else {
            if packet.has_dts() {
                slot.dts = packet.dts();
            } else {
                packet.set_dts(slot.dts);
            }
            if !packet.has_pts() {
                packet.set_pts(packet.dts());
            }
        }

        let from = slot.codec_tb;
        let to = slot.out_tb;
        packet.set_pts(from.rescale_rnd(packet.pts(), to, Rounding::NearInf));
        packet.set_dts(from.rescale_rnd(packet.dts(), to, Rounding::NearInf));
        if packet.duration() != 0 {
            packet.set_duration(from.rescale(packet.duration(), to));
        }

        output
            .write_interleaved(packet)
            .map_err(|err| self.loop_error(slot.kind, LoopStage::Mux, &err.to_string()))
    }

    /// Copy path: the input timestamps pass through untouched unless the
    /// muxer runs the stream on a different time base.
    fn write_copy(
        &self,
        slot: &mut StreamSlot,
        packet: &mut Packet,
        output: &mut OutputContext,
    ) -> Result<()> {
        packet.set_stream_index(slot.out.index());
        if slot.codec_tb != slot.out_tb {
            let from = slot.codec_tb;
            let to = slot.out_tb;
            packet.set_pts(from.rescale_rnd(packet.pts(), to, Rounding::NearInf));
            packet.set_dts(from.rescale_rnd(packet.dts(), to, Rounding::NearInf));
            if packet.duration() != 0 {
                packet.set_duration(from.rescale(packet.duration(), to));
            }
        }
        output
            .write_interleaved(packet)
            .map_err(|err| self.loop_error(slot.kind, LoopStage::Mux, &err.to_string()))
    }

    /// Subtitle side path: one cue per non-empty packet.
    fn write_srt_packet(&self, slot: &mut SubtitleSlot, packet: &Packet) -> Result<()> {
        if packet.size() == 0 || !packet.has_pts() {
            return Ok(());
        }
        let pts = if slot.start_dts != 0 {
            packet.pts() - slot.start_dts
        } else {
            packet.pts()
        };
        let start_ms = slot.time_base.to_millis(pts).max(0);
        let end_ms = start_ms + slot.time_base.to_millis(packet.duration()).max(0);
        slot.writer.write_cue(start_ms, end_ms, packet.data())
    }

    /// Drain decoders, graphs and encoders after the demuxer reports end
    /// of input, then reset the codec buffers.
    fn flush_streams(
        &self,
        workers: &mut Workers,
        frame: &mut Frame,
        enc_packet: &mut Packet,
    ) -> Result<()> {
        self.ensure_not_cancelled()?;
        if let (Some(slot), Some(output)) = (workers.audio.as_mut(), workers.output.as_mut()) {
            if slot.transcode {
                self.process_packet(slot, None, frame, enc_packet, output)?;
                slot.decoder.flush_buffers();
                if let Some(encoder) = slot.encoder.as_mut() {
                    encoder.flush_buffers();
                }
            }
        }
        if let (Some(slot), Some(output)) = (workers.video.as_mut(), workers.output.as_mut()) {
            if slot.transcode {
                self.process_packet(slot, None, frame, enc_packet, output)?;
                slot.decoder.flush_buffers();
                if let Some(encoder) = slot.encoder.as_mut() {
                    encoder.flush_buffers();
                }
            }
        }
        Ok(())
    }

    /// Remove whatever partial outputs exist; cleanup failures are
    /// reported but change nothing else.
    fn remove_partial_outputs(&self) {
        for path in [&self.media_output, &self.subtitle_output]
            .into_iter()
            .flatten()
        {
            if path.exists() {
                if let Err(source) = fs::remove_file(path) {
                    self.events.error(
                        Error::IoRemove {
                            path: path.clone(),
                            source,
                        }
                        .to_string(),
                    );
                }
            }
        }
    }

    fn ensure_not_cancelled(&self) -> Result<()> {
        if self.cancel.load(Ordering::Relaxed) {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }

    fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }

    fn loop_error(&self, kind: StreamKind, stage: LoopStage, detail: &str) -> Error {
        let stream = kind.name();
        let path = self.path.clone();
        let detail = detail.to_string();
        match stage {
            LoopStage::PacketSend => Error::PacketSend {
                stream,
                path,
                detail,
            },
            LoopStage::FrameReceive => Error::FrameReceive {
                stream,
                path,
                detail,
            },
            LoopStage::FrameSend => Error::FrameSend {
                stream,
                path,
                detail,
            },
            LoopStage::PacketReceive => Error::PacketReceive {
                stream,
                path,
                detail,
            },
            LoopStage::Mux => Error::Mux {
                stream,
                path,
                detail,
            },
        }
    }
}

#[derive(Clone, Copy)]
enum LoopStage {
    PacketSend,
    FrameReceive,
    FrameSend,
    PacketReceive,
    Mux,
}

/// Media output path: the extension is appended to the full source name,
/// so `movie.avi` becomes `movie.avi.mp4`.
pub fn output_media_path(input: &Path, profile: CodecProfile) -> PathBuf {
    let mut name = input.as_os_str().to_os_string();
    name.push(profile.output_extension());
    PathBuf::from(name)
}

/// Subtitle sidecar path: `movie.mkv` becomes `movie.mkv.srt`.
pub fn output_subtitle_path(input: &Path) -> PathBuf {
    let mut name = input.as_os_str().to_os_string();
    name.push(".srt");
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use recast_core::{Event, VideoCodec};

    #[test]
    fn test_output_media_path_appends_extension() {
        let profile = CodecProfile::new(VideoCodec::H265);
        assert_eq!(
            output_media_path(Path::new("/videos/movie.avi"), profile),
            PathBuf::from("/videos/movie.avi.mp4")
        );
        let profile = CodecProfile::new(VideoCodec::Vp9);
        assert_eq!(
            output_media_path(Path::new("/videos/clip.mkv"), profile),
            PathBuf::from("/videos/clip.mkv.vp9")
        );
    }

    #[test]
    fn test_output_subtitle_path() {
        assert_eq!(
            output_subtitle_path(Path::new("/videos/clip.mkv")),
            PathBuf::from("/videos/clip.mkv.srt")
        );
    }

    #[test]
    fn test_new_pipeline_starts_in_init() {
        let (events, _rx) = recast_core::event_channel();
        let pipeline = TranscodingPipeline::new(
            PathBuf::from("/videos/a.mkv"),
            Arc::new(Configuration::default()),
            events,
            Arc::new(AtomicBool::new(false)),
        );
        assert_eq!(pipeline.state(), PipelineState::Init);
    }

    #[test]
    fn test_missing_input_fails_with_io_open() {
        let (events, rx) = recast_core::event_channel();
        let pipeline = TranscodingPipeline::new(
            PathBuf::from("/nonexistent/input.mkv"),
            Arc::new(Configuration::default()),
            events,
            Arc::new(AtomicBool::new(false)),
        );
        pipeline.run();

        let mut saw_error = false;
        let mut finished = None;
        for event in rx.iter() {
            match event {
                Event::Error(message) => {
                    saw_error = true;
                    assert!(message.contains("can't open"));
                }
                Event::Finished { cancelled, failed } => {
                    finished = Some((cancelled, failed));
                }
                _ => {}
            }
        }
        assert!(saw_error);
        assert_eq!(finished, Some((false, true)));
    }

    #[test]
    fn test_cancel_before_start_terminates_without_failure() {
        // The stop flag is polled at every phase entry, so a pipeline
        // cancelled before it starts never opens its input.
        let (events, rx) = recast_core::event_channel();
        let cancel = Arc::new(AtomicBool::new(true));
        let pipeline = TranscodingPipeline::new(
            PathBuf::from("/nonexistent/input.mkv"),
            Arc::new(Configuration::default()),
            events,
            cancel,
        );
        pipeline.run();

        let events: Vec<Event> = rx.iter().collect();
        assert!(events
            .iter()
            .all(|event| !matches!(event, Event::Error(_))));
        assert_eq!(
            events.last(),
            Some(&Event::Finished {
                cancelled: true,
                failed: false
            })
        );
        // The final progress value is exactly 100 even when cancelled.
        assert!(events.contains(&Event::Progress(100)));
    }
}
