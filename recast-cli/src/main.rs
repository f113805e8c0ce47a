//! Recast CLI: batch-transcode a directory tree for a streaming media
//! receiver.
//!
//! Scans the root directory for media files, decides per stream whether
//! the existing encoding is acceptable, and transcodes or copies
//! accordingly; embedded SubRip subtitles can be extracted to UCS-2LE
//! sidecar files.

use clap::{Parser, ValueEnum};
use console::style;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use recast_core::{AudioCodec, Configuration, Event, Language, VideoCodec};
use recast_dispatch::{DispatchReport, Dispatcher, Notice};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// File extensions recognised as inputs, matched case-insensitively.
const MOVIE_FILE_EXTENSIONS: &[&str] = &["mp4", "avi", "ogv", "webm", "mkv", "mpg", "mpeg"];

#[derive(Debug, Clone, Copy, ValueEnum)]
enum VideoCodecArg {
    Vp8,
    Vp9,
    H264,
    H265,
}

impl From<VideoCodecArg> for VideoCodec {
    fn from(arg: VideoCodecArg) -> Self {
        match arg {
            VideoCodecArg::Vp8 => VideoCodec::Vp8,
            VideoCodecArg::Vp9 => VideoCodec::Vp9,
            VideoCodecArg::H264 => VideoCodec::H264,
            VideoCodecArg::H265 => VideoCodec::H265,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum AudioCodecArg {
    Vorbis,
    Aac,
}

impl From<AudioCodecArg> for AudioCodec {
    fn from(arg: AudioCodecArg) -> Self {
        match arg {
            AudioCodecArg::Vorbis => AudioCodec::Vorbis,
            AudioCodecArg::Aac => AudioCodec::Aac,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LanguageArg {
    Default,
    English,
    Spanish,
}

impl From<LanguageArg> for Language {
    fn from(arg: LanguageArg) -> Self {
        match arg {
            LanguageArg::Default => Language::Default,
            LanguageArg::English => Language::English,
            LanguageArg::Spanish => Language::Spanish,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "recast")]
#[command(version)]
#[command(about = "Batch-transcode a directory tree for a streaming media receiver")]
struct Args {
    /// Root directory scanned recursively for input files
    root: Option<PathBuf>,

    /// Target video codec (the audio codec follows unless given)
    #[arg(long)]
    video_codec: Option<VideoCodecArg>,

    /// Target audio codec; must pair with the video codec
    #[arg(long)]
    audio_codec: Option<AudioCodecArg>,

    /// Output audio channel count, clamped to [2, 7]
    #[arg(long)]
    audio_channels: Option<u8>,

    /// Preferred audio track language
    #[arg(long)]
    audio_language: Option<LanguageArg>,

    /// Extract embedded SubRip subtitles to sidecar files
    #[arg(long, conflicts_with = "no_subtitles")]
    subtitles: bool,

    /// Do not extract subtitles
    #[arg(long)]
    no_subtitles: bool,

    /// Preferred subtitle track language
    #[arg(long)]
    subtitle_language: Option<LanguageArg>,

    /// Number of files transcoded in parallel
    #[arg(short = 't', long)]
    threads: Option<usize>,

    /// Configuration file (defaults to ~/.config/recast/config.json)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Persist the effective configuration before running
    #[arg(long)]
    save_config: bool,

    /// Verbose diagnostics
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let args = Args::parse();
    init_tracing(args.verbose);

    let config_path = args
        .config
        .clone()
        .unwrap_or_else(default_config_path);
    let config = effective_configuration(&args, &config_path);

    if let Err(err) = config.validate() {
        eprintln!("{} {err}", style("error:").red().bold());
        std::process::exit(2);
    }

    if args.save_config {
        if let Err(err) = config.save(&config_path) {
            eprintln!(
                "{} can't save configuration to '{}': {err}",
                style("warning:").yellow().bold(),
                config_path.display()
            );
        }
    }

    let files = scan_media_files(&config.root_directory);
    if files.is_empty() {
        println!(
            "No media files found under '{}'.",
            config.root_directory.display()
        );
        return;
    }
    println!(
        "Transcoding {} file(s) under '{}' to {}+{}.",
        files.len(),
        config.root_directory.display(),
        config.video_codec,
        config.audio_codec
    );

    let report = match run_dispatcher(files, config) {
        Ok(report) => report,
        Err(err) => {
            eprintln!("{} {err}", style("error:").red().bold());
            std::process::exit(2);
        }
    };

    print_summary(&report);
    if report.errors > 0 || report.failed > 0 {
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// The persisted configuration with command-line overrides applied.
fn effective_configuration(args: &Args, config_path: &Path) -> Configuration {
    let mut config = Configuration::load(config_path);

    if let Some(video) = args.video_codec {
        config.video_codec = video.into();
        // Keep the pair consistent unless the user pins the audio codec.
        if args.audio_codec.is_none() {
            config.audio_codec = recast_core::CodecProfile::new(config.video_codec).companion_audio();
        }
    }
    if let Some(audio) = args.audio_codec {
        config.audio_codec = audio.into();
    }
    if let Some(channels) = args.audio_channels {
        config.set_audio_channels(channels);
    }
    if let Some(language) = args.audio_language {
        config.preferred_audio_language = language.into();
    }
    if args.subtitles {
        config.extract_subtitles = true;
    }
    if args.no_subtitles {
        config.extract_subtitles = false;
    }
    if let Some(language) = args.subtitle_language {
        config.preferred_subtitle_language = language.into();
    }
    if let Some(threads) = args.threads {
        config.number_of_threads = threads;
    }
    if let Some(root) = &args.root {
        config.root_directory = root.clone();
    }
    config
}

fn default_config_path() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("recast")
        .join("config.json")
}

/// Recursively collect media files under the root, sorted for a stable
/// queue order.
fn scan_media_files(root: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = walkdir::WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| is_media_file(entry.path()))
        .map(|entry| entry.into_path())
        .collect();
    files.sort();
    debug!("found {} media file(s)", files.len());
    files
}

fn is_media_file(path: &Path) -> bool {
    path.extension()
        .and_then(|extension| extension.to_str())
        .map(|extension| {
            let lowered = extension.to_lowercase();
            MOVIE_FILE_EXTENSIONS.contains(&lowered.as_str())
        })
        .unwrap_or(false)
}

fn run_dispatcher(
    files: Vec<PathBuf>,
    config: Configuration,
) -> recast_core::Result<DispatchReport> {
    let multi = MultiProgress::new();
    let global = multi.add(ProgressBar::new(files.len() as u64));
    global.set_style(
        ProgressStyle::with_template("{prefix:>8} [{bar:40.green}] {pos}/{len}")
            .expect("static template")
            .progress_chars("=> "),
    );
    global.set_prefix("total");

    let bars: Mutex<HashMap<usize, ProgressBar>> = Mutex::new(HashMap::new());
    let multi_for_observer = multi.clone();
    let global_for_observer = global.clone();

    let mut dispatcher = Dispatcher::new().with_observer(move |notice| match notice {
        Notice::Started { job, path } => {
            let bar = multi_for_observer.add(ProgressBar::new(100));
            bar.set_style(
                ProgressStyle::with_template("{prefix:>8} [{bar:40.cyan}] {pos:>3}% {msg}")
                    .expect("static template")
                    .progress_chars("=> "),
            );
            bar.set_prefix(format!("#{}", job.0));
            bar.set_message(
                path.file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_default(),
            );
            bars.lock().expect("bar map").insert(job.0, bar);
        }
        Notice::Event { job, event } => match event {
            Event::Progress(value) => {
                if let Some(bar) = bars.lock().expect("bar map").get(&job.0) {
                    bar.set_position(u64::from(*value));
                }
            }
            Event::Info(message) => {
                let _ = multi_for_observer.println(format!("{}", style(message).dim()));
            }
            Event::Error(message) => {
                let _ = multi_for_observer
                    .println(format!("{} {}", style("ERROR:").red().bold(), style(message).red()));
            }
            Event::Finished { cancelled, failed } => {
                if let Some(bar) = bars.lock().expect("bar map").remove(&job.0) {
                    bar.finish_and_clear();
                }
                if !*cancelled && !*failed {
                    global_for_observer.inc(1);
                }
            }
        },
    });

    let report = dispatcher.run(files, config);
    global.finish_and_clear();
    report
}

fn print_summary(report: &DispatchReport) {
    if report.cancelled {
        println!("{}", style("Run cancelled.").yellow().bold());
    }
    println!(
        "{} completed, {} failed, {} cancelled.",
        style(report.completed).green().bold(),
        if report.failed > 0 {
            style(report.failed).red().bold()
        } else {
            style(report.failed).dim()
        },
        report.cancelled_jobs
    );
    if report.errors > 0 {
        println!(
            "{} {} error message(s) in the log:",
            style("!").red().bold(),
            report.errors
        );
        for line in &report.log {
            if line.severity == recast_dispatch::Severity::Error {
                println!("  {}", style(&line.message).red());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_media_file_matches_known_extensions() {
        assert!(is_media_file(Path::new("/videos/a.mkv")));
        assert!(is_media_file(Path::new("/videos/a.MKV")));
        assert!(is_media_file(Path::new("/videos/a.mpeg")));
        assert!(!is_media_file(Path::new("/videos/a.srt")));
        assert!(!is_media_file(Path::new("/videos/noextension")));
    }

    #[test]
    fn test_video_codec_override_pulls_companion_audio() {
        let args = Args::parse_from(["recast", "--video-codec", "h265"]);
        let config = effective_configuration(&args, Path::new("/nonexistent/config.json"));
        assert_eq!(config.video_codec, VideoCodec::H265);
        assert_eq!(config.audio_codec, AudioCodec::Aac);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_explicit_audio_codec_is_kept() {
        let args = Args::parse_from([
            "recast",
            "--video-codec",
            "vp9",
            "--audio-codec",
            "vorbis",
        ]);
        let config = effective_configuration(&args, Path::new("/nonexistent/config.json"));
        assert_eq!(config.audio_codec, AudioCodec::Vorbis);
    }

    #[test]
    fn test_channels_are_clamped() {
        let args = Args::parse_from(["recast", "--audio-channels", "11"]);
        let config = effective_configuration(&args, Path::new("/nonexistent/config.json"));
        assert_eq!(config.audio_channels_num, 7);
    }
}
