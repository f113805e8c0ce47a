//! SubRip sidecar writer.
//!
//! Cues are numbered from one and written as plain `\n`-terminated text
//! while the pipeline runs; closing the writer rewrites the finished file
//! as UCS-2 little endian with a byte-order mark, which is what the target
//! receivers expect.

use recast_core::{Error, Result};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Incremental writer for one `.srt` sidecar file.
pub struct SrtWriter {
    file: File,
    path: PathBuf,
    cue: u32,
}

impl SrtWriter {
    /// Create the sidecar file.
    pub fn create(path: &Path) -> Result<Self> {
        let file = File::create(path).map_err(|source| Error::IoWrite {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self {
            file,
            path: path.to_path_buf(),
            cue: 0,
        })
    }

    /// The sidecar path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of cues written so far.
    pub fn cue_count(&self) -> u32 {
        self.cue
    }

    /// Append one cue: number, timecode range, payload and a blank
    /// separator line. The payload is treated as 8-bit text.
    pub fn write_cue(&mut self, start_ms: i64, end_ms: i64, payload: &[u8]) -> Result<()> {
        self.cue += 1;
        let text = String::from_utf8_lossy(payload);
        let cue = format!(
            "{}\n{} --> {}\n{}\n\n",
            self.cue,
            format_timecode(start_ms),
            format_timecode(end_ms),
            text.trim_end_matches(['\r', '\n'])
        );
        self.file
            .write_all(cue.as_bytes())
            .map_err(|source| self.write_error(&source))
    }

    /// Flush, close and rewrite the file as UCS-2LE with a BOM.
    pub fn finish(mut self) -> Result<()> {
        self.file
            .flush()
            .map_err(|source| self.write_error(&source))?;
        let path = self.path.clone();
        drop(self.file);

        let bytes = fs::read(&path).map_err(|source| Error::SubtitleWrite {
            path: path.clone(),
            detail: source.to_string(),
        })?;
        let text = String::from_utf8_lossy(&bytes);
        fs::write(&path, encode_ucs2le(&text)).map_err(|source| Error::SubtitleWrite {
            path,
            detail: source.to_string(),
        })
    }

    fn write_error(&self, source: &std::io::Error) -> Error {
        Error::SubtitleWrite {
            path: self.path.clone(),
            detail: source.to_string(),
        }
    }
}

/// Format a millisecond position as `HH:MM:SS,mmm`. Negative positions
/// clamp to zero.
pub fn format_timecode(ms: i64) -> String {
    let ms = ms.max(0);
    let hours = ms / 3_600_000;
    let minutes = (ms / 60_000) % 60;
    let seconds = (ms / 1000) % 60;
    let millis = ms % 1000;
    format!("{hours:02}:{minutes:02}:{seconds:02},{millis:03}")
}

/// Encode text as UCS-2 little endian with a leading BOM (`FF FE`).
fn encode_ucs2le(text: &str) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(2 + text.len() * 2);
    bytes.extend_from_slice(&[0xFF, 0xFE]);
    for unit in text.encode_utf16() {
        bytes.extend_from_slice(&unit.to_le_bytes());
    }
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_timecode() {
        assert_eq!(format_timecode(0), "00:00:00,000");
        assert_eq!(format_timecode(1_000), "00:00:01,000");
        assert_eq!(format_timecode(61_500), "00:01:01,500");
        assert_eq!(format_timecode(3_723_456), "01:02:03,456");
        assert_eq!(format_timecode(-42), "00:00:00,000");
    }

    #[test]
    fn test_cue_layout() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("movie.mkv.srt");

        let mut writer = SrtWriter::create(&path).unwrap();
        writer.write_cue(1_000, 4_000, b"Hello, world!").unwrap();
        writer
            .write_cue(5_000, 8_500, b"Two lines\nof text\n")
            .unwrap();
        assert_eq!(writer.cue_count(), 2);
        drop(writer);

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(
            content,
            "1\n00:00:01,000 --> 00:00:04,000\nHello, world!\n\n\
             2\n00:00:05,000 --> 00:00:08,500\nTwo lines\nof text\n\n"
        );
    }

    #[test]
    fn test_finish_writes_ucs2le_with_bom() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("movie.mkv.srt");

        let mut writer = SrtWriter::create(&path).unwrap();
        writer.write_cue(0, 1_000, b"Hi").unwrap();
        writer.finish().unwrap();

        let bytes = fs::read(&path).unwrap();
        assert_eq!(&bytes[..2], &[0xFF, 0xFE], "file must start with the LE BOM");

        // "1\n" encoded as UCS-2LE follows the BOM.
        assert_eq!(&bytes[2..6], &[b'1', 0x00, b'\n', 0x00]);

        // Every code unit is two bytes.
        assert_eq!(bytes.len() % 2, 0);

        let units: Vec<u16> = bytes[2..]
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .collect();
        let decoded = String::from_utf16(&units).unwrap();
        assert!(decoded.contains("00:00:00,000 --> 00:00:01,000"));
        assert!(decoded.contains("Hi"));
        assert!(decoded.ends_with("\n\n"));
    }

    #[test]
    fn test_payload_trailing_newlines_normalised() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x.srt");

        let mut writer = SrtWriter::create(&path).unwrap();
        writer.write_cue(0, 500, b"cue text\r\n").unwrap();
        drop(writer);

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.ends_with("cue text\n\n"));
    }

    #[test]
    fn test_non_utf8_payload_does_not_fail() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("latin.srt");

        let mut writer = SrtWriter::create(&path).unwrap();
        // Latin-1 "café" is invalid UTF-8; written lossily, never an error.
        writer.write_cue(0, 1_000, &[0x63, 0x61, 0x66, 0xE9]).unwrap();
        writer.finish().unwrap();

        let bytes = fs::read(&path).unwrap();
        assert_eq!(&bytes[..2], &[0xFF, 0xFE]);
    }
}
