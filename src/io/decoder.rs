//! Audio decoding
//!
//! Local files are decoded with Symphonia (MP3, MP4/M4A, WAV, FLAC, OGG).
//! Sources containing `://` are fetched with `yt-dlp`, converted to WAV with
//! `ffmpeg`, and read back through the WAV reader.

use std::path::Path;
use std::process::{Command, Stdio};

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::{MetadataOptions, StandardTagKey};
use symphonia::core::probe::Hint;

use crate::error::AnalysisError;
use crate::io::buffer::AudioBuffer;
use crate::io::wav;

/// Decode an audio source into interleaved float PCM
///
/// `source` is either a local file path or a URL. URLs require `yt-dlp` and
/// `ffmpeg` on the PATH.
pub fn decode(source: &str) -> Result<AudioBuffer, AnalysisError> {
    if source.contains("://") {
        fetch_remote(source)
    } else {
        decode_file(Path::new(source))
    }
}

/// Decode a local audio file with Symphonia
pub fn decode_file(path: &Path) -> Result<AudioBuffer, AnalysisError> {
    let file = std::fs::File::open(path)
        .map_err(|e| AnalysisError::IoError(format!("Failed to open {}: {}", path.display(), e)))?;

    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let mut probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| {
            AnalysisError::DecodingError(format!(
                "Unsupported format for {}: {}",
                path.display(),
                e
            ))
        })?;

    // Track title from container or stream metadata, when present.
    let mut title = first_title(probed.metadata.get().as_ref().and_then(|m| m.current()));

    let mut format = probed.format;
    if title.is_none() {
        title = first_title(format.metadata().current());
    }

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| AnalysisError::DecodingError("No decodable audio track".to_string()))?;

    let track_id = track.id;
    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| AnalysisError::DecodingError("Unknown sample rate".to_string()))?;
    let mut channels = track.codec_params.channels.map_or(0, |c| c.count());

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| AnalysisError::DecodingError(format!("Failed to create decoder: {}", e)))?;

    let mut samples: Vec<f32> = Vec::new();
    let mut sample_buf: Option<SampleBuffer<f32>> = None;

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(ref e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(SymphoniaError::IoError(_)) => break,
            Err(e) => {
                return Err(AnalysisError::DecodingError(format!(
                    "Failed reading {}: {}",
                    path.display(),
                    e
                )))
            }
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            // Skip over corrupt packets rather than aborting the decode.
            Err(SymphoniaError::DecodeError(_)) => continue,
            Err(SymphoniaError::IoError(_)) => continue,
            Err(e) => {
                return Err(AnalysisError::DecodingError(format!(
                    "Failed decoding {}: {}",
                    path.display(),
                    e
                )))
            }
        };

        if channels == 0 {
            channels = decoded.spec().channels.count();
        }

        if sample_buf.is_none() {
            sample_buf = Some(SampleBuffer::<f32>::new(
                decoded.capacity() as u64,
                *decoded.spec(),
            ));
        }

        if let Some(buf) = &mut sample_buf {
            buf.copy_interleaved_ref(decoded);
            samples.extend_from_slice(buf.samples());
        }
    }

    if samples.is_empty() || channels == 0 {
        return Err(AnalysisError::DecodingError(format!(
            "Decoded audio contained no samples: {}",
            path.display()
        )));
    }

    log::debug!(
        "Decoded {}: {} samples, {} Hz, {} channels",
        path.display(),
        samples.len(),
        sample_rate,
        channels
    );

    let mut audio = AudioBuffer::new(samples, sample_rate, channels);
    audio.title = title;
    Ok(audio)
}

/// Fetch a remote source with yt-dlp, convert to WAV with ffmpeg, and read it
fn fetch_remote(url: &str) -> Result<AudioBuffer, AnalysisError> {
    let temp_dir = std::env::temp_dir();
    let dl_path = temp_dir.join("cadenza_remote_audio");
    let title_path = temp_dir.join("cadenza_remote_title.txt");
    let wav_path = temp_dir.join("cadenza_remote_audio.wav");

    let status = Command::new("yt-dlp")
        .arg("-f")
        .arg("bestaudio")
        .arg("--no-playlist")
        .arg("--print-to-file")
        .arg("%(title)s")
        .arg(&title_path)
        .arg("-o")
        .arg(&dl_path)
        .arg(url)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map_err(|e| AnalysisError::DecodingError(format!("Failed to run yt-dlp: {}", e)))?;

    if !status.success() {
        std::fs::remove_file(&dl_path).ok();
        std::fs::remove_file(&title_path).ok();
        return Err(AnalysisError::DecodingError(format!(
            "yt-dlp failed to download audio from: {}",
            url
        )));
    }

    let title = std::fs::read_to_string(&title_path)
        .ok()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty());
    std::fs::remove_file(&title_path).ok();

    let status = Command::new("ffmpeg")
        .arg("-y")
        .arg("-i")
        .arg(&dl_path)
        .arg("-vn")
        .arg("-acodec")
        .arg("pcm_s16le")
        .arg("-ar")
        .arg("44100")
        .arg("-ac")
        .arg("2")
        .arg(&wav_path)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map_err(|e| AnalysisError::DecodingError(format!("Failed to run ffmpeg: {}", e)));

    std::fs::remove_file(&dl_path).ok();

    let status = match status {
        Ok(s) => s,
        Err(e) => {
            std::fs::remove_file(&wav_path).ok();
            return Err(e);
        }
    };

    if !status.success() {
        std::fs::remove_file(&wav_path).ok();
        return Err(AnalysisError::DecodingError(
            "ffmpeg failed to convert downloaded audio".to_string(),
        ));
    }

    let result = wav::read_wav(&wav_path);
    std::fs::remove_file(&wav_path).ok();

    let mut audio = result?;
    audio.title = title;
    Ok(audio)
}

fn first_title(revision: Option<&symphonia::core::meta::MetadataRevision>) -> Option<String> {
    let revision = revision?;
    revision
        .tags()
        .iter()
        .find(|tag| tag.std_key == Some(StandardTagKey::TrackTitle))
        .map(|tag| tag.value.to_string())
}
