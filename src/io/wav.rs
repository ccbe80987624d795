//! Minimal RIFF/WAVE reader and writer for PCM-16 audio
//!
//! The reader accepts only uncompressed 16-bit PCM and skips any non-`data`
//! chunks (LIST/INFO metadata and the like). The writer always emits a
//! canonical 44-byte header followed by little-endian PCM-16 data.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::error::AnalysisError;
use crate::io::buffer::AudioBuffer;

/// Read a PCM-16 WAV file into an [`AudioBuffer`]
pub fn read_wav<P: AsRef<Path>>(path: P) -> Result<AudioBuffer, AnalysisError> {
    let path = path.as_ref();
    let file = File::open(path)
        .map_err(|e| AnalysisError::IoError(format!("Failed to open {}: {}", path.display(), e)))?;
    let mut reader = BufReader::new(file);

    expect_tag(&mut reader, b"RIFF")?;
    reader.read_u32::<LittleEndian>()?; // chunk size, ignored
    expect_tag(&mut reader, b"WAVE")?;

    expect_tag(&mut reader, b"fmt ")?;
    let fmt_size = reader.read_u32::<LittleEndian>()?;
    let audio_format = reader.read_u16::<LittleEndian>()?;
    let channels = reader.read_u16::<LittleEndian>()?;
    let sample_rate = reader.read_u32::<LittleEndian>()?;
    reader.read_u32::<LittleEndian>()?; // byte rate, ignored
    reader.read_u16::<LittleEndian>()?; // block align, ignored
    let bits_per_sample = reader.read_u16::<LittleEndian>()?;

    if fmt_size > 16 {
        reader.seek(SeekFrom::Current((fmt_size - 16) as i64))?;
    }

    if audio_format != 1 {
        return Err(AnalysisError::DecodingError(
            "WAV file is not PCM format".to_string(),
        ));
    }
    if bits_per_sample != 16 {
        return Err(AnalysisError::DecodingError(
            "WAV file is not 16-bit".to_string(),
        ));
    }

    // Find the data chunk, skipping anything else (LIST, INFO, fact...).
    let data_size = loop {
        let mut chunk_id = [0u8; 4];
        if reader.read_exact(&mut chunk_id).is_err() {
            return Err(AnalysisError::DecodingError(
                "WAV file has no data chunk".to_string(),
            ));
        }
        let chunk_size = reader.read_u32::<LittleEndian>()?;
        if &chunk_id == b"data" {
            break chunk_size;
        }
        reader.seek(SeekFrom::Current(chunk_size as i64))?;
    };

    let num_samples = (data_size / 2) as usize;
    let mut samples = Vec::with_capacity(num_samples);
    for _ in 0..num_samples {
        let value = reader.read_i16::<LittleEndian>()?;
        samples.push(value as f32 / 32768.0);
    }

    log::debug!(
        "Read WAV {}: {} samples, {} Hz, {} channels",
        path.display(),
        samples.len(),
        sample_rate,
        channels
    );

    Ok(AudioBuffer::new(samples, sample_rate, channels as usize))
}

/// Write an [`AudioBuffer`] to a PCM-16 WAV file
///
/// Samples are clipped to [-1.0, 1.0] before quantization.
pub fn write_wav<P: AsRef<Path>>(path: P, audio: &AudioBuffer) -> Result<(), AnalysisError> {
    let path = path.as_ref();
    if audio.sample_rate == 0 || audio.channels == 0 {
        return Err(AnalysisError::InvalidInput(
            "Audio buffer has no sample rate or channels".to_string(),
        ));
    }

    let file = File::create(path)
        .map_err(|e| AnalysisError::IoError(format!("Failed to create {}: {}", path.display(), e)))?;
    let mut writer = BufWriter::new(file);

    let num_samples = audio.samples.len() as u32;
    let data_bytes = num_samples * 2;
    let channels = audio.channels as u16;
    let bits_per_sample: u16 = 16;
    let block_align = channels * (bits_per_sample / 8);
    let byte_rate = audio.sample_rate * block_align as u32;

    writer.write_all(b"RIFF")?;
    writer.write_u32::<LittleEndian>(36 + data_bytes)?;
    writer.write_all(b"WAVE")?;
    writer.write_all(b"fmt ")?;
    writer.write_u32::<LittleEndian>(16)?;
    writer.write_u16::<LittleEndian>(1)?;
    writer.write_u16::<LittleEndian>(channels)?;
    writer.write_u32::<LittleEndian>(audio.sample_rate)?;
    writer.write_u32::<LittleEndian>(byte_rate)?;
    writer.write_u16::<LittleEndian>(block_align)?;
    writer.write_u16::<LittleEndian>(bits_per_sample)?;
    writer.write_all(b"data")?;
    writer.write_u32::<LittleEndian>(data_bytes)?;

    for &sample in &audio.samples {
        let clamped = sample.clamp(-1.0, 1.0);
        writer.write_i16::<LittleEndian>((clamped * 32767.0).round() as i16)?;
    }

    writer.flush()?;
    Ok(())
}

fn expect_tag<R: Read>(reader: &mut R, expected: &[u8; 4]) -> Result<(), AnalysisError> {
    let mut tag = [0u8; 4];
    reader.read_exact(&mut tag)?;
    if &tag != expected {
        return Err(AnalysisError::DecodingError(format!(
            "WAV parse error: expected '{}' tag",
            String::from_utf8_lossy(expected)
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn temp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(name)
    }

    #[test]
    fn test_wav_roundtrip() {
        let original = AudioBuffer::new(vec![0.0, 0.5, -0.5, 1.0, -1.0, 0.25], 44100, 2);
        let path = temp_path("cadenza_wav_roundtrip.wav");

        write_wav(&path, &original).unwrap();
        let read_back = read_wav(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(read_back.sample_rate, 44100);
        assert_eq!(read_back.channels, 2);
        assert_eq!(read_back.samples.len(), original.samples.len());
        for (a, b) in original.samples.iter().zip(read_back.samples.iter()) {
            assert_abs_diff_eq!(*a, *b, epsilon = 1.0 / 32000.0);
        }
    }

    #[test]
    fn test_wav_writer_clips_out_of_range() {
        let original = AudioBuffer::new(vec![2.0, -3.0], 44100, 1);
        let path = temp_path("cadenza_wav_clip.wav");

        write_wav(&path, &original).unwrap();
        let read_back = read_wav(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_abs_diff_eq!(read_back.samples[0], 1.0, epsilon = 1e-3);
        assert_abs_diff_eq!(read_back.samples[1], -1.0, epsilon = 1e-3);
    }

    #[test]
    fn test_wav_writer_rejects_empty_format() {
        let bad = AudioBuffer::new(vec![0.0], 0, 1);
        let path = temp_path("cadenza_wav_invalid.wav");
        assert!(write_wav(&path, &bad).is_err());
    }

    #[test]
    fn test_read_wav_missing_file() {
        let result = read_wav("/nonexistent/cadenza_no_such.wav");
        assert!(result.is_err());
    }
}
