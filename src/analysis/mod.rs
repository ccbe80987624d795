//! Pipeline controller
//!
//! Wires the feature stages together and resolves tempo ambiguity. The
//! onset/rhythm leg and the key-detection leg are independent and run
//! concurrently; candidate beat-tracker runs are evaluated in candidate
//! order so results stay deterministic.

pub mod result;

use std::time::Instant;

use crate::config::AnalysisConfig;
use crate::error::AnalysisError;
use crate::features::beat::{self, BeatTrack};
use crate::features::key;
use crate::features::meter;
use crate::features::onset;
use crate::features::tempo;
use crate::io::buffer::AudioBuffer;

pub use result::{AnalysisMetadata, AnalysisResult};

/// Non-primary candidates must beat the primary's per-beat score by this
/// margin; sub-harmonics achieve slightly inflated scores through their
/// wider DP search windows.
const PRIMARY_MARGIN: f64 = 1.05;

/// Analyze an audio buffer: tempo, beats, meter, and key
///
/// The buffer may have any channel count; it is downmixed to mono before
/// analysis. Returns the aggregate result of the full pipeline.
///
/// # Errors
///
/// Returns `AnalysisError::InvalidInput` for an empty buffer or a zero
/// sample rate. Stage errors propagate unchanged.
pub fn analyze(
    audio: &AudioBuffer,
    config: &AnalysisConfig,
) -> Result<AnalysisResult, AnalysisError> {
    let start_time = Instant::now();

    if audio.samples.is_empty() {
        return Err(AnalysisError::InvalidInput(
            "Empty audio samples".to_string(),
        ));
    }
    if audio.sample_rate == 0 {
        return Err(AnalysisError::InvalidInput(
            "Invalid sample rate".to_string(),
        ));
    }
    if audio.channels == 0 {
        return Err(AnalysisError::InvalidInput("No audio channels".to_string()));
    }

    log::debug!(
        "Starting analysis: {} frames @ {} Hz, {} channels",
        audio.num_frames(),
        audio.sample_rate,
        audio.channels
    );

    let mono = audio.to_mono();

    // The key detector only needs the mono buffer, so it runs alongside the
    // onset extraction that feeds the rhythm stages.
    let (onset_result, key_result) = rayon::join(
        || onset::compute_onset_strength(&mono, config.fft_size, config.hop_size, config.mel_bands),
        || {
            if config.detect_key {
                Some(key::detect_key(&mono))
            } else {
                None
            }
        },
    );

    let envelope = onset_result?;
    let key_estimate = key_result.transpose()?;

    let tempo_estimate = tempo::estimate_tempo(
        &envelope.strength,
        mono.sample_rate,
        envelope.hop_size,
        config.min_bpm,
        config.max_bpm,
    )?;

    let frame_rate = mono.sample_rate as f64 / envelope.hop_size as f64;
    let primary_bpm = tempo_estimate.bpm as f64;

    // Evaluate each candidate period through the beat tracker. Candidates
    // outside +-30% of the primary estimate are skipped so sub-harmonics
    // don't distort the comparison; scores are normalized per beat so faster
    // tempos don't win by sheer beat count.
    let evaluations: Vec<Option<(BeatTrack, f64)>> = {
        use rayon::prelude::*;
        tempo_estimate
            .candidate_periods
            .par_iter()
            .map(|&candidate| {
                let candidate_bpm = if candidate > 0 {
                    60.0 * frame_rate / candidate as f64
                } else {
                    0.0
                };
                let ratio = if primary_bpm > 0.0 {
                    candidate_bpm / primary_bpm
                } else {
                    0.0
                };
                if !(0.7..=1.3).contains(&ratio) {
                    log::debug!(
                        "Candidate period {} ({:.1} BPM) skipped (outside +-30%)",
                        candidate,
                        candidate_bpm
                    );
                    return None;
                }

                let track = beat::track_beats(
                    &envelope.strength,
                    candidate,
                    envelope.hop_size,
                    config.tempo_penalty,
                );
                let norm_score = if track.beat_samples.is_empty() {
                    0.0
                } else {
                    track.score / track.beat_samples.len() as f64
                };
                log::debug!(
                    "Candidate period {} ({:.1} BPM): {} beats, norm score {:.3}",
                    candidate,
                    candidate_bpm,
                    track.beat_samples.len(),
                    norm_score
                );
                Some((track, norm_score))
            })
            .collect()
    };

    // Winner selection: the primary candidate is accepted by default; any
    // other candidate must beat the primary's normalized score by the margin.
    let mut beats = BeatTrack::default();
    let mut best_period = tempo_estimate.period_frames;
    let mut best_norm_score = f64::NEG_INFINITY;
    let mut primary_norm_score = f64::NEG_INFINITY;

    for (candidate, evaluation) in tempo_estimate
        .candidate_periods
        .iter()
        .zip(evaluations.into_iter())
    {
        let Some((track, norm_score)) = evaluation else {
            continue;
        };
        if *candidate == tempo_estimate.period_frames {
            primary_norm_score = norm_score;
        }

        let mut threshold = best_norm_score;
        if *candidate != tempo_estimate.period_frames && primary_norm_score > f64::NEG_INFINITY {
            threshold = threshold.max(primary_norm_score * PRIMARY_MARGIN);
        }
        if norm_score > threshold {
            best_norm_score = norm_score;
            beats = track;
            best_period = *candidate;
        }
    }

    // Recompute BPM from the winning period.
    let final_bpm = if best_period > 0 {
        (60.0 * frame_rate / best_period as f64) as f32
    } else {
        tempo_estimate.bpm
    };
    if best_period != tempo_estimate.period_frames {
        log::debug!(
            "Beat tracker re-estimated tempo: {:.2} BPM -> {:.2} BPM (period {})",
            tempo_estimate.bpm,
            final_bpm,
            best_period
        );
    }

    let meter_estimate = if config.detect_meter {
        meter::detect_meter(&beats.beat_samples, &envelope.strength, envelope.hop_size)
    } else {
        meter::MeterEstimate::default()
    };

    let processing_time_ms = start_time.elapsed().as_secs_f32() * 1000.0;
    log::debug!(
        "Analysis done in {:.1} ms: {:.2} BPM, {} beats, {}",
        processing_time_ms,
        final_bpm,
        beats.beat_samples.len(),
        meter_estimate.time_signature
    );

    Ok(AnalysisResult {
        bpm: final_bpm,
        beat_samples: beats.beat_samples,
        meter: meter_estimate,
        key: key_estimate,
        metadata: AnalysisMetadata {
            duration_seconds: audio.duration_seconds(),
            sample_rate: audio.sample_rate,
            processing_time_ms,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Stereo click train: identical impulses in both channels
    fn stereo_click_train(bpm: f64, seconds: f64, sample_rate: u32) -> AudioBuffer {
        let frames = (seconds * sample_rate as f64) as usize;
        let period = (60.0 / bpm * sample_rate as f64).round() as usize;
        let mut samples = vec![0.0f32; frames * 2];
        let mut pos = 0;
        while pos < frames {
            samples[pos * 2] = 1.0;
            samples[pos * 2 + 1] = 1.0;
            pos += period;
        }
        AudioBuffer::new(samples, sample_rate, 2)
    }

    #[test]
    fn test_analyze_rejects_empty_audio() {
        let audio = AudioBuffer::new(vec![], 44100, 2);
        assert!(analyze(&audio, &AnalysisConfig::default()).is_err());
    }

    #[test]
    fn test_analyze_rejects_zero_sample_rate() {
        let audio = AudioBuffer::new(vec![0.0; 1000], 0, 1);
        assert!(analyze(&audio, &AnalysisConfig::default()).is_err());
    }

    #[test]
    fn test_analyze_stereo_click_train() {
        let audio = stereo_click_train(120.0, 15.0, 44100);
        let result = analyze(&audio, &AnalysisConfig::default()).unwrap();

        assert!(
            (result.bpm - 120.0).abs() < 1.0,
            "Expected ~120 BPM, got {:.2}",
            result.bpm
        );
        assert!(!result.beat_samples.is_empty());
        assert!(result.key.is_some());
    }

    #[test]
    fn test_analyze_beat_invariants() {
        let audio = stereo_click_train(120.0, 15.0, 44100);
        let result = analyze(&audio, &AnalysisConfig::default()).unwrap();

        let num_mono_samples = audio.num_frames();
        for pair in result.beat_samples.windows(2) {
            assert!(pair[1] > pair[0], "Beats must be strictly increasing");
        }
        for &beat in &result.beat_samples {
            assert!(beat < num_mono_samples, "Beat index {} out of range", beat);
        }
    }

    #[test]
    fn test_analyze_no_meter_flag() {
        let audio = stereo_click_train(120.0, 10.0, 44100);
        let config = AnalysisConfig {
            detect_meter: false,
            ..AnalysisConfig::default()
        };
        let result = analyze(&audio, &config).unwrap();

        // Meter detection skipped: default 4/4 with no downbeats, while the
        // beat tracker still runs.
        assert!(!result.beat_samples.is_empty());
        assert!(result.meter.downbeat_samples.is_empty());
        assert_eq!(result.meter.confidence, 0.0);
    }

    #[test]
    fn test_analyze_no_key_flag() {
        let audio = stereo_click_train(120.0, 10.0, 44100);
        let config = AnalysisConfig {
            detect_key: false,
            ..AnalysisConfig::default()
        };
        let result = analyze(&audio, &config).unwrap();
        assert!(result.key.is_none());
    }

    #[test]
    fn test_analyze_silence_degenerates_gracefully() {
        // Silence is not an error: the flat envelope produces a degenerate
        // beat chain, and the meter detector falls back to 4/4 with zero
        // confidence.
        let audio = AudioBuffer::new(vec![0.0; 44100 * 5], 44100, 1);
        let result = analyze(&audio, &AnalysisConfig::default()).unwrap();

        assert!(result.beat_samples.len() < 8);
        assert_eq!(result.meter.time_signature, meter::TimeSignature::FourFour);
        assert_eq!(result.meter.confidence, 0.0);
    }

    #[test]
    fn test_analyze_too_short_for_envelope() {
        // Shorter than one FFT frame: empty envelope, zero tempo, no beats.
        let audio = AudioBuffer::new(vec![0.5; 1000], 44100, 1);
        let result = analyze(&audio, &AnalysisConfig::default()).unwrap();

        assert_eq!(result.bpm, 0.0);
        assert!(result.beat_samples.is_empty());
        assert_eq!(result.meter.confidence, 0.0);
    }
}
