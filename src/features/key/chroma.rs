//! Per-octave interpolated chromagram
//!
//! Accumulates spectral power into one 12-bin accumulator per octave, with
//! each FFT bin contributing to its two nearest pitch classes proportionally
//! to distance. Low frequencies, where FFT bin spacing exceeds semitone
//! spacing, would otherwise be mapped with a systematic bias.
//!
//! Octaves are L1-normalized independently and then averaged, so strong
//! high-frequency harmonics cannot dominate the final chroma.

use rustfft::num_complex::Complex;
use rustfft::FftPlanner;

use crate::error::AnalysisError;
use crate::io::buffer::AudioBuffer;

/// FFT size for chroma frames
pub(super) const CHROMA_FFT_SIZE: usize = 4096;

/// Hop between chroma frames (non-overlapping)
pub(super) const CHROMA_HOP_SIZE: usize = 4096;

/// Lower edge of the pitch band: C2
const MIN_FREQ_HZ: f32 = 65.4;

/// Upper edge of the pitch band: C7
const MAX_FREQ_HZ: f32 = 2093.0;

/// Reference frequency for pitch mapping: C0
const C0_HZ: f32 = 16.3516;

/// FFT bin contribution to the chromagram
#[derive(Debug, Clone, Copy)]
struct BinMapping {
    chroma_lo: usize,
    chroma_hi: usize,
    weight_hi: f32,
    octave: usize,
}

/// Compute the 12-bin chromagram of a mono buffer
///
/// Input shorter than one FFT frame yields an all-zero chromagram.
pub(super) fn compute_chromagram(mono_audio: &AudioBuffer) -> Result<[f32; 12], AnalysisError> {
    let mut chroma = [0.0f32; 12];

    let samples = &mono_audio.samples;
    if samples.len() < CHROMA_FFT_SIZE {
        return Ok(chroma);
    }

    let window: Vec<f32> = {
        let denom = (CHROMA_FFT_SIZE - 1) as f32;
        (0..CHROMA_FFT_SIZE)
            .map(|i| 0.5 - 0.5 * (2.0 * std::f32::consts::PI * i as f32 / denom).cos())
            .collect()
    };

    // Octave range covered by the pitch band.
    let min_octave = (12.0 * (MIN_FREQ_HZ / C0_HZ).log2() / 12.0).floor() as i32;
    let max_octave = (12.0 * (MAX_FREQ_HZ / C0_HZ).log2() / 12.0).floor() as i32;
    let n_octaves = (max_octave - min_octave + 1) as usize;

    // Pre-computed bin-to-chroma mapping with octave index.
    let sr = mono_audio.sample_rate as f32;
    let num_bins = CHROMA_FFT_SIZE / 2 + 1;
    let mut bin_map: Vec<Option<BinMapping>> = vec![None; num_bins];
    for (k, mapping) in bin_map.iter_mut().enumerate().skip(1) {
        let freq = k as f32 * sr / CHROMA_FFT_SIZE as f32;
        if !(MIN_FREQ_HZ..=MAX_FREQ_HZ).contains(&freq) {
            continue;
        }
        let pitch = 12.0 * (freq / C0_HZ).log2();
        let pitch_floor = pitch.floor();
        let pc_lo = (pitch_floor as i32).rem_euclid(12) as usize;
        let octave = ((pitch / 12.0).floor() as i32 - min_octave).clamp(0, n_octaves as i32 - 1);

        *mapping = Some(BinMapping {
            chroma_lo: pc_lo,
            chroma_hi: (pc_lo + 1) % 12,
            weight_hi: pitch - pitch_floor,
            octave: octave as usize,
        });
    }

    let mut planner = FftPlanner::<f64>::new();
    let fft = planner.plan_fft_forward(CHROMA_FFT_SIZE);

    let num_frames = 1 + (samples.len() - CHROMA_FFT_SIZE) / CHROMA_HOP_SIZE;
    let mut octave_chroma = vec![[0.0f32; 12]; n_octaves];
    let mut frame_buf = vec![Complex::new(0.0f64, 0.0f64); CHROMA_FFT_SIZE];

    for frame_idx in 0..num_frames {
        let offset = frame_idx * CHROMA_HOP_SIZE;
        for i in 0..CHROMA_FFT_SIZE {
            frame_buf[i] = Complex::new((samples[offset + i] * window[i]) as f64, 0.0);
        }

        fft.process(&mut frame_buf);

        for (k, mapping) in bin_map.iter().enumerate().take(CHROMA_FFT_SIZE / 2).skip(1) {
            let Some(m) = mapping else { continue };
            let power = frame_buf[k].norm_sqr() as f32;
            let oc = &mut octave_chroma[m.octave];
            oc[m.chroma_lo] += power * (1.0 - m.weight_hi);
            oc[m.chroma_hi] += power * m.weight_hi;
        }
    }

    // Normalize each octave independently, then average across the octaves
    // that carried any energy.
    let mut contributing = 0usize;
    for oc in &octave_chroma {
        let total: f32 = oc.iter().sum();
        if total < 1e-12 {
            continue;
        }
        for (slot, value) in chroma.iter_mut().zip(oc.iter()) {
            *slot += value / total;
        }
        contributing += 1;
    }

    if contributing > 0 {
        let scale = 1.0 / contributing as f32;
        for value in &mut chroma {
            *value *= scale;
        }
    }

    log::debug!(
        "Chromagram: {} frames, {} contributing octaves",
        num_frames,
        contributing
    );

    Ok(chroma)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn sine(freq: f64, seconds: f64, sample_rate: u32) -> Vec<f32> {
        let n = (seconds * sample_rate as f64) as usize;
        (0..n)
            .map(|i| {
                (2.0 * std::f64::consts::PI * freq * i as f64 / sample_rate as f64).sin() as f32
            })
            .collect()
    }

    /// A tone centered exactly on FFT bin 41 (~441.4 Hz, pitch class A).
    ///
    /// Bin-exact tones leave no spectral leakage into other octaves, so the
    /// chroma assertions do not depend on leakage behavior.
    fn bin_exact_a() -> f64 {
        41.0 * 44100.0 / 4096.0
    }

    #[test]
    fn test_chroma_short_input_is_zero() {
        let buffer = AudioBuffer::new(vec![0.5; 1000], 44100, 1);
        let chroma = compute_chromagram(&buffer).unwrap();
        assert!(chroma.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_chroma_sums_to_one_when_energy_present() {
        let buffer = AudioBuffer::new(sine(bin_exact_a(), 2.0, 44100), 44100, 1);
        let chroma = compute_chromagram(&buffer).unwrap();

        // Octave-averaged chroma must sum to ~1 whenever any octave
        // contributed.
        let sum: f32 = chroma.iter().sum();
        assert_abs_diff_eq!(sum, 1.0, epsilon = 1e-3);
        assert!(chroma.iter().all(|&v| v >= 0.0));
    }

    #[test]
    fn test_chroma_peak_at_played_pitch_class() {
        let buffer = AudioBuffer::new(sine(bin_exact_a(), 2.0, 44100), 44100, 1);
        let chroma = compute_chromagram(&buffer).unwrap();

        let peak = chroma
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap())
            .map(|(i, _)| i)
            .unwrap();
        assert_eq!(peak, 9, "Expected peak at A, chroma: {:?}", chroma);
    }

    #[test]
    fn test_chroma_silence_contributes_nothing() {
        let buffer = AudioBuffer::new(vec![0.0; 44100], 44100, 1);
        let chroma = compute_chromagram(&buffer).unwrap();
        assert!(chroma.iter().all(|&v| v == 0.0));
    }
}
