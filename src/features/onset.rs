//! Onset-strength extraction
//!
//! Computes a spectral-flux onset envelope from a mel-filtered log-power
//! spectrogram:
//!
//! 1. Hann-window each frame and compute the power spectrum
//! 2. Map power to overlapping triangular mel filters (30 Hz - 8 kHz)
//! 3. Take `log10(energy + 1e-10)` per band
//! 4. Sum the positive band-wise differences against the previous frame
//! 5. Z-score normalize the resulting envelope
//!
//! The envelope has one value per hop; frame `t` covers samples
//! `[t * hop_size, t * hop_size + fft_size)`.

use rustfft::num_complex::Complex;
use rustfft::FftPlanner;

use crate::error::AnalysisError;
use crate::io::buffer::AudioBuffer;

/// Onset-strength envelope at a fixed frame rate
#[derive(Debug, Clone, Default)]
pub struct OnsetEnvelope {
    /// Z-score normalized onset strength, one value per frame
    pub strength: Vec<f32>,

    /// Hop size in samples between frames
    pub hop_size: usize,

    /// FFT size used for the spectrogram
    pub fft_size: usize,
}

/// Compute the onset-strength envelope of a mono buffer
///
/// # Arguments
///
/// * `mono_audio` - Mono audio buffer
/// * `fft_size` - FFT size, must be even (typically 2048)
/// * `hop_size` - Hop between frames in samples (typically 512)
/// * `mel_bands` - Number of mel filterbank bands (typically 40)
///
/// # Errors
///
/// Returns `AnalysisError::InvalidInput` for non-mono input, a zero sample
/// rate, an odd FFT size, or a zero hop size. Audio shorter than one FFT
/// frame yields an empty envelope, not an error.
pub fn compute_onset_strength(
    mono_audio: &AudioBuffer,
    fft_size: usize,
    hop_size: usize,
    mel_bands: usize,
) -> Result<OnsetEnvelope, AnalysisError> {
    if mono_audio.channels != 1 {
        return Err(AnalysisError::InvalidInput(format!(
            "Onset extraction expects mono audio, got {} channels",
            mono_audio.channels
        )));
    }
    if mono_audio.sample_rate == 0 {
        return Err(AnalysisError::InvalidInput(
            "Onset extraction requires a positive sample rate".to_string(),
        ));
    }
    if fft_size == 0 || fft_size % 2 != 0 {
        return Err(AnalysisError::InvalidInput(format!(
            "Onset extraction requires an even FFT size, got {}",
            fft_size
        )));
    }
    if hop_size == 0 || mel_bands == 0 {
        return Err(AnalysisError::InvalidInput(
            "Hop size and mel band count must be > 0".to_string(),
        ));
    }

    let samples = &mono_audio.samples;
    let frames = if samples.len() >= fft_size {
        1 + (samples.len() - fft_size) / hop_size
    } else {
        0
    };

    if frames == 0 {
        return Ok(OnsetEnvelope {
            strength: Vec::new(),
            hop_size,
            fft_size,
        });
    }

    log::debug!(
        "Computing onset strength: {} samples, fft={}, hop={}, {} frames",
        samples.len(),
        fft_size,
        hop_size,
        frames
    );

    let window = hann_window(fft_size);
    let filters = mel_filterbank(mono_audio.sample_rate, fft_size, mel_bands);

    let mut planner = FftPlanner::<f64>::new();
    let fft = planner.plan_fft_forward(fft_size);

    let mut frame_buf = vec![Complex::new(0.0f64, 0.0f64); fft_size];
    let mut power_spectrum = vec![0.0f64; fft_size / 2 + 1];
    let mut prev_mel = vec![0.0f32; mel_bands];
    let mut onset_strength = Vec::with_capacity(frames);

    for frame_idx in 0..frames {
        let offset = frame_idx * hop_size;
        for i in 0..fft_size {
            frame_buf[i] = Complex::new((samples[offset + i] * window[i]) as f64, 0.0);
        }

        fft.process(&mut frame_buf);

        for (bin, power) in power_spectrum.iter_mut().enumerate() {
            *power = frame_buf[bin].norm_sqr();
        }

        let mut flux = 0.0f32;
        let mut mel_energy = vec![0.0f32; mel_bands];
        for (band, filter) in filters.iter().enumerate() {
            let sum: f64 = power_spectrum
                .iter()
                .zip(filter.iter())
                .map(|(&p, &w)| p * w as f64)
                .sum();
            mel_energy[band] = (sum + 1e-10).log10() as f32;

            let diff = mel_energy[band] - prev_mel[band];
            if diff > 0.0 {
                flux += diff;
            }
        }

        onset_strength.push(flux);
        prev_mel = mel_energy;
    }

    zscore_normalize(&mut onset_strength);

    Ok(OnsetEnvelope {
        strength: onset_strength,
        hop_size,
        fft_size,
    })
}

/// Z-score normalize in place when the deviation is meaningful
fn zscore_normalize(values: &mut [f32]) {
    if values.is_empty() {
        return;
    }
    let n = values.len() as f64;
    let mean = values.iter().map(|&v| v as f64).sum::<f64>() / n;
    let variance = values
        .iter()
        .map(|&v| {
            let d = v as f64 - mean;
            d * d
        })
        .sum::<f64>()
        / n;
    let stddev = variance.sqrt();
    if stddev > 1e-6 {
        for v in values.iter_mut() {
            *v = ((*v as f64 - mean) / stddev) as f32;
        }
    }
}

fn hann_window(fft_size: usize) -> Vec<f32> {
    let denom = (fft_size - 1) as f32;
    (0..fft_size)
        .map(|i| 0.5 - 0.5 * (2.0 * std::f32::consts::PI * i as f32 / denom).cos())
        .collect()
}

/// Build `mel_bands` triangular filters over the power-spectrum bins
///
/// Filter edges are `mel_bands + 2` equally spaced points on the mel scale
/// between 30 Hz and 8 kHz. Adjacent triangles share a vertex; degenerate
/// (zero-width) slopes are widened by one bin so every band has support.
fn mel_filterbank(sample_rate: u32, fft_size: usize, mel_bands: usize) -> Vec<Vec<f32>> {
    let low_mel = hz_to_mel(30.0);
    let high_mel = hz_to_mel(8000.0);

    let num_bins = fft_size / 2 + 1;
    let mut bin_points = Vec::with_capacity(mel_bands + 2);
    for i in 0..mel_bands + 2 {
        let t = i as f32 / (mel_bands + 1) as f32;
        let hz = mel_to_hz(low_mel + t * (high_mel - low_mel));
        let bin = ((fft_size + 1) as f32 * hz / sample_rate as f32).floor() as isize;
        bin_points.push(bin.clamp(0, (fft_size / 2) as isize) as usize);
    }

    let mut filters = vec![vec![0.0f32; num_bins]; mel_bands];
    for (band, filter) in filters.iter_mut().enumerate() {
        let left = bin_points[band];
        let mut center = bin_points[band + 1];
        if center == left {
            center = left + 1;
        }
        let mut right = bin_points[band + 2];
        if right == center {
            right = center + 1;
        }

        for bin in left..center {
            if bin < num_bins {
                filter[bin] = (bin - left) as f32 / (center - left) as f32;
            }
        }
        for bin in center..right {
            if bin < num_bins {
                filter[bin] = (right - bin) as f32 / (right - center) as f32;
            }
        }
    }

    filters
}

fn hz_to_mel(hz: f32) -> f32 {
    2595.0 * (1.0 + hz / 700.0).log10()
}

fn mel_to_hz(mel: f32) -> f32 {
    700.0 * (10.0f32.powf(mel / 2595.0) - 1.0)
}
