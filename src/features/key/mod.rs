//! Musical key detection
//!
//! Correlates the chromagram against Krumhansl-Kessler profiles rotated to
//! all 24 (root, mode) hypotheses and reports the best match. Confidence is
//! the margin between the best and second-best correlation, so an ambiguous
//! tonality (two keys fitting almost equally well) scores near zero even
//! when the winning correlation is high.

mod chroma;
pub mod templates;

use serde::{Deserialize, Serialize};

use crate::error::AnalysisError;
use crate::io::buffer::AudioBuffer;
use templates::{rotate_profile, MAJOR_PROFILE, MINOR_PROFILE};

/// Musical key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Key {
    /// Major key (0 = C, 1 = C#, ..., 11 = B)
    Major(u32),
    /// Minor key (0 = C, 1 = C#, ..., 11 = B)
    Minor(u32),
}

impl Key {
    /// Key name in musical notation (e.g. "C", "F#", "Am", "D#m")
    pub fn name(&self) -> String {
        let note_names = [
            "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
        ];
        match self {
            Key::Major(i) => note_names[*i as usize % 12].to_string(),
            Key::Minor(i) => format!("{}m", note_names[*i as usize % 12]),
        }
    }

    /// Root pitch class in [0, 11]
    pub fn root(&self) -> u32 {
        match self {
            Key::Major(i) | Key::Minor(i) => *i % 12,
        }
    }

    /// True for minor keys
    pub fn is_minor(&self) -> bool {
        matches!(self, Key::Minor(_))
    }
}

impl std::fmt::Display for Key {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Detected key with its correlation and margin over the runner-up
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyEstimate {
    /// Winning key
    pub key: Key,

    /// Pearson correlation of the winning profile in [-1, 1]
    pub correlation: f32,

    /// Margin between the best and second-best correlation
    pub confidence: f32,
}

/// Detect the musical key of a mono buffer
///
/// # Errors
///
/// Returns `AnalysisError::InvalidInput` for non-mono input or a zero sample
/// rate. A buffer shorter than one chroma frame yields a zero chromagram and
/// therefore `C major` with zero correlation and confidence.
pub fn detect_key(mono_audio: &AudioBuffer) -> Result<KeyEstimate, AnalysisError> {
    if mono_audio.channels != 1 {
        return Err(AnalysisError::InvalidInput(format!(
            "Key detection expects mono audio, got {} channels",
            mono_audio.channels
        )));
    }
    if mono_audio.sample_rate == 0 {
        return Err(AnalysisError::InvalidInput(
            "Key detection requires a positive sample rate".to_string(),
        ));
    }

    let chroma = chroma::compute_chromagram(mono_audio)?;

    let mut best_corr = -2.0f32;
    let mut second_best_corr = -2.0f32;
    let mut best_root = 0usize;
    let mut best_is_major = true;

    for root in 0..12 {
        let corr_major = pearson_correlation(&chroma, &rotate_profile(&MAJOR_PROFILE, root));
        let corr_minor = pearson_correlation(&chroma, &rotate_profile(&MINOR_PROFILE, root));

        if corr_major > best_corr {
            second_best_corr = best_corr;
            best_corr = corr_major;
            best_root = root;
            best_is_major = true;
        } else if corr_major > second_best_corr {
            second_best_corr = corr_major;
        }

        if corr_minor > best_corr {
            second_best_corr = best_corr;
            best_corr = corr_minor;
            best_root = root;
            best_is_major = false;
        } else if corr_minor > second_best_corr {
            second_best_corr = corr_minor;
        }
    }

    let key = if best_is_major {
        Key::Major(best_root as u32)
    } else {
        Key::Minor(best_root as u32)
    };

    let estimate = KeyEstimate {
        key,
        correlation: best_corr,
        confidence: best_corr - second_best_corr,
    };

    log::debug!(
        "Key detection: {} (r={:.3}, confidence={:.3})",
        estimate.key,
        estimate.correlation,
        estimate.confidence
    );

    Ok(estimate)
}

/// Pearson correlation between two 12-bin vectors
fn pearson_correlation(x: &[f32; 12], y: &[f32; 12]) -> f32 {
    let mean_x: f32 = x.iter().sum::<f32>() / 12.0;
    let mean_y: f32 = y.iter().sum::<f32>() / 12.0;

    let mut num = 0.0f32;
    let mut den_x = 0.0f32;
    let mut den_y = 0.0f32;
    for i in 0..12 {
        let dx = x[i] - mean_x;
        let dy = y[i] - mean_y;
        num += dx * dy;
        den_x += dx * dx;
        den_y += dy * dy;
    }

    let den = (den_x * den_y).sqrt();
    if den < 1e-12 {
        return 0.0;
    }
    num / den
}
