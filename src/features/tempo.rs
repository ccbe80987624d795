//! Tempo estimation from the onset-strength envelope
//!
//! Computes an unbiased autocorrelation over the candidate lag range, weights
//! it with a log-Gaussian prior centered at 120 BPM, and picks the strongest
//! lag. Sub-harmonics of the true period (2x, 3x, ...) always produce strong
//! autocorrelation peaks, so the raw argmax is then corrected:
//!
//! - Iterative halving walks toward the fastest tempo whose peak is genuine
//!   (above the median noise floor and at least half the current best).
//! - Estimates above 200 BPM fall back to the half tempo when the doubled
//!   lag is still in range.
//!
//! The returned BPM is refined by parabolic interpolation around the winning
//! lag; the integer lag and a set of alternative-octave lags are reported so
//! the caller can re-evaluate the choice against a beat tracker.

use crate::error::AnalysisError;

/// Center of the log-Gaussian tempo prior in BPM
const PRIOR_CENTER_BPM: f64 = 120.0;

/// Width of the tempo prior in octaves
const PRIOR_SIGMA: f64 = 1.0;

/// Tempo estimate with alternative-octave candidates
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TempoEstimate {
    /// Estimated tempo in beats per minute (parabolic-refined)
    pub bpm: f32,

    /// Winning autocorrelation lag in envelope frames
    pub period_frames: usize,

    /// Candidate periods, primary first, then in-range alternative octaves
    pub candidate_periods: Vec<usize>,
}

/// Estimate the tempo of an onset-strength envelope
///
/// # Arguments
///
/// * `onset_strength` - Onset envelope (z-score normalized)
/// * `sample_rate` - Audio sample rate in Hz
/// * `hop_size` - Envelope hop size in samples
/// * `min_bpm` / `max_bpm` - Tempo search range
///
/// # Errors
///
/// Returns `AnalysisError::InvalidInput` for a zero sample rate or hop size.
/// An envelope shorter than two frames, or a degenerate lag range after
/// clipping, yields a zero-initialized estimate.
///
/// # Example
///
/// ```
/// use cadenza_dsp::features::tempo::estimate_tempo;
///
/// // Impulses every 43 frames at 44.1 kHz / 512 hop: ~120 BPM.
/// let mut envelope = vec![0.0f32; 1000];
/// for frame in (0..1000).step_by(43) {
///     envelope[frame] = 1.0;
/// }
/// let estimate = estimate_tempo(&envelope, 44100, 512, 50.0, 220.0)?;
/// assert_eq!(estimate.period_frames, 43);
/// # Ok::<(), cadenza_dsp::AnalysisError>(())
/// ```
pub fn estimate_tempo(
    onset_strength: &[f32],
    sample_rate: u32,
    hop_size: usize,
    min_bpm: f32,
    max_bpm: f32,
) -> Result<TempoEstimate, AnalysisError> {
    if sample_rate == 0 || hop_size == 0 {
        return Err(AnalysisError::InvalidInput(
            "Tempo estimation requires positive sample rate and hop size".to_string(),
        ));
    }
    if onset_strength.len() < 2 {
        return Ok(TempoEstimate::default());
    }

    let frame_rate = sample_rate as f64 / hop_size as f64;
    let min_bpm = (min_bpm as f64).max(1.0);
    let max_bpm = (max_bpm as f64).max(min_bpm + 1.0);

    let max_lag = ((60.0 * frame_rate / min_bpm).floor() as usize).min(onset_strength.len() - 1);
    let min_lag = ((60.0 * frame_rate / max_bpm).ceil() as usize).max(1);

    if max_lag <= min_lag {
        return Ok(TempoEstimate::default());
    }

    // Unbiased autocorrelation over the candidate lag range.
    let mut autocorr = vec![0.0f64; max_lag + 1];
    for lag in min_lag..=max_lag {
        let count = onset_strength.len() - lag;
        let sum: f64 = (lag..onset_strength.len())
            .map(|i| onset_strength[i] as f64 * onset_strength[i - lag] as f64)
            .sum();
        autocorr[lag] = sum / count as f64;
    }

    // Log-Gaussian prior around 120 BPM, applied in the log2 tempo domain.
    let mut weighted = vec![0.0f64; max_lag + 1];
    let mut best_lag = min_lag;
    let mut best_score = f64::NEG_INFINITY;
    for lag in min_lag..=max_lag {
        let bpm = 60.0 * frame_rate / lag as f64;
        let log_ratio = (bpm / PRIOR_CENTER_BPM).log2();
        let prior = (-0.5 * (log_ratio * log_ratio) / (PRIOR_SIGMA * PRIOR_SIGMA)).exp();
        weighted[lag] = autocorr[lag] * prior;
        if weighted[lag] > best_score {
            best_score = weighted[lag];
            best_lag = lag;
        }
    }

    // Median weighted score as a noise floor estimate.
    let median_weighted = {
        let mut sorted: Vec<f64> = weighted[min_lag..=max_lag].to_vec();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        sorted[sorted.len() / 2]
    };

    // Octave correction: iteratively halve the lag while the half-tempo peak
    // is above the noise floor and at least half the strength of the parent.
    loop {
        let half_center = best_lag / 2;
        let search_lo = min_lag.max(half_center.saturating_sub(2));
        let search_hi = max_lag.min(half_center + 2);
        if search_lo > search_hi {
            break;
        }

        let mut half = search_lo;
        let mut best_half_score = f64::NEG_INFINITY;
        for lag in search_lo..=search_hi {
            if weighted[lag] > best_half_score {
                best_half_score = weighted[lag];
                half = lag;
            }
        }

        let parent_score = weighted[best_lag];
        if best_half_score > median_weighted && best_half_score > 0.5 * parent_score {
            log::debug!(
                "Octave correction: lag {} ({:.1} BPM) -> lag {} ({:.1} BPM)",
                best_lag,
                60.0 * frame_rate / best_lag as f64,
                half,
                60.0 * frame_rate / half as f64
            );
            best_lag = half;
        } else {
            break;
        }
    }

    // Half-tempo preference: above 200 BPM the estimate is almost certainly
    // a doubled tempo, so take the half when the doubled lag stays in range.
    let candidate_bpm = 60.0 * frame_rate / best_lag as f64;
    if candidate_bpm > 200.0 && best_lag * 2 <= max_lag {
        log::debug!(
            "Half-tempo correction: {:.1} BPM -> {:.1} BPM",
            candidate_bpm,
            candidate_bpm / 2.0
        );
        best_lag *= 2;
    }

    // Parabolic interpolation around the peak of the raw autocorrelation for
    // sub-lag BPM precision.
    let refined_lag = parabolic_interpolate(&autocorr, best_lag, min_lag, max_lag);
    let bpm = (60.0 * frame_rate / refined_lag) as f32;

    let candidate_periods = collect_candidates(best_lag, min_lag, max_lag, &weighted, median_weighted);

    log::debug!(
        "Tempo estimate: lag {} (refined {:.2}), {:.2} BPM, {} candidates",
        best_lag,
        refined_lag,
        bpm,
        candidate_periods.len()
    );

    Ok(TempoEstimate {
        bpm,
        period_frames: best_lag,
        candidate_periods,
    })
}

/// Alternative-octave periods for candidate re-evaluation
///
/// Primary lag first, then the 2x, 3x, 1/2, and 1/3 lags that fall inside
/// the search range and rise above the noise floor, de-duplicated in that
/// order.
fn collect_candidates(
    best_lag: usize,
    min_lag: usize,
    max_lag: usize,
    weighted: &[f64],
    median_weighted: f64,
) -> Vec<usize> {
    let alternates = [best_lag * 2, best_lag * 3, best_lag / 2, best_lag / 3];

    let mut candidates = vec![best_lag];
    for &lag in &alternates {
        if lag < min_lag || lag > max_lag {
            continue;
        }
        if weighted[lag] <= median_weighted {
            continue;
        }
        if !candidates.contains(&lag) {
            candidates.push(lag);
        }
    }
    candidates
}

/// Parabolic interpolation around a peak, returning the fractional lag
fn parabolic_interpolate(data: &[f64], peak: usize, lo: usize, hi: usize) -> f64 {
    if peak <= lo || peak >= hi {
        return peak as f64;
    }
    let a = data[peak - 1];
    let b = data[peak];
    let c = data[peak + 1];
    let denom = a - 2.0 * b + c;
    if denom.abs() < 1e-12 {
        return peak as f64;
    }
    peak as f64 + 0.5 * (a - c) / denom
}
