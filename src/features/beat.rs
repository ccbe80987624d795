//! Dynamic-programming beat tracking
//!
//! Given a target period, finds the beat sequence maximizing accumulated
//! onset strength minus a tempo-deviation penalty. For each frame `t` the
//! recurrence considers predecessors at lags between half and double the
//! period:
//!
//! ```text
//! score[t] = onset[t] + max(0, max over p of score[p] - alpha * ln(lag / period)^2)
//! ```
//!
//! The best chain ending in the final 10% of the envelope is backtracked to
//! recover the beats.
//!
//! # Reference
//!
//! Ellis, D. P. W. (2007). Beat Tracking by Dynamic Programming.
//! *Journal of New Music Research*, 36(1), 51-60.

/// Default weight of the squared log-ratio tempo penalty
pub const DEFAULT_TEMPO_PENALTY: f64 = 680.0;

/// Beat sequence with its dynamic-programming score
#[derive(Debug, Clone, Default)]
pub struct BeatTrack {
    /// Beat positions as sample indices, strictly increasing
    pub beat_samples: Vec<usize>,

    /// Total score of the winning chain
    pub score: f64,
}

/// Track beats through an onset envelope at the given period
///
/// # Arguments
///
/// * `onset_strength` - Onset envelope (z-score normalized)
/// * `period_frames` - Target beat period in envelope frames
/// * `hop_size` - Envelope hop size, used to convert frames to samples
/// * `alpha` - Tempo-deviation penalty weight (see [`DEFAULT_TEMPO_PENALTY`])
///
/// An empty envelope or a zero period or hop size yields an empty result.
pub fn track_beats(
    onset_strength: &[f32],
    period_frames: usize,
    hop_size: usize,
    alpha: f64,
) -> BeatTrack {
    if period_frames == 0 || hop_size == 0 || onset_strength.is_empty() {
        return BeatTrack::default();
    }

    let total_frames = onset_strength.len();
    let period = period_frames as f64;
    let min_lag = ((period * 0.5).round() as usize).max(1);
    let max_lag = ((period * 2.0).round() as usize).max(min_lag + 1);

    let mut dp = vec![f64::NEG_INFINITY; total_frames];
    let mut prev = vec![-1isize; total_frames];

    for t in 0..total_frames {
        let mut best_score = onset_strength[t] as f64;
        let mut best_prev = -1isize;

        let start = t.saturating_sub(max_lag);
        let end = t.saturating_sub(min_lag);
        for p in start..=end {
            let lag = t - p;
            if lag == 0 {
                continue;
            }
            let log_ratio = (lag as f64 / period).ln();
            let penalty = alpha * log_ratio * log_ratio;
            let score = dp[p] + onset_strength[t] as f64 - penalty;
            if score > best_score {
                best_score = score;
                best_prev = p as isize;
            }
        }

        dp[t] = best_score;
        prev[t] = best_prev;
    }

    // Take the best chain ending in the final 10% of the envelope.
    let search_start = ((total_frames as f64 * 0.9) as usize).min(total_frames - 1);
    let mut best_end = search_start;
    let mut best_score = dp[search_start];
    for (t, &score) in dp.iter().enumerate().skip(search_start) {
        if score > best_score {
            best_score = score;
            best_end = t;
        }
    }

    let mut beat_frames = Vec::new();
    let mut idx = best_end as isize;
    while idx >= 0 {
        beat_frames.push(idx as usize);
        idx = prev[idx as usize];
    }
    beat_frames.reverse();

    log::debug!(
        "Beat tracking: period {} frames, {} beats, score {:.2}",
        period_frames,
        beat_frames.len(),
        best_score
    );

    BeatTrack {
        beat_samples: beat_frames.iter().map(|&f| f * hop_size).collect(),
        score: best_score,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Envelope with impulses of the given height every `period` frames,
    /// a slightly negative floor elsewhere (as a z-scored envelope has)
    fn impulse_envelope(len: usize, period: usize, height: f32) -> Vec<f32> {
        let mut envelope = vec![-0.2f32; len];
        let mut i = 0;
        while i < len {
            envelope[i] = height;
            i += period;
        }
        envelope
    }

    #[test]
    fn test_beats_land_on_impulses() {
        let envelope = impulse_envelope(430, 43, 3.0);
        let result = track_beats(&envelope, 43, 512, DEFAULT_TEMPO_PENALTY);

        assert!(!result.beat_samples.is_empty());
        for &beat in &result.beat_samples {
            let frame = beat / 512;
            assert_eq!(
                frame % 43,
                0,
                "Beat at frame {} should align with the impulse grid",
                frame
            );
        }
    }

    #[test]
    fn test_beat_spacing_within_tempo_window() {
        let envelope = impulse_envelope(2500, 43, 3.0);
        let result = track_beats(&envelope, 43, 512, DEFAULT_TEMPO_PENALTY);

        assert!(result.beat_samples.len() > 10);
        let period_samples = 43.0 * 512.0;
        for pair in result.beat_samples.windows(2) {
            let gap = (pair[1] - pair[0]) as f64;
            assert!(pair[1] > pair[0], "Beats must be strictly increasing");
            assert!(
                gap >= 0.5 * period_samples && gap <= 2.0 * period_samples,
                "Beat gap {} outside [0.5, 2.0] x period",
                gap
            );
        }
    }

    #[test]
    fn test_beat_indices_within_source() {
        let envelope = impulse_envelope(1000, 43, 3.0);
        let result = track_beats(&envelope, 43, 512, DEFAULT_TEMPO_PENALTY);
        for &beat in &result.beat_samples {
            assert!(beat < 1000 * 512, "Beat sample {} out of range", beat);
        }
    }

    #[test]
    fn test_empty_envelope() {
        let result = track_beats(&[], 43, 512, DEFAULT_TEMPO_PENALTY);
        assert!(result.beat_samples.is_empty());
        assert_eq!(result.score, 0.0);
    }

    #[test]
    fn test_zero_period() {
        let envelope = impulse_envelope(100, 10, 1.0);
        let result = track_beats(&envelope, 0, 512, DEFAULT_TEMPO_PENALTY);
        assert!(result.beat_samples.is_empty());
    }

    #[test]
    fn test_single_frame_envelope() {
        let result = track_beats(&[1.0], 43, 512, DEFAULT_TEMPO_PENALTY);
        assert_eq!(result.beat_samples, vec![0]);
    }

    #[test]
    fn test_score_accumulates_onsets() {
        // The chain through N strong impulses should score roughly the sum
        // of their heights, since on-grid steps carry no penalty.
        let envelope = impulse_envelope(430, 43, 2.0);
        let result = track_beats(&envelope, 43, 512, DEFAULT_TEMPO_PENALTY);
        assert!(
            result.score > 2.0 * (result.beat_samples.len() as f64 - 1.0),
            "Score {} too low for {} beats",
            result.score,
            result.beat_samples.len()
        );
    }
}
