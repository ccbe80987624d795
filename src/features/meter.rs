//! Meter detection from beat-level accent patterns
//!
//! Samples the onset envelope at each beat and tests groupings of 2, 3, and
//! 4 beats at every phase. Each hypothesis is scored by a blend of accent
//! contrast (how much the would-be downbeat stands out) and beat-level
//! autocorrelation. A ternary-subdivision check between consecutive beats
//! separates compound meter (6/8) from the simple meters.

use serde::{Deserialize, Serialize};

/// Relative weight of accent contrast in the hypothesis score
const ACCENT_WEIGHT: f32 = 0.7;

/// Relative weight of beat-level autocorrelation in the hypothesis score
const AUTOCORR_WEIGHT: f32 = 0.3;

/// Musical time signature
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeSignature {
    /// 2/4 time (simple duple)
    TwoFour,
    /// 3/4 time (waltz time)
    ThreeFour,
    /// 4/4 time (common time)
    FourFour,
    /// 6/8 time (compound duple)
    SixEight,
}

impl TimeSignature {
    /// Name in conventional notation ("4/4", "6/8", ...)
    pub fn name(&self) -> &'static str {
        match self {
            TimeSignature::TwoFour => "2/4",
            TimeSignature::ThreeFour => "3/4",
            TimeSignature::FourFour => "4/4",
            TimeSignature::SixEight => "6/8",
        }
    }
}

impl std::fmt::Display for TimeSignature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Detected meter with downbeat placement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeterEstimate {
    /// Detected time signature
    pub time_signature: TimeSignature,

    /// Beats per measure at the tracked beat level
    pub beats_per_measure: usize,

    /// Index within the beat sequence where the first downbeat falls
    pub downbeat_phase: usize,

    /// Detection confidence in [0, 1]
    pub confidence: f32,

    /// Downbeat positions as sample indices
    pub downbeat_samples: Vec<usize>,
}

impl Default for MeterEstimate {
    fn default() -> Self {
        Self {
            time_signature: TimeSignature::FourFour,
            beats_per_measure: 4,
            downbeat_phase: 0,
            confidence: 0.0,
            downbeat_samples: Vec::new(),
        }
    }
}

/// Detect the time signature and downbeat phase of a beat sequence
///
/// # Arguments
///
/// * `beat_samples` - Beat positions as sample indices
/// * `onset_strength` - Onset envelope the beats were tracked against
/// * `hop_size` - Envelope hop size in samples
///
/// Fewer than 8 beats force a 4/4 result with zero confidence.
pub fn detect_meter(
    beat_samples: &[usize],
    onset_strength: &[f32],
    hop_size: usize,
) -> MeterEstimate {
    let num_beats = beat_samples.len();

    if num_beats < 8 || hop_size == 0 {
        log::debug!(
            "Meter detection: too few beats ({}), defaulting to 4/4",
            num_beats
        );
        return MeterEstimate {
            downbeat_samples: extract_downbeats(beat_samples, 4, 0),
            ..MeterEstimate::default()
        };
    }

    // Onset strength sampled at each beat position.
    let onset_at_beat: Vec<f32> = beat_samples
        .iter()
        .map(|&beat| {
            let frame = beat / hop_size;
            onset_strength.get(frame).copied().unwrap_or(0.0)
        })
        .collect();

    // Test groupings of 2, 3, and 4 beats at all phase offsets.
    let mut best_grouping = 4usize;
    let mut best_phase = 0usize;
    let mut best_score = f32::NEG_INFINITY;
    let mut best_accent = 0.0f32;

    for g in [2usize, 3, 4] {
        let autocorr = beat_autocorrelation(&onset_at_beat, g);
        for phase in 0..g {
            let accent = accent_contrast(&onset_at_beat, g, phase);
            let score = ACCENT_WEIGHT * accent + AUTOCORR_WEIGHT * autocorr;
            log::debug!(
                "Meter hypothesis g={} phase={}: accent={:.3} autocorr={:.3} score={:.3}",
                g,
                phase,
                accent,
                autocorr,
                score
            );
            if score > best_score {
                best_score = score;
                best_grouping = g;
                best_phase = phase;
                best_accent = accent;
            }
        }
    }

    // 2/4 vs 4/4 disambiguation: the strong-weak alternation of 4/4 means a
    // 2-grouping almost always scores well. Prefer 4/4 when the 4-beat
    // grouping shows any meaningful accent contrast, or scores close enough.
    if best_grouping == 2 {
        let (accent4, phase4) = best_accent_for_grouping(&onset_at_beat, 4);
        let score4 = ACCENT_WEIGHT * accent4 + AUTOCORR_WEIGHT * beat_autocorrelation(&onset_at_beat, 4);
        if accent4 > 0.1 || score4 > best_score * 0.8 {
            log::debug!(
                "Preferring 4/4 over 2/4 (4-beat accent={:.3}, score={:.3})",
                accent4,
                score4
            );
            best_grouping = 4;
            best_phase = phase4;
            best_accent = accent4;
            best_score = score4;
        }
    }

    let mut result = MeterEstimate {
        time_signature: match best_grouping {
            2 => TimeSignature::TwoFour,
            3 => TimeSignature::ThreeFour,
            _ => TimeSignature::FourFour,
        },
        beats_per_measure: best_grouping,
        downbeat_phase: best_phase,
        confidence: (best_accent / 2.0).clamp(0.0, 1.0),
        downbeat_samples: Vec::new(),
    };

    // Low-confidence fallback: default to 4/4 unless the winning grouping
    // clearly outperforms the best 4-beat hypothesis.
    if result.confidence < 0.15 && best_grouping != 4 {
        let (accent4, phase4) = best_accent_for_grouping(&onset_at_beat, 4);
        let score4 = ACCENT_WEIGHT * accent4 + AUTOCORR_WEIGHT * beat_autocorrelation(&onset_at_beat, 4);
        if best_score < score4 * 1.1 {
            log::debug!(
                "Low confidence ({:.3}), falling back to 4/4 (winner {:.3} vs 4/4 {:.3})",
                result.confidence,
                best_score,
                score4
            );
            result.time_signature = TimeSignature::FourFour;
            result.beats_per_measure = 4;
            result.downbeat_phase = phase4;
        }
    }

    // Compound-meter check: 6/8 at the dotted-quarter level looks like 2/4,
    // but its beats subdivide in three. A 3-grouping with ternary
    // subdivision is likewise compound, with a full measure of 6 beats.
    if result.time_signature == TimeSignature::TwoFour
        && has_ternary_subdivision(beat_samples, onset_strength, hop_size)
    {
        result.time_signature = TimeSignature::SixEight;
        // beats_per_measure stays 2: these are dotted-quarter beats.
    } else if result.time_signature == TimeSignature::ThreeFour
        && has_ternary_subdivision(beat_samples, onset_strength, hop_size)
    {
        result.time_signature = TimeSignature::SixEight;
        result.beats_per_measure = 6;
    }

    result.downbeat_samples =
        extract_downbeats(beat_samples, result.beats_per_measure, result.downbeat_phase);

    log::debug!(
        "Meter: {} phase={} confidence={:.3}",
        result.time_signature,
        result.downbeat_phase,
        result.confidence
    );

    result
}

/// Accent contrast of a grouping hypothesis
///
/// Mean onset strength at the hypothesized downbeat position minus the mean
/// over the remaining positions, normalized by the overall deviation.
fn accent_contrast(onset_at_beat: &[f32], grouping: usize, phase: usize) -> f32 {
    let n = onset_at_beat.len();
    if n < grouping {
        return 0.0;
    }

    let mut position_sum = vec![0.0f64; grouping];
    let mut position_count = vec![0usize; grouping];
    for (i, &value) in onset_at_beat.iter().enumerate() {
        let pos = (i as isize - phase as isize).rem_euclid(grouping as isize) as usize;
        position_sum[pos] += value as f64;
        position_count[pos] += 1;
    }

    if position_count[0] == 0 {
        return 0.0;
    }
    let downbeat_mean = position_sum[0] / position_count[0] as f64;

    let other_sum: f64 = position_sum[1..].iter().sum();
    let other_count: usize = position_count[1..].iter().sum();
    if other_count == 0 {
        return 0.0;
    }
    let other_mean = other_sum / other_count as f64;

    let mean: f64 = onset_at_beat.iter().map(|&v| v as f64).sum::<f64>() / n as f64;
    let variance: f64 = onset_at_beat
        .iter()
        .map(|&v| {
            let d = v as f64 - mean;
            d * d
        })
        .sum::<f64>()
        / n as f64;
    let stddev = variance.sqrt();

    ((downbeat_mean - other_mean) / (stddev + 1e-6)) as f32
}

/// Best accent contrast over all phases of a grouping
fn best_accent_for_grouping(onset_at_beat: &[f32], grouping: usize) -> (f32, usize) {
    let mut best_accent = f32::NEG_INFINITY;
    let mut best_phase = 0;
    for phase in 0..grouping {
        let accent = accent_contrast(onset_at_beat, grouping, phase);
        if accent > best_accent {
            best_accent = accent;
            best_phase = phase;
        }
    }
    (best_accent, best_phase)
}

/// Normalized autocorrelation of the beat-level onset strengths at one lag
fn beat_autocorrelation(onset_at_beat: &[f32], lag: usize) -> f32 {
    let n = onset_at_beat.len();
    if lag == 0 || lag >= n {
        return 0.0;
    }

    let r0: f64 = onset_at_beat.iter().map(|&v| v as f64 * v as f64).sum();
    if r0 < 1e-12 {
        return 0.0;
    }

    let r_lag: f64 = (0..n - lag)
        .map(|i| onset_at_beat[i] as f64 * onset_at_beat[i + lag] as f64)
        .sum();

    // Scale by n/(n-lag) to compensate for the shorter overlap.
    let scale = n as f64 / (n - lag) as f64;
    ((r_lag * scale) / r0) as f32
}

/// Check whether beats subdivide in three rather than two
///
/// Samples the envelope at 1/3 and 2/3 of each beat-to-beat span (ternary
/// grid) and at 1/2 (binary grid). With a z-scored envelope, a subdivision
/// that is merely noise averages below zero; ternary wins only when it is
/// positive and beats the binary average by a margin.
fn has_ternary_subdivision(
    beat_samples: &[usize],
    onset_strength: &[f32],
    hop_size: usize,
) -> bool {
    let n = beat_samples.len();
    if n < 4 {
        return false;
    }

    let onset_len = onset_strength.len();
    let mut ternary_total = 0.0f64;
    let mut binary_total = 0.0f64;
    let mut count = 0usize;

    for pair in beat_samples.windows(2) {
        let start = pair[0] as f64;
        let span = pair[1] as f64 - start;
        if span <= 0.0 {
            continue;
        }

        let frame_t1 = ((start + span / 3.0) / hop_size as f64).round() as usize;
        let frame_t2 = ((start + 2.0 * span / 3.0) / hop_size as f64).round() as usize;
        let frame_b = ((start + span / 2.0) / hop_size as f64).round() as usize;

        if frame_t1 >= onset_len || frame_t2 >= onset_len || frame_b >= onset_len {
            continue;
        }

        ternary_total +=
            (onset_strength[frame_t1] as f64 + onset_strength[frame_t2] as f64) / 2.0;
        binary_total += onset_strength[frame_b] as f64;
        count += 1;
    }

    if count < 4 {
        return false;
    }

    let ternary_avg = ternary_total / count as f64;
    let binary_avg = binary_total / count as f64;

    log::debug!(
        "Compound subdivision: ternary_avg={:.3}, binary_avg={:.3}, pairs={}",
        ternary_avg,
        binary_avg,
        count
    );

    if ternary_avg <= 0.0 {
        return false;
    }
    if binary_avg <= 0.0 {
        return true;
    }
    ternary_avg > 1.1 * binary_avg
}

/// Every `grouping`-th beat starting at `phase`
fn extract_downbeats(beat_samples: &[usize], grouping: usize, phase: usize) -> Vec<usize> {
    if grouping == 0 {
        return Vec::new();
    }
    beat_samples
        .iter()
        .skip(phase)
        .step_by(grouping)
        .copied()
        .collect()
}
