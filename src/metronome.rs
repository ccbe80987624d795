//! Click-track synthesis and overlay
//!
//! Mixes a short decaying sinusoid into the audio at each beat position,
//! across all channels. Downbeats can carry a higher-pitched click.

use crate::io::buffer::AudioBuffer;

/// Click length in seconds
const CLICK_DURATION_SEC: f32 = 0.02;

/// Exponential decay rate of the click envelope
const CLICK_DECAY: f32 = 200.0;

/// Synthesize a single click: `volume * sin(2*pi*f*t) * exp(-decay*t)`
fn synth_click(sample_rate: u32, volume: f32, freq: f32) -> Vec<f32> {
    if sample_rate == 0 {
        return Vec::new();
    }
    let length = ((CLICK_DURATION_SEC * sample_rate as f32).round() as usize).max(1);
    (0..length)
        .map(|i| {
            let t = i as f32 / sample_rate as f32;
            volume * (2.0 * std::f32::consts::PI * freq * t).sin() * (-CLICK_DECAY * t).exp()
        })
        .collect()
}

/// Overlay clicks at the given beat positions
///
/// Beats at or beyond the end of the buffer are skipped. The result is
/// clipped to [-1, 1].
pub fn overlay_clicks(
    audio: &mut AudioBuffer,
    beat_samples: &[usize],
    click_volume: f32,
    click_freq: f32,
) {
    overlay_clicks_accented(audio, beat_samples, &[], click_volume, click_freq, click_freq);
}

/// Overlay clicks with accented downbeats
///
/// Beats listed in `downbeat_samples` get a click at `downbeat_freq`; all
/// others use `click_freq`. `downbeat_samples` must be sorted, as beat
/// sequences are.
pub fn overlay_clicks_accented(
    audio: &mut AudioBuffer,
    beat_samples: &[usize],
    downbeat_samples: &[usize],
    click_volume: f32,
    click_freq: f32,
    downbeat_freq: f32,
) {
    if audio.sample_rate == 0 || audio.channels == 0 || audio.samples.is_empty() {
        return;
    }
    if beat_samples.is_empty() {
        return;
    }

    let click = synth_click(audio.sample_rate, click_volume, click_freq);
    let downbeat_click = if downbeat_samples.is_empty() {
        Vec::new()
    } else {
        synth_click(audio.sample_rate, click_volume, downbeat_freq)
    };
    if click.is_empty() {
        return;
    }

    let frames = audio.num_frames();
    let channels = audio.channels;

    for &beat in beat_samples {
        if beat >= frames {
            continue;
        }
        let tone = if !downbeat_click.is_empty() && downbeat_samples.binary_search(&beat).is_ok() {
            &downbeat_click
        } else {
            &click
        };
        for (i, &value) in tone.iter().enumerate() {
            let frame = beat + i;
            if frame >= frames {
                break;
            }
            for ch in 0..channels {
                audio.samples[frame * channels + ch] += value;
            }
        }
    }

    for sample in &mut audio.samples {
        *sample = sample.clamp(-1.0, 1.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overlay_adds_energy_at_beats() {
        let mut audio = AudioBuffer::new(vec![0.0; 44100], 44100, 1);
        overlay_clicks(&mut audio, &[0, 22050], 0.5, 1000.0);

        let click_energy: f32 = audio.samples[0..882].iter().map(|s| s.abs()).sum();
        let silence_energy: f32 = audio.samples[10000..10882].iter().map(|s| s.abs()).sum();
        assert!(click_energy > 1.0, "Click region should carry energy");
        assert_eq!(silence_energy, 0.0, "Between beats must stay silent");
    }

    #[test]
    fn test_overlay_spans_all_channels() {
        let mut audio = AudioBuffer::new(vec![0.0; 8820], 44100, 2);
        overlay_clicks(&mut audio, &[100], 0.5, 1000.0);

        let left: f32 = audio.samples.iter().step_by(2).map(|s| s.abs()).sum();
        let right: f32 = audio.samples.iter().skip(1).step_by(2).map(|s| s.abs()).sum();
        assert!(left > 0.0 && (left - right).abs() < 1e-6);
    }

    #[test]
    fn test_overlay_skips_out_of_range_beats() {
        let mut audio = AudioBuffer::new(vec![0.0; 1000], 44100, 1);
        let before = audio.samples.clone();
        overlay_clicks(&mut audio, &[5000], 0.5, 1000.0);
        assert_eq!(audio.samples, before);
    }

    #[test]
    fn test_overlay_clips_to_unit_range() {
        let mut audio = AudioBuffer::new(vec![0.99; 4410], 44100, 1);
        overlay_clicks(&mut audio, &[0], 1.0, 1000.0);
        assert!(audio.samples.iter().all(|&s| (-1.0..=1.0).contains(&s)));
    }

    #[test]
    fn test_overlay_truncates_click_at_buffer_end() {
        // A beat 10 samples before the end must not panic or write past it.
        let mut audio = AudioBuffer::new(vec![0.0; 1000], 44100, 1);
        overlay_clicks(&mut audio, &[990], 0.5, 1000.0);
        assert_eq!(audio.samples.len(), 1000);
    }

    #[test]
    fn test_accented_downbeats_use_different_frequency() {
        let mut plain = AudioBuffer::new(vec![0.0; 4410], 44100, 1);
        let mut accented = AudioBuffer::new(vec![0.0; 4410], 44100, 1);

        overlay_clicks(&mut plain, &[0], 0.5, 1000.0);
        overlay_clicks_accented(&mut accented, &[0], &[0], 0.5, 1000.0, 1500.0);

        assert_ne!(
            plain.samples[..100],
            accented.samples[..100],
            "Downbeat click should differ from the regular click"
        );
    }
}
