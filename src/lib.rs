//! # Cadenza DSP
//!
//! An audio analysis engine for recorded music, producing tempo, beat
//! positions, time signature, and musical key.
//!
//! ## Features
//!
//! - **Tempo estimation**: priored autocorrelation of a log-mel onset
//!   envelope, with iterative octave correction
//! - **Beat tracking**: dynamic programming with a log-ratio tempo penalty,
//!   evaluated over multiple tempo hypotheses
//! - **Meter detection**: accent-contrast and beat-level autocorrelation,
//!   with a compound-meter (6/8) subdivision check
//! - **Key detection**: per-octave interpolated chromagram matched against
//!   Krumhansl-Kessler profiles
//!
//! ## Quick Start
//!
//! ```no_run
//! use cadenza_dsp::{analyze_audio, AnalysisConfig};
//!
//! let samples: Vec<f32> = vec![]; // Mono audio, normalized to [-1, 1]
//! let result = analyze_audio(&samples, 44100, &AnalysisConfig::default())?;
//!
//! println!("BPM: {:.2}", result.bpm);
//! println!("Time signature: {}", result.meter.time_signature);
//! # Ok::<(), cadenza_dsp::AnalysisError>(())
//! ```
//!
//! ## Architecture
//!
//! ```text
//! Audio -> Downmix -> Onset Envelope -> Tempo -> Beat Tracking -> Meter
//!                 \-> Key Detection
//! ```
//!
//! Decoded audio is downmixed to mono and fed to the onset extractor and the
//! key detector in parallel. The tempo estimator proposes a primary period
//! plus alternative octaves; each candidate runs through the beat tracker
//! and the controller keeps the best-scoring beat sequence.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod analysis;
pub mod config;
pub mod error;
pub mod features;
pub mod io;
pub mod metronome;

// Re-export main types
pub use analysis::{analyze, AnalysisMetadata, AnalysisResult};
pub use config::AnalysisConfig;
pub use error::AnalysisError;
pub use features::key::{Key, KeyEstimate};
pub use features::meter::{MeterEstimate, TimeSignature};
pub use io::buffer::AudioBuffer;

/// Analyze raw mono samples
///
/// Convenience wrapper over [`analyze`] for callers that already hold a
/// mono sample buffer.
///
/// # Arguments
///
/// * `samples` - Mono audio samples, normalized to [-1.0, 1.0]
/// * `sample_rate` - Sample rate in Hz (typically 44100 or 48000)
/// * `config` - Analysis configuration parameters
///
/// # Errors
///
/// Returns `AnalysisError` if the input is empty or the sample rate is zero.
pub fn analyze_audio(
    samples: &[f32],
    sample_rate: u32,
    config: &AnalysisConfig,
) -> Result<AnalysisResult, AnalysisError> {
    let buffer = AudioBuffer::new(samples.to_vec(), sample_rate, 1);
    analyze(&buffer, config)
}
