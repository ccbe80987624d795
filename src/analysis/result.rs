//! Analysis result types

use serde::{Deserialize, Serialize};

use crate::features::key::KeyEstimate;
use crate::features::meter::MeterEstimate;

/// Complete analysis result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResult {
    /// Estimated tempo in beats per minute
    pub bpm: f32,

    /// Beat positions as sample indices into the analyzed audio
    pub beat_samples: Vec<usize>,

    /// Detected meter with downbeat placement
    pub meter: MeterEstimate,

    /// Detected key, absent when key detection is disabled
    pub key: Option<KeyEstimate>,

    /// Analysis metadata
    pub metadata: AnalysisMetadata,
}

/// Analysis metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisMetadata {
    /// Audio duration in seconds
    pub duration_seconds: f64,

    /// Sample rate in Hz
    pub sample_rate: u32,

    /// Processing time in milliseconds
    pub processing_time_ms: f32,
}
