//! Configuration parameters for audio analysis

/// Analysis configuration parameters
#[derive(Debug, Clone)]
pub struct AnalysisConfig {
    // Tempo search
    /// Minimum BPM to consider (default: 50.0)
    pub min_bpm: f32,

    /// Maximum BPM to consider (default: 220.0)
    pub max_bpm: f32,

    // STFT parameters for onset extraction
    /// FFT size for the onset spectrogram, must be even (default: 2048)
    pub fft_size: usize,

    /// Hop size between onset frames in samples (default: 512)
    pub hop_size: usize,

    /// Number of mel filterbank bands (default: 40)
    pub mel_bands: usize,

    // Beat tracking
    /// Weight of the squared log-ratio tempo deviation penalty in the
    /// dynamic program (default: 680.0)
    pub tempo_penalty: f64,

    // Meter detection
    /// Run meter detection on the tracked beats (default: true)
    pub detect_meter: bool,

    // Key detection
    /// Run key detection alongside the rhythm pipeline (default: true)
    pub detect_key: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            min_bpm: 50.0,
            max_bpm: 220.0,
            fft_size: 2048,
            hop_size: 512,
            mel_bands: 40,
            tempo_penalty: 680.0,
            detect_meter: true,
            detect_key: true,
        }
    }
}
