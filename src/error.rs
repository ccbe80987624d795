//! Error types for the analysis engine

use std::fmt;

/// Errors that can occur during decoding or analysis
#[derive(Debug, Clone)]
pub enum AnalysisError {
    /// Invalid input parameters (wrong channel count, zero sample rate, odd FFT size)
    InvalidInput(String),

    /// Audio decoding error
    DecodingError(String),

    /// File I/O error
    IoError(String),

    /// Processing error during analysis
    ProcessingError(String),

    /// Numerical error (FFT plan or execution failure)
    NumericalError(String),
}

impl fmt::Display for AnalysisError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnalysisError::InvalidInput(msg) => write!(f, "Invalid input: {}", msg),
            AnalysisError::DecodingError(msg) => write!(f, "Decoding error: {}", msg),
            AnalysisError::IoError(msg) => write!(f, "I/O error: {}", msg),
            AnalysisError::ProcessingError(msg) => write!(f, "Processing error: {}", msg),
            AnalysisError::NumericalError(msg) => write!(f, "Numerical error: {}", msg),
        }
    }
}

impl std::error::Error for AnalysisError {}

impl From<std::io::Error> for AnalysisError {
    fn from(err: std::io::Error) -> Self {
        AnalysisError::IoError(err.to_string())
    }
}
