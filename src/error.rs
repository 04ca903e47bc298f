//! Error module for the benchmark.
use std::error::Error;
use std::fmt;

/// Error types for the benchmark.
#[derive(Debug, PartialEq)]
pub enum BenchError {
    /// Error for invalid or unparsable configuration, e.g., a non-positive network scale.
    ConfigError(String),
    /// Error while loading a connectivity file, e.g., missing file, malformed record or size mismatch.
    LoadError(String),
    /// The timed run did not complete; holds the error code passed to the coordinated abort.
    EngineFailure(i32),
    /// Error for I/O operations.
    IOError(String),
}

impl BenchError {
    /// The process exit code associated with the error.
    pub fn exit_code(&self) -> i32 {
        match self {
            BenchError::EngineFailure(code) if *code != 0 => *code,
            _ => 1,
        }
    }
}

impl fmt::Display for BenchError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            BenchError::ConfigError(e) => write!(f, "Invalid configuration: {}", e),
            BenchError::LoadError(e) => write!(f, "Connectivity loading error: {}", e),
            BenchError::EngineFailure(code) => {
                write!(f, "Simulation did not complete (error code {})", code)
            }
            BenchError::IOError(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl Error for BenchError {}

impl From<std::io::Error> for BenchError {
    fn from(e: std::io::Error) -> Self {
        BenchError::IOError(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_code() {
        assert_eq!(BenchError::ConfigError("bad".into()).exit_code(), 1);
        assert_eq!(BenchError::LoadError("bad".into()).exit_code(), 1);
        assert_eq!(BenchError::EngineFailure(1).exit_code(), 1);
        assert_eq!(BenchError::EngineFailure(3).exit_code(), 3);
        assert_eq!(BenchError::EngineFailure(0).exit_code(), 1);
    }
}
