// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

/// Represents errors that can occur in the MRC toolkit
#[derive(Debug)]
pub enum Error {
    /// I/O error
    Io(std::io::Error),

    /// Invalid configuration value (zero-sized histogram, zero capacity,
    /// sampling rate outside `(0, 1]`, ...)
    InvalidConfig(&'static str),

    /// A rescaled reuse distance fell outside the histogram's tracked range
    /// while the histogram is in [`crate::OutOfBoundsMode::Reject`] mode
    HistogramOverflow {
        /// The rescaled reuse distance that did not fit
        scaled_index: u64,

        /// Upper end of the histogram's tracked range
        tracked_range: u64,
    },

    /// A trace file ended in the middle of a record
    TruncatedTrace,
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "MrcError: {self:?}")
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

/// Estimator result
pub type Result<T> = std::result::Result<T, Error>;
