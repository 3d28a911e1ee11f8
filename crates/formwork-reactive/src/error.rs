#![forbid(unsafe_code)]

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ReactiveError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReactiveError {
    #[error("cannot assign to computed key `{key}`")]
    ComputedWrite { key: String },

    #[error("index {index} out of bounds for reactive array of length {len}")]
    IndexOutOfBounds { index: usize, len: usize },

    #[error("reaction drain exceeded {generations} generations; discarded {discarded} pending")]
    RunawayDrain { generations: usize, discarded: usize },
}

impl ReactiveError {
    #[must_use]
    pub fn computed_write(key: impl Into<String>) -> Self {
        Self::ComputedWrite { key: key.into() }
    }
}
