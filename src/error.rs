//! Errors raised while configuring or running a reconstruction

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ReconError>;

#[derive(Error, Debug)]
pub enum ReconError {
    #[error("shape mismatch for {what}: expected {expected:?}, found {found:?}")]
    ShapeMismatch {
        what: &'static str,
        expected: Vec<usize>,
        found: Vec<usize>,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Failure inside a projection operator or proximal denoiser,
    /// passed through untouched.
    #[error("operator failed: {0}")]
    Operator(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("could not build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

impl ReconError {
    pub fn operator<E>(e: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::Operator(e.into())
    }

    pub fn invalid_config<M: std::fmt::Display>(msg: M) -> Self {
        Self::InvalidConfig(msg.to_string())
    }

    pub(crate) fn shape(what: &'static str, expected: &[usize], found: &[usize]) -> Self {
        Self::ShapeMismatch {
            what,
            expected: expected.to_vec(),
            found: found.to_vec(),
        }
    }
}
