/// Convenience alias for results produced by this crate.
pub type PlaneweaveResult<T> = Result<T, PlaneweaveError>;

/// Error type for every fallible operation in the crate.
///
/// `Topology` covers startup-time graph resolution, `Validation` covers
/// host-supplied parameters, and `Device` wraps an `ioctl`-level failure
/// together with the operation that issued it. Everything else funnels
/// through `Other`.
#[derive(thiserror::Error, Debug)]
pub enum PlaneweaveError {
    /// The media graph did not match the expected pipeline layout.
    #[error("topology error: {0}")]
    Topology(String),

    /// A host-supplied buffer, rectangle, or format was rejected.
    #[error("validation error: {0}")]
    Validation(String),

    /// A device node request failed at the kernel boundary.
    #[error("device error in {op}: {source}")]
    Device {
        /// The operation that was being issued when the failure occurred.
        op: &'static str,
        /// The underlying OS error.
        #[source]
        source: std::io::Error,
    },

    /// Any other failure, carried through unchanged.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl PlaneweaveError {
    /// Builds a [`PlaneweaveError::Topology`].
    pub fn topology(msg: impl Into<String>) -> Self {
        Self::Topology(msg.into())
    }

    /// Builds a [`PlaneweaveError::Validation`].
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Builds a [`PlaneweaveError::Device`] from an OS-level failure.
    pub fn device(op: &'static str, source: std::io::Error) -> Self {
        Self::Device { op, source }
    }
}
