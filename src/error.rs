//! Error types for the crate.
//!
//! Only recoverable conditions are modeled here. Contract violations
//! (draining a dispatcher from the wrong thread, attaching a second
//! continuation) are assertions and abort instead.

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by dispatcher, pool and runtime construction.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid configuration value.
    #[error("config error: {0}")]
    Config(String),

    /// Worker thread spawn or startup failure.
    #[error("executor error: {0}")]
    Executor(String),

    /// The current thread already owns a live dispatcher.
    #[error("a dispatcher is already registered for this thread")]
    DispatcherExists,

    /// The global pool was requested before `init()`.
    #[error("runtime not initialized")]
    NotInitialized,

    /// `init()` was called while a global pool is live.
    #[error("already initialized")]
    AlreadyInitialized,
}

impl Error {
    pub(crate) fn config<S: Into<String>>(msg: S) -> Self {
        Error::Config(msg.into())
    }

    pub(crate) fn executor<S: Into<String>>(msg: S) -> Self {
        Error::Executor(msg.into())
    }
}
