//! Cooperative cancellation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{SymdexError, SymdexResult};

/// Flag shared between a long-running index operation and whoever may stop it
///
/// Clones observe the same flag, so a clone can be moved into a Ctrl-C handler
/// while the index keeps the original. Operations check it between units,
/// never in the middle of one.
///
/// ## Example
///
/// ```rust
/// use symdex_core::CancellationToken;
///
/// let token = CancellationToken::new();
/// let handler = token.clone();
/// assert!(token.check().is_ok());
/// handler.cancel();
/// assert!(token.check().is_err());
/// token.reset();
/// assert!(!token.is_cancelled());
/// ```
#[derive(Debug, Clone, Default)]
pub struct CancellationToken
{
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken
{
    /// Create a token that is not cancelled
    #[must_use]
    pub fn new() -> Self
    {
        Self::default()
    }

    /// Request cancellation
    pub fn cancel(&self)
    {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Clear a previous request
    pub fn reset(&self)
    {
        self.cancelled.store(false, Ordering::SeqCst);
    }

    /// Whether cancellation was requested
    #[must_use]
    pub fn is_cancelled(&self) -> bool
    {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// `Err(Interrupted)` once cancellation was requested
    ///
    /// ## Errors
    ///
    /// `SymdexError::Interrupted` if the token was cancelled.
    pub fn check(&self) -> SymdexResult<()>
    {
        if self.is_cancelled() {
            Err(SymdexError::Interrupted)
        } else {
            Ok(())
        }
    }
}
