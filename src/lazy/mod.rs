// Single-assignment async initialization for expensive shared handles
// (embedding model, LanceDB table)


use std::fmt;
use std::future::Future;
use tokio::sync::OnceCell;
use tracing::{error, info};

use crate::{Result, VaultError};

/// A handle that is initialized at most once, on first use.
///
/// Racing callers all await the same in-flight initializer. The outcome is
/// memoized either way: after a failed initialization every call returns
/// [`VaultError::Unavailable`] with the captured message and the initializer
/// is never run again.
pub struct Lazy<T> {
    resource: &'static str,
    cell: OnceCell<std::result::Result<T, String>>,
}

impl<T: Clone> Lazy<T> {
    #[inline]
    pub fn new(resource: &'static str) -> Self {
        Self {
            resource,
            cell: OnceCell::new(),
        }
    }

    /// Create a holder that is already initialized with `value`
    #[inline]
    pub fn ready(resource: &'static str, value: T) -> Self {
        Self {
            resource,
            cell: OnceCell::new_with(Some(Ok(value))),
        }
    }

    /// Return the handle, running `init` if nobody has yet
    #[inline]
    pub async fn get_or_init<F, Fut>(&self, init: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let outcome = self
            .cell
            .get_or_init(|| async {
                info!("Initializing {}", self.resource);
                match init().await {
                    Ok(value) => {
                        info!("{} initialized", self.resource);
                        Ok(value)
                    }
                    Err(e) => {
                        error!("Failed to initialize {}: {}", self.resource, e);
                        Err(e.to_string())
                    }
                }
            })
            .await;

        match outcome {
            Ok(value) => Ok(value.clone()),
            Err(message) => Err(self.unavailable(message)),
        }
    }

    /// False once initialization has been attempted and failed
    #[inline]
    pub fn is_available(&self) -> bool {
        !matches!(self.cell.get(), Some(Err(_)))
    }

    #[inline]
    pub fn is_initialized(&self) -> bool {
        matches!(self.cell.get(), Some(Ok(_)))
    }

    fn unavailable(&self, message: &str) -> VaultError {
        VaultError::Unavailable {
            resource: self.resource,
            message: message.to_string(),
        }
    }
}

impl<T> fmt::Debug for Lazy<T> {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self.cell.get() {
            None => "uninitialized",
            Some(Ok(_)) => "ready",
            Some(Err(_)) => "failed",
        };
        f.debug_struct("Lazy")
            .field("resource", &self.resource)
            .field("state", &state)
            .finish()
    }
}
