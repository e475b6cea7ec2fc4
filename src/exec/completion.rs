use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::time::Duration;

use crate::foundation::core::abi;
use crate::foundation::error::{BltError, ErrorCode};

/// Error payload delivered with a failed asynchronous completion.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct CallbackError {
    /// Structure version; see [`abi`].
    pub struct_size: u32,
    /// Execution error code.
    pub error: ErrorCode,
    /// Extended diagnostic, not meant for end users.
    pub description: Option<String>,
}

impl CallbackError {
    /// Build a payload of the current version.
    pub fn new(error: ErrorCode, description: impl Into<String>) -> Self {
        Self {
            struct_size: abi::CALLBACK_ERROR_SIZE,
            error,
            description: Some(description.into()),
        }
    }

    /// Convert an engine error. Codes outside the execution category become
    /// [`ErrorCode::OpFailed`] with the failing code kept in the diagnostic.
    pub fn from_error(err: &BltError) -> Self {
        let code = err.code();
        match code {
            ErrorCode::OpFailed | ErrorCode::OpIncomplete | ErrorCode::MemoryError => {
                Self::new(code, err.message())
            }
            other => Self::new(ErrorCode::OpFailed, format!("{other}: {}", err.message())),
        }
    }
}

impl fmt::Display for CallbackError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.description {
            Some(d) => write!(f, "{}: {d}", self.error),
            None => write!(f, "{}", self.error),
        }
    }
}

impl std::error::Error for CallbackError {}

type CallbackFn = dyn Fn(Option<&CallbackError>, u64) + Send + Sync;

/// Completion notification: receives `None` on success or the error, plus the caller's token.
#[derive(Clone)]
pub struct Callback(Arc<CallbackFn>);

impl Callback {
    /// Wrap a closure.
    pub fn new(f: impl Fn(Option<&CallbackError>, u64) + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    fn call(&self, err: Option<&CallbackError>, token: u64) {
        (self.0)(err, token)
    }
}

impl fmt::Debug for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Callback(..)")
    }
}

/// Receiving end of one asynchronous operation's result.
#[derive(Debug)]
pub struct AsyncTicket {
    rx: Receiver<Result<(), CallbackError>>,
    token: u64,
}

impl AsyncTicket {
    /// Correlation token supplied with the request.
    pub fn token(&self) -> u64 {
        self.token
    }

    /// Block until the operation completes.
    pub fn wait(self) -> Result<(), CallbackError> {
        self.rx
            .recv()
            .unwrap_or_else(|_| Err(CallbackError::new(ErrorCode::OpFailed, "completion lost")))
    }

    /// Block for at most `timeout`. `None` means the operation is still running.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<Result<(), CallbackError>> {
        match self.rx.recv_timeout(timeout) {
            Ok(r) => Some(r),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => Some(Err(CallbackError::new(
                ErrorCode::OpFailed,
                "completion lost",
            ))),
        }
    }

    /// Non-blocking poll.
    pub fn try_result(&self) -> Option<Result<(), CallbackError>> {
        self.rx.try_recv().ok()
    }
}

/// Sending end of a completion. Delivers exactly once.
///
/// Dropping a guard that never delivered reports [`ErrorCode::OpFailed`], so a job lost to a
/// panic or a torn-down pool still completes.
#[derive(Debug)]
pub struct CompletionGuard {
    tx: Option<Sender<Result<(), CallbackError>>>,
    callback: Option<Callback>,
    token: u64,
}

impl CompletionGuard {
    /// Create a guard and the ticket that observes it.
    pub fn new(callback: Option<Callback>, token: u64) -> (Self, AsyncTicket) {
        let (tx, rx) = mpsc::channel();
        (
            Self {
                tx: Some(tx),
                callback,
                token,
            },
            AsyncTicket { rx, token },
        )
    }

    /// Deliver the result to the callback and the ticket.
    pub fn complete(mut self, result: Result<(), CallbackError>) {
        self.deliver(result);
    }

    fn deliver(&mut self, result: Result<(), CallbackError>) {
        let Some(tx) = self.tx.take() else {
            return;
        };
        if let Err(e) = &result {
            tracing::warn!(code = %e.error, token = self.token, "async blit failed");
        }
        if let Some(cb) = self.callback.take() {
            let token = self.token;
            let err = result.as_ref().err();
            if let Err(panic) = catch_unwind(AssertUnwindSafe(|| cb.call(err, token))) {
                tracing::warn!(
                    token,
                    panic = %panic_message(panic.as_ref()),
                    "completion callback panicked"
                );
            }
        }
        // The ticket may have been dropped; the callback already ran.
        let _ = tx.send(result);
    }
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

impl Drop for CompletionGuard {
    fn drop(&mut self) {
        if self.tx.is_some() {
            self.deliver(Err(CallbackError::new(
                ErrorCode::OpFailed,
                "operation dropped before completion",
            )));
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/exec/completion.rs"]
mod tests;
