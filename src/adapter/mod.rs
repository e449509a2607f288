//! Upload adapters
//!
//! An adapter turns one inserted file into an [`UploadResult`]: either an
//! inline data URL ([`Base64UploadAdapter`]) or the URL returned by an upload
//! endpoint ([`SimpleUploadAdapter`]).

pub mod local;
pub mod mock;
pub mod remote;

pub use local::Base64UploadAdapter;
pub use mock::MockUploadAdapter;
pub use remote::SimpleUploadAdapter;

use crate::models::UploadResult;
use crate::{Error, Result};
use async_trait::async_trait;
use std::future::Future;
use std::sync::{Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;

#[async_trait]
pub trait UploadAdapter: Send + Sync {
    /// Runs the upload. Settles exactly once; an aborted upload fails with
    /// [`Error::Cancelled`]. A second call while one is pending fails with
    /// [`Error::UploadInProgress`].
    async fn upload(&self) -> Result<UploadResult>;

    /// Cancels the in-flight sub-operation, if any. Never fails.
    fn abort(&self);

    fn state(&self) -> OperationState;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationState {
    Idle,
    Reading,
    Transcoding,
    Uploading,
    Resolved,
    Rejected,
    Cancelled,
}

impl OperationState {
    pub fn is_pending(self) -> bool {
        matches!(
            self,
            OperationState::Reading | OperationState::Transcoding | OperationState::Uploading
        )
    }
}

struct Slot {
    state: OperationState,
    cancel: Option<CancellationToken>,
}

/// The single in-flight operation owned by one adapter instance.
pub(crate) struct PendingOperation {
    slot: Mutex<Slot>,
}

impl PendingOperation {
    pub(crate) fn new() -> Self {
        Self {
            slot: Mutex::new(Slot {
                state: OperationState::Idle,
                cancel: None,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub(crate) fn state(&self) -> OperationState {
        self.lock().state
    }

    /// Enters `Reading` and hands out the token that `abort` will trip.
    pub(crate) fn begin(&self) -> Result<CancellationToken> {
        let mut slot = self.lock();
        if slot.state.is_pending() {
            return Err(Error::UploadInProgress);
        }

        let token = CancellationToken::new();
        slot.state = OperationState::Reading;
        slot.cancel = Some(token.clone());
        Ok(token)
    }

    /// Moves to `next`; a non-cancellable stage ignores `abort`.
    pub(crate) fn advance(
        &self,
        next: OperationState,
        token: &CancellationToken,
        cancellable: bool,
    ) {
        let mut slot = self.lock();
        slot.state = next;
        slot.cancel = cancellable.then(|| token.clone());
    }

    pub(crate) fn settle<T>(&self, result: &Result<T>) {
        let mut slot = self.lock();
        slot.state = match result {
            Ok(_) => OperationState::Resolved,
            Err(Error::Cancelled) => OperationState::Cancelled,
            Err(_) => OperationState::Rejected,
        };
        slot.cancel = None;
    }

    /// Returns whether anything was cancelled.
    pub(crate) fn abort(&self) -> bool {
        match self.lock().cancel.take() {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }
}

/// Races `fut` against the token; cancellation wins ties.
pub(crate) async fn cancellable<F, T>(token: &CancellationToken, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::select! {
        biased;
        _ = token.cancelled() => Err(Error::Cancelled),
        result = fut => result,
    }
}
