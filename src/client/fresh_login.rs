//! Queue of requests parked until the user re-verifies their password.
//!
//! Flow overview:
//! - A request fails with `401` + `fresh_login_required`.
//! - Its descriptor is pushed here together with a oneshot responder; the caller
//!   awaits the receiving half.
//! - The first push on an empty queue notifies the [`FreshLoginListener`]; later
//!   pushes stay silent until the queue is drained.
//! - The UI side answers by replaying or cancelling; both take the whole queue
//!   in one step and reset the notification flag.

use super::{
    error::ClientError,
    request::{ApiResponse, RequestDescriptor},
};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::{
    runtime::Handle,
    sync::{mpsc, oneshot},
};
use tracing::{debug, warn};
use ulid::Ulid;

pub type Responder = oneshot::Sender<Result<ApiResponse, ClientError>>;

/// Emitted once per queue-fill cycle to ask the UI for password verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreshLoginRequired {
    /// Id of the request that opened the cycle.
    pub request_id: Ulid,
}

/// Receives fresh-login notifications. Implementations must not block.
pub trait FreshLoginListener: Send + Sync {
    fn fresh_login_required(&self, event: FreshLoginRequired);
}

impl FreshLoginListener for mpsc::UnboundedSender<FreshLoginRequired> {
    fn fresh_login_required(&self, event: FreshLoginRequired) {
        if self.send(event).is_err() {
            warn!("fresh login listener is gone, request {} stays queued", event.request_id);
        }
    }
}

/// One parked request and the caller waiting for it.
pub struct PendingRequest {
    pub id: Ulid,
    pub request: RequestDescriptor,
    pub responder: Responder,
    /// Runtime the caller was on, replays are spawned there.
    pub runtime: Option<Handle>,
}

impl std::fmt::Debug for PendingRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingRequest")
            .field("id", &self.id)
            .field("method", &self.request.method)
            .field("path", &self.request.path)
            .finish_non_exhaustive()
    }
}

#[derive(Default)]
struct QueueState {
    entries: Vec<PendingRequest>,
    prompt_shown: bool,
}

#[derive(Default)]
pub struct PendingRequests {
    state: Mutex<QueueState>,
    listener: Option<Arc<dyn FreshLoginListener>>,
}

impl PendingRequests {
    #[must_use]
    pub fn new(listener: Option<Arc<dyn FreshLoginListener>>) -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
            listener,
        }
    }

    /// Parks `request` and returns the receiver its caller should await.
    pub fn enqueue(
        &self,
        request: RequestDescriptor,
    ) -> oneshot::Receiver<Result<ApiResponse, ClientError>> {
        let (responder, receiver) = oneshot::channel();
        let id = Ulid::new();

        let notify = {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            state.entries.push(PendingRequest {
                id,
                request,
                responder,
                runtime: Handle::try_current().ok(),
            });
            debug!("queued request {} ({} pending)", id, state.entries.len());

            if state.prompt_shown {
                false
            } else {
                state.prompt_shown = true;
                true
            }
        };

        // Called outside the lock so a listener may inspect the queue.
        if notify {
            if let Some(listener) = &self.listener {
                listener.fresh_login_required(FreshLoginRequired { request_id: id });
            }
        }

        receiver
    }

    /// Takes every entry and resets the notification flag in one step.
    pub fn drain(&self) -> Vec<PendingRequest> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.prompt_shown = false;
        std::mem::take(&mut state.entries)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Rejects every parked caller with `message`; returns how many there were.
    pub fn reject_all(&self, message: &str) -> usize {
        let entries = self.drain();
        let count = entries.len();

        for entry in entries {
            debug!("rejecting queued request {}", entry.id);
            // The caller may have given up already.
            let _ = entry
                .responder
                .send(Err(ClientError::FreshLoginCancelled(message.to_string())));
        }

        count
    }
}
