//! Bounded FIFO of pending render requests.
//!
//! Only the append/remove operations need mutual exclusion, so the queue is a
//! plain `VecDeque` behind a `parking_lot` mutex that is never held across an
//! await.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio::task::AbortHandle;
use uuid::Uuid;

use super::error::RenderError;
use crate::report::ReportPayload;

pub type RenderResult = Result<Vec<u8>, RenderError>;

/// A submitted render job waiting for (or undergoing) service.
pub struct QueuedRequest {
    pub id: Uuid,
    pub payload: ReportPayload,
    pub enqueued_at: Instant,
    pub deadline: Instant,
    responder: oneshot::Sender<RenderResult>,
    timer: Option<AbortHandle>,
}

impl QueuedRequest {
    /// Settle the caller's future. Returns false if the caller stopped waiting.
    pub fn respond(self, result: RenderResult) -> bool {
        self.responder.send(result).is_ok()
    }

    /// The caller dropped its ticket; nobody will read the result.
    pub fn is_abandoned(&self) -> bool {
        self.responder.is_closed()
    }

    pub fn waited(&self) -> Duration {
        self.enqueued_at.elapsed()
    }

    fn disarm(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

/// Handle returned to the submitter of an accepted request.
pub struct Admission {
    pub id: Uuid,
    pub deadline: Instant,
    pub receiver: oneshot::Receiver<RenderResult>,
    pub queue_length: usize,
}

struct QueueState {
    pending: VecDeque<QueuedRequest>,
    closed: bool,
}

pub struct RenderQueue {
    state: Mutex<QueueState>,
    capacity: usize,
    request_timeout: Duration,
}

impl RenderQueue {
    pub fn new(capacity: usize, request_timeout: Duration) -> Self {
        Self {
            state: Mutex::new(QueueState {
                pending: VecDeque::new(),
                closed: false,
            }),
            capacity,
            request_timeout,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// Append a request at the tail, or reject it immediately.
    pub fn push(&self, payload: ReportPayload) -> Result<Admission, RenderError> {
        let mut state = self.state.lock();

        if state.closed {
            return Err(RenderError::ShuttingDown);
        }
        if state.pending.len() >= self.capacity {
            return Err(RenderError::QueueFull {
                capacity: self.capacity,
            });
        }

        let enqueued_at = Instant::now();
        let deadline = enqueued_at
            .checked_add(self.request_timeout)
            .ok_or_else(|| {
                RenderError::ResourceUnavailable(format!(
                    "request timeout of {:?} is out of range",
                    self.request_timeout
                ))
            })?;
        let (responder, receiver) = oneshot::channel();
        let id = Uuid::new_v4();

        state.pending.push_back(QueuedRequest {
            id,
            payload,
            enqueued_at,
            deadline,
            responder,
            timer: None,
        });

        Ok(Admission {
            id,
            deadline,
            receiver,
            queue_length: state.pending.len(),
        })
    }

    /// Remember the deadline timer of a still-queued request so dequeuing can
    /// cancel it. If the request already left the queue the timer is aborted.
    pub fn attach_timer(&self, id: Uuid, timer: AbortHandle) {
        let mut state = self.state.lock();
        match state.pending.iter_mut().find(|request| request.id == id) {
            Some(request) => request.timer = Some(timer),
            None => timer.abort(),
        }
    }

    /// Take the head of the queue for service, disarming its deadline.
    pub fn pop_front(&self) -> Option<QueuedRequest> {
        let mut request = self.state.lock().pending.pop_front()?;
        request.disarm();
        Some(request)
    }

    /// Remove a specific request (deadline expiry). The relative order of the
    /// remaining requests is unchanged.
    pub fn evict(&self, id: Uuid) -> Option<QueuedRequest> {
        let mut state = self.state.lock();
        let index = state.pending.iter().position(|request| request.id == id)?;
        let mut request = state.pending.remove(index)?;
        request.timer = None;
        Some(request)
    }

    /// Stop accepting requests and hand back everything still queued.
    pub fn close_and_drain(&self) -> Vec<QueuedRequest> {
        let mut state = self.state.lock();
        state.closed = true;
        state
            .pending
            .drain(..)
            .map(|mut request| {
                request.disarm();
                request
            })
            .collect()
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    pub fn len(&self) -> usize {
        self.state.lock().pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().pending.is_empty()
    }

    pub fn pending_ids(&self) -> Vec<Uuid> {
        self.state
            .lock()
            .pending
            .iter()
            .map(|request| request.id)
            .collect()
    }
}
