//! Scripted playback transport for tests and offline runs.
//!
//! Each call to [`HttpTransport::send`] consumes the next scripted step in
//! order. When the script runs out, the returned future never resolves, the
//! same as a server that is holding the request open.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde_json::Value;
use tracing::trace;

use crate::error::{TransportError, TransportResult};
use crate::transport::{BoxFuture, HttpTransport, TransportRequest, TransportResponse};

type Responder = Box<dyn FnOnce(&TransportRequest) -> TransportResult<TransportResponse> + Send>;

enum Step {
    Reply(Responder),
    Pending,
}

/// A transport that replays scripted responses and records what was sent.
#[derive(Default)]
pub struct RecordedTransport {
    steps: Mutex<VecDeque<Step>>,
    sent: Mutex<Vec<TransportRequest>>,
}

impl RecordedTransport {
    /// Creates a transport with an empty script.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a 200 response with the given body.
    pub fn push_response(&self, body: impl Into<String>) -> &Self {
        let response = TransportResponse::ok(body);
        self.push_with(move |_| Ok(response))
    }

    /// Queues a response with an explicit status.
    ///
    /// Non-success statuses resolve to an error, as a real transport would.
    pub fn push_status(&self, status: u16, body: impl Into<String>) -> &Self {
        let body = body.into();
        self.push_with(move |_| {
            if (200..300).contains(&status) {
                Ok(TransportResponse::ok(body).with_status(status, ""))
            } else {
                Err(TransportError::status(status, body))
            }
        })
    }

    /// Queues a failure.
    pub fn push_failure(&self, error: TransportError) -> &Self {
        self.push_with(move |_| Err(error))
    }

    /// Queues a step that never completes.
    pub fn push_pending(&self) -> &Self {
        lock(&self.steps).push_back(Step::Pending);
        self
    }

    /// Queues a step computed from the request it answers.
    ///
    /// Useful for echoing the request `id` back in the reply.
    pub fn push_with<F>(&self, responder: F) -> &Self
    where
        F: FnOnce(&TransportRequest) -> TransportResult<TransportResponse> + Send + 'static,
    {
        lock(&self.steps).push_back(Step::Reply(Box::new(responder)));
        self
    }

    /// Returns the number of scripted steps not yet consumed.
    pub fn remaining(&self) -> usize {
        lock(&self.steps).len()
    }

    /// Returns every request sent so far.
    pub fn sent(&self) -> Vec<TransportRequest> {
        lock(&self.sent).clone()
    }

    /// Returns the bodies sent so far, parsed as JSON.
    ///
    /// Bodies that are not valid JSON are returned as strings.
    pub fn sent_messages(&self) -> Vec<Value> {
        lock(&self.sent)
            .iter()
            .map(|request| {
                let text = String::from_utf8_lossy(&request.body);
                serde_json::from_str(&text).unwrap_or_else(|_| Value::String(text.into_owned()))
            })
            .collect()
    }
}

impl std::fmt::Debug for RecordedTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordedTransport")
            .field("remaining", &self.remaining())
            .field("sent", &lock(&self.sent).len())
            .finish()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl HttpTransport for RecordedTransport {
    fn send(&self, request: TransportRequest) -> BoxFuture<'_, TransportResult<TransportResponse>> {
        let step = lock(&self.steps).pop_front();
        trace!(
            path = %request.path,
            bytes = request.body.len(),
            scripted = step.is_some(),
            "Recorded request"
        );

        let outcome = match step {
            Some(Step::Reply(responder)) => Some(responder(&request)),
            Some(Step::Pending) | None => None,
        };
        lock(&self.sent).push(request);

        match outcome {
            Some(result) => Box::pin(async move { result }),
            None => Box::pin(std::future::pending()),
        }
    }
}
