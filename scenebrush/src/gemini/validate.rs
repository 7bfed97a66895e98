//! API-key validation task.
//!
//! A reduced variant of the generation pipeline: a bodyless GET against
//! the models-listing endpoint with a short timeout, classified into
//! exactly three outcomes. No response parsing beyond the status code.

use std::mem;
use std::sync::Arc;

use crate::runner::{Step, TaskBody};
use crate::transport::{Method, PendingExchange, Transport, WireRequest};

use super::{models_url, VALIDATION_TIMEOUT};

/// Callback receiving `(valid, message)` for a validation probe.
pub type ValidationCallback = Box<dyn FnOnce(bool, String)>;

enum State {
    Probe,
    InFlight(PendingExchange),
    Done,
}

/// Suspendable task body probing whether an API key is accepted.
pub struct ValidateKeyTask {
    state: State,
    api_key: String,
    transport: Arc<dyn Transport>,
    on_complete: Option<ValidationCallback>,
}

impl ValidateKeyTask {
    pub fn new(
        api_key: impl Into<String>,
        transport: Arc<dyn Transport>,
        on_complete: impl FnOnce(bool, String) + 'static,
    ) -> Self {
        ValidateKeyTask {
            state: State::Probe,
            api_key: api_key.into(),
            transport,
            on_complete: Some(Box::new(on_complete)),
        }
    }

    fn complete(&mut self, valid: bool, message: impl Into<String>) {
        if let Some(on_complete) = self.on_complete.take() {
            on_complete(valid, message.into());
        }
    }
}

impl TaskBody for ValidateKeyTask {
    fn resume(&mut self) -> Step {
        match mem::replace(&mut self.state, State::Done) {
            State::Probe => {
                if self.api_key.trim().is_empty() {
                    self.complete(false, "API key is empty");
                    return Step::Finished;
                }
                let wire = WireRequest {
                    method: Method::Get,
                    url: models_url(),
                    api_key: self.api_key.clone(),
                    body: None,
                    timeout: VALIDATION_TIMEOUT,
                };
                self.state = State::InFlight(PendingExchange::dispatch(
                    Arc::clone(&self.transport),
                    wire,
                ));
                Step::Continue
            }
            State::InFlight(mut pending) => match pending.try_take() {
                None => {
                    self.state = State::InFlight(pending);
                    Step::Continue
                }
                Some(reply) => {
                    if reply.is_success() {
                        self.complete(true, "API key is valid");
                    } else if reply.status == 401 || reply.status == 403 {
                        self.complete(false, "Invalid API key");
                    } else {
                        let error = reply
                            .error
                            .as_deref()
                            .unwrap_or("unknown transport error");
                        self.complete(false, format!("Validation failed: {}", error));
                    }
                    Step::Finished
                }
            },
            State::Done => Step::Finished,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{MockTransport, WireReply};
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::thread;
    use std::time::{Duration, Instant};

    fn run_probe(api_key: &str, reply: WireReply) -> (Arc<MockTransport>, bool, String) {
        let mock = Arc::new(MockTransport::replying(reply));
        let outcome = Rc::new(RefCell::new(None));

        let slot = outcome.clone();
        let mut task = ValidateKeyTask::new(api_key, mock.clone() as Arc<dyn Transport>, move |valid, message| {
            *slot.borrow_mut() = Some((valid, message));
        });

        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            match task.resume() {
                Step::Finished => break,
                _ => {
                    assert!(Instant::now() < deadline, "probe never completed");
                    thread::sleep(Duration::from_millis(1));
                }
            }
        }

        let (valid, message) = outcome.borrow_mut().take().unwrap();
        (mock, valid, message)
    }

    #[test]
    fn test_blank_key_completes_without_network_call() {
        let (mock, valid, message) = run_probe("   ", WireReply::ok(200, Vec::new()));
        assert!(!valid);
        assert_eq!(message, "API key is empty");
        assert_eq!(mock.calls(), 0);
    }

    #[test]
    fn test_accepted_key() {
        let (mock, valid, message) = run_probe("some-key", WireReply::ok(200, b"{}".to_vec()));
        assert!(valid);
        assert_eq!(message, "API key is valid");
        assert_eq!(mock.calls(), 1);
    }

    #[test]
    fn test_unauthorized_is_invalid_key() {
        for status in [401u16, 403] {
            let (_, valid, message) = run_probe(
                "bad-key",
                WireReply::http_error(status, "Unauthorized", Vec::new()),
            );
            assert!(!valid);
            assert_eq!(message, "Invalid API key");
        }
    }

    #[test]
    fn test_other_failures_surface_transport_error() {
        let (_, valid, message) = run_probe(
            "some-key",
            WireReply::http_error(500, "Internal Server Error", Vec::new()),
        );
        assert!(!valid);
        assert_eq!(message, "Validation failed: HTTP 500 Internal Server Error");

        let (_, valid, message) = run_probe("some-key", WireReply::unreachable("dns failure"));
        assert!(!valid);
        assert_eq!(message, "Validation failed: dns failure");
    }

    #[test]
    fn test_probe_uses_models_endpoint_with_short_timeout() {
        let (mock, _, _) = run_probe("some-key", WireReply::ok(200, Vec::new()));
        let requests = mock.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].method, Method::Get);
        assert!(requests[0].url.ends_with("/models"));
        assert!(requests[0].body.is_none());
        assert_eq!(requests[0].timeout, VALIDATION_TIMEOUT);
    }
}
