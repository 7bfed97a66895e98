//! The generation task body.
//!
//! One [`GenerateTask`] drives one `generateContent` exchange across as
//! many ticks as the network needs: credential check and request
//! assembly on the first resumption, then one poll of the in-flight
//! exchange per tick, then response interpretation and the completion
//! callback. Every failure mode resolves to a [`GenerationResult`]; the
//! body never raises out of a resumption.
//!
//! Progress fractions reserve `[0.0, 0.2]` for request building,
//! `[0.2, 0.8]` for the wire exchange (scaled from transport-level byte
//! progress) and `[0.8, 1.0]` for response processing.

use std::mem;
use std::sync::Arc;

use tracing::error;

use crate::config;
use crate::progress::ProgressBus;
use crate::runner::{Step, TaskBody};
use crate::transport::{Method, PendingExchange, Transport, WireRequest};

use super::request::{encode_request, GenerationRequest};
use super::response::{interpret_reply, GenerationResult};
use super::{generate_url, GENERATION_TIMEOUT};

/// Callback receiving the final result of a generation.
///
/// Invoked exactly once, unless the task is cancelled first (then never).
pub type CompletionCallback = Box<dyn FnOnce(GenerationResult)>;

enum State {
    Prepare(GenerationRequest),
    InFlight(PendingExchange),
    Done,
}

/// Suspendable task body for one image generation.
pub struct GenerateTask {
    state: State,
    api_key: String,
    transport: Arc<dyn Transport>,
    progress: ProgressBus,
    on_complete: Option<CompletionCallback>,
}

impl GenerateTask {
    pub fn new(
        request: GenerationRequest,
        api_key: impl Into<String>,
        transport: Arc<dyn Transport>,
        progress: ProgressBus,
        on_complete: impl FnOnce(GenerationResult) + 'static,
    ) -> Self {
        GenerateTask {
            state: State::Prepare(request),
            api_key: api_key.into(),
            transport,
            progress,
            on_complete: Some(Box::new(on_complete)),
        }
    }

    fn prepare(&mut self, request: GenerationRequest) -> Step {
        if !config::api_key_looks_valid(&self.api_key) {
            self.complete(GenerationResult::failure(
                "Invalid or missing API key. Please configure an API key before generating.",
            ));
            return Step::Finished;
        }

        self.progress.publish(0.1, "Building request...");
        let body = match encode_request(&request) {
            Ok(body) => body,
            Err(e) => {
                self.complete(GenerationResult::failure(format!(
                    "Failed to build request: {}",
                    e
                )));
                return Step::Finished;
            }
        };

        self.progress.publish(0.2, "Sending request...");
        let wire = WireRequest {
            method: Method::Post,
            url: generate_url(request.model),
            api_key: self.api_key.clone(),
            body: Some(body),
            timeout: GENERATION_TIMEOUT,
        };
        self.state = State::InFlight(PendingExchange::dispatch(
            Arc::clone(&self.transport),
            wire,
        ));
        Step::Continue
    }

    fn poll(&mut self, mut pending: PendingExchange) -> Step {
        match pending.try_take() {
            None => {
                self.progress
                    .publish(0.2 + pending.fraction() * 0.6, "Generating image...");
                self.state = State::InFlight(pending);
                Step::Continue
            }
            Some(reply) => {
                self.progress.publish(0.85, "Processing response...");
                let result = interpret_reply(&reply);
                self.complete(result);
                self.progress.publish(1.0, "Complete");
                Step::Finished
            }
        }
    }

    fn complete(&mut self, result: GenerationResult) {
        if !result.success {
            if let Some(message) = result.error_message.as_deref() {
                error!("generation failed: {}", message);
            }
        }
        if let Some(on_complete) = self.on_complete.take() {
            on_complete(result);
        }
    }
}

impl TaskBody for GenerateTask {
    fn resume(&mut self) -> Step {
        match mem::replace(&mut self.state, State::Done) {
            State::Prepare(request) => self.prepare(request),
            State::InFlight(pending) => self.poll(pending),
            State::Done => Step::Finished,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{encode_png, CodecError, PixelSource};
    use crate::progress::ProgressUpdate;
    use crate::transport::{MockTransport, WireReply};
    use base64::engine::general_purpose::STANDARD as BASE64;
    use base64::Engine as _;
    use image::{Rgba, RgbaImage};
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::thread;
    use std::time::{Duration, Instant};

    const GOOD_KEY: &str = "AIzaSyA-0123456789abcdefghij";

    fn scene() -> RgbaImage {
        RgbaImage::from_pixel(2, 2, Rgba([1, 2, 3, 255]))
    }

    fn success_body() -> String {
        let payload = BASE64.encode(encode_png(&scene()).unwrap());
        format!(
            r#"{{"candidates": [{{"content": {{"parts": [
                {{"text": "done"}},
                {{"inlineData": {{"mimeType": "image/png", "data": "{}"}}}}
            ]}}}}]}}"#,
            payload
        )
    }

    struct Harness {
        task: GenerateTask,
        mock: Arc<MockTransport>,
        result: Rc<RefCell<Option<GenerationResult>>>,
        updates: Rc<RefCell<Vec<ProgressUpdate>>>,
        _subscription: crate::progress::ProgressSubscription,
    }

    fn harness(request: GenerationRequest, api_key: &str, reply: WireReply) -> Harness {
        let mock = Arc::new(MockTransport::replying(reply));
        let bus = ProgressBus::new();
        let updates = Rc::new(RefCell::new(Vec::new()));
        let sink = updates.clone();
        let subscription = bus.subscribe(move |u| sink.borrow_mut().push(u.clone()));

        let result = Rc::new(RefCell::new(None));
        let slot = result.clone();
        let task = GenerateTask::new(
            request,
            api_key,
            mock.clone() as Arc<dyn Transport>,
            bus,
            move |r| *slot.borrow_mut() = Some(r),
        );
        Harness {
            task,
            mock,
            result,
            updates,
            _subscription: subscription,
        }
    }

    /// Resumes until `Finished`, sleeping between polls like a tick loop.
    fn drive_to_completion(task: &mut GenerateTask) {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            match task.resume() {
                Step::Finished => return,
                _ => {
                    assert!(Instant::now() < deadline, "task never completed");
                    thread::sleep(Duration::from_millis(1));
                }
            }
        }
    }

    #[test]
    fn test_invalid_key_completes_without_network_call() {
        let mut h = harness(
            GenerationRequest::new("p", scene()),
            "short",
            WireReply::ok(200, Vec::new()),
        );

        assert!(matches!(h.task.resume(), Step::Finished));

        let result = h.result.borrow_mut().take().unwrap();
        assert!(!result.success);
        assert!(result.error_message.unwrap().contains("API key"));
        assert_eq!(h.mock.calls(), 0);
        assert!(h.updates.borrow().is_empty());
    }

    #[test]
    fn test_successful_generation() {
        let mut h = harness(
            GenerationRequest::new("repaint", scene()),
            GOOD_KEY,
            WireReply::ok(200, success_body().into_bytes()),
        );

        drive_to_completion(&mut h.task);

        let result = h.result.borrow_mut().take().unwrap();
        assert!(result.success);
        assert_eq!(result.image.unwrap().dimensions(), (2, 2));
        assert_eq!(result.text.as_deref(), Some("done"));
        assert_eq!(h.mock.calls(), 1);
    }

    #[test]
    fn test_request_wire_shape() {
        let mut h = harness(
            GenerationRequest::new("repaint", scene()),
            GOOD_KEY,
            WireReply::ok(200, success_body().into_bytes()),
        );
        drive_to_completion(&mut h.task);

        let requests = h.mock.requests();
        assert_eq!(requests.len(), 1);
        let wire = &requests[0];
        assert_eq!(wire.method, Method::Post);
        assert!(wire.url.ends_with(":generateContent"));
        assert_eq!(wire.api_key, GOOD_KEY);
        assert_eq!(wire.timeout, GENERATION_TIMEOUT);
        assert!(wire.body.is_some());
    }

    #[test]
    fn test_progress_sequence_is_staged_and_monotonic() {
        let mut h = harness(
            GenerationRequest::new("repaint", scene()),
            GOOD_KEY,
            WireReply::ok(200, success_body().into_bytes()),
        );
        drive_to_completion(&mut h.task);

        let updates = h.updates.borrow();
        assert!(updates.len() >= 4);
        assert_eq!(updates[0].fraction, 0.1);
        assert_eq!(updates[0].stage, "Building request...");
        assert_eq!(updates[1].fraction, 0.2);
        assert_eq!(updates.last().unwrap().fraction, 1.0);
        for pair in updates.windows(2) {
            assert!(pair[0].fraction <= pair[1].fraction);
        }
        assert!(updates
            .iter()
            .any(|u| u.stage == "Processing response..." && u.fraction == 0.85));
    }

    #[test]
    fn test_in_flight_progress_scales_into_middle_band() {
        // Transport reports 0.5 mid-exchange; while the reply is pending
        // the task must publish 0.2 + 0.5 * 0.6 = 0.5 at most.
        let mut h = harness(
            GenerationRequest::new("repaint", scene()),
            GOOD_KEY,
            WireReply::ok(200, success_body().into_bytes()),
        );
        drive_to_completion(&mut h.task);

        for update in h.updates.borrow().iter() {
            if update.stage == "Generating image..." {
                assert!(update.fraction >= 0.2 && update.fraction <= 0.8);
            }
        }
    }

    #[test]
    fn test_unreadable_scene_fails_before_network() {
        struct BrokenSource;
        impl PixelSource for BrokenSource {
            fn width(&self) -> u32 {
                4
            }
            fn height(&self) -> u32 {
                4
            }
            fn to_rgba(&self) -> Result<RgbaImage, CodecError> {
                Err(CodecError::UnreadableSource("no readable copy".into()))
            }
        }

        let mut h = harness(
            GenerationRequest::new("p", BrokenSource),
            GOOD_KEY,
            WireReply::ok(200, Vec::new()),
        );

        assert!(matches!(h.task.resume(), Step::Finished));
        let result = h.result.borrow_mut().take().unwrap();
        assert!(!result.success);
        assert!(result
            .error_message
            .unwrap()
            .starts_with("Failed to build request:"));
        assert_eq!(h.mock.calls(), 0);
    }

    #[test]
    fn test_api_error_reply_is_classified() {
        let body = r#"{"error": {"code": 400, "message": "API key not valid", "status": "INVALID_ARGUMENT"}}"#;
        let mut h = harness(
            GenerationRequest::new("p", scene()),
            GOOD_KEY,
            WireReply::http_error(400, "Bad Request", body.as_bytes().to_vec()),
        );
        drive_to_completion(&mut h.task);

        let result = h.result.borrow_mut().take().unwrap();
        assert!(!result.success);
        assert_eq!(
            result.error_message.as_deref(),
            Some("API Error (400): API key not valid")
        );
    }

    #[test]
    fn test_completion_callback_fires_exactly_once() {
        let mut h = harness(
            GenerationRequest::new("p", scene()),
            GOOD_KEY,
            WireReply::ok(200, success_body().into_bytes()),
        );
        drive_to_completion(&mut h.task);
        assert!(h.result.borrow().is_some());

        // Resuming a finished task is inert.
        assert!(matches!(h.task.resume(), Step::Finished));
        assert!(matches!(h.task.resume(), Step::Finished));
    }

    #[test]
    fn test_completion_precedes_final_progress_event() {
        let bus = ProgressBus::new();
        let mock = Arc::new(MockTransport::replying(WireReply::ok(
            200,
            success_body().into_bytes(),
        )));

        let completed = Rc::new(RefCell::new(false));
        let order_ok = Rc::new(RefCell::new(true));

        let completed_at_publish = completed.clone();
        let order = order_ok.clone();
        let _sub = bus.subscribe(move |update| {
            if update.fraction == 1.0 && !*completed_at_publish.borrow() {
                *order.borrow_mut() = false;
            }
        });

        let completed_slot = completed.clone();
        let mut task = GenerateTask::new(
            GenerationRequest::new("p", scene()),
            GOOD_KEY,
            mock as Arc<dyn Transport>,
            bus,
            move |_| *completed_slot.borrow_mut() = true,
        );
        drive_to_completion(&mut task);

        assert!(*completed.borrow());
        assert!(*order_ok.borrow(), "final progress fired before completion");
    }
}
