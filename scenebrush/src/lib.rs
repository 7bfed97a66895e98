//! Scenebrush - cooperative generation tasks for the Gemini image API
//!
//! This library lets a host application issue long-running, cancellable
//! image generation calls and observe their progress without blocking
//! its own control loop. The host drives a [`runner::TaskRunner`] from
//! whatever per-iteration hook it already has; generation and key
//! validation are [`runner::TaskBody`] state machines that suspend while
//! the network works and resume once per tick.
//!
//! ```no_run
//! use std::rc::Rc;
//! use std::sync::Arc;
//! use scenebrush::gemini::{GenerateTask, GenerationRequest};
//! use scenebrush::progress::ProgressBus;
//! use scenebrush::runner::{ManualTickSource, TaskRunner};
//! use scenebrush::transport::HttpTransport;
//!
//! let scene = image::open("scene.png").unwrap();
//! let ticks = Rc::new(ManualTickSource::new());
//! let runner = TaskRunner::new(ticks.clone());
//! let transport = Arc::new(HttpTransport::new().unwrap());
//! let bus = ProgressBus::new();
//!
//! let task = GenerateTask::new(
//!     GenerationRequest::new("repaint this scene as a watercolor", scene),
//!     std::env::var("GEMINI_API_KEY").unwrap(),
//!     transport,
//!     bus.clone(),
//!     |result| println!("success: {}", result.success),
//! );
//! runner.start(task, None);
//!
//! while runner.active_tasks() > 0 {
//!     ticks.drive();
//!     std::thread::sleep(std::time::Duration::from_millis(16));
//! }
//! ```

pub mod codec;
pub mod config;
pub mod gemini;
pub mod progress;
pub mod runner;
pub mod transport;

pub use codec::{CodecError, PixelSource};
pub use config::{AspectRatio, CredentialsProvider, ImageSize, Model};
pub use gemini::{GenerateTask, GenerationRequest, GenerationResult, ValidateKeyTask};
pub use progress::{ProgressBus, ProgressSubscription, ProgressUpdate};
pub use runner::{OwnerId, Step, TaskBody, TaskId, TaskRunner};
pub use transport::{HttpTransport, Transport, TransportError};
