//! Drives a web app through a planned sequence of intents, detects meaningful
//! UI state changes after every action, and records one screenshot-backed
//! step per new state.

pub mod config;
pub mod detector;
pub mod errors;
pub mod executor;
pub mod extractor;
pub mod guide;
pub mod locator;
pub mod orchestrator;
pub mod recorder;
pub mod resolver;
pub mod signals;
pub mod surface;
pub mod types;

pub use config::Config;
pub use detector::{StateChangeDetector, signature};
pub use errors::{ErrorKind, SurfaceError, WorkflowError};
pub use executor::{ActionExecutor, ExecutionResult};
pub use extractor::SignatureExtractor;
pub use guide::MarkdownGuide;
pub use orchestrator::{
    DocumentationGenerator, LoginGate, Orchestrator, Planner, RunOutcome, RunStatus, TaskRequest,
};
pub use recorder::{CaptureRecorder, CaptureRequest, FileScreenshotCapturer, ScreenshotCapturer};
pub use resolver::{StaticUrlResolver, UrlResolver};
pub use surface::{Interaction, LiveSurface, SurfaceNode, SurfaceSnapshot};
pub use types::{
    ChangeKind, Intent, IntentKind, PageObservation, Phase, StateSignature, StepRecord,
};
