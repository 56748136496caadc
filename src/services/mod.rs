//! Multi-step media operations
//!
//! Each component receives its collaborators at construction time and holds no
//! per-request mutable state, so one instance serves all requests.

pub mod best_effort;
pub mod cascade;
pub mod reactions;
pub mod stream;
pub mod upload;

pub use best_effort::{best_effort, StepOutcome};
pub use cascade::{CascadeReport, DeleteCascade, VideoDeletion};
pub use reactions::ReactionService;
pub use stream::{parse_range, MediaStream, StreamProxy};
pub use upload::{blob_key, TopicRef, UploadFile, UploadRequest, UploadSaga};
