// Resume domain: evaluation prompt, preview rendering and the store.

pub mod handlers;
pub mod preview;
pub mod prompts;
pub mod store;

pub use preview::{PreviewScope, TextSnapshotRenderer};
pub use store::{ResumeStore, ResumeUpload};
