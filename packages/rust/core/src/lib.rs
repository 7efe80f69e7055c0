//! Core pipeline orchestration and domain logic for HealthNav.
//!
//! This crate ties the external service adapters into the four-stage
//! navigation pipeline (extract → plan → execute → synthesize) and hosts the
//! follow-up chat responder with its per-user conversation store.

pub mod adapters;
pub mod chat;
pub mod pipeline;
pub mod services;
pub mod stages;
pub mod state;

pub use chat::{ChatResponder, ConversationEntry, ConversationStore};
pub use pipeline::{Navigator, PipelineOutcome, ProgressReporter, SilentProgress, Stage, StageTiming};
pub use services::Services;
pub use state::{Extraction, PipelineState};
