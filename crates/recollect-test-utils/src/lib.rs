//! Test helpers shared across Recollect crates.

pub mod generation;
pub mod persistence;

pub use generation::{
    FailingGeneration, FixedGeneration, PromptLog, RecordingGeneration, ScriptedGeneration,
};
pub use persistence::FailingPersistence;
