//! Test harness for wmserver
//!
//! Provides infrastructure for driving a `WindowRoot` in-process.
//!
//! # Modules
//!
//! - `headless`: Root wrapper with recording agent and ability service
//! - `assertions`: Common test assertions
//! - `fixtures`: Test fixture helpers

pub mod assertions;
pub mod fixtures;
pub mod headless;

pub use headless::{AppHandle, RecordingAbility, RecordingAgent, RootSnapshot, TestRoot};
