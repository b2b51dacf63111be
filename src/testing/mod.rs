//! Testability harness utilities.
//!
//! Deterministic signal generators and stub suggestion services shared by
//! unit tests and integration tests. Compiled only for tests or with the
//! `test_fixtures` feature. Nothing here talks to the network or reads
//! from disk.

pub mod signals;
pub mod stubs;

pub use stubs::{
    FailingSuggestionService, ScriptedSuggestionService, StaticSuggestionService,
};
