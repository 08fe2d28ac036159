//! Error handling built on `thiserror` and `anyhow`.
//!
//! Domain-specific error types for precise handling live in [`domain`];
//! operational context propagation and centralized reporting live in
//! [`operational`].

pub mod domain;
pub mod operational;

pub use {
    domain::{ConnectionError, LibraryError, PlaybackError},
    operational::{ErrorReporter, ResultExt},
};
