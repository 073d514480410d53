//! lbi-importer library interface
//!
//! Resumable import of a Deezer listening history export into ListenBrainz.
//! Exposes the engine and its collaborators for the binary and for integration
//! testing.

pub mod engine;
pub mod error;
pub mod models;
pub mod services;
pub mod source;

pub use crate::engine::{ImportEngine, ImportSummary};
pub use crate::error::{ImportError, SubmitError};
pub use crate::models::Listen;
pub use crate::services::{ListenBrainzClient, SubmissionClient};
pub use crate::source::{file_key_for, CsvListenSource, ListenSource};
