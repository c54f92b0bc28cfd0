//! Core types, configuration, and error handling for the Warden pipeline.
//!
//! This crate provides the shared foundation used by all other Warden crates:
//! - [`WardenError`] — unified error type using `thiserror`
//! - [`WardenConfig`] — configuration loaded from `.warden.toml`
//! - Shared types: [`PrLocator`], [`ChangedFile`], [`StructuredDiff`],
//!   [`Severity`], [`BugFinding`], [`TestSuggestions`], [`ReviewAnalysis`],
//!   [`TicketRecord`], [`WriteBackOutcome`], [`OutputFormat`]
//! - [`RunReport`] — the final status of one review run

mod config;
mod error;
mod report;
mod types;

pub use config::{GithubConfig, JiraConfig, LlmConfig, ReviewConfig, WardenConfig};
pub use error::WardenError;
pub use report::RunReport;
pub use types::{
    infer_language, BugFinding, ChangedFile, FileStatus, OutputFormat, PrLocator, ReviewAnalysis,
    Severity, StageFailure, StructuredDiff, TestCase, TestSuggestions, TicketRecord,
    WriteBackOutcome,
};

/// A convenience `Result` type for Warden operations.
pub type Result<T> = std::result::Result<T, WardenError>;
