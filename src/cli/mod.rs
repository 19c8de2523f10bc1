//! Command-line support for arbor.
//!
//! Both commands take a query document (see [`crate::document`]) as JSON
//! text. `run` evaluates it against a JSON object of records; `check` only
//! builds it and reports its shape.

mod check;
mod run;

pub use check::{execute_check, CheckSummary};
pub use run::{execute_run, RunOptions};

use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("query error: {0}")]
    Query(#[from] crate::QueryError),

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("{0} must be a JSON object")]
    NotAnObject(&'static str),

    #[error("no input provided. Use --input or pipe JSON to stdin.")]
    NoInput,
}
