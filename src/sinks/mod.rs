//! Sinks persist the final harvested mapping.
//!
//! # Submodules
//!
//! - [`file`]: pretty-printed UTF-8 JSON on the local filesystem
//! - [`remote`]: a tree-structured REST database (one JSON document per path)
//!
//! # Write modes
//!
//! | Mode | File | Remote |
//! |------|------|--------|
//! | [`WriteMode::Overwrite`] | replace the whole file | `PUT` the path |
//! | [`WriteMode::Merge`] | shallow-merge keys into the existing object | `PATCH` the path |
//!
//! Sink failures are always fatal to the run; nothing is retried.

pub mod file;
pub mod remote;

use crate::error::Result;
use clap::ValueEnum;
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum WriteMode {
    /// Replace the target with exactly this payload.
    Overwrite,
    /// Apply only the payload's top-level keys, leave the rest untouched.
    Merge,
}

/// A persistence target for a harvested payload.
pub trait Sink {
    /// Human-readable target, for logs and errors.
    fn target(&self) -> String;

    async fn write(&self, payload: &Value, mode: WriteMode) -> Result<()>;
}

/// The sink chosen on the command line.
#[derive(Debug, Clone)]
pub enum AnySink {
    File(file::FileSink),
    Remote(remote::RemoteSink),
}

impl Sink for AnySink {
    fn target(&self) -> String {
        match self {
            AnySink::File(sink) => sink.target(),
            AnySink::Remote(sink) => sink.target(),
        }
    }

    async fn write(&self, payload: &Value, mode: WriteMode) -> Result<()> {
        match self {
            AnySink::File(sink) => sink.write(payload, mode).await,
            AnySink::Remote(sink) => sink.write(payload, mode).await,
        }
    }
}
