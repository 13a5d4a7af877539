//! Pipelines behind each subcommand.
//!
//! | Subcommand | Module | Method | Output |
//! |------------|--------|--------|--------|
//! | `emoji` | [`emoji`] | headless browser, infinite scroll | `slug -> {name, href, image}` |
//! | `headlines` | [`headlines`] | HTTP + HTML parsing, bounded concurrency | [`crate::models::HeadlineReport`] |
//! | `upload` | [`upload`] | reads a local JSON file | whatever the file contains |
//! | `images` | [`images`] | HTTP downloads from an emoji index | one image file per entry |
//!
//! Each pipeline returns its payload (or summary) to `main`, which owns the
//! sink write and the exit code.

pub mod emoji;
pub mod headlines;
pub mod images;
pub mod upload;
