//! Core types for docpub
//!
//! Shared by every docpub crate:
//! - [`Error`] and [`Result`], the error type every pipeline stage reports through
//! - [`config::PublisherConfig`], the `docpub.toml` model with workflow defaults
//! - [`identity`], the commit identity and credentials handed to child processes

pub mod config;
mod error;
pub mod identity;

pub use config::PublisherConfig;
pub use error::{Error, Result};
pub use identity::{CommitIdentity, Credentials};
