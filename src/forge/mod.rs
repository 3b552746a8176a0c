//! forge
//!
//! All remote-API interaction: ref resolution, diffing, tree and blob
//! reads, object creation, and conditional ref updates.
//!
//! # Architecture
//!
//! The `Forge` trait defines the interface for interacting with the hosted
//! repository. The patch controller holds a `dyn Forge` and never touches
//! HTTP directly, so everything above this layer is testable against the
//! in-memory [`mock`] implementation.
//!
//! # Modules
//!
//! - `traits`: Core `Forge` trait, error taxonomy, and object-model types
//! - [`github`]: GitHub implementation using the REST git-data API
//! - [`mock`]: In-memory implementation for deterministic testing

pub mod github;
pub mod mock;
mod traits;

pub use github::GitHubForge;
pub use traits::*;
