//! Graftwork - cherry-pick patch delivery through the GitHub API
//!
//! Graftwork applies the differences between two commits to a target
//! branch of a hosted repository without maintaining a local clone: refs
//! are resolved, the diff fetched, the touched files materialized into a
//! scratch directory, the patch applied locally, and the result written
//! back as new blobs, a tree, and a commit through the API.
//!
//! # Architecture
//!
//! The codebase follows a layered architecture:
//!
//! - [`cli`] - Command-line interface layer (parses args, delegates)
//! - [`pick`] - Orchestrates one delivery: resolve → diff → materialize →
//!   apply → upload → commit → conditional ref update
//! - [`forge`] - All remote-API interaction (GitHub v3; mock for tests)
//! - [`core`] - Domain types and configuration
//!
//! # Correctness Invariants
//!
//! 1. The branch reference moves only by compare-and-swap against the
//!    head recorded when the delivery started
//! 2. A rejected patch application never creates remote objects
//! 3. Scratch workspaces are reclaimed on every exit path

pub mod cli;
pub mod core;
pub mod forge;
pub mod pick;
