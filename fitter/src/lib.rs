//! Agentic content fitting for structured layout documents.
//!
//! A fitting run rewrites the text of a layout document so it satisfies a
//! user's intent, by looping over a remote reasoning service:
//!
//! - **[`core`]**: Pure, deterministic logic (depth paths, serialization,
//!   position resolution, plan types, fix synthesis, invariants).
//! - **[`io`]**: Side-effecting collaborators (document ownership, document
//!   files, config, the reasoning-service bridge, run logs).
//!
//! Orchestration modules ([`execute`], [`workflow`]) coordinate core logic
//! with the collaborators.

pub mod core;
pub mod document;
pub mod execute;
pub mod exit_codes;
pub mod io;
pub mod logging;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
pub mod workflow;
