//! Pure, deterministic workflow logic.
//!
//! Nothing in this module performs I/O. State routing, diagnosis assembly and
//! invariant checks are plain functions of [`state::WorkflowState`] so they
//! can be tested without a backend or a sandbox.

pub mod diagnosis;
pub mod invariants;
pub mod state;
pub mod step;
