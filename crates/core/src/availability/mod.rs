//! Availability reconciliation.
//!
//! Each backend answers "is this cached?" in its own shape. The normalizers
//! turn those answers into observations and the [`Reconciler`] folds them into
//! one canonical state per release.

mod normalizers;
mod reconciler;
mod types;

pub use normalizers::{normalize, NormalizeFailure, Observation};
pub use reconciler::Reconciler;
pub use types::*;
