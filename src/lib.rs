//! Complaint triage: classifies citizen complaints into a category and a
//! severity and derives a handling priority.

pub mod config;
pub mod dataset;
pub mod embedding;
pub mod error;
pub mod ml;
pub mod models;
pub mod state;
pub mod telemetry;

pub use error::{AppError, Result};
