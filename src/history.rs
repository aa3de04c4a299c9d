//! Edit history: per-document tracking and request snapshots.

pub mod context;
pub mod tracker;

pub use context::{DocumentHistory, HistoryContext, HistoryContextBuilder};
pub use tracker::HistoryTracker;
