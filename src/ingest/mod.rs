//! Callback ingestion.
//!
//! The Analyzer reports async outcomes by calling back into
//! [`CallbackService`], which normalizes each payload and appends it to the
//! result store. The task id is the join key between the dispatch call and
//! the callback.

pub mod clock;
pub mod service;

pub use clock::MonotonicClock;
pub use service::{CallbackService, MAX_TASK_RESULTS};
