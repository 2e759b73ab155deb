//! Job dispatch.
//!
//! [`DispatchRequest`] validates the inbound shape, [`Dispatcher`] fans the
//! resulting [`JobBatch`] out to the Analyzer.

pub mod dispatcher;
pub mod request;

pub use dispatcher::{derive_callback_url, parse_callback_base, Dispatcher, DEFAULT_POOL_SIZE};
pub use request::{DispatchRequest, JobBatch};
