//! MediaDispatch - dispatch media analysis jobs to an Analyzer and
//! correlate the results it reports back.
//!
//! The [`dispatch`] module fans jobs out synchronously or asynchronously,
//! [`invoker`] talks to the Analyzer, and [`ingest`] receives callbacks and
//! writes them to a [`store`].

pub mod api;
pub mod cli;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod ids;
pub mod ingest;
pub mod invoker;
pub mod models;
pub mod report;
pub mod state;
pub mod store;
