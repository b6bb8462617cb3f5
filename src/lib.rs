//! Throttler - namespace-scoped request throttling
//!
//! This crate decides, for a namespace (an API key, a client, an endpoint)
//! and a point in time, whether one more unit of work is admitted, how much
//! capacity remains and how long until more becomes available. Usage lives in
//! a pluggable counter store so the same limits hold whether the store is
//! private to one limiter or shared by many.

pub mod clock;
pub mod config;
pub mod error;
pub mod ratelimit;
pub mod store;
pub mod throttler;

pub use error::{Result, ThrottleError};
pub use throttler::{Admission, RetryPolicy, Throttler};
