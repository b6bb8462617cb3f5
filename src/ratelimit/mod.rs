//! Rate accounting: policies, the provider capability set and the
//! fixed-window algorithm.

mod fixed_window;
mod namespace;
mod policy;
mod provider;
mod ratio;

pub use fixed_window::{FixedWindowProvider, FixedWindowProviderBuilder};
pub use namespace::validate_namespace;
pub use policy::{LimitPolicy, PolicySet, TimeWindow, DEFAULT_LIMIT, DEFAULT_WINDOW};
pub use provider::RateProvider;
pub use ratio::RatioFactor;
