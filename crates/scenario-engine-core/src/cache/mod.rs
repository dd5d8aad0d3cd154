//! Result caching for Monte Carlo runs.

pub mod simulator;
pub mod store;

pub use simulator::{cache_key, CachedSimulator};
pub use store::{InMemoryCache, NoopCache, ResultCache};
