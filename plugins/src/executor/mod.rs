pub mod strategies;

pub use strategies::{AdaptiveConcurrency, FixedConcurrency};
