pub mod cached;
pub mod client;
pub mod insights;
pub mod types;

pub use cached::CachedCircleCIClient;
pub use client::{CircleCIApi, CircleCIClient};
