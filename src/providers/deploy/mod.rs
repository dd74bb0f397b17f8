pub mod cached;
pub mod client;
pub mod latency;
pub mod types;

pub use cached::CachedDeployClient;
pub use client::{CloudDeployClient, DeployApi};
