pub mod cached;
pub mod client;
pub mod reviews;
pub mod types;

pub use cached::CachedGithubClient;
pub use client::{GithubApi, GithubClient};
