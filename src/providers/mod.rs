pub mod circleci;
pub mod deploy;
pub mod github;

use url::Url;

use crate::error::{Result, ShipLensError};

/// Parses an API base URL, appending a trailing slash when missing so that
/// `Url::join` treats the final path segment as a directory instead of
/// replacing it.
pub(crate) fn parse_base_url(raw: &str) -> Result<Url> {
    let normalized = if raw.ends_with('/') {
        raw.to_string()
    } else {
        format!("{raw}/")
    };

    Url::parse(&normalized)
        .map_err(|e| ShipLensError::ConfigError(format!("Invalid base URL '{raw}': {e}")))
}
