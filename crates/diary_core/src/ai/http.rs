//! Shared HTTP client construction for provider and search adapters.

use std::time::Duration;

const USER_AGENT: &str = concat!("study-diary/", env!("CARGO_PKG_VERSION"));

/// Builds a [`reqwest::Client`] with a per-request timeout.
///
/// # Errors
/// Returns the builder error when TLS backend initialization fails.
pub fn build_client(timeout: Duration) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .redirect(reqwest::redirect::Policy::limited(5))
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_builds_with_short_timeout() {
        assert!(build_client(Duration::from_millis(250)).is_ok());
    }
}
