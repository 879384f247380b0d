//! Shared HTTP plumbing for the collaborator clients.

use std::time::Duration;

use reqwest::{Client, RequestBuilder};

use reglens_shared::{AuthStyle, RegLensError, Result};

/// User-Agent string for collaborator requests.
const USER_AGENT: &str = concat!("RegLens/", env!("CARGO_PKG_VERSION"));

/// Longest response body excerpt carried into an error message.
const MAX_ERROR_BODY: usize = 500;

/// Build a reqwest client with a per-request timeout.
pub(crate) fn build_client(timeout_secs: u64) -> Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| RegLensError::ExternalCall(format!("failed to build HTTP client: {e}")))
}

/// Attach the API key in the configured header style.
pub(crate) fn with_auth(builder: RequestBuilder, style: AuthStyle, api_key: &str) -> RequestBuilder {
    match style {
        AuthStyle::Bearer => builder.bearer_auth(api_key),
        AuthStyle::ApiKey => builder.header("api-key", api_key),
    }
}

/// Cut a response body down to something that fits in a log line.
pub(crate) fn excerpt(body: &str) -> String {
    if body.len() <= MAX_ERROR_BODY {
        return body.to_string();
    }
    let mut end = MAX_ERROR_BODY;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…", &body[..end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn excerpt_keeps_short_bodies() {
        assert_eq!(excerpt("not found"), "not found");
    }

    #[test]
    fn excerpt_truncates_on_char_boundary() {
        let body = "é".repeat(400);
        let cut = excerpt(&body);
        assert!(cut.ends_with('…'));
        assert!(cut.len() <= MAX_ERROR_BODY + '…'.len_utf8());
    }
}
