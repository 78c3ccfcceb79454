//! Shared ureq plumbing: agent construction and error mapping.

use std::time::Duration;

use serde::de::DeserializeOwned;
use trackbridge_core::{Tracker, TrackerError};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const USER_AGENT: &str = concat!("trackbridge/", env!("CARGO_PKG_VERSION"));
const MAX_ERROR_BODY: usize = 200;

pub(crate) fn agent() -> ureq::Agent {
    ureq::AgentBuilder::new()
        .timeout(REQUEST_TIMEOUT)
        .user_agent(USER_AGENT)
        .build()
}

/// Turn a ureq result into a response or a [`TrackerError`].
pub(crate) fn check(
    tracker: Tracker,
    result: Result<ureq::Response, ureq::Error>,
) -> Result<ureq::Response, TrackerError> {
    match result {
        Ok(response) => Ok(response),
        Err(ureq::Error::Status(status, response)) => {
            let body = response.into_string().unwrap_or_default();
            Err(TrackerError::Http {
                tracker,
                status,
                body: truncate_for_error(&body),
            })
        }
        Err(ureq::Error::Transport(transport)) => Err(TrackerError::Transport {
            tracker,
            message: transport.to_string(),
        }),
    }
}

pub(crate) fn read_json<T: DeserializeOwned>(
    tracker: Tracker,
    response: ureq::Response,
) -> Result<T, TrackerError> {
    let text = response
        .into_string()
        .map_err(|e| TrackerError::Transport {
            tracker,
            message: format!("failed to read response body: {e}"),
        })?;
    decode(tracker, &text)
}

pub(crate) fn decode<T: DeserializeOwned>(tracker: Tracker, text: &str) -> Result<T, TrackerError> {
    serde_json::from_str(text).map_err(|e| TrackerError::Decode {
        tracker,
        message: e.to_string(),
    })
}

pub(crate) fn truncate_for_error(body: &str) -> String {
    if body.chars().count() <= MAX_ERROR_BODY {
        body.to_owned()
    } else {
        format!("{}...", body.chars().take(MAX_ERROR_BODY).collect::<String>())
    }
}
