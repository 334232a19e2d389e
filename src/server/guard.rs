//! Authentication and shape validation for webhook notifications.
//!
//! Every notification is checked before anything is enqueued: the channel
//! token must match the configured verification token, the source address
//! must be on the allowlist, and the channel id and resource state headers
//! must be present and well-formed. Authentication failures map to 403,
//! shape failures to 400.

use std::net::IpAddr;

use axum::http::{HeaderMap, StatusCode};
use thiserror::Error;

use crate::types::{ChannelId, ResourceState};

const CHANNEL_TOKEN_HEADER: &str = "x-goog-channel-token";
const CHANNEL_ID_HEADER: &str = "x-goog-channel-id";
const RESOURCE_STATE_HEADER: &str = "x-goog-resource-state";
const RESOURCE_ID_HEADER: &str = "x-goog-resource-id";

/// Why a notification was refused.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum Rejection {
    #[error("missing channel token")]
    MissingToken,

    #[error("invalid channel token")]
    InvalidToken,

    #[error("source address {0} is not allowed")]
    DisallowedAddress(IpAddr),

    #[error("missing channel id")]
    MissingChannelId,

    #[error("missing resource state")]
    MissingResourceState,

    #[error("unknown resource state {0:?}")]
    UnknownResourceState(String),
}

impl Rejection {
    pub fn status(&self) -> StatusCode {
        match self {
            Rejection::MissingToken
            | Rejection::InvalidToken
            | Rejection::DisallowedAddress(_) => StatusCode::FORBIDDEN,
            Rejection::MissingChannelId
            | Rejection::MissingResourceState
            | Rejection::UnknownResourceState(_) => StatusCode::BAD_REQUEST,
        }
    }
}

/// A notification that passed authentication and shape validation.
#[derive(Debug, PartialEq, Eq)]
pub struct ValidatedNotification {
    pub channel_id: ChannelId,
    pub resource_state: ResourceState,
    pub resource_id: Option<String>,
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// Validates an incoming notification.
///
/// Authentication is checked before shape so a probing client learns nothing
/// about which headers the endpoint expects. The allowlist check fails
/// closed: an empty list admits no one.
pub fn validate(
    headers: &HeaderMap,
    client_addr: IpAddr,
    verification_token: &str,
    allowed_addrs: &[IpAddr],
) -> Result<ValidatedNotification, Rejection> {
    let token = header(headers, CHANNEL_TOKEN_HEADER).ok_or(Rejection::MissingToken)?;
    if token != verification_token {
        return Err(Rejection::InvalidToken);
    }
    if !allowed_addrs.contains(&client_addr) {
        return Err(Rejection::DisallowedAddress(client_addr));
    }

    let channel_id = header(headers, CHANNEL_ID_HEADER)
        .filter(|v| !v.is_empty())
        .ok_or(Rejection::MissingChannelId)?;
    let raw_state =
        header(headers, RESOURCE_STATE_HEADER).ok_or(Rejection::MissingResourceState)?;
    let resource_state = ResourceState::parse(raw_state)
        .ok_or_else(|| Rejection::UnknownResourceState(raw_state.to_string()))?;

    Ok(ValidatedNotification {
        channel_id: ChannelId::new(channel_id),
        resource_state,
        resource_id: header(headers, RESOURCE_ID_HEADER).map(str::to_string),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    const TOKEN: &str = "secret-token";
    const LOCALHOST: IpAddr = IpAddr::V4(std::net::Ipv4Addr::LOCALHOST);

    fn headers(entries: &[(&str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in entries {
            map.insert(
                axum::http::HeaderName::try_from(*name).unwrap(),
                HeaderValue::from_str(value).unwrap(),
            );
        }
        map
    }

    fn complete_headers() -> HeaderMap {
        headers(&[
            ("x-goog-channel-token", TOKEN),
            ("x-goog-channel-id", "chan-42"),
            ("x-goog-resource-state", "update"),
            ("x-goog-resource-id", "res-7"),
        ])
    }

    #[test]
    fn accepts_complete_notification() {
        let validated = validate(&complete_headers(), LOCALHOST, TOKEN, &[LOCALHOST]).unwrap();
        assert_eq!(validated.channel_id.as_str(), "chan-42");
        assert_eq!(validated.resource_state, ResourceState::Update);
        assert_eq!(validated.resource_id.as_deref(), Some("res-7"));
    }

    #[test]
    fn rejects_missing_and_wrong_token() {
        let mut missing = complete_headers();
        missing.remove("x-goog-channel-token");
        assert_eq!(
            validate(&missing, LOCALHOST, TOKEN, &[]),
            Err(Rejection::MissingToken)
        );

        let wrong = headers(&[("x-goog-channel-token", "nope")]);
        assert_eq!(
            validate(&wrong, LOCALHOST, TOKEN, &[]),
            Err(Rejection::InvalidToken)
        );
    }

    #[test]
    fn rejects_disallowed_source_address() {
        let stranger: IpAddr = "203.0.113.9".parse().unwrap();
        let err = validate(&complete_headers(), stranger, TOKEN, &[LOCALHOST]).unwrap_err();
        assert_eq!(err, Rejection::DisallowedAddress(stranger));
        assert_eq!(err.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn empty_allowlist_fails_closed() {
        // No configured addresses means no one gets in, never allow-all.
        let err = validate(&complete_headers(), LOCALHOST, TOKEN, &[]).unwrap_err();
        assert_eq!(err, Rejection::DisallowedAddress(LOCALHOST));
    }

    #[test]
    fn token_is_checked_before_shape() {
        // A request that is both unauthenticated and malformed gets 403, not 400.
        let bare = headers(&[("x-goog-channel-token", "nope")]);
        assert_eq!(
            validate(&bare, LOCALHOST, TOKEN, &[]).unwrap_err().status(),
            StatusCode::FORBIDDEN
        );
    }

    #[test]
    fn rejects_malformed_shape() {
        let mut no_channel = complete_headers();
        no_channel.remove("x-goog-channel-id");
        assert_eq!(
            validate(&no_channel, LOCALHOST, TOKEN, &[LOCALHOST]),
            Err(Rejection::MissingChannelId)
        );

        let mut bad_state = complete_headers();
        bad_state.insert(
            "x-goog-resource-state",
            HeaderValue::from_static("exploded"),
        );
        let err = validate(&bad_state, LOCALHOST, TOKEN, &[LOCALHOST]).unwrap_err();
        assert_eq!(err, Rejection::UnknownResourceState("exploded".to_string()));
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn resource_id_is_optional() {
        let mut headers = complete_headers();
        headers.remove("x-goog-resource-id");
        let validated = validate(&headers, LOCALHOST, TOKEN, &[LOCALHOST]).unwrap();
        assert_eq!(validated.resource_id, None);
    }
}
