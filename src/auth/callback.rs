//! Usage: Parsing inbound activation URIs from the browser redirect.

use crate::shared::error::{AppError, AppResult, CODE_MALFORMED_CALLBACK};
use url::Url;

/// Parameters carried by a recognized callback URI. Exactly one of `token`
/// and `error` is expected; both may be absent on a broken redirect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CallbackPayload {
    pub nonce: Option<String>,
    pub token: Option<String>,
    pub error: Option<String>,
}

/// Classify an inbound activation URI.
///
/// - `Ok(Some(payload))`: the URI targets the login callback endpoint.
/// - `Ok(None)`: parseable but aimed elsewhere (another feature's deep link);
///   the caller ignores it.
/// - `Err`: not parseable as a URI at all. Activation URIs arrive on a shared
///   channel, so a broken one cannot be attributed to a single login attempt.
pub(crate) fn parse_callback_uri(raw: &str, expected: &Url) -> AppResult<Option<CallbackPayload>> {
    let url = Url::parse(raw).map_err(|e| {
        AppError::new(
            CODE_MALFORMED_CALLBACK,
            format!("unparseable activation uri: {e}"),
        )
    })?;

    if url.scheme() != expected.scheme()
        || url.host_str() != expected.host_str()
        || url.path() != expected.path()
    {
        return Ok(None);
    }

    let mut payload = CallbackPayload {
        nonce: None,
        token: None,
        error: None,
    };
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "nonce" => payload.nonce = Some(value.into_owned()),
            "token" => payload.token = Some(value.into_owned()),
            "error" => payload.error = Some(value.into_owned()),
            _ => {}
        }
    }
    Ok(Some(payload))
}
