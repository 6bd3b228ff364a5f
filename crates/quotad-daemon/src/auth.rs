//! Request admission pipeline.
//!
//! Both endpoints take a sealed credential as the raw request body and run
//! it through the same gauntlet before any handler logic: unseal, require
//! the mandatory identity fields, check the sealing host against the
//! trusted network, charge the caller's rate-limit bucket, resolve the
//! caller's account, and strictly decode the wrapped JSON payload.
//!
//! The order matters. The rate limiter is keyed by uid, so it can only run
//! after the credential proves who is asking, and it must run before any
//! directory or filesystem work is done on the caller's behalf.

use quotad_core::identity::Account;
use serde::de::DeserializeOwned;

use crate::error::ApiError;
use crate::state::SharedState;

/// Admits a request and returns the verified caller plus the decoded
/// payload.
///
/// # Errors
///
/// [`ApiError::Unauthenticated`] for credential failures,
/// [`ApiError::RateLimited`] when the caller's bucket is empty, and
/// [`ApiError::BadRequest`] when the caller cannot be resolved or the
/// payload violates the schema.
pub async fn read_request<T>(state: &SharedState, body: &[u8]) -> Result<(Account, T), ApiError>
where
    T: DeserializeOwned,
{
    let identity =
        state
            .codec
            .unseal(body)
            .await
            .map_err(|e| ApiError::Unauthenticated {
                reason: e.to_string(),
            })?;
    let (Some(uid), Some(_), Some(origin)) =
        (identity.user_id, identity.group_id, identity.origin_host)
    else {
        return Err(ApiError::Unauthenticated {
            reason: "missing identity field in credential".to_owned(),
        });
    };
    if !state.trusted_net.contains(origin) {
        return Err(ApiError::Unauthenticated {
            reason: format!("invalid encode host {origin}"),
        });
    }
    if !state.limiter.allow(uid) {
        return Err(ApiError::RateLimited);
    }
    let submitter = state
        .directory
        .account_by_uid(uid)
        .await
        .map_err(|e| ApiError::bad_request(format!("Unable to find user details: {e}")))?;
    let request = decode_strict(&identity.payload)?;
    tracing::debug!(uid, login = %submitter.login, "request admitted");
    Ok((submitter, request))
}

/// Decodes the payload, rejecting unknown fields and trailing garbage.
/// The refusal echoes the payload back so users can see what their
/// client actually sealed.
fn decode_strict<T: DeserializeOwned>(payload: &[u8]) -> Result<T, ApiError> {
    serde_json::from_slice(payload).map_err(|e| {
        ApiError::bad_request(format!(
            "Credential payload was not valid JSON: {e}\ngot: {}",
            String::from_utf8_lossy(payload)
        ))
    })
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    use super::*;

    #[derive(Debug, Deserialize, PartialEq)]
    #[serde(deny_unknown_fields)]
    struct Probe {
        name: String,
    }

    #[test]
    fn test_decode_strict_accepts_exact_schema() {
        let probe: Probe = decode_strict(br#"{"name":"proj1"}"#).unwrap();
        assert_eq!(probe, Probe {
            name: "proj1".to_owned()
        });
    }

    #[test]
    fn test_decode_strict_rejects_unknown_fields() {
        let err = decode_strict::<Probe>(br#"{"name":"proj1","extra":1}"#).unwrap_err();
        let ApiError::BadRequest { message } = err else {
            panic!("expected BadRequest");
        };
        assert!(message.starts_with("Credential payload was not valid JSON: "));
        assert!(message.ends_with("got: {\"name\":\"proj1\",\"extra\":1}"));
    }

    #[test]
    fn test_decode_strict_rejects_non_json() {
        let err = decode_strict::<Probe>(b"not json at all").unwrap_err();
        assert!(matches!(err, ApiError::BadRequest { .. }));
    }

    #[test]
    fn test_decode_strict_rejects_trailing_garbage() {
        let err = decode_strict::<Probe>(br#"{"name":"proj1"} extra"#).unwrap_err();
        assert!(matches!(err, ApiError::BadRequest { .. }));
    }
}
