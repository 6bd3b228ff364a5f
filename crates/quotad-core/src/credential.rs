//! Signed-credential sealing and unsealing.
//!
//! Requests reach the daemon wrapped in a credential produced by the
//! cluster's MUNGE installation: an opaque signed blob binding the payload to
//! the user, group, and host that sealed it. Unsealing runs the external
//! verifier and parses its textual output: `KEY: value` metadata lines, a
//! blank-line separator, then the original payload bytes.
//!
//! The parser is strict. The key set is closed (the verifier is told exactly
//! which keys to emit), every value must parse for its key, and the payload
//! separator must be present. Metadata fields are individually optional at
//! this layer; the serving pipeline decides which ones its trust decision
//! requires.

use std::ffi::OsStr;
use std::net::IpAddr;
use std::os::unix::ffi::OsStrExt;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Metadata keys the verifier is asked to emit, in its `-k` list syntax.
const UNSEAL_KEYS: &str = "ENCODE_HOST,ENCODE_TIME,DECODE_TIME,UID,GID,UID_RESTRICTION";

/// Identity and payload recovered from a sealed credential.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Identity {
    /// Numeric user id of the sealing process.
    pub user_id: Option<u32>,
    /// Numeric group id of the sealing process.
    pub group_id: Option<u32>,
    /// Uid the sealer restricted unsealing to, if any.
    pub uid_restriction: Option<u32>,
    /// Address of the host where the credential was sealed.
    pub origin_host: Option<IpAddr>,
    /// When the credential was sealed.
    pub sealed_at: Option<DateTime<Utc>>,
    /// When the verifier unsealed it.
    pub unsealed_at: Option<DateTime<Utc>>,
    /// The wrapped request payload.
    pub payload: Vec<u8>,
}

/// Errors sealing or unsealing a credential.
#[derive(Debug, Error)]
pub enum CredentialError {
    /// The signer or verifier binary could not be run at all.
    #[error("failed to run {tool}: {source}")]
    Spawn {
        /// Binary that failed to start.
        tool: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
    /// The signer rejected the payload.
    #[error("credential signer failed with {status}: {stderr}")]
    SealFailed {
        /// Signer exit status.
        status: ExitStatus,
        /// Signer diagnostics.
        stderr: String,
    },
    /// The verifier rejected the credential (bad signature, expired,
    /// replayed, or restricted to another uid).
    #[error("credential verification failed with {status}: {stderr}")]
    Rejected {
        /// Verifier exit status.
        status: ExitStatus,
        /// Verifier diagnostics.
        stderr: String,
    },
    /// Verifier metadata was not valid UTF-8.
    #[error("verifier metadata was not valid UTF-8")]
    NonUtf8Metadata,
    /// A metadata line had no `KEY: value` shape.
    #[error("malformed metadata line {line:?} from verifier")]
    MalformedLine {
        /// The offending line.
        line: String,
    },
    /// Metadata contained a key outside the requested set.
    #[error("unexpected metadata key {key:?} from verifier: value {value:?}")]
    UnexpectedKey {
        /// The unrecognized key.
        key: String,
        /// Its value, for diagnostics.
        value: String,
    },
    /// A metadata value failed to parse for its key.
    #[error("invalid {key} value: {value}")]
    InvalidValue {
        /// Which key carried the value.
        key: &'static str,
        /// The unparsable value.
        value: String,
    },
    /// The blank-line separator before the payload was missing.
    #[error("verifier output carried no payload separator")]
    MissingPayload,
}

/// Signer/verifier port for the credential scheme.
///
/// The daemon talks to the MUNGE tools through [`MungeCodec`]; tests
/// substitute an in-process fake so no external processes are needed.
#[async_trait]
pub trait Codec: Send + Sync {
    /// Seals `payload` into a signed credential bound to the calling
    /// process's identity.
    ///
    /// # Errors
    ///
    /// [`CredentialError`] if the signer cannot be run or rejects the
    /// payload.
    async fn seal(&self, payload: &[u8]) -> Result<Vec<u8>, CredentialError>;

    /// Unseals `sealed`, verifying its signature and recovering the identity
    /// metadata and wrapped payload.
    ///
    /// # Errors
    ///
    /// [`CredentialError`] if the verifier cannot be run, rejects the
    /// credential, or emits output violating the metadata format.
    async fn unseal(&self, sealed: &[u8]) -> Result<Identity, CredentialError>;
}

/// [`Codec`] backed by the system MUNGE tools.
#[derive(Debug, Clone)]
pub struct MungeCodec {
    munge: PathBuf,
    unmunge: PathBuf,
}

impl MungeCodec {
    /// Creates a codec using `munge`/`unmunge` from `PATH`.
    #[must_use]
    pub fn new() -> Self {
        Self::with_tools("munge", "unmunge")
    }

    /// Creates a codec with explicit signer and verifier binaries.
    pub fn with_tools(munge: impl Into<PathBuf>, unmunge: impl Into<PathBuf>) -> Self {
        Self {
            munge: munge.into(),
            unmunge: unmunge.into(),
        }
    }
}

impl Default for MungeCodec {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Codec for MungeCodec {
    async fn seal(&self, payload: &[u8]) -> Result<Vec<u8>, CredentialError> {
        let output = Command::new(&self.munge)
            .arg("-s")
            .arg(OsStr::from_bytes(payload))
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|source| CredentialError::Spawn {
                tool: self.munge.display().to_string(),
                source,
            })?;
        if !output.status.success() {
            return Err(CredentialError::SealFailed {
                status: output.status,
                stderr: trimmed_lossy(&output.stderr),
            });
        }
        Ok(output.stdout)
    }

    async fn unseal(&self, sealed: &[u8]) -> Result<Identity, CredentialError> {
        let spawn_err = |source| CredentialError::Spawn {
            tool: self.unmunge.display().to_string(),
            source,
        };
        let mut child = Command::new(&self.unmunge)
            .arg("-N")
            .arg("-k")
            .arg(UNSEAL_KEYS)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(spawn_err)?;
        // Feed the credential and close the pipe so the verifier sees EOF.
        // A write failure is only reported if the verifier then claims
        // success; normally its exit status is the more precise diagnosis.
        let mut stdin_failure = None;
        if let Some(mut stdin) = child.stdin.take() {
            if let Err(e) = stdin.write_all(sealed).await {
                stdin_failure = Some(e);
            }
        }
        let output = child.wait_with_output().await.map_err(spawn_err)?;
        if !output.status.success() {
            tracing::debug!(status = %output.status, "credential verifier rejected input");
            return Err(CredentialError::Rejected {
                status: output.status,
                stderr: trimmed_lossy(&output.stderr),
            });
        }
        if let Some(source) = stdin_failure {
            return Err(spawn_err(source));
        }
        parse_verifier_output(&output.stdout)
    }
}

fn trimmed_lossy(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).trim_end().to_owned()
}

/// Parses the verifier's output: metadata lines, a blank line, then the
/// original payload.
fn parse_verifier_output(output: &[u8]) -> Result<Identity, CredentialError> {
    let Some(sep) = output.windows(2).position(|w| w == b"\n\n") else {
        return Err(CredentialError::MissingPayload);
    };
    let metadata =
        std::str::from_utf8(&output[..sep]).map_err(|_| CredentialError::NonUtf8Metadata)?;
    let mut identity = Identity {
        payload: output[sep + 2..].to_vec(),
        ..Identity::default()
    };
    for line in metadata.lines() {
        let Some((key, value)) = line.split_once(':') else {
            return Err(CredentialError::MalformedLine {
                line: line.to_owned(),
            });
        };
        let value = value.trim();
        match key {
            "ENCODE_HOST" => {
                let host: IpAddr = value.parse().map_err(|_| invalid("ENCODE_HOST", value))?;
                identity.origin_host = Some(host);
            }
            "ENCODE_TIME" => identity.sealed_at = Some(parse_unix_time("ENCODE_TIME", value)?),
            "DECODE_TIME" => identity.unsealed_at = Some(parse_unix_time("DECODE_TIME", value)?),
            "UID" => identity.user_id = Some(parse_id("UID", value)?),
            "GID" => identity.group_id = Some(parse_id("GID", value)?),
            "UID_RESTRICTION" => {
                identity.uid_restriction = Some(parse_id("UID_RESTRICTION", value)?);
            }
            // The key list was pinned on the command line; anything else
            // means the verifier is not the tool we think it is.
            _ => {
                return Err(CredentialError::UnexpectedKey {
                    key: key.to_owned(),
                    value: value.to_owned(),
                });
            }
        }
    }
    Ok(identity)
}

fn invalid(key: &'static str, value: &str) -> CredentialError {
    CredentialError::InvalidValue {
        key,
        value: value.to_owned(),
    }
}

fn parse_id(key: &'static str, value: &str) -> Result<u32, CredentialError> {
    value.parse().map_err(|_| invalid(key, value))
}

fn parse_unix_time(key: &'static str, value: &str) -> Result<DateTime<Utc>, CredentialError> {
    let secs: i64 = value.parse().map_err(|_| invalid(key, value))?;
    DateTime::from_timestamp(secs, 0).ok_or_else(|| invalid(key, value))
}
