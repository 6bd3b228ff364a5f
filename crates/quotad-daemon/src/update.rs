//! Folder create/resize/delete handler for `POST /folders`.
//!
//! One endpoint covers the whole lifecycle: `size_in_gb` is the desired
//! quota, and zero means the folder should not exist. The handler decides
//! admissibility from the caller's entitlement and the live filesystem
//! state, then applies the transition. Everything from the first state
//! read to the last write happens under the daemon-wide update lock, so
//! two racing requests cannot both spend the same remaining quota.

use axum::body::Bytes;
use axum::extract::State;
use quotad_core::bytesize::format_byte_size;
use quotad_core::identity::Account;
use quotad_core::project::ProjectName;
use quotad_core::quotafs::{self, QuotaFs, QuotaFsError, ScopedFs};
use serde::Deserialize;

use crate::auth::read_request;
use crate::error::ApiError;
use crate::state::SharedState;

const BYTES_PER_GB: i64 = 1_000_000_000;

const RETRY_GUIDANCE: &str =
    "Try again later and contact administrators if the folder is in an unexpected state.";

/// Payload of `POST /folders`.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UpdateRequest {
    /// Project folder name.
    pub name: String,
    /// Storage tier the folder lives in.
    pub tier: String,
    /// Desired quota in decimal gigabytes; zero deletes the folder.
    pub size_in_gb: i64,
}

/// Handles `POST /folders`.
///
/// # Errors
///
/// [`ApiError`] when admission fails, the request is invalid, the
/// transition is inadmissible, or the filesystem refuses it.
pub async fn update_folder(
    State(state): State<SharedState>,
    body: Bytes,
) -> Result<String, ApiError> {
    let (submitter, request) = read_request::<UpdateRequest>(&state, &body).await?;
    let Some(tier_fs) = state.tiers.get(&request.tier) else {
        return Err(ApiError::bad_request(format!(
            "Invalid tier requested: {:?} does not exist!\nCheck your allocated quota first.",
            request.tier
        )));
    };
    let name: ProjectName = request
        .name
        .parse()
        .map_err(|e| ApiError::bad_request(format!("Invalid name requested: {e}")))?;
    let Some(requested) = request
        .size_in_gb
        .checked_mul(BYTES_PER_GB)
        .filter(|bytes| *bytes >= 0)
    else {
        return Err(ApiError::bad_request("Provided folder size is invalid."));
    };
    tracing::info!(
        login = %submitter.login,
        tier = %request.tier,
        name = %name,
        requested,
        "folder update requested"
    );
    match attempt_assign(&state, tier_fs, &request.tier, &submitter, &name, requested).await {
        Ok(message) => Ok(format!("{message}\n")),
        Err(ApiError::Internal { message }) => Err(ApiError::internal(format!(
            "{message}\n\n{RETRY_GUIDANCE}"
        ))),
        Err(other) => Err(other),
    }
}

/// Decides and applies the transition for one folder.
///
/// Returns the confirmation body on success. Admissibility and
/// application both happen under the update lock; the figures the
/// decision rests on must still be true when the write lands.
async fn attempt_assign(
    state: &SharedState,
    tier_fs: &ScopedFs,
    tier: &str,
    submitter: &Account,
    name: &ProjectName,
    requested: i64,
) -> Result<String, ApiError> {
    let _guard = state.update_lock.lock().await;

    let groups = state.directory.groups_of(submitter).await.map_err(|e| {
        ApiError::internal(format!("Failed to calculate quota allocated to user: {e}"))
    })?;
    let entitled = state.policy.entitlement_for(&groups, tier);
    let (_, used) = quotafs::quota_used(tier_fs, &submitter.login)
        .await
        .map_err(|e| {
            ApiError::internal(format!("Failed to calculate quota used by user: {e}"))
        })?;
    let remaining = entitled.saturating_sub(used);

    let current = match tier_fs.quota(name.as_str()).await {
        Ok(quota) => {
            // The folder exists; only its owner may touch it.
            let owner = tier_fs.file_owner(name.as_str()).await.map_err(|e| {
                ApiError::internal(format!("Failed to fetch owner for existing folder: {e}"))
            })?;
            if owner != submitter.login {
                return Err(ApiError::bad_request(
                    "The folder to update does not belong to you!",
                ));
            }
            quota
        }
        Err(QuotaFsError::NotFound { .. }) => {
            // Not in this tier; the name may still be taken elsewhere.
            match state.namespace.exists(name.as_str()).await {
                Ok(true) => {
                    return Err(ApiError::bad_request(format!(
                        "Folder {name} already exists in another tier."
                    )));
                }
                Ok(false) => 0,
                Err(e) => {
                    return Err(ApiError::internal(format!(
                        "Failed to check project folder existence: {e}"
                    )));
                }
            }
        }
        Err(e) => {
            return Err(ApiError::internal(format!(
                "Failed to calculate quota for existing folder: {e}"
            )));
        }
    };

    if current == 0 && requested == 0 {
        return Ok("Folder already does not exist.".to_owned());
    }
    if current == requested {
        return Ok("Quota is unchanged.".to_owned());
    }
    // Deletion releases quota and needs no admission; whether the folder
    // is actually empty is the filesystem's call below.
    if requested > 0 {
        if current < requested {
            let needed = requested - current;
            if remaining < needed {
                return Err(ApiError::bad_request(format!(
                    "You do not have sufficient quota left to assign to this tier.\n\
                     You used {}/{} and have {} left.\n\
                     This operation needs {}.",
                    format_byte_size(used),
                    format_byte_size(entitled),
                    format_byte_size(remaining),
                    format_byte_size(needed),
                )));
            }
        } else {
            let usage = tier_fs.usage(name.as_str()).await.map_err(|e| {
                ApiError::internal(format!(
                    "Failed to calculate usage for existing folder: {e}"
                ))
            })?;
            if usage > requested {
                return Err(ApiError::bad_request(format!(
                    "You are currently using more storage than the quota you requested.\n\
                     You are currently using {}.\n\
                     Please delete some files before requesting to shrink the folder quota.",
                    format_byte_size(usage),
                )));
            }
        }
    }

    if requested == 0 {
        match tier_fs.delete_folder(name.as_str()).await {
            Ok(()) => {}
            Err(QuotaFsError::NotEmpty { .. }) => {
                return Err(ApiError::bad_request("Your directory is not empty."));
            }
            Err(e) => {
                return Err(ApiError::internal(format!("Failed to delete folder: {e}")));
            }
        }
        state
            .namespace
            .delete_link(name.as_str())
            .await
            .map_err(|e| ApiError::internal(format!("Failed to delete link: {e}")))?;
        tracing::info!(login = %submitter.login, tier, name = %name, "folder deleted");
        return Ok("Your project folder has been deleted.".to_owned());
    }

    if current == 0 {
        tier_fs
            .create_folder(name.as_str(), submitter.uid, submitter.gid)
            .await
            .map_err(|e| ApiError::internal(format!("Failed to create folder: {e}")))?;
    }
    tier_fs
        .set_quota(name.as_str(), requested)
        .await
        .map_err(|e| ApiError::internal(format!("Failed to set quota on folder: {e}")))?;
    if current != 0 {
        tracing::info!(login = %submitter.login, tier, name = %name, requested, "quota resized");
        return Ok("Your folder's quota has been updated.".to_owned());
    }
    let target = tier_fs.path_for(name.as_str());
    state
        .namespace
        .create_link(name.as_str(), &target)
        .await
        .map_err(|e| ApiError::internal(format!("Failed to create symlink for folder: {e}")))?;
    tracing::info!(login = %submitter.login, tier, name = %name, requested, "folder created");
    Ok(format!(
        "Your folder has been created.\nYou can access it at {}.\n",
        state.namespace.path_for(name.as_str()).display(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_schema_defaults_missing_fields() {
        let request: UpdateRequest = serde_json::from_str(r#"{"name":"proj1"}"#).unwrap();
        assert_eq!(request.name, "proj1");
        assert_eq!(request.tier, "");
        assert_eq!(request.size_in_gb, 0);
    }

    #[test]
    fn test_request_schema_rejects_unknown_fields() {
        let err = serde_json::from_str::<UpdateRequest>(
            r#"{"name":"proj1","tier":"bulk","size_in_gb":1,"owner":"bob"}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("owner"));
    }

    #[test]
    fn test_size_conversion_guards() {
        // Mirrors the handler's admission arithmetic.
        let convert = |gb: i64| gb.checked_mul(BYTES_PER_GB).filter(|bytes| *bytes >= 0);
        assert_eq!(convert(5), Some(5_000_000_000));
        assert_eq!(convert(0), Some(0));
        assert_eq!(convert(-2), None);
        assert_eq!(convert(i64::MAX / 2), None);
    }
}
