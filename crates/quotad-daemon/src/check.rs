//! Quota report handler for `POST /quota`.
//!
//! Renders a plain-text report of the target user's tiers: entitlement,
//! assigned quota, and the folders behind it. The target defaults to the
//! caller; naming another user is allowed, entitlements are not secret
//! on a cluster whose group memberships are world-readable anyway.

use std::fmt::Write as _;

use axum::body::Bytes;
use axum::extract::State;
use quotad_core::bytesize::format_byte_size;
use quotad_core::identity::Account;
use quotad_core::quotafs::{self, QuotaEntry};
use serde::Deserialize;

use crate::auth::read_request;
use crate::error::ApiError;
use crate::state::SharedState;

/// Cap on folders shown per tier. The smallest-quota folders are kept;
/// a notice marks the omission.
const MAX_DISPLAYED_FOLDERS_PER_TIER: usize = 5;

/// Payload of `POST /quota`.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CheckQuotaRequest {
    /// User to report on; the caller when absent or empty.
    pub user: Option<String>,
}

struct TierSection {
    tier: String,
    folders: Vec<QuotaEntry>,
    used: i64,
    entitled: i64,
}

/// Handles `POST /quota`.
///
/// # Errors
///
/// [`ApiError`] when admission fails, the target user does not exist, or
/// a tier cannot be walked.
pub async fn check_quota(
    State(state): State<SharedState>,
    body: Bytes,
) -> Result<String, ApiError> {
    let (submitter, request) = read_request::<CheckQuotaRequest>(&state, &body).await?;
    let target = resolve_target(&state, submitter, request.user.as_deref()).await?;
    let groups = state.directory.groups_of(&target).await.map_err(|e| {
        ApiError::internal(format!("Failed to calculate quota allocated to user: {e}"))
    })?;
    let allowed = state.policy.entitlements(&groups);

    let mut sections = Vec::with_capacity(state.tiers.len());
    let mut truncated = false;
    for (tier, fs) in &state.tiers {
        let (mut folders, used) =
            quotafs::quota_used(fs, &target.login).await.map_err(|e| {
                ApiError::internal(format!(
                    "Failed to retrieve quota used by user in {tier}: {e}"
                ))
            })?;
        let entitled = allowed.get(tier.as_str()).copied().unwrap_or(0);
        if used == 0 && entitled == 0 {
            // Nothing assigned and nothing to assign: not worth a line.
            continue;
        }
        folders.sort_by_key(|folder| folder.quota);
        if folders.len() > MAX_DISPLAYED_FOLDERS_PER_TIER {
            truncated = true;
            folders.truncate(MAX_DISPLAYED_FOLDERS_PER_TIER);
        }
        sections.push(TierSection {
            tier: tier.clone(),
            folders,
            used,
            entitled,
        });
    }
    sections.sort_by(|a, b| a.tier.cmp(&b.tier));
    Ok(render_report(&target.login, &sections, truncated))
}

async fn resolve_target(
    state: &SharedState,
    submitter: Account,
    user: Option<&str>,
) -> Result<Account, ApiError> {
    match user {
        None | Some("") => Ok(submitter),
        Some(login) if login == submitter.login => Ok(submitter),
        Some(login) => state
            .directory
            .account_by_name(login)
            .await
            .map_err(|e| ApiError::bad_request(format!("Cannot find requested user: {e}"))),
    }
}

fn render_report(login: &str, sections: &[TierSection], truncated: bool) -> String {
    if sections.is_empty() {
        return format!("User {login} has no access to managed storage.\n");
    }
    let mut out = format!("User {login} has access to the following tiers of storage:\n\n");
    for section in sections {
        let _ = writeln!(
            out,
            "{} - {} assigned / {} allocated",
            section.tier,
            format_byte_size(section.used),
            format_byte_size(section.entitled),
        );
        for folder in &section.folders {
            let _ = writeln!(
                out,
                "\t{} - {} used / {} assigned",
                folder.name,
                format_byte_size(folder.usage),
                format_byte_size(folder.quota),
            );
        }
    }
    if truncated {
        out.push_str("\nNote that the larger folders have been omitted for brevity.\n");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str, usage: i64, quota: i64) -> QuotaEntry {
        QuotaEntry {
            name: name.to_owned(),
            usage,
            quota,
        }
    }

    #[test]
    fn test_report_without_sections() {
        let report = render_report("alice", &[], false);
        assert_eq!(report, "User alice has no access to managed storage.\n");
    }

    #[test]
    fn test_report_layout() {
        let sections = vec![
            TierSection {
                tier: "bulk".to_owned(),
                folders: vec![entry("proj1", 1_000_000_000, 5_000_000_000)],
                used: 5_000_000_000,
                entitled: 10_000_000_000,
            },
            TierSection {
                tier: "fast".to_owned(),
                folders: vec![],
                used: 0,
                entitled: 2_000_000_000_000,
            },
        ];
        let report = render_report("alice", &sections, false);
        assert_eq!(
            report,
            "User alice has access to the following tiers of storage:\n\
             \n\
             bulk - 5.0 G assigned / 10.0 G allocated\n\
             \tproj1 - 1.0 G used / 5.0 G assigned\n\
             fast - 0 B assigned / 2.0 T allocated\n"
        );
    }

    #[test]
    fn test_report_marks_omitted_folders() {
        let sections = vec![TierSection {
            tier: "bulk".to_owned(),
            folders: vec![entry("small", 0, 1_000)],
            used: 900_000_000_000,
            entitled: 1_000_000_000_000,
        }];
        let report = render_report("bob", &sections, true);
        assert!(report.ends_with(
            "\nNote that the larger folders have been omitted for brevity.\n"
        ));
    }

    #[test]
    fn test_report_shows_unbounded_quota() {
        let sections = vec![TierSection {
            tier: "bulk".to_owned(),
            folders: vec![entry("wild", 10, quotad_core::bytesize::QUOTA_UNBOUNDED)],
            used: quotad_core::bytesize::QUOTA_UNBOUNDED,
            entitled: 1_000_000_000,
        }];
        let report = render_report("carol", &sections, false);
        assert!(report.contains("bulk - UNBOUNDED assigned / 1.0 G allocated\n"));
        assert!(report.contains("\twild - 10 B used / UNBOUNDED assigned\n"));
    }
}
