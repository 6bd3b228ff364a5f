//! Quota-aware filesystem port.
//!
//! Everything the authority does to storage goes through [`QuotaFs`]:
//! reading and writing quota ceilings, measuring recursive usage, creating
//! and deleting project folders, and maintaining the symlink namespace that
//! keeps project names globally unique. [`CephFs`] implements the port
//! against a CephFS mount; [`ScopedFs`] rebases it under a tier or
//! namespace directory; [`MemFs`] is the in-process double the daemon's
//! tests run against.
//!
//! Paths handed to the port are relative, `/`-separated, and must not
//! escape the scope. `"."` names the scope root itself.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::bytesize::ParseQuotaError;

mod ceph;
mod mem;
mod scoped;

pub use ceph::CephFs;
pub use mem::MemFs;
pub use scoped::ScopedFs;

/// Errors from filesystem operations.
#[derive(Debug, Error)]
pub enum QuotaFsError {
    /// The path names nothing.
    #[error("folder {path:?} does not exist")]
    NotFound {
        /// Offending path, scope relative.
        path: String,
    },
    /// A folder slated for removal still has entries.
    #[error("folder {path:?} is not empty")]
    NotEmpty {
        /// Offending path, scope relative.
        path: String,
    },
    /// The path is already occupied.
    #[error("folder {path:?} already exists")]
    AlreadyExists {
        /// Offending path, scope relative.
        path: String,
    },
    /// The path is absolute, empty, or steps outside its scope.
    #[error("invalid path {path:?}")]
    InvalidPath {
        /// Offending path.
        path: String,
    },
    /// The stored quota attribute did not parse.
    #[error("bad quota attribute on {path:?}: {source}")]
    BadQuotaValue {
        /// Folder carrying the attribute.
        path: String,
        /// Parse failure.
        #[source]
        source: ParseQuotaError,
    },
    /// The stored usage attribute did not parse.
    #[error("bad usage attribute on {path:?}: {raw:?}")]
    BadUsageValue {
        /// Folder carrying the attribute.
        path: String,
        /// The unparsable value.
        raw: String,
    },
    /// The folder's owning uid has no account.
    #[error("no account for owner uid {uid} of {path:?}")]
    UnknownOwner {
        /// Folder inspected.
        path: String,
        /// The orphaned uid.
        uid: u32,
    },
    /// An underlying syscall failed.
    #[error("{op} {path:?}: {source}")]
    Io {
        /// Path the operation targeted.
        path: String,
        /// What was being attempted.
        op: &'static str,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
}

/// One project folder as seen during quota accounting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuotaEntry {
    /// Folder name within its tier.
    pub name: String,
    /// Bytes currently stored.
    pub usage: i64,
    /// Bytes assigned as the folder's ceiling.
    pub quota: i64,
}

/// Filesystem operations the authority relies on.
#[async_trait]
pub trait QuotaFs: Send + Sync {
    /// Recursive byte usage of the folder at `path`.
    ///
    /// # Errors
    ///
    /// [`QuotaFsError`] when the folder is missing or the usage attribute
    /// cannot be read or parsed.
    async fn usage(&self, path: &str) -> Result<i64, QuotaFsError>;

    /// Quota ceiling of the folder at `path`.
    ///
    /// A folder with no ceiling set reports
    /// [`QUOTA_UNBOUNDED`](crate::bytesize::QUOTA_UNBOUNDED).
    ///
    /// # Errors
    ///
    /// [`QuotaFsError::NotFound`] when the folder is missing, or another
    /// variant when the attribute cannot be read or parsed.
    async fn quota(&self, path: &str) -> Result<i64, QuotaFsError>;

    /// Sets the quota ceiling of the folder at `path` to `bytes`.
    ///
    /// # Errors
    ///
    /// [`QuotaFsError`] when the attribute cannot be written.
    async fn set_quota(&self, path: &str, bytes: i64) -> Result<(), QuotaFsError>;

    /// Login name of the account owning the file at `path`.
    ///
    /// # Errors
    ///
    /// [`QuotaFsError`] when the file is missing or its uid has no account.
    async fn file_owner(&self, path: &str) -> Result<String, QuotaFsError>;

    /// Creates a project folder owned by `uid`:`gid`.
    ///
    /// # Errors
    ///
    /// [`QuotaFsError`] when creation, permission setup, or the ownership
    /// change fails; a partially created folder is rolled back.
    async fn create_folder(&self, path: &str, uid: u32, gid: u32) -> Result<(), QuotaFsError>;

    /// Removes the folder at `path`.
    ///
    /// # Errors
    ///
    /// [`QuotaFsError::NotEmpty`] when the folder still has entries,
    /// another variant for other failures.
    async fn delete_folder(&self, path: &str) -> Result<(), QuotaFsError>;

    /// Creates a symlink at `path` pointing at the absolute `target`.
    ///
    /// # Errors
    ///
    /// [`QuotaFsError`] when the link cannot be created.
    async fn create_link(&self, path: &str, target: &Path) -> Result<(), QuotaFsError>;

    /// Removes the symlink at `path`.
    ///
    /// # Errors
    ///
    /// [`QuotaFsError`] when the link cannot be removed.
    async fn delete_link(&self, path: &str) -> Result<(), QuotaFsError>;

    /// Entry names directly under `path`, sorted.
    ///
    /// # Errors
    ///
    /// [`QuotaFsError`] when the directory cannot be read.
    async fn read_dir(&self, path: &str) -> Result<Vec<String>, QuotaFsError>;

    /// Whether anything exists at `path`.
    ///
    /// # Errors
    ///
    /// [`QuotaFsError`] when existence cannot be determined.
    async fn exists(&self, path: &str) -> Result<bool, QuotaFsError>;

    /// Absolute path `path` resolves to, for display to users.
    fn path_for(&self, path: &str) -> PathBuf;
}

/// Walks the scope root and accounts every folder owned by `login`.
///
/// Returns the owned folders and the sum of their assigned quotas, which
/// is the figure charged against the user's entitlement. Usage does not
/// count; only what has been promised does.
///
/// # Errors
///
/// [`QuotaFsError`] when the scope cannot be listed or a folder's owner,
/// quota, or usage cannot be read.
pub async fn quota_used<F>(fs: &F, login: &str) -> Result<(Vec<QuotaEntry>, i64), QuotaFsError>
where
    F: QuotaFs + ?Sized,
{
    let mut owned = Vec::new();
    let mut total: i64 = 0;
    for name in fs.read_dir(".").await? {
        if fs.file_owner(&name).await? != login {
            continue;
        }
        let quota = fs.quota(&name).await?;
        let usage = fs.usage(&name).await?;
        total = total.saturating_add(quota);
        owned.push(QuotaEntry { name, usage, quota });
    }
    Ok((owned, total))
}
