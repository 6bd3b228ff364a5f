//! Scope confinement for the filesystem port.
//!
//! The daemon mounts one [`CephFs`](super::CephFs) over the whole cluster
//! and carves it into views: one per storage tier plus one for the project
//! namespace. [`ScopedFs`] is that view. Every path is validated before it
//! is rebased, so request-supplied names cannot step outside their scope.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;

use super::{QuotaFs, QuotaFsError};

/// View of an inner filesystem confined under a prefix directory.
#[derive(Clone)]
pub struct ScopedFs {
    inner: Arc<dyn QuotaFs>,
    prefix: String,
}

impl ScopedFs {
    /// Creates a view of `inner` rooted at `prefix`.
    ///
    /// The prefix `"."` leaves the inner root unchanged.
    ///
    /// # Errors
    ///
    /// [`QuotaFsError::InvalidPath`] when the prefix is absolute, empty,
    /// or contains `.` or `..` components.
    pub fn new(inner: Arc<dyn QuotaFs>, prefix: impl Into<String>) -> Result<Self, QuotaFsError> {
        let prefix = prefix.into();
        if !is_valid_path(&prefix) {
            return Err(QuotaFsError::InvalidPath { path: prefix });
        }
        Ok(Self { inner, prefix })
    }

    fn joined(&self, path: &str) -> Result<String, QuotaFsError> {
        if is_valid_path(path) {
            Ok(self.raw_joined(path))
        } else {
            Err(QuotaFsError::InvalidPath {
                path: path.to_owned(),
            })
        }
    }

    fn raw_joined(&self, path: &str) -> String {
        if path == "." {
            self.prefix.clone()
        } else if self.prefix == "." {
            path.to_owned()
        } else {
            format!("{}/{path}", self.prefix)
        }
    }
}

impl fmt::Debug for ScopedFs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopedFs")
            .field("prefix", &self.prefix)
            .finish_non_exhaustive()
    }
}

/// Accepts `"."` or slash-separated relative paths whose components are
/// all plain names.
fn is_valid_path(path: &str) -> bool {
    if path == "." {
        return true;
    }
    !path.is_empty()
        && path
            .split('/')
            .all(|part| !part.is_empty() && part != "." && part != "..")
}

#[async_trait]
impl QuotaFs for ScopedFs {
    async fn usage(&self, path: &str) -> Result<i64, QuotaFsError> {
        self.inner.usage(&self.joined(path)?).await
    }

    async fn quota(&self, path: &str) -> Result<i64, QuotaFsError> {
        self.inner.quota(&self.joined(path)?).await
    }

    async fn set_quota(&self, path: &str, bytes: i64) -> Result<(), QuotaFsError> {
        self.inner.set_quota(&self.joined(path)?, bytes).await
    }

    async fn file_owner(&self, path: &str) -> Result<String, QuotaFsError> {
        self.inner.file_owner(&self.joined(path)?).await
    }

    async fn create_folder(&self, path: &str, uid: u32, gid: u32) -> Result<(), QuotaFsError> {
        self.inner.create_folder(&self.joined(path)?, uid, gid).await
    }

    async fn delete_folder(&self, path: &str) -> Result<(), QuotaFsError> {
        self.inner.delete_folder(&self.joined(path)?).await
    }

    async fn create_link(&self, path: &str, target: &Path) -> Result<(), QuotaFsError> {
        self.inner.create_link(&self.joined(path)?, target).await
    }

    async fn delete_link(&self, path: &str) -> Result<(), QuotaFsError> {
        self.inner.delete_link(&self.joined(path)?).await
    }

    async fn read_dir(&self, path: &str) -> Result<Vec<String>, QuotaFsError> {
        self.inner.read_dir(&self.joined(path)?).await
    }

    async fn exists(&self, path: &str) -> Result<bool, QuotaFsError> {
        self.inner.exists(&self.joined(path)?).await
    }

    fn path_for(&self, path: &str) -> PathBuf {
        self.inner.path_for(&self.raw_joined(path))
    }
}

#[cfg(test)]
mod tests {
    use super::super::MemFs;
    use super::*;

    fn scoped(prefix: &str) -> (Arc<MemFs>, ScopedFs) {
        let mem = Arc::new(MemFs::new().with_users([(100_u32, "alice")]));
        let fs = ScopedFs::new(mem.clone(), prefix).unwrap();
        (mem, fs)
    }

    #[test]
    fn test_prefix_is_validated() {
        let mem: Arc<dyn QuotaFs> = Arc::new(MemFs::new());
        assert!(ScopedFs::new(mem.clone(), "tier/bulk").is_ok());
        assert!(ScopedFs::new(mem.clone(), ".").is_ok());
        for bad in ["", "/tier", "tier/", "a//b", "a/../b", ".."] {
            assert!(
                matches!(
                    ScopedFs::new(mem.clone(), bad),
                    Err(QuotaFsError::InvalidPath { .. })
                ),
                "prefix {bad:?} should be rejected"
            );
        }
    }

    #[tokio::test]
    async fn test_escape_attempts_are_rejected() {
        let (_, fs) = scoped("tier/bulk");
        for bad in ["../fast/p", "/etc", "", "a/..", "./p"] {
            assert!(
                matches!(
                    fs.quota(bad).await.unwrap_err(),
                    QuotaFsError::InvalidPath { .. }
                ),
                "path {bad:?} should be rejected"
            );
        }
    }

    #[tokio::test]
    async fn test_operations_are_rebased_under_prefix() {
        let (mem, fs) = scoped("tier/bulk");
        mem.insert_folder("tier/bulk/p", 100, 100, 42, 5_000);
        mem.insert_folder("tier/fast/q", 100, 100, 0, 1);
        assert_eq!(fs.quota("p").await.unwrap(), 5_000);
        assert_eq!(fs.usage("p").await.unwrap(), 42);
        assert_eq!(fs.file_owner("p").await.unwrap(), "alice");
        assert_eq!(fs.read_dir(".").await.unwrap(), ["p"]);
        assert!(!fs.exists("q").await.unwrap());
    }

    #[tokio::test]
    async fn test_dot_prefix_is_transparent() {
        let (mem, fs) = scoped(".");
        mem.insert_folder("p", 100, 100, 0, 1_000);
        assert_eq!(fs.quota("p").await.unwrap(), 1_000);
        assert_eq!(fs.read_dir(".").await.unwrap(), ["p"]);
    }

    #[test]
    fn test_path_for_display() {
        let (_, fs) = scoped("tier/bulk");
        assert_eq!(fs.path_for("p"), Path::new("/tier/bulk/p"));
        assert_eq!(fs.path_for("."), Path::new("/tier/bulk"));
    }
}
