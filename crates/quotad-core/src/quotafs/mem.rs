//! In-memory implementation of the filesystem port for tests.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;

use super::{QuotaFs, QuotaFsError};
use crate::bytesize::QUOTA_UNBOUNDED;

#[derive(Debug, Clone)]
enum MemEntry {
    Folder {
        uid: u32,
        usage: i64,
        quota: Option<i64>,
    },
    Link {
        target: PathBuf,
    },
}

/// [`QuotaFs`] double backed by a path-keyed map.
///
/// Scope directories are implicit: listing a prefix with no entries yields
/// an empty directory rather than an error. A folder with nonzero usage
/// refuses deletion, standing in for an occupied directory.
#[derive(Debug, Default)]
pub struct MemFs {
    entries: Mutex<HashMap<String, MemEntry>>,
    users: HashMap<u32, String>,
}

impl MemFs {
    /// Creates an empty filesystem with no known users.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the uid-to-login table used by owner lookups.
    #[must_use]
    pub fn with_users<I, S>(mut self, users: I) -> Self
    where
        I: IntoIterator<Item = (u32, S)>,
        S: Into<String>,
    {
        self.users = users
            .into_iter()
            .map(|(uid, login)| (uid, login.into()))
            .collect();
        self
    }

    /// Places a folder with the given owner, usage, and assigned quota.
    pub fn insert_folder(&self, path: &str, uid: u32, _gid: u32, usage: i64, quota: i64) {
        self.lock().insert(path.to_owned(), MemEntry::Folder {
            uid,
            usage,
            quota: Some(quota),
        });
    }

    /// Overwrites the stored usage of an existing folder.
    pub fn set_usage(&self, path: &str, bytes: i64) {
        if let Some(MemEntry::Folder { usage, .. }) = self.lock().get_mut(path) {
            *usage = bytes;
        }
    }

    /// Reads back a link target, if the path holds a link.
    pub fn link_target(&self, path: &str) -> Option<PathBuf> {
        match self.lock().get(path) {
            Some(MemEntry::Link { target }) => Some(target.clone()),
            _ => None,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, MemEntry>> {
        self.entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

fn already_exists(path: &str) -> QuotaFsError {
    QuotaFsError::AlreadyExists {
        path: path.to_owned(),
    }
}

fn not_found(path: &str) -> QuotaFsError {
    QuotaFsError::NotFound {
        path: path.to_owned(),
    }
}

#[async_trait]
impl QuotaFs for MemFs {
    async fn usage(&self, path: &str) -> Result<i64, QuotaFsError> {
        match self.lock().get(path) {
            Some(MemEntry::Folder { usage, .. }) => Ok(*usage),
            _ => Err(not_found(path)),
        }
    }

    async fn quota(&self, path: &str) -> Result<i64, QuotaFsError> {
        match self.lock().get(path) {
            Some(MemEntry::Folder { quota, .. }) => Ok(match quota {
                None | Some(0) => QUOTA_UNBOUNDED,
                Some(q) => *q,
            }),
            _ => Err(not_found(path)),
        }
    }

    async fn set_quota(&self, path: &str, bytes: i64) -> Result<(), QuotaFsError> {
        match self.lock().get_mut(path) {
            Some(MemEntry::Folder { quota, .. }) => {
                *quota = Some(bytes);
                Ok(())
            }
            _ => Err(not_found(path)),
        }
    }

    async fn file_owner(&self, path: &str) -> Result<String, QuotaFsError> {
        match self.lock().get(path) {
            Some(MemEntry::Folder { uid, .. }) => {
                self.users
                    .get(uid)
                    .cloned()
                    .ok_or(QuotaFsError::UnknownOwner {
                        path: path.to_owned(),
                        uid: *uid,
                    })
            }
            _ => Err(not_found(path)),
        }
    }

    async fn create_folder(&self, path: &str, uid: u32, _gid: u32) -> Result<(), QuotaFsError> {
        let mut entries = self.lock();
        if entries.contains_key(path) {
            return Err(already_exists(path));
        }
        entries.insert(path.to_owned(), MemEntry::Folder {
            uid,
            usage: 0,
            quota: None,
        });
        Ok(())
    }

    async fn delete_folder(&self, path: &str) -> Result<(), QuotaFsError> {
        let mut entries = self.lock();
        match entries.get(path) {
            Some(MemEntry::Folder { usage, .. }) => {
                if *usage > 0 {
                    return Err(QuotaFsError::NotEmpty {
                        path: path.to_owned(),
                    });
                }
                entries.remove(path);
                Ok(())
            }
            _ => Err(not_found(path)),
        }
    }

    async fn create_link(&self, path: &str, target: &Path) -> Result<(), QuotaFsError> {
        let mut entries = self.lock();
        if entries.contains_key(path) {
            return Err(already_exists(path));
        }
        entries.insert(path.to_owned(), MemEntry::Link {
            target: target.to_path_buf(),
        });
        Ok(())
    }

    async fn delete_link(&self, path: &str) -> Result<(), QuotaFsError> {
        let mut entries = self.lock();
        match entries.get(path) {
            Some(MemEntry::Link { .. }) => {
                entries.remove(path);
                Ok(())
            }
            Some(MemEntry::Folder { .. }) => Err(QuotaFsError::Io {
                path: path.to_owned(),
                op: "unlink",
                source: io::Error::new(io::ErrorKind::InvalidInput, "not a link"),
            }),
            None => Err(not_found(path)),
        }
    }

    async fn read_dir(&self, path: &str) -> Result<Vec<String>, QuotaFsError> {
        let prefix = if path == "." {
            String::new()
        } else {
            format!("{path}/")
        };
        let entries = self.lock();
        let mut names: Vec<String> = entries
            .keys()
            .filter_map(|key| {
                let rest = key.strip_prefix(&prefix)?;
                if rest.is_empty() || rest.contains('/') {
                    None
                } else {
                    Some(rest.to_owned())
                }
            })
            .collect();
        names.sort();
        Ok(names)
    }

    async fn exists(&self, path: &str) -> Result<bool, QuotaFsError> {
        Ok(path == "." || self.lock().contains_key(path))
    }

    fn path_for(&self, path: &str) -> PathBuf {
        if path == "." {
            PathBuf::from("/")
        } else {
            Path::new("/").join(path)
        }
    }
}
