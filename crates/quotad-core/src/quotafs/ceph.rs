//! CephFS-backed implementation of the filesystem port.
//!
//! Quota ceilings live in the `ceph.quota.max_bytes` extended attribute and
//! recursive usage in `ceph.dir.rbytes`, both maintained by the MDS. All
//! blocking work, xattr calls included, runs on the blocking thread pool;
//! CephFS operations are network round trips.

use std::ffi::{CStr, CString};
use std::io;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::{MetadataExt, PermissionsExt};
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use nix::unistd::{Gid, Uid};

use super::{QuotaFs, QuotaFsError};
use crate::bytesize::{QUOTA_UNBOUNDED, parse_quota_attribute, serialize_quota_attribute};

const QUOTA_ATTR: &CStr = c"ceph.quota.max_bytes";
const USAGE_ATTR: &CStr = c"ceph.dir.rbytes";

/// Pause between the steps of folder creation. The MDS applies metadata
/// changes asynchronously and the next step must observe the previous one.
const SETTLE_DELAY: Duration = Duration::from_millis(50);

/// Setgid group-writable mode for project folders.
const FOLDER_MODE: u32 = 0o2770;

/// [`QuotaFs`] over a CephFS mount rooted at a fixed directory.
///
/// Paths are taken scope relative and joined under the root without
/// further validation; [`ScopedFs`](super::ScopedFs) is the layer that
/// vets them.
#[derive(Debug, Clone)]
pub struct CephFs {
    root: PathBuf,
}

impl CephFs {
    /// Creates a filesystem rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn full_path(&self, path: &str) -> PathBuf {
        if path == "." {
            self.root.clone()
        } else {
            self.root.join(path)
        }
    }

    fn io_error(path: &str, op: &'static str, source: io::Error) -> QuotaFsError {
        match source.kind() {
            io::ErrorKind::NotFound => QuotaFsError::NotFound {
                path: path.to_owned(),
            },
            io::ErrorKind::AlreadyExists => QuotaFsError::AlreadyExists {
                path: path.to_owned(),
            },
            _ => QuotaFsError::Io {
                path: path.to_owned(),
                op,
                source,
            },
        }
    }

    async fn finish_folder_setup(
        &self,
        full: &Path,
        uid: u32,
        gid: u32,
    ) -> Result<(), (&'static str, io::Error)> {
        // mkdir is subject to the umask, so the mode is applied again.
        tokio::fs::set_permissions(full, std::fs::Permissions::from_mode(FOLDER_MODE))
            .await
            .map_err(|e| ("set permissions on", e))?;
        tokio::time::sleep(SETTLE_DELAY).await;
        let target = full.to_path_buf();
        let chowned = tokio::task::spawn_blocking(move || {
            nix::unistd::chown(&target, Some(Uid::from_raw(uid)), Some(Gid::from_raw(gid)))
        })
        .await
        .map_err(|e| ("change owner of", io::Error::other(e)))?;
        chowned.map_err(|errno| ("change owner of", io::Error::from_raw_os_error(errno as i32)))
    }
}

#[async_trait]
impl QuotaFs for CephFs {
    async fn usage(&self, path: &str) -> Result<i64, QuotaFsError> {
        let raw = read_xattr(self.full_path(path), USAGE_ATTR)
            .await
            .map_err(|e| Self::io_error(path, "read usage attribute of", e))?;
        let text = String::from_utf8_lossy(&raw);
        let text = text.trim();
        text.parse().map_err(|_| QuotaFsError::BadUsageValue {
            path: path.to_owned(),
            raw: text.to_owned(),
        })
    }

    async fn quota(&self, path: &str) -> Result<i64, QuotaFsError> {
        match read_xattr(self.full_path(path), QUOTA_ATTR).await {
            Ok(raw) => {
                let text = String::from_utf8_lossy(&raw);
                parse_quota_attribute(&text).map_err(|source| QuotaFsError::BadQuotaValue {
                    path: path.to_owned(),
                    source,
                })
            }
            // No attribute on the folder means no ceiling was ever set.
            Err(e) if e.raw_os_error() == Some(libc::ENODATA) => Ok(QUOTA_UNBOUNDED),
            Err(e) => Err(Self::io_error(path, "read quota attribute of", e)),
        }
    }

    async fn set_quota(&self, path: &str, bytes: i64) -> Result<(), QuotaFsError> {
        let value = serialize_quota_attribute(bytes);
        write_xattr(self.full_path(path), QUOTA_ATTR, value.into_bytes())
            .await
            .map_err(|e| Self::io_error(path, "set quota attribute of", e))
    }

    async fn file_owner(&self, path: &str) -> Result<String, QuotaFsError> {
        let meta = tokio::fs::metadata(self.full_path(path))
            .await
            .map_err(|e| Self::io_error(path, "stat", e))?;
        let uid = meta.uid();
        let user = tokio::task::spawn_blocking(move || {
            nix::unistd::User::from_uid(Uid::from_raw(uid))
        })
        .await
        .map_err(|e| Self::io_error(path, "resolve owner of", io::Error::other(e)))?
        .map_err(|errno| {
            Self::io_error(
                path,
                "resolve owner of",
                io::Error::from_raw_os_error(errno as i32),
            )
        })?;
        user.map(|u| u.name).ok_or(QuotaFsError::UnknownOwner {
            path: path.to_owned(),
            uid,
        })
    }

    async fn create_folder(&self, path: &str, uid: u32, gid: u32) -> Result<(), QuotaFsError> {
        let full = self.full_path(path);
        let mut builder = tokio::fs::DirBuilder::new();
        builder.mode(FOLDER_MODE);
        builder
            .create(&full)
            .await
            .map_err(|e| Self::io_error(path, "create", e))?;
        tokio::time::sleep(SETTLE_DELAY).await;
        if let Err((op, source)) = self.finish_folder_setup(&full, uid, gid).await {
            // A folder in the wrong mode or ownership must not survive.
            if let Err(rm) = tokio::fs::remove_dir(&full).await {
                tracing::warn!(
                    path = %full.display(),
                    error = %rm,
                    "rollback of partially created folder failed"
                );
            }
            return Err(Self::io_error(path, op, source));
        }
        Ok(())
    }

    async fn delete_folder(&self, path: &str) -> Result<(), QuotaFsError> {
        match tokio::fs::remove_dir(self.full_path(path)).await {
            Ok(()) => Ok(()),
            Err(e) if e.raw_os_error() == Some(libc::ENOTEMPTY) => Err(QuotaFsError::NotEmpty {
                path: path.to_owned(),
            }),
            Err(e) => Err(Self::io_error(path, "remove", e)),
        }
    }

    async fn create_link(&self, path: &str, target: &Path) -> Result<(), QuotaFsError> {
        tokio::fs::symlink(target, self.full_path(path))
            .await
            .map_err(|e| Self::io_error(path, "link", e))
    }

    async fn delete_link(&self, path: &str) -> Result<(), QuotaFsError> {
        tokio::fs::remove_file(self.full_path(path))
            .await
            .map_err(|e| Self::io_error(path, "unlink", e))
    }

    async fn read_dir(&self, path: &str) -> Result<Vec<String>, QuotaFsError> {
        let mut dir = tokio::fs::read_dir(self.full_path(path))
            .await
            .map_err(|e| Self::io_error(path, "read directory", e))?;
        let mut names = Vec::new();
        while let Some(entry) = dir
            .next_entry()
            .await
            .map_err(|e| Self::io_error(path, "read directory", e))?
        {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        names.sort();
        Ok(names)
    }

    async fn exists(&self, path: &str) -> Result<bool, QuotaFsError> {
        // Lstat: a dangling symlink still occupies its name.
        match tokio::fs::symlink_metadata(self.full_path(path)).await {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(source) => Err(QuotaFsError::Io {
                path: path.to_owned(),
                op: "stat",
                source,
            }),
        }
    }

    fn path_for(&self, path: &str) -> PathBuf {
        self.full_path(path)
    }
}

async fn read_xattr(path: PathBuf, attr: &'static CStr) -> io::Result<Vec<u8>> {
    tokio::task::spawn_blocking(move || read_xattr_sync(&path, attr))
        .await
        .map_err(io::Error::other)?
}

async fn write_xattr(path: PathBuf, attr: &'static CStr, value: Vec<u8>) -> io::Result<()> {
    tokio::task::spawn_blocking(move || write_xattr_sync(&path, attr, &value))
        .await
        .map_err(io::Error::other)?
}

fn c_path(path: &Path) -> io::Result<CString> {
    CString::new(path.as_os_str().as_bytes())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "path contains NUL byte"))
}

fn read_xattr_sync(path: &Path, attr: &CStr) -> io::Result<Vec<u8>> {
    let c_path = c_path(path)?;
    // Ceph quota values are short decimal strings; 128 bytes is ample.
    let mut buf = [0_u8; 128];
    // SAFETY: both names are valid NUL-terminated strings and the value
    // buffer is live for the call, with its true length passed alongside.
    let len = unsafe {
        libc::getxattr(
            c_path.as_ptr(),
            attr.as_ptr(),
            buf.as_mut_ptr().cast::<libc::c_void>(),
            buf.len(),
        )
    };
    if len < 0 {
        return Err(io::Error::last_os_error());
    }
    #[allow(clippy::cast_sign_loss)]
    let len = len as usize;
    Ok(buf[..len].to_vec())
}

fn write_xattr_sync(path: &Path, attr: &CStr, value: &[u8]) -> io::Result<()> {
    let c_path = c_path(path)?;
    // SAFETY: both names are valid NUL-terminated strings and the value
    // pointer stays live for the call, with its length passed alongside.
    let rc = unsafe {
        libc::setxattr(
            c_path.as_ptr(),
            attr.as_ptr(),
            value.as_ptr().cast::<libc::c_void>(),
            value.len(),
            0,
        )
    };
    if rc != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}
