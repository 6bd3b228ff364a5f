//! System account and group resolution.
//!
//! The authority decides everything in terms of accounts the host already
//! knows: the uid recovered from a credential must map to a passwd entry,
//! and entitlements come from the account's group list. [`Directory`] is
//! the lookup seam; [`NssDirectory`] implements it against the host's NSS
//! databases, which may be backed by LDAP or SSSD and can therefore block.

use std::ffi::CString;

use async_trait::async_trait;
use nix::unistd::{self, Gid, Uid};
use thiserror::Error;

/// A resolved system account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    /// Login name.
    pub login: String,
    /// Numeric user id.
    pub uid: u32,
    /// Primary group id.
    pub gid: u32,
}

/// Errors resolving accounts or groups.
#[derive(Debug, Error)]
pub enum DirectoryError {
    /// No passwd entry for the uid.
    #[error("no account with uid {uid}")]
    UnknownUid {
        /// The unmatched uid.
        uid: u32,
    },
    /// No passwd entry for the login name.
    #[error("no account named {login:?}")]
    UnknownUser {
        /// The unmatched login.
        login: String,
    },
    /// A group id from the membership list has no group entry.
    #[error("no group with gid {gid}")]
    UnknownGid {
        /// The unmatched gid.
        gid: u32,
    },
    /// The lookup itself failed.
    #[error("account lookup failed: {source}")]
    Lookup {
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
}

/// Account directory port.
#[async_trait]
pub trait Directory: Send + Sync {
    /// Resolves the account holding `uid`.
    ///
    /// # Errors
    ///
    /// [`DirectoryError::UnknownUid`] when no account holds the uid, or
    /// [`DirectoryError::Lookup`] when the database cannot be consulted.
    async fn account_by_uid(&self, uid: u32) -> Result<Account, DirectoryError>;

    /// Resolves the account named `login`.
    ///
    /// # Errors
    ///
    /// [`DirectoryError::UnknownUser`] when no account carries the name, or
    /// [`DirectoryError::Lookup`] when the database cannot be consulted.
    async fn account_by_name(&self, login: &str) -> Result<Account, DirectoryError>;

    /// Lists the names of every group `account` belongs to, primary group
    /// included.
    ///
    /// # Errors
    ///
    /// [`DirectoryError`] when membership cannot be enumerated or a member
    /// gid has no group entry.
    async fn groups_of(&self, account: &Account) -> Result<Vec<String>, DirectoryError>;
}

/// [`Directory`] reading the host's NSS databases.
///
/// Lookups run on the blocking thread pool since glibc may serve them from
/// a remote directory service.
#[derive(Debug, Clone, Copy, Default)]
pub struct NssDirectory;

impl NssDirectory {
    /// Creates the directory.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Directory for NssDirectory {
    async fn account_by_uid(&self, uid: u32) -> Result<Account, DirectoryError> {
        blocking_lookup(move || {
            let user = unistd::User::from_uid(Uid::from_raw(uid)).map_err(errno_to_lookup)?;
            user.map(account_from_passwd)
                .ok_or(DirectoryError::UnknownUid { uid })
        })
        .await
    }

    async fn account_by_name(&self, login: &str) -> Result<Account, DirectoryError> {
        let login = login.to_owned();
        blocking_lookup(move || {
            let user = unistd::User::from_name(&login).map_err(errno_to_lookup)?;
            user.map(account_from_passwd)
                .ok_or(DirectoryError::UnknownUser { login })
        })
        .await
    }

    async fn groups_of(&self, account: &Account) -> Result<Vec<String>, DirectoryError> {
        let login = account.login.clone();
        let gid = account.gid;
        blocking_lookup(move || {
            let c_login = CString::new(login.clone())
                .map_err(|_| DirectoryError::UnknownUser { login })?;
            let gids = unistd::getgrouplist(&c_login, Gid::from_raw(gid))
                .map_err(errno_to_lookup)?;
            let mut names = Vec::with_capacity(gids.len());
            for gid in gids {
                let group = unistd::Group::from_gid(gid).map_err(errno_to_lookup)?;
                let group = group.ok_or(DirectoryError::UnknownGid { gid: gid.as_raw() })?;
                names.push(group.name);
            }
            Ok(names)
        })
        .await
    }
}

fn account_from_passwd(user: unistd::User) -> Account {
    Account {
        login: user.name,
        uid: user.uid.as_raw(),
        gid: user.gid.as_raw(),
    }
}

fn errno_to_lookup(errno: nix::errno::Errno) -> DirectoryError {
    DirectoryError::Lookup {
        source: std::io::Error::from_raw_os_error(errno as i32),
    }
}

async fn blocking_lookup<T, F>(f: F) -> Result<T, DirectoryError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, DirectoryError> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| DirectoryError::Lookup {
            source: std::io::Error::other(e),
        })?
}
