//! Project-name validation.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Reasons a project name is rejected.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ProjectNameError {
    /// Fewer than 3 or more than 20 characters.
    #[error("project name must be between 3 and 20 characters long")]
    BadLength,
    /// Something outside ASCII alphanumerics.
    #[error("project name contains unsafe characters")]
    UnsafeCharacters,
}

/// A validated project-folder name: 3 to 20 ASCII alphanumeric characters.
///
/// Project names become directory entries and symlink names on shared
/// storage, so the accepted set is deliberately narrow.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProjectName(String);

impl ProjectName {
    /// Returns the name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for ProjectName {
    type Err = ProjectNameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() < 3 || s.len() > 20 {
            return Err(ProjectNameError::BadLength);
        }
        if !s.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(ProjectNameError::UnsafeCharacters);
        }
        Ok(Self(s.to_owned()))
    }
}

impl fmt::Display for ProjectName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ProjectName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
