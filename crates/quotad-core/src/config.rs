//! Daemon configuration.
//!
//! Loaded once at startup from a TOML file. Validation is strict and runs
//! before the daemon binds its socket: every allocation must point at a
//! configured tier, every directory must be absolute, and unknown keys are
//! rejected so a typo cannot silently disable a rule.

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::Deserialize;
use thiserror::Error;

use crate::policy::Allocation;

/// Errors loading or validating a configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("reading {}: {source}", path.display())]
    Read {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
    /// The file is not valid TOML for the schema.
    #[error(transparent)]
    Parse(#[from] toml::de::Error),
    /// No storage tiers are configured.
    #[error("no storage tiers configured")]
    NoTiers,
    /// A tier directory is not an absolute path.
    #[error("tier {tier:?} directory {} is not absolute", path.display())]
    RelativeTierDir {
        /// Offending tier.
        tier: String,
        /// Its configured directory.
        path: PathBuf,
    },
    /// The project namespace directory is not an absolute path.
    #[error("project directory {} is not absolute", path.display())]
    RelativeProjectDir {
        /// The configured directory.
        path: PathBuf,
    },
    /// An allocation grants quota in a tier that has no directory.
    #[error("allocation for group {group:?} names unknown tier {tier:?}")]
    UnknownAllocationTier {
        /// Group carrying the grant.
        group: String,
        /// The unconfigured tier.
        tier: String,
    },
    /// An allocation grants a negative byte ceiling.
    #[error("allocation for group {group:?} in tier {tier:?} is negative")]
    NegativeCeiling {
        /// Group carrying the grant.
        group: String,
        /// Tier of the grant.
        tier: String,
    },
}

/// Errors parsing a CIDR network.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CidrError {
    /// Not of the form `address/prefix`.
    #[error("expected address/prefix")]
    Shape,
    /// The address part did not parse.
    #[error("invalid network address")]
    Address,
    /// The prefix length did not parse or exceeds the address width.
    #[error("invalid prefix length")]
    PrefixLength,
}

/// An IPv4 or IPv6 network in CIDR notation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub struct CidrNet {
    addr: IpAddr,
    prefix_len: u8,
}

impl CidrNet {
    /// Whether `addr` falls inside the network.
    ///
    /// An address of the other family never matches.
    #[must_use]
    pub fn contains(&self, addr: IpAddr) -> bool {
        match (self.addr, addr) {
            (IpAddr::V4(net), IpAddr::V4(host)) => {
                let mask = v4_mask(self.prefix_len);
                u32::from(net) & mask == u32::from(host) & mask
            }
            (IpAddr::V6(net), IpAddr::V6(host)) => {
                let mask = v6_mask(self.prefix_len);
                u128::from(net) & mask == u128::from(host) & mask
            }
            _ => false,
        }
    }
}

const fn v4_mask(prefix_len: u8) -> u32 {
    if prefix_len == 0 {
        0
    } else {
        u32::MAX << (32 - prefix_len)
    }
}

const fn v6_mask(prefix_len: u8) -> u128 {
    if prefix_len == 0 {
        0
    } else {
        u128::MAX << (128 - prefix_len)
    }
}

impl FromStr for CidrNet {
    type Err = CidrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (addr, len) = s.split_once('/').ok_or(CidrError::Shape)?;
        let addr: IpAddr = addr.trim().parse().map_err(|_| CidrError::Address)?;
        let prefix_len: u8 = len.trim().parse().map_err(|_| CidrError::PrefixLength)?;
        let width = match addr {
            IpAddr::V4(_) => 32,
            IpAddr::V6(_) => 128,
        };
        if prefix_len > width {
            return Err(CidrError::PrefixLength);
        }
        Ok(Self { addr, prefix_len })
    }
}

impl TryFrom<String> for CidrNet {
    type Error = CidrError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl std::fmt::Display for CidrNet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.addr, self.prefix_len)
    }
}

/// Parsed daemon configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Address the HTTP listener binds.
    pub listen_addr: SocketAddr,
    /// Network credentials must have been sealed inside.
    pub allowed_encode_host: CidrNet,
    /// Absolute directory holding the project-name symlink namespace.
    pub project_dir: PathBuf,
    /// Absolute directory per storage tier, keyed by tier name.
    pub tier_dir: HashMap<String, PathBuf>,
    /// Grant table, keyed by unix group name.
    #[serde(default)]
    pub allocations: HashMap<String, Vec<Allocation>>,
    /// Credential signer binary.
    #[serde(default = "default_munge_path")]
    pub munge_path: PathBuf,
    /// Credential verifier binary.
    #[serde(default = "default_unmunge_path")]
    pub unmunge_path: PathBuf,
}

fn default_munge_path() -> PathBuf {
    PathBuf::from("munge")
}

fn default_unmunge_path() -> PathBuf {
    PathBuf::from("unmunge")
}

impl Config {
    /// Loads and validates the configuration at `path`.
    ///
    /// # Errors
    ///
    /// [`ConfigError`] when the file cannot be read, parsed, or fails
    /// validation.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text)
    }

    /// Parses and validates configuration from TOML text.
    ///
    /// # Errors
    ///
    /// [`ConfigError`] when the text cannot be parsed or fails validation.
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.tier_dir.is_empty() {
            return Err(ConfigError::NoTiers);
        }
        for (tier, dir) in &self.tier_dir {
            if !dir.is_absolute() {
                return Err(ConfigError::RelativeTierDir {
                    tier: tier.clone(),
                    path: dir.clone(),
                });
            }
        }
        if !self.project_dir.is_absolute() {
            return Err(ConfigError::RelativeProjectDir {
                path: self.project_dir.clone(),
            });
        }
        for (group, grants) in &self.allocations {
            for grant in grants {
                if !self.tier_dir.contains_key(&grant.tier) {
                    return Err(ConfigError::UnknownAllocationTier {
                        group: group.clone(),
                        tier: grant.tier.clone(),
                    });
                }
                if grant.max_bytes < 0 {
                    return Err(ConfigError::NegativeCeiling {
                        group: group.clone(),
                        tier: grant.tier.clone(),
                    });
                }
            }
        }
        Ok(())
    }
}
