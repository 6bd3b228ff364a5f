//! quotad-core - Storage-Quota Authority Library
//!
//! Domain logic for `quotad`, the cluster storage-quota authority: users
//! submit signed requests to create, grow, shrink, or delete quota-bound
//! project folders on a shared distributed filesystem, and the daemon
//! reconciles each request against per-group allocation policy and the live
//! quota attributes on disk.
//!
//! This crate holds everything below the HTTP surface. The serving pipeline,
//! request handlers, and process wiring live in `quotad-daemon`.
//!
//! # Modules
//!
//! - [`bytesize`]: quota-attribute parsing, canonical serialization, and
//!   human-readable byte formatting
//! - [`config`]: TOML daemon configuration and the trusted-network type
//! - [`credential`]: signed-credential sealing/unsealing over the cluster's
//!   MUNGE installation, with a strict metadata parser
//! - [`identity`]: local account and group resolution port
//! - [`policy`]: group-to-tier allocation policy and entitlement lookup
//! - [`project`]: project-name validation
//! - [`quotafs`]: the quota-filesystem capability interface, its CephFS and
//!   in-memory backends, and prefix scoping
//! - [`ratelimit`]: per-identity token buckets

pub mod bytesize;
pub mod config;
pub mod credential;
pub mod identity;
pub mod policy;
pub mod project;
pub mod quotafs;
pub mod ratelimit;
