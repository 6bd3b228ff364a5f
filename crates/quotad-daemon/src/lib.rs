//! quotad-daemon - Storage-Quota Authority Daemon Library
//!
//! This library wires the `quotad-core` domain types into an HTTP daemon.
//! Cluster login nodes POST signed credentials to it; the daemon verifies
//! them, checks the caller's entitlement, and applies quota changes to the
//! storage tiers it manages.
//!
//! The binary lives in `main.rs`; everything else is a library so the
//! integration tests can drive the handlers with in-process fakes instead
//! of a MUNGE installation and a CephFS mount.
//!
//! # Modules
//!
//! - [`auth`]: Shared request admission pipeline (unseal, trust checks,
//!   rate limit, account resolution, strict payload decode)
//! - [`check`]: Quota report handler for `POST /quota`
//! - [`error`]: API error taxonomy and its HTTP mapping
//! - [`server`]: Router assembly and body-size limiting
//! - [`state`]: Shared daemon state handed to every handler
//! - [`update`]: Folder create/resize/delete handler for `POST /folders`

pub mod auth;
pub mod check;
pub mod error;
pub mod server;
pub mod state;
pub mod update;
