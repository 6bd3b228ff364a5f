//! Shared daemon state.

use std::collections::HashMap;
use std::sync::Arc;

use quotad_core::config::CidrNet;
use quotad_core::credential::Codec;
use quotad_core::identity::Directory;
use quotad_core::policy::AllocationPolicy;
use quotad_core::quotafs::ScopedFs;
use quotad_core::ratelimit::RateLimiter;
use tokio::sync::Mutex;

/// Everything the handlers share. Built once at startup, then read-only
/// apart from the two synchronization primitives.
pub struct AppState {
    /// Credential signer/verifier.
    pub codec: Arc<dyn Codec>,
    /// Account and group directory.
    pub directory: Arc<dyn Directory>,
    /// Grant table mapping groups to tier entitlements.
    pub policy: AllocationPolicy,
    /// Network a credential must have been sealed inside.
    pub trusted_net: CidrNet,
    /// Storage tiers by name, each scoped to its own directory.
    pub tiers: HashMap<String, ScopedFs>,
    /// Symlink namespace keeping project names unique across tiers.
    pub namespace: ScopedFs,
    /// Per-user token buckets.
    pub limiter: RateLimiter,
    /// Serializes folder mutations. Admissibility is decided from live
    /// filesystem state, so two concurrent updates must never interleave
    /// between reading that state and changing it.
    pub update_lock: Mutex<()>,
}

/// Handle handed to handlers through the router.
pub type SharedState = Arc<AppState>;
