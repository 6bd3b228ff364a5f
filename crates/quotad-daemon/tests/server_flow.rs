//! End-to-end handler tests over in-process fakes.
//!
//! Each test assembles the daemon state from a static credential codec, a
//! fixture account directory, and one shared in-memory filesystem, then
//! drives the extracted axum handlers directly; the router tests at the
//! end send whole requests through the assembled service instead, covering
//! the body-size cap and route wiring. Response bodies are asserted byte
//! for byte because users read them verbatim in a terminal.
//!
//! Test command: `cargo test -p quotad-daemon --test server_flow`

use std::collections::HashMap;
use std::os::unix::process::ExitStatusExt;
use std::path::Path;
use std::process::ExitStatus;
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::{Request, StatusCode, header};
use quotad_core::credential::{Codec, CredentialError, Identity};
use quotad_core::identity::{Account, Directory, DirectoryError};
use quotad_core::policy::{Allocation, AllocationPolicy};
use quotad_core::quotafs::{MemFs, QuotaFs, QuotaFsError, ScopedFs, quota_used};
use quotad_core::ratelimit::{RateLimitConfig, RateLimiter};
use quotad_daemon::check::check_quota;
use quotad_daemon::error::ApiError;
use quotad_daemon::server::{MAX_BODY_BYTES, router};
use quotad_daemon::state::{AppState, SharedState};
use quotad_daemon::update::update_folder;
use tower::ServiceExt;

const GB: i64 = 1_000_000_000;

const ALICE: u32 = 100;
const BOB: u32 = 200;
const CAROL: u32 = 300;

/// Codec whose unseal stamps one fixed identity onto whatever arrives.
/// The "sealed" form of a payload is the payload itself.
struct StaticCodec {
    identity: Identity,
}

#[async_trait]
impl Codec for StaticCodec {
    async fn seal(&self, payload: &[u8]) -> Result<Vec<u8>, CredentialError> {
        Ok(payload.to_vec())
    }

    async fn unseal(&self, sealed: &[u8]) -> Result<Identity, CredentialError> {
        Ok(Identity {
            payload: sealed.to_vec(),
            ..self.identity.clone()
        })
    }
}

/// Codec that refuses every credential, standing in for a bad signature
/// or an expired seal.
struct RejectingCodec;

#[async_trait]
impl Codec for RejectingCodec {
    async fn seal(&self, payload: &[u8]) -> Result<Vec<u8>, CredentialError> {
        Ok(payload.to_vec())
    }

    async fn unseal(&self, _sealed: &[u8]) -> Result<Identity, CredentialError> {
        Err(CredentialError::Rejected {
            status: ExitStatus::from_raw(256),
            stderr: "Expired credential".to_owned(),
        })
    }
}

/// Codec that fails the test if a request gets as far as unsealing.
struct UnreachableCodec;

#[async_trait]
impl Codec for UnreachableCodec {
    async fn seal(&self, _payload: &[u8]) -> Result<Vec<u8>, CredentialError> {
        unreachable!("seal is never exercised");
    }

    async fn unseal(&self, _sealed: &[u8]) -> Result<Identity, CredentialError> {
        unreachable!("request should have been turned away before unsealing");
    }
}

/// Directory over a fixed account table.
struct FixtureDirectory {
    accounts: Vec<(Account, Vec<String>)>,
}

#[async_trait]
impl Directory for FixtureDirectory {
    async fn account_by_uid(&self, uid: u32) -> Result<Account, DirectoryError> {
        self.accounts
            .iter()
            .find(|(account, _)| account.uid == uid)
            .map(|(account, _)| account.clone())
            .ok_or(DirectoryError::UnknownUid { uid })
    }

    async fn account_by_name(&self, login: &str) -> Result<Account, DirectoryError> {
        self.accounts
            .iter()
            .find(|(account, _)| account.login == login)
            .map(|(account, _)| account.clone())
            .ok_or_else(|| DirectoryError::UnknownUser {
                login: login.to_owned(),
            })
    }

    async fn groups_of(&self, account: &Account) -> Result<Vec<String>, DirectoryError> {
        self.accounts
            .iter()
            .find(|(known, _)| known.uid == account.uid)
            .map(|(_, groups)| groups.clone())
            .ok_or(DirectoryError::UnknownUid { uid: account.uid })
    }
}

struct Fixture {
    mem: Arc<MemFs>,
    state: SharedState,
}

fn account(login: &str, uid: u32) -> Account {
    Account {
        login: login.to_owned(),
        uid,
        gid: uid,
    }
}

fn caller(uid: u32, origin: &str) -> Identity {
    Identity {
        user_id: Some(uid),
        group_id: Some(uid),
        origin_host: Some(origin.parse().unwrap()),
        ..Identity::default()
    }
}

/// Limiter that never interferes with an unrelated scenario.
fn generous_limiter() -> RateLimiter {
    RateLimiter::new(RateLimitConfig {
        capacity: 1000.0,
        refill_per_sec: 1000.0,
    })
}

/// State with alice calling from inside the trusted network.
///
/// Alice is entitled to 10 G in `bulk` and 2 G in `fast` through the
/// physics group; bob gets 4 G in `bulk` through astro; carol has no
/// grants at all.
fn fixture() -> Fixture {
    fixture_for(caller(ALICE, "10.1.2.3"))
}

fn fixture_for(identity: Identity) -> Fixture {
    build_fixture(Arc::new(StaticCodec { identity }), generous_limiter())
}

fn build_fixture(codec: Arc<dyn Codec>, limiter: RateLimiter) -> Fixture {
    let mem = Arc::new(MemFs::new().with_users([
        (ALICE, "alice"),
        (BOB, "bob"),
        (CAROL, "carol"),
    ]));

    let mut tiers = HashMap::new();
    tiers.insert(
        "bulk".to_owned(),
        ScopedFs::new(mem.clone(), "tier/bulk").unwrap(),
    );
    tiers.insert(
        "fast".to_owned(),
        ScopedFs::new(mem.clone(), "tier/fast").unwrap(),
    );
    let namespace = ScopedFs::new(mem.clone(), "projects").unwrap();

    let mut grants = HashMap::new();
    grants.insert("physics".to_owned(), vec![
        Allocation {
            tier: "bulk".to_owned(),
            max_bytes: 10 * GB,
        },
        Allocation {
            tier: "fast".to_owned(),
            max_bytes: 2 * GB,
        },
    ]);
    grants.insert("astro".to_owned(), vec![Allocation {
        tier: "bulk".to_owned(),
        max_bytes: 4 * GB,
    }]);

    let directory = FixtureDirectory {
        accounts: vec![
            (account("alice", ALICE), vec![
                "alice".to_owned(),
                "physics".to_owned(),
            ]),
            (account("bob", BOB), vec![
                "bob".to_owned(),
                "astro".to_owned(),
            ]),
            (account("carol", CAROL), vec!["carol".to_owned()]),
        ],
    };

    let state = Arc::new(AppState {
        codec,
        directory: Arc::new(directory),
        policy: AllocationPolicy::new(grants),
        trusted_net: "10.0.0.0/8".parse().unwrap(),
        tiers,
        namespace,
        limiter,
        update_lock: tokio::sync::Mutex::new(()),
    });
    Fixture { mem, state }
}

/// Places an existing project folder with its namespace link, as a past
/// create request would have left it.
async fn seed_folder(fixture: &Fixture, tier: &str, name: &str, uid: u32, usage: i64, quota: i64) {
    fixture
        .mem
        .insert_folder(&format!("tier/{tier}/{name}"), uid, uid, usage, quota);
    fixture
        .mem
        .create_link(
            &format!("projects/{name}"),
            &Path::new("/tier").join(tier).join(name),
        )
        .await
        .unwrap();
}

async fn update(fixture: &Fixture, payload: &str) -> Result<String, ApiError> {
    update_folder(
        State(fixture.state.clone()),
        Bytes::copy_from_slice(payload.as_bytes()),
    )
    .await
}

async fn check(fixture: &Fixture, payload: &str) -> Result<String, ApiError> {
    check_quota(
        State(fixture.state.clone()),
        Bytes::copy_from_slice(payload.as_bytes()),
    )
    .await
}

#[tokio::test]
async fn test_create_folder_end_to_end() {
    let fixture = fixture();

    let body = update(&fixture, r#"{"name":"proj1","tier":"bulk","size_in_gb":5}"#)
        .await
        .unwrap();
    assert_eq!(
        body,
        "Your folder has been created.\nYou can access it at /projects/proj1.\n\n"
    );

    let bulk = &fixture.state.tiers["bulk"];
    assert_eq!(bulk.quota("proj1").await.unwrap(), 5 * GB);
    assert_eq!(bulk.file_owner("proj1").await.unwrap(), "alice");
    assert_eq!(
        fixture.mem.link_target("projects/proj1").unwrap(),
        Path::new("/tier/bulk/proj1")
    );
}

#[tokio::test]
async fn test_grow_within_entitlement() {
    let fixture = fixture();
    seed_folder(&fixture, "bulk", "proj1", ALICE, GB, 5 * GB).await;

    let body = update(&fixture, r#"{"name":"proj1","tier":"bulk","size_in_gb":8}"#)
        .await
        .unwrap();
    assert_eq!(body, "Your folder's quota has been updated.\n");
    assert_eq!(
        fixture.state.tiers["bulk"].quota("proj1").await.unwrap(),
        8 * GB
    );
}

#[tokio::test]
async fn test_grow_beyond_entitlement_lists_figures() {
    let fixture = fixture();
    seed_folder(&fixture, "bulk", "proj1", ALICE, GB, 5 * GB).await;

    // Charged is the assigned 5 G, not the 1 G actually stored; growing
    // 5 G -> 20 G therefore needs 15 G against the 5 G still free.
    let err = update(&fixture, r#"{"name":"proj1","tier":"bulk","size_in_gb":20}"#)
        .await
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "You do not have sufficient quota left to assign to this tier.\n\
         You used 5.0 G/10.0 G and have 5.0 G left.\n\
         This operation needs 15.0 G."
    );
    assert_eq!(
        fixture.state.tiers["bulk"].quota("proj1").await.unwrap(),
        5 * GB
    );
}

#[tokio::test]
async fn test_other_folders_count_against_entitlement() {
    let fixture = fixture();
    seed_folder(&fixture, "bulk", "proj1", ALICE, 0, 5 * GB).await;
    seed_folder(&fixture, "bulk", "proj2", ALICE, 0, 4 * GB).await;

    let err = update(&fixture, r#"{"name":"proj3","tier":"bulk","size_in_gb":2}"#)
        .await
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "You do not have sufficient quota left to assign to this tier.\n\
         You used 9.0 G/10.0 G and have 1.0 G left.\n\
         This operation needs 2.0 G."
    );
}

#[tokio::test]
async fn test_shrink_below_live_usage_is_refused() {
    let fixture = fixture();
    seed_folder(&fixture, "bulk", "proj1", ALICE, 6 * GB, 8 * GB).await;

    let err = update(&fixture, r#"{"name":"proj1","tier":"bulk","size_in_gb":5}"#)
        .await
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "You are currently using more storage than the quota you requested.\n\
         You are currently using 6.0 G.\n\
         Please delete some files before requesting to shrink the folder quota."
    );

    // Once enough data is gone the same shrink goes through.
    fixture.mem.set_usage("tier/bulk/proj1", GB);
    let body = update(&fixture, r#"{"name":"proj1","tier":"bulk","size_in_gb":5}"#)
        .await
        .unwrap();
    assert_eq!(body, "Your folder's quota has been updated.\n");
    assert_eq!(
        fixture.state.tiers["bulk"].quota("proj1").await.unwrap(),
        5 * GB
    );
}

#[tokio::test]
async fn test_unchanged_quota_is_a_no_op() {
    let fixture = fixture();
    seed_folder(&fixture, "bulk", "proj1", ALICE, GB, 5 * GB).await;

    let body = update(&fixture, r#"{"name":"proj1","tier":"bulk","size_in_gb":5}"#)
        .await
        .unwrap();
    assert_eq!(body, "Quota is unchanged.\n");
}

#[tokio::test]
async fn test_delete_empty_folder_removes_link() {
    let fixture = fixture();
    seed_folder(&fixture, "bulk", "proj1", ALICE, 0, 5 * GB).await;

    let body = update(&fixture, r#"{"name":"proj1","tier":"bulk","size_in_gb":0}"#)
        .await
        .unwrap();
    assert_eq!(body, "Your project folder has been deleted.\n");

    assert!(matches!(
        fixture.state.tiers["bulk"].quota("proj1").await.unwrap_err(),
        QuotaFsError::NotFound { .. }
    ));
    assert!(fixture.mem.link_target("projects/proj1").is_none());
}

#[tokio::test]
async fn test_delete_occupied_folder_is_refused() {
    let fixture = fixture();
    seed_folder(&fixture, "bulk", "proj1", ALICE, GB, 5 * GB).await;

    // No usage-versus-requested admission for deletion; whether the
    // folder is empty is decided by the removal itself.
    let err = update(&fixture, r#"{"name":"proj1","tier":"bulk","size_in_gb":0}"#)
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Your directory is not empty.");

    assert!(fixture.state.tiers["bulk"].quota("proj1").await.is_ok());
    assert!(fixture.mem.link_target("projects/proj1").is_some());
}

#[tokio::test]
async fn test_delete_missing_folder_reports_no_op() {
    let fixture = fixture();
    let body = update(&fixture, r#"{"name":"ghost1","tier":"bulk","size_in_gb":0}"#)
        .await
        .unwrap();
    assert_eq!(body, "Folder already does not exist.\n");
}

#[tokio::test]
async fn test_name_taken_in_another_tier_is_refused() {
    let fixture = fixture();
    seed_folder(&fixture, "fast", "shared1", BOB, 0, GB).await;

    let err = update(&fixture, r#"{"name":"shared1","tier":"bulk","size_in_gb":3}"#)
        .await
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "Folder shared1 already exists in another tier."
    );
}

#[tokio::test]
async fn test_foreign_folder_is_refused() {
    let fixture = fixture();
    seed_folder(&fixture, "bulk", "proj1", BOB, 0, 2 * GB).await;

    for size in ["6", "0"] {
        let err = update(
            &fixture,
            &format!(r#"{{"name":"proj1","tier":"bulk","size_in_gb":{size}}}"#),
        )
        .await
        .unwrap_err();
        assert_eq!(err.to_string(), "The folder to update does not belong to you!");
    }
    assert!(fixture.state.tiers["bulk"].quota("proj1").await.is_ok());
}

#[tokio::test]
async fn test_unknown_tier_is_refused() {
    let fixture = fixture();
    let err = update(&fixture, r#"{"name":"proj1","tier":"scratch","size_in_gb":1}"#)
        .await
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "Invalid tier requested: \"scratch\" does not exist!\nCheck your allocated quota first."
    );
}

#[tokio::test]
async fn test_invalid_name_is_refused() {
    let fixture = fixture();

    let err = update(&fixture, r#"{"name":"bad name!","tier":"bulk","size_in_gb":1}"#)
        .await
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "Invalid name requested: project name contains unsafe characters"
    );

    let err = update(&fixture, r#"{"name":"ab","tier":"bulk","size_in_gb":1}"#)
        .await
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "Invalid name requested: project name must be between 3 and 20 characters long"
    );
}

#[tokio::test]
async fn test_invalid_size_is_refused() {
    let fixture = fixture();
    for size in ["-2", "9223372036854775807"] {
        let err = update(
            &fixture,
            &format!(r#"{{"name":"proj1","tier":"bulk","size_in_gb":{size}}}"#),
        )
        .await
        .unwrap_err();
        assert_eq!(err.to_string(), "Provided folder size is invalid.");
    }
}

#[tokio::test]
async fn test_missing_payload_fields_default_to_empty() {
    let fixture = fixture();
    // Absent fields read as zero values and fail downstream validation,
    // so the user is told which field was useless.
    let err = update(&fixture, "{}").await.unwrap_err();
    assert_eq!(
        err.to_string(),
        "Invalid tier requested: \"\" does not exist!\nCheck your allocated quota first."
    );
}

#[tokio::test]
async fn test_unknown_payload_field_is_refused() {
    let fixture = fixture();
    let err = update(
        &fixture,
        r#"{"name":"proj1","tier":"bulk","size_in_gb":1,"force":true}"#,
    )
    .await
    .unwrap_err();
    let message = err.to_string();
    assert!(
        message.starts_with("Credential payload was not valid JSON: "),
        "unexpected message: {message}"
    );
    assert!(message.contains("force"));

    let err = check(&fixture, r#"{"user":"alice","verbose":true}"#)
        .await
        .unwrap_err();
    let message = err.to_string();
    assert!(
        message.starts_with("Credential payload was not valid JSON: "),
        "unexpected message: {message}"
    );
    assert!(message.contains("verbose"));
}

#[tokio::test]
async fn test_rejected_credential_is_unauthenticated() {
    let fixture = build_fixture(Arc::new(RejectingCodec), generous_limiter());
    let err = check(&fixture, "{}").await.unwrap_err();
    assert_eq!(
        err.to_string(),
        "Failed to authenticate request: \
         credential verification failed with exit status: 1: Expired credential"
    );
}

#[tokio::test]
async fn test_untrusted_encode_host_is_unauthenticated() {
    let fixture = fixture_for(caller(ALICE, "192.168.1.9"));
    let err = check(&fixture, "{}").await.unwrap_err();
    assert_eq!(
        err.to_string(),
        "Failed to authenticate request: invalid encode host 192.168.1.9"
    );
}

#[tokio::test]
async fn test_incomplete_identity_is_unauthenticated() {
    let fixture = fixture_for(Identity {
        user_id: Some(ALICE),
        origin_host: Some("10.1.2.3".parse().unwrap()),
        ..Identity::default()
    });
    let err = check(&fixture, "{}").await.unwrap_err();
    assert_eq!(
        err.to_string(),
        "Failed to authenticate request: missing identity field in credential"
    );
}

#[tokio::test]
async fn test_rate_limit_trips_after_burst() {
    // Zero refill keeps the outcome independent of test wall time.
    let fixture = build_fixture(
        Arc::new(StaticCodec {
            identity: caller(ALICE, "10.1.2.3"),
        }),
        RateLimiter::new(RateLimitConfig {
            capacity: 3.0,
            refill_per_sec: 0.0,
        }),
    );

    for _ in 0..3 {
        check(&fixture, "{}").await.unwrap();
    }
    let err = check(&fixture, "{}").await.unwrap_err();
    assert!(matches!(err, ApiError::RateLimited));
    assert_eq!(
        err.to_string(),
        "You have sent too many requests recently. Please slow down."
    );
}

#[tokio::test]
async fn test_quota_report_for_caller() {
    let fixture = fixture();
    seed_folder(&fixture, "bulk", "proj1", ALICE, GB, 5 * GB).await;

    let expected = "User alice has access to the following tiers of storage:\n\
                    \n\
                    bulk - 5.0 G assigned / 10.0 G allocated\n\
                    \tproj1 - 1.0 G used / 5.0 G assigned\n\
                    fast - 0 B assigned / 2.0 G allocated\n";

    // Omitted, empty, and self-naming targets all mean the caller.
    for payload in ["{}", r#"{"user":""}"#, r#"{"user":"alice"}"#] {
        assert_eq!(check(&fixture, payload).await.unwrap(), expected);
    }
}

#[tokio::test]
async fn test_quota_report_for_another_user() {
    let fixture = fixture();
    let body = check(&fixture, r#"{"user":"bob"}"#).await.unwrap();
    assert_eq!(
        body,
        "User bob has access to the following tiers of storage:\n\
         \n\
         bulk - 0 B assigned / 4.0 G allocated\n"
    );
}

#[tokio::test]
async fn test_quota_report_unknown_user() {
    let fixture = fixture();
    let err = check(&fixture, r#"{"user":"nobody"}"#).await.unwrap_err();
    assert_eq!(
        err.to_string(),
        "Cannot find requested user: no account named \"nobody\""
    );
}

#[tokio::test]
async fn test_quota_report_without_grants() {
    let fixture = fixture_for(caller(CAROL, "10.1.2.3"));
    let body = check(&fixture, "{}").await.unwrap();
    assert_eq!(body, "User carol has no access to managed storage.\n");
}

#[tokio::test]
async fn test_quota_report_truncates_to_smallest_folders() {
    let fixture = fixture();
    for i in 1..=6_i64 {
        seed_folder(&fixture, "bulk", &format!("proj{i}"), ALICE, 0, i * GB).await;
    }

    let body = check(&fixture, "{}").await.unwrap();
    assert_eq!(
        body,
        "User alice has access to the following tiers of storage:\n\
         \n\
         bulk - 21.0 G assigned / 10.0 G allocated\n\
         \tproj1 - 0 B used / 1.0 G assigned\n\
         \tproj2 - 0 B used / 2.0 G assigned\n\
         \tproj3 - 0 B used / 3.0 G assigned\n\
         \tproj4 - 0 B used / 4.0 G assigned\n\
         \tproj5 - 0 B used / 5.0 G assigned\n\
         fast - 0 B assigned / 2.0 G allocated\n\
         \nNote that the larger folders have been omitted for brevity.\n"
    );
}

#[tokio::test]
async fn test_concurrent_creates_cannot_double_spend() {
    let fixture = fixture();

    // Both fit individually, never together. The update lock must make
    // one of them see the other's spend.
    let (a, b) = tokio::join!(
        update(&fixture, r#"{"name":"race1","tier":"bulk","size_in_gb":8}"#),
        update(&fixture, r#"{"name":"race2","tier":"bulk","size_in_gb":8}"#),
    );
    assert!(
        a.is_ok() ^ b.is_ok(),
        "exactly one racing request may win: {a:?} / {b:?}"
    );
    let denied = if a.is_ok() {
        b.unwrap_err()
    } else {
        a.unwrap_err()
    };
    assert_eq!(
        denied.to_string(),
        "You do not have sufficient quota left to assign to this tier.\n\
         You used 8.0 G/10.0 G and have 2.0 G left.\n\
         This operation needs 8.0 G."
    );

    let bulk = &fixture.state.tiers["bulk"];
    assert_eq!(bulk.read_dir(".").await.unwrap().len(), 1);
    let (_, total) = quota_used(bulk, "alice").await.unwrap();
    assert_eq!(total, 8 * GB);
}

#[tokio::test]
async fn test_tiers_are_scoped_independently() {
    let fixture = fixture();
    seed_folder(&fixture, "bulk", "proj1", ALICE, 0, 10 * GB).await;

    // Bulk is exhausted; the fast entitlement is untouched by it.
    let body = update(&fixture, r#"{"name":"fastp1","tier":"fast","size_in_gb":2}"#)
        .await
        .unwrap();
    assert_eq!(
        body,
        "Your folder has been created.\nYou can access it at /projects/fastp1.\n\n"
    );

    let err = update(&fixture, r#"{"name":"another1","tier":"bulk","size_in_gb":1}"#)
        .await
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "You do not have sufficient quota left to assign to this tier.\n\
         You used 10.0 G/10.0 G and have 0 B left.\n\
         This operation needs 1.0 G."
    );
}

#[tokio::test]
async fn test_oversized_body_is_rejected_at_the_router() {
    let fixture = build_fixture(Arc::new(UnreachableCodec), generous_limiter());
    let app = router(fixture.state.clone());
    let oversized = vec![b'x'; MAX_BODY_BYTES + 1];

    // A client that announces the length is turned away at the door.
    let request = Request::post("/folders")
        .header(header::CONTENT_LENGTH, oversized.len())
        .body(Body::from(oversized.clone()))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);

    // One that omits it is caught while the body streams in.
    let request = Request::post("/quota").body(Body::from(oversized)).unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn test_router_delivers_capped_bodies_to_the_handlers() {
    let fixture = fixture();
    seed_folder(&fixture, "bulk", "proj1", ALICE, GB, 5 * GB).await;
    let app = router(fixture.state.clone());

    let response = app
        .clone()
        .oneshot(Request::post("/quota").body(Body::from("{}")).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(
        body,
        "User alice has access to the following tiers of storage:\n\
         \n\
         bulk - 5.0 G assigned / 10.0 G allocated\n\
         \tproj1 - 1.0 G used / 5.0 G assigned\n\
         fast - 0 B assigned / 2.0 G allocated\n"
    );

    let request = Request::post("/folders")
        .body(Body::from(
            r#"{"name":"proj2","tier":"nvme","size_in_gb":1}"#,
        ))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(
        body,
        "Invalid tier requested: \"nvme\" does not exist!\nCheck your allocated quota first.\n"
    );
}
