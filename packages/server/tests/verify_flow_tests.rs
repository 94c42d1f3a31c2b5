//! Integration tests for the full verify-and-provision flow.
//!
//! The actions run against the in-memory store and mock collaborators;
//! challenges are seeded directly through the store where a test needs a
//! known code or a pre-aged expiry.

use std::time::Duration;

use auth_core::domains::auth::actions::{reissue_session, request_code, verify_code};
use auth_core::domains::auth::models::{Challenge, ChallengeStatus};
use auth_core::domains::auth::types::Role;
use auth_core::domains::auth::AuthError;
use auth_core::kernel::test_dependencies::{MockVerificationProvider, TestDependencies};
use auth_core::kernel::{AuthSettings, BaseAuthStore, ProviderVerdict};
use chrono::Utc;

const PHONE: &str = "+15551230001";
const CODE: &str = "482913";

async fn seed_challenge(test_deps: &TestDependencies, external_ref: Option<&str>) -> Challenge {
    let challenge = Challenge::new(
        PHONE.to_string(),
        CODE.to_string(),
        external_ref.map(String::from),
        Utc::now(),
    );
    test_deps
        .store
        .insert_challenge(challenge)
        .await
        .expect("seeding challenge")
}

#[tokio::test]
async fn happy_path_provisions_and_issues_a_session() {
    let test_deps = TestDependencies::new();
    seed_challenge(&test_deps, None).await;
    let deps = test_deps.server_deps_without_provider();

    let outcome = verify_code(PHONE, CODE, Role::Affiliate, &deps)
        .await
        .unwrap();

    assert_eq!(outcome.identity.phone, PHONE);
    assert_eq!(outcome.identity.role, Role::Affiliate);
    assert_eq!(outcome.session.exchange_token, "exchange_tok_1");
    assert_eq!(
        outcome.session.exchange_address,
        "15551230001@login.vitrina.app"
    );

    // Challenge consumed, identity materialized.
    let challenge = test_deps.store.latest_challenge(PHONE).await.unwrap().unwrap();
    assert_eq!(challenge.status, ChallengeStatus::Verified);
    assert_eq!(test_deps.store.credentials().len(), 1);
    assert_eq!(test_deps.store.profiles().len(), 1);
    assert_eq!(test_deps.store.role_grants().len(), 1);
}

#[tokio::test]
async fn wrong_code_counts_an_attempt_then_correct_code_succeeds() {
    let test_deps = TestDependencies::new();
    seed_challenge(&test_deps, None).await;
    let deps = test_deps.server_deps_without_provider();

    let err = verify_code(PHONE, "000000", Role::Affiliate, &deps)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::CodeMismatch));
    let challenge = test_deps.store.latest_challenge(PHONE).await.unwrap().unwrap();
    assert_eq!(challenge.attempts, 1);

    let outcome = verify_code(PHONE, CODE, Role::Affiliate, &deps)
        .await
        .unwrap();
    assert_eq!(outcome.identity.phone, PHONE);
}

#[tokio::test]
async fn five_attempts_lock_the_challenge_even_with_the_right_code() {
    // Four wrong attempts count 1 through 4; the fifth locks out before the
    // code is even looked at.
    let test_deps = TestDependencies::new();
    seed_challenge(&test_deps, None).await;
    let deps = test_deps.server_deps_without_provider();

    for expected_attempts in 1..=4 {
        let err = verify_code(PHONE, "000000", Role::Affiliate, &deps)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::CodeMismatch));
        let challenge = test_deps.store.latest_challenge(PHONE).await.unwrap().unwrap();
        assert_eq!(challenge.attempts, expected_attempts);
        assert_eq!(challenge.status, ChallengeStatus::Active);
    }

    let err = verify_code(PHONE, CODE, Role::Affiliate, &deps)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::ChallengeLocked));

    let challenge = test_deps.store.latest_challenge(PHONE).await.unwrap().unwrap();
    assert_eq!(challenge.status, ChallengeStatus::Locked);
    assert_eq!(challenge.attempts, 5);

    // Locked is terminal: further calls keep rejecting the same way.
    let err = verify_code(PHONE, CODE, Role::Affiliate, &deps)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::ChallengeLocked));
    assert!(test_deps.store.credentials().is_empty());
}

#[tokio::test]
async fn expired_challenge_rejects_even_with_attempts_left() {
    let test_deps = TestDependencies::new();
    let stale = Challenge::new(
        PHONE.to_string(),
        CODE.to_string(),
        None,
        Utc::now() - chrono::Duration::minutes(10),
    );
    test_deps.store.insert_challenge(stale).await.unwrap();
    let deps = test_deps.server_deps_without_provider();

    let err = verify_code(PHONE, CODE, Role::Affiliate, &deps)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::ChallengeExpired));

    let challenge = test_deps.store.latest_challenge(PHONE).await.unwrap().unwrap();
    assert_eq!(challenge.status, ChallengeStatus::Expired);
    assert_eq!(challenge.attempts, 0);
}

#[tokio::test]
async fn verify_without_a_challenge_is_not_found() {
    let test_deps = TestDependencies::new();
    let deps = test_deps.server_deps_without_provider();

    let err = verify_code(PHONE, CODE, Role::Affiliate, &deps)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::ChallengeNotFound));
}

#[tokio::test]
async fn a_code_is_redeemable_exactly_once() {
    let test_deps = TestDependencies::new();
    seed_challenge(&test_deps, None).await;
    let deps = test_deps.server_deps_without_provider();

    verify_code(PHONE, CODE, Role::Affiliate, &deps)
        .await
        .unwrap();
    let err = verify_code(PHONE, CODE, Role::Affiliate, &deps)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::ChallengeNotFound));
}

#[tokio::test]
async fn provider_timeout_falls_back_to_the_local_code() {
    let test_deps = TestDependencies::new()
        .with_provider(MockVerificationProvider::delayed(
            Duration::from_millis(500),
            ProviderVerdict::Rejected,
        ))
        .with_settings(AuthSettings {
            provider_timeout: Duration::from_millis(50),
            ..AuthSettings::default()
        });
    seed_challenge(&test_deps, Some("ver_1")).await;
    let deps = test_deps.server_deps();

    let outcome = verify_code(PHONE, CODE, Role::Merchant, &deps)
        .await
        .unwrap();
    assert_eq!(outcome.identity.role, Role::Merchant);
}

#[tokio::test]
async fn provider_rejection_is_final_even_if_local_code_matches() {
    let test_deps = TestDependencies::new().with_provider(MockVerificationProvider::rejecting());
    seed_challenge(&test_deps, Some("ver_1")).await;
    let deps = test_deps.server_deps();

    let err = verify_code(PHONE, CODE, Role::Affiliate, &deps)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::CodeMismatch));
    assert_eq!(test_deps.provider.check_calls(), 1);
}

#[tokio::test]
async fn session_failure_is_retryable_without_a_new_code() {
    let test_deps = TestDependencies::new();
    seed_challenge(&test_deps, None).await;
    test_deps.session_backend.set_failing(true);
    let deps = test_deps.server_deps_without_provider();

    let err = verify_code(PHONE, CODE, Role::Affiliate, &deps)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::SessionIssuance(_)));

    // Verification itself succeeded: the challenge is consumed and the
    // identity exists.
    let challenge = test_deps.store.latest_challenge(PHONE).await.unwrap().unwrap();
    assert_eq!(challenge.status, ChallengeStatus::Verified);
    assert_eq!(test_deps.store.credentials().len(), 1);

    // Re-issuance alone recovers once the backing service is back.
    test_deps.session_backend.set_failing(false);
    let outcome = reissue_session(PHONE, &deps).await.unwrap();
    assert_eq!(outcome.identity.phone, PHONE);
    assert_eq!(outcome.identity.role, Role::Affiliate);

    // The synthetic address persisted on the first try is reused.
    let addresses = test_deps.session_backend.issued_for();
    assert_eq!(addresses, vec!["15551230001@login.vitrina.app".to_string()]);
    let credential = &test_deps.store.credentials()[0];
    assert_eq!(
        credential.synthetic_address.as_deref(),
        Some("15551230001@login.vitrina.app")
    );
}

#[tokio::test]
async fn reissue_requires_a_verified_unexpired_challenge() {
    let test_deps = TestDependencies::new();
    let deps = test_deps.server_deps_without_provider();

    let err = reissue_session(PHONE, &deps).await.unwrap_err();
    assert!(matches!(err, AuthError::ChallengeNotFound));

    // An active challenge is not enough either.
    seed_challenge(&test_deps, None).await;
    let err = reissue_session(PHONE, &deps).await.unwrap_err();
    assert!(matches!(err, AuthError::ChallengeNotFound));
}

#[tokio::test]
async fn synthetic_address_is_stable_across_issuances() {
    let test_deps = TestDependencies::new();
    seed_challenge(&test_deps, None).await;
    let deps = test_deps.server_deps_without_provider();

    let first = verify_code(PHONE, CODE, Role::Affiliate, &deps)
        .await
        .unwrap();
    let second = reissue_session(PHONE, &deps).await.unwrap();

    assert_eq!(
        first.session.exchange_address,
        second.session.exchange_address
    );
    let addresses = test_deps.session_backend.issued_for();
    assert_eq!(addresses.len(), 2);
    assert_eq!(addresses[0], addresses[1]);
}

#[tokio::test]
async fn request_code_creates_an_active_challenge_and_delivers() {
    let test_deps = TestDependencies::new();
    let deps = test_deps.server_deps_without_provider();

    let outcome = request_code("0501234567", "login", &deps).await.unwrap();
    assert_eq!(outcome.challenge.phone, "+966501234567");
    assert_eq!(outcome.challenge.status, ChallengeStatus::Active);
    assert!(!outcome.is_existing_user);

    let sent = test_deps.delivery.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].phone, "+966501234567");
    assert_eq!(sent[0].code.len(), 6);
    assert_eq!(sent[0].code, outcome.challenge.code);
}

#[tokio::test]
async fn request_code_within_cooldown_is_rejected() {
    let test_deps = TestDependencies::new();
    let deps = test_deps.server_deps_without_provider();

    request_code("+966501234567", "login", &deps).await.unwrap();
    let err = request_code("+966501234567", "login", &deps)
        .await
        .unwrap_err();
    match err {
        AuthError::CooldownActive { retry_after_secs } => {
            assert!(retry_after_secs >= 1);
            assert!(retry_after_secs <= 60);
        }
        other => panic!("expected CooldownActive, got {other:?}"),
    }

    // The original challenge stays live.
    let challenges = test_deps.store.challenges();
    assert_eq!(challenges.len(), 1);
    assert_eq!(challenges[0].status, ChallengeStatus::Active);
}

#[tokio::test]
async fn a_new_code_supersedes_the_previous_active_challenge() {
    let test_deps = TestDependencies::new().with_settings(AuthSettings {
        resend_cooldown: chrono::Duration::zero(),
        ..AuthSettings::default()
    });
    let deps = test_deps.server_deps_without_provider();

    let first = request_code("+966501234567", "login", &deps).await.unwrap();
    let second = request_code("+966501234567", "login", &deps).await.unwrap();
    assert_ne!(first.challenge.id, second.challenge.id);

    let challenges = test_deps.store.challenges();
    assert_eq!(challenges.len(), 2);
    let active: Vec<_> = challenges
        .iter()
        .filter(|c| c.status == ChallengeStatus::Active)
        .collect();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].id, second.challenge.id);
}

#[tokio::test]
async fn request_code_reports_existing_users() {
    let test_deps = TestDependencies::new();
    let deps = test_deps.server_deps_without_provider();

    // First sign-in provisions the identity and consumes the challenge, so
    // the follow-up request is not under cooldown.
    seed_challenge(&test_deps, None).await;
    verify_code(PHONE, CODE, Role::Merchant, &deps).await.unwrap();

    let outcome = request_code(PHONE, "login", &deps).await.unwrap();
    assert!(outcome.is_existing_user);
    assert_eq!(outcome.existing_role, Some(Role::Merchant));
}

#[tokio::test]
async fn request_code_rejects_invalid_phones() {
    let test_deps = TestDependencies::new();
    let deps = test_deps.server_deps_without_provider();

    let err = request_code("not-a-phone", "login", &deps).await.unwrap_err();
    assert!(matches!(err, AuthError::InvalidPhone));
    assert!(test_deps.store.challenges().is_empty());
}

#[tokio::test]
async fn delivery_failure_keeps_the_challenge_redeemable() {
    let test_deps = TestDependencies::new();
    test_deps.delivery.set_failing(true);
    let deps = test_deps.server_deps_without_provider();

    let outcome = request_code("+966501234567", "login", &deps).await.unwrap();
    assert_eq!(outcome.challenge.status, ChallengeStatus::Active);

    // The flow depends on the record, not on delivery.
    let outcome = verify_code(
        "+966501234567",
        &outcome.challenge.code,
        Role::Affiliate,
        &deps,
    )
    .await
    .unwrap();
    assert_eq!(outcome.identity.phone, "+966501234567");
}

#[tokio::test]
async fn mixed_phone_spellings_hit_the_same_challenge() {
    let test_deps = TestDependencies::new();
    let deps = test_deps.server_deps_without_provider();

    let outcome = request_code("0501234567", "login", &deps).await.unwrap();
    let code = outcome.challenge.code.clone();

    // Verify with a differently spelled but equivalent number.
    let outcome = verify_code("+966 50 123 4567", &code, Role::Affiliate, &deps)
        .await
        .unwrap();
    assert_eq!(outcome.identity.phone, "+966501234567");
}
