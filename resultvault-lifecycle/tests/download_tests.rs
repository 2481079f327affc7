mod support;

use pretty_assertions::assert_eq;
use resultvault_crypto::{AccessTokenService, AeadCipher, TokenTtls};
use resultvault_lifecycle::{
    DownloadService, INVALID_LINK_MESSAGE, LifecycleConfig, LifecycleError,
};
use support::{Harness, REPORT};

const ORDER: &str = "ORD-42";

async fn harness_with_report() -> (Harness, String) {
    let h = Harness::encrypted();
    let outcome = h.coordinator.replace_result(ORDER, REPORT).await.unwrap();
    (h, outcome.password)
}

fn assert_invalid_link(result: Result<impl std::fmt::Debug, LifecycleError>) {
    match result {
        Err(err @ LifecycleError::InvalidLink) => {
            assert_eq!(err.user_message(), INVALID_LINK_MESSAGE);
        }
        other => panic!("expected InvalidLink, got {other:?}"),
    }
}

// ── Customer links ──

#[tokio::test]
async fn customer_link_with_password_returns_plaintext() {
    let (h, password) = harness_with_report().await;
    let token = h.downloads.issue_customer_link(ORDER).unwrap();

    let result = h.downloads.open(&token, Some(&password)).await.unwrap();
    assert_eq!(result.order_id, ORDER);
    assert_eq!(result.bytes, REPORT);
    assert!(result.was_encrypted);
    assert!(!result.admin_access);
}

#[tokio::test]
async fn password_input_is_normalized() {
    let (h, password) = harness_with_report().await;
    let token = h.downloads.issue_customer_link(ORDER).unwrap();
    let typed = format!(" {} ", password.replace('-', "").to_lowercase());

    assert!(h.downloads.open(&token, Some(&typed)).await.is_ok());
}

#[tokio::test]
async fn wrong_or_missing_password_rejected() {
    let (h, _) = harness_with_report().await;
    let token = h.downloads.issue_customer_link(ORDER).unwrap();
    let other_orders = h.coordinator.password_for("ORD-43");

    assert_invalid_link(h.downloads.open(&token, None).await);
    assert_invalid_link(h.downloads.open(&token, Some("")).await);
    assert_invalid_link(h.downloads.open(&token, Some(&other_orders)).await);
}

// ── Admin links ──

#[tokio::test]
async fn admin_link_skips_password() {
    let (h, _) = harness_with_report().await;
    let token = h.downloads.issue_admin_link(ORDER).unwrap();

    let result = h.downloads.open(&token, None).await.unwrap();
    assert!(result.admin_access);
    assert_eq!(result.bytes, REPORT);
}

// ── Token failures ──

#[tokio::test]
async fn garbage_token_rejected() {
    let (h, password) = harness_with_report().await;
    assert_invalid_link(h.downloads.open("not-a-token", Some(&password)).await);
    assert_invalid_link(h.downloads.open("", Some(&password)).await);
}

#[tokio::test]
async fn expired_token_rejected() {
    let (h, _) = harness_with_report().await;
    let signer = AccessTokenService::new(support::TOKEN_SECRET.as_bytes(), TokenTtls::default())
        .unwrap();
    let stale = signer.issue_at(ORDER, 1, true, 1_000).unwrap();

    assert_invalid_link(h.downloads.open(&stale, None).await);
}

#[tokio::test]
async fn token_signed_with_other_secret_rejected() {
    let (h, _) = harness_with_report().await;
    let forger = AccessTokenService::new(b"other", TokenTtls::default()).unwrap();
    let forged = forger.issue(ORDER, 60, true).unwrap();

    assert_invalid_link(h.downloads.open(&forged, None).await);
}

#[tokio::test]
async fn order_without_result_looks_like_bad_link() {
    let h = Harness::encrypted();
    let token = h.downloads.issue_admin_link("ORD-404").unwrap();
    assert_invalid_link(h.downloads.open(&token, None).await);
}

// ── Storage failures ──

#[tokio::test]
async fn tampered_object_fails_authentication() {
    let (h, password) = harness_with_report().await;
    let pointer = h.coordinator.current_result(ORDER).await.unwrap().unwrap();

    let stored = h.storage.object(&pointer.path).await.unwrap();
    let mut json: serde_json::Value = serde_json::from_slice(&stored).unwrap();
    let data = json["data"].as_str().unwrap().to_string();
    let swapped = if data.starts_with('A') { "B" } else { "A" };
    json["data"] = format!("{swapped}{}", &data[1..]).into();
    h.storage
        .insert(&pointer.path, serde_json::to_vec(&json).unwrap(), "application/octet-stream")
        .await;

    let token = h.downloads.issue_customer_link(ORDER).unwrap();
    let err = h.downloads.open(&token, Some(&password)).await.unwrap_err();
    assert!(matches!(err, LifecycleError::AuthenticationFailed), "got {err:?}");
}

#[tokio::test]
async fn swapped_object_fails_metadata_check() {
    let (h, _) = harness_with_report().await;
    let pointer = h.coordinator.current_result(ORDER).await.unwrap().unwrap();

    // Valid ciphertext for the same order, but not the one recorded.
    let cipher = AeadCipher::new(support::MASTER_SECRET.as_bytes()).unwrap();
    let other = cipher.encrypt(b"someone else's report", ORDER).unwrap();
    h.storage
        .insert(&pointer.path, other.to_bytes().unwrap(), "application/octet-stream")
        .await;

    let token = h.downloads.issue_admin_link(ORDER).unwrap();
    let err = h.downloads.open(&token, None).await.unwrap_err();
    assert!(matches!(err, LifecycleError::AuthenticationFailed), "got {err:?}");
}

#[tokio::test]
async fn missing_object_is_not_found() {
    let (h, _) = harness_with_report().await;
    let pointer = h.coordinator.current_result(ORDER).await.unwrap().unwrap();
    assert!(h.storage.remove(&pointer.path).await);

    let token = h.downloads.issue_admin_link(ORDER).unwrap();
    let err = h.downloads.open(&token, None).await.unwrap_err();
    assert!(matches!(err, LifecycleError::NotFound(_)), "got {err:?}");
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn storage_outage_is_unavailable() {
    let (h, _) = harness_with_report().await;
    h.storage.set_fail_gets(true);

    let token = h.downloads.issue_admin_link(ORDER).unwrap();
    let err = h.downloads.open(&token, None).await.unwrap_err();
    assert!(matches!(err, LifecycleError::StorageUnavailable { .. }), "got {err:?}");
    assert_ne!(err.user_message(), INVALID_LINK_MESSAGE);
}

// ── Plaintext mode ──

#[tokio::test]
async fn plaintext_results_are_served_as_stored() {
    let h = Harness::new(support::plaintext_config());
    let outcome = h.coordinator.replace_result(ORDER, REPORT).await.unwrap();
    let token = h.downloads.issue_customer_link(ORDER).unwrap();

    let result = h.downloads.open(&token, Some(&outcome.password)).await.unwrap();
    assert_eq!(result.bytes, REPORT);
    assert!(!result.was_encrypted);
}

#[tokio::test]
async fn encrypted_results_survive_disabling_encryption() {
    let (h, password) = harness_with_report().await;
    let config = LifecycleConfig {
        encryption_enabled: false,
        ..support::test_config()
    };
    let downloads = DownloadService::new(&config, h.storage.clone(), h.records.clone()).unwrap();

    let token = downloads.issue_admin_link(ORDER).unwrap();
    let result = downloads.open(&token, None).await.unwrap();
    assert_eq!(result.bytes, REPORT);
    assert!(result.was_encrypted);

    let token = downloads.issue_customer_link(ORDER).unwrap();
    assert!(downloads.open(&token, Some(&password)).await.is_ok());
}
