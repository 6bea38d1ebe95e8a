//! Security tests: credential checks and secret storage
//!
//! Tests credential handling including:
//! - Authentication outcomes (match, mismatch, unknown user)
//! - Secret rotation through update_user
//! - Password edge cases (empty, unicode, case)
//! - Secrets never stored in clear

use confvault::ErrorKind;

use crate::helpers::*;

// ===== AUTHENTICATION OUTCOMES =====

#[tokio::test]
async fn test_authenticate_correct_secret() {
    let users = user_store_with_user("alice", "secret").await;
    assert!(users.authenticate_user("alice", "secret").await.unwrap());
}

#[tokio::test]
async fn test_authenticate_wrong_secret() {
    let users = user_store_with_user("alice", "secret").await;
    let err = users.authenticate_user("alice", "wrong").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidCredential);
}

#[tokio::test]
async fn test_authenticate_unknown_user() {
    let users = user_store().await;
    let err = users.authenticate_user("ghost", "secret").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_updated_secret_takes_effect() {
    let users = user_store_with_user("alice", "old").await;

    users
        .update_user("alice", "alice@example.com", "Alice", "new")
        .await
        .unwrap();

    let err = users.authenticate_user("alice", "old").await.unwrap_err();
    assert!(err.is_invalid_credential());
    assert!(users.authenticate_user("alice", "new").await.unwrap());
}

#[tokio::test]
async fn test_deleted_user_cannot_authenticate() {
    let users = user_store_with_user("alice", "secret").await;
    users.delete_user("alice").await.unwrap();

    let err = users.authenticate_user("alice", "secret").await.unwrap_err();
    assert!(err.is_not_found());
}

// ===== PASSWORD EDGE CASES =====

#[tokio::test]
async fn test_empty_password() {
    let users = user_store_with_user("alice", "").await;
    assert!(users.authenticate_user("alice", "").await.unwrap());
    assert!(users.authenticate_user("alice", " ").await.is_err());
}

#[tokio::test]
async fn test_case_sensitive_passwords() {
    let users = user_store_with_user("bob", "MyPassword").await;

    let result = users.authenticate_user("bob", "mypassword").await;
    assert!(result.is_err(), "Passwords should be case-sensitive");

    let result = users.authenticate_user("bob", "MYPASSWORD").await;
    assert!(result.is_err(), "Passwords should be case-sensitive");
}

#[tokio::test]
async fn test_unicode_in_password() {
    let password = "пароль密码🔐";
    let users = user_store_with_user("alice", password).await;
    assert!(users.authenticate_user("alice", password).await.unwrap());
}

// ===== STORAGE =====

#[tokio::test]
async fn test_secret_not_stored_in_clear() {
    let users = user_store_with_user("alice", "plaintext-secret").await;

    let (hash,): (String,) =
        sqlx::query_as("SELECT password_hash FROM users WHERE user_id = $1")
            .bind("alice")
            .fetch_one(users.database().pool())
            .await
            .unwrap();

    assert!(!hash.contains("plaintext-secret"));
    assert!(hash.starts_with("$argon2id$"));
}

#[tokio::test]
async fn test_users_are_isolated() {
    let users = user_store_with_user("alice", "alice-pw").await;
    users
        .add_user("bob", "bob@example.com", "Bob", "bob-pw")
        .await
        .unwrap();

    assert!(users.authenticate_user("alice", "bob-pw").await.is_err());
    assert!(users.authenticate_user("bob", "alice-pw").await.is_err());
    assert!(users.authenticate_user("bob", "bob-pw").await.unwrap());
}
