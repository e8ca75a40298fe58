//! Integration tests for common Flaggr workflows.
//!
//! These tests drive the facade end to end over the in-memory store.

use flaggr::prelude::*;
use serde_json::json;

// =============================================================================
// Global Switch Tests
// =============================================================================

#[tokio::test]
async fn test_uploader_scenario() {
    let flaggr = Flaggr::in_memory();

    flaggr.add("uploader").await.unwrap();
    flaggr.enable("uploader").await.unwrap();
    assert!(
        flaggr
            .is_enabled_with("uploader", &EvaluationOptions::new())
            .await
            .unwrap()
    );

    flaggr.disable("uploader").await.unwrap();
    assert!(
        !flaggr
            .is_enabled_with("uploader", &EvaluationOptions::new())
            .await
            .unwrap()
    );
}

#[tokio::test]
async fn test_unknown_feature() {
    let flaggr = Flaggr::in_memory();

    assert!(!flaggr.is_enabled("never-added").await.unwrap());
    assert!(flaggr.get("never-added").await.unwrap().is_none());
    assert!(!flaggr.features().await.unwrap().contains(&"never-added".to_string()));
}

#[tokio::test]
async fn test_add_is_idempotent() {
    let flaggr = Flaggr::in_memory();

    flaggr.add("x").await.unwrap();
    flaggr.add("x").await.unwrap();

    assert_eq!(flaggr.features().await.unwrap(), vec!["x"]);
    assert!(flaggr.get("x").await.unwrap().unwrap().enabled);
}

#[tokio::test]
async fn test_features_are_listed_sorted() {
    let flaggr = Flaggr::in_memory();

    for name in ["search", "billing", "uploader"] {
        flaggr.add(name).await.unwrap();
    }

    assert_eq!(
        flaggr.features().await.unwrap(),
        vec!["billing", "search", "uploader"]
    );
}

// =============================================================================
// Group Tests
// =============================================================================

#[tokio::test]
async fn test_group_matching() {
    let flaggr = Flaggr::in_memory();
    flaggr
        .register_group("x", "admins", "admin", true)
        .await
        .unwrap();

    assert!(
        flaggr
            .is_enabled_for_group("x", "admins", &json!({"admin": true}))
            .await
            .unwrap()
    );
    assert!(
        !flaggr
            .is_enabled_for_group("x", "admins", &json!({"admin": false}))
            .await
            .unwrap()
    );
    assert!(
        !flaggr
            .is_enabled_for_group("x", "admins", &json!({}))
            .await
            .unwrap()
    );
}

#[tokio::test]
async fn test_global_switch_dominates_groups() {
    let flaggr = Flaggr::in_memory();
    let admin = json!({"admin": true});
    flaggr
        .register_group("x", "admins", "admin", true)
        .await
        .unwrap();

    flaggr.disable("x").await.unwrap();
    assert!(!flaggr.is_enabled_for_group("x", "admins", &admin).await.unwrap());

    flaggr.enable("x").await.unwrap();
    assert!(flaggr.is_enabled_for_group("x", "admins", &admin).await.unwrap());
}

#[tokio::test]
async fn test_group_toggle() {
    let flaggr = Flaggr::in_memory();
    let admin = json!({"admin": true});
    flaggr
        .register_group("x", "admins", "admin", true)
        .await
        .unwrap();

    assert!(flaggr.disable_group("x", "admins").await.unwrap());
    assert!(!flaggr.is_enabled_for_group("x", "admins", &admin).await.unwrap());

    assert!(flaggr.enable_group("x", "admins").await.unwrap());
    assert!(flaggr.is_enabled_for_group("x", "admins", &admin).await.unwrap());

    assert!(!flaggr.enable_group("x", "editors").await.unwrap());
}

#[tokio::test]
async fn test_cascade_delete() {
    let flaggr = Flaggr::in_memory();
    flaggr
        .register_group("x", "admins", "admin", true)
        .await
        .unwrap();

    flaggr.remove("x").await.unwrap();

    assert!(
        !flaggr
            .is_enabled_for_group("x", "admins", &json!({"admin": true}))
            .await
            .unwrap()
    );
    assert!(flaggr.features().await.unwrap().is_empty());

    // Removing again is not an error
    flaggr.remove("x").await.unwrap();
}

#[tokio::test]
async fn test_member_with_accessor() {
    let flaggr = Flaggr::in_memory();
    flaggr
        .register_group("beta", "paying", "plan.paid", true)
        .await
        .unwrap();

    let paying = Member::from_value(json!({"plan": {"paid": true}}));
    let trial = Member::new()
        .with_field("plan", json!({"paid": true}))
        .with_accessor("plan.paid", || false);

    assert!(flaggr.is_enabled_for_group("beta", "paying", &paying).await.unwrap());
    assert!(!flaggr.is_enabled_for_group("beta", "paying", &trial).await.unwrap());
}

// =============================================================================
// User Tests
// =============================================================================

#[tokio::test]
async fn test_user_round_trip() {
    let flaggr = Flaggr::in_memory();
    let user = User::new("1");

    assert!(flaggr.register_user("x", &user).await.unwrap());
    assert!(flaggr.is_enabled_for_user("x", &user).await.unwrap());

    assert!(flaggr.disable_user("x", &user).await.unwrap());
    assert!(!flaggr.is_enabled_for_user("x", &user).await.unwrap());

    assert!(flaggr.enable_user("x", &user).await.unwrap());
    assert!(flaggr.is_enabled_for_user("x", &user).await.unwrap());
}

#[tokio::test]
async fn test_unknown_user_is_off() {
    let flaggr = Flaggr::in_memory();
    flaggr.add("x").await.unwrap();

    let stranger = json!({"id": "nobody"});
    assert!(!flaggr.is_enabled_for_user("x", &stranger).await.unwrap());
    assert!(!flaggr.enable_user("x", &stranger).await.unwrap());
}

#[tokio::test]
async fn test_user_without_id_is_rejected() {
    let flaggr = Flaggr::in_memory();

    let err = flaggr
        .is_enabled_for_user("x", &json!({"email": "a@b.c"}))
        .await
        .unwrap_err();

    assert!(err.is_argument_error());
    assert!(matches!(err, FlagError::InvalidIdentity(_)));
}

// =============================================================================
// Argument and Lifecycle Tests
// =============================================================================

#[tokio::test]
async fn test_missing_argument_does_not_mutate() {
    let flaggr = Flaggr::in_memory();

    let err = flaggr
        .register_group("x", "admins", "", true)
        .await
        .unwrap_err();

    assert!(matches!(err, FlagError::MissingArgument("property")));
    assert!(flaggr.get("x").await.unwrap().is_none());
}

#[tokio::test]
async fn test_connect_from_config() {
    let config: FlaggrConfig = serde_json::from_value(json!({
        "adapter": "memory",
        "features": [{"name": "uploader", "enabled": false}]
    }))
    .unwrap();

    let flaggr = Flaggr::connect(config).await.unwrap();

    assert_eq!(flaggr.adapter_name(), "memory");
    assert!(!flaggr.is_enabled("uploader").await.unwrap());
}

#[tokio::test]
async fn test_connect_unknown_adapter() {
    let config = FlaggrConfig {
        adapter: "etcd".to_string(),
        ..Default::default()
    };

    let err = Flaggr::connect(config).await.unwrap_err();
    assert_eq!(err.to_string(), "Configuration error: Could not find adapter etcd");
}

#[tokio::test]
async fn test_disconnect() {
    let flaggr = Flaggr::in_memory();
    flaggr.add("x").await.unwrap();

    flaggr.disconnect().await.unwrap();
    flaggr.disconnect().await.unwrap();

    assert!(matches!(
        flaggr.is_enabled("x").await,
        Err(FlagError::Disconnected)
    ));
}

#[tokio::test]
async fn test_clones_share_state() {
    let flaggr = Flaggr::in_memory();
    let other = flaggr.clone();

    flaggr.add("x").await.unwrap();
    other.disable("x").await.unwrap();

    assert!(!flaggr.is_enabled("x").await.unwrap());
}
