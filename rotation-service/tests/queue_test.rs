mod common;

use common::{days_ago, today, TestApp, ACCOUNT_ID};
use rotation_service::handlers::{self, SqsEvent};
use rotation_service::models::{CLI_TIME_LIMIT_TAG, EMAIL_TAG};
use rotation_service::services::Severity;
use service_core::error::AppError;

// =============================================================================
// Producer
// =============================================================================

#[tokio::test]
async fn scan_enqueues_only_due_users() {
    let app = TestApp::new();
    app.add_tagged_user("alice");
    app.add_key("alice", "AKIAALICE", 90);
    app.add_tagged_user("bob");
    app.add_key("bob", "AKIABOB", 3);
    app.directory.add_user("svc-ci");
    app.add_key("svc-ci", "AKIACI", 900);

    let summary = handlers::scan(&app.state, today()).await.unwrap();

    assert_eq!(summary.users, 3);
    assert_eq!(summary.enqueued, 1);
    assert_eq!(summary.skipped, 2);
    assert_eq!(summary.rotated, 0);

    let pending = app.queue.pending_requests();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].user_name(), "alice");
    assert_eq!(pending[0].email(), Some("alice@example.com"));
    assert_eq!(pending[0].cli_time_limit(), Some(60));
    assert!(!pending[0].force());

    // Nothing rotates before the consumer runs.
    assert!(app.directory.deleted_keys().is_empty());
}

#[tokio::test]
async fn scan_without_queue_fails_before_listing_users() {
    let app = TestApp::new().without_queue();
    app.add_tagged_user("alice");

    let err = handlers::scan(&app.state, today()).await.unwrap_err();

    assert!(matches!(err, AppError::ConfigError(_)));
    assert_eq!(app.directory.report_requests(), 0);
}

// =============================================================================
// Consumer
// =============================================================================

#[tokio::test]
async fn consume_rotates_and_acknowledges_scanned_requests() {
    let app = TestApp::new();
    for name in ["alice", "bob", "carol"] {
        app.add_tagged_user(name);
        app.add_key(name, &format!("AKIA{}", name.to_uppercase()), 120);
    }

    handlers::scan(&app.state, today()).await.unwrap();
    assert_eq!(app.queue.pending_len(), 3);

    let summary = handlers::consume(&app.state, today()).await.unwrap();

    assert_eq!(summary.rotated, 3);
    assert_eq!(app.queue.pending_len(), 0);
    assert_eq!(app.queue.in_flight_len(), 0);
    assert_eq!(app.queue.acknowledged().len(), 3);
    assert_eq!(app.mailer.sent().len(), 3);
    assert_eq!(app.directory.access_key_ids("alice").len(), 1);
    assert_ne!(app.directory.access_key_ids("alice")[0], "AKIAALICE");
}

#[tokio::test]
async fn consumer_re_evaluates_before_rotating() {
    let app = TestApp::new();
    app.add_tagged_user("bob");
    app.add_key("bob", "AKIABOB", 10);
    app.queue.push_raw(
        r#"{"user_name":"bob","email":"bob@example.com","cli_time_limit":90,"login_profile_time_limit":90}"#,
    );

    let summary = handlers::consume(&app.state, today()).await.unwrap();

    assert_eq!(summary.skipped, 1);
    assert!(app.directory.deleted_keys().is_empty());
    assert_eq!(app.queue.acknowledged().len(), 1);
}

#[tokio::test]
async fn directory_email_overrides_queued_email() {
    let app = TestApp::new();
    app.add_tagged_user("alice");
    app.add_key("alice", "AKIAALICE", 100);
    app.queue.push_raw(
        r#"{"user_name":"alice","email":"attacker@example.com","cli_time_limit":30,"login_profile_time_limit":30}"#,
    );

    handlers::consume(&app.state, today()).await.unwrap();

    let sent = app.mailer.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "alice@example.com");
}

#[tokio::test]
async fn user_removed_after_scan_is_skipped() {
    let app = TestApp::new();
    app.add_tagged_user("alice");
    app.add_key("alice", "AKIAALICE", 90);

    handlers::scan(&app.state, today()).await.unwrap();
    app.directory.remove_user("alice");

    let summary = handlers::consume(&app.state, today()).await.unwrap();

    assert_eq!(summary.skipped, 1);
    assert!(app.directory.deleted_keys().is_empty());
    assert_eq!(app.queue.acknowledged().len(), 1);
}

#[tokio::test]
async fn malformed_messages_are_alerted_and_dropped() {
    let app = TestApp::new();
    app.queue.push_raw("not json");
    app.queue.push_raw(r#"{"user_name":"alice"}"#);

    let summary = handlers::consume(&app.state, today()).await.unwrap();

    assert_eq!(summary.failed, 2);
    assert_eq!(app.queue.acknowledged().len(), 2);

    let errors = app.alerts.messages_with(Severity::Error);
    assert_eq!(errors.len(), 2);
    assert!(errors[0].contains("for user <unknown>"));
    assert!(errors[1].contains("for user alice"));
    assert!(errors[1].contains("while request_built"));
}

#[tokio::test]
async fn consume_on_empty_queue_is_a_no_op() {
    let app = TestApp::new();

    let summary = handlers::consume(&app.state, today()).await.unwrap();

    assert_eq!(summary.users, 0);
    assert_eq!(
        app.alerts.messages_with(Severity::Info),
        vec![format!(
            "IAM credential consume for account {} finished: 0 users, 0 enqueued, 0 rotated, 0 skipped, 0 failed",
            ACCOUNT_ID
        )]
    );
}

#[tokio::test]
async fn event_records_are_processed_without_the_queue() {
    let app = TestApp::new().without_queue();
    app.add_tagged_user("alice");
    app.directory.set_login_profile("alice", days_ago(70));

    let event = SqsEvent::from_json(
        r#"{"Records":[
            {"messageId":"m-1","body":"{\"user_name\":\"alice\",\"cli_time_limit\":60,\"login_profile_time_limit\":60}"},
            {"messageId":"m-2","body":"{\"user_name\":\"ghost\",\"force\":true}"}
        ]}"#,
    )
    .unwrap();

    let summary = handlers::handle_event(&app.state, &event, today())
        .await
        .unwrap();

    assert_eq!(summary.users, 2);
    assert_eq!(summary.rotated, 1);
    assert_eq!(summary.skipped, 1);
    assert_eq!(app.directory.password_updates().len(), 1);
}

// =============================================================================
// Manual requests
// =============================================================================

#[tokio::test]
async fn forced_request_rotates_only_existing_credentials() {
    let app = TestApp::new();
    app.add_tagged_user("carol");
    app.add_key("carol", "AKIACAROL", 1);

    let request = handlers::enqueue_request(&app.state, "carol", true)
        .await
        .unwrap();
    assert!(request.force());
    assert_eq!(app.queue.pending_len(), 1);

    let summary = handlers::consume(&app.state, today()).await.unwrap();

    assert_eq!(summary.rotated, 1);
    assert!(app.directory.password_updates().is_empty());
    assert_eq!(
        app.directory.deleted_keys(),
        vec![("carol".to_string(), "AKIACAROL".to_string())]
    );

    let sent = app.mailer.sent();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].body_text.contains("Your new Command LIne Access:"));
    assert!(!sent[0].body_text.contains("Console Access"));
}

#[tokio::test]
async fn request_for_untagged_user_is_rejected() {
    let app = TestApp::new();
    app.directory.add_user("svc-ci");

    let err = handlers::enqueue_request(&app.state, "svc-ci", false)
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::ValidationError(_)));
    assert_eq!(app.queue.pending_len(), 0);
}

#[tokio::test]
async fn request_for_unverified_email_is_rejected() {
    let app = TestApp::new();
    app.directory.add_user("dave");
    app.directory
        .set_tag("dave", EMAIL_TAG, "dave@unverified.org");
    app.directory.set_tag("dave", CLI_TIME_LIMIT_TAG, "1");

    let err = handlers::enqueue_request(&app.state, "dave", true)
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::UnverifiedEmail(_)));
    assert_eq!(app.queue.pending_len(), 0);
    assert_eq!(app.alerts.messages_with(Severity::Warn).len(), 1);
}
