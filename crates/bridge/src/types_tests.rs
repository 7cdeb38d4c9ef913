use chrono::{Duration, TimeZone, Utc};

use super::*;

fn token_expiring_at(expires_at: DateTime<Utc>) -> RegistrationToken {
    RegistrationToken::new(
        OrgLogin::new("acme").unwrap(),
        TokenSecret::new("AABF3JGZDX3P5PMEXLND6TS6FCWO6"),
        expires_at,
    )
}

#[test]
fn test_token_usable_well_before_expiry() {
    let now = Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap();
    let token = token_expiring_at(now + Duration::hours(1));

    assert!(token.is_usable_at(now));
}

#[test]
fn test_token_unusable_inside_safety_margin() {
    let now = Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap();
    let token = token_expiring_at(now + Duration::minutes(4));

    assert!(!token.is_usable_at(now));
}

#[test]
fn test_token_unusable_exactly_at_margin_boundary() {
    let now = Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap();
    let token = token_expiring_at(now + safety_margin());

    assert!(!token.is_usable_at(now));
    assert!(token.is_usable_at(now - Duration::seconds(1)));
}

#[test]
fn test_token_secret_is_redacted() {
    let token = token_expiring_at(Utc::now());

    let debug = format!("{token:?}");
    assert!(!debug.contains("AABF3JGZDX3P5PMEXLND6TS6FCWO6"));
    assert_eq!(token.secret().to_string(), "<redacted>");
    assert_eq!(token.secret().expose(), "AABF3JGZDX3P5PMEXLND6TS6FCWO6");
}

#[test]
fn test_workflow_action_known_and_unknown_values() {
    assert_eq!(WorkflowAction::from("queued".to_string()), WorkflowAction::Queued);
    assert_eq!(
        WorkflowAction::from("in_progress".to_string()),
        WorkflowAction::InProgress
    );
    assert_eq!(
        WorkflowAction::from("requested_review".to_string()),
        WorkflowAction::Other("requested_review".to_string())
    );
    assert_eq!(WorkflowAction::Other("x".into()).as_str(), "x");
}

#[test]
fn test_workflow_job_event_decodes_minimal_payload() {
    let body = r#"{"action":"queued","workflow_job":{"id":1,"labels":["self-hosted"]},"organization":{"login":"acme"}}"#;

    let event: WorkflowJobEvent = serde_json::from_str(body).unwrap();

    assert_eq!(event.action, WorkflowAction::Queued);
    assert_eq!(event.workflow_job.id, JobId::new(1));
    assert_eq!(event.workflow_job.labels.len(), 1);
    assert_eq!(event.org_login().map(|o| o.as_str()), Some("acme"));
    assert!(event.repository.is_none());
    assert!(event.sender.is_none());
}

#[test]
fn test_workflow_job_event_ignores_unknown_fields_and_nulls() {
    let body = r#"{
        "action": "completed",
        "brand_new_field": {"nested": true},
        "workflow_job": {
            "id": 29679449,
            "run_id": 940463255,
            "runner_name": null,
            "conclusion": "success",
            "labels": ["gpu", "linux"]
        },
        "repository": {"full_name": "acme/widgets", "private": true},
        "sender": {"login": "octocat", "id": 1}
    }"#;

    let event: WorkflowJobEvent = serde_json::from_str(body).unwrap();

    assert_eq!(event.action, WorkflowAction::Completed);
    assert_eq!(event.workflow_job.run_id, Some(RunId::new(940463255)));
    assert!(event.workflow_job.runner_name.is_none());
    assert!(event.organization.is_none());
    assert_eq!(
        event.repository.unwrap().full_name.as_str(),
        "acme/widgets"
    );
}

#[test]
fn test_provision_request_command_embeds_org_url_and_token() {
    let request = ProvisionRequest::for_runner(
        AppName::new("runners").unwrap(),
        &OrgLogin::new("acme").unwrap(),
        &TokenSecret::new("tok-123"),
    );

    assert_eq!(
        request.command(),
        "./config.sh --unattended --ephemeral --url https://github.com/acme --token tok-123 && ./run.sh"
    );
    assert!(!request.attach());
    assert!(!format!("{request:?}").contains("tok-123"));
}
