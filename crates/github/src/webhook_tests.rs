use bridge::WorkflowAction;
use http::HeaderValue;

use super::*;

const QUEUED_BODY: &str = r#"{"action":"queued","workflow_job":{"id":1,"labels":["self-hosted"]},"organization":{"login":"acme"}}"#;

fn secret() -> WebhookSecret {
    WebhookSecret::new("s3cr3t").unwrap()
}

fn sha1_signature(secret: &[u8], body: &[u8]) -> String {
    let mut mac = <HmacSha1 as Mac>::new_from_slice(secret).unwrap();
    mac.update(body);
    format!("sha1={}", hex::encode(mac.finalize().into_bytes()))
}

fn headers(pairs: &[(&'static str, &str)]) -> HeaderMap {
    let mut map = HeaderMap::new();
    for (name, value) in pairs {
        map.insert(*name, HeaderValue::from_str(value).unwrap());
    }
    map
}

#[test]
fn test_webhook_secret_rejects_empty() {
    assert!(WebhookSecret::new("").is_none());
    assert_eq!(format!("{:?}", secret()), "WebhookSecret(<redacted>)");
}

#[test]
fn test_sign_sha256_matches_known_vector() {
    // Reference value from GitHub's "Validating webhook deliveries" guide.
    let secret = WebhookSecret::new("It's a Secret to Everybody").unwrap();

    assert_eq!(
        sign_sha256(&secret, b"Hello, World!"),
        "sha256=757107ea0eb2509fc211221cce984b8a37570b6d7586c22c46f4379c8b043e17"
    );
}

#[test]
fn test_validate_accepts_valid_sha256_signature() {
    let body = Bytes::from_static(QUEUED_BODY.as_bytes());
    let signature = sign_sha256(&secret(), &body);
    let headers = headers(&[
        (SIGNATURE_256_HEADER, signature.as_str()),
        ("content-type", "application/json"),
    ]);

    let payload = SignatureValidator::new(secret())
        .validate(&headers, &body)
        .unwrap();

    assert_eq!(payload, body);
}

#[test]
fn test_validate_accepts_legacy_sha1_signature() {
    let body = Bytes::from_static(QUEUED_BODY.as_bytes());
    let signature = sha1_signature(b"s3cr3t", &body);
    let headers = headers(&[
        (SIGNATURE_SHA1_HEADER, signature.as_str()),
        ("content-type", "application/json"),
    ]);

    assert!(SignatureValidator::new(secret())
        .validate(&headers, &body)
        .is_ok());
}

#[test]
fn test_validate_prefers_sha256_over_sha1() {
    let body = Bytes::from_static(QUEUED_BODY.as_bytes());
    let good_sha1 = sha1_signature(b"s3cr3t", &body);
    let bad_sha256 = sign_sha256(&WebhookSecret::new("other").unwrap(), &body);
    let headers = headers(&[
        (SIGNATURE_256_HEADER, bad_sha256.as_str()),
        (SIGNATURE_SHA1_HEADER, good_sha1.as_str()),
    ]);

    let err = SignatureValidator::new(secret())
        .validate(&headers, &body)
        .unwrap_err();

    assert!(matches!(err, WebhookError::InvalidSignature { .. }));
}

#[test]
fn test_validate_missing_signature() {
    let body = Bytes::from_static(QUEUED_BODY.as_bytes());

    let err = SignatureValidator::new(secret())
        .validate(&HeaderMap::new(), &body)
        .unwrap_err();

    assert_eq!(err, WebhookError::MissingSignature);
}

#[test]
fn test_validate_rejects_signature_for_other_body() {
    let body = Bytes::from_static(QUEUED_BODY.as_bytes());
    let signature = sign_sha256(&secret(), b"{}");
    let headers = headers(&[(SIGNATURE_256_HEADER, signature.as_str())]);

    let err = SignatureValidator::new(secret())
        .validate(&headers, &body)
        .unwrap_err();

    assert!(matches!(err, WebhookError::InvalidSignature { .. }));
}

#[test]
fn test_validate_rejects_undecodable_signatures() {
    let body = Bytes::from_static(QUEUED_BODY.as_bytes());
    let validator = SignatureValidator::new(secret());

    for bad in ["md5=abcd", "sha256=not-hex", "sha256=", "deadbeef"] {
        let headers = headers(&[(SIGNATURE_256_HEADER, bad)]);
        let err = validator.validate(&headers, &body).unwrap_err();
        assert!(
            matches!(err, WebhookError::InvalidSignature { .. }),
            "{bad} gave {err:?}"
        );
    }
}

#[test]
fn test_validate_extracts_form_encoded_payload() {
    let form: String = url::form_urlencoded::Serializer::new(String::new())
        .append_pair("payload", QUEUED_BODY)
        .finish();
    let body = Bytes::from(form);
    let signature = sign_sha256(&secret(), &body);
    let headers = headers(&[
        (SIGNATURE_256_HEADER, signature.as_str()),
        ("content-type", "application/x-www-form-urlencoded"),
    ]);

    let payload = SignatureValidator::new(secret())
        .validate(&headers, &body)
        .unwrap();

    assert_eq!(payload, Bytes::from_static(QUEUED_BODY.as_bytes()));
}

#[test]
fn test_validate_rejects_unsupported_content_type_after_signature_check() {
    let body = Bytes::from_static(b"<xml/>");
    let signature = sign_sha256(&secret(), &body);
    let headers = headers(&[
        (SIGNATURE_256_HEADER, signature.as_str()),
        ("content-type", "text/xml"),
    ]);

    let err = SignatureValidator::new(secret())
        .validate(&headers, &body)
        .unwrap_err();

    assert!(matches!(err, WebhookError::MalformedPayload { .. }));
}

#[test]
fn test_validate_rejects_missing_content_type() {
    let body = Bytes::from_static(QUEUED_BODY.as_bytes());
    let signature = sign_sha256(&secret(), &body);
    let validator = SignatureValidator::new(secret());

    for content_type in [None, Some(""), Some("; charset=utf-8")] {
        let mut headers = headers(&[(SIGNATURE_256_HEADER, signature.as_str())]);
        if let Some(value) = content_type {
            headers.insert("content-type", HeaderValue::from_static(value));
        }

        let err = validator.validate(&headers, &body).unwrap_err();
        assert!(
            matches!(err, WebhookError::MalformedPayload { .. }),
            "{content_type:?} gave {err:?}"
        );
    }
}

#[test]
fn test_validate_accepts_json_with_charset() {
    let body = Bytes::from_static(QUEUED_BODY.as_bytes());
    let signature = sign_sha256(&secret(), &body);
    let headers = headers(&[
        (SIGNATURE_256_HEADER, signature.as_str()),
        ("content-type", "Application/JSON; charset=utf-8"),
    ]);

    let payload = SignatureValidator::new(secret())
        .validate(&headers, &body)
        .unwrap();

    assert_eq!(payload, body);
}

#[test]
fn test_parse_workflow_job_rejects_empty_identifiers() {
    let headers = headers(&[(EVENT_HEADER, "workflow_job")]);

    let bodies: [&[u8]; 2] = [
        br#"{"action":"queued","workflow_job":{"id":1,"labels":[""]},"organization":{"login":"acme"}}"#,
        br#"{"action":"queued","workflow_job":{"id":1,"labels":["self-hosted"]},"organization":{"login":""}}"#,
    ];
    for body in bodies {
        let err = parse_workflow_job(&headers, body).unwrap_err();
        assert!(matches!(err, WebhookError::MalformedPayload { .. }));
    }
}

#[test]
fn test_parse_workflow_job_decodes_queued_event() {
    let headers = headers(&[(EVENT_HEADER, "workflow_job")]);

    let event = parse_workflow_job(&headers, QUEUED_BODY.as_bytes()).unwrap();

    assert_eq!(event.action, WorkflowAction::Queued);
    assert_eq!(event.workflow_job.id.as_u64(), 1);
    assert_eq!(event.org_login().unwrap().as_str(), "acme");
}

#[test]
fn test_parse_workflow_job_rejects_other_event_types() {
    let err = parse_workflow_job(&headers(&[(EVENT_HEADER, "ping")]), b"{}").unwrap_err();
    assert_eq!(
        err,
        WebhookError::UnsupportedEventType {
            event_type: "ping".to_string()
        }
    );

    let err = parse_workflow_job(&HeaderMap::new(), QUEUED_BODY.as_bytes()).unwrap_err();
    assert!(matches!(err, WebhookError::UnsupportedEventType { .. }));
}

#[test]
fn test_parse_workflow_job_reports_malformed_payload() {
    let headers = headers(&[(EVENT_HEADER, "workflow_job")]);

    let bodies: [&[u8]; 3] = [
        b"not json",
        br#"{"action":"queued"}"#,
        br#"{"action":1,"workflow_job":{"id":1}}"#,
    ];
    for body in bodies {
        let err = parse_workflow_job(&headers, body).unwrap_err();
        assert!(matches!(err, WebhookError::MalformedPayload { .. }));
    }
}

#[test]
fn test_delivery_id_reads_header() {
    let headers = headers(&[(DELIVERY_HEADER, "72d3162e-cc78-11e3-81ab-4c9367dc0958")]);

    assert_eq!(
        delivery_id(&headers).unwrap().as_str(),
        "72d3162e-cc78-11e3-81ab-4c9367dc0958"
    );
    assert!(delivery_id(&HeaderMap::new()).is_none());
}
