// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn envelope_404_maps_to_instance_not_found() {
    let body = r#"{"errors": [{"code": "NotFoundHttpException", "status": "404", "detail": "gone"}]}"#;
    let err = RemoteError::from_response(404, body);
    assert!(matches!(err, RemoteError::InstanceNotFound));
}

#[test]
fn envelope_fields_are_carried() {
    let body = r#"{"errors": [{"code": "ValidationException", "status": "422", "detail": "bad size"}]}"#;
    match RemoteError::from_response(422, body) {
        RemoteError::Api { code, status, detail, http_status } => {
            assert_eq!(code, "ValidationException");
            assert_eq!(status, "422");
            assert_eq!(detail, "bad size");
            assert_eq!(http_status, 422);
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn garbage_body_still_reports_http_status() {
    match RemoteError::from_response(500, "<html>oops</html>") {
        RemoteError::Api { http_status, code, .. } => {
            assert_eq!(http_status, 500);
            assert!(code.is_empty());
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn http_404_without_envelope_is_not_instance_not_found() {
    // only the panel's explicit errors[0].status == "404" carries that meaning
    let err = RemoteError::from_response(404, "{}");
    assert!(matches!(err, RemoteError::Api { http_status: 404, .. }));
}
