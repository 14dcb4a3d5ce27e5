// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[parameterized(
    busy = { ServerError::Busy, StatusCode::CONFLICT },
    suspended = { ServerError::Suspended, StatusCode::CONFLICT },
    installing = { ServerError::Installing, StatusCode::CONFLICT },
    throttled = { ServerError::Throttled, StatusCode::CONFLICT },
    path_escape = {
        ServerError::Fs(quay_fs::FsError::PathEscape("x".into())),
        StatusCode::BAD_REQUEST
    },
    quota = {
        ServerError::Fs(quay_fs::FsError::NotEnoughDiskSpace),
        StatusCode::BAD_REQUEST
    },
    gone = {
        ServerError::Remote(quay_remote::RemoteError::InstanceNotFound),
        StatusCode::NOT_FOUND
    },
    bad_creds = {
        ServerError::Remote(quay_remote::RemoteError::InvalidCredentials),
        StatusCode::FORBIDDEN
    },
)]
fn server_errors_map_to_stable_statuses(err: ServerError, expected: StatusCode) {
    assert_eq!(ApiError::Server(err).status(), expected);
}

#[test]
fn unknown_server_is_404_and_auth_failure_is_403() {
    assert_eq!(ApiError::UnknownServer.status(), StatusCode::NOT_FOUND);
    assert_eq!(ApiError::Unauthorized.status(), StatusCode::FORBIDDEN);
}

#[test]
fn unexpected_failures_are_500() {
    let err = ApiError::Server(ServerError::Runtime(quay_adapters::RuntimeError::Api(
        "socket gone".to_string(),
    )));
    assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
}
