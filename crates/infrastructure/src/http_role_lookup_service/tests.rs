use httpmock::prelude::*;
use serde_json::json;
use stellara_application::RoleLookupService;
use stellara_core::AppError;
use stellara_domain::{Session, User, UserId};
use url::Url;

use super::{HttpRoleLookupConfig, HttpRoleLookupService};

fn service_for(server: &MockServer) -> HttpRoleLookupService {
    let base_url = Url::parse(server.base_url().as_str()).unwrap_or_else(|_| unreachable!());
    HttpRoleLookupService::new(
        reqwest::Client::new(),
        HttpRoleLookupConfig {
            base_url,
            api_key: "test-key".to_owned(),
            privileged_role: "admin".to_owned(),
        },
    )
    .unwrap_or_else(|_| unreachable!())
}

fn user() -> UserId {
    UserId::from_uuid(uuid::Uuid::from_u128(7))
}

#[tokio::test]
async fn matching_role_row_marks_user_privileged() {
    let server = MockServer::start_async().await;
    let user_id = user();
    let mock = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/rest/v1/user_roles")
                .query_param("select", "role")
                .query_param("user_id", format!("eq.{user_id}"))
                .query_param("role", "eq.admin")
                .header("apikey", "test-key");
            then.status(200)
                .header("Content-Type", "application/json")
                .json_body(json!([{"role": "admin"}]));
        })
        .await;

    let result = service_for(&server).is_admin(user_id).await;

    mock.assert_async().await;
    assert_eq!(result, Ok(true));
}

#[tokio::test]
async fn session_lookup_authorizes_with_session_access_token() {
    let server = MockServer::start_async().await;
    let user_id = user();
    let mock = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/rest/v1/user_roles")
                .query_param("user_id", format!("eq.{user_id}"))
                .header("apikey", "test-key")
                .header("Authorization", "Bearer user-access-token");
            then.status(200)
                .header("Content-Type", "application/json")
                .json_body(json!([{"role": "admin"}]));
        })
        .await;
    let session = Session::new("user-access-token", None, User::new(user_id, None));

    let result = service_for(&server).is_admin_for_session(&session).await;

    mock.assert_async().await;
    assert_eq!(result, Ok(true));
}

#[tokio::test]
async fn empty_result_means_not_privileged() {
    let server = MockServer::start_async().await;
    let _mock = server
        .mock_async(|when, then| {
            when.method(GET).path("/rest/v1/user_roles");
            then.status(200)
                .header("Content-Type", "application/json")
                .json_body(json!([]));
        })
        .await;

    let result = service_for(&server).is_admin(user()).await;

    assert_eq!(result, Ok(false));
}

#[tokio::test]
async fn error_status_is_unavailable() {
    let server = MockServer::start_async().await;
    let _mock = server
        .mock_async(|when, then| {
            when.method(GET).path("/rest/v1/user_roles");
            then.status(401).body("invalid api key");
        })
        .await;

    let result = service_for(&server).is_admin(user()).await;

    assert_eq!(
        result,
        Err(AppError::Unavailable(
            "role lookup endpoint returned status 401: invalid api key".to_owned()
        ))
    );
}
