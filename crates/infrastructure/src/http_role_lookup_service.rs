use async_trait::async_trait;
use serde::Deserialize;
use stellara_application::RoleLookupService;
use stellara_core::{AppError, AppResult};
use stellara_domain::{Session, UserId};
use tracing::debug;
use url::Url;

/// Connection settings for the role table REST endpoint.
#[derive(Debug, Clone)]
pub struct HttpRoleLookupConfig {
    /// Base URL of the hosted backend.
    pub base_url: Url,
    /// Publishable API key sent with every request.
    pub api_key: String,
    /// Role value that marks a privileged user.
    pub privileged_role: String,
}

#[derive(Debug, Deserialize)]
struct UserRoleRow {
    role: String,
}

/// Role lookup backed by the `user_roles` REST resource.
///
/// Lookups made for a session send that session's access token as the bearer
/// credential so row level policies see the signed-in user. Bare user id
/// lookups fall back to the API key.
pub struct HttpRoleLookupService {
    http_client: reqwest::Client,
    endpoint: Url,
    api_key: String,
    privileged_role: String,
}

impl HttpRoleLookupService {
    /// Creates a role lookup adapter.
    pub fn new(http_client: reqwest::Client, config: HttpRoleLookupConfig) -> AppResult<Self> {
        let privileged_role = config.privileged_role.trim().to_owned();
        if privileged_role.is_empty() {
            return Err(AppError::Validation(
                "privileged role must not be empty".to_owned(),
            ));
        }

        let endpoint = format!(
            "{}/rest/v1/user_roles",
            config.base_url.as_str().trim_end_matches('/')
        );
        let endpoint = Url::parse(endpoint.as_str()).map_err(|error| {
            AppError::Validation(format!("invalid role endpoint '{endpoint}': {error}"))
        })?;

        Ok(Self {
            http_client,
            endpoint,
            api_key: config.api_key,
            privileged_role,
        })
    }

    fn lookup_url(&self, user_id: UserId) -> Url {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .append_pair("select", "role")
            .append_pair("user_id", format!("eq.{user_id}").as_str())
            .append_pair("role", format!("eq.{}", self.privileged_role).as_str());
        url
    }

    async fn lookup(&self, user_id: UserId, bearer_token: &str) -> AppResult<bool> {
        let response = self
            .http_client
            .get(self.lookup_url(user_id))
            .header("apikey", self.api_key.as_str())
            .bearer_auth(bearer_token)
            .send()
            .await
            .map_err(|error| {
                AppError::Unavailable(format!("failed to call role lookup endpoint: {error}"))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<body unavailable>".to_owned());
            return Err(AppError::Unavailable(format!(
                "role lookup endpoint returned status {}: {body}",
                status.as_u16()
            )));
        }

        let rows = response.json::<Vec<UserRoleRow>>().await.map_err(|error| {
            AppError::Unavailable(format!(
                "failed to parse role lookup response body: {error}"
            ))
        })?;

        let is_admin = rows.iter().any(|row| row.role == self.privileged_role);
        debug!(user_id = %user_id, is_admin, "resolved user role");
        Ok(is_admin)
    }
}

#[async_trait]
impl RoleLookupService for HttpRoleLookupService {
    async fn is_admin(&self, user_id: UserId) -> AppResult<bool> {
        self.lookup(user_id, self.api_key.as_str()).await
    }

    async fn is_admin_for_session(&self, session: &Session) -> AppResult<bool> {
        self.lookup(session.user().id(), session.access_token()).await
    }
}

#[cfg(test)]
mod tests;
