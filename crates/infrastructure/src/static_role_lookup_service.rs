use std::collections::HashSet;

use async_trait::async_trait;
use stellara_application::RoleLookupService;
use stellara_core::AppResult;
use stellara_domain::UserId;
use tokio::sync::RwLock;

/// In-memory role lookup over a fixed set of privileged users.
#[derive(Default)]
pub struct StaticRoleLookupService {
    admins: RwLock<HashSet<UserId>>,
}

impl StaticRoleLookupService {
    /// Creates a lookup that grants the privileged role to `admins`.
    #[must_use]
    pub fn new(admins: impl IntoIterator<Item = UserId>) -> Self {
        Self {
            admins: RwLock::new(admins.into_iter().collect()),
        }
    }

    /// Grants the privileged role.
    pub async fn grant(&self, user_id: UserId) {
        self.admins.write().await.insert(user_id);
    }

    /// Revokes the privileged role.
    pub async fn revoke(&self, user_id: UserId) {
        self.admins.write().await.remove(&user_id);
    }
}

#[async_trait]
impl RoleLookupService for StaticRoleLookupService {
    async fn is_admin(&self, user_id: UserId) -> AppResult<bool> {
        Ok(self.admins.read().await.contains(&user_id))
    }
}
