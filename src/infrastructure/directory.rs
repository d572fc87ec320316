//! In-memory user/property directories and directory-backed authentication.
//!
//! The real platform serves these from its account and listing services;
//! this crate only consumes the traits. The in-memory flavors back the
//! default wiring and the test suites.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::model::{Credentials, UserProfile};
use crate::domain::repository::{Authenticator, PropertyDirectory, UserDirectory};
use crate::error::{MessagingError, StoreError};

#[derive(Default)]
pub struct InMemoryUserDirectory {
    users: RwLock<HashMap<String, UserProfile>>,
}

impl InMemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, profile: UserProfile) {
        let mut users = self.users.write().await;
        users.insert(profile.id.clone(), profile);
    }
}

#[async_trait]
impl UserDirectory for InMemoryUserDirectory {
    async fn exists(&self, user_id: &str) -> Result<bool, StoreError> {
        let users = self.users.read().await;
        Ok(users.contains_key(user_id))
    }

    async fn get(&self, user_id: &str) -> Result<Option<UserProfile>, StoreError> {
        let users = self.users.read().await;
        Ok(users.get(user_id).cloned())
    }
}

#[derive(Default)]
pub struct InMemoryPropertyDirectory {
    properties: RwLock<HashSet<String>>,
}

impl InMemoryPropertyDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, property_id: &str) {
        let mut properties = self.properties.write().await;
        properties.insert(property_id.to_string());
    }
}

#[async_trait]
impl PropertyDirectory for InMemoryPropertyDirectory {
    async fn exists(&self, property_id: &str) -> Result<bool, StoreError> {
        let properties = self.properties.read().await;
        Ok(properties.contains(property_id))
    }
}

/// Authenticates a connection against the user directory. Token validation
/// proper lives with the identity service; this layer requires a non-empty
/// token and a known user id.
pub struct DirectoryAuthenticator {
    users: Arc<dyn UserDirectory>,
}

impl DirectoryAuthenticator {
    pub fn new(users: Arc<dyn UserDirectory>) -> Self {
        Self { users }
    }
}

#[async_trait]
impl Authenticator for DirectoryAuthenticator {
    async fn authenticate(
        &self,
        credentials: &Credentials,
    ) -> Result<UserProfile, MessagingError> {
        if credentials.token.trim().is_empty() {
            return Err(MessagingError::Authentication(
                "missing credentials".to_string(),
            ));
        }
        let profile = self
            .users
            .get(&credentials.user_id)
            .await
            .map_err(MessagingError::from)?;
        profile.ok_or_else(|| {
            MessagingError::Authentication(format!("unknown user {}", credentials.user_id))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(id: &str) -> UserProfile {
        UserProfile {
            id: id.to_string(),
            display_name: id.to_string(),
            avatar_url: None,
            email: format!("{id}@example.com"),
        }
    }

    #[tokio::test]
    async fn authenticates_known_users_only() {
        let users = Arc::new(InMemoryUserDirectory::new());
        users.insert(profile("u1")).await;
        let auth = DirectoryAuthenticator::new(users);

        let ok = auth
            .authenticate(&Credentials {
                user_id: "u1".to_string(),
                token: "t".to_string(),
            })
            .await;
        assert!(ok.is_ok());

        let unknown = auth
            .authenticate(&Credentials {
                user_id: "ghost".to_string(),
                token: "t".to_string(),
            })
            .await;
        assert!(matches!(unknown, Err(MessagingError::Authentication(_))));

        let empty_token = auth
            .authenticate(&Credentials {
                user_id: "u1".to_string(),
                token: "".to_string(),
            })
            .await;
        assert!(matches!(empty_token, Err(MessagingError::Authentication(_))));
    }
}
