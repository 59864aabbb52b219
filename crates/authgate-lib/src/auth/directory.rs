//! User directory lookup.
use crate::config::UserSettings;
use crate::error::AppError;
use async_trait::async_trait;
use authgate_common::{Credential, PrincipalId};
use dashmap::DashMap;
use std::sync::Arc;

/// Source of stored credentials
///
/// The gateway never stores users itself; it only asks this collaborator.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find_credential_by_username(&self, username: &str) -> Option<Credential>;
}

/// Directory held in memory, seeded from configuration
#[derive(Debug, Clone, Default)]
pub struct InMemoryDirectory {
    users: Arc<DashMap<String, Credential>>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a directory from configured users
    pub fn from_settings(users: &[UserSettings]) -> Result<Self, AppError> {
        let directory = Self::new();
        for user in users {
            let credential = Credential {
                username: user.username.clone(),
                password_hash: user.password_hash.clone(),
                principal_id: user.id.map(PrincipalId::from).unwrap_or_default(),
                display_name: user
                    .display_name
                    .clone()
                    .unwrap_or_else(|| user.username.clone()),
            };
            directory.insert(credential)?;
        }
        Ok(directory)
    }

    /// Add a credential; usernames are unique
    pub fn insert(&self, credential: Credential) -> Result<(), AppError> {
        use dashmap::mapref::entry::Entry;

        match self.users.entry(credential.username.clone()) {
            Entry::Occupied(_) => Err(AppError::InvalidInput(format!(
                "user `{}` already exists",
                credential.username
            ))),
            Entry::Vacant(slot) => {
                slot.insert(credential);
                Ok(())
            },
        }
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

#[async_trait]
impl UserDirectory for InMemoryDirectory {
    async fn find_credential_by_username(&self, username: &str) -> Option<Credential> {
        self.users.get(username).map(|c| c.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn user(name: &str) -> UserSettings {
        UserSettings {
            username: name.to_string(),
            password_hash: "$scrypt$ln=4,r=8,p=1$c2FsdHNhbHQ$aGFzaA".to_string(),
            display_name: None,
            id: None,
        }
    }

    #[tokio::test]
    async fn test_lookup() {
        let directory = InMemoryDirectory::from_settings(&[user("user")]).unwrap();

        let credential = directory.find_credential_by_username("user").await.unwrap();
        assert_eq!(credential.username, "user");
        assert_eq!(credential.display_name, "user");

        assert!(directory.find_credential_by_username("nobody").await.is_none());
        // Lookups are exact, not case-folded.
        assert!(directory.find_credential_by_username("USER").await.is_none());
    }

    #[tokio::test]
    async fn test_configured_id_and_display_name() {
        let id = Uuid::new_v4();
        let mut settings = user("alice");
        settings.id = Some(id);
        settings.display_name = Some("Alice Example".to_string());

        let directory = InMemoryDirectory::from_settings(&[settings]).unwrap();
        let credential = directory.find_credential_by_username("alice").await.unwrap();

        assert_eq!(credential.principal_id, PrincipalId::from(id));
        assert_eq!(credential.principal().display_name, "Alice Example");
    }

    #[test]
    fn test_duplicate_username_rejected() {
        let result = InMemoryDirectory::from_settings(&[user("bob"), user("bob")]);
        assert!(matches!(result, Err(AppError::InvalidInput(_))));
    }
}
