//! User profile view and directory trait.
//!
//! Accounts are owned by the account service. The messaging core only reads
//! the public profile fields it needs to label the other side of a chat.

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::shared::error::AppError;

/// Public profile fields of a user, as read from the `users` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: Uuid,
    pub user_name: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub profile_picture_url: Option<String>,
}

/// Read-only lookup of user profiles.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Find one profile by user id.
    async fn find_profile(&self, user_id: Uuid) -> Result<Option<UserProfile>, AppError>;

    /// Find several profiles. Unknown ids are skipped.
    async fn find_profiles(&self, user_ids: &[Uuid]) -> Result<Vec<UserProfile>, AppError> {
        let mut profiles = Vec::with_capacity(user_ids.len());
        for id in user_ids {
            if let Some(profile) = self.find_profile(*id).await? {
                profiles.push(profile);
            }
        }
        Ok(profiles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(Vec<UserProfile>);

    #[async_trait]
    impl UserDirectory for Fixed {
        async fn find_profile(&self, user_id: Uuid) -> Result<Option<UserProfile>, AppError> {
            Ok(self.0.iter().find(|p| p.id == user_id).cloned())
        }
    }

    fn profile(user_name: &str) -> UserProfile {
        UserProfile {
            id: Uuid::new_v4(),
            user_name: user_name.into(),
            first_name: None,
            last_name: None,
            profile_picture_url: None,
        }
    }

    #[tokio::test]
    async fn test_default_find_profiles_skips_unknown_ids() {
        let mona = profile("mkhaled");
        let omar = profile("ofarid");
        let directory = Fixed(vec![mona.clone(), omar.clone()]);

        let found = directory
            .find_profiles(&[omar.id, Uuid::new_v4(), mona.id])
            .await
            .unwrap();

        assert_eq!(found, vec![omar, mona]);
    }
}
