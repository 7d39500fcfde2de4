//! User directory: registration, profiles and betting limits.

use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::storage::UserStore;
use crate::types::{Email, ProfileUpdate, SportsbookError, SportsbookResult, User, Username};

pub struct UserDirectory {
    users: Arc<dyn UserStore>,
}

impl UserDirectory {
    pub fn new(users: Arc<dyn UserStore>) -> Self {
        Self { users }
    }

    pub async fn register(&self, username: &str, email: &str, nickname: &str) -> SportsbookResult<User> {
        let username = Username::parse(username)?;
        let email = Email::parse(email)?;
        let user = User::new(username, email, nickname.trim().to_string())?;

        if self.users.find_by_username(user.username.as_str()).await?.is_some() {
            return Err(SportsbookError::Duplicate { entity: "User", key: user.username.to_string() });
        }
        self.ensure_email_free(&user.email, None).await?;

        self.users.save(&user).await?;
        info!(user_id = %user.id, username = %user.username, "User registered");
        Ok(user)
    }

    pub async fn profile(&self, user_id: Uuid) -> SportsbookResult<User> {
        self.users
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| SportsbookError::not_found("User", user_id))
    }

    /// Apply the fields present in `update`. Blank bank details keep their
    /// stored values.
    pub async fn update_profile(&self, user_id: Uuid, update: ProfileUpdate) -> SportsbookResult<User> {
        let mut user = self.profile(user_id).await?;
        if let Some(email) = update.email.as_ref().filter(|e| **e != user.email) {
            self.ensure_email_free(email, Some(user_id)).await?;
        }
        user.update_profile(update)?;
        self.users.save(&user).await?;
        info!(user_id = %user.id, "Profile updated");
        Ok(user)
    }

    /// Change the daily limit, the restriction flag, or both. Nothing is
    /// saved if the limit is out of range.
    pub async fn update_limits(
        &self,
        user_id: Uuid,
        daily_limit: Option<Decimal>,
        is_restricted: Option<bool>,
    ) -> SportsbookResult<User> {
        let mut user = self.profile(user_id).await?;
        if let Some(limit) = daily_limit {
            user.set_daily_limit(limit)?;
        }
        if let Some(restricted) = is_restricted {
            user.set_restriction(restricted);
        }
        self.users.save(&user).await?;
        info!(
            user_id = %user.id,
            daily_limit = %user.daily_limit,
            restricted = user.is_restricted,
            "Betting limits updated"
        );
        Ok(user)
    }

    async fn ensure_email_free(&self, email: &Email, owner: Option<Uuid>) -> SportsbookResult<()> {
        match self.users.find_by_email(email.as_str()).await? {
            Some(other) if Some(other.id) != owner => {
                Err(SportsbookError::Duplicate { entity: "User", key: email.to_string() })
            }
            _ => Ok(()),
        }
    }
}
