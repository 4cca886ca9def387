use chirp_api::ServiceError;
use chirp_types::User;

use crate::Services;

/// Every registered user, searchable by username or full name.
pub struct ExploreView {
    users: Vec<User>,
}

impl ExploreView {
    pub async fn load(services: &Services) -> Result<Self, ServiceError> {
        let mut users = services.users.fetch_users().await?;
        users.sort_by(|a, b| a.username.cmp(&b.username));
        Ok(Self { users })
    }

    pub fn users(&self) -> &[User] {
        &self.users
    }

    /// Case-insensitive substring match. A blank query matches everyone.
    pub fn search(&self, query: &str) -> Vec<&User> {
        let query = query.trim().to_lowercase();
        self.users
            .iter()
            .filter(|user| {
                query.is_empty()
                    || user.username.to_lowercase().contains(&query)
                    || user.fullname.to_lowercase().contains(&query)
            })
            .collect()
    }
}
