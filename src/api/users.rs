use reqwest::Method;
use tracing::{debug, info, warn};

use super::{ApiClient, NO_BODY};
use crate::error::{Error, Result};
use crate::models::{NewUser, User, UserUpdate};

impl ApiClient {
    /// GET `/user`.
    pub fn get_users(&self) -> Result<Vec<User>> {
        info!(base_url = %self.base_url, "fetching users");
        let users: Vec<User> = self
            .send_json(Method::GET, "/user", NO_BODY, None)
            .map_err(Error::UsersFetch)?;
        info!(count = users.len(), "fetched users");
        debug!(user_ids = ?users.iter().take(5).map(|u| u.id).collect::<Vec<_>>(), "first users");
        Ok(users)
    }

    /// GET `/user/{id}`.
    pub fn get_user(&self, user_id: i64) -> Result<User> {
        self.send_json(Method::GET, &format!("/user/{user_id}"), NO_BODY, None)
            .map_err(Error::UsersFetch)
    }

    /// POST `/user`. Sends the bearer token when one is set. A duplicate
    /// email is reported separately from other failures.
    pub fn create_user(&self, name: &str, email: &str, password: Option<&str>) -> Result<User> {
        info!(name, email, "creating user");
        let payload = NewUser {
            name: name.to_string(),
            email: email.to_string(),
            password: password.map(str::to_string),
        };
        self.send_json(Method::POST, "/user", Some(&payload), self.token())
            .map_err(|failure| {
                if failure.is_duplicate() {
                    warn!(email, "user already exists");
                    Error::DuplicateUser {
                        email: email.to_string(),
                        failure,
                    }
                } else {
                    Error::UserCreation {
                        email: email.to_string(),
                        failure,
                    }
                }
            })
    }

    /// PATCH `/user/{id}`.
    pub fn update_user(&self, user_id: i64, update: &UserUpdate) -> Result<User> {
        info!(user_id, "updating user");
        let token = self.require_token("user update")?;
        self.send_json(Method::PATCH, &format!("/user/{user_id}"), Some(update), Some(token))
            .map_err(|failure| Error::UserUpdate {
                id: user_id,
                failure,
            })
    }

    /// DELETE `/user/{id}`.
    pub fn delete_user(&self, user_id: i64) -> Result<()> {
        info!(user_id, "deleting user");
        let token = self.require_token("user deletion")?;
        self.send(Method::DELETE, &format!("/user/{user_id}"), NO_BODY, Some(token))
            .map(|_| ())
            .map_err(|failure| Error::UserDelete {
                id: user_id,
                failure,
            })
    }
}
