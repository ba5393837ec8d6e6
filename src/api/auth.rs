use reqwest::Method;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::{ApiClient, NO_BODY};
use crate::error::{Error, HttpFailure, Result};
use crate::models::Account;

/// The three authentication calls the token flow depends on.
pub trait AuthApi {
    /// Register a new account and return its token.
    fn signup(&self, name: &str, email: &str, password: &str) -> Result<String>;
    /// Log into an existing account and return its token.
    fn login(&self, email: &str, password: &str) -> Result<String>;
    /// Identify the owner of `token`.
    fn me(&self, token: &str) -> Result<Account>;
}

#[derive(Serialize)]
struct SignupRequest<'a> {
    name: &'a str,
    email: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

/// The backend answers `authToken`; some deployments say `token`.
#[derive(Deserialize)]
struct AuthResponse {
    #[serde(rename = "authToken", alias = "token")]
    auth_token: String,
}

impl AuthApi for ApiClient {
    fn signup(&self, name: &str, email: &str, password: &str) -> Result<String> {
        info!(email, name, "signing up");
        let payload = SignupRequest {
            name,
            email,
            password,
        };
        let resp: AuthResponse = self
            .send_json(Method::POST, "/auth/signup", Some(&payload), None)
            .map_err(|failure| {
                if failure.is_duplicate() {
                    warn!(email, "account already exists");
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
            })?;
        debug!(email, token_length = resp.auth_token.len(), "signup returned token");
        Ok(resp.auth_token)
    }

    fn login(&self, email: &str, password: &str) -> Result<String> {
        info!(email, "logging in");
        let payload = LoginRequest { email, password };
        let resp: AuthResponse = self
            .send_json(Method::POST, "/auth/login", Some(&payload), None)
            .map_err(|failure: HttpFailure| Error::Login {
                email: email.to_string(),
                failure,
            })?;
        debug!(email, token_length = resp.auth_token.len(), "login returned token");
        Ok(resp.auth_token)
    }

    fn me(&self, token: &str) -> Result<Account> {
        if token.is_empty() {
            return Err(Error::Token("empty token".into()));
        }
        let account: Account = self
            .send_json(Method::GET, "/auth/me", NO_BODY, Some(token))
            .map_err(Error::UserInfo)?;
        info!(user_id = account.id, email = %account.email, "resolved account");
        Ok(account)
    }
}
