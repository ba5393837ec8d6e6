// Token cache: keep the bearer token in an environment variable and a
// dotenv file so later runs skip authentication, and re-validate it with
// `/auth/me` before trusting it.

use std::fs;
use std::path::PathBuf;

use tracing::{debug, info, warn};

use crate::api::AuthApi;
use crate::credentials::Credentials;
use crate::error::{Error, Result};

/// Where a token is cached between runs.
pub trait TokenStore {
    fn load(&self) -> Option<String>;
    fn save(&self, token: &str) -> Result<()>;
    fn clear(&self) -> Result<()>;
}

/// Token kept in an environment variable, mirrored to a dotenv file.
#[derive(Debug, Clone)]
pub struct EnvFileTokenStore {
    var: String,
    path: PathBuf,
}

impl EnvFileTokenStore {
    pub fn new(var: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            var: var.into(),
            path: path.into(),
        }
    }

    fn read_file_value(&self) -> Option<String> {
        let iter = dotenvy::from_path_iter(&self.path).ok()?;
        iter.filter_map(|item| item.ok())
            .find(|(key, _)| key == &self.var)
            .map(|(_, value)| value)
            .filter(|value| !value.is_empty())
    }

    /// Rewrite the dotenv file with `var` set to `value`, or removed when
    /// `value` is `None`. Other lines are kept as they are.
    fn write_file_value(&self, value: Option<&str>) -> Result<()> {
        let existing = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                if value.is_none() {
                    return Ok(());
                }
                String::new()
            }
            Err(e) => return Err(e.into()),
        };

        let prefix = format!("{}=", self.var);
        let mut lines: Vec<String> = existing
            .lines()
            .filter(|line| {
                let trimmed = line.trim_start();
                let trimmed = trimmed.strip_prefix("export ").unwrap_or(trimmed);
                !trimmed.starts_with(&prefix)
            })
            .map(str::to_string)
            .collect();
        if let Some(value) = value {
            lines.push(format!("{}={}", self.var, value));
        }

        let mut text = lines.join("\n");
        if !text.is_empty() {
            text.push('\n');
        }
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, text)?;
        Ok(())
    }
}

impl TokenStore for EnvFileTokenStore {
    fn load(&self) -> Option<String> {
        if let Some(token) = std::env::var(&self.var).ok().filter(|t| !t.is_empty()) {
            debug!(var = %self.var, "token found in environment");
            return Some(token);
        }
        let token = self.read_file_value()?;
        debug!(path = %self.path.display(), "token found in env file");
        Some(token)
    }

    fn save(&self, token: &str) -> Result<()> {
        std::env::set_var(&self.var, token);
        self.write_file_value(Some(token))?;
        info!(path = %self.path.display(), token_length = token.len(), "token cached");
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        std::env::remove_var(&self.var);
        self.write_file_value(None)
    }
}

/// Return a working token, authenticating only when the cached one is
/// missing or rejected.
///
/// A cached token is checked with `/auth/me`; if that succeeds no other
/// call is made. Otherwise credentials are resolved (lazily, so a valid
/// cache never prompts), a signup is attempted and a duplicate account
/// falls back to login. The new token is persisted before returning.
pub fn get_or_create_token<A, S, C>(api: &A, store: &S, credentials: C) -> Result<String>
where
    A: AuthApi + ?Sized,
    S: TokenStore + ?Sized,
    C: FnOnce() -> Result<Credentials>,
{
    if let Some(token) = store.load() {
        match api.me(&token) {
            Ok(account) => {
                info!(user_id = account.id, "cached token is valid");
                return Ok(token);
            }
            Err(e) => {
                warn!(error = %e, "cached token rejected, discarding it");
                store.clear()?;
            }
        }
    }

    let creds = credentials().map_err(|e| match e {
        Error::Credentials(_) => e,
        other => Error::Credentials(other.to_string()),
    })?;

    let token = match api.signup(creds.display_name(), &creds.email, creds.password()) {
        Ok(token) => token,
        Err(Error::DuplicateUser { .. }) => {
            info!(email = %creds.email, "account exists, logging in instead");
            api.login(&creds.email, creds.password())
                .map_err(|e| Error::Token(format!("login failed: {e}")))?
        }
        Err(e) => return Err(Error::Token(format!("signup failed: {e}"))),
    };

    store.save(&token)?;
    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HttpFailure;
    use crate::models::Account;
    use reqwest::StatusCode;
    use serial_test::serial;
    use std::cell::{Cell, RefCell};

    #[derive(Default)]
    struct FakeAuth {
        valid_token: Option<String>,
        account_exists: bool,
        signups: Cell<u32>,
        logins: Cell<u32>,
        me_calls: Cell<u32>,
    }

    impl AuthApi for FakeAuth {
        fn signup(&self, _name: &str, email: &str, _password: &str) -> Result<String> {
            self.signups.set(self.signups.get() + 1);
            if self.account_exists {
                return Err(Error::DuplicateUser {
                    email: email.into(),
                    failure: HttpFailure::from_status(
                        StatusCode::BAD_REQUEST,
                        "Duplicate record detected.",
                    ),
                });
            }
            Ok("signup-token".into())
        }

        fn login(&self, _email: &str, _password: &str) -> Result<String> {
            self.logins.set(self.logins.get() + 1);
            Ok("login-token".into())
        }

        fn me(&self, token: &str) -> Result<Account> {
            self.me_calls.set(self.me_calls.get() + 1);
            if self.valid_token.as_deref() == Some(token) {
                Ok(Account {
                    id: 1,
                    name: "jean".into(),
                    email: "jean@dupont21.com".into(),
                })
            } else {
                Err(Error::UserInfo(HttpFailure::from_status(
                    StatusCode::UNAUTHORIZED,
                    "invalid token",
                )))
            }
        }
    }

    #[derive(Default)]
    struct MemoryStore {
        token: RefCell<Option<String>>,
        saves: Cell<u32>,
    }

    impl TokenStore for MemoryStore {
        fn load(&self) -> Option<String> {
            self.token.borrow().clone()
        }
        fn save(&self, token: &str) -> Result<()> {
            self.saves.set(self.saves.get() + 1);
            *self.token.borrow_mut() = Some(token.into());
            Ok(())
        }
        fn clear(&self) -> Result<()> {
            *self.token.borrow_mut() = None;
            Ok(())
        }
    }

    fn creds() -> Result<Credentials> {
        Ok(Credentials::new("jean@dupont21.com", "secret"))
    }

    #[test]
    fn valid_cached_token_skips_authentication() {
        let api = FakeAuth {
            valid_token: Some("cached".into()),
            ..Default::default()
        };
        let store = MemoryStore::default();
        store.save("cached").unwrap();

        let token = get_or_create_token(&api, &store, || panic!("credentials not needed")).unwrap();

        assert_eq!(token, "cached");
        assert_eq!(api.signups.get() + api.logins.get(), 0);
        assert_eq!(api.me_calls.get(), 1);
    }

    #[test]
    fn invalid_cached_token_triggers_one_signup() {
        let api = FakeAuth::default();
        let store = MemoryStore::default();
        store.save("stale").unwrap();

        let token = get_or_create_token(&api, &store, creds).unwrap();

        assert_eq!(token, "signup-token");
        assert_eq!(api.signups.get(), 1);
        assert_eq!(api.logins.get(), 0);
        assert_eq!(store.load().as_deref(), Some("signup-token"));
    }

    #[test]
    fn duplicate_account_falls_back_to_login() {
        let api = FakeAuth {
            account_exists: true,
            ..Default::default()
        };
        let store = MemoryStore::default();

        let token = get_or_create_token(&api, &store, creds).unwrap();

        assert_eq!(token, "login-token");
        assert_eq!(api.logins.get(), 1);
        assert_eq!(store.saves.get(), 1);
        assert_eq!(api.me_calls.get(), 0);
    }

    #[test]
    fn missing_credentials_is_a_credentials_error() {
        let api = FakeAuth::default();
        let store = MemoryStore::default();
        let err = get_or_create_token(&api, &store, || {
            Err(Error::Credentials("no source".into()))
        })
        .unwrap_err();
        assert!(matches!(err, Error::Credentials(_)));
        assert_eq!(api.signups.get(), 0);
    }

    #[test]
    #[serial]
    fn env_file_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        fs::write(&path, "DEMO_API_BASE_URL=http://localhost\nVMFLEET_TEST_TOKEN=old\n").unwrap();
        let store = EnvFileTokenStore::new("VMFLEET_TEST_TOKEN", &path);
        std::env::remove_var("VMFLEET_TEST_TOKEN");

        assert_eq!(store.load().as_deref(), Some("old"));

        store.save("fresh").unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("DEMO_API_BASE_URL=http://localhost"));
        assert!(text.contains("VMFLEET_TEST_TOKEN=fresh"));
        assert!(!text.contains("=old"));
        assert_eq!(std::env::var("VMFLEET_TEST_TOKEN").unwrap(), "fresh");

        store.clear().unwrap();
        assert!(store.load().is_none());
        assert!(fs::read_to_string(&path).unwrap().contains("DEMO_API_BASE_URL"));
    }

    #[test]
    #[serial]
    fn env_var_wins_over_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        fs::write(&path, "VMFLEET_TEST_TOKEN2=from-file\n").unwrap();
        let store = EnvFileTokenStore::new("VMFLEET_TEST_TOKEN2", &path);

        std::env::set_var("VMFLEET_TEST_TOKEN2", "from-env");
        assert_eq!(store.load().as_deref(), Some("from-env"));
        std::env::remove_var("VMFLEET_TEST_TOKEN2");
    }
}
