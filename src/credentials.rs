// Credential resolution. Sources are tried in a fixed order (explicit values,
// environment, dotenv file, interactive prompt) and the first one that yields
// both an email and a password wins.

use std::fmt;
use std::path::PathBuf;

use dialoguer::{Input, Password};
use tracing::{debug, info};

use crate::config::{EMAIL_ENV_VAR, PASSWORD_ENV_VAR};
use crate::error::{Error, Result};

/// Email/password pair. The password never shows up in `Debug` output.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub email: String,
    password: String,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    /// Name used when signing up: the local part of the email.
    pub fn display_name(&self) -> &str {
        self.email.split('@').next().unwrap_or(&self.email)
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"[HIDDEN]")
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialOrigin {
    Explicit,
    Environment,
    EnvFile,
    Prompt,
}

impl fmt::Display for CredentialOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Explicit => "explicit",
            Self::Environment => "environment",
            Self::EnvFile => "env file",
            Self::Prompt => "prompt",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedCredentials {
    pub credentials: Credentials,
    pub origin: CredentialOrigin,
}

/// One place credentials may come from.
pub trait CredentialSource {
    fn origin(&self) -> CredentialOrigin;
    /// `Ok(None)` means this source has nothing to offer.
    fn fetch(&self) -> Result<Option<Credentials>>;
}

/// Values passed on the command line or held in the configuration.
pub struct ExplicitSource {
    pub email: Option<String>,
    pub password: Option<String>,
}

impl CredentialSource for ExplicitSource {
    fn origin(&self) -> CredentialOrigin {
        CredentialOrigin::Explicit
    }

    fn fetch(&self) -> Result<Option<Credentials>> {
        Ok(pair(self.email.clone(), self.password.clone()))
    }
}

/// `DEMO_API_EMAIL` / `DEMO_API_PASSWORD` from the process environment.
pub struct EnvSource;

impl CredentialSource for EnvSource {
    fn origin(&self) -> CredentialOrigin {
        CredentialOrigin::Environment
    }

    fn fetch(&self) -> Result<Option<Credentials>> {
        Ok(pair(
            std::env::var(EMAIL_ENV_VAR).ok(),
            std::env::var(PASSWORD_ENV_VAR).ok(),
        ))
    }
}

/// The same two keys read straight from a dotenv file.
pub struct EnvFileSource {
    pub path: PathBuf,
}

impl CredentialSource for EnvFileSource {
    fn origin(&self) -> CredentialOrigin {
        CredentialOrigin::EnvFile
    }

    fn fetch(&self) -> Result<Option<Credentials>> {
        let Ok(iter) = dotenvy::from_path_iter(&self.path) else {
            return Ok(None);
        };
        let (mut email, mut password) = (None, None);
        for (key, value) in iter.filter_map(|item| item.ok()) {
            match key.as_str() {
                EMAIL_ENV_VAR => email = Some(value),
                PASSWORD_ENV_VAR => password = Some(value),
                _ => {}
            }
        }
        Ok(pair(email, password))
    }
}

/// Interactive terminal prompt. `default_email` pre-fills the email field.
pub struct PromptSource {
    pub default_email: Option<String>,
}

impl CredentialSource for PromptSource {
    fn origin(&self) -> CredentialOrigin {
        CredentialOrigin::Prompt
    }

    fn fetch(&self) -> Result<Option<Credentials>> {
        // dialoguer builders hand back `&mut Self`, so keep the owner bound.
        let mut input = Input::<String>::new();
        input.with_prompt(format!("Email (or set {EMAIL_ENV_VAR})"));
        if let Some(email) = &self.default_email {
            input.default(email.clone());
        }
        let email = input.interact_text().map_err(|e| Error::Prompt(e.to_string()))?;
        // `Password` hides input in the terminal.
        let password = Password::new()
            .with_prompt("Password")
            .interact()
            .map_err(|e| Error::Prompt(e.to_string()))?;
        Ok(pair(Some(email), Some(password)))
    }
}

fn pair(email: Option<String>, password: Option<String>) -> Option<Credentials> {
    let email = email.map(|e| e.trim().to_string()).filter(|e| !e.is_empty())?;
    let password = password.filter(|p| !p.is_empty())?;
    Some(Credentials::new(email, password))
}

/// Ordered list of sources.
#[derive(Default)]
pub struct CredentialProvider {
    sources: Vec<Box<dyn CredentialSource>>,
}

impl CredentialProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_source(mut self, source: impl CredentialSource + 'static) -> Self {
        self.sources.push(Box::new(source));
        self
    }

    /// Explicit values, environment and `.env`, plus the prompt when
    /// `interactive` is set.
    pub fn standard(email: Option<String>, password: Option<String>, interactive: bool) -> Self {
        let default_email = email.clone();
        let provider = Self::new()
            .with_source(ExplicitSource { email, password })
            .with_source(EnvSource)
            .with_source(EnvFileSource {
                path: PathBuf::from(".env"),
            });
        if interactive {
            provider.with_source(PromptSource { default_email })
        } else {
            provider
        }
    }

    /// First source that yields a full pair.
    pub fn resolve(&self) -> Result<ResolvedCredentials> {
        for source in &self.sources {
            if let Some(credentials) = source.fetch()? {
                info!(origin = %source.origin(), email = %credentials.email, "credentials resolved");
                return Ok(ResolvedCredentials {
                    credentials,
                    origin: source.origin(),
                });
            }
            debug!(origin = %source.origin(), "no credentials from source");
        }
        Err(Error::Credentials(format!(
            "no email/password found; pass them as options or set {EMAIL_ENV_VAR} and {PASSWORD_ENV_VAR}"
        )))
    }
}
