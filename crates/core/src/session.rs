//! Session state shared between the front-end and the agent loop.
//!
//! Settings and the auth profile are owned by the session, not by the loop:
//! the loop reads settings fresh at the top of every iteration and asks the
//! session for a token before every request.

use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::AuthError;

/// Endpoint and model selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Base URL of the provider endpoint
    pub base_url: String,

    /// Model identifier (e.g. "openai/gpt-4.1-nano", "google/gemini-2.5-flash")
    pub model: String,
}

impl Settings {
    /// Build settings, trimming surrounding whitespace from both fields.
    pub fn new(base_url: impl AsRef<str>, model: impl AsRef<str>) -> Self {
        Self {
            base_url: base_url.as_ref().trim().to_string(),
            model: model.as_ref().trim().to_string(),
        }
    }
}

/// Where the loop reads its settings from. Called once per iteration.
pub trait SettingsSource: Send + Sync {
    fn settings(&self) -> Settings;
}

impl SettingsSource for Settings {
    fn settings(&self) -> Settings {
        self.clone()
    }
}

/// Settings that the front-end can change between (or during) turns.
#[derive(Debug, Clone)]
pub struct SharedSettings {
    inner: Arc<RwLock<Settings>>,
}

impl SharedSettings {
    pub fn new(settings: Settings) -> Self {
        Self {
            inner: Arc::new(RwLock::new(settings)),
        }
    }

    /// Switch model; a catalog base URL, when given, replaces the current one.
    pub fn select_model(&self, model: &str, base_url: Option<&str>) {
        let mut guard = self.inner.write().unwrap_or_else(|e| e.into_inner());
        let base_url = base_url.unwrap_or(&guard.base_url).to_string();
        *guard = Settings::new(base_url, model);
        debug!(model = %guard.model, base_url = %guard.base_url, "Model selected");
    }

    pub fn set_base_url(&self, base_url: &str) {
        let mut guard = self.inner.write().unwrap_or_else(|e| e.into_inner());
        let model = guard.model.clone();
        *guard = Settings::new(base_url, model);
    }
}

impl SettingsSource for SharedSettings {
    fn settings(&self) -> Settings {
        self.inner.read().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

/// The authentication profile. `token` is `None` until the user signs in.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct AuthProfile {
    pub token: Option<String>,
}

impl AuthProfile {
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
        }
    }

    /// The token, if present and not blank.
    pub fn usable_token(&self) -> Option<&str> {
        self.token.as_deref().filter(|t| !t.trim().is_empty())
    }
}

impl std::fmt::Debug for AuthProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let token = match self.token {
            Some(_) => "[REDACTED]",
            None => "None",
        };
        f.debug_struct("AuthProfile").field("token", &token).finish()
    }
}

/// The external authentication collaborator.
pub trait AuthCollaborator: Send + Sync {
    /// Synchronously read the current profile.
    fn profile(&self) -> AuthProfile;

    /// Hand the user off to the login page. `login_url` already carries the
    /// return target.
    fn request_login(&self, login_url: &str);
}

/// The explicit session context injected into the agent loop.
pub struct SessionContext {
    settings: Arc<dyn SettingsSource>,
    auth: Arc<dyn AuthCollaborator>,
    login_url: String,
    profile: Option<AuthProfile>,
}

impl SessionContext {
    pub fn new(
        settings: Arc<dyn SettingsSource>,
        auth: Arc<dyn AuthCollaborator>,
        login_url: impl Into<String>,
    ) -> Self {
        Self {
            settings,
            auth,
            login_url: login_url.into(),
            profile: None,
        }
    }

    /// Read the settings as they are right now.
    pub fn settings(&self) -> Settings {
        self.settings.settings()
    }

    /// Return a usable token, fetching the profile from the collaborator if
    /// the session has none yet. On failure the login hand-off is triggered.
    pub fn ensure_token(&mut self) -> Result<String, AuthError> {
        if let Some(token) = self.profile.as_ref().and_then(AuthProfile::usable_token) {
            return Ok(token.to_string());
        }

        let profile = self.auth.profile();
        let token = profile.usable_token().map(str::to_string);
        self.profile = Some(profile);

        match token {
            Some(token) => {
                debug!("Auth profile initialised");
                Ok(token)
            }
            None => {
                warn!(login_url = %self.login_url, "No auth token, handing off to login");
                self.auth.request_login(&self.login_url);
                Err(AuthError::TokenMissing)
            }
        }
    }

    /// Manually set the token (e.g. pasted API key).
    pub fn set_token(&mut self, token: impl Into<String>) {
        self.profile = Some(AuthProfile::with_token(token));
    }

    /// The cached profile, if it has been initialised.
    pub fn profile(&self) -> Option<&AuthProfile> {
        self.profile.as_ref()
    }
}
