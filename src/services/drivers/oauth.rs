use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::{BackendError, BackendResult};

/// Tokens closer than this to expiry are refreshed before use.
const REFRESH_MARGIN_MINUTES: i64 = 5;

#[derive(Debug, Clone)]
pub struct OAuthCredentials {
    pub token_url: String,
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: Option<String>,
    /// Pre-issued access token, used until it expires
    pub access_token: Option<String>,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default = "default_expires_in")]
    expires_in: i64,
}

fn default_expires_in() -> i64 {
    3600
}

/// Absolute expiry for a provider supplied `expires_in`.
fn expiry_after(expires_in: i64) -> BackendResult<DateTime<Utc>> {
    Duration::try_seconds(expires_in)
        .and_then(|lifetime| Utc::now().checked_add_signed(lifetime))
        .ok_or_else(|| {
            BackendError::UpstreamUnavailable(format!(
                "Token endpoint returned an unusable expires_in of {}",
                expires_in
            ))
        })
}

struct TokenState {
    access_token: Option<String>,
    expires_at: DateTime<Utc>,
    refresh_token: Option<String>,
}

/// In-memory access token cache for a single backend, refreshed with the
/// configured refresh token.
pub struct TokenSource {
    http: reqwest::Client,
    token_url: String,
    client_id: String,
    client_secret: String,
    state: Mutex<TokenState>,
}

impl TokenSource {
    pub fn new(http: reqwest::Client, credentials: OAuthCredentials) -> Self {
        // A pre-issued token without a refresh token is used as long as it works
        let expires_at = match (&credentials.access_token, &credentials.refresh_token) {
            (Some(_), None) => DateTime::<Utc>::MAX_UTC,
            _ => DateTime::<Utc>::MIN_UTC,
        };

        Self {
            http,
            token_url: credentials.token_url,
            client_id: credentials.client_id,
            client_secret: credentials.client_secret,
            state: Mutex::new(TokenState {
                access_token: credentials.access_token,
                expires_at,
                refresh_token: credentials.refresh_token,
            }),
        }
    }

    pub async fn access_token(&self) -> BackendResult<String> {
        let mut state = self.state.lock().await;

        if let Some(token) = &state.access_token {
            if state.expires_at > Utc::now() + Duration::minutes(REFRESH_MARGIN_MINUTES) {
                return Ok(token.clone());
            }
        }

        let refresh_token = state.refresh_token.clone().ok_or_else(|| {
            BackendError::Internal("No OAuth refresh token configured".to_string())
        })?;

        debug!("Refreshing OAuth access token at {}", self.token_url);
        let response = self
            .http
            .post(&self.token_url)
            .form(&[
                ("grant_type", "refresh_token"),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("refresh_token", refresh_token.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(BackendError::UpstreamUnavailable(format!(
                "Token refresh rejected with status {}",
                status
            )));
        }

        let tokens: TokenResponse = response.json().await?;
        state.expires_at = expiry_after(tokens.expires_in)?;
        state.access_token = Some(tokens.access_token.clone());
        // Some providers rotate the refresh token on every use
        if let Some(rotated) = tokens.refresh_token {
            state.refresh_token = Some(rotated);
        }
        info!("🔑 OAuth access token refreshed, valid for {}s", tokens.expires_in);

        Ok(tokens.access_token)
    }
}
