use crate::api::models::{TokenErrorBody, TokenResponse};
use crate::config::AppConfig;
use crate::error::{AppError, AppResult};
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;
use rand::Rng;
use sha2::{Digest, Sha256};

const SCOPES: &[&str] = &[
    "user-read-email",
    "user-read-private",
    "user-library-read",
    "user-library-modify",
    "user-read-playback-state",
    "user-modify-playback-state",
    "streaming",
    "user-read-recently-played",
    "playlist-read-private",
    "playlist-read-collaborative",
    "playlist-modify-private",
    "playlist-modify-public",
];

pub struct PkceChallenge {
    pub verifier: String,
    pub challenge: String,
}

impl PkceChallenge {
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        let verifier_bytes: Vec<u8> = (0..64).map(|_| rng.gen::<u8>()).collect();
        let verifier = URL_SAFE_NO_PAD.encode(&verifier_bytes);

        let digest = Sha256::digest(verifier.as_bytes());
        let challenge = URL_SAFE_NO_PAD.encode(digest);

        Self {
            verifier,
            challenge,
        }
    }
}

/// Authorization-code and refresh-token grants against the accounts service.
pub struct OAuthClient {
    http: reqwest::Client,
    client_id: String,
    client_secret: Option<String>,
    redirect_uri: String,
    authorize_endpoint: String,
    token_endpoint: String,
}

impl OAuthClient {
    pub fn new(config: &AppConfig) -> AppResult<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("spotiplayer/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            client_id: config.client_id.clone(),
            client_secret: (!config.client_secret.is_empty()).then(|| config.client_secret.clone()),
            redirect_uri: config.redirect_uri.clone(),
            authorize_endpoint: config.authorize_url(),
            token_endpoint: config.token_url(),
        })
    }

    pub fn uses_pkce(&self) -> bool {
        self.client_secret.is_none()
    }

    pub fn authorize_url(&self, pkce: Option<&PkceChallenge>) -> String {
        let scopes = SCOPES.join(" ");
        let mut url = format!(
            "{}?response_type=code&client_id={}&redirect_uri={}&scope={}&show_dialog=true",
            self.authorize_endpoint,
            urlencoding::encode(&self.client_id),
            urlencoding::encode(&self.redirect_uri),
            urlencoding::encode(&scopes),
        );
        if let Some(pkce) = pkce {
            url.push_str("&code_challenge_method=S256&code_challenge=");
            url.push_str(&pkce.challenge);
        }
        log::info!("[authorize_url] {}", url);
        url
    }

    pub async fn exchange_code(
        &self,
        code: &str,
        code_verifier: Option<&str>,
    ) -> AppResult<TokenResponse> {
        let mut params = vec![
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.redirect_uri.as_str()),
        ];
        if self.uses_pkce() {
            let verifier = code_verifier.ok_or_else(|| {
                AppError::Config("PKCE code exchange needs the code verifier".into())
            })?;
            params.push(("client_id", self.client_id.as_str()));
            params.push(("code_verifier", verifier));
        }

        self.token_request(&params, "Token exchange failed").await
    }

    pub async fn refresh_access_token(&self, refresh_token: &str) -> AppResult<TokenResponse> {
        let mut params = vec![
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ];
        if self.uses_pkce() {
            params.push(("client_id", self.client_id.as_str()));
        }

        self.token_request(&params, "Token refresh failed").await
    }

    async fn token_request(
        &self,
        params: &[(&str, &str)],
        failure: &str,
    ) -> AppResult<TokenResponse> {
        let mut request = self.http.post(&self.token_endpoint).form(params);
        if let Some(secret) = &self.client_secret {
            let credentials = format!("{}:{}", self.client_id, secret);
            request = request.header(
                reqwest::header::AUTHORIZATION,
                format!("Basic {}", STANDARD.encode(credentials.as_bytes())),
            );
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let detail = match serde_json::from_str::<TokenErrorBody>(&body) {
                Ok(err) => err.error_description.unwrap_or(err.error),
                Err(_) => body,
            };
            return Err(AppError::RemoteApi {
                status: status.as_u16(),
                message: format!("{}: {}", failure, detail),
            });
        }

        let token: TokenResponse = response.json().await?;
        Ok(token)
    }
}
