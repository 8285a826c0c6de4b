use crate::api::models::ApiErrorBody;
use crate::config::AppConfig;
use crate::error::{AppError, AppResult};
use crate::session::SessionManager;
use reqwest::header::CONTENT_LENGTH;
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use url::Url;

pub struct SpotifyClient {
    http: reqwest::Client,
    base_url: String,
    market: String,
    session: Arc<SessionManager>,
}

impl SpotifyClient {
    pub fn new(config: &AppConfig, session: Arc<SessionManager>) -> AppResult<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("spotiplayer/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            market: config.market.clone(),
            session,
        })
    }

    pub fn session(&self) -> &Arc<SessionManager> {
        &self.session
    }

    pub fn market(&self) -> &str {
        &self.market
    }

    fn url(&self, path: &str, query: &[(&str, &str)]) -> AppResult<Url> {
        let raw = format!("{}{}", self.base_url, path);
        let url = if query.is_empty() {
            Url::parse(&raw)
        } else {
            Url::parse_with_params(&raw, query)
        };
        url.map_err(|e| AppError::Config(format!("Invalid API url {}: {}", raw, e)))
    }

    fn request(
        &self,
        method: Method,
        url: Url,
        token: &str,
        body: Option<&serde_json::Value>,
    ) -> reqwest::RequestBuilder {
        let bodyless = method != Method::GET;
        let builder = self.http.request(method, url).bearer_auth(token);
        match body {
            Some(body) => builder.json(body),
            None if bodyless => builder.header(CONTENT_LENGTH, "0"),
            None => builder,
        }
    }

    /// Sends a request with a request-time token. A 401 forces one refresh
    /// and a single retry.
    async fn send(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        body: Option<&serde_json::Value>,
    ) -> AppResult<reqwest::Response> {
        let url = self.url(path, query)?;
        let token = self.session.valid_access_token().await?;

        let response = self
            .request(method.clone(), url.clone(), &token, body)
            .send()
            .await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            log::warn!("[send] {} {} returned 401, refreshing token", method, path);
            let token = self.session.force_refresh(&token).await?;
            let response = self.request(method, url, &token, body).send().await?;
            check_response(response).await
        } else {
            check_response(response).await
        }
    }

    pub async fn get(&self, path: &str, query: &[(&str, &str)]) -> AppResult<reqwest::Response> {
        self.send(Method::GET, path, query, None).await
    }

    pub async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> AppResult<T> {
        let response = self.get(path, query).await?;
        Ok(response.json().await?)
    }

    pub async fn put(
        &self,
        path: &str,
        query: &[(&str, &str)],
        body: Option<&serde_json::Value>,
    ) -> AppResult<()> {
        self.send(Method::PUT, path, query, body).await?;
        Ok(())
    }

    pub async fn post(
        &self,
        path: &str,
        query: &[(&str, &str)],
        body: Option<&serde_json::Value>,
    ) -> AppResult<()> {
        self.send(Method::POST, path, query, body).await?;
        Ok(())
    }
}

async fn check_response(response: reqwest::Response) -> AppResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = match serde_json::from_str::<ApiErrorBody>(&body) {
        Ok(parsed) => parsed.error.message,
        Err(_) => None,
    }
    .filter(|m| !m.is_empty())
    .unwrap_or_else(|| {
        if body.trim().is_empty() {
            status
                .canonical_reason()
                .unwrap_or("Unknown error")
                .to_string()
        } else {
            body
        }
    });

    Err(AppError::RemoteApi {
        status: status.as_u16(),
        message,
    })
}
