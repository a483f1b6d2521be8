//! Read-only client for the Finam TradeAPI REST gateway.
//!
//! Authentication is a two-step affair: the long-lived secret is exchanged
//! for a JWT via `POST /v1/sessions`, and the JWT is then sent as the
//! `Authorization` header on every other call. The JWT is fetched lazily on
//! the first request. When the gateway rejects it with `401` the session is
//! reopened and the request retried once.

use reqwest::{Client, Method, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use url::Url;

pub const FINAM_HOST: &str = "https://api.finam.ru";
pub const DEFAULT_TIMEFRAME: &str = "TIME_FRAME_D";

#[derive(Error, Debug)]
pub enum FinamError {
    #[error("Failed to build HTTP client: {0}")]
    Client(String),

    #[error("Request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Finam API returned {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("Session response did not contain a token")]
    MissingToken,

    #[error("Invalid URL: {0}")]
    Url(String),
}

pub type FinamResult<T> = Result<T, FinamError>;

#[derive(Debug, Clone)]
pub struct FinamClientConfig {
    pub host: String,
    /// Secret used to open a session
    pub token: String,
    pub timeout: Duration,
}

impl FinamClientConfig {
    pub fn new<S: Into<String>>(token: S) -> Self {
        Self {
            host: FINAM_HOST.to_string(),
            token: token.into(),
            timeout: Duration::from_secs(30),
        }
    }
}

/// Optional bounds for a candles request
#[derive(Debug, Clone, Default)]
pub struct BarsQuery {
    pub timeframe: Option<String>,
    pub start: Option<String>,
    pub end: Option<String>,
}

#[derive(Deserialize)]
struct SessionResponse {
    token: Option<String>,
}

pub struct FinamClient {
    http: Client,
    base: Url,
    secret: String,
    jwt: Mutex<Option<String>>,
}

impl FinamClient {
    pub fn new(config: FinamClientConfig) -> FinamResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| FinamError::Client(e.to_string()))?;
        let base = Url::parse(&config.host).map_err(|e| FinamError::Url(e.to_string()))?;

        Ok(Self {
            http,
            base,
            secret: config.token,
            jwt: Mutex::new(None),
        })
    }

    fn url(&self, segments: &[&str]) -> FinamResult<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| FinamError::Url(self.base.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn jwt(&self) -> FinamResult<String> {
        let mut jwt = self.jwt.lock().await;
        if let Some(token) = jwt.as_ref() {
            return Ok(token.clone());
        }

        let response = self
            .http
            .post(self.url(&["v1", "sessions"])?)
            .json(&json!({ "secret": self.secret }))
            .send()
            .await?;
        let session: SessionResponse = Self::check(response).await?.json().await?;
        let token = session.token.ok_or(FinamError::MissingToken)?;

        tracing::debug!("opened Finam session");
        *jwt = Some(token.clone());
        Ok(token)
    }

    async fn check(response: reqwest::Response) -> FinamResult<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(FinamError::Status { status, body })
        }
    }

    /// Drop the cached token unless another request already replaced it
    async fn invalidate(&self, stale: &str) {
        let mut jwt = self.jwt.lock().await;
        if jwt.as_deref() == Some(stale) {
            *jwt = None;
        }
    }

    async fn send_get(
        &self,
        url: &Url,
        token: &str,
        query: &[(&str, &str)],
    ) -> FinamResult<reqwest::Response> {
        Ok(self
            .http
            .request(Method::GET, url.clone())
            .header("Authorization", token)
            .query(query)
            .send()
            .await?)
    }

    async fn get(&self, segments: &[&str], query: &[(&str, &str)]) -> FinamResult<Value> {
        let url = self.url(segments)?;
        tracing::debug!(url = %url, "finam request");

        let token = self.jwt().await?;
        let mut response = self.send_get(&url, &token, query).await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            tracing::info!(url = %url, "Finam session rejected, reopening");
            self.invalidate(&token).await;
            let token = self.jwt().await?;
            response = self.send_get(&url, &token, query).await?;
        }
        Ok(Self::check(response).await?.json().await?)
    }

    pub async fn exchanges(&self) -> FinamResult<Value> {
        self.get(&["v1", "exchanges"], &[]).await
    }

    pub async fn assets(&self) -> FinamResult<Value> {
        self.get(&["v1", "assets"], &[]).await
    }

    /// Case-insensitive match on symbol, ticker or name over the asset list
    pub async fn search_instruments(&self, query: &str) -> FinamResult<Vec<Value>> {
        let assets = self.assets().await?;
        Ok(filter_assets(&assets, query))
    }

    pub async fn quote(&self, symbol: &str) -> FinamResult<Value> {
        self.get(&["v1", "instruments", symbol, "quotes", "latest"], &[])
            .await
    }

    pub async fn orderbook(&self, symbol: &str) -> FinamResult<Value> {
        self.get(&["v1", "instruments", symbol, "orderbook"], &[])
            .await
    }

    pub async fn bars(&self, symbol: &str, query: &BarsQuery) -> FinamResult<Value> {
        let timeframe = normalize_timeframe(query.timeframe.as_deref());
        let mut params = vec![("timeframe", timeframe.as_str())];
        if let Some(start) = query.start.as_deref() {
            params.push(("interval.start_time", start));
        }
        if let Some(end) = query.end.as_deref() {
            params.push(("interval.end_time", end));
        }
        self.get(&["v1", "instruments", symbol, "bars"], &params)
            .await
    }

    pub async fn account(&self, account_id: &str) -> FinamResult<Value> {
        self.get(&["v1", "accounts", account_id], &[]).await
    }
}

/// Accepts `D`, `H1`, `M5` style shorthands as well as full enum names
pub fn normalize_timeframe(timeframe: Option<&str>) -> String {
    match timeframe.map(str::trim).filter(|t| !t.is_empty()) {
        None => DEFAULT_TIMEFRAME.to_string(),
        Some(t) if t.to_ascii_uppercase().starts_with("TIME_FRAME_") => t.to_ascii_uppercase(),
        Some(t) => format!("TIME_FRAME_{}", t.to_ascii_uppercase()),
    }
}

fn filter_assets(assets: &Value, query: &str) -> Vec<Value> {
    let needle = query.trim().to_lowercase();
    let list = assets
        .get("assets")
        .and_then(|a| a.as_array())
        .or_else(|| assets.as_array());

    let Some(list) = list else {
        return Vec::new();
    };

    list.iter()
        .filter(|asset| {
            ["symbol", "ticker", "name"].iter().any(|field| {
                asset
                    .get(*field)
                    .and_then(|v| v.as_str())
                    .is_some_and(|v| v.to_lowercase().contains(&needle))
            })
        })
        .cloned()
        .collect()
}
