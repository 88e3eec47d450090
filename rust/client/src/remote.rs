use std::time::Duration;

use parlor_engine::games::GameKind;
use parlor_engine::ledger::Transaction;
use parlor_engine::machine::ActionPayload;
use parlor_engine::money::Amount;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use url::Url;

use crate::config::ClientConfig;
use crate::protocol::{self, AuthorityResponse};

/// Failure talking to the authority.
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("authority responded with {status}: {body}")]
    Status { status: StatusCode, body: String },
    /// The authority refused the action; the message is shown as is.
    #[error("{0}")]
    Authority(String),
    #[error("unreadable authority response: {0}")]
    Decode(String),
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),
    #[error("invalid URL scheme: {0} (expected http or https)")]
    InvalidScheme(String),
}

impl RemoteError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, RemoteError::Transport(err) if err.is_timeout())
    }
}

#[derive(Deserialize)]
struct BalanceBody {
    balance: Amount,
}

/// HTTP client for the authority. One request per call, no retries.
#[derive(Debug, Clone)]
pub struct RemoteActionClient {
    base_url: Url,
    http: reqwest::Client,
}

impl RemoteActionClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, RemoteError> {
        let mut base_url = Url::parse(base_url)?;
        if !matches!(base_url.scheme(), "http" | "https") {
            return Err(RemoteError::InvalidScheme(base_url.scheme().to_string()));
        }
        // Keep any path prefix when joining endpoint paths.
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { base_url, http })
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self, RemoteError> {
        Self::new(&config.base_url, config.request_timeout())
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Posts `payload` to the game's endpoint.
    ///
    /// An `{error}` body is reported as [`RemoteError::Authority`] whatever
    /// the status code.
    pub async fn send(
        &self,
        game: GameKind,
        payload: &ActionPayload,
    ) -> Result<AuthorityResponse, RemoteError> {
        let url = self.base_url.join(&format!("api/play/{}", game.slug()))?;
        let body = protocol::request_body(payload);
        tracing::debug!(game = %game, url = %url, body = %body, "sending action");

        let response = self.http.post(url).json(&body).send().await?;
        read_json(response).await
    }

    pub async fn balance(&self) -> Result<Amount, RemoteError> {
        let url = self.base_url.join("api/balance")?;
        let response = self.http.get(url).send().await?;
        let body: BalanceBody = read_json(response).await?;
        Ok(body.balance)
    }

    /// Recent transactions, most recent first.
    pub async fn history(&self) -> Result<Vec<Transaction>, RemoteError> {
        let url = self.base_url.join("api/history")?;
        let response = self.http.get(url).send().await?;
        read_json(response).await
    }
}

async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, RemoteError> {
    let status = response.status();
    let bytes = response.bytes().await?;

    let value: Value = match serde_json::from_slice(&bytes) {
        Ok(value) => value,
        Err(err) if status.is_success() => return Err(RemoteError::Decode(err.to_string())),
        Err(_) => {
            return Err(RemoteError::Status {
                status,
                body: String::from_utf8_lossy(&bytes).into_owned(),
            })
        }
    };

    if let Some(message) = value.get("error").and_then(Value::as_str) {
        return Err(RemoteError::Authority(message.to_string()));
    }
    if !status.is_success() {
        return Err(RemoteError::Status {
            status,
            body: value.to_string(),
        });
    }
    serde_json::from_value(value).map_err(|err| RemoteError::Decode(err.to_string()))
}
