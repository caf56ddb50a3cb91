//! One-shot request/response exchange with the conversational backend.
use std::time::Duration;

use anyhow::{Error, Result, bail};
use serde_json::json;

/// Session metadata sent along with every message.
#[derive(Clone, Debug)]
pub struct SendMeta {
    pub child_name: String,
    pub language: String,
}

/// Client for the conversational backend. Holds connection config only;
/// every send opens a fresh exchange and the reply stream it returns is
/// consumed once, in order.
#[derive(Clone)]
pub struct Backend {
    client: reqwest::Client,
    url: String,
    timeout: Duration,
}

impl Backend {
    pub fn new(url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.to_string(),
            timeout: Duration::from_secs(60),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Send one user message and return the response, whose body is the
    /// chunked reply stream. A non-success status is an error here; the
    /// caller decides how to surface it. No retries.
    pub async fn open(&self, text: &str, meta: &SendMeta) -> Result<reqwest::Response, Error> {
        let payload = json!({
            "messages": [{"role": "user", "content": text}],
            "childName": meta.child_name,
            "language": meta.language,
        });

        let response = self
            .client
            .post(&self.url)
            .header("Content-Type", "application/json")
            .timeout(self.timeout)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            bail!("Chat backend returned {}", status);
        }

        Ok(response)
    }
}
