//! LibreTranslate client (public instance or self-hosted).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{ProviderError, Translator, AVAILABILITY_TIMEOUT, TRANSLATE_TIMEOUT};

pub const DEFAULT_URL: &str = "https://libretranslate.com";

pub struct LibreTranslateClient {
    http: reqwest::Client,
    base_url: String,
}

#[derive(Serialize)]
struct LibreRequest<'a> {
    q: &'a str,
    source: &'a str,
    target: &'a str,
    format: &'a str,
}

#[derive(Deserialize)]
struct LibreResponse {
    #[serde(rename = "translatedText")]
    translated_text: Option<String>,
    error: Option<String>,
}

impl LibreTranslateClient {
    pub fn new(base_url: &str) -> crate::Result<Self> {
        Ok(Self::with_client(super::http_client()?, base_url))
    }

    pub fn with_client(http: reqwest::Client, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn translate_url(&self) -> String {
        format!("{}/translate", self.base_url)
    }

    async fn request_translation(
        &self,
        text: &str,
        from: &str,
        to: &str,
    ) -> Result<String, ProviderError> {
        let body = LibreRequest {
            q: text,
            source: from,
            target: to,
            format: "text",
        };

        let response = self
            .http
            .post(self.translate_url())
            .timeout(TRANSLATE_TIMEOUT)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let raw = response.text().await?;
        let parsed = serde_json::from_str::<LibreResponse>(&raw);

        if status != reqwest::StatusCode::OK {
            return Err(match parsed.ok().and_then(|r| r.error) {
                Some(message) => ProviderError::Api(message),
                None => ProviderError::Status {
                    status: status.as_u16(),
                    body: raw.chars().take(200).collect(),
                },
            });
        }

        let parsed = parsed.map_err(|e| ProviderError::MalformedResponse(e.to_string()))?;
        match (parsed.translated_text, parsed.error) {
            (Some(text), _) => Ok(text),
            (None, Some(message)) => Err(ProviderError::Api(message)),
            (None, None) => Err(ProviderError::MalformedResponse(
                "missing translatedText".into(),
            )),
        }
    }
}

#[async_trait]
impl Translator for LibreTranslateClient {
    async fn translate(&self, text: &str, from: &str, to: &str) -> Result<String, ProviderError> {
        let result = self.request_translation(text, from, to).await;
        match &result {
            Ok(_) => debug!(from, to, "LibreTranslate call succeeded"),
            Err(e) => warn!(error = %e, from, to, "LibreTranslate API error"),
        }
        result
    }

    fn name(&self) -> &str {
        "libre"
    }

    async fn is_available(&self) -> bool {
        // GET /languages is cheap and needs no payload.
        match self
            .http
            .get(format!("{}/languages", self.base_url))
            .timeout(AVAILABILITY_TIMEOUT)
            .send()
            .await
        {
            Ok(resp) => resp.status() == reqwest::StatusCode::OK,
            Err(e) => {
                debug!(error = %e, "LibreTranslate availability probe failed");
                false
            }
        }
    }
}
