//! DeepL API client.
//! Keys ending in `:fx` belong to the free tier and use the api-free endpoint.
//! Language codes are mapped through a fixed table; unmapped pairs are refused.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use super::{
    ProviderError, ProviderUsage, Translator, AVAILABILITY_TIMEOUT, TRANSLATE_TIMEOUT,
    USAGE_TIMEOUT,
};

pub const FREE_API_URL: &str = "https://api-free.deepl.com/v2";
pub const PRO_API_URL: &str = "https://api.deepl.com/v2";

const FREE_KEY_SUFFIX: &str = ":fx";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Free,
    Pro,
}

impl Tier {
    pub fn from_key(api_key: &str) -> Self {
        if api_key.ends_with(FREE_KEY_SUFFIX) {
            Tier::Free
        } else {
            Tier::Pro
        }
    }

    pub fn identifier(self) -> &'static str {
        match self {
            Tier::Free => "deepl_free",
            Tier::Pro => "deepl_pro",
        }
    }

    pub fn base_url(self) -> &'static str {
        match self {
            Tier::Free => FREE_API_URL,
            Tier::Pro => PRO_API_URL,
        }
    }
}

/// Map a two-letter code to DeepL's code set.
pub fn map_language_code(code: &str) -> Option<&'static str> {
    let mapped = match code {
        "en" => "EN",
        "de" => "DE",
        "fr" => "FR",
        "es" => "ES",
        "it" => "IT",
        "pt" => "PT",
        "ru" => "RU",
        "ja" => "JA",
        "zh" => "ZH",
        "pl" => "PL",
        "nl" => "NL",
        "hu" => "HU",
        "ko" => "KO",
        "ar" => "AR",
        // Thai may be rejected upstream; the API error surfaces as a failure.
        "th" => "TH",
        _ => return None,
    };
    Some(mapped)
}

pub struct DeepLClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    tier: Tier,
}

#[derive(Deserialize)]
struct DeepLResponse {
    #[serde(default)]
    translations: Vec<DeepLTranslation>,
    message: Option<String>,
}

#[derive(Deserialize)]
struct DeepLTranslation {
    text: String,
}

impl DeepLClient {
    pub fn new(api_key: &str, base_url: Option<&str>) -> crate::Result<Self> {
        Ok(Self::with_client(super::http_client()?, api_key, base_url))
    }

    /// `base_url` overrides the tier endpoint (self-hosted proxies, tests).
    pub fn with_client(http: reqwest::Client, api_key: &str, base_url: Option<&str>) -> Self {
        let tier = Tier::from_key(api_key);
        let base_url = base_url
            .unwrap_or_else(|| tier.base_url())
            .trim_end_matches('/')
            .to_string();
        Self {
            http,
            api_key: api_key.to_string(),
            base_url,
            tier,
        }
    }

    pub fn tier(&self) -> Tier {
        self.tier
    }

    fn auth_header(&self) -> String {
        format!("DeepL-Auth-Key {}", self.api_key)
    }

    async fn request_translation(
        &self,
        text: &str,
        from: &str,
        to: &str,
    ) -> Result<String, ProviderError> {
        if self.api_key.is_empty() {
            return Err(ProviderError::MissingApiKey);
        }
        let source = map_language_code(from)
            .ok_or_else(|| ProviderError::UnsupportedLanguage(from.to_string()))?;
        let target = map_language_code(to)
            .ok_or_else(|| ProviderError::UnsupportedLanguage(to.to_string()))?;

        let form = [
            ("text", text),
            ("source_lang", source),
            ("target_lang", target),
            ("preserve_formatting", "1"),
        ];

        let response = self
            .http
            .post(format!("{}/translate", self.base_url))
            .header("Authorization", self.auth_header())
            .timeout(TRANSLATE_TIMEOUT)
            .form(&form)
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN
        {
            return Err(ProviderError::Auth(status.as_u16()));
        }

        let raw = response.text().await?;
        let parsed = serde_json::from_str::<DeepLResponse>(&raw);

        if !status.is_success() {
            return Err(match parsed.ok().and_then(|r| r.message) {
                Some(message) => ProviderError::Api(message),
                None => ProviderError::Status {
                    status: status.as_u16(),
                    body: raw.chars().take(200).collect(),
                },
            });
        }

        let parsed = parsed.map_err(|e| ProviderError::MalformedResponse(e.to_string()))?;
        if let Some(first) = parsed.translations.into_iter().next() {
            return Ok(first.text);
        }
        Err(match parsed.message {
            Some(message) => ProviderError::Api(message),
            None => ProviderError::MalformedResponse("no translations in response".into()),
        })
    }

    async fn get_usage(&self) -> Result<ProviderUsage, ProviderError> {
        if self.api_key.is_empty() {
            return Err(ProviderError::MissingApiKey);
        }
        let response = self
            .http
            .get(format!("{}/usage", self.base_url))
            .header("Authorization", self.auth_header())
            .timeout(USAGE_TIMEOUT)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Status {
                status: status.as_u16(),
                body: String::new(),
            });
        }
        response
            .json::<ProviderUsage>()
            .await
            .map_err(|e| ProviderError::MalformedResponse(e.to_string()))
    }
}

#[async_trait]
impl Translator for DeepLClient {
    async fn translate(&self, text: &str, from: &str, to: &str) -> Result<String, ProviderError> {
        let result = self.request_translation(text, from, to).await;
        match &result {
            Ok(_) => debug!(from, to, tier = self.tier.identifier(), "DeepL call succeeded"),
            Err(e) => warn!(error = %e, from, to, "DeepL API error"),
        }
        result
    }

    fn name(&self) -> &str {
        self.tier.identifier()
    }

    async fn is_available(&self) -> bool {
        if self.api_key.is_empty() {
            return false;
        }
        match self
            .http
            .get(format!("{}/usage", self.base_url))
            .header("Authorization", self.auth_header())
            .timeout(AVAILABILITY_TIMEOUT)
            .send()
            .await
        {
            Ok(resp) => resp.status() == reqwest::StatusCode::OK,
            Err(e) => {
                debug!(error = %e, "DeepL availability probe failed");
                false
            }
        }
    }

    async fn usage(&self) -> Option<ProviderUsage> {
        match self.get_usage().await {
            Ok(usage) => Some(usage),
            Err(e) => {
                warn!(error = %e, "DeepL usage probe failed");
                None
            }
        }
    }
}
