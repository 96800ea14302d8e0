//! Configuration management for the chat Lambda.

use std::env;
use std::str::FromStr;

use crate::{Error, Result};

/// Storefront this assistant sells from.
pub const DEFAULT_STORE_DOMAIN: &str = "rx3brg-0q.myshopify.com";
/// The only origin allowed to call the function from a browser.
pub const DEFAULT_ALLOWED_ORIGIN: &str = "https://aliharake.pro";
/// Longest accepted draft lifetime (one week).
pub const MAX_SESSION_TTL_SECS: i64 = 7 * 24 * 60 * 60;

/// How a checkout link is produced for a resolved variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckoutStrategy {
    /// Build a cart permalink from the variant's numeric id.
    Permalink,
    /// Create a checkout through the storefront `checkoutCreate` mutation.
    CheckoutCreate,
}

impl FromStr for CheckoutStrategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "permalink" | "cart" => Ok(Self::Permalink),
            "checkout_create" | "checkout-create" | "mutation" => Ok(Self::CheckoutCreate),
            other => Err(Error::Config(format!("Unknown checkout strategy: {}", other))),
        }
    }
}

/// Application configuration loaded from environment variables.
///
/// Secrets (the completion API key and the storefront token) are not part of
/// this struct; see [`crate::secrets`].
#[derive(Debug, Clone)]
pub struct Config {
    /// Storefront domain, e.g. `my-store.myshopify.com`
    pub store_domain: String,
    /// Storefront API version segment
    pub storefront_api_version: String,
    /// Origin echoed in `Access-Control-Allow-Origin`
    pub allowed_origin: String,
    /// Base URL of the chat-completion API
    pub completion_base_url: String,
    /// Completion model name
    pub completion_model: String,
    /// Checkout link strategy
    pub checkout_strategy: CheckoutStrategy,
    /// Idle lifetime of an order draft
    pub session_ttl_secs: i64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store_domain: DEFAULT_STORE_DOMAIN.to_string(),
            storefront_api_version: "2023-07".to_string(),
            allowed_origin: DEFAULT_ALLOWED_ORIGIN.to_string(),
            completion_base_url: "https://api.openai.com/v1".to_string(),
            completion_model: "gpt-3.5-turbo".to_string(),
            checkout_strategy: CheckoutStrategy::Permalink,
            session_ttl_secs: 1800,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let checkout_strategy = match env::var("CHECKOUT_STRATEGY") {
            Ok(value) => value.parse()?,
            Err(_) => defaults.checkout_strategy,
        };

        let session_ttl_secs = match env::var("SESSION_TTL_SECS") {
            Ok(value) => parse_session_ttl(&value)?,
            Err(_) => defaults.session_ttl_secs,
        };

        Ok(Self {
            store_domain: env::var("STORE_DOMAIN").unwrap_or(defaults.store_domain),
            storefront_api_version: env::var("STOREFRONT_API_VERSION")
                .unwrap_or(defaults.storefront_api_version),
            allowed_origin: env::var("ALLOWED_ORIGIN").unwrap_or(defaults.allowed_origin),
            completion_base_url: env::var("OPENAI_BASE_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(defaults.completion_base_url),
            completion_model: env::var("OPENAI_MODEL").unwrap_or(defaults.completion_model),
            checkout_strategy,
            session_ttl_secs,
        })
    }

    /// GraphQL endpoint of the storefront API.
    pub fn storefront_endpoint(&self) -> String {
        format!(
            "https://{}/api/{}/graphql.json",
            self.store_domain, self.storefront_api_version
        )
    }
}

/// Seconds in `1..=MAX_SESSION_TTL_SECS`.
fn parse_session_ttl(value: &str) -> Result<i64> {
    value
        .trim()
        .parse::<i64>()
        .ok()
        .filter(|ttl| (1..=MAX_SESSION_TTL_SECS).contains(ttl))
        .ok_or_else(|| Error::Config(format!("Invalid SESSION_TTL_SECS: {}", value)))
}
