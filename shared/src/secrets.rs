//! API credentials from the environment or AWS Secrets Manager.

use aws_sdk_secretsmanager::Client as SecretsClient;
use std::collections::HashMap;
use std::fmt;
use std::sync::OnceLock;
use tokio::sync::RwLock;
use tracing::info;

use crate::{Error, Result};

/// Cached secrets with lazy initialization.
static SECRETS_CACHE: OnceLock<RwLock<HashMap<String, String>>> = OnceLock::new();

fn get_cache() -> &'static RwLock<HashMap<String, String>> {
    SECRETS_CACHE.get_or_init(|| RwLock::new(HashMap::new()))
}

/// Credentials for the two outbound APIs.
#[derive(Clone)]
pub struct Credentials {
    pub completion_api_key: String,
    pub storefront_token: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("completion_api_key", &"<redacted>")
            .field("storefront_token", &"<redacted>")
            .finish()
    }
}

/// Where a single credential comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Source {
    Env(String),
    SecretArn(String),
}

/// Pick the source for a credential: the plain variable wins over `<NAME>_SECRET_ARN`.
fn source_for(name: &str, lookup: impl Fn(&str) -> Option<String>) -> Result<Source> {
    if let Some(value) = lookup(name).filter(|v| !v.trim().is_empty()) {
        return Ok(Source::Env(value));
    }
    let arn_var = format!("{}_SECRET_ARN", name);
    lookup(arn_var.as_str())
        .filter(|v| !v.trim().is_empty())
        .map(Source::SecretArn)
        .ok_or_else(|| Error::Config(format!("{} or {} must be set", name, arn_var)))
}

impl Credentials {
    /// Load both credentials, calling Secrets Manager only when an ARN is configured.
    pub async fn load() -> Result<Self> {
        let lookup = |name: &str| std::env::var(name).ok();
        let completion = source_for("OPENAI_API_KEY", lookup)?;
        let storefront = source_for("SHOPIFY_STOREFRONT_TOKEN", lookup)?;

        let client = match (&completion, &storefront) {
            (Source::Env(_), Source::Env(_)) => None,
            _ => {
                let config =
                    aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
                Some(SecretsClient::new(&config))
            }
        };

        Ok(Self {
            completion_api_key: resolve(client.as_ref(), completion).await?,
            storefront_token: resolve(client.as_ref(), storefront).await?,
        })
    }
}

async fn resolve(client: Option<&SecretsClient>, source: Source) -> Result<String> {
    match source {
        Source::Env(value) => Ok(value),
        Source::SecretArn(arn) => {
            let client = client
                .ok_or_else(|| Error::Internal("Secrets Manager client not initialised".into()))?;
            get_secret(client, &arn).await
        }
    }
}

/// Get a secret value from Secrets Manager with caching.
pub async fn get_secret(client: &SecretsClient, secret_arn: &str) -> Result<String> {
    // Check cache first
    {
        let cache = get_cache().read().await;
        if let Some(value) = cache.get(secret_arn) {
            return Ok(value.clone());
        }
    }

    info!(secret_arn = %secret_arn, "Fetching secret");

    let response = client
        .get_secret_value()
        .secret_id(secret_arn)
        .send()
        .await
        .map_err(|e| Error::Aws(format!("Failed to get secret: {}", e)))?;

    let secret_string = response
        .secret_string()
        .ok_or_else(|| Error::Aws("Secret has no string value".to_string()))?
        .trim()
        .to_string();

    {
        let mut cache = get_cache().write().await;
        cache.insert(secret_arn.to_string(), secret_string.clone());
    }

    Ok(secret_string)
}
