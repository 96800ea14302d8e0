//! Storefront GraphQL client and catalog types.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::future::Future;
use tracing::{error, info};

use crate::{Config, Error, Result};

const PRODUCTS_QUERY: &str = r#"
query Products {
  products(first: 10) {
    edges {
      node {
        id
        title
        description
        variants(first: 10) {
          edges {
            node {
              id
              title
              availableForSale
              price {
                amount
                currencyCode
              }
            }
          }
        }
      }
    }
  }
}
"#;

const CHECKOUT_CREATE_MUTATION: &str = r#"
mutation CheckoutCreate($variantId: ID!) {
  checkoutCreate(input: { lineItems: [{ variantId: $variantId, quantity: 1 }] }) {
    checkout {
      id
      webUrl
    }
    userErrors {
      field
      message
    }
  }
}
"#;

/// A product as returned by the storefront, with its variants flattened.
#[derive(Debug, Clone, PartialEq)]
pub struct Product {
    pub id: String,
    pub title: String,
    pub description: String,
    pub variants: Vec<Variant>,
}

/// A purchasable option of a product (one size).
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Variant {
    pub id: String,
    pub title: String,
    pub available_for_sale: bool,
    pub price: Money,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Money {
    pub amount: String,
    #[serde(default)]
    pub currency_code: Option<String>,
}

impl Product {
    /// Variants that can currently be bought.
    pub fn in_stock(&self) -> impl Iterator<Item = &Variant> {
        self.variants.iter().filter(|v| v.available_for_sale)
    }

    /// One line describing sizes and prices, used in prompts.
    pub fn summary(&self) -> String {
        let sizes: Vec<&str> = self.variants.iter().map(|v| v.title.as_str()).collect();
        let prices: Vec<String> = self.variants.iter().map(|v| format!("${}", v.price.amount)).collect();
        format!(
            "{} - Available sizes: {} - Prices: {}",
            self.title,
            sizes.join(", "),
            prices.join(", ")
        )
    }
}

/// First product (in catalog order) whose title appears in `text`, ignoring case.
pub fn find_mentioned<'a>(products: &'a [Product], text: &str) -> Option<&'a Product> {
    let text = text.to_lowercase();
    products
        .iter()
        .find(|p| !p.title.trim().is_empty() && text.contains(&p.title.to_lowercase()))
}

/// Product whose title equals `title`, ignoring case and surrounding whitespace.
pub fn find_by_title<'a>(products: &'a [Product], title: &str) -> Option<&'a Product> {
    let title = title.trim().to_lowercase();
    products.iter().find(|p| p.title.trim().to_lowercase() == title)
}

/// Access to the commerce backend.
pub trait Storefront: Send + Sync {
    /// Fetch the current catalog.
    fn products(&self) -> impl Future<Output = Result<Vec<Product>>> + Send;

    /// Create a one-item checkout for a variant and return its web URL.
    fn create_checkout(&self, variant_id: &str) -> impl Future<Output = Result<String>> + Send;
}

// GraphQL wire shapes

#[derive(Debug, Deserialize)]
struct GraphQlResponse<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct Connection<T> {
    edges: Vec<Edge<T>>,
}

#[derive(Debug, Deserialize)]
struct Edge<T> {
    node: T,
}

#[derive(Debug, Deserialize)]
struct ProductsData {
    products: Connection<ProductNode>,
}

#[derive(Debug, Deserialize)]
struct ProductNode {
    id: String,
    title: String,
    #[serde(default)]
    description: String,
    variants: Connection<Variant>,
}

impl From<ProductNode> for Product {
    fn from(node: ProductNode) -> Self {
        Self {
            id: node.id,
            title: node.title,
            description: node.description,
            variants: node.variants.edges.into_iter().map(|e| e.node).collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CheckoutCreateData {
    checkout_create: Option<CheckoutCreatePayload>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CheckoutCreatePayload {
    checkout: Option<Checkout>,
    #[serde(default)]
    user_errors: Vec<UserError>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Checkout {
    web_url: String,
}

#[derive(Debug, Deserialize)]
struct UserError {
    #[serde(default)]
    field: Option<Vec<String>>,
    message: String,
}

fn unwrap_graphql<T>(response: GraphQlResponse<T>) -> Result<T> {
    if !response.errors.is_empty() {
        let messages: Vec<String> = response.errors.into_iter().map(|e| e.message).collect();
        return Err(Error::Storefront(messages.join("; ")));
    }
    response
        .data
        .ok_or_else(|| Error::Storefront("Response has no data".to_string()))
}

fn parse_products(body: &[u8]) -> Result<Vec<Product>> {
    let response: GraphQlResponse<ProductsData> = serde_json::from_slice(body)?;
    let data = unwrap_graphql(response)?;
    Ok(data
        .products
        .edges
        .into_iter()
        .map(|edge| Product::from(edge.node))
        .collect())
}

fn parse_checkout(body: &[u8]) -> Result<String> {
    let response: GraphQlResponse<CheckoutCreateData> = serde_json::from_slice(body)?;
    let payload = unwrap_graphql(response)?
        .checkout_create
        .ok_or_else(|| Error::Storefront("checkoutCreate returned null".to_string()))?;

    if !payload.user_errors.is_empty() {
        let messages: Vec<String> = payload
            .user_errors
            .into_iter()
            .map(|e| match e.field {
                Some(field) if !field.is_empty() => format!("{}: {}", field.join("."), e.message),
                _ => e.message,
            })
            .collect();
        return Err(Error::Storefront(messages.join("; ")));
    }

    payload
        .checkout
        .map(|c| c.web_url)
        .ok_or_else(|| Error::Storefront("checkoutCreate returned no checkout".to_string()))
}

/// Storefront API client over HTTPS.
pub struct StorefrontClient {
    http_client: reqwest::Client,
    endpoint: String,
    access_token: String,
}

impl StorefrontClient {
    pub fn new(http_client: reqwest::Client, config: &Config, access_token: String) -> Self {
        Self {
            http_client,
            endpoint: config.storefront_endpoint(),
            access_token,
        }
    }

    async fn post_graphql(&self, query: &str, variables: Value) -> Result<Vec<u8>> {
        #[derive(Serialize)]
        struct Payload<'a> {
            query: &'a str,
            variables: Value,
        }

        let response = self
            .http_client
            .post(&self.endpoint)
            .header("X-Shopify-Storefront-Access-Token", &self.access_token)
            .json(&Payload { query, variables })
            .send()
            .await?;

        let status = response.status();
        let body = response.bytes().await?;

        if !status.is_success() {
            let text = String::from_utf8_lossy(&body);
            error!(status = %status, "Storefront request failed");
            return Err(Error::Storefront(format!("Storefront returned {}: {}", status, text)));
        }

        Ok(body.to_vec())
    }
}

impl Storefront for StorefrontClient {
    async fn products(&self) -> Result<Vec<Product>> {
        let body = self.post_graphql(PRODUCTS_QUERY, json!({})).await?;
        let products = parse_products(&body)?;
        info!(count = products.len(), "Fetched catalog");
        Ok(products)
    }

    async fn create_checkout(&self, variant_id: &str) -> Result<String> {
        let body = self
            .post_graphql(CHECKOUT_CREATE_MUTATION, json!({ "variantId": variant_id }))
            .await?;
        let url = parse_checkout(&body)?;
        info!(variant_id = %variant_id, "Created checkout");
        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PRODUCTS_JSON: &str = r#"{
      "data": {
        "products": {
          "edges": [
            {
              "node": {
                "id": "gid://shopify/Product/1",
                "title": "Classic Hoodie",
                "description": "Warm.",
                "variants": {
                  "edges": [
                    { "node": { "id": "gid://shopify/ProductVariant/11", "title": "M", "availableForSale": true, "price": { "amount": "45.0", "currencyCode": "USD" } } },
                    { "node": { "id": "gid://shopify/ProductVariant/12", "title": "XL", "availableForSale": false, "price": { "amount": "47.0" } } }
                  ]
                }
              }
            },
            {
              "node": {
                "id": "gid://shopify/Product/2",
                "title": "Hoodie",
                "variants": { "edges": [] }
              }
            }
          ]
        }
      }
    }"#;

    #[test]
    fn test_parse_products_flattens_edges() {
        let products = parse_products(PRODUCTS_JSON.as_bytes()).unwrap();
        assert_eq!(products.len(), 2);
        assert_eq!(products[0].title, "Classic Hoodie");
        assert_eq!(products[0].variants.len(), 2);
        assert!(!products[0].variants[1].available_for_sale);
        assert_eq!(products[0].variants[1].price.currency_code, None);
        assert_eq!(products[1].description, "");
        assert_eq!(products[0].in_stock().count(), 1);
    }

    #[test]
    fn test_graphql_errors_become_storefront_error() {
        let body = br#"{"data": null, "errors": [{"message": "Access denied"}]}"#;
        let err = parse_products(body).unwrap_err();
        assert!(matches!(err, Error::Storefront(ref m) if m == "Access denied"));
    }

    #[test]
    fn test_parse_checkout() {
        let ok = br#"{"data":{"checkoutCreate":{"checkout":{"id":"c1","webUrl":"https://shop/checkouts/c1"},"userErrors":[]}}}"#;
        assert_eq!(parse_checkout(ok).unwrap(), "https://shop/checkouts/c1");

        let rejected = br#"{"data":{"checkoutCreate":{"checkout":null,"userErrors":[{"field":["input","lineItems"],"message":"Variant is sold out"}]}}}"#;
        let err = parse_checkout(rejected).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Storefront error: input.lineItems: Variant is sold out"
        );
    }

    #[test]
    fn test_find_mentioned_first_match_wins() {
        let products = parse_products(PRODUCTS_JSON.as_bytes()).unwrap();
        let found = find_mentioned(&products, "i want the CLASSIC HOODIE please").unwrap();
        assert_eq!(found.id, "gid://shopify/Product/1");

        let found = find_mentioned(&products, "just a hoodie").unwrap();
        assert_eq!(found.id, "gid://shopify/Product/2");

        assert!(find_mentioned(&products, "a pair of socks").is_none());
    }

    #[test]
    fn test_find_by_title_and_summary() {
        let products = parse_products(PRODUCTS_JSON.as_bytes()).unwrap();
        assert!(find_by_title(&products, "  classic hoodie ").is_some());
        assert!(find_by_title(&products, "classic").is_none());
        assert_eq!(
            products[0].summary(),
            "Classic Hoodie - Available sizes: M, XL - Prices: $45.0, $47.0"
        );
    }
}
