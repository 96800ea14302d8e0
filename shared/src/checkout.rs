//! Variant resolution and checkout links.

use tracing::info;

use crate::catalog::{Product, Storefront, Variant};
use crate::config::CheckoutStrategy;
use crate::sizing::Size;
use crate::{Error, Result};

/// The details a confirmation reply is built from.
#[derive(Debug, Clone)]
pub struct Confirmation<'a> {
    pub name: &'a str,
    pub product: &'a str,
    pub size: &'a str,
    pub address: Option<&'a str>,
    pub phone: Option<&'a str>,
    pub checkout_url: &'a str,
}

fn same_size(candidate: &str, wanted: &str) -> bool {
    let candidate = candidate.trim();
    let wanted = wanted.trim();
    if candidate.eq_ignore_ascii_case(wanted) {
        return true;
    }
    match (candidate.parse::<Size>(), wanted.parse::<Size>()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// The variant of `product` for `size`, whether or not it is in stock.
///
/// Tried in order: the whole variant title, any `/`-separated option of the
/// title, any alphanumeric word of the title, then a plain substring match.
/// The substring pass is skipped for size names so `L` never lands on `XL`.
pub fn select_variant<'a>(product: &'a Product, size: &str) -> Option<&'a Variant> {
    let wanted = size.trim();
    if wanted.is_empty() {
        return None;
    }
    product
        .variants
        .iter()
        .find(|v| same_size(&v.title, wanted))
        .or_else(|| {
            product
                .variants
                .iter()
                .find(|v| v.title.split('/').any(|option| same_size(option, wanted)))
        })
        .or_else(|| {
            product.variants.iter().find(|v| {
                v.title
                    .split(|c: char| !c.is_ascii_alphanumeric())
                    .any(|word| !word.is_empty() && same_size(word, wanted))
            })
        })
        .or_else(|| {
            if wanted.parse::<Size>().is_ok() {
                return None;
            }
            let needle = wanted.to_lowercase();
            product
                .variants
                .iter()
                .find(|v| v.title.to_lowercase().contains(&needle))
        })
}

/// Cart permalink for one unit of a variant: `https://<domain>/cart/<id>:1`.
pub fn cart_permalink(store_domain: &str, variant_id: &str) -> Result<String> {
    let numeric = variant_id.rsplit('/').next().unwrap_or_default();
    if numeric.is_empty() || !numeric.chars().all(|c| c.is_ascii_digit()) {
        return Err(Error::Storefront(format!("Unexpected variant id: {}", variant_id)));
    }
    Ok(format!("https://{}/cart/{}:1", store_domain, numeric))
}

/// Produce a checkout URL for `variant` using the configured strategy.
pub async fn checkout_url<S: Storefront>(
    storefront: &S,
    strategy: CheckoutStrategy,
    store_domain: &str,
    variant: &Variant,
) -> Result<String> {
    let url = match strategy {
        CheckoutStrategy::Permalink => cart_permalink(store_domain, &variant.id)?,
        CheckoutStrategy::CheckoutCreate => storefront.create_checkout(&variant.id).await?,
    };
    info!(variant_id = %variant.id, strategy = ?strategy, "Checkout link ready");
    Ok(url)
}

pub fn out_of_stock_reply(product: &str, size: &str) -> String {
    format!(
        "Sorry, size {} is out of stock for {}. Would you like to pick another size?",
        size, product
    )
}

pub fn product_not_found_reply(product: &str) -> String {
    format!("Product \"{}\" not found.", product)
}

pub fn confirmation_reply(order: &Confirmation<'_>) -> String {
    let mut reply = format!(
        "Thanks {}! Your order for {} (Size {}) is ready.\n\n",
        order.name, order.product, order.size
    );
    if let Some(address) = order.address {
        reply.push_str(&format!("📦 Address: {}\n", address));
    }
    if let Some(phone) = order.phone {
        reply.push_str(&format!("📞 Phone: {}\n", phone));
    }
    reply.push_str(&format!(
        "\nClick below to complete your purchase:\n{}",
        order.checkout_url
    ));
    reply
}
