//! Shared data models.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::sizing::Size;

/// Chat request payload.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
    /// Height in cm, as a number or a numeric string
    #[serde(default)]
    pub height: Option<Value>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub selected_product: Option<String>,
    #[serde(default)]
    pub selected_size: Option<String>,
}

impl ChatRequest {
    /// The message, if present and not blank.
    pub fn message(&self) -> Option<&str> {
        self.message
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
    }

    /// Height in whole centimetres. Strings are read up to the first non-digit.
    pub fn height_cm(&self) -> Option<u32> {
        match self.height.as_ref()? {
            Value::Number(n) => n
                .as_u64()
                .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
                .and_then(|h| u32::try_from(h).ok()),
            Value::String(s) => {
                let digits: String = s.trim().chars().take_while(|c| c.is_ascii_digit()).collect();
                digits.parse().ok()
            }
            _ => None,
        }
    }

    /// Whether the caller picked both a product and a size explicitly.
    pub fn has_explicit_order(&self) -> bool {
        non_blank(&self.selected_product).is_some() && non_blank(&self.selected_size).is_some()
    }
}

pub(crate) fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Chat response payload.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    pub reply: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_suggestion: Option<Size>,
    pub session_id: String,
}

/// A field the assistant collects before checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OrderField {
    Product,
    Size,
    Name,
    Phone,
    Address,
}

impl OrderField {
    /// Order in which missing fields are asked for.
    pub const PROMPT_ORDER: [OrderField; 5] = [
        OrderField::Product,
        OrderField::Size,
        OrderField::Name,
        OrderField::Phone,
        OrderField::Address,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            OrderField::Product => "product",
            OrderField::Size => "size",
            OrderField::Name => "full name",
            OrderField::Phone => "phone number",
            OrderField::Address => "delivery address",
        }
    }
}

/// Order details collected across turns of one conversation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderDraft {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    /// Product title as listed in the catalog
    pub product: Option<String>,
    pub size: Option<Size>,
    /// Field the last reply asked for, if any
    pub awaiting: Option<OrderField>,
}

impl OrderDraft {
    pub fn has(&self, field: OrderField) -> bool {
        match field {
            OrderField::Product => non_blank(&self.product).is_some(),
            OrderField::Size => self.size.is_some(),
            OrderField::Name => non_blank(&self.name).is_some(),
            OrderField::Phone => non_blank(&self.phone).is_some(),
            OrderField::Address => non_blank(&self.address).is_some(),
        }
    }

    /// Required fields still unset, in prompting order.
    pub fn missing_fields(&self) -> Vec<OrderField> {
        OrderField::PROMPT_ORDER
            .into_iter()
            .filter(|f| !self.has(*f))
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.missing_fields().is_empty()
    }

    /// True once any order detail has been given.
    pub fn is_started(&self) -> bool {
        OrderField::PROMPT_ORDER.iter().any(|f| self.has(*f))
    }
}
