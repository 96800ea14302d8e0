//! Shared library for the storefront chat Lambda.
//!
//! This crate provides the storefront and completion clients, order-field
//! extraction, per-session order drafts and the assistant that ties them together.

pub mod assistant;
pub mod catalog;
pub mod checkout;
pub mod completion;
pub mod config;
pub mod error;
pub mod extract;
pub mod http;
pub mod models;
pub mod rules;
pub mod secrets;
pub mod session;
pub mod sizing;

pub use assistant::{Assistant, ChatOutcome};
pub use catalog::{Product, Storefront, StorefrontClient, Variant};
pub use completion::{Completion, CompletionClient};
pub use config::{CheckoutStrategy, Config};
pub use error::{Error, Result};
pub use models::{ChatRequest, ChatResponse, OrderDraft, OrderField};
pub use secrets::Credentials;
pub use session::SessionStore;
pub use sizing::{recommend_size, Size};
