//! The shopping assistant: one chat turn from message to reply.
//!
//! A turn runs these steps in order, stopping at the first that answers:
//!
//! 1. explicit order fields (`selectedProduct` + `selectedSize`) skip step 2,
//! 2. short-circuit [`rules`](crate::rules) (small talk, greeting, stock inquiry);
//!    small talk and greetings stay silent when they would swallow order details,
//! 3. field extraction into the session's draft,
//! 4. checkout when the draft is complete (or a stock-out reply),
//! 5. the completion API, prompted with the catalog and the missing fields.

use chrono::Duration;
use tracing::{info, warn};

use crate::catalog::{find_by_title, Product, Storefront};
use crate::checkout::{
    checkout_url, confirmation_reply, out_of_stock_reply, product_not_found_reply, select_variant,
    Confirmation,
};
use crate::completion::Completion;
use crate::extract::{extract, find_height};
use crate::models::{non_blank, ChatRequest, ChatResponse, OrderDraft, OrderField};
use crate::rules;
use crate::session::SessionStore;
use crate::sizing::{recommend_size, Size, SIZE_CHART};
use crate::config::MAX_SESSION_TTL_SECS;
use crate::{Config, Error, Result};

/// A reply together with the HTTP status it should be sent with.
#[derive(Debug, Clone)]
pub struct ChatOutcome {
    pub status: u16,
    pub body: ChatResponse,
}

/// Chat assistant over a storefront and a completion backend.
pub struct Assistant<S, C> {
    storefront: S,
    completion: C,
    sessions: SessionStore,
    config: Config,
}

/// Per-turn values shared by the steps of [`Assistant::respond`].
struct Turn {
    session_id: String,
    size_suggestion: Option<Size>,
    explicit: bool,
}

impl Turn {
    fn reply(&self, status: u16, reply: String) -> ChatOutcome {
        ChatOutcome {
            status,
            body: ChatResponse {
                reply,
                size_suggestion: self.size_suggestion,
                session_id: self.session_id.clone(),
            },
        }
    }

    /// Business rejections are 404 for explicit orders and 200 in conversation.
    fn rejection_status(&self) -> u16 {
        if self.explicit {
            404
        } else {
            200
        }
    }
}

impl<S: Storefront, C: Completion> Assistant<S, C> {
    pub fn new(storefront: S, completion: C, config: Config) -> Self {
        Self {
            storefront,
            completion,
            sessions: SessionStore::new(Duration::seconds(
                config.session_ttl_secs.clamp(1, MAX_SESSION_TTL_SECS),
            )),
            config,
        }
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Answer one chat message.
    pub async fn respond(&self, request: ChatRequest) -> Result<ChatOutcome> {
        let message = request
            .message()
            .ok_or_else(|| Error::Validation("Message is required".to_string()))?;

        let turn = Turn {
            session_id: non_blank(&request.session_id)
                .map(str::to_string)
                .unwrap_or_else(SessionStore::new_session_id),
            size_suggestion: request
                .height_cm()
                .or_else(|| find_height(message))
                .and_then(recommend_size),
            explicit: request.has_explicit_order(),
        };

        let products = self.storefront.products().await?;
        let mut draft = self.sessions.load(&turn.session_id).await;

        if !turn.explicit {
            let carries_order_data =
                draft.is_started() && extract(message, &draft, &products) != draft;
            let answered = if carries_order_data {
                rules::evaluate_with_order_data(message, &products)
            } else {
                rules::evaluate(message, &products)
            };
            if let Some((rule, reply)) = answered {
                info!(session_id = %turn.session_id, rule = rule.name(), "Answered by rule");
                return Ok(turn.reply(200, reply));
            }
        }

        if let Some(outcome) = apply_structured_fields(&mut draft, &request, &products, &turn) {
            return Ok(outcome);
        }
        draft = extract(message, &draft, &products);
        if draft.size.is_none() {
            draft.size = request.height_cm().and_then(recommend_size);
        }

        if turn.explicit || draft.is_complete() {
            if let Some(outcome) = self.try_checkout(&turn, &mut draft, &products).await? {
                return Ok(outcome);
            }
        }

        draft.awaiting = if draft.is_started() {
            draft.missing_fields().first().copied()
        } else {
            None
        };
        info!(
            session_id = %turn.session_id,
            missing = ?draft.missing_fields(),
            "Order draft updated"
        );
        self.sessions.save(&turn.session_id, draft.clone()).await;

        let system_prompt = build_system_prompt(&products, &draft, turn.size_suggestion);
        let reply = self.completion.complete(&system_prompt, message).await?;
        Ok(turn.reply(200, reply))
    }

    /// Check stock for the draft's product and size and, when the draft is
    /// complete, finish the order. `None` means the conversation continues.
    async fn try_checkout(
        &self,
        turn: &Turn,
        draft: &mut OrderDraft,
        products: &[Product],
    ) -> Result<Option<ChatOutcome>> {
        let (Some(title), Some(size)) = (draft.product.clone(), draft.size) else {
            return Ok(None);
        };

        let Some(product) = find_by_title(products, &title) else {
            warn!(session_id = %turn.session_id, product = %title, "Product left the catalog");
            draft.product = None;
            draft.awaiting = Some(OrderField::Product);
            self.sessions.save(&turn.session_id, draft.clone()).await;
            return Ok(Some(turn.reply(turn.rejection_status(), product_not_found_reply(&title))));
        };

        let variant = match select_variant(product, size.as_str()) {
            Some(variant) if variant.available_for_sale => variant,
            _ => {
                info!(
                    session_id = %turn.session_id,
                    product = %product.title,
                    size = %size,
                    "Size out of stock"
                );
                // keep the rest of the order so only the size needs to change
                draft.size = None;
                draft.awaiting = Some(OrderField::Size);
                self.sessions.save(&turn.session_id, draft.clone()).await;
                return Ok(Some(turn.reply(
                    turn.rejection_status(),
                    out_of_stock_reply(&product.title, size.as_str()),
                )));
            }
        };

        if !draft.is_complete() {
            return Ok(None);
        }

        let url = checkout_url(
            &self.storefront,
            self.config.checkout_strategy,
            &self.config.store_domain,
            variant,
        )
        .await?;

        let reply = confirmation_reply(&Confirmation {
            name: non_blank(&draft.name).unwrap_or_default(),
            product: &product.title,
            size: size.as_str(),
            address: non_blank(&draft.address),
            phone: non_blank(&draft.phone),
            checkout_url: &url,
        });

        self.sessions.clear(&turn.session_id).await;
        info!(session_id = %turn.session_id, product = %product.title, size = %size, "Order completed");
        Ok(Some(turn.reply(200, reply)))
    }
}

/// Copy explicit request fields into the draft, overwriting what is there.
/// `height` is not one of them: it only fills a size nothing else supplied.
///
/// Returns an outcome when the selected product or size cannot be used.
fn apply_structured_fields(
    draft: &mut OrderDraft,
    request: &ChatRequest,
    products: &[Product],
    turn: &Turn,
) -> Option<ChatOutcome> {
    if let Some(name) = non_blank(&request.name) {
        draft.name = Some(name.to_string());
    }
    if let Some(phone) = non_blank(&request.phone) {
        draft.phone = Some(phone.to_string());
    }
    if let Some(address) = non_blank(&request.address) {
        draft.address = Some(address.to_string());
    }

    if let Some(selected) = non_blank(&request.selected_product) {
        match find_by_title(products, selected) {
            Some(product) => draft.product = Some(product.title.clone()),
            None => {
                return Some(turn.reply(404, product_not_found_reply(selected)));
            }
        }
    }

    if let Some(selected) = non_blank(&request.selected_size) {
        match selected.parse::<Size>() {
            Ok(size) => draft.size = Some(size),
            Err(_) => {
                let product = draft.product.as_deref().unwrap_or("this product");
                return Some(turn.reply(404, out_of_stock_reply(product, selected)));
            }
        }
    }

    None
}

/// System prompt for the completion API.
pub fn build_system_prompt(
    products: &[Product],
    draft: &OrderDraft,
    size_suggestion: Option<Size>,
) -> String {
    let product_list: Vec<String> = products.iter().map(Product::summary).collect();

    let mut prompt = format!(
        "You are a helpful shopping assistant. Available products:\n\n{}\n\n\
         If the user provides height, recommend size ({}).\n",
        product_list.join("\n\n"),
        SIZE_CHART
    );

    if let Some(size) = size_suggestion {
        prompt.push_str(&format!(
            "Based on the height the customer gave, recommend size {}.\n",
            size
        ));
    }

    let collected: Vec<String> = [
        ("Product", draft.product.clone()),
        ("Size", draft.size.map(|s| s.to_string())),
        ("Name", draft.name.clone()),
        ("Phone", draft.phone.clone()),
        ("Address", draft.address.clone()),
    ]
    .into_iter()
    .filter_map(|(label, value)| value.map(|v| format!("{}: {}", label, v)))
    .collect();

    let missing: Vec<&str> = draft.missing_fields().iter().map(|f| f.label()).collect();

    if collected.is_empty() {
        prompt.push_str(
            "To place an order the customer needs to give the product, size, full name, \
             phone number and delivery address.\n",
        );
    } else {
        prompt.push_str(&format!(
            "Order details collected so far: {}.\nStill missing: {}. Ask for the {} next.\n",
            collected.join(", "),
            missing.join(", "),
            missing.first().copied().unwrap_or("confirmation")
        ));
    }

    prompt.push_str(
        "Do not make up checkout links; the store sends the link once every detail is collected.",
    );
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Money, Variant};
    use crate::config::CheckoutStrategy;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct FakeStorefront {
        products: Vec<Product>,
        checkouts: AtomicUsize,
        fail: bool,
    }

    impl Storefront for FakeStorefront {
        async fn products(&self) -> Result<Vec<Product>> {
            if self.fail {
                return Err(Error::Storefront("unavailable".into()));
            }
            Ok(self.products.clone())
        }

        async fn create_checkout(&self, variant_id: &str) -> Result<String> {
            self.checkouts.fetch_add(1, Ordering::SeqCst);
            Ok(format!("https://checkout.example/{}", variant_id.rsplit('/').next().unwrap()))
        }
    }

    /// Records prompts and replies with a fixed text.
    #[derive(Default)]
    struct FakeCompletion {
        prompts: Mutex<Vec<(String, String)>>,
    }

    impl FakeCompletion {
        fn calls(&self) -> usize {
            self.prompts.lock().unwrap().len()
        }

        fn last_system_prompt(&self) -> String {
            self.prompts.lock().unwrap().last().unwrap().0.clone()
        }
    }

    impl Completion for FakeCompletion {
        async fn complete(&self, system_prompt: &str, user_message: &str) -> Result<String> {
            self.prompts
                .lock()
                .unwrap()
                .push((system_prompt.to_string(), user_message.to_string()));
            Ok("model reply".to_string())
        }
    }

    fn variant(id: u32, title: &str, available: bool) -> Variant {
        Variant {
            id: format!("gid://shopify/ProductVariant/{}", id),
            title: title.to_string(),
            available_for_sale: available,
            price: Money { amount: "45.0".into(), currency_code: Some("USD".into()) },
        }
    }

    fn catalog() -> Vec<Product> {
        vec![Product {
            id: "gid://shopify/Product/1".into(),
            title: "Black Hoodie".into(),
            description: "Heavy cotton".into(),
            variants: vec![
                variant(11, "M", true),
                variant(12, "L", false),
                variant(13, "XL", true),
            ],
        }]
    }

    fn assistant(strategy: CheckoutStrategy) -> Assistant<FakeStorefront, FakeCompletion> {
        let config = Config {
            store_domain: "shop.example.com".into(),
            checkout_strategy: strategy,
            ..Config::default()
        };
        Assistant::new(
            FakeStorefront { products: catalog(), checkouts: AtomicUsize::new(0), fail: false },
            FakeCompletion::default(),
            config,
        )
    }

    fn chat(session: &str, message: &str) -> ChatRequest {
        ChatRequest {
            message: Some(message.to_string()),
            session_id: Some(session.to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_complete_order_confirms_and_clears_session() {
        let bot = assistant(CheckoutStrategy::Permalink);
        let outcome = bot
            .respond(chat(
                "s1",
                "I want the black hoodie size M. my name is Ali Harake, phone 71123456, \
                 address: Hamra Street, Beirut",
            ))
            .await
            .unwrap();

        assert_eq!(outcome.status, 200);
        let reply = &outcome.body.reply;
        assert!(reply.contains("Ali Harake"));
        assert!(reply.contains("Black Hoodie"));
        assert!(reply.contains("(Size M)"));
        assert!(reply.contains("71123456"));
        assert!(reply.contains("Hamra Street, Beirut"));
        assert!(reply.contains("https://shop.example.com/cart/11:1"));
        assert_eq!(bot.completion.calls(), 0);

        assert_eq!(bot.sessions().load("s1").await, OrderDraft::default());
    }

    #[tokio::test]
    async fn test_order_across_turns() {
        let bot = assistant(CheckoutStrategy::Permalink);

        let first = bot.respond(chat("s2", "I'd like the black hoodie, I'm 185 cm")).await.unwrap();
        assert_eq!(first.body.reply, "model reply");
        assert_eq!(first.body.size_suggestion, Some(Size::L));
        let draft = bot.sessions().load("s2").await;
        assert_eq!(draft.product.as_deref(), Some("Black Hoodie"));
        assert_eq!(draft.size, Some(Size::L));
        assert_eq!(draft.awaiting, Some(OrderField::Name));
        assert!(bot.completion.last_system_prompt().contains("Ask for the full name next"));

        bot.respond(chat("s2", "Ali Harake")).await.unwrap();
        bot.respond(chat("s2", "71 123 456")).await.unwrap();
        let draft = bot.sessions().load("s2").await;
        assert_eq!(draft.name.as_deref(), Some("Ali Harake"));
        assert_eq!(draft.phone.as_deref(), Some("71123456"));
        assert_eq!(draft.awaiting, Some(OrderField::Address));

        // L is sold out: the draft is kept and only the size is released
        let outcome = bot.respond(chat("s2", "Hamra Street 12, Beirut")).await.unwrap();
        assert_eq!(outcome.status, 200);
        assert!(outcome.body.reply.contains("size L is out of stock"));
        let draft = bot.sessions().load("s2").await;
        assert_eq!(draft.name.as_deref(), Some("Ali Harake"));
        assert_eq!(draft.address.as_deref(), Some("Hamra Street 12, Beirut"));
        assert_eq!(draft.size, None);
        assert_eq!(draft.awaiting, Some(OrderField::Size));

        let outcome = bot.respond(chat("s2", "xl")).await.unwrap();
        assert!(outcome.body.reply.contains("https://shop.example.com/cart/13:1"));
        assert_eq!(bot.sessions().session_count().await, 0);
    }

    #[tokio::test]
    async fn test_courtesy_words_do_not_swallow_order_details() {
        let bot = assistant(CheckoutStrategy::Permalink);
        bot.respond(chat("s9", "I'd like the black hoodie, I'm 185 cm")).await.unwrap();
        bot.respond(chat("s9", "Ali Harake")).await.unwrap();

        let outcome = bot.respond(chat("s9", "thanks, my number is 71123456")).await.unwrap();
        assert_eq!(outcome.body.reply, "model reply");
        let draft = bot.sessions().load("s9").await;
        assert_eq!(draft.phone.as_deref(), Some("71123456"));
        assert_eq!(draft.awaiting, Some(OrderField::Address));

        // plain thanks mid-order is still small talk
        let outcome = bot.respond(chat("s9", "thanks")).await.unwrap();
        assert!(outcome.body.reply.starts_with("You're welcome"));
        assert_eq!(bot.sessions().load("s9").await, draft);
    }

    #[tokio::test]
    async fn test_structured_height_only_fills_missing_size() {
        let bot = assistant(CheckoutStrategy::Permalink);
        let with_height = |message: &str| ChatRequest {
            height: Some(serde_json::json!(150)),
            ..chat("s10", message)
        };

        let outcome = bot.respond(with_height("black hoodie size XL please")).await.unwrap();
        assert_eq!(outcome.body.size_suggestion, Some(Size::S));
        assert_eq!(bot.sessions().load("s10").await.size, Some(Size::XL));

        bot.respond(with_height("my name is Ali Harake")).await.unwrap();
        assert_eq!(bot.sessions().load("s10").await.size, Some(Size::XL));

        let fresh = ChatRequest { session_id: Some("s11".into()), ..with_height("black hoodie") };
        bot.respond(fresh).await.unwrap();
        assert_eq!(bot.sessions().load("s11").await.size, Some(Size::S));
    }

    #[tokio::test]
    async fn test_oversized_ttl_is_clamped() {
        let config = Config { session_ttl_secs: i64::MAX, ..Config::default() };
        let bot = Assistant::new(
            FakeStorefront { products: catalog(), checkouts: AtomicUsize::new(0), fail: false },
            FakeCompletion::default(),
            config,
        );
        bot.respond(chat("s12", "black hoodie")).await.unwrap();
        assert_eq!(bot.sessions().session_count().await, 1);
    }

    #[tokio::test]
    async fn test_unavailable_variant_keeps_session() {
        let bot = assistant(CheckoutStrategy::Permalink);
        let outcome = bot
            .respond(chat(
                "s3",
                "black hoodie size L, my name is Sara Khoury, phone 70111222, ship to Jounieh highway",
            ))
            .await
            .unwrap();
        assert_eq!(outcome.body.reply, out_of_stock_reply("Black Hoodie", "L"));

        let draft = bot.sessions().load("s3").await;
        assert_eq!(draft.product.as_deref(), Some("Black Hoodie"));
        assert_eq!(draft.name.as_deref(), Some("Sara Khoury"));
        assert_eq!(draft.phone.as_deref(), Some("70111222"));
        assert_eq!(bot.completion.calls(), 0);
    }

    #[tokio::test]
    async fn test_inquiry_without_match_skips_extraction() {
        let bot = assistant(CheckoutStrategy::Permalink);
        let outcome = bot
            .respond(chat("s4", "do you have red socks in stock? my name is Ali Harake"))
            .await
            .unwrap();
        assert!(outcome.body.reply.contains("couldn't find that product"));
        assert_eq!(bot.sessions().load("s4").await, OrderDraft::default());
        assert_eq!(bot.completion.calls(), 0);
    }

    #[tokio::test]
    async fn test_sessions_do_not_share_drafts() {
        let bot = assistant(CheckoutStrategy::Permalink);
        bot.respond(chat("a", "black hoodie please, my name is Ali")).await.unwrap();
        bot.respond(chat("b", "my name is Maya")).await.unwrap();

        assert_eq!(bot.sessions().load("a").await.name.as_deref(), Some("Ali"));
        assert_eq!(bot.sessions().load("b").await.name.as_deref(), Some("Maya"));
        assert_eq!(bot.sessions().load("b").await.product, None);
    }

    #[tokio::test]
    async fn test_session_id_is_issued() {
        let bot = assistant(CheckoutStrategy::Permalink);
        let outcome = bot
            .respond(ChatRequest { message: Some("hello".into()), ..Default::default() })
            .await
            .unwrap();
        assert!(!outcome.body.session_id.is_empty());
        assert!(outcome.body.reply.starts_with("Hi there!"));
    }

    #[tokio::test]
    async fn test_explicit_order_uses_checkout_mutation() {
        let bot = assistant(CheckoutStrategy::CheckoutCreate);
        let outcome = bot
            .respond(ChatRequest {
                message: Some("hi".into()),
                session_id: Some("s5".into()),
                name: Some("Ali".into()),
                phone: Some("71123456".into()),
                address: Some("Beirut".into()),
                selected_product: Some("black hoodie".into()),
                selected_size: Some("xl".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(outcome.status, 200);
        assert!(outcome.body.reply.contains("https://checkout.example/13"));
        assert_eq!(bot.storefront.checkouts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_explicit_order_rejections_are_404() {
        let bot = assistant(CheckoutStrategy::Permalink);
        let explicit = |product: &str, size: &str| ChatRequest {
            message: Some("order".into()),
            session_id: Some("s6".into()),
            selected_product: Some(product.into()),
            selected_size: Some(size.into()),
            ..Default::default()
        };

        let outcome = bot.respond(explicit("Red Socks", "M")).await.unwrap();
        assert_eq!(outcome.status, 404);
        assert_eq!(outcome.body.reply, "Product \"Red Socks\" not found.");

        let outcome = bot.respond(explicit("Black Hoodie", "L")).await.unwrap();
        assert_eq!(outcome.status, 404);
        assert!(outcome.body.reply.contains("out of stock"));

        // in stock but details missing: the model asks for them
        let outcome = bot.respond(explicit("Black Hoodie", "M")).await.unwrap();
        assert_eq!(outcome.status, 200);
        assert_eq!(outcome.body.reply, "model reply");
        assert!(bot.completion.last_system_prompt().contains("Still missing: full name"));
    }

    #[tokio::test]
    async fn test_upstream_failure_is_error() {
        let bot = Assistant::new(
            FakeStorefront { products: vec![], checkouts: AtomicUsize::new(0), fail: true },
            FakeCompletion::default(),
            Config::default(),
        );
        let err = bot.respond(chat("s7", "hello")).await.unwrap_err();
        assert_eq!(err.status_code(), 500);
    }

    #[tokio::test]
    async fn test_empty_message_is_validation_error() {
        let bot = assistant(CheckoutStrategy::Permalink);
        let err = bot.respond(chat("s8", "  ")).await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_system_prompt_lists_catalog() {
        let prompt = build_system_prompt(&catalog(), &OrderDraft::default(), Some(Size::M));
        assert!(prompt.contains("Black Hoodie - Available sizes: M, L, XL - Prices: $45.0, $45.0, $45.0"));
        assert!(prompt.contains("recommend size M"));
        assert!(prompt.contains("full name, phone number and delivery address"));
    }
}
