//! Short-circuit rules answered without the completion API.
//!
//! Rules run in [`PIPELINE`] order and the first one that produces a reply
//! ends the turn.

use regex::Regex;
use std::sync::LazyLock;

use crate::catalog::{find_mentioned, Product};

static STOCK_INQUIRY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:in stock|out of stock|available|availability|do you (?:have|sell|carry)|what sizes|which sizes|sold out|how much|price)\b",
    )
    .unwrap()
});

/// Small-talk phrases longer than this many words fall through to the order flow.
const SMALL_TALK_MAX_WORDS: usize = 6;

#[derive(Debug, Clone, Copy)]
enum Match {
    Exact,
    Contains,
}

struct CannedReply {
    phrases: &'static [&'static str],
    matching: Match,
    reply: &'static str,
}

const SMALL_TALK: &[CannedReply] = &[
    CannedReply {
        phrases: &["thanks", "thank you", "thx", "merci", "shukran"],
        matching: Match::Contains,
        reply: "You're welcome! Let me know if there's anything else I can help you with.",
    },
    CannedReply {
        phrases: &["how are you", "how r u", "how is it going", "hows it going"],
        matching: Match::Contains,
        reply: "I'm doing great, thanks for asking! How can I help you with your shopping today?",
    },
    CannedReply {
        phrases: &["who are you", "what are you", "are you a bot", "are you human"],
        matching: Match::Contains,
        reply: "I'm the store's shopping assistant. I can check what's in stock, suggest a size from your height and place your order.",
    },
    CannedReply {
        phrases: &["bye", "goodbye", "good bye", "see you", "see ya"],
        matching: Match::Exact,
        reply: "Goodbye! Come back anytime.",
    },
    CannedReply {
        phrases: &["ok", "okay", "cool", "great", "nice", "perfect"],
        matching: Match::Exact,
        reply: "Great! Is there anything else I can help you with?",
    },
];

const GREETINGS: &[&str] = &[
    "hi",
    "hii",
    "hello",
    "hey",
    "hiya",
    "yo",
    "salam",
    "marhaba",
    "hola",
    "hi there",
    "hello there",
    "hey there",
    "good morning",
    "good afternoon",
    "good evening",
];

const GREETING_REPLY: &str = "Hi there! 👋 Welcome to our store. Are you looking for something specific? \
If you tell me your height I can also suggest a size.";

/// A named short-circuit rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    SmallTalk,
    Greeting,
    StockInquiry,
}

/// Evaluation order.
pub const PIPELINE: [Rule; 3] = [Rule::SmallTalk, Rule::Greeting, Rule::StockInquiry];

impl Rule {
    pub fn name(&self) -> &'static str {
        match self {
            Rule::SmallTalk => "small_talk",
            Rule::Greeting => "greeting",
            Rule::StockInquiry => "stock_inquiry",
        }
    }

    /// Small talk and greetings, which answer the tone of a message rather than its content.
    pub fn is_courtesy(&self) -> bool {
        matches!(self, Rule::SmallTalk | Rule::Greeting)
    }

    /// A terminal reply, or `None` to pass to the next rule.
    pub fn apply(&self, message: &str, products: &[Product]) -> Option<String> {
        match self {
            Rule::SmallTalk => small_talk(&normalize(message)),
            Rule::Greeting => {
                let text = normalize(message);
                GREETINGS
                    .contains(&text.as_str())
                    .then(|| GREETING_REPLY.to_string())
            }
            Rule::StockInquiry => STOCK_INQUIRY
                .is_match(message)
                .then(|| stock_reply(find_mentioned(products, message), products)),
        }
    }
}

/// Run the pipeline; the first rule with a reply wins.
pub fn evaluate(message: &str, products: &[Product]) -> Option<(Rule, String)> {
    PIPELINE
        .iter()
        .find_map(|rule| rule.apply(message, products).map(|reply| (*rule, reply)))
}

/// [`evaluate`] for a message that also carries order details: courtesy rules
/// stay silent so the details reach extraction.
pub fn evaluate_with_order_data(message: &str, products: &[Product]) -> Option<(Rule, String)> {
    PIPELINE
        .iter()
        .filter(|rule| !rule.is_courtesy())
        .find_map(|rule| rule.apply(message, products).map(|reply| (*rule, reply)))
}

/// Lower-case, punctuation stripped, single-spaced.
fn normalize(message: &str) -> String {
    message
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '\'' { c } else { ' ' })
        .collect::<String>()
        .replace('\'', "")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn contains_phrase(text: &str, phrase: &str) -> bool {
    format!(" {} ", text).contains(&format!(" {} ", phrase))
}

fn small_talk(text: &str) -> Option<String> {
    if text.is_empty() {
        return None;
    }
    let short = text.split(' ').count() <= SMALL_TALK_MAX_WORDS;
    SMALL_TALK
        .iter()
        .find(|entry| {
            entry.phrases.iter().any(|phrase| match entry.matching {
                Match::Exact => text == *phrase,
                Match::Contains => text == *phrase || (short && contains_phrase(text, phrase)),
            })
        })
        .map(|entry| entry.reply.to_string())
}

fn stock_reply(product: Option<&Product>, catalog: &[Product]) -> String {
    let Some(product) = product else {
        let titles: Vec<&str> = catalog.iter().map(|p| p.title.as_str()).collect();
        return if titles.is_empty() {
            "Sorry, I couldn't find that product.".to_string()
        } else {
            format!(
                "Sorry, I couldn't find that product. Here's what we have right now: {}.",
                titles.join(", ")
            )
        };
    };

    let available: Vec<String> = product
        .in_stock()
        .map(|v| format!("{} (${})", v.title, v.price.amount))
        .collect();

    if available.is_empty() {
        format!("Sorry, {} is currently out of stock in all sizes.", product.title)
    } else {
        format!(
            "Yes! {} is in stock in: {}. Tell me your height and I'll suggest the right size.",
            product.title,
            available.join(", ")
        )
    }
}
