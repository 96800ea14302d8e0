//! Order field extraction from free-text chat messages.
//!
//! [`extract`] is pure: it takes the message, the current draft and the
//! catalog and returns the updated draft. A field that is already set is never
//! touched, and for each unset field the rules below are tried in order with
//! the first match winning:
//!
//! | field   | rules, highest precedence first                                         |
//! |---------|-------------------------------------------------------------------------|
//! | product | first catalog title contained in the message (case-insensitive)         |
//! | address | trigger phrase (`address is`, `ship to`, ...); awaited answer           |
//! | size    | `size <s>` phrase; height phrase; `in XL`-style token; awaited answer   |
//! | phone   | trigger phrase + digits; any 7-15 digit run outside the address         |
//! | name    | `my name is` phrase; `I'm Ali`-style intro; awaited 2-4 word answer     |
//!
//! "Awaited answer" rules only apply when the previous reply asked for that
//! field (`draft.awaiting`), since a bare line of text is otherwise ambiguous.
//! Size and phone rules never look inside the text claimed as the address.

use regex::Regex;
use std::ops::Range;
use std::sync::LazyLock;

use crate::catalog::{find_mentioned, Product};
use crate::models::{OrderDraft, OrderField};
use crate::sizing::{recommend_size, Size};

static SIZE_PHRASE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bsize\s*(?:is\s+|:\s*|-\s*)?(2xl|xxl|xl|small|medium|large|l|m|s)\b").unwrap()
});

/// Upper-case size after a verb or preposition (`in XL`, `I'll take an M`),
/// or an upper-case size that is the whole message.
static SIZE_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\b(?i:in|wear|take|get|want|need)\s+(?:(?i:an?|the)\s+)?(2XL|XXL|XL|L|M|S)\b|^(2XL|XXL|XL|L|M|S)[.!]?$",
    )
    .unwrap()
});

static HEIGHT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(\d{3})\s*(?:cm|centimet(?:er|re)s?)\b|\bheight\D{0,20}?\b(\d{3})\b|\b(\d{3})\s*tall\b",
    )
    .unwrap()
});

static PHONE_TRIGGER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:phone|number|mobile|call me|whatsapp)\b\D{0,20}?(\+?\d[\d\s\-.]{5,22}\d)")
        .unwrap()
});

static DIGIT_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\+?\d[\d\s\-.]{5,22}\d").unwrap());

static NAME_TRIGGER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:my name is|my name's|name is|name\s*:)\s*([A-Za-z][A-Za-z'\-]*(?:\s+[A-Za-z][A-Za-z'\-]*){0,3})")
        .unwrap()
});

/// `this is Ali`, `I'm Ali Harake`: only capitalised words count.
static NAME_INTRO: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?i:this is|i'm|i am|im)\s+([A-Z][A-Za-z'\-]*(?:\s+[A-Z][A-Za-z'\-]*){0,3})")
        .unwrap()
});

static BARE_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z][A-Za-z'\-]*(?:\s+[A-Za-z][A-Za-z'\-]*){1,3}$").unwrap()
});

static ADDRESS_TRIGGER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:my address is|address is|address\s*:|ship(?:ping)? to|deliver(?:y)? to|send it to)\s*(.+)")
        .unwrap()
});

static CLAUSE_BREAK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)[;\n]|\.\s|,?\s+(?:and\s+)?(?:my\s+)?(?:(?:phone|number|name)\s*(?:is|:)|size\b)")
        .unwrap()
});

static LETTERS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[A-Za-z]{3}").unwrap());

/// Words that end a captured name.
const NAME_STOPWORDS: &[&str] = &[
    "and", "my", "phone", "number", "address", "from", "with", "size", "i", "im", "the", "in",
];

const MIN_HEIGHT_CM: u32 = 100;
const MAX_HEIGHT_CM: u32 = 250;

/// Fill unset draft fields from `message`.
pub fn extract(message: &str, draft: &OrderDraft, products: &[Product]) -> OrderDraft {
    let mut next = draft.clone();
    let message = message.trim();
    let awaiting = draft.awaiting;

    if !next.has(OrderField::Product) {
        next.product = find_mentioned(products, message).map(|p| p.title.clone());
    }

    let mut address_span = None;
    if !next.has(OrderField::Address) {
        if let Some((address, span)) = address_from_trigger(message) {
            next.address = Some(address);
            address_span = Some(span);
        } else if awaiting == Some(OrderField::Address) && looks_like_address(message) {
            next.address = Some(message.to_string());
            address_span = Some(0..message.len());
        }
    } else if let Some((_, span)) = address_from_trigger(message) {
        address_span = Some(span);
    }

    if !next.has(OrderField::Size) {
        let awaiting_size = awaiting == Some(OrderField::Size);
        next.size = extract_size(message, address_span.clone(), awaiting_size);
    }

    if !next.has(OrderField::Phone) {
        next.phone = extract_phone(message, address_span);
    }

    if !next.has(OrderField::Name) {
        next.name = name_from_trigger(message, products).or_else(|| {
            (awaiting == Some(OrderField::Name) && BARE_NAME.is_match(message))
                .then(|| collapse_whitespace(message))
        });
    }

    next
}

/// First plausible height in the message, in centimetres.
pub fn find_height(message: &str) -> Option<u32> {
    HEIGHT.captures_iter(message).find_map(|caps| {
        let digits = caps.get(1).or_else(|| caps.get(2)).or_else(|| caps.get(3))?;
        digits
            .as_str()
            .parse::<u32>()
            .ok()
            .filter(|h| (MIN_HEIGHT_CM..=MAX_HEIGHT_CM).contains(h))
    })
}

fn outside(span: &Option<Range<usize>>, start: usize, end: usize) -> bool {
    match span {
        Some(span) => end <= span.start || start >= span.end,
        None => true,
    }
}

fn extract_size(message: &str, address: Option<Range<usize>>, awaiting: bool) -> Option<Size> {
    let phrase: Option<Size> = SIZE_PHRASE
        .captures_iter(message)
        .filter_map(|caps| caps.get(1))
        .filter(|m| outside(&address, m.start(), m.end()))
        .find_map(|m| m.as_str().parse().ok());
    if phrase.is_some() {
        return phrase;
    }
    if let Some(size) = find_height(message).and_then(recommend_size) {
        return Some(size);
    }
    let token: Option<Size> = SIZE_TOKEN
        .captures_iter(message)
        .filter_map(|caps| caps.get(1).or_else(|| caps.get(2)))
        .filter(|m| outside(&address, m.start(), m.end()))
        .find_map(|m| m.as_str().parse().ok());
    if token.is_some() {
        return token;
    }
    if awaiting {
        let answer = message.trim_end_matches(|c: char| c == '.' || c == '!');
        if let Ok(size) = answer.parse() {
            return Some(size);
        }
        if answer.len() == 3 && answer.chars().all(|c| c.is_ascii_digit()) {
            return answer
                .parse()
                .ok()
                .filter(|h| (MIN_HEIGHT_CM..=MAX_HEIGHT_CM).contains(h))
                .and_then(recommend_size);
        }
    }
    None
}

/// Digits of a phone candidate with an optional leading `+`, if it has 7-15 digits.
fn normalize_phone(candidate: &str) -> Option<String> {
    let digits: String = candidate.chars().filter(|c| c.is_ascii_digit()).collect();
    if !(7..=15).contains(&digits.len()) {
        return None;
    }
    if candidate.trim_start().starts_with('+') {
        Some(format!("+{}", digits))
    } else {
        Some(digits)
    }
}

fn extract_phone(message: &str, exclude: Option<Range<usize>>) -> Option<String> {
    if let Some(phone) = PHONE_TRIGGER
        .captures_iter(message)
        .find_map(|caps| normalize_phone(&caps[1]))
    {
        return Some(phone);
    }
    DIGIT_RUN
        .find_iter(message)
        .filter(|m| outside(&exclude, m.start(), m.end()))
        .find_map(|m| normalize_phone(m.as_str()))
}

fn name_from_trigger(message: &str, products: &[Product]) -> Option<String> {
    if let Some(caps) = NAME_TRIGGER.captures(message) {
        return name_words(&caps[1]);
    }
    // "this is Black Hoodie?" names a product, not the customer
    NAME_INTRO
        .captures_iter(message)
        .filter_map(|caps| name_words(&caps[1]))
        .find(|name| find_mentioned(products, name).is_none())
}

fn name_words(captured: &str) -> Option<String> {
    let words: Vec<&str> = captured
        .split_whitespace()
        .take_while(|w| {
            let bare: String = w.chars().filter(|c| c.is_ascii_alphabetic()).collect();
            !NAME_STOPWORDS.contains(&bare.to_ascii_lowercase().as_str())
        })
        .collect();
    (!words.is_empty()).then(|| words.join(" "))
}

/// Address text after a trigger phrase, cut at the next clause, with its byte span.
fn address_from_trigger(message: &str) -> Option<(String, Range<usize>)> {
    let caps = ADDRESS_TRIGGER.captures(message)?;
    let rest = caps.get(1)?;
    let end = CLAUSE_BREAK
        .find(rest.as_str())
        .map(|m| m.start())
        .unwrap_or(rest.as_str().len());
    let address = rest.as_str()[..end]
        .trim()
        .trim_end_matches(|c: char| c == '.' || c == ',' || c == '!');
    if address.len() < 5 || !LETTERS.is_match(address) {
        return None;
    }
    Some((address.to_string(), rest.start()..rest.start() + end))
}

fn looks_like_address(message: &str) -> bool {
    message.chars().count() >= 10 && LETTERS.is_match(message)
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
