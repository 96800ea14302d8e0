//! Garment sizes and the height chart.

use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::Error;

/// A garment size label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Size {
    S,
    M,
    L,
    XL,
    XXL,
}

impl Size {
    pub const ALL: [Size; 5] = [Size::S, Size::M, Size::L, Size::XL, Size::XXL];

    pub fn as_str(&self) -> &'static str {
        match self {
            Size::S => "S",
            Size::M => "M",
            Size::L => "L",
            Size::XL => "XL",
            Size::XXL => "2XL",
        }
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Size {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl FromStr for Size {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "S" | "SMALL" => Ok(Size::S),
            "M" | "MEDIUM" => Ok(Size::M),
            "L" | "LARGE" => Ok(Size::L),
            "XL" => Ok(Size::XL),
            "2XL" | "XXL" => Ok(Size::XXL),
            other => Err(Error::Validation(format!("Unknown size: {}", other))),
        }
    }
}

/// Lowest height (cm) the chart covers.
pub const MIN_CHART_HEIGHT: u32 = 140;

/// Human-readable chart used in prompts and replies.
pub const SIZE_CHART: &str =
    "S: 140–160cm, M: 160–180cm, L: 180–195cm, XL: 195–210cm, 2XL: 210cm and above";

/// Recommend a size for a height in centimetres.
///
/// Intervals are half-open: [140,160) S, [160,180) M, [180,195) L,
/// [195,210) XL, 210 and above 2XL. Heights below 140 get no recommendation.
pub fn recommend_size(height_cm: u32) -> Option<Size> {
    match height_cm {
        h if h < MIN_CHART_HEIGHT => None,
        h if h < 160 => Some(Size::S),
        h if h < 180 => Some(Size::M),
        h if h < 195 => Some(Size::L),
        h if h < 210 => Some(Size::XL),
        _ => Some(Size::XXL),
    }
}
