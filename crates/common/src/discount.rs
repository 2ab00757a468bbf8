//! Discount rules carried by a coupon.

use serde::{Deserialize, Serialize};

use crate::Money;

/// Discriminant of a [`DiscountRule`], as stored and sent over the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscountKind {
    Percent,
    Value,
}

impl DiscountKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiscountKind::Percent => "PERCENT",
            DiscountKind::Value => "VALUE",
        }
    }
}

impl std::str::FromStr for DiscountKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PERCENT" => Ok(DiscountKind::Percent),
            "VALUE" => Ok(DiscountKind::Value),
            other => Err(format!("unknown discount type: {other}")),
        }
    }
}

/// How a coupon changes the price of a product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum DiscountRule {
    /// A percentage, 0..=100.
    Percent(u32),
    /// A fixed amount.
    FixedValue(Money),
}

impl DiscountRule {
    pub fn kind(&self) -> DiscountKind {
        match self {
            DiscountRule::Percent(_) => DiscountKind::Percent,
            DiscountRule::FixedValue(_) => DiscountKind::Value,
        }
    }

    /// Raw numeric value: the percentage, or the amount in cents.
    pub fn value(&self) -> i64 {
        match self {
            DiscountRule::Percent(p) => i64::from(*p),
            DiscountRule::FixedValue(m) => m.cents(),
        }
    }

    /// Rebuilds a rule from its stored parts.
    pub fn from_parts(kind: DiscountKind, value: i64) -> Result<Self, String> {
        match kind {
            DiscountKind::Percent => u32::try_from(value)
                .ok()
                .filter(|p| *p <= 100)
                .map(DiscountRule::Percent)
                .ok_or_else(|| format!("percent discount out of range: {value}")),
            DiscountKind::Value if value >= 0 => Ok(DiscountRule::FixedValue(Money::from_cents(value))),
            DiscountKind::Value => Err(format!("negative discount value: {value}")),
        }
    }
}
