//! Numeric bound parsing for category-tier equivalence.
//!
//! Recognizes the two surface forms extractors actually produce:
//! keyword bounds (`gt=0`, `ge = 1`, `min=3`) and operator bounds
//! (`>0`, `>= 1`). Anything else is not a bound; the category tier then
//! simply does not apply.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundOp {
    Gt,
    Ge,
    Lt,
    Le,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NumericBound {
    pub op: BoundOp,
    pub value: f64,
}

impl NumericBound {
    /// Whether the bound value is a whole number.
    pub fn is_integral(&self) -> bool {
        self.value.fract() == 0.0
    }

    /// Canonical non-strict form over the integers: `>N` becomes `≥N+1`,
    /// `<N` becomes `≤N-1`. Only sound on integer domains.
    pub fn canonical_integer(&self) -> Option<(BoundOp, i64)> {
        if !self.is_integral() {
            return None;
        }
        let v = self.value as i64;
        Some(match self.op {
            BoundOp::Gt => (BoundOp::Ge, v + 1),
            BoundOp::Ge => (BoundOp::Ge, v),
            BoundOp::Lt => (BoundOp::Le, v - 1),
            BoundOp::Le => (BoundOp::Le, v),
        })
    }
}

fn keyword_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\b(gt|ge|lt|le|min|max)\s*=\s*(-?\d+(?:\.\d+)?)")
            .expect("static bound pattern")
    })
}

fn operator_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"([<>]=?)\s*(-?\d+(?:\.\d+)?)").expect("static bound pattern")
    })
}

/// Parse the first numeric bound out of a descriptor or value string.
pub fn parse_bound(text: &str) -> Option<NumericBound> {
    let lowered = text.trim().to_ascii_lowercase();

    if let Some(cap) = keyword_re().captures(&lowered) {
        let op = match &cap[1] {
            "gt" => BoundOp::Gt,
            "ge" | "min" => BoundOp::Ge,
            "lt" => BoundOp::Lt,
            "le" | "max" => BoundOp::Le,
            _ => unreachable!("pattern alternation is exhaustive"),
        };
        let value = cap[2].parse().ok()?;
        return Some(NumericBound { op, value });
    }

    if let Some(cap) = operator_re().captures(&lowered) {
        let op = match &cap[1] {
            ">" => BoundOp::Gt,
            ">=" => BoundOp::Ge,
            "<" => BoundOp::Lt,
            "<=" => BoundOp::Le,
            _ => unreachable!("pattern alternation is exhaustive"),
        };
        let value = cap[2].parse().ok()?;
        return Some(NumericBound { op, value });
    }

    None
}

/// Strict vs non-strict integer bound equivalence: `>N ≡ ≥N+1`, `<N ≡ ≤N-1`.
pub fn equivalent_integer_bounds(a: &NumericBound, b: &NumericBound) -> bool {
    match (a.canonical_integer(), b.canonical_integer()) {
        (Some(ca), Some(cb)) => ca == cb,
        _ => false,
    }
}
