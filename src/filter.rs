//! Filter engine
//!
//! `filter` is a pure, order-preserving derivation of the display list from the store
//! and the current [`FilterCriteria`]. The filter bar speaks a small query language that
//! compiles into criteria:
//!
//! ```text
//! city:Mumbai risk:HIGH action:BLOCK min:500 max:1000 TXN12
//! ```
//!
//! Bare words are an id search (case-insensitive substring). Values containing spaces can
//! be quoted: `city:"New Delhi"`.

use crate::types::{Action, RiskLevel, Transaction};
use rust_decimal::Decimal;
use std::str::FromStr;

/// Filter-bar state. Replaced wholesale on every filter interaction, never merged.
#[derive(Default, Debug, Clone, PartialEq)]
pub struct FilterCriteria {
    pub search: String,
    pub min_amount: Option<Decimal>,
    pub max_amount: Option<Decimal>,
    pub city: Option<String>,
    pub risk_level: Option<RiskLevel>,
    pub action: Option<Action>,
}

impl FilterCriteria {
    pub fn is_empty(&self) -> bool {
        self.search.is_empty()
            && self.min_amount.is_none()
            && self.max_amount.is_none()
            && self.city.is_none()
            && self.risk_level.is_none()
            && self.action.is_none()
    }

    /// Render back to query syntax (used for the active-filter summary)
    pub fn to_query(&self) -> String {
        let mut parts = Vec::new();
        if let Some(c) = &self.city {
            if c.contains(' ') {
                parts.push(format!("city:\"{c}\""));
            } else {
                parts.push(format!("city:{c}"));
            }
        }
        if let Some(r) = self.risk_level {
            parts.push(format!("risk:{r}"));
        }
        if let Some(a) = self.action {
            parts.push(format!("action:{a}"));
        }
        if let Some(m) = self.min_amount {
            parts.push(format!("min:{m}"));
        }
        if let Some(m) = self.max_amount {
            parts.push(format!("max:{m}"));
        }
        if !self.search.is_empty() {
            parts.push(self.search.clone());
        }
        parts.join(" ")
    }
}

/// Parse an amount bound; empty or non-numeric means "no bound"
pub fn parse_bound(s: &str) -> Option<Decimal> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    Decimal::from_str(s)
        .ok()
        .or_else(|| s.parse::<f64>().ok().and_then(|f| Decimal::try_from(f).ok()))
}

fn non_empty(s: &str) -> Option<String> {
    let s = s.trim();
    (!s.is_empty()).then(|| s.to_string())
}

/// Split on whitespace, keeping double-quoted runs together
fn tokenize(q: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut cur = String::new();
    let mut quoted = false;
    for ch in q.chars() {
        match ch {
            '"' => quoted = !quoted,
            c if c.is_whitespace() && !quoted => {
                if !cur.is_empty() {
                    out.push(std::mem::take(&mut cur));
                }
            }
            c => cur.push(c),
        }
    }
    if !cur.is_empty() {
        out.push(cur);
    }
    out
}

pub fn compile_filter(q: &str) -> FilterCriteria {
    let mut f = FilterCriteria::default();
    let mut free: Vec<String> = Vec::new();
    for tok in tokenize(q) {
        let mut it = tok.splitn(2, ':');
        if let (Some(k), Some(v)) = (it.next(), it.next()) {
            match &*k.to_lowercase() {
                "city" => f.city = non_empty(v),
                "risk" | "level" | "risk_level" => f.risk_level = v.parse().ok(),
                "action" | "act" => f.action = v.parse().ok(),
                "min" | "min_amount" => f.min_amount = parse_bound(v),
                "max" | "max_amount" => f.max_amount = parse_bound(v),
                "id" | "txn" | "search" => free.push(v.trim().to_string()),
                _ => free.push(tok.clone()),
            }
        } else if !tok.is_empty() {
            free.push(tok);
        }
    }
    f.search = free.join(" ").trim().to_string();
    f
}

pub fn matches(t: &Transaction, f: &FilterCriteria) -> bool {
    if !f.search.is_empty() && !t.id.to_lowercase().contains(&f.search.to_lowercase()) {
        return false;
    }
    if let Some(min) = f.min_amount {
        if t.amount < min {
            return false;
        }
    }
    if let Some(max) = f.max_amount {
        if t.amount > max {
            return false;
        }
    }
    if let Some(city) = &f.city {
        if &t.city != city {
            return false;
        }
    }
    if let Some(level) = f.risk_level {
        if t.risk_level != level {
            return false;
        }
    }
    if let Some(action) = f.action {
        if t.action != action {
            return false;
        }
    }
    true
}

/// Order-preserving filter over the store's most-recent-first sequence
pub fn filter<'a>(txns: &'a [Transaction], f: &FilterCriteria) -> Vec<&'a Transaction> {
    if f.is_empty() {
        return txns.iter().collect();
    }
    txns.iter().filter(|t| matches(t, f)).collect()
}

/// Live view override: the most recently streamed transaction is surfaced at the top of
/// the filtered view, whether or not the criteria would keep it.
pub fn with_live<'a>(
    mut view: Vec<&'a Transaction>,
    live: Option<&'a Transaction>,
) -> Vec<&'a Transaction> {
    if let Some(newest) = live {
        view.retain(|t| t.id != newest.id);
        view.insert(0, newest);
    }
    view
}
