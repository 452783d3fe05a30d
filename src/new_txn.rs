//! Operator-initiated transaction form
//!
//! Validation happens entirely client-side; nothing is sent until the form produces a
//! [`NewTransaction`].

use rust_decimal::Decimal;
use serde::Serialize;
use std::str::FromStr;

pub const PAYMENT_TYPES: [&str; 4] = ["UPI", "Card", "Net Banking", "Wallet"];
pub const DEVICE_TYPES: [&str; 3] = ["Mobile", "Desktop", "Tablet"];
pub const MERCHANT_CATEGORY: &str = "E-Commerce";

pub const INVALID_AMOUNT_MSG: &str = "Please enter a valid amount";
pub const MISSING_CITY_MSG: &str = "Please select a city";

/// Body of `POST /api/transaction/user-initiated`
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct NewTransaction {
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    pub payment_type: String,
    pub transaction_city: String,
    pub device_type: String,
    pub merchant_category: String,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum FormField {
    #[default]
    Amount,
    Payment,
    City,
    Device,
}

impl FormField {
    pub fn next(self) -> Self {
        match self {
            FormField::Amount => FormField::Payment,
            FormField::Payment => FormField::City,
            FormField::City => FormField::Device,
            FormField::Device => FormField::Amount,
        }
    }

    pub fn prev(self) -> Self {
        match self {
            FormField::Amount => FormField::Device,
            FormField::Payment => FormField::Amount,
            FormField::City => FormField::Payment,
            FormField::Device => FormField::City,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct NewTxnForm {
    pub amount: String,
    pub focus: FormField,
    payment_idx: usize,
    device_idx: usize,
    city_idx: usize,
    /// Choices snapshot taken when the form opened
    cities: Vec<String>,
    error: Option<String>,
    submitting: bool,
}

fn step(idx: usize, len: usize, forward: bool) -> usize {
    if len == 0 {
        return 0;
    }
    if forward {
        (idx + 1) % len
    } else {
        (idx + len - 1) % len
    }
}

impl NewTxnForm {
    pub fn new(cities: Vec<String>) -> Self {
        Self {
            cities,
            ..Self::default()
        }
    }

    pub fn payment_type(&self) -> &str {
        PAYMENT_TYPES[self.payment_idx % PAYMENT_TYPES.len()]
    }

    pub fn device_type(&self) -> &str {
        DEVICE_TYPES[self.device_idx % DEVICE_TYPES.len()]
    }

    pub fn city(&self) -> Option<&str> {
        self.cities.get(self.city_idx).map(|s| s.as_str())
    }

    pub fn cities(&self) -> &[String] {
        &self.cities
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_submitting(&self) -> bool {
        self.submitting
    }

    /// Typed character for the focused field; only the amount is free text
    pub fn type_char(&mut self, c: char) {
        if self.focus == FormField::Amount && (c.is_ascii_digit() || c == '.') {
            self.amount.push(c);
            self.error = None;
        }
    }

    pub fn backspace(&mut self) {
        if self.focus == FormField::Amount {
            self.amount.pop();
        }
    }

    /// Left/right on a choice field
    pub fn cycle(&mut self, forward: bool) {
        match self.focus {
            FormField::Amount => {}
            FormField::Payment => {
                self.payment_idx = step(self.payment_idx, PAYMENT_TYPES.len(), forward)
            }
            FormField::City => self.city_idx = step(self.city_idx, self.cities.len(), forward),
            FormField::Device => {
                self.device_idx = step(self.device_idx, DEVICE_TYPES.len(), forward)
            }
        }
    }

    pub fn validate(&self) -> Result<NewTransaction, &'static str> {
        let amount = Decimal::from_str(self.amount.trim())
            .ok()
            .filter(|a| *a > Decimal::ZERO)
            .ok_or(INVALID_AMOUNT_MSG)?;
        let city = self
            .city()
            .filter(|c| !c.trim().is_empty())
            .ok_or(MISSING_CITY_MSG)?;
        Ok(NewTransaction {
            amount,
            payment_type: self.payment_type().to_string(),
            transaction_city: city.to_string(),
            device_type: self.device_type().to_string(),
            merchant_category: MERCHANT_CATEGORY.to_string(),
        })
    }

    /// Validate and mark in flight. `None` when invalid or already submitting.
    pub fn submit(&mut self) -> Option<NewTransaction> {
        if self.submitting {
            return None;
        }
        match self.validate() {
            Ok(body) => {
                self.error = None;
                self.submitting = true;
                Some(body)
            }
            Err(msg) => {
                self.error = Some(msg.to_string());
                None
            }
        }
    }

    /// Backend refused the submission; keep the form open with the reason
    pub fn failed(&mut self, reason: String) {
        self.submitting = false;
        self.error = Some(reason);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form() -> NewTxnForm {
        NewTxnForm::new(vec!["Delhi".into(), "Mumbai".into()])
    }

    #[test]
    fn amount_is_required_and_positive() {
        let mut f = form();
        assert_eq!(f.submit(), None);
        assert_eq!(f.error(), Some(INVALID_AMOUNT_MSG));
        for c in "0".chars() {
            f.type_char(c);
        }
        assert_eq!(f.validate(), Err(INVALID_AMOUNT_MSG));
        f.type_char('x');
        assert_eq!(f.amount, "0");
    }

    #[test]
    fn city_is_required() {
        let mut f = NewTxnForm::new(Vec::new());
        f.amount = "250".into();
        assert_eq!(f.validate(), Err(MISSING_CITY_MSG));
    }

    #[test]
    fn valid_form_builds_body_once() {
        let mut f = form();
        f.amount = "1499.50".into();
        f.focus = FormField::City;
        f.cycle(true);
        f.focus = FormField::Payment;
        f.cycle(false);
        let body = f.submit().unwrap();
        assert_eq!(body.transaction_city, "Mumbai");
        assert_eq!(body.payment_type, "Wallet");
        assert_eq!(body.device_type, "Mobile");
        assert_eq!(body.merchant_category, "E-Commerce");
        assert!(f.is_submitting());
        assert_eq!(f.submit(), None);

        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["amount"], serde_json::json!(1499.5));

        f.failed("Backend unavailable".into());
        assert!(!f.is_submitting());
        assert_eq!(f.error(), Some("Backend unavailable"));
    }

    #[test]
    fn focus_cycles() {
        let f = FormField::Amount;
        assert_eq!(f.next().next().next().next(), FormField::Amount);
        assert_eq!(f.prev(), FormField::Device);
    }
}
