use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Action {
    Allow,
    Otp,
    Block,
}

/// Per-feature impact bucket reported alongside an explanation entry
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum Impact {
    #[default]
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "LOW",
            RiskLevel::Medium => "MEDIUM",
            RiskLevel::High => "HIGH",
        }
    }
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Allow => "ALLOW",
            Action::Otp => "OTP",
            Action::Block => "BLOCK",
        }
    }

    /// OTP and BLOCK transactions raise the alert and enter verification
    pub fn needs_attention(&self) -> bool {
        matches!(self, Action::Otp | Action::Block)
    }
}

impl std::str::FromStr for RiskLevel {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "LOW" => Ok(RiskLevel::Low),
            "MEDIUM" | "MED" => Ok(RiskLevel::Medium),
            "HIGH" => Ok(RiskLevel::High),
            _ => Err(format!("Invalid risk level '{s}'. Valid options: LOW, MEDIUM, HIGH")),
        }
    }
}

impl std::str::FromStr for Action {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "ALLOW" => Ok(Action::Allow),
            "OTP" => Ok(Action::Otp),
            "BLOCK" => Ok(Action::Block),
            _ => Err(format!("Invalid action '{s}'. Valid options: ALLOW, OTP, BLOCK")),
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One signed feature contribution from the model explanation.
/// Positive contributions push the score up, negative ones pull it down.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Explanation {
    #[serde(default)]
    pub feature: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(rename = "shap_val", alias = "contribution", alias = "value", default)]
    pub contribution: f64,
    #[serde(default)]
    pub impact: Impact,
}

impl Explanation {
    pub fn display_name(&self) -> &str {
        match self.label.as_deref() {
            Some(l) if !l.is_empty() => l,
            _ => &self.feature,
        }
    }

    pub fn increases_risk(&self) -> bool {
        self.contribution > 0.0
    }
}

/// A scored transaction as streamed by the backend.
///
/// Only the fields the dashboard reasons about are typed; everything else the backend
/// attaches (timestamp, user id, merchant category, ...) is carried in `extra` in the
/// order it arrived.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    #[serde(rename = "transaction_id")]
    pub id: String,
    #[serde(default)]
    pub amount: Decimal,
    #[serde(rename = "transaction_city", default)]
    pub city: String,
    #[serde(default)]
    pub payment_type: String,
    #[serde(default)]
    pub device_type: String,
    #[serde(default, deserialize_with = "de_score")]
    pub risk_score: u8,
    pub risk_level: RiskLevel,
    pub action: Action,
    #[serde(rename = "fraud_prob", default)]
    pub fraud_probability: f64,
    #[serde(default, deserialize_with = "de_flag")]
    pub is_anomaly: bool,
    #[serde(rename = "shap_explanation", default, deserialize_with = "de_explanation")]
    pub explanation: Vec<Explanation>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Transaction {
    /// Explanation entry with the largest absolute contribution
    pub fn top_signal(&self) -> Option<&Explanation> {
        self.explanation.iter().max_by(|a, b| {
            a.contribution
                .abs()
                .partial_cmp(&b.contribution.abs())
                .unwrap_or(std::cmp::Ordering::Equal)
        })
    }

    pub fn extra_str(&self, key: &str) -> Option<String> {
        self.extra.get(key).map(|v| match v {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
    }
}

/// Round and clamp a score into [0,100]; the backend sometimes emits floats
fn de_score<'de, D: Deserializer<'de>>(d: D) -> Result<u8, D::Error> {
    let v = Value::deserialize(d)?;
    let n = match &v {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => s.trim().parse::<f64>().map_err(serde::de::Error::custom)?,
        Value::Null => 0.0,
        _ => return Err(serde::de::Error::custom("risk_score must be numeric")),
    };
    Ok(n.round().clamp(0.0, 100.0) as u8)
}

/// Accept JSON booleans as well as the 0/1 integers stored by the backend database
fn de_flag<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::Bool(b) => b,
        Value::Number(n) => n.as_f64().map(|x| x != 0.0).unwrap_or(false),
        Value::String(s) => matches!(s.trim(), "1" | "true" | "True"),
        _ => false,
    })
}

/// Explanations arrive as an array when streamed and as a JSON string when read back
/// from the listing endpoint
fn de_explanation<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<Explanation>, D::Error> {
    let v = Value::deserialize(d)?;
    let v = match v {
        Value::String(s) if s.trim().is_empty() => return Ok(Vec::new()),
        Value::String(s) => serde_json::from_str::<Value>(&s).map_err(serde::de::Error::custom)?,
        other => other,
    };
    match v {
        Value::Array(items) => Ok(items
            .into_iter()
            .filter_map(|item| serde_json::from_value::<Explanation>(item).ok())
            .collect()),
        Value::Null => Ok(Vec::new()),
        _ => Err(serde::de::Error::custom("shap_explanation must be a list")),
    }
}

/// Inbound stream frame: keepalive control or a scored transaction
#[derive(Clone, Debug, PartialEq)]
pub enum StreamMessage {
    Pong,
    Ping,
    Transaction(Box<Transaction>),
}

impl StreamMessage {
    /// Parse one text frame. Returns `None` for anything malformed.
    ///
    /// Transactions also carry an `action` key (ALLOW/OTP/BLOCK), so control frames are
    /// recognised by their lowercase `ping`/`pong` value before trying the transaction shape.
    pub fn parse(text: &str) -> Option<StreamMessage> {
        let value: Value = serde_json::from_str(text).ok()?;
        if !value.is_object() {
            return None;
        }
        match value.get("action").and_then(|a| a.as_str()) {
            Some("pong") => return Some(StreamMessage::Pong),
            Some("ping") => return Some(StreamMessage::Ping),
            _ => {}
        }
        serde_json::from_value::<Transaction>(value)
            .ok()
            .map(|t| StreamMessage::Transaction(Box::new(t)))
    }
}

/// Aggregate counters from `GET /api/stats`
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Stats {
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub blocked: u64,
    #[serde(default)]
    pub otp: u64,
    #[serde(default)]
    pub allowed: u64,
    #[serde(default)]
    pub fraud_rate: f64,
    #[serde(default)]
    pub avg_risk: f64,
}

/// Verdict from `POST /api/otp/verify`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OtpVerdict {
    pub verified: bool,
    #[serde(default)]
    pub message: String,
}

/// Streaming connection lifecycle, owned by the transport
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Connecting,
    Connected,
    Disconnected,
}

impl ConnectionState {
    pub fn label(&self) -> &'static str {
        match self {
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "Live",
            ConnectionState::Disconnected => "disconnected",
        }
    }
}

/// Which backend helper produced an acknowledgement
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Trigger {
    Simulate,
    InjectFraud,
    UserInitiated,
}

#[derive(Debug, Clone)]
pub enum AppEvent {
    Connection(ConnectionState),
    Streamed(Box<Transaction>),
    Stats(Stats),
    /// Result of resolving `/item/{id}` against the backend listing
    LookupResolved { id: String, found: Option<Box<Transaction>> },
    /// `seq` identifies the verification attempt that issued the request
    OtpResult { id: String, seq: u64, outcome: Result<OtpVerdict, String> },
    OverrideResult { id: String, outcome: Result<String, String> },
    StreamToggled(Result<bool, String>),
    Triggered { trigger: Trigger, outcome: Result<(), String> },
    Quit,
}
