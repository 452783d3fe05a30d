//! Shared fakes for the integration tests: an in-memory backend and a scripted dialer.
#![allow(dead_code)]

use argusx::api::{ApiError, Backend};
use argusx::new_txn::NewTransaction;
use argusx::transport::{Dialer, StreamLink};
use argusx::types::{Action, OtpVerdict, Stats, Transaction, Trigger};
use async_trait::async_trait;
use serde_json::json;
use std::collections::VecDeque;
use std::sync::Mutex;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

pub const GOOD_OTP: &str = "482913";

/// Wire frame for one scored transaction, shaped like the backend stream
pub fn frame(id: &str, score: u8, city: &str, amount: u32) -> String {
    let (level, action) = match score {
        0..=39 => ("LOW", "ALLOW"),
        40..=69 => ("MEDIUM", "OTP"),
        _ => ("HIGH", "BLOCK"),
    };
    json!({
        "transaction_id": id,
        "amount": amount,
        "transaction_city": city,
        "payment_type": "UPI",
        "device_type": "Mobile",
        "merchant_category": "E-Commerce",
        "risk_score": score,
        "risk_level": level,
        "action": action,
        "fraud_prob": f64::from(score) * 0.8,
        "is_anomaly": 0,
        "shap_explanation": [
            {"feature": "amount", "shap_val": 0.42, "impact": "HIGH"},
            {"feature": "hour", "shap_val": -0.1, "impact": "LOW"}
        ]
    })
    .to_string()
}

pub fn txn(id: &str, score: u8, city: &str, amount: u32) -> Transaction {
    serde_json::from_str(&frame(id, score, city, amount)).expect("valid frame")
}

/// Backend serving a fixed listing and accepting exactly [`GOOD_OTP`]
#[derive(Default)]
pub struct MemoryBackend {
    pub listing: Vec<Transaction>,
    pub offline: bool,
    pub otp_calls: Mutex<Vec<(String, String)>>,
    pub actions: Mutex<Vec<(String, Action)>>,
}

impl MemoryBackend {
    pub fn with_listing(listing: Vec<Transaction>) -> Self {
        Self {
            listing,
            ..Default::default()
        }
    }

    fn check_online(&self) -> Result<(), ApiError> {
        if self.offline {
            Err(ApiError::Transport("connection refused".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn stats(&self) -> Result<Stats, ApiError> {
        self.check_online()?;
        Ok(Stats {
            total: self.listing.len() as u64,
            ..Default::default()
        })
    }

    async fn recent_transactions(&self, limit: usize) -> Result<Vec<Transaction>, ApiError> {
        self.check_online()?;
        Ok(self.listing.iter().take(limit).cloned().collect())
    }

    async fn stream_control(&self, start: bool, _interval_secs: f64) -> Result<bool, ApiError> {
        self.check_online()?;
        Ok(start)
    }

    async fn trigger(&self, _trigger: Trigger) -> Result<(), ApiError> {
        self.check_online()
    }

    async fn submit_transaction(&self, _body: &NewTransaction) -> Result<(), ApiError> {
        self.check_online()
    }

    async fn set_action(&self, transaction_id: &str, action: Action) -> Result<String, ApiError> {
        self.check_online()?;
        self.actions
            .lock()
            .unwrap()
            .push((transaction_id.to_string(), action));
        Ok(format!("Action set to {action}"))
    }

    async fn verify_otp(&self, transaction_id: &str, otp: &str) -> Result<OtpVerdict, ApiError> {
        self.check_online()?;
        self.otp_calls
            .lock()
            .unwrap()
            .push((transaction_id.to_string(), otp.to_string()));
        Ok(if otp == GOOD_OTP {
            OtpVerdict {
                verified: true,
                message: "OTP verified".into(),
            }
        } else {
            OtpVerdict {
                verified: false,
                message: "Invalid OTP".into(),
            }
        })
    }
}

pub struct ChannelLink {
    incoming: UnboundedReceiver<String>,
    outgoing: UnboundedSender<String>,
}

#[async_trait]
impl StreamLink for ChannelLink {
    async fn send_text(&mut self, text: &str) -> anyhow::Result<()> {
        self.outgoing
            .send(text.to_string())
            .map_err(|_| anyhow::anyhow!("server gone"))
    }

    async fn recv_text(&mut self) -> Option<String> {
        self.incoming.recv().await
    }

    async fn close(&mut self) {
        self.incoming.close();
    }
}

/// Server end of a scripted connection
pub struct Server {
    pub push: UnboundedSender<String>,
    pub received: UnboundedReceiver<String>,
}

/// Hands out pre-scripted connections in order; hangs once the script is exhausted
#[derive(Default)]
pub struct ScriptedDialer {
    links: Mutex<VecDeque<ChannelLink>>,
    pub dials: Mutex<usize>,
}

impl ScriptedDialer {
    pub fn serve(&self) -> Server {
        let (push, incoming) = unbounded_channel();
        let (outgoing, received) = unbounded_channel();
        self.links
            .lock()
            .unwrap()
            .push_back(ChannelLink { incoming, outgoing });
        Server { push, received }
    }
}

#[async_trait]
impl Dialer for ScriptedDialer {
    async fn dial(&self, _url: &str) -> anyhow::Result<Box<dyn StreamLink>> {
        *self.dials.lock().unwrap() += 1;
        let next = self.links.lock().unwrap().pop_front();
        match next {
            Some(link) => Ok(Box::new(link)),
            None => std::future::pending().await,
        }
    }
}
