//! Step-up verification for a flagged transaction
//!
//! One [`VerifyFlow`] exists per invocation: the App starts a fresh flow every time a
//! transaction with an OTP or BLOCK action becomes selected. Each flow carries a
//! sequence number so that a response for an earlier attempt can never land on a
//! later one.
//!
//! ```text
//! AwaitingInput --submit_otp--> Verifying --verdict--> Verified | Rejected
//!       \---------------------force_block-----------------------> Rejected
//! ```

use crate::constants::verify::{CONNECTIVITY_MSG, OTP_LEN, SHORT_CODE_MSG, USER_BLOCK_MSG};
use crate::types::{Action, OtpVerdict, Transaction};
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_SEQ: AtomicU64 = AtomicU64::new(1);

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum VerifyKind {
    /// Numeric code entry
    Otp,
    /// Acknowledge only
    Block,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum VerifyState {
    AwaitingInput,
    Verifying,
    Verified,
    Rejected,
}

impl VerifyState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, VerifyState::Verified | VerifyState::Rejected)
    }
}

/// What the caller should do after a submit
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Submit {
    /// Send exactly one verification request
    Dispatch {
        transaction_id: String,
        seq: u64,
        code: String,
    },
    /// Blocked client-side; the message is shown inline
    Invalid,
    /// Not applicable in the current state (request already in flight, terminal, BLOCK)
    Ignored,
}

#[derive(Clone, Debug, PartialEq)]
pub struct VerifyFlow {
    txn_id: String,
    seq: u64,
    kind: VerifyKind,
    state: VerifyState,
    code: String,
    message: Option<String>,
}

impl VerifyFlow {
    /// Start a flow for `txn`. ALLOW transactions never enter verification.
    pub fn start(txn: &Transaction) -> Option<Self> {
        let kind = match txn.action {
            Action::Allow => return None,
            Action::Otp => VerifyKind::Otp,
            Action::Block => VerifyKind::Block,
        };
        Some(Self {
            txn_id: txn.id.clone(),
            seq: NEXT_SEQ.fetch_add(1, Ordering::Relaxed),
            kind,
            state: VerifyState::AwaitingInput,
            code: String::new(),
            message: None,
        })
    }

    pub fn transaction_id(&self) -> &str {
        &self.txn_id
    }

    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn kind(&self) -> VerifyKind {
        self.kind
    }

    pub fn state(&self) -> VerifyState {
        self.state
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    fn accepts_input(&self) -> bool {
        self.kind == VerifyKind::Otp && self.state == VerifyState::AwaitingInput
    }

    /// Submit control is disabled unless a code can actually be sent
    pub fn can_submit(&self) -> bool {
        self.accepts_input()
    }

    /// Append typed or pasted characters; non-digits are stripped and the code is capped
    pub fn input(&mut self, raw: &str) {
        if !self.accepts_input() {
            return;
        }
        for c in raw.chars().filter(|c| c.is_ascii_digit()) {
            if self.code.len() >= OTP_LEN {
                break;
            }
            self.code.push(c);
        }
    }

    pub fn backspace(&mut self) {
        if self.accepts_input() {
            self.code.pop();
        }
    }

    pub fn submit_otp(&mut self) -> Submit {
        if !self.accepts_input() {
            return Submit::Ignored;
        }
        if self.code.len() < OTP_LEN {
            self.message = Some(SHORT_CODE_MSG.to_string());
            return Submit::Invalid;
        }
        self.state = VerifyState::Verifying;
        self.message = None;
        Submit::Dispatch {
            transaction_id: self.txn_id.clone(),
            seq: self.seq,
            code: self.code.clone(),
        }
    }

    /// Apply a verification response. A response for another transaction or attempt, or
    /// one arriving when no request is outstanding, is a no-op. Returns the new state when
    /// applied.
    pub fn apply_verdict(
        &mut self,
        txn_id: &str,
        seq: u64,
        outcome: Result<OtpVerdict, String>,
    ) -> Option<VerifyState> {
        if txn_id != self.txn_id || seq != self.seq || self.state != VerifyState::Verifying {
            log::debug!("[verify] stale verdict for {txn_id}#{seq} ignored");
            return None;
        }
        match outcome {
            Ok(v) => {
                self.state = if v.verified {
                    VerifyState::Verified
                } else {
                    VerifyState::Rejected
                };
                self.message = (!v.message.is_empty()).then_some(v.message);
            }
            Err(e) => {
                log::warn!("[verify] request for {txn_id} failed: {e}");
                self.state = VerifyState::Rejected;
                self.message = Some(CONNECTIVITY_MSG.to_string());
            }
        }
        Some(self.state)
    }

    /// Operator blocks from the alert. Local only; the backend is not told.
    pub fn force_block(&mut self) {
        if self.state.is_terminal() {
            return;
        }
        self.state = VerifyState::Rejected;
        self.message = Some(USER_BLOCK_MSG.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::tests::txn;

    fn otp_flow() -> VerifyFlow {
        VerifyFlow::start(&txn("T1", 55)).unwrap()
    }

    fn ok(verified: bool, msg: &str) -> Result<OtpVerdict, String> {
        Ok(OtpVerdict {
            verified,
            message: msg.to_string(),
        })
    }

    #[test]
    fn allow_never_enters_flow() {
        assert!(VerifyFlow::start(&txn("A", 10)).is_none());
        assert_eq!(VerifyFlow::start(&txn("B", 90)).unwrap().kind(), VerifyKind::Block);
        assert_eq!(otp_flow().kind(), VerifyKind::Otp);
    }

    #[test]
    fn input_strips_non_digits_and_caps() {
        let mut f = otp_flow();
        f.input("48-29 13 77");
        assert_eq!(f.code(), "482913");
        f.backspace();
        f.input("a1b2");
        assert_eq!(f.code(), "482911");
    }

    #[test]
    fn short_code_rejected_locally() {
        let mut f = otp_flow();
        f.input("123");
        assert_eq!(f.submit_otp(), Submit::Invalid);
        assert_eq!(f.state(), VerifyState::AwaitingInput);
        assert_eq!(f.message(), Some(SHORT_CODE_MSG));
    }

    #[test]
    fn full_code_dispatches_once() {
        let mut f = otp_flow();
        f.input("482913");
        let first = f.submit_otp();
        assert!(matches!(
            &first,
            Submit::Dispatch { transaction_id, code, .. } if transaction_id == "T1" && code == "482913"
        ));
        assert_eq!(f.state(), VerifyState::Verifying);
        assert_eq!(f.submit_otp(), Submit::Ignored);
        assert!(!f.can_submit());
    }

    #[test]
    fn verdicts_are_terminal() {
        let mut f = otp_flow();
        f.input("482913");
        f.submit_otp();
        let seq = f.seq();
        assert_eq!(f.apply_verdict("T1", seq, ok(true, "OTP verified")), Some(VerifyState::Verified));
        assert_eq!(f.message(), Some("OTP verified"));
        assert_eq!(f.apply_verdict("T1", seq, ok(false, "late")), None);
        f.force_block();
        assert_eq!(f.state(), VerifyState::Verified);

        let mut g = otp_flow();
        g.input("000000");
        g.submit_otp();
        assert_eq!(
            g.apply_verdict("T1", g.seq(), ok(false, "Invalid OTP")),
            Some(VerifyState::Rejected)
        );
        assert_eq!(g.message(), Some("Invalid OTP"));
    }

    #[test]
    fn network_failure_rejects_with_connectivity_message() {
        let mut f = otp_flow();
        f.input("482913");
        f.submit_otp();
        f.apply_verdict("T1", f.seq(), Err("timed out".into()));
        assert_eq!(f.state(), VerifyState::Rejected);
        assert_eq!(f.message(), Some(CONNECTIVITY_MSG));
    }

    #[test]
    fn stale_responses_are_ignored() {
        let mut old = otp_flow();
        old.input("111111");
        old.submit_otp();

        let mut f = otp_flow();
        assert_ne!(old.seq(), f.seq());
        // nothing outstanding yet
        assert_eq!(f.apply_verdict("T1", f.seq(), ok(true, "")), None);
        f.input("482913");
        f.submit_otp();
        assert_eq!(f.apply_verdict("T1", old.seq(), ok(true, "")), None);
        assert_eq!(f.apply_verdict("OTHER", f.seq(), ok(true, "")), None);
        assert_eq!(f.state(), VerifyState::Verifying);
    }

    #[test]
    fn force_block_is_local() {
        let mut f = VerifyFlow::start(&txn("B", 90)).unwrap();
        f.input("123456");
        assert_eq!(f.code(), "");
        assert_eq!(f.submit_otp(), Submit::Ignored);
        f.force_block();
        assert_eq!(f.state(), VerifyState::Rejected);
        assert_eq!(f.message(), Some(USER_BLOCK_MSG));
    }
}
