use std::time::{Duration, Instant};
use tokio::sync::mpsc::UnboundedSender;

use crate::api::ApiRequest;
use crate::constants::app::{MAX_DEBUG_LOG_LINES, TOAST_DURATION_SECS};
use crate::filter::{self, compile_filter, FilterCriteria};
use crate::new_txn::{NewTxnForm, MERCHANT_CATEGORY};
use crate::router::{self, Route};
use crate::selection::{Resolution, SelectionCoordinator};
use crate::store::TransactionStore;
use crate::theme::Theme;
use crate::types::{Action, AppEvent, ConnectionState, Stats, Transaction, Trigger};
use crate::verify::{Submit, VerifyFlow, VerifyKind, VerifyState};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Filter,
    /// Typing the OTP into the alert
    Otp,
    /// New transaction form is open
    NewTxn,
    /// Typing a path to navigate to
    Goto,
}

pub struct App {
    quit: bool,
    theme: Theme,

    store: TransactionStore,
    /// Filtered view by id, recomputed in `publish`
    view: Vec<String>,
    /// Most recently streamed id; surfaced at the top of the view until the criteria change
    live_id: Option<String>,
    cursor: usize,

    // Filter state
    filter_query: String,
    criteria: FilterCriteria,
    input_mode: InputMode,
    goto_input: String,

    selection: SelectionCoordinator,
    verify: Option<VerifyFlow>,

    connection: ConnectionState,
    streaming: bool,
    stream_toggle_pending: bool,
    stats: Option<Stats>,
    stats_at: Option<chrono::DateTime<chrono::Local>>,

    // Detail view manual override (one request in flight)
    override_pending: Option<String>,
    override_message: Option<String>,

    new_txn: Option<NewTxnForm>,

    // Backend requests are executed by the api worker; results come back as AppEvents
    api_tx: Option<UnboundedSender<ApiRequest>>,
    lookup_limit: usize,
    stream_interval: f64,

    // Debug log (Ctrl+D)
    debug_log: Vec<String>,
    debug_visible: bool,

    toast_message: Option<(String, Instant)>,
}

impl App {
    pub fn new(
        theme: Theme,
        default_filter: String,
        lookup_limit: usize,
        stream_interval: f64,
        api_tx: Option<UnboundedSender<ApiRequest>>,
    ) -> Self {
        let criteria = compile_filter(&default_filter);
        Self {
            quit: false,
            theme,
            store: TransactionStore::new(),
            view: Vec::new(),
            live_id: None,
            cursor: 0,
            filter_query: default_filter,
            criteria,
            input_mode: InputMode::Normal,
            goto_input: String::new(),
            selection: SelectionCoordinator::new(),
            verify: None,
            connection: ConnectionState::Connecting,
            streaming: true,
            stream_toggle_pending: false,
            stats: None,
            stats_at: None,
            override_pending: None,
            override_message: None,
            new_txn: None,
            api_tx,
            lookup_limit,
            stream_interval,
            debug_log: Vec::new(),
            debug_visible: false,
            toast_message: None,
        }
    }

    // ----- getters -----
    pub fn quit_flag(&self) -> bool { self.quit }
    pub fn theme(&self) -> Theme { self.theme }
    pub fn store(&self) -> &TransactionStore { &self.store }
    pub fn input_mode(&self) -> InputMode { self.input_mode }
    pub fn filter_query(&self) -> &str { &self.filter_query }
    pub fn criteria(&self) -> &FilterCriteria { &self.criteria }
    pub fn goto_input(&self) -> &str { &self.goto_input }
    pub fn connection(&self) -> ConnectionState { self.connection }
    pub fn streaming(&self) -> bool { self.streaming }
    pub fn stats(&self) -> Option<&Stats> { self.stats.as_ref() }
    pub fn stats_at(&self) -> Option<chrono::DateTime<chrono::Local>> { self.stats_at }
    pub fn cursor(&self) -> usize { self.cursor }
    pub fn route(&self) -> &Route { self.selection.route() }
    pub fn path(&self) -> String { self.selection.path() }
    pub fn can_go_back(&self) -> bool { self.selection.can_go_back() }
    pub fn can_go_forward(&self) -> bool { self.selection.can_go_forward() }
    pub fn pending_lookup(&self) -> Option<&str> { self.selection.pending_lookup() }
    pub fn live_id(&self) -> Option<&str> { self.live_id.as_deref() }
    pub fn override_pending(&self) -> bool { self.override_pending.is_some() }
    pub fn override_message(&self) -> Option<&str> { self.override_message.as_deref() }
    pub fn new_txn_form(&self) -> Option<&NewTxnForm> { self.new_txn.as_ref() }
    pub fn debug_log(&self) -> &[String] { &self.debug_log }
    pub fn debug_visible(&self) -> bool { self.debug_visible }

    /// Filtered feed, most-recent-first, with the live override applied
    pub fn visible(&self) -> Vec<&Transaction> {
        self.view.iter().filter_map(|id| self.store.get(id)).collect()
    }

    pub fn selected(&self) -> Option<&Transaction> {
        self.selection.resolve(&self.store)
    }

    /// Verification flow for the current selection, if it needs one
    pub fn alert(&self) -> Option<&VerifyFlow> {
        let selected = self.selection.selected_id()?;
        self.verify
            .as_ref()
            .filter(|f| f.transaction_id() == selected)
    }

    /// Show a toast notification for 2 seconds
    pub fn show_toast(&mut self, msg: String) {
        self.toast_message = Some((msg, Instant::now()));
    }

    /// Get current toast message if still active
    pub fn toast_message(&self) -> Option<&str> {
        const TOAST_DURATION: Duration = Duration::from_secs(TOAST_DURATION_SECS);
        self.toast_message.as_ref().and_then(|(msg, time)| {
            if time.elapsed() < TOAST_DURATION {
                Some(msg.as_str())
            } else {
                None
            }
        })
    }

    pub fn log_debug(&mut self, msg: String) {
        log::debug!("{msg}");
        let timestamp = chrono::Local::now().format("%H:%M:%S%.3f");
        self.debug_log.push(format!("[{timestamp}] {msg}"));
        if self.debug_log.len() > MAX_DEBUG_LOG_LINES {
            self.debug_log.remove(0);
        }
    }

    pub fn toggle_debug_panel(&mut self) {
        self.debug_visible = !self.debug_visible;
        self.log_debug(format!("Debug panel: {}", if self.debug_visible { "visible" } else { "hidden" }));
    }

    pub fn cycle_theme(&mut self) {
        self.theme = self.theme.next();
        self.show_toast(format!("Theme: {}", self.theme));
    }

    fn send(&mut self, req: ApiRequest) -> bool {
        let sent = match &self.api_tx {
            Some(tx) => tx.send(req).is_ok(),
            None => false,
        };
        if !sent {
            self.log_debug("Backend worker unavailable, request dropped".into());
        }
        sent
    }

    // ----- derived state -----

    /// Recompute the view after any store or criteria change and drop a selection
    /// whose transaction left the store
    fn publish(&mut self) {
        let live = self.live_id.as_deref().and_then(|id| self.store.get(id));
        let view = filter::with_live(filter::filter(self.store.items(), &self.criteria), live);
        self.view = view.into_iter().map(|t| t.id.clone()).collect();
        self.cursor = self.cursor.min(self.view.len().saturating_sub(1));

        if self.selection.revalidate(&self.store) {
            self.verify = None;
            self.log_debug("Selection left the store, cleared".into());
        }
    }

    /// Fresh verification for whatever is selected now. A request still in flight for
    /// the same transaction keeps its flow, so at most one is ever outstanding.
    fn restart_flow(&mut self) {
        let in_flight = match (&self.verify, self.selected()) {
            (Some(flow), Some(t)) => {
                flow.state() == VerifyState::Verifying
                    && flow.transaction_id() == t.id
                    && t.action.needs_attention()
            }
            _ => false,
        };
        if in_flight {
            self.log_debug("Verification already in flight, keeping it".into());
        } else {
            self.verify = self.selected().and_then(VerifyFlow::start);
        }
        if self.input_mode == InputMode::Otp {
            self.input_mode = InputMode::Normal;
        }
    }

    /// Keep the current flow if it still belongs to the selection
    fn sync_flow(&mut self) {
        let same = match (self.selection.selected_id(), &self.verify) {
            (Some(id), Some(flow)) => flow.transaction_id() == id,
            (None, None) => true,
            _ => false,
        };
        if !same {
            self.restart_flow();
        }
    }

    fn reset_detail_state(&mut self) {
        self.override_message = None;
    }

    // ----- streaming -----

    fn ingest_streamed(&mut self, txn: Transaction) {
        let id = txn.id.clone();
        self.log_debug(format!(
            "Stream {} score={} action={}",
            id, txn.risk_score, txn.action
        ));
        self.selection.focus_latest(&txn);
        let evicted = self.store.upsert(txn);
        if !evicted.is_empty() {
            self.log_debug(format!("Evicted {}", evicted.join(",")));
        }
        self.live_id = Some(id);
        self.reset_detail_state();
        self.publish();
        self.restart_flow();
    }

    // ----- events -----
    pub fn on_event(&mut self, ev: AppEvent) {
        match ev {
            AppEvent::Quit => self.quit = true,
            AppEvent::Connection(state) => {
                if state != self.connection {
                    self.log_debug(format!("Connection: {}", state.label()));
                }
                self.connection = state;
            }
            AppEvent::Streamed(txn) => self.ingest_streamed(*txn),
            AppEvent::Stats(stats) => {
                self.stats = Some(stats);
                self.stats_at = Some(chrono::Local::now());
            }
            AppEvent::LookupResolved { id, found } => {
                let missing = found.is_none();
                if self.selection.lookup_resolved(&id, found.map(|b| *b), &self.store) {
                    if missing {
                        self.show_toast(format!("Transaction {id} not found"));
                    }
                    self.restart_flow();
                }
            }
            AppEvent::OtpResult { id, seq, outcome } => {
                let applied = self
                    .verify
                    .as_mut()
                    .and_then(|flow| flow.apply_verdict(&id, seq, outcome));
                match applied {
                    Some(VerifyState::Verified) => {
                        let msg = self
                            .verify
                            .as_ref()
                            .and_then(|f| f.message())
                            .unwrap_or("Verified")
                            .to_string();
                        self.show_toast(msg);
                        self.dismiss_alert();
                    }
                    Some(_) => self.log_debug(format!("OTP for {id} rejected")),
                    None => self.log_debug(format!("Stale OTP result for {id} ignored")),
                }
            }
            AppEvent::OverrideResult { id, outcome } => {
                if self.override_pending.as_deref() != Some(id.as_str()) {
                    self.log_debug(format!("Stale override result for {id} ignored"));
                    return;
                }
                self.override_pending = None;
                let msg = match outcome {
                    Ok(m) => m,
                    Err(e) => format!("Failed: {e}"),
                };
                // only shown while the detail view still shows that transaction
                if self.selection.selected_id() == Some(id.as_str()) {
                    self.override_message = Some(msg);
                }
            }
            AppEvent::StreamToggled(outcome) => {
                self.stream_toggle_pending = false;
                match outcome {
                    Ok(on) => {
                        self.streaming = on;
                        self.show_toast(if on { "Stream started".into() } else { "Stream paused".into() });
                    }
                    Err(e) => self.show_toast(format!("Stream control failed: {e}")),
                }
            }
            AppEvent::Triggered { trigger, outcome } => match (trigger, outcome) {
                (Trigger::UserInitiated, Ok(())) => {
                    self.new_txn = None;
                    if self.input_mode == InputMode::NewTxn {
                        self.input_mode = InputMode::Normal;
                    }
                    self.show_toast("Transaction submitted".into());
                }
                (Trigger::UserInitiated, Err(e)) => match self.new_txn.as_mut() {
                    Some(form) => form.failed(e),
                    None => self.show_toast(format!("Transaction failed: {e}")),
                },
                (Trigger::Simulate, Ok(())) => self.show_toast("Simulated transaction sent".into()),
                (Trigger::InjectFraud, Ok(())) => self.show_toast("Fraud pattern injected".into()),
                (_, Err(e)) => self.show_toast(format!("Request failed: {e}")),
            },
        }
    }

    // ----- feed navigation -----
    pub fn up(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn down(&mut self) {
        if self.cursor + 1 < self.view.len() {
            self.cursor += 1;
        }
    }

    pub fn home(&mut self) {
        self.cursor = 0;
    }

    /// Open the transaction under the cursor
    pub fn open_selected(&mut self) {
        let Some(txn) = self.view.get(self.cursor).and_then(|id| self.store.get(id)).cloned() else {
            return;
        };
        self.log_debug(format!("Open {}", txn.id));
        self.selection.open(&txn);
        self.reset_detail_state();
        self.restart_flow();
    }

    pub fn close_detail(&mut self) {
        self.selection.close();
        self.verify = None;
        self.reset_detail_state();
    }

    /// Dismiss the alert: drop the selection, leaving its detail path if we are on it
    pub fn dismiss_alert(&mut self) {
        self.selection.dismiss();
        self.verify = None;
        self.reset_detail_state();
        if self.input_mode == InputMode::Otp {
            self.input_mode = InputMode::Normal;
        }
    }

    fn handle_resolution(&mut self, res: Resolution) {
        if let Resolution::NeedsLookup(id) = res {
            self.log_debug(format!("Looking up {id} in backend listing"));
            let limit = self.lookup_limit;
            if !self.send(ApiRequest::Lookup { id: id.clone(), limit }) {
                self.selection.lookup_resolved(&id, None, &self.store);
            }
        }
        self.reset_detail_state();
        self.sync_flow();
    }

    /// Navigate to a path as if it arrived from outside (deep link, typed path)
    pub fn navigate_to(&mut self, route: Route) {
        let res = self.selection.navigate(route, &self.store);
        self.handle_resolution(res);
    }

    pub fn back(&mut self) {
        if let Some(res) = self.selection.back(&self.store) {
            self.handle_resolution(res);
        }
    }

    pub fn forward(&mut self) {
        if let Some(res) = self.selection.forward(&self.store) {
            self.handle_resolution(res);
        }
    }

    // ----- filter -----
    pub fn start_filter(&mut self) {
        self.input_mode = InputMode::Filter;
    }

    /// Criteria are rebuilt from the whole query on every keystroke
    fn refilter(&mut self) {
        let next = compile_filter(&self.filter_query);
        if next != self.criteria {
            self.criteria = next;
            self.live_id = None;
            self.publish();
        }
    }

    pub fn filter_add_char(&mut self, ch: char) {
        self.filter_query.push(ch);
        self.refilter();
    }

    pub fn filter_backspace(&mut self) {
        self.filter_query.pop();
        self.refilter();
    }

    pub fn apply_filter(&mut self) {
        self.input_mode = InputMode::Normal;
        self.refilter();
    }

    pub fn set_filter(&mut self, query: &str) {
        self.filter_query = query.to_string();
        self.refilter();
    }

    pub fn clear_filter(&mut self) {
        self.filter_query.clear();
        self.input_mode = InputMode::Normal;
        self.refilter();
    }

    // ----- goto prompt -----
    pub fn start_goto(&mut self) {
        self.goto_input.clear();
        self.input_mode = InputMode::Goto;
    }

    pub fn goto_add_char(&mut self, ch: char) {
        self.goto_input.push(ch);
    }

    pub fn goto_backspace(&mut self) {
        self.goto_input.pop();
    }

    pub fn cancel_input(&mut self) {
        self.input_mode = InputMode::Normal;
    }

    pub fn submit_goto(&mut self) {
        self.input_mode = InputMode::Normal;
        let raw = std::mem::take(&mut self.goto_input);
        match router::parse(&raw) {
            Some(route) => self.navigate_to(route),
            None => self.show_toast(format!("Unknown path: {raw}")),
        }
    }

    // ----- verification -----

    /// Enter code entry on an OTP alert
    pub fn start_otp_entry(&mut self) {
        if self.alert().is_some_and(|f| f.can_submit()) {
            self.input_mode = InputMode::Otp;
        }
    }

    pub fn otp_input(&mut self, raw: &str) {
        if let Some(flow) = self.verify.as_mut() {
            flow.input(raw);
        }
    }

    pub fn otp_backspace(&mut self) {
        if let Some(flow) = self.verify.as_mut() {
            flow.backspace();
        }
    }

    pub fn submit_otp(&mut self) {
        if self.alert().is_none() {
            return;
        }
        let Some(submit) = self.verify.as_mut().map(|f| f.submit_otp()) else {
            return;
        };
        match submit {
            Submit::Dispatch { transaction_id, seq, code } => {
                self.input_mode = InputMode::Normal;
                self.log_debug(format!("Verifying OTP for {transaction_id}"));
                let req = ApiRequest::VerifyOtp { id: transaction_id.clone(), seq, code };
                if !self.send(req) {
                    if let Some(flow) = self.verify.as_mut() {
                        flow.apply_verdict(&transaction_id, seq, Err("backend unavailable".into()));
                    }
                }
            }
            Submit::Invalid => self.log_debug("OTP too short, not sent".into()),
            Submit::Ignored => {}
        }
    }

    /// Block from the alert. Stays client-side.
    pub fn force_block(&mut self) {
        if self.alert().is_none() {
            return;
        }
        if let Some(flow) = self.verify.as_mut() {
            flow.force_block();
        }
        if self.input_mode == InputMode::Otp {
            self.input_mode = InputMode::Normal;
        }
    }

    // ----- detail view override -----
    pub fn set_action(&mut self, action: Action) {
        if self.override_pending.is_some() {
            return;
        }
        let Some(id) = self.selected().map(|t| t.id.clone()) else {
            return;
        };
        self.override_message = None;
        if self.send(ApiRequest::SetAction { id: id.clone(), action }) {
            self.log_debug(format!("Override {id} -> {action}"));
            self.override_pending = Some(id);
        } else {
            self.override_message = Some("Backend unavailable".into());
        }
    }

    // ----- backend stream & demo -----
    pub fn toggle_stream(&mut self) {
        if self.stream_toggle_pending {
            return;
        }
        let req = ApiRequest::StreamControl {
            start: !self.streaming,
            interval_secs: self.stream_interval,
        };
        self.stream_toggle_pending = self.send(req);
    }

    pub fn simulate(&mut self) {
        self.send(ApiRequest::Trigger(Trigger::Simulate));
    }

    pub fn inject_fraud(&mut self) {
        self.send(ApiRequest::Trigger(Trigger::InjectFraud));
    }

    // ----- new transaction form -----
    pub fn open_new_txn(&mut self) {
        self.new_txn = Some(NewTxnForm::new(self.store.cities()));
        self.input_mode = InputMode::NewTxn;
    }

    pub fn close_new_txn(&mut self) {
        self.new_txn = None;
        self.input_mode = InputMode::Normal;
    }

    pub fn new_txn_mut(&mut self) -> Option<&mut NewTxnForm> {
        self.new_txn.as_mut()
    }

    pub fn submit_new_txn(&mut self) {
        let Some(body) = self.new_txn.as_mut().and_then(|f| f.submit()) else {
            return;
        };
        self.log_debug(format!(
            "Submitting {} {} in {} ({})",
            body.amount, body.payment_type, body.transaction_city, MERCHANT_CATEGORY
        ));
        if !self.send(ApiRequest::Submit(body)) {
            if let Some(form) = self.new_txn.as_mut() {
                form.failed("Backend unavailable".into());
            }
        }
    }

    /// Alert kind for the current selection (rendering helper)
    pub fn alert_kind(&self) -> Option<VerifyKind> {
        self.alert().map(|f| f.kind())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::tests::txn;
    use crate::types::OtpVerdict;
    use rust_decimal::Decimal;
    use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};

    fn app() -> (App, UnboundedReceiver<ApiRequest>) {
        let (tx, rx) = unbounded_channel();
        (App::new(Theme::Nord, String::new(), 200, 3.0, Some(tx)), rx)
    }

    fn stream(app: &mut App, t: Transaction) {
        app.on_event(AppEvent::Streamed(Box::new(t)));
    }

    fn ids(app: &App) -> Vec<String> {
        app.visible().iter().map(|t| t.id.clone()).collect()
    }

    fn drain(rx: &mut UnboundedReceiver<ApiRequest>) -> Vec<ApiRequest> {
        let mut out = Vec::new();
        while let Ok(r) = rx.try_recv() {
            out.push(r);
        }
        out
    }

    #[test]
    fn streamed_block_takes_focus_and_raises_alert() {
        let (mut app, _rx) = app();
        stream(&mut app, txn("A", 10));
        assert!(app.alert().is_none(), "ALLOW never raises the alert");
        stream(&mut app, txn("B", 90));

        assert_eq!(ids(&app), vec!["B", "A"]);
        assert_eq!(app.selected().unwrap().id, "B");
        assert_eq!(app.alert_kind(), Some(VerifyKind::Block));
        assert_eq!(app.path(), "/");
    }

    #[test]
    fn live_override_survives_until_criteria_change() {
        let (mut app, _rx) = app();
        app.set_filter("action:BLOCK");
        stream(&mut app, txn("B1", 90));
        stream(&mut app, txn("N", 10));
        assert_eq!(ids(&app), vec!["N", "B1"]);

        app.set_filter("action:BLOCK ");
        assert_eq!(ids(&app), vec!["N", "B1"], "same criteria keeps the override");
        app.set_filter("action:BLOCK risk:HIGH");
        assert_eq!(ids(&app), vec!["B1"]);
    }

    #[test]
    fn otp_short_code_sends_nothing_full_code_sends_once() {
        let (mut app, mut rx) = app();
        stream(&mut app, txn("T", 55));
        app.start_otp_entry();
        assert_eq!(app.input_mode(), InputMode::Otp);

        app.otp_input("123");
        app.submit_otp();
        assert!(drain(&mut rx).is_empty());
        assert_eq!(app.alert().unwrap().state(), VerifyState::AwaitingInput);

        app.otp_input("482913");
        assert_eq!(app.alert().unwrap().code(), "123482");
        for _ in 0..6 {
            app.otp_backspace();
        }
        app.otp_input("482913");
        app.submit_otp();
        app.submit_otp();
        let sent = drain(&mut rx);
        assert_eq!(sent.len(), 1);
        assert!(matches!(&sent[0], ApiRequest::VerifyOtp { id, code, .. } if id == "T" && code == "482913"));
        assert_eq!(app.alert().unwrap().state(), VerifyState::Verifying);
    }

    #[test]
    fn verified_clears_selection_and_path() {
        let (mut app, mut rx) = app();
        stream(&mut app, txn("T", 55));
        app.open_selected();
        assert_eq!(app.path(), "/item/T");

        app.otp_input("482913");
        app.submit_otp();
        let Some(ApiRequest::VerifyOtp { id, seq, .. }) = drain(&mut rx).pop() else {
            panic!("expected verification request");
        };
        app.on_event(AppEvent::OtpResult {
            id,
            seq,
            outcome: Ok(OtpVerdict { verified: true, message: "OTP verified".into() }),
        });
        assert!(app.selected().is_none());
        assert!(app.alert().is_none());
        assert_eq!(app.path(), "/");
        assert_eq!(app.toast_message(), Some("OTP verified"));
    }

    #[test]
    fn verification_failure_stays_inline() {
        let (mut app, mut rx) = app();
        stream(&mut app, txn("T", 55));
        app.otp_input("482913");
        app.submit_otp();
        let Some(ApiRequest::VerifyOtp { id, seq, .. }) = drain(&mut rx).pop() else {
            panic!("expected verification request");
        };
        app.on_event(AppEvent::OtpResult { id, seq, outcome: Err("timeout".into()) });
        let flow = app.alert().unwrap();
        assert_eq!(flow.state(), VerifyState::Rejected);
        assert_eq!(flow.message(), Some(crate::constants::verify::CONNECTIVITY_MSG));
        assert_eq!(app.selected().unwrap().id, "T");
    }

    #[test]
    fn stale_otp_result_after_new_event_is_noop() {
        let (mut app, mut rx) = app();
        stream(&mut app, txn("T", 55));
        app.otp_input("482913");
        app.submit_otp();
        let Some(ApiRequest::VerifyOtp { id, seq, .. }) = drain(&mut rx).pop() else {
            panic!("expected verification request");
        };
        stream(&mut app, txn("U", 60));
        app.on_event(AppEvent::OtpResult {
            id,
            seq,
            outcome: Ok(OtpVerdict { verified: true, message: String::new() }),
        });
        assert_eq!(app.selected().unwrap().id, "U");
        assert_eq!(app.alert().unwrap().state(), VerifyState::AwaitingInput);
    }

    fn verify_requests(sent: &[ApiRequest]) -> usize {
        sent.iter()
            .filter(|r| matches!(r, ApiRequest::VerifyOtp { .. }))
            .count()
    }

    #[test]
    fn reopening_during_verification_sends_no_second_request() {
        let (mut app, mut rx) = app();
        stream(&mut app, txn("T", 55));
        app.otp_input("482913");
        app.submit_otp();

        app.open_selected();
        assert_eq!(app.alert().unwrap().state(), VerifyState::Verifying);
        app.start_otp_entry();
        assert_eq!(app.input_mode(), InputMode::Normal);
        app.otp_input("482913");
        app.submit_otp();

        let sent = drain(&mut rx);
        assert_eq!(verify_requests(&sent), 1);
        let Some(ApiRequest::VerifyOtp { id, seq, .. }) = sent.into_iter().next() else {
            panic!("expected verification request");
        };
        app.on_event(AppEvent::OtpResult {
            id,
            seq,
            outcome: Ok(OtpVerdict { verified: true, message: "OTP verified".into() }),
        });
        assert!(app.alert().is_none());
        assert!(app.selected().is_none());
    }

    #[test]
    fn restreamed_id_keeps_pending_verification() {
        let (mut app, mut rx) = app();
        stream(&mut app, txn("T", 55));
        app.otp_input("482913");
        app.submit_otp();

        stream(&mut app, txn("T", 58));
        assert_eq!(app.alert().unwrap().state(), VerifyState::Verifying);
        app.otp_input("482913");
        app.submit_otp();
        assert_eq!(verify_requests(&drain(&mut rx)), 1);

        // a different transaction still gets its own attempt
        stream(&mut app, txn("U", 60));
        assert_eq!(app.alert().unwrap().state(), VerifyState::AwaitingInput);
    }

    #[test]
    fn force_block_makes_no_request() {
        let (mut app, mut rx) = app();
        stream(&mut app, txn("B", 95));
        app.force_block();
        assert!(drain(&mut rx).is_empty());
        assert_eq!(app.alert().unwrap().state(), VerifyState::Rejected);
    }

    #[test]
    fn navigation_to_unknown_id_looks_up_then_selects() {
        let (mut app, mut rx) = app();
        stream(&mut app, txn("A", 10));
        app.navigate_to(Route::item("OLD"));
        assert!(app.selected().is_none());
        assert_eq!(
            drain(&mut rx),
            vec![ApiRequest::Lookup { id: "OLD".into(), limit: 200 }]
        );

        app.on_event(AppEvent::LookupResolved {
            id: "OLD".into(),
            found: Some(Box::new(txn("OLD", 75))),
        });
        assert_eq!(app.selected().unwrap().id, "OLD");
        assert_eq!(app.alert_kind(), Some(VerifyKind::Block));
        assert!(!app.store().contains("OLD"));
    }

    #[test]
    fn failed_lookup_means_no_selection() {
        let (mut app, _rx) = app();
        app.navigate_to(Route::item("GONE"));
        app.on_event(AppEvent::LookupResolved { id: "GONE".into(), found: None });
        assert!(app.selected().is_none());
        assert_eq!(app.toast_message(), Some("Transaction GONE not found"));
    }

    #[test]
    fn back_forward_reselect_from_store() {
        let (mut app, mut rx) = app();
        stream(&mut app, txn("A", 10));
        stream(&mut app, txn("B", 20));
        app.down();
        app.open_selected();
        assert_eq!(app.selected().unwrap().id, "A");
        app.close_detail();
        app.back();
        assert_eq!(app.selected().unwrap().id, "A");
        app.back();
        assert!(app.selected().is_none());
        app.forward();
        assert_eq!(app.path(), "/item/A");
        assert!(drain(&mut rx).is_empty());
    }

    #[test]
    fn filtered_out_selection_is_kept() {
        let (mut app, _rx) = app();
        stream(&mut app, txn("A", 10));
        app.open_selected();
        app.set_filter("action:BLOCK");
        assert!(ids(&app).is_empty());
        assert_eq!(app.selected().unwrap().id, "A");
    }

    #[test]
    fn amount_filter_scenario() {
        let (mut app, _rx) = app();
        for (id, amount) in [("a", 200), ("b", 700), ("c", 1500)] {
            let mut t = txn(id, 10);
            t.amount = Decimal::from(amount);
            stream(&mut app, t);
        }
        app.set_filter("min:500 max:1000");
        assert_eq!(ids(&app), vec!["b"]);
    }

    #[test]
    fn override_allows_one_request_in_flight() {
        let (mut app, mut rx) = app();
        stream(&mut app, txn("T", 55));
        app.open_selected();
        app.set_action(Action::Allow);
        app.set_action(Action::Block);
        assert_eq!(drain(&mut rx).len(), 1);
        assert!(app.override_pending());

        app.on_event(AppEvent::OverrideResult { id: "T".into(), outcome: Ok("Action set to ALLOW".into()) });
        assert!(!app.override_pending());
        assert_eq!(app.override_message(), Some("Action set to ALLOW"));
    }

    #[test]
    fn new_txn_form_round_trip() {
        let (mut app, mut rx) = app();
        stream(&mut app, txn("A", 10));
        app.open_new_txn();
        app.submit_new_txn();
        assert!(drain(&mut rx).is_empty());
        assert_eq!(
            app.new_txn_form().unwrap().error(),
            Some(crate::new_txn::INVALID_AMOUNT_MSG)
        );

        for c in "250".chars() {
            app.new_txn_mut().unwrap().type_char(c);
        }
        app.submit_new_txn();
        assert!(matches!(drain(&mut rx).as_slice(), [ApiRequest::Submit(b)] if b.transaction_city == "Mumbai"));

        app.on_event(AppEvent::Triggered { trigger: Trigger::UserInitiated, outcome: Ok(()) });
        assert!(app.new_txn_form().is_none());
        assert_eq!(app.input_mode(), InputMode::Normal);
    }

    #[test]
    fn stream_toggle_waits_for_ack() {
        let (mut app, mut rx) = app();
        app.toggle_stream();
        app.toggle_stream();
        assert_eq!(
            drain(&mut rx),
            vec![ApiRequest::StreamControl { start: false, interval_secs: 3.0 }]
        );
        app.on_event(AppEvent::StreamToggled(Ok(false)));
        assert!(!app.streaming());
    }

    #[test]
    fn debug_log_is_bounded() {
        let (mut app, _rx) = app();
        for i in 0..(MAX_DEBUG_LOG_LINES + 10) {
            app.log_debug(format!("line {i}"));
        }
        assert_eq!(app.debug_log().len(), MAX_DEBUG_LOG_LINES);
        assert!(app.debug_log()[0].ends_with("line 10"));
    }
}
