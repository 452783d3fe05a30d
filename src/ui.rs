use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Cell, Clear, Gauge, Paragraph, Row, Table, TableState, Wrap},
    Frame,
};

use crate::app::{App, InputMode};
use crate::constants::ui::{MIN_HEIGHT, MIN_WIDTH, NARROW_THRESHOLD};
use crate::new_txn::FormField;
use crate::theme::ColorScheme;
use crate::types::{ConnectionState, Transaction};
use crate::verify::{VerifyFlow, VerifyKind, VerifyState};

// ===============================
// Top-level draw
// ===============================
pub fn draw(f: &mut Frame, app: &App) {
    let c = app.theme().colors();
    let filter_expanded = app.input_mode() == InputMode::Filter || !app.filter_query().is_empty();
    let show_debug = app.debug_visible() && !app.debug_log().is_empty();

    let mut constraints: Vec<Constraint> = Vec::with_capacity(6);
    constraints.push(Constraint::Length(1)); // header
    constraints.push(Constraint::Length(1)); // stats
    if filter_expanded {
        constraints.push(Constraint::Length(3));
    }
    constraints.push(Constraint::Min(0)); // body
    if show_debug {
        constraints.push(Constraint::Length(6));
    }
    constraints.push(Constraint::Length(2)); // footer

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints(constraints)
        .split(f.area());

    let mut idx = 0usize;
    header(f, chunks[idx], app, &c);
    idx += 1;
    stats_bar(f, chunks[idx], app, &c);
    idx += 1;
    if filter_expanded {
        filter_bar(f, chunks[idx], app, &c);
        idx += 1;
    }
    body(f, chunks[idx], app, &c);
    idx += 1;
    if show_debug {
        debug_panel(f, chunks[idx], app, &c);
        idx += 1;
    }
    footer(f, chunks[idx], app, &c);

    // Overlays render last
    match app.input_mode() {
        InputMode::NewTxn => draw_new_txn_overlay(f, app, &c),
        InputMode::Goto => draw_goto_overlay(f, app, &c),
        _ => {}
    }
    if app.toast_message().is_some() {
        draw_toast_modal(f, app, &c);
    }
}

// ===============================
// Header / Stats / Filter
// ===============================
fn header(f: &mut Frame, area: Rect, app: &App, c: &ColorScheme) {
    let conn = app.connection();
    let dot = match conn {
        ConnectionState::Connected => "●",
        ConnectionState::Connecting => "◌",
        ConnectionState::Disconnected => "○",
    };
    let mut spans = vec![
        Span::styled(" ArgusX ", Style::default().fg(c.accent).add_modifier(Modifier::BOLD)),
        Span::raw("│ "),
        Span::styled(
            format!("{dot} {}", conn.label()),
            Style::default().fg(c.connection(conn)).add_modifier(Modifier::BOLD),
        ),
        Span::raw(" │ stream "),
        if app.streaming() {
            Span::styled("on", Style::default().fg(c.safe))
        } else {
            Span::styled("paused", Style::default().fg(c.caution))
        },
        Span::raw(" │ "),
        Span::styled(app.path(), Style::default().fg(c.focus_border)),
    ];
    if let Some(id) = app.pending_lookup() {
        spans.push(Span::styled(format!("  (looking up {id}…)"), Style::default().fg(c.text_dim)));
    }
    let nav = format!(
        "  {}{}",
        if app.can_go_back() { "◀" } else { " " },
        if app.can_go_forward() { "▶" } else { " " }
    );
    spans.push(Span::styled(nav, Style::default().fg(c.text_dim)));
    f.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn stats_bar(f: &mut Frame, area: Rect, app: &App, c: &ColorScheme) {
    let line = match app.stats() {
        Some(s) => {
            let mut spans = vec![
                Span::raw(format!(" total {} ", s.total)),
                Span::styled(format!("│ blocked {} ", s.blocked), Style::default().fg(c.danger)),
                Span::styled(format!("│ otp {} ", s.otp), Style::default().fg(c.caution)),
                Span::styled(format!("│ allowed {} ", s.allowed), Style::default().fg(c.safe)),
                Span::raw(format!("│ fraud rate {:.1}% ", s.fraud_rate)),
                Span::raw(format!("│ avg risk {:.1}", s.avg_risk)),
            ];
            if let Some(at) = app.stats_at() {
                spans.push(Span::styled(
                    format!("  @{}", at.format("%H:%M:%S")),
                    Style::default().fg(c.text_dim),
                ));
            }
            Line::from(spans)
        }
        None => Line::from(Span::styled(" stats: waiting for backend…", Style::default().fg(c.text_dim))),
    };
    f.render_widget(Paragraph::new(line).style(Style::default().fg(c.text)), area);
}

fn filter_bar(f: &mut Frame, area: Rect, app: &App, c: &ColorScheme) {
    let focused = app.input_mode() == InputMode::Filter;
    let filter_text = app.filter_query();
    let border_color = if focused { c.focus_border } else { c.unfocused_border };

    let title = if app.criteria().is_empty() {
        " Filter ".to_string()
    } else {
        format!(" Filter: {} ", app.criteria().to_query())
    };
    let paragraph = Paragraph::new(filter_text)
        .style(Style::default().fg(if focused { c.focus_border } else { c.text }))
        .block(
            Block::default()
                .title(title)
                .borders(Borders::ALL)
                .border_type(BorderType::Rounded)
                .border_style(Style::default().fg(border_color)),
        );
    f.render_widget(paragraph, area);

    if focused && area.width > 2 {
        let x = area.x + 1 + (filter_text.len().min(area.width.saturating_sub(2) as usize) as u16);
        f.set_cursor_position((x, area.y + 1));
    }
}

// ===============================
// Body
// ===============================
fn body(f: &mut Frame, area: Rect, app: &App, c: &ColorScheme) {
    if area.width < MIN_WIDTH || area.height < MIN_HEIGHT.saturating_sub(6) {
        let warning = Paragraph::new(format!(
            "Terminal too small!\n\nMinimum size: {MIN_WIDTH}×{MIN_HEIGHT}\nCurrent size: {}×{}",
            area.width, area.height
        ))
        .alignment(Alignment::Center)
        .style(Style::default().fg(c.danger).add_modifier(Modifier::BOLD));
        f.render_widget(warning, area);
        return;
    }

    // Alert banner sits above everything else when the selection needs attention
    let rest = match (app.alert(), app.selected()) {
        (Some(flow), Some(txn)) => {
            let rows = Layout::vertical([Constraint::Length(5), Constraint::Min(0)]).split(area);
            alert_banner(f, rows[0], app, flow, txn, c);
            rows[1]
        }
        _ => area,
    };

    let is_narrow = rest.width < NARROW_THRESHOLD;
    let panes = if is_narrow {
        Layout::vertical([Constraint::Percentage(45), Constraint::Percentage(55)]).split(rest)
    } else {
        Layout::horizontal([Constraint::Percentage(55), Constraint::Percentage(45)]).split(rest)
    };
    feed_table(f, panes[0], app, c);
    detail_pane(f, panes[1], app, c);
}

fn feed_table(f: &mut Frame, area: Rect, app: &App, c: &ColorScheme) {
    let visible = app.visible();
    let selected_id = app.selected().map(|t| t.id.as_str());
    let live_id = app.live_id();

    let rows: Vec<Row> = visible
        .iter()
        .map(|t| {
            let marker = if Some(t.id.as_str()) == selected_id {
                "▶"
            } else if Some(t.id.as_str()) == live_id {
                "•"
            } else {
                " "
            };
            Row::new(vec![
                Cell::from(marker),
                Cell::from(truncate(&t.id, 14)),
                Cell::from(format!("₹{:.2}", t.amount)),
                Cell::from(truncate(&t.city, 12)),
                Cell::from(truncate(&t.payment_type, 11)),
                Cell::from(Span::styled(t.risk_score.to_string(), Style::default().fg(c.score(t.risk_score)))),
                Cell::from(Span::styled(t.action.as_str(), Style::default().fg(c.action(t.action)))),
                Cell::from(if t.is_anomaly { "⚠" } else { "" }),
            ])
        })
        .collect();

    let widths = [
        Constraint::Length(1),
        Constraint::Length(14),
        Constraint::Length(12),
        Constraint::Length(12),
        Constraint::Length(11),
        Constraint::Length(5),
        Constraint::Length(6),
        Constraint::Length(1),
    ];
    let header = Row::new(vec!["", "ID", "Amount", "City", "Payment", "Risk", "Action", ""])
        .style(Style::default().fg(c.text_dim).add_modifier(Modifier::BOLD));

    let title = format!(" Live feed ({}/{}) ", visible.len(), app.store().len());
    let table = Table::new(rows, widths)
        .header(header)
        .row_highlight_style(Style::default().bg(c.selection_bg).fg(c.selection_fg))
        .block(
            Block::default()
                .title(title)
                .borders(Borders::ALL)
                .border_type(BorderType::Rounded)
                .border_style(Style::default().fg(c.focus_border)),
        );

    let mut st = TableState::default();
    if !visible.is_empty() {
        st.select(Some(app.cursor().min(visible.len() - 1)));
    }
    f.render_stateful_widget(table, area, &mut st);
}

fn detail_pane(f: &mut Frame, area: Rect, app: &App, c: &ColorScheme) {
    let block = Block::default()
        .title(" Details ")
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(c.unfocused_border));

    let Some(txn) = app.selected() else {
        let hint = if app.pending_lookup().is_some() {
            "Looking up transaction…"
        } else {
            "No transaction selected.\n\nEnter opens the highlighted row.\nNew events take focus automatically."
        };
        f.render_widget(
            Paragraph::new(hint).style(Style::default().fg(c.text_dim)).block(block),
            area,
        );
        return;
    };

    let inner = block.inner(area);
    f.render_widget(block, area);
    let rows = Layout::vertical([
        Constraint::Length(3),
        Constraint::Length(5),
        Constraint::Min(0),
        Constraint::Length(1),
    ])
    .split(inner);

    risk_gauge(f, rows[0], txn, c);
    quick_facts(f, rows[1], txn, c);
    explanation(f, rows[2], txn, c);

    let status = if app.override_pending() {
        Span::styled("Applying…", Style::default().fg(c.text_dim))
    } else if let Some(msg) = app.override_message() {
        Span::styled(msg.to_string(), Style::default().fg(c.accent).add_modifier(Modifier::BOLD))
    } else {
        Span::styled("A approve · X block · R request OTP", Style::default().fg(c.text_dim))
    };
    f.render_widget(Paragraph::new(Line::from(status)), rows[3]);
}

fn risk_gauge(f: &mut Frame, area: Rect, txn: &Transaction, c: &ColorScheme) {
    let color = c.score(txn.risk_score);
    let gauge = Gauge::default()
        .block(Block::default().borders(Borders::BOTTOM).border_style(Style::default().fg(c.unfocused_border)))
        .gauge_style(Style::default().fg(color))
        .percent(u16::from(txn.risk_score.min(100)))
        .label(Span::styled(
            format!("risk {} / 100 · {}", txn.risk_score, txn.risk_level),
            Style::default().fg(c.text).add_modifier(Modifier::BOLD),
        ));
    f.render_widget(gauge, area);
}

fn quick_facts(f: &mut Frame, area: Rect, txn: &Transaction, c: &ColorScheme) {
    let dim = Style::default().fg(c.text_dim);
    let mut lines = vec![
        Line::from(vec![
            Span::styled("id ", dim),
            Span::raw(txn.id.clone()),
            Span::styled("  action ", dim),
            Span::styled(txn.action.as_str(), Style::default().fg(c.action(txn.action)).add_modifier(Modifier::BOLD)),
        ]),
        Line::from(vec![
            Span::styled("amount ", dim),
            Span::raw(format!("₹{:.2}", txn.amount)),
            Span::styled("  city ", dim),
            Span::raw(txn.city.clone()),
        ]),
        Line::from(vec![
            Span::styled("payment ", dim),
            Span::raw(txn.payment_type.clone()),
            Span::styled("  device ", dim),
            Span::raw(txn.device_type.clone()),
        ]),
        Line::from(vec![
            Span::styled("fraud prob ", dim),
            Span::raw(format!("{:.1}%", txn.fraud_probability)),
            Span::styled("  anomaly ", dim),
            if txn.is_anomaly {
                Span::styled("yes", Style::default().fg(c.danger))
            } else {
                Span::raw("no")
            },
        ]),
    ];
    let extras: Vec<String> = ["timestamp", "user_id", "merchant_category"]
        .iter()
        .filter_map(|k| txn.extra_str(k).map(|v| format!("{k}={v}")))
        .collect();
    if !extras.is_empty() {
        lines.push(Line::from(Span::styled(extras.join("  "), dim)));
    }
    f.render_widget(Paragraph::new(lines).style(Style::default().fg(c.text)), area);
}

fn explanation(f: &mut Frame, area: Rect, txn: &Transaction, c: &ColorScheme) {
    let block = Block::default()
        .title(" Why this score ")
        .borders(Borders::TOP)
        .border_style(Style::default().fg(c.unfocused_border));
    if txn.explanation.is_empty() {
        f.render_widget(
            Paragraph::new("No explanation available").style(Style::default().fg(c.text_dim)).block(block),
            area,
        );
        return;
    }

    let max = txn
        .explanation
        .iter()
        .map(|e| e.contribution.abs())
        .fold(0.0_f64, f64::max)
        .max(f64::EPSILON);
    let bar_room = area.width.saturating_sub(34).max(4) as f64;

    let lines: Vec<Line> = txn
        .explanation
        .iter()
        .map(|e| {
            let (arrow, color) = if e.increases_risk() { ("▲", c.danger) } else { ("▼", c.safe) };
            let bar = "█".repeat(((e.contribution.abs() / max) * bar_room).round().max(1.0) as usize);
            Line::from(vec![
                Span::styled(format!("{arrow} "), Style::default().fg(color)),
                Span::raw(format!("{:<20} ", truncate(e.display_name(), 20))),
                Span::styled(format!("{:+.3} ", e.contribution), Style::default().fg(color)),
                Span::styled(bar, Style::default().fg(color)),
                Span::styled(format!(" {:?}", e.impact), Style::default().fg(c.text_dim)),
            ])
        })
        .collect();
    f.render_widget(Paragraph::new(lines).block(block).wrap(Wrap { trim: true }), area);
}

fn alert_banner(f: &mut Frame, area: Rect, app: &App, flow: &VerifyFlow, txn: &Transaction, c: &ColorScheme) {
    let color = match (flow.kind(), flow.state()) {
        (_, VerifyState::Verified) => c.safe,
        (VerifyKind::Block, _) | (_, VerifyState::Rejected) => c.danger,
        _ => c.caution,
    };
    let title = match flow.kind() {
        VerifyKind::Otp => format!(" Step-up verification · {} ", txn.id),
        VerifyKind::Block => format!(" Blocked · {} ", txn.id),
    };

    let mut lines = Vec::new();
    let reason = txn
        .top_signal()
        .map(|s| format!("Top signal: {} ({:+.2})", s.display_name(), s.contribution))
        .unwrap_or_else(|| "High risk transaction".to_string());
    lines.push(Line::from(vec![
        Span::styled(format!("₹{:.2} in {} · score {} ", txn.amount, txn.city, txn.risk_score), Style::default().fg(c.text)),
        Span::styled(reason, Style::default().fg(c.text_dim)),
    ]));

    let state_line = match (flow.kind(), flow.state()) {
        (VerifyKind::Otp, VerifyState::AwaitingInput) => {
            let typing = app.input_mode() == InputMode::Otp;
            let boxes: String = (0..crate::constants::verify::OTP_LEN)
                .map(|i| flow.code().chars().nth(i).unwrap_or('_'))
                .map(|ch| format!("{ch} "))
                .collect();
            Line::from(vec![
                Span::raw("Code: "),
                Span::styled(
                    boxes,
                    Style::default()
                        .fg(if typing { c.focus_border } else { c.text })
                        .add_modifier(Modifier::BOLD),
                ),
                Span::styled(
                    if typing { " Enter submit · Esc cancel" } else { " v enter code · b block · d dismiss" },
                    Style::default().fg(c.text_dim),
                ),
            ])
        }
        (VerifyKind::Block, VerifyState::AwaitingInput) => Line::from(Span::styled(
            "b acknowledge block · d dismiss",
            Style::default().fg(c.text_dim),
        )),
        (_, VerifyState::Verifying) => Line::from(Span::styled("Verifying…", Style::default().fg(c.caution))),
        (_, VerifyState::Verified) => Line::from(Span::styled("Verified", Style::default().fg(c.safe))),
        (_, VerifyState::Rejected) => Line::from(Span::styled(
            "Rejected · d dismiss",
            Style::default().fg(c.danger).add_modifier(Modifier::BOLD),
        )),
    };
    lines.push(state_line);
    if let Some(msg) = flow.message() {
        lines.push(Line::from(Span::styled(msg.to_string(), Style::default().fg(color))));
    }

    let widget = Paragraph::new(lines).block(
        Block::default()
            .title(Span::styled(title, Style::default().fg(color).add_modifier(Modifier::BOLD)))
            .borders(Borders::ALL)
            .border_type(BorderType::Thick)
            .border_style(Style::default().fg(color)),
    );
    f.render_widget(widget, area);
}

// ===============================
// Footer / Debug
// ===============================
fn footer(f: &mut Frame, area: Rect, app: &App, c: &ColorScheme) {
    let key = |k: &'static str| Span::styled(k, Style::default().fg(c.focus_border));
    let spans = vec![
        key("↑/↓"), Span::raw(" move │ "),
        key("Enter"), Span::raw(" open │ "),
        key("Esc"), Span::raw(" close │ "),
        key("/"), Span::raw(" filter │ "),
        key("["), Span::raw("/"), key("]"), Span::raw(" back/fwd │ "),
        key(":"), Span::raw(" goto │ "),
        key("n"), Span::raw(" new │ "),
        key("s"), Span::raw(" stream │ "),
        key("m"), Span::raw(" simulate │ "),
        key("i"), Span::raw(" fraud │ "),
        key("q"), Span::raw(" quit"),
    ];
    let mut status = vec![Span::styled(
        format!("theme {}", app.theme()),
        Style::default().fg(c.text_dim),
    )];
    if app.debug_visible() {
        status.push(Span::raw(" │ "));
        status.push(Span::styled("[DEBUG]", Style::default().fg(c.accent)));
    }
    let w = Paragraph::new(vec![Line::from(spans), Line::from(status)])
        .block(Block::default().borders(Borders::NONE));
    f.render_widget(w, area);
}

fn debug_panel(f: &mut Frame, area: Rect, app: &App, c: &ColorScheme) {
    let log = app.debug_log();
    let lines_to_show = area.height.saturating_sub(2) as usize;
    let start = log.len().saturating_sub(lines_to_show);
    let lines: Vec<Line> = log[start..].iter().map(|msg| Line::from(msg.as_str())).collect();

    let paragraph = Paragraph::new(lines).style(Style::default().fg(c.text_dim)).block(
        Block::default()
            .title(" Debug ")
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(Style::default().fg(c.text_dim)),
    );
    f.render_widget(paragraph, area);
}

// ===============================
// Overlays
// ===============================
fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    }
}

fn draw_new_txn_overlay(f: &mut Frame, app: &App, c: &ColorScheme) {
    let Some(form) = app.new_txn_form() else {
        return;
    };
    let overlay = centered(f.area(), 52, 11);
    f.render_widget(Clear, overlay);

    let field = |label: &str, value: String, which: FormField| {
        let focused = form.focus == which;
        let style = if focused {
            Style::default().fg(c.focus_border).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(c.text)
        };
        let value = if which == FormField::Amount { value } else { format!("‹ {value} ›") };
        Line::from(vec![
            Span::styled(format!("{:<10}", label), Style::default().fg(c.text_dim)),
            Span::styled(value, style),
        ])
    };
    let mut lines = vec![
        field("Amount", format!("₹{}", form.amount), FormField::Amount),
        field("Payment", form.payment_type().to_string(), FormField::Payment),
        field("City", form.city().unwrap_or("(none seen yet)").to_string(), FormField::City),
        field("Device", form.device_type().to_string(), FormField::Device),
        Line::from(""),
    ];
    if let Some(err) = form.error() {
        lines.push(Line::from(Span::styled(err.to_string(), Style::default().fg(c.danger))));
    } else if form.is_submitting() {
        lines.push(Line::from(Span::styled("Submitting…", Style::default().fg(c.text_dim))));
    } else {
        lines.push(Line::from(""));
    }
    lines.push(Line::from(Span::styled(
        "Tab field · ←/→ choose · Enter submit · Esc cancel",
        Style::default().fg(c.text_dim),
    )));

    let widget = Paragraph::new(lines).block(
        Block::default()
            .title(" New transaction ")
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(Style::default().fg(c.focus_border)),
    );
    f.render_widget(widget, overlay);
}

fn draw_goto_overlay(f: &mut Frame, app: &App, c: &ColorScheme) {
    let overlay = centered(f.area(), 50, 3);
    f.render_widget(Clear, overlay);
    let widget = Paragraph::new(app.goto_input()).style(Style::default().fg(c.focus_border)).block(
        Block::default()
            .title(" Go to path (/item/<id>) ")
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(Style::default().fg(c.focus_border)),
    );
    f.render_widget(widget, overlay);
    let x = overlay.x + 1 + (app.goto_input().len().min(overlay.width.saturating_sub(2) as usize) as u16);
    f.set_cursor_position((x, overlay.y + 1));
}

fn draw_toast_modal(f: &mut Frame, app: &App, c: &ColorScheme) {
    let message = app.toast_message().unwrap_or("");
    let area = f.area();
    let width = (message.chars().count() as u16 + 6).max(area.width * 3 / 10);
    let overlay = centered(area, width, 3);
    f.render_widget(Clear, overlay);
    let text = Paragraph::new(format!("✓ {message}"))
        .alignment(Alignment::Center)
        .style(Style::default().fg(c.safe).add_modifier(Modifier::BOLD))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_type(BorderType::Rounded)
                .border_style(Style::default().fg(c.safe)),
        );
    f.render_widget(text, overlay);
}

// ===============================
// Helpers
// ===============================
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        return s.to_string();
    }
    let keep: String = s.chars().take(max_len.saturating_sub(1)).collect();
    format!("{keep}…")
}
