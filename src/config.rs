use crate::constants::{api, transport};
use crate::router::{self, Route};
use crate::theme::Theme;
use anyhow::{anyhow, Result};
use clap::Parser;

/// ArgusX - live risk-scoring dashboard
///
/// Terminal client for the transaction risk-scoring backend: live feed, filtering,
/// explanations and step-up verification.
/// Configuration priority: CLI args > Environment variables (.env honoured) > Defaults
#[derive(Parser, Debug, Default)]
#[command(name = "argusx")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Live transaction risk dashboard", long_about = None)]
pub struct CliArgs {
    /// Start location, e.g. /item/TXN123 or argusx://item/TXN123
    pub route: Option<String>,

    /// Backend REST base URL
    #[arg(long, env = "API_URL")]
    pub api_url: Option<String>,

    /// Backend event stream URL
    #[arg(long, env = "WS_URL")]
    pub ws_url: Option<String>,

    /// Keepalive ping interval in milliseconds (1000-120000)
    #[arg(long, env = "KEEPALIVE_MS")]
    pub keepalive_ms: Option<u64>,

    /// Delay before reconnecting a dropped stream in milliseconds (100-60000)
    #[arg(long, env = "RECONNECT_MS")]
    pub reconnect_ms: Option<u64>,

    /// Stats polling interval in milliseconds (500-60000)
    #[arg(long, env = "STATS_POLL_MS")]
    pub stats_poll_ms: Option<u64>,

    /// HTTP request timeout in milliseconds (1000-60000)
    #[arg(long, env = "HTTP_TIMEOUT_MS")]
    pub http_timeout_ms: Option<u64>,

    /// Retry attempts for failed reads (0-10); mutations are never retried
    #[arg(long, env = "HTTP_RETRIES")]
    pub http_retries: Option<u32>,

    /// Backend event cadence in seconds when starting the stream (0.5-60)
    #[arg(long, env = "STREAM_INTERVAL")]
    pub stream_interval: Option<f64>,

    /// How many recent transactions to search when resolving /item/{id} (1-1000)
    #[arg(long, env = "LOOKUP_LIMIT")]
    pub lookup_limit: Option<usize>,

    /// Target UI rendering FPS (1-120)
    #[arg(long, env = "RENDER_FPS")]
    pub render_fps: Option<u32>,

    /// Colour theme: nord, contrast, amber
    #[arg(long, env = "THEME")]
    pub theme: Option<String>,

    /// Filter query applied on startup (e.g. "risk:HIGH city:Mumbai")
    #[arg(long, env = "DEFAULT_FILTER")]
    pub default_filter: Option<String>,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub api_url: String,
    pub ws_url: String,
    pub keepalive_ms: u64,
    pub reconnect_ms: u64,
    pub stats_poll_ms: u64,
    pub http_timeout_ms: u64,
    pub http_retries: u32,
    pub stream_interval: f64,
    pub lookup_limit: usize,
    pub render_fps: u32,
    pub theme: Theme,
    pub default_filter: String,
    pub start_route: Route,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:8000".to_string(),
            ws_url: "ws://localhost:8000/ws/stream".to_string(),
            keepalive_ms: transport::KEEPALIVE_MS,
            reconnect_ms: transport::RECONNECT_MS,
            stats_poll_ms: api::STATS_POLL_MS,
            http_timeout_ms: 8000,
            http_retries: 2,
            stream_interval: api::STREAM_INTERVAL_SECS,
            lookup_limit: api::LOOKUP_LIMIT,
            render_fps: 30,
            theme: Theme::default(),
            default_filter: String::new(),
            start_route: Route::Feed,
        }
    }
}

/// Validate that a value is within a given range (inclusive)
fn validate_in_range<T>(val: T, min: T, max: T, name: &str) -> Result<T>
where
    T: PartialOrd + std::fmt::Display + Copy,
{
    if val < min || val > max {
        Err(anyhow!("{name} must be in range [{min}, {max}], got {val}"))
    } else {
        Ok(val)
    }
}

/// Validate URL format (basic scheme check)
fn validate_url(url: &str, name: &str, schemes: &[&str]) -> Result<()> {
    if url.is_empty() {
        return Err(anyhow!("{name} cannot be empty"));
    }
    if schemes.iter().any(|s| url.starts_with(&format!("{s}://"))) {
        Ok(())
    } else {
        let expected = schemes
            .iter()
            .map(|s| format!("{s}://"))
            .collect::<Vec<_>>()
            .join(" or ");
        Err(anyhow!("{name} must start with {expected}"))
    }
}

/// Load configuration from CLI args and environment variables
pub fn load() -> Result<Config> {
    from_args(CliArgs::parse())
}

/// Validate parsed arguments into a [`Config`]. clap has already folded environment
/// variables into `args`, so this only applies defaults and range checks.
pub fn from_args(args: CliArgs) -> Result<Config> {
    let d = Config::default();

    let api_url = args.api_url.unwrap_or(d.api_url);
    validate_url(&api_url, "API_URL", &["http", "https"])?;
    let ws_url = args.ws_url.unwrap_or(d.ws_url);
    validate_url(&ws_url, "WS_URL", &["ws", "wss"])?;

    let keepalive_ms = validate_in_range(
        args.keepalive_ms.unwrap_or(d.keepalive_ms),
        1000,
        120_000,
        "KEEPALIVE_MS",
    )?;
    let reconnect_ms = validate_in_range(
        args.reconnect_ms.unwrap_or(d.reconnect_ms),
        100,
        60_000,
        "RECONNECT_MS",
    )?;
    let stats_poll_ms = validate_in_range(
        args.stats_poll_ms.unwrap_or(d.stats_poll_ms),
        500,
        60_000,
        "STATS_POLL_MS",
    )?;
    let http_timeout_ms = validate_in_range(
        args.http_timeout_ms.unwrap_or(d.http_timeout_ms),
        1000,
        60_000,
        "HTTP_TIMEOUT_MS",
    )?;
    let http_retries =
        validate_in_range(args.http_retries.unwrap_or(d.http_retries), 0, 10, "HTTP_RETRIES")?;
    let stream_interval = validate_in_range(
        args.stream_interval.unwrap_or(d.stream_interval),
        0.5,
        60.0,
        "STREAM_INTERVAL",
    )?;
    let lookup_limit =
        validate_in_range(args.lookup_limit.unwrap_or(d.lookup_limit), 1, 1000, "LOOKUP_LIMIT")?;
    let render_fps =
        validate_in_range(args.render_fps.unwrap_or(d.render_fps), 1, 120, "RENDER_FPS")?;

    let theme = match args.theme {
        Some(t) => t.parse::<Theme>().map_err(|e| anyhow!("THEME: {e}"))?,
        None => d.theme,
    };

    let start_route = match args.route.as_deref() {
        Some(raw) => router::parse(raw).ok_or_else(|| anyhow!("Unknown start route '{raw}'"))?,
        None => Route::Feed,
    };

    Ok(Config {
        api_url: api_url.trim_end_matches('/').to_string(),
        ws_url,
        keepalive_ms,
        reconnect_ms,
        stats_poll_ms,
        http_timeout_ms,
        http_retries,
        stream_interval,
        lookup_limit,
        render_fps,
        theme,
        default_filter: args.default_filter.unwrap_or_default(),
        start_route,
    })
}

impl Config {
    /// One-line summary for the log file
    pub fn summary(&self) -> String {
        format!(
            "api={} ws={} keepalive={}ms reconnect={}ms stats={}ms timeout={}ms retries={} fps={} theme={}",
            self.api_url,
            self.ws_url,
            self.keepalive_ms,
            self.reconnect_ms,
            self.stats_poll_ms,
            self.http_timeout_ms,
            self.http_retries,
            self.render_fps,
            self.theme
        )
    }
}
