//! Navigation paths for the dashboard
//!
//! Two locations exist: the feed (`/`) and a transaction detail (`/item/{id}`).
//! The parser is forgiving about how a path reaches us:
//!
//! - Plain paths: `/`, `/item/TXN123`
//! - Hash form: `#/item/TXN123`
//! - Deep links: `argusx://item/TXN123` (case-insensitive scheme, any number of slashes)
//! - Legacy detail prefix: `/txn/TXN123`
//! - Query and fragment are stripped, ids are percent-decoded
//!
//! ```rust,ignore
//! use argusx::router::{parse, Route};
//!
//! assert_eq!(parse("/item/TXN1"), Some(Route::Item { id: "TXN1".into() }));
//! ```

use std::fmt;

#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub enum Route {
    /// Live feed: `/`
    #[default]
    Feed,
    /// Detail view: `/item/{id}`
    Item { id: String },
}

impl Route {
    pub fn item(id: impl Into<String>) -> Self {
        Route::Item { id: id.into() }
    }

    pub fn path(&self) -> String {
        match self {
            Route::Feed => "/".to_string(),
            Route::Item { id } => format!("/item/{}", urlencoding::encode(id)),
        }
    }

    pub fn item_id(&self) -> Option<&str> {
        match self {
            Route::Item { id } => Some(id),
            Route::Feed => None,
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

#[inline]
fn strip_query_frag(s: &str) -> &str {
    match s.find(|c: char| c == '?' || c == '#') {
        Some(i) => &s[..i],
        None => s,
    }
}

/// Path after an `argusx:` scheme, if present
#[inline]
fn after_scheme(s: &str) -> Option<&str> {
    let (scheme, rest) = s.split_once(':')?;
    if scheme.eq_ignore_ascii_case("argusx") {
        Some(rest.trim_start_matches('/'))
    } else {
        None
    }
}

/// Parse a navigation target. Returns `None` for unknown locations.
pub fn parse(raw: &str) -> Option<Route> {
    let s = raw.trim();
    if s.is_empty() {
        return Some(Route::Feed);
    }

    let path = if let Some(rest) = after_scheme(s) {
        rest
    } else if let Some(rest) = s.strip_prefix("#/") {
        rest
    } else {
        s.trim_start_matches('/')
    };

    let path = strip_query_frag(path);
    let mut segments = path.split('/').filter(|s| !s.is_empty());

    let page = segments.next().unwrap_or("").to_ascii_lowercase();
    match page.as_str() {
        "" | "home" | "feed" => Some(Route::Feed),
        "item" | "txn" => {
            let raw_id = segments.next()?;
            let id = urlencoding::decode(raw_id).ok()?.into_owned();
            if id.trim().is_empty() {
                None
            } else {
                Some(Route::Item { id })
            }
        }
        _ => None,
    }
}
