//! Locale negotiation
//!
//! Storefront content is translated per locale. A request picks its locale
//! from `?locale=`, then `Accept-Language`, then the store default. Reads fall
//! back to the default locale's translation when the requested one is missing.

use std::fmt;
use std::str::FromStr;

use axum::extract::{FromRequestParts, Query};
use axum::http::{header, request::Parts};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::state::AppState;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    #[default]
    En,
    Ar,
}

impl Locale {
    pub const ALL: [Locale; 2] = [Locale::En, Locale::Ar];

    pub fn code(&self) -> &'static str {
        match self { Self::En => "en", Self::Ar => "ar" }
    }

    pub fn is_rtl(&self) -> bool { matches!(self, Self::Ar) }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.code()) }
}

impl FromStr for Locale {
    type Err = AppError;

    /// Accepts bare codes and regional tags (`ar-EG`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let primary = s.trim().split(['-', '_']).next().unwrap_or_default().to_ascii_lowercase();
        match primary.as_str() {
            "en" => Ok(Self::En),
            "ar" => Ok(Self::Ar),
            _ => Err(AppError::Validation(format!("Unsupported locale: {s}"))),
        }
    }
}

/// Picks the locale for a request.
pub fn negotiate(query: Option<&str>, accept_language: Option<&str>, default: Locale) -> Locale {
    if let Some(locale) = query.and_then(|q| q.parse().ok()) {
        return locale;
    }
    accept_language.and_then(best_from_header).unwrap_or(default)
}

/// Highest-weighted supported tag in an `Accept-Language` value. Ties keep
/// header order; `q=0` means "not acceptable".
fn best_from_header(header: &str) -> Option<Locale> {
    let mut best: Option<(Locale, f32)> = None;
    for part in header.split(',') {
        let mut pieces = part.split(';');
        let tag = pieces.next().unwrap_or_default().trim();
        let weight = pieces
            .find_map(|p| p.trim().strip_prefix("q="))
            .and_then(|q| q.parse::<f32>().ok())
            .unwrap_or(1.0);
        if weight <= 0.0 { continue; }
        let Ok(locale) = tag.parse::<Locale>() else { continue };
        if best.map_or(true, |(_, w)| weight > w) {
            best = Some((locale, weight));
        }
    }
    best.map(|(l, _)| l)
}

#[derive(Debug, Deserialize)]
struct LocaleQuery { locale: Option<String> }

/// Locale resolved for the current request.
#[derive(Clone, Copy, Debug)]
pub struct RequestLocale(pub Locale);

#[axum::async_trait]
impl FromRequestParts<AppState> for RequestLocale {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let query = Query::<LocaleQuery>::try_from_uri(&parts.uri).ok().and_then(|q| q.0.locale);
        let accept = parts.headers.get(header::ACCEPT_LANGUAGE).and_then(|v| v.to_str().ok());
        Ok(Self(negotiate(query.as_deref(), accept, state.config.default_locale)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_wins() {
        assert_eq!(negotiate(Some("ar"), Some("en-US"), Locale::En), Locale::Ar);
    }

    #[test]
    fn test_unsupported_query_falls_through() {
        assert_eq!(negotiate(Some("fr"), Some("ar-EG,en;q=0.5"), Locale::En), Locale::Ar);
    }

    #[test]
    fn test_accept_language_weights() {
        assert_eq!(negotiate(None, Some("fr-FR, en;q=0.4, ar;q=0.8"), Locale::En), Locale::Ar);
        assert_eq!(negotiate(None, Some("ar;q=0, en;q=0.1"), Locale::Ar), Locale::En);
    }

    #[test]
    fn test_default_when_nothing_matches() {
        assert_eq!(negotiate(None, Some("de, fr;q=0.9"), Locale::Ar), Locale::Ar);
        assert_eq!(negotiate(None, None, Locale::En), Locale::En);
    }

    #[test]
    fn test_parse_regional_tags() {
        assert_eq!("ar_EG".parse::<Locale>().unwrap(), Locale::Ar);
        assert!(Locale::Ar.is_rtl());
        assert!("".parse::<Locale>().is_err());
    }
}
