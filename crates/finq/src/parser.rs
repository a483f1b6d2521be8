//! Turns the model's final free text into an `{method, path}` pair.

use serde::{Deserialize, Serialize};
use std::fmt;
use strum::IntoEnumIterator;
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};

/// Path answered whenever nothing better can be extracted
pub const FALLBACK_PATH: &str = "/v1/assets";

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Default,
    Display,
    EnumString,
    EnumIter,
    AsRefStr,
)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
    Delete,
    Put,
    Patch,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiCall {
    pub method: HttpMethod,
    pub path: String,
}

impl ApiCall {
    pub fn new<S: Into<String>>(method: HttpMethod, path: S) -> Self {
        Self {
            method,
            path: path.into(),
        }
    }

    /// `GET /v1/assets`
    pub fn fallback() -> Self {
        Self::new(HttpMethod::Get, FALLBACK_PATH)
    }

    pub fn is_fallback(&self) -> bool {
        *self == Self::fallback()
    }
}

impl fmt::Display for ApiCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.path)
    }
}

/// Extract the request from a model reply. Total: any input yields a call
/// whose path starts with `/`.
pub fn parse_response(text: &str) -> ApiCall {
    let text = text.trim();

    let (method, rest) = HttpMethod::iter()
        .find_map(|method| {
            let name = method.as_ref();
            text.get(..name.len())
                .filter(|prefix| prefix.eq_ignore_ascii_case(name))
                .map(|_| (method, text[name.len()..].trim()))
        })
        .unwrap_or((HttpMethod::Get, text));

    let path = if rest.starts_with('/') {
        rest.to_string()
    } else {
        rest.split_whitespace()
            .find(|token| token.starts_with('/'))
            .unwrap_or(FALLBACK_PATH)
            .to_string()
    };

    ApiCall { method, path }
}
