//! Request path decomposition.

use std::fmt;
use std::str::FromStr;

/// `/product/environment/key`, with the environment not yet validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestPath {
    pub product: String,
    pub environment: String,
    pub key: String,
}

impl RequestPath {
    /// Split a path into exactly three non-empty segments.
    pub fn parse(path: &str) -> Option<Self> {
        let rest = path.strip_prefix('/')?;
        let mut segments = rest.split('/');

        let product = segments.next().filter(|s| !s.is_empty())?;
        let environment = segments.next().filter(|s| !s.is_empty())?;
        let key = segments.next().filter(|s| !s.is_empty())?;
        if segments.next().is_some() {
            return None;
        }

        Some(Self {
            product: product.to_string(),
            environment: environment.to_string(),
            key: key.to_string(),
        })
    }
}

/// Environments a value may be requested for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

impl Environment {
    pub fn as_str(self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Staging => "staging",
            Environment::Production => "production",
        }
    }
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "development" => Ok(Environment::Development),
            "staging" => Ok(Environment::Staging),
            "production" => Ok(Environment::Production),
            other => Err(other.to_string()),
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
