//! Error types for config loading and overlay resolution.

use crate::TenantKey;
use std::path::PathBuf;
use thiserror::Error;

/// Errors returned while loading the base configuration or resolver settings.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Reading a config file failed.
    #[error("failed to read config {}: {source}", .path.display())]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// A config file is not valid UTF-8.
    #[error("config {} is not valid utf-8: {source}", .path.display())]
    DecodeFailed {
        path: PathBuf,
        #[source]
        source: std::string::FromUtf8Error,
    },
    /// The base env file violates the env grammar.
    #[error("failed to parse config: {0}")]
    ParseFailed(#[from] ParseError),
    /// Parsing a json5 settings file failed.
    #[error("failed to parse settings: {0}")]
    SettingsParseFailed(#[from] json5::Error),
    /// Generic validation failure.
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// A line in an env source that does not match the `KEY=VALUE` grammar.
///
/// `line` is 1-based; `origin` names the source the line came from.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// The line has no `=` separator.
    #[error("{origin}:{line}: expected KEY=VALUE, found `{content}`")]
    MissingSeparator {
        origin: String,
        line: usize,
        content: String,
    },
    /// The line has nothing before the `=`.
    #[error("{origin}:{line}: empty key")]
    EmptyKey { origin: String, line: usize },
    /// The key contains whitespace.
    #[error("{origin}:{line}: invalid key `{key}`")]
    InvalidKey {
        origin: String,
        line: usize,
        key: String,
    },
}

impl ParseError {
    /// 1-based number of the offending line.
    pub fn line(&self) -> usize {
        match self {
            Self::MissingSeparator { line, .. }
            | Self::EmptyKey { line, .. }
            | Self::InvalidKey { line, .. } => *line,
        }
    }

    /// Name of the source containing the offending line.
    pub fn origin(&self) -> &str {
        match self {
            Self::MissingSeparator { origin, .. }
            | Self::EmptyKey { origin, .. }
            | Self::InvalidKey { origin, .. } => origin,
        }
    }
}

/// Errors returned when a tenant's overlay exists but cannot be applied.
///
/// A missing overlay is never an error. Both variants are recoverable; the
/// caller decides whether to reject the request or fall back to the base.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// The overlay source exists but could not be read.
    #[error("overlay for tenant `{tenant}` is unreadable: {source}")]
    OverlaySourceUnreadable {
        tenant: TenantKey,
        #[source]
        source: std::io::Error,
    },
    /// The overlay source was read but violates the env grammar.
    #[error("overlay for tenant `{tenant}` is malformed: {source}")]
    OverlayParseError {
        tenant: TenantKey,
        #[source]
        source: ParseError,
    },
}

impl ResolveError {
    /// Tenant whose overlay failed.
    pub fn tenant(&self) -> &TenantKey {
        match self {
            Self::OverlaySourceUnreadable { tenant, .. } | Self::OverlayParseError { tenant, .. } => {
                tenant
            }
        }
    }

    /// Stable, value-free label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::OverlaySourceUnreadable { .. } => "overlay_source_unreadable",
            Self::OverlayParseError { .. } => "overlay_parse_error",
        }
    }

    /// Description safe to log: names the failing location but never
    /// repeats overlay contents.
    pub fn redacted(&self) -> String {
        match self {
            Self::OverlaySourceUnreadable { source, .. } => source.to_string(),
            Self::OverlayParseError { source, .. } => {
                format!("{}:{}", source.origin(), source.line())
            }
        }
    }
}
