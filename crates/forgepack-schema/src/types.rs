//! Newtype wrappers and small option enums shared by the schema layer.
//!
//! All newtypes serialize/deserialize as plain strings.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Deref;

macro_rules! string_newtype {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a new instance from a string.
            pub fn new(s: impl Into<String>) -> Self {
                Self(s.into())
            }

            /// Return the inner string as a slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume self and return the inner `String`.
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl Deref for $name {
            type Target = str;
            fn deref(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl PartialEq<str> for $name {
            fn eq(&self, other: &str) -> bool {
                self.0 == other
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }
    };
}

string_newtype!(
    /// Full 64-character hex digest of a normalized configuration.
    ConfigHash
);

string_newtype!(
    /// Truncated 12-character prefix of a [`ConfigHash`], used for display.
    ShortHash
);

/// Build mode. Drives most of the full default pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Development,
    Production,
    None,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Development => write!(f, "development"),
            Self::Production => write!(f, "production"),
            Self::None => write!(f, "none"),
        }
    }
}

/// Verbosity of the infrastructure logger, ordered from quietest to loudest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    None,
    Error,
    Warn,
    Info,
    Log,
    Verbose,
}

impl LogLevel {
    /// Whether a message at `message` level passes a logger configured at `self`.
    pub fn allows(self, message: LogLevel) -> bool {
        message != LogLevel::None && message <= self
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::None => "none",
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Log => "log",
            Self::Verbose => "verbose",
        };
        f.write_str(s)
    }
}

/// Source map style. `false` in a configuration maps to [`Devtool::Off`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Devtool {
    Off,
    Source(String),
}

/// Polling behaviour for watch mode: a flag, or an interval in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Poll {
    Enabled(bool),
    Interval(u64),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_hash_display_and_as_ref() {
        let h = ConfigHash::new("abc123");
        assert_eq!(h.to_string(), "abc123");
        assert_eq!(h.as_str(), "abc123");
        assert_eq!(AsRef::<str>::as_ref(&h), "abc123");
    }

    #[test]
    fn config_hash_serializes_as_plain_string() {
        let h = ConfigHash::new("deadbeef");
        assert_eq!(serde_json::to_string(&h).unwrap(), "\"deadbeef\"");
    }

    #[test]
    fn log_level_filtering() {
        assert!(LogLevel::Info.allows(LogLevel::Warn));
        assert!(LogLevel::Info.allows(LogLevel::Info));
        assert!(!LogLevel::Info.allows(LogLevel::Verbose));
        assert!(!LogLevel::None.allows(LogLevel::Error));
        assert!(!LogLevel::Verbose.allows(LogLevel::None));
    }

    #[test]
    fn mode_parses_lowercase() {
        let mode: Mode = serde_json::from_str("\"development\"").unwrap();
        assert_eq!(mode, Mode::Development);
        assert_eq!(mode.to_string(), "development");
    }

    #[test]
    fn poll_accepts_flag_or_interval() {
        let a: Poll = serde_json::from_str("true").unwrap();
        let b: Poll = serde_json::from_str("250").unwrap();
        assert_eq!(a, Poll::Enabled(true));
        assert_eq!(b, Poll::Interval(250));
    }
}
