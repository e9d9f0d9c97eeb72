//! Validation gate: rejects malformed raw configuration before any engine exists.
//!
//! Every violation found is reported, not just the first.

use crate::config::RawInput;
use crate::schema::{lookup, Field, Kind, ROOT_FIELDS};
use serde_json::Value;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub path: String,
    pub message: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// All schema violations found in a raw configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub violations: Vec<Violation>,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} violation(s)", self.violations.len())?;
        for v in &self.violations {
            write!(f, "\n - {v}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

pub fn validate(input: &RawInput) -> Result<(), ValidationError> {
    let mut violations = Vec::new();
    match input {
        RawInput::Single(cfg) => check_object(cfg.as_value(), ROOT_FIELDS, "configuration", &mut violations),
        RawInput::Multi(cfgs) => {
            if cfgs.is_empty() {
                violations.push(Violation {
                    path: "configuration".to_owned(),
                    message: "expected at least one configuration".to_owned(),
                });
            }
            for (i, cfg) in cfgs.iter().enumerate() {
                let path = format!("configuration[{i}]");
                check_object(cfg.as_value(), ROOT_FIELDS, &path, &mut violations);
            }
        }
    }

    if violations.is_empty() {
        Ok(())
    } else {
        Err(ValidationError { violations })
    }
}

fn check_object(value: &Value, fields: &[Field], path: &str, out: &mut Vec<Violation>) {
    let Some(map) = value.as_object() else {
        out.push(violation(path, "expected an object"));
        return;
    };
    for (key, v) in map {
        let child = format!("{path}.{key}");
        match lookup(fields, key) {
            Some(field) => check_kind(v, field.kind, &child, out),
            None => out.push(violation(&child, "unknown option")),
        }
    }
}

fn check_kind(value: &Value, kind: Kind, path: &str, out: &mut Vec<Violation>) {
    let ok = match kind {
        Kind::Str => value.is_string(),
        Kind::Bool => value.is_boolean(),
        Kind::UInt => value.is_u64(),
        Kind::BoolOrUInt => value.is_boolean() || value.is_u64(),
        Kind::StrOrFalse => value.is_string() || value == &Value::Bool(false),
        Kind::StrOrList => value.is_string() || is_string_list(value),
        Kind::BoolOrStrList => value.is_boolean() || value.is_string() || is_string_list(value),
        Kind::StrList => is_string_list(value),
        Kind::OneOf(allowed) => value.as_str().is_some_and(|s| allowed.contains(&s)),
        Kind::Array => value.is_array(),
        Kind::Object(fields) => {
            check_object(value, fields, path, out);
            return;
        }
    };
    if !ok {
        out.push(violation(path, &expectation(kind)));
    }
}

fn is_string_list(value: &Value) -> bool {
    value
        .as_array()
        .is_some_and(|items| items.iter().all(Value::is_string))
}

fn expectation(kind: Kind) -> String {
    match kind {
        Kind::Str => "expected a string".to_owned(),
        Kind::Bool => "expected a boolean".to_owned(),
        Kind::UInt => "expected a non-negative integer".to_owned(),
        Kind::BoolOrUInt => "expected a boolean or a non-negative integer".to_owned(),
        Kind::StrOrFalse => "expected a string or false".to_owned(),
        Kind::StrOrList => "expected a string or an array of strings".to_owned(),
        Kind::BoolOrStrList => "expected a boolean, a string, or an array of strings".to_owned(),
        Kind::StrList => "expected an array of strings".to_owned(),
        Kind::OneOf(allowed) => format!("expected one of: {}", allowed.join(", ")),
        Kind::Array => "expected an array".to_owned(),
        Kind::Object(_) => "expected an object".to_owned(),
    }
}

fn violation(path: &str, message: &str) -> Violation {
    Violation {
        path: path.to_owned(),
        message: message.to_owned(),
    }
}
