//! Declarative table of recognized configuration options.
//!
//! Both the validation gate and the normalizer walk this table: the former to
//! type-check raw values, the latter to collapse alias spellings onto the
//! canonical option name.

/// Expected shape of an option value.
#[derive(Debug, Clone, Copy)]
pub enum Kind {
    Str,
    Bool,
    UInt,
    /// `true`/`false` or a non-negative integer.
    BoolOrUInt,
    /// A string or `false`.
    StrOrFalse,
    /// A single string or an array of strings.
    StrOrList,
    /// A boolean, a string, or an array of strings.
    BoolOrStrList,
    /// An array of strings.
    StrList,
    /// One of a fixed set of string values.
    OneOf(&'static [&'static str]),
    /// Any array; element shapes are checked later.
    Array,
    Object(&'static [Field]),
}

/// One recognized option: canonical name, optional alias spelling, and kind.
#[derive(Debug, Clone, Copy)]
pub struct Field {
    pub name: &'static str,
    pub alias: Option<&'static str>,
    pub kind: Kind,
}

impl Field {
    const fn new(name: &'static str, kind: Kind) -> Self {
        Self {
            name,
            alias: None,
            kind,
        }
    }

    const fn aliased(name: &'static str, alias: &'static str, kind: Kind) -> Self {
        Self {
            name,
            alias: Some(alias),
            kind,
        }
    }

    pub fn matches(&self, key: &str) -> bool {
        self.name == key || self.alias == Some(key)
    }
}

pub const MODES: &[&str] = &["development", "production", "none"];
pub const LOG_LEVELS: &[&str] = &["none", "error", "warn", "info", "log", "verbose"];

pub const OUTPUT_FIELDS: &[Field] = &[
    Field::new("path", Kind::Str),
    Field::new("filename", Kind::Str),
];

pub const WATCH_OPTIONS_FIELDS: &[Field] = &[
    Field::aliased("aggregateTimeout", "aggregate_timeout", Kind::UInt),
    Field::new("poll", Kind::BoolOrUInt),
    Field::new("ignored", Kind::StrOrList),
    Field::new("stdin", Kind::Bool),
];

pub const INFRASTRUCTURE_LOGGING_FIELDS: &[Field] = &[
    Field::new("level", Kind::OneOf(LOG_LEVELS)),
    Field::new("debug", Kind::BoolOrStrList),
    Field::new("colors", Kind::Bool),
    Field::aliased("appendOnly", "append_only", Kind::Bool),
];

pub const ROOT_FIELDS: &[Field] = &[
    Field::new("name", Kind::Str),
    Field::new("mode", Kind::OneOf(MODES)),
    Field::new("context", Kind::Str),
    Field::new("entry", Kind::StrOrList),
    Field::new("output", Kind::Object(OUTPUT_FIELDS)),
    Field::new("devtool", Kind::StrOrFalse),
    Field::new("cache", Kind::Bool),
    Field::new("bail", Kind::Bool),
    Field::new("watch", Kind::Bool),
    Field::aliased("watchOptions", "watch_options", Kind::Object(WATCH_OPTIONS_FIELDS)),
    Field::new("plugins", Kind::Array),
    Field::new("dependencies", Kind::StrList),
    Field::aliased(
        "infrastructureLogging",
        "infrastructure_logging",
        Kind::Object(INFRASTRUCTURE_LOGGING_FIELDS),
    ),
];

pub fn lookup<'a>(fields: &'a [Field], key: &str) -> Option<&'a Field> {
    fields.iter().find(|f| f.matches(key))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_finds_canonical_and_alias() {
        assert_eq!(lookup(ROOT_FIELDS, "watchOptions").unwrap().name, "watchOptions");
        assert_eq!(lookup(ROOT_FIELDS, "watch_options").unwrap().name, "watchOptions");
        assert!(lookup(ROOT_FIELDS, "watchoptions").is_none());
    }

    #[test]
    fn canonical_names_are_unique() {
        let mut names: Vec<_> = ROOT_FIELDS.iter().map(|f| f.name).collect();
        names.sort_unstable();
        let before = names.len();
        names.dedup();
        assert_eq!(before, names.len());
    }
}
