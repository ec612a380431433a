use crate::types::Info;
use crate::{Error, Result};

/// A walk filter, either `field==value` or a bare `field` checking for presence.
///
/// Supported fields are `name`, `parent`, `kind` and `labels.<name>`.
#[derive(Debug, PartialEq, Eq)]
pub(crate) struct Filter {
    field: Field,
    value: Option<String>,
}

#[derive(Debug, PartialEq, Eq)]
enum Field {
    Name,
    Parent,
    Kind,
    Label(String),
}

impl Filter {
    pub fn parse(filter: &str) -> Result<Self> {
        let (field, value) = match filter.split_once("==") {
            Some((field, value)) => (field.trim(), Some(unquote(value.trim()).to_string())),
            None => (filter.trim(), None),
        };

        let field = match field {
            "name" => Field::Name,
            "parent" => Field::Parent,
            "kind" => Field::Kind,
            _ => match field.strip_prefix("labels.") {
                Some(label) if !label.is_empty() => Field::Label(unquote(label).to_string()),
                _ => return Err(Error::InvalidFilter(filter.to_string())),
            },
        };

        Ok(Filter { field, value })
    }

    pub fn matches(&self, info: &Info) -> bool {
        let actual = match &self.field {
            Field::Name => Some(info.name.as_str()),
            Field::Parent => info.parent.as_deref(),
            Field::Kind => Some(info.kind.as_str()),
            Field::Label(name) => info.labels.get(name).map(String::as_str),
        };

        match (&self.value, actual) {
            (Some(expected), Some(actual)) => expected == actual,
            (None, Some(_)) => true,
            (_, None) => false,
        }
    }
}

/// Parse every filter. An info matches the list when it matches any of them, or when the list is empty.
pub(crate) fn parse_all(filters: &[String]) -> Result<Vec<Filter>> {
    filters.iter().map(|f| Filter::parse(f)).collect()
}

pub(crate) fn match_any(filters: &[Filter], info: &Info) -> bool {
    filters.is_empty() || filters.iter().any(|f| f.matches(info))
}

fn unquote(s: &str) -> &str {
    s.strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(s)
}
