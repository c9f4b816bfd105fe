//! Filter sets and their normalization.
//!
//! A [`FilterSet`] is an ordered map, so two sets built in different
//! insertion orders compare (and hash) equal. After [`normalize`] no entry
//! holds an empty value, which makes the normalized set usable directly as
//! a cache key.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub mod image;

pub use image::{BrowsingMode, ImageFilters, ImageSort, MediaType, MetricTimeframe, ReviewReaction};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    Null,
    Bool(bool),
    Int(i64),
    Str(String),
    List(Vec<FilterValue>),
    Map(BTreeMap<String, FilterValue>),
}

impl FilterValue {
    /// Undefined, empty string, empty list and empty mapping are "empty".
    pub fn is_empty(&self) -> bool {
        match self {
            FilterValue::Null => true,
            FilterValue::Str(s) => s.is_empty(),
            FilterValue::List(v) => v.is_empty(),
            FilterValue::Map(m) => m.is_empty(),
            FilterValue::Bool(_) | FilterValue::Int(_) => false,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FilterValue::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Parse a command-line value: `true`/`false`, integers, comma lists,
    /// empty for undefined, anything else as a string.
    pub fn parse_cli(raw: &str) -> FilterValue {
        let raw = raw.trim();
        if raw.is_empty() {
            return FilterValue::Null;
        }
        if raw.contains(',') {
            let items = raw
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(FilterValue::parse_scalar)
                .collect();
            return FilterValue::List(items);
        }
        FilterValue::parse_scalar(raw)
    }

    fn parse_scalar(raw: &str) -> FilterValue {
        match raw {
            "true" => FilterValue::Bool(true),
            "false" => FilterValue::Bool(false),
            _ => match raw.parse::<i64>() {
                Ok(n) => FilterValue::Int(n),
                Err(_) => FilterValue::Str(raw.to_string()),
            },
        }
    }

    /// Flatten into a single query-string value.
    pub fn to_query_value(&self) -> String {
        match self {
            FilterValue::Null => String::new(),
            FilterValue::Bool(b) => b.to_string(),
            FilterValue::Int(n) => n.to_string(),
            FilterValue::Str(s) => s.clone(),
            FilterValue::List(v) => v.iter().map(FilterValue::to_query_value).collect::<Vec<_>>().join(","),
            FilterValue::Map(_) => serde_json::to_string(self).unwrap_or_default(),
        }
    }
}

impl From<bool> for FilterValue {
    fn from(v: bool) -> Self { FilterValue::Bool(v) }
}
impl From<i64> for FilterValue {
    fn from(v: i64) -> Self { FilterValue::Int(v) }
}
impl From<&str> for FilterValue {
    fn from(v: &str) -> Self { FilterValue::Str(v.to_string()) }
}
impl From<String> for FilterValue {
    fn from(v: String) -> Self { FilterValue::Str(v) }
}
impl<T: Into<FilterValue>> From<Vec<T>> for FilterValue {
    fn from(v: Vec<T>) -> Self { FilterValue::List(v.into_iter().map(Into::into).collect()) }
}
impl<T: Into<FilterValue>> From<Option<T>> for FilterValue {
    fn from(v: Option<T>) -> Self { v.map(Into::into).unwrap_or(FilterValue::Null) }
}

impl From<Value> for FilterValue {
    fn from(v: Value) -> Self {
        match v {
            Value::Null => FilterValue::Null,
            Value::Bool(b) => FilterValue::Bool(b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => FilterValue::Int(i),
                None => FilterValue::Str(n.to_string()),
            },
            Value::String(s) => FilterValue::Str(s),
            Value::Array(a) => FilterValue::List(a.into_iter().map(FilterValue::from).collect()),
            Value::Object(o) => FilterValue::Map(o.into_iter().map(|(k, v)| (k, FilterValue::from(v))).collect()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FilterSet(BTreeMap<String, FilterValue>);

impl FilterSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<FilterValue>) -> Option<FilterValue> {
        self.0.insert(key.into(), value.into())
    }

    pub fn remove(&mut self, key: &str) -> Option<FilterValue> {
        self.0.remove(key)
    }

    pub fn get(&self, key: &str) -> Option<&FilterValue> {
        self.0.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &FilterValue)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// This set with all empty entries dropped.
    pub fn normalized(&self) -> FilterSet {
        self.0
            .iter()
            .filter(|(_, v)| !v.is_empty())
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Stable textual key: sorted keys, JSON-encoded.
    pub fn canonical_key(&self) -> String {
        serde_json::to_string(&self.0).unwrap_or_default()
    }

    /// Name/value pairs for an HTTP query string, empty values skipped.
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        self.0
            .iter()
            .filter(|(_, v)| !v.is_empty())
            .map(|(k, v)| (k.clone(), v.to_query_value()))
            .collect()
    }
}

impl<K: Into<String>, V: Into<FilterValue>> FromIterator<(K, V)> for FilterSet {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        FilterSet(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl<K: Into<String>, V: Into<FilterValue>, const N: usize> From<[(K, V); N]> for FilterSet {
    fn from(pairs: [(K, V); N]) -> Self {
        pairs.into_iter().collect()
    }
}

impl fmt::Display for FilterSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical_key())
    }
}

/// Merge `overrides` over `ambient` key by key and drop empty entries.
pub fn normalize(ambient: &FilterSet, overrides: &FilterSet) -> FilterSet {
    let mut merged = ambient.0.clone();
    for (k, v) in &overrides.0 {
        merged.insert(k.clone(), v.clone());
    }
    FilterSet(merged).normalized()
}

/// Parse a `key=value` argument. The value goes through
/// [`FilterValue::parse_cli`]; `key=` yields an undefined value.
pub fn parse_assignment(raw: &str) -> Result<(String, FilterValue), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got `{raw}`"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty filter name in `{raw}`"));
    }
    Ok((key.to_string(), FilterValue::parse_cli(value)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_win_and_empties_are_dropped() {
        let ambient = FilterSet::from([("period", "Week"), ("sort", "Newest"), ("username", "")]);
        let overrides = FilterSet::new()
            .with("period", "Month")
            .with("types", Vec::<String>::new())
            .with("postId", FilterValue::Null);
        let out = normalize(&ambient, &overrides);
        assert_eq!(out, FilterSet::from([("period", "Month"), ("sort", "Newest")]));
    }

    #[test]
    fn override_with_empty_value_removes_ambient_key() {
        let ambient = FilterSet::from([("username", "alice")]);
        let overrides = FilterSet::from([("username", "")]);
        assert!(normalize(&ambient, &overrides).is_empty());
    }

    #[test]
    fn equal_regardless_of_insertion_order_and_empties() {
        let a = FilterSet::new().with("sort", "Newest").with("period", "Month").with("followed", true);
        let b = FilterSet::new()
            .with("followed", true)
            .with("reactions", FilterValue::Map(BTreeMap::new()))
            .with("period", "Month")
            .with("sort", "Newest");
        let empty = FilterSet::new();
        assert_eq!(normalize(&empty, &a), normalize(&empty, &b));
        assert_eq!(normalize(&empty, &a).canonical_key(), normalize(&b, &empty).canonical_key());
    }

    #[test]
    fn normalize_is_idempotent() {
        let ambient = FilterSet::from([("period", "Day"), ("browsingMode", "")]);
        let overrides = FilterSet::new().with("types", vec!["image", "video"]).with("withMeta", false);
        let once = normalize(&ambient, &overrides);
        let twice = normalize(&once, &FilterSet::new());
        assert_eq!(once, twice);
        assert_eq!(once.get("withMeta"), Some(&FilterValue::Bool(false)));
    }

    #[test]
    fn parses_cli_values() {
        assert_eq!(FilterValue::parse_cli("true"), FilterValue::Bool(true));
        assert_eq!(FilterValue::parse_cli("42"), FilterValue::Int(42));
        assert_eq!(FilterValue::parse_cli(""), FilterValue::Null);
        assert_eq!(
            FilterValue::parse_cli("image, video"),
            FilterValue::List(vec!["image".into(), "video".into()])
        );
        assert_eq!(FilterValue::parse_cli("Most Reactions"), FilterValue::Str("Most Reactions".into()));
    }

    #[test]
    fn query_pairs_flatten_lists() {
        let f = FilterSet::new().with("types", vec!["image", "video"]).with("limit", 20i64).with("username", "");
        assert_eq!(
            f.query_pairs(),
            vec![("limit".to_string(), "20".to_string()), ("types".to_string(), "image,video".to_string())]
        );
    }

    #[test]
    fn parses_assignments() {
        assert_eq!(parse_assignment("period=Month"), Ok(("period".to_string(), FilterValue::Str("Month".into()))));
        assert_eq!(parse_assignment("username="), Ok(("username".to_string(), FilterValue::Null)));
        assert!(parse_assignment("period").is_err());
        assert!(parse_assignment("=Month").is_err());
    }
}
