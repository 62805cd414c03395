use crate::validate::object_of;
use serde_json::Value;

/// A query parameter: a single value, or every value in order when the key repeats.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryValue {
    Single(String),
    Multiple(Vec<String>),
}

impl QueryValue {
    pub fn first(&self) -> &str {
        match self {
            QueryValue::Single(value) => value,
            QueryValue::Multiple(values) => values.first().map_or("", String::as_str),
        }
    }

    fn push(&mut self, value: String) {
        match self {
            QueryValue::Single(first) => *self = QueryValue::Multiple(vec![std::mem::take(first), value]),
            QueryValue::Multiple(values) => values.push(value),
        }
    }

    fn to_value(&self) -> Value {
        match self {
            QueryValue::Single(value) => Value::String(value.clone()),
            QueryValue::Multiple(values) => Value::Array(values.iter().cloned().map(Value::String).collect()),
        }
    }
}

/// Every query parameter of a request. [`get`](Self::get) and [`iter`](Self::iter) follow first-seen order;
/// the object built by [`to_value`](Self::to_value) orders its keys the way `serde_json::Map` does.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryMap {
    entries: Vec<(String, QueryValue)>,
}

impl QueryMap {
    pub(crate) fn parse(query: Option<&str>) -> Self {
        let mut map = Self::default();
        for (key, value) in pairs(query) {
            match map.entries.iter_mut().find(|(existing, _)| *existing == key) {
                Some((_, existing)) => existing.push(value),
                None => map.entries.push((key, QueryValue::Single(value))),
            }
        }
        map
    }

    pub fn get(&self, key: &str) -> Option<&QueryValue> {
        self.entries.iter().find(|(existing, _)| existing == key).map(|(_, value)| value)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &QueryValue)> + '_ {
        self.entries.iter().map(|(key, value)| (key.as_str(), value))
    }

    /// The shape a query validator receives: strings for single keys, arrays for repeated ones.
    pub fn to_value(&self) -> Value {
        object_of(self.entries.iter().map(|(key, value)| (key.as_str(), value.to_value())))
    }
}

pub(crate) fn pairs(query: Option<&str>) -> Vec<(String, String)> {
    query.and_then(|query| serde_urlencoded::from_str(query).ok()).unwrap_or_default()
}
