//! Declarative validation of the parts of a request a route depends on.
//!
//! A route (or a router guard) declares a [`SchemaMap`]: one [`Validator`] per [`Channel`]. Before any middleware
//! runs, every declared channel is read from the request, checked, and stored in the request context so handlers
//! can read the validated value with [`RequestContext::valid`](crate::RequestContext::valid).
//!
//! Validators are combined by intersection. Declaring the same channel twice, or declaring it on both a guard and
//! a route, means the input must satisfy both validators and the validated result merges both outputs.

mod pipeline;
mod schema;

pub(crate) use pipeline::validate_request;
pub use pipeline::Validated;
pub(crate) use schema::object_of;
pub use schema::{schema, validator_fn, FnValidator, Intersection, TypedValidator};

use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// A part of the request that can be validated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Channel {
    Json,
    Query,
    Headers,
    Cookie,
    Form,
}

impl Channel {
    pub const ALL: [Channel; 5] = [Channel::Json, Channel::Query, Channel::Headers, Channel::Cookie, Channel::Form];

    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Json => "json",
            Channel::Query => "query",
            Channel::Headers => "headers",
            Channel::Cookie => "cookie",
            Channel::Form => "form",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One reason a validator rejected its input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Issue {
    pub path: Vec<String>,
    pub message: String,
}

impl Issue {
    pub fn new<S: Into<String>>(message: S) -> Self {
        Self { path: Vec::new(), message: message.into() }
    }

    pub fn at<I, P, S>(path: I, message: S) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<String>,
        S: Into<String>,
    {
        Self { path: path.into_iter().map(Into::into).collect(), message: message.into() }
    }
}

/// Checks a raw channel value and returns the validated (possibly normalized) value.
pub trait Validator: Send + Sync {
    /// # Errors
    ///
    /// Returns every issue found in `value`.
    fn validate(&self, value: &Value) -> Result<Value, Vec<Issue>>;
}

impl<V: Validator + ?Sized> Validator for Arc<V> {
    fn validate(&self, value: &Value) -> Result<Value, Vec<Issue>> {
        (**self).validate(value)
    }
}

impl<V: Validator + ?Sized> Validator for Box<V> {
    fn validate(&self, value: &Value) -> Result<Value, Vec<Issue>> {
        (**self).validate(value)
    }
}

type SharedValidator = Arc<dyn Validator>;

/// The validators declared for each channel of a route.
#[derive(Clone, Default)]
pub struct SchemaMap {
    validators: BTreeMap<Channel, SharedValidator>,
}

impl SchemaMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn json<V: Validator + 'static>(self, validator: V) -> Self {
        self.channel(Channel::Json, validator)
    }

    pub fn query<V: Validator + 'static>(self, validator: V) -> Self {
        self.channel(Channel::Query, validator)
    }

    pub fn headers<V: Validator + 'static>(self, validator: V) -> Self {
        self.channel(Channel::Headers, validator)
    }

    pub fn cookie<V: Validator + 'static>(self, validator: V) -> Self {
        self.channel(Channel::Cookie, validator)
    }

    pub fn form<V: Validator + 'static>(self, validator: V) -> Self {
        self.channel(Channel::Form, validator)
    }

    /// Declares `validator` for `channel`, intersecting with any validator already declared there.
    pub fn channel<V: Validator + 'static>(mut self, channel: Channel, validator: V) -> Self {
        self.intersect(channel, Arc::new(validator));
        self
    }

    /// Combines two maps channel by channel. Channels declared on both sides are intersected.
    #[must_use]
    pub fn merge(&self, other: &SchemaMap) -> SchemaMap {
        let mut merged = self.clone();
        for (channel, validator) in &other.validators {
            merged.intersect(*channel, Arc::clone(validator));
        }
        merged
    }

    pub fn get(&self, channel: Channel) -> Option<&dyn Validator> {
        self.validators.get(&channel).map(|validator| validator.as_ref() as &dyn Validator)
    }

    pub fn contains(&self, channel: Channel) -> bool {
        self.validators.contains_key(&channel)
    }

    /// Declared channels in validation order.
    pub fn channels(&self) -> impl Iterator<Item = Channel> + '_ {
        self.validators.keys().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (Channel, &dyn Validator)> + '_ {
        self.validators.iter().map(|(channel, validator)| (*channel, validator.as_ref() as &dyn Validator))
    }

    fn intersect(&mut self, channel: Channel, validator: SharedValidator) {
        let combined: SharedValidator = match self.validators.remove(&channel) {
            Some(existing) => Arc::new(Intersection::new(existing, validator)),
            None => validator,
        };
        self.validators.insert(channel, combined);
    }
}

impl fmt::Debug for SchemaMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.validators.keys()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::{validator_fn, Channel, Issue, SchemaMap, Validator};
    use mockall::mock;
    use serde_json::{json, Value};

    mock! {
        Check {}

        impl Validator for Check {
            fn validate(&self, value: &Value) -> Result<Value, Vec<Issue>>;
        }
    }

    #[test]
    fn merge_keeps_channels_from_both_sides() {
        let guard = SchemaMap::new().headers(validator_fn(|v| Ok(v.clone())));
        let route = SchemaMap::new().query(validator_fn(|v| Ok(v.clone())));

        let merged = guard.merge(&route);
        assert_eq!(merged.channels().collect::<Vec<_>>(), vec![Channel::Query, Channel::Headers]);
    }

    #[test]
    fn same_channel_is_intersected() {
        let mut left = MockCheck::new();
        left.expect_validate().times(1).returning(|_| Ok(json!({ "msisdn": "42" })));
        let mut right = MockCheck::new();
        right.expect_validate().times(1).returning(|_| Ok(json!({ "country": "NL" })));

        let merged = SchemaMap::new().query(left).merge(&SchemaMap::new().query(right));
        let validated = merged.get(Channel::Query).unwrap().validate(&json!({})).unwrap();
        assert_eq!(validated, json!({ "msisdn": "42", "country": "NL" }));
    }

    #[test]
    fn intersection_collects_issues_from_both_sides() {
        let mut left = MockCheck::new();
        left.expect_validate().returning(|_| Err(vec![Issue::at(["msisdn"], "required")]));
        let mut right = MockCheck::new();
        right.expect_validate().returning(|_| Err(vec![Issue::at(["country"], "required")]));

        let schema = SchemaMap::new().query(left).query(right);
        let issues = schema.get(Channel::Query).unwrap().validate(&json!({})).unwrap_err();
        assert_eq!(issues.len(), 2);
    }

    #[test]
    fn channel_names() {
        let names: Vec<_> = Channel::ALL.iter().map(ToString::to_string).collect();
        assert_eq!(names, vec!["json", "query", "headers", "cookie", "form"]);
    }
}
