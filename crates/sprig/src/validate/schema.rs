use super::{Issue, Validator};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;
use std::marker::PhantomData;

/// Validates a channel by deserializing it into `T`.
///
/// The validated value is `T` serialized back to JSON, so defaults and renames declared on `T` show up in it.
/// Query parameters, headers and cookies arrive as strings: declare those fields as `String` and parse them
/// in the handler, or use a custom [`Validator`] that coerces them.
pub struct TypedValidator<T> {
    _phantom: PhantomData<fn() -> T>,
}

pub fn schema<T>() -> TypedValidator<T>
where
    T: DeserializeOwned + Serialize + 'static,
{
    TypedValidator { _phantom: PhantomData }
}

impl<T> fmt::Debug for TypedValidator<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypedValidator").field("type", &std::any::type_name::<T>()).finish()
    }
}

impl<T> Validator for TypedValidator<T>
where
    T: DeserializeOwned + Serialize + 'static,
{
    fn validate(&self, value: &Value) -> Result<Value, Vec<Issue>> {
        let typed = T::deserialize(value).map_err(|e| vec![Issue::new(e.to_string())])?;
        serde_json::to_value(typed).map_err(|e| vec![Issue::new(e.to_string())])
    }
}

/// A validator backed by a closure.
pub struct FnValidator<F> {
    f: F,
}

pub fn validator_fn<F>(f: F) -> FnValidator<F>
where
    F: Fn(&Value) -> Result<Value, Vec<Issue>> + Send + Sync,
{
    FnValidator { f }
}

impl<F> fmt::Debug for FnValidator<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FnValidator")
    }
}

impl<F> Validator for FnValidator<F>
where
    F: Fn(&Value) -> Result<Value, Vec<Issue>> + Send + Sync,
{
    fn validate(&self, value: &Value) -> Result<Value, Vec<Issue>> {
        (self.f)(value)
    }
}

/// Accepts a value only when both validators accept it, and merges both outputs.
///
/// Objects are merged key by key; any other pair of outputs must be equal.
#[derive(Debug)]
pub struct Intersection<L, R> {
    left: L,
    right: R,
}

impl<L, R> Intersection<L, R> {
    pub fn new(left: L, right: R) -> Self {
        Self { left, right }
    }
}

impl<L: Validator, R: Validator> Validator for Intersection<L, R> {
    fn validate(&self, value: &Value) -> Result<Value, Vec<Issue>> {
        match (self.left.validate(value), self.right.validate(value)) {
            (Ok(left), Ok(right)) => merge_values(left, right)
                .map_err(|path| vec![Issue::at(path, "intersection results could not be merged")]),
            (Err(mut left), Err(right)) => {
                left.extend(right);
                Err(left)
            }
            (Err(issues), Ok(_)) | (Ok(_), Err(issues)) => Err(issues),
        }
    }
}

fn merge_values(left: Value, right: Value) -> Result<Value, Vec<String>> {
    match (left, right) {
        (Value::Object(mut left), Value::Object(right)) => {
            for (key, right_value) in right {
                let merged = match left.remove(&key) {
                    Some(left_value) => merge_values(left_value, right_value).map_err(|mut path| {
                        path.insert(0, key.clone());
                        path
                    })?,
                    None => right_value,
                };
                left.insert(key, merged);
            }
            Ok(Value::Object(left))
        }
        (left, right) if left == right => Ok(left),
        _ => Err(Vec::new()),
    }
}

/// Builds the object a validator sees for key/value channels.
pub(crate) fn object_of<I, K>(entries: I) -> Value
where
    I: IntoIterator<Item = (K, Value)>,
    K: Into<String>,
{
    Value::Object(entries.into_iter().map(|(k, v)| (k.into(), v)).collect::<Map<_, _>>())
}
