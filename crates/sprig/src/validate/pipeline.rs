use super::schema::object_of;
use super::{Channel, SchemaMap};
use crate::cookie;
use crate::error::{BodyError, ValidationError};
use crate::request::RouterRequest;
use http::HeaderMap;
use mime::Mime;
use serde_json::Value;
use std::collections::HashMap;
use tracing::trace;

/// The validated value of every channel declared for the matched route.
#[derive(Debug, Clone, Default)]
pub struct Validated {
    values: HashMap<Channel, Value>,
}

impl Validated {
    pub fn get(&self, channel: Channel) -> Option<&Value> {
        self.values.get(&channel)
    }

    pub fn contains(&self, channel: Channel) -> bool {
        self.values.contains_key(&channel)
    }
}

/// Reads and validates every channel `schema` declares, in channel order, stopping at the first failure.
pub(crate) async fn validate_request(req: &mut RouterRequest, schema: &SchemaMap) -> Result<Validated, ValidationError> {
    let mut validated = Validated::default();
    for (channel, validator) in schema.iter() {
        let input = channel_input(req, channel).await?;
        let value = validator.validate(&input).map_err(|issues| ValidationError::rejected(channel, issues))?;
        trace!(%channel, "channel validated");
        validated.values.insert(channel, value);
    }
    Ok(validated)
}

async fn channel_input(req: &mut RouterRequest, channel: Channel) -> Result<Value, ValidationError> {
    match channel {
        Channel::Json => {
            if !has_essence(req.content_type(), &[mime::APPLICATION_JSON]) {
                return Err(ValidationError::unsupported_content_type(channel, req.content_type()));
            }
            let bytes = req.bytes().await?;
            serde_json::from_slice(&bytes).map_err(ValidationError::malformed_json)
        }
        Channel::Query => Ok(req.query_map().to_value()),
        Channel::Headers => Ok(headers_value(req.headers())),
        Channel::Cookie => {
            let header = cookie::cookie_header(req.headers()).ok_or(ValidationError::MissingCookie)?;
            let mut entries: Vec<(String, Value)> = Vec::new();
            for (name, value) in cookie::parse(&header) {
                if !entries.iter().any(|(existing, _)| *existing == name) {
                    entries.push((name, Value::String(value)));
                }
            }
            Ok(object_of(entries))
        }
        Channel::Form => {
            if !has_essence(req.content_type(), &[mime::APPLICATION_WWW_FORM_URLENCODED, mime::MULTIPART_FORM_DATA]) {
                return Err(ValidationError::unsupported_content_type(channel, req.content_type()));
            }
            match req.form().await {
                Ok(form) => Ok(form.to_value()),
                Err(BodyError::Form { reason }) => Err(ValidationError::malformed_form(reason)),
                Err(e) => Err(e.into()),
            }
        }
    }
}

fn has_essence(content_type: Option<&str>, accepted: &[Mime]) -> bool {
    let Some(content_type) = content_type else {
        return false;
    };
    let essence = content_type.split(';').next().unwrap_or_default().trim();
    accepted.iter().any(|candidate| essence.eq_ignore_ascii_case(candidate.essence_str()))
}

fn headers_value(headers: &HeaderMap) -> Value {
    let entries = headers.keys().map(|name| {
        let joined = headers
            .get_all(name)
            .iter()
            .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned())
            .collect::<Vec<_>>()
            .join(", ");
        (name.as_str(), Value::String(joined))
    });
    object_of(entries)
}
