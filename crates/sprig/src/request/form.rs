use crate::error::BodyError;
use crate::validate::object_of;
use bytes::Bytes;
use futures::stream;
use serde_json::{json, Value};
use std::convert::Infallible;

/// An uploaded file from a multipart body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormFile {
    pub filename: String,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormValue {
    Text(String),
    File(FormFile),
}

impl FormValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FormValue::Text(text) => Some(text),
            FormValue::File(_) => None,
        }
    }

    pub fn as_file(&self) -> Option<&FormFile> {
        match self {
            FormValue::File(file) => Some(file),
            FormValue::Text(_) => None,
        }
    }

    fn to_value(&self) -> Value {
        match self {
            FormValue::Text(text) => Value::String(text.clone()),
            FormValue::File(file) => json!({
                "filename": file.filename,
                "contentType": file.content_type,
                "size": file.bytes.len(),
            }),
        }
    }
}

/// A decoded form body, fields in body order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormData {
    entries: Vec<(String, FormValue)>,
}

impl FormData {
    pub(crate) fn from_urlencoded(bytes: &[u8]) -> Result<Self, BodyError> {
        let pairs: Vec<(String, String)> = serde_urlencoded::from_bytes(bytes).map_err(BodyError::form)?;
        Ok(Self { entries: pairs.into_iter().map(|(k, v)| (k, FormValue::Text(v))).collect() })
    }

    pub(crate) async fn from_multipart(bytes: Bytes, boundary: String) -> Result<Self, BodyError> {
        let body = stream::once(async move { Ok::<Bytes, Infallible>(bytes) });
        let mut multipart = multer::Multipart::new(body, boundary);

        let mut entries = Vec::new();
        while let Some(field) = multipart.next_field().await.map_err(BodyError::form)? {
            let name = field.name().unwrap_or_default().to_string();
            let filename = field.file_name().map(ToString::to_string);
            let content_type = field.content_type().map(ToString::to_string);
            let data = field.bytes().await.map_err(BodyError::form)?;

            let value = match filename {
                Some(filename) => FormValue::File(FormFile { filename, content_type, bytes: data }),
                None => FormValue::Text(String::from_utf8(data.to_vec()).map_err(|_| BodyError::NotUtf8)?),
            };
            entries.push((name, value));
        }
        Ok(Self { entries })
    }

    /// The first value of field `name`.
    pub fn get(&self, name: &str) -> Option<&FormValue> {
        self.entries.iter().find(|(key, _)| key == name).map(|(_, value)| value)
    }

    pub fn get_all(&self, name: &str) -> Vec<&FormValue> {
        self.entries.iter().filter(|(key, _)| key == name).map(|(_, value)| value).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FormValue)> + '_ {
        self.entries.iter().map(|(key, value)| (key.as_str(), value))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The shape a form validator receives. Repeated fields become arrays, files are described by name,
    /// content type and size.
    pub fn to_value(&self) -> Value {
        let mut grouped: Vec<(&str, Vec<Value>)> = Vec::new();
        for (name, value) in &self.entries {
            match grouped.iter_mut().find(|(key, _)| key == name) {
                Some((_, values)) => values.push(value.to_value()),
                None => grouped.push((name, vec![value.to_value()])),
            }
        }
        object_of(grouped.into_iter().map(|(name, mut values)| {
            let value = if values.len() == 1 { values.remove(0) } else { Value::Array(values) };
            (name, value)
        }))
    }
}
