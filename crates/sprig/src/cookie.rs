//! Cookie parsing and serialization.
//!
//! [`Cookies`] is the per-request jar exposed on the request context. Reads fall back to the inbound `Cookie`
//! header, writes are recorded and turned into `Set-Cookie` headers when the response is built. A cookie written
//! or deleted during the request shadows the inbound value of the same name.

use http::header::COOKIE;
use http::HeaderMap;
use once_cell::sync::OnceCell;
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;

/// 400 days, the longest lifetime a cookie may ask for.
const MAX_LIFETIME_SECS: u64 = 34_560_000;

const SECURE_PREFIX: &str = "__Secure-";
const HOST_PREFIX: &str = "__Host-";
const DELETED: &str = "deleted";

/// Characters left untouched by `encodeURIComponent`.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CookieError {
    #[error("invalid cookie name '{name}'")]
    InvalidName { name: String },

    #[error("__Secure- cookie '{name}' must have the Secure attribute")]
    SecurePrefix { name: String },

    #[error("__Host- cookie '{name}' must have the Secure attribute")]
    HostPrefixInsecure { name: String },

    #[error("__Host- cookie '{name}' must have the Path attribute \"/\"")]
    HostPrefixPath { name: String },

    #[error("__Host- cookie '{name}' must not have a Domain attribute")]
    HostPrefixDomain { name: String },

    #[error("cookie Max-Age should not be greater than 400 days ({MAX_LIFETIME_SECS} seconds)")]
    MaxAgeTooLong,

    #[error("cookie Expires should not be greater than 400 days in the future")]
    ExpiresTooFar,

    #[error("partitioned cookie '{name}' must have the Secure attribute")]
    PartitionedInsecure { name: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SameSite {
    Strict,
    Lax,
    None,
}

impl fmt::Display for SameSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SameSite::Strict => f.write_str("Strict"),
            SameSite::Lax => f.write_str("Lax"),
            SameSite::None => f.write_str("None"),
        }
    }
}

/// Name prefixes the browser enforces extra rules for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CookiePrefix {
    /// `__Secure-`: the cookie is sent over secure connections only.
    Secure,
    /// `__Host-`: like `Secure`, pinned to the exact host and the root path.
    Host,
}

impl CookiePrefix {
    fn as_str(self) -> &'static str {
        match self {
            CookiePrefix::Secure => SECURE_PREFIX,
            CookiePrefix::Host => HOST_PREFIX,
        }
    }
}

/// Attributes written after the `name=value` pair of a `Set-Cookie` header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CookieOptions {
    domain: Option<String>,
    expires: Option<SystemTime>,
    http_only: bool,
    max_age: Option<u64>,
    path: Option<String>,
    secure: bool,
    same_site: Option<SameSite>,
    partitioned: bool,
    prefix: Option<CookiePrefix>,
}

impl CookieOptions {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn domain<S: Into<String>>(mut self, domain: S) -> Self {
        self.domain = Some(domain.into());
        self
    }

    #[must_use]
    pub fn expires(mut self, expires: SystemTime) -> Self {
        self.expires = Some(expires);
        self
    }

    #[must_use]
    pub fn http_only(mut self, http_only: bool) -> Self {
        self.http_only = http_only;
        self
    }

    #[must_use]
    pub fn max_age(mut self, max_age: Duration) -> Self {
        self.max_age = Some(max_age.as_secs());
        self
    }

    #[must_use]
    pub fn path<S: Into<String>>(mut self, path: S) -> Self {
        self.path = Some(path.into());
        self
    }

    #[must_use]
    pub fn secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    #[must_use]
    pub fn same_site(mut self, same_site: SameSite) -> Self {
        self.same_site = Some(same_site);
        self
    }

    #[must_use]
    pub fn partitioned(mut self, partitioned: bool) -> Self {
        self.partitioned = partitioned;
        self
    }

    /// Prepends the prefix to the cookie name and forces the attributes it requires.
    #[must_use]
    pub fn prefix(mut self, prefix: CookiePrefix) -> Self {
        self.prefix = Some(prefix);
        self
    }
}

/// Splits a `Cookie` header into decoded `(name, value)` pairs, in header order.
///
/// Values wrapped in double quotes are unwrapped, and values that are not valid percent-encoded UTF-8 are kept
/// as they were sent.
pub fn parse(header: &str) -> Vec<(String, String)> {
    header
        .split(';')
        .filter_map(|pair| {
            let (name, value) = pair.split_once('=')?;
            let name = name.trim();
            if name.is_empty() {
                return None;
            }
            let value = value.trim();
            let value = value.strip_prefix('"').and_then(|v| v.strip_suffix('"')).unwrap_or(value);
            let decoded = percent_decode_str(value).decode_utf8().map_or_else(|_| value.to_string(), |v| v.into_owned());
            Some((name.to_string(), decoded))
        })
        .collect()
}

/// Builds a `Set-Cookie` header value, percent-encoding `value`.
///
/// # Errors
///
/// Fails when the name is not a valid token, or when the options break a rule of the cookie's name prefix or the
/// 400 day lifetime cap.
pub fn serialize(name: &str, value: &str, options: &CookieOptions) -> Result<String, CookieError> {
    let mut options = options.clone();
    let name = match options.prefix {
        Some(prefix) => {
            options.secure = true;
            if prefix == CookiePrefix::Host {
                options.path = Some("/".to_string());
                options.domain = None;
            }
            if name.starts_with(prefix.as_str()) { name.to_string() } else { format!("{}{name}", prefix.as_str()) }
        }
        None => name.to_string(),
    };

    if !is_token(&name) {
        return Err(CookieError::InvalidName { name });
    }
    if name.starts_with(SECURE_PREFIX) && !options.secure {
        return Err(CookieError::SecurePrefix { name });
    }
    if name.starts_with(HOST_PREFIX) {
        if !options.secure {
            return Err(CookieError::HostPrefixInsecure { name });
        }
        if options.path.as_deref() != Some("/") {
            return Err(CookieError::HostPrefixPath { name });
        }
        if options.domain.is_some() {
            return Err(CookieError::HostPrefixDomain { name });
        }
    }

    let mut cookie = format!("{name}={}", utf8_percent_encode(value, COMPONENT));

    if let Some(max_age) = options.max_age {
        if max_age > MAX_LIFETIME_SECS {
            return Err(CookieError::MaxAgeTooLong);
        }
        cookie.push_str(&format!("; Max-Age={max_age}"));
    }
    if let Some(domain) = &options.domain {
        cookie.push_str(&format!("; Domain={domain}"));
    }
    if let Some(path) = &options.path {
        cookie.push_str(&format!("; Path={path}"));
    }
    if let Some(expires) = options.expires {
        let ahead = expires.duration_since(SystemTime::now()).unwrap_or_default();
        if ahead.as_secs() > MAX_LIFETIME_SECS {
            return Err(CookieError::ExpiresTooFar);
        }
        cookie.push_str(&format!("; Expires={}", httpdate::fmt_http_date(expires)));
    }
    if options.http_only {
        cookie.push_str("; HttpOnly");
    }
    if options.secure {
        cookie.push_str("; Secure");
    }
    if let Some(same_site) = options.same_site {
        cookie.push_str(&format!("; SameSite={same_site}"));
    }
    if options.partitioned {
        if !options.secure {
            return Err(CookieError::PartitionedInsecure { name });
        }
        cookie.push_str("; Partitioned");
    }

    Ok(cookie)
}

fn is_token(name: &str) -> bool {
    !name.is_empty()
        && name.bytes().all(|b| (0x21..=0x7e).contains(&b) && !b"()<>@,;:\\\"/[]?={}".contains(&b))
}

/// All non-blank `Cookie` header lines of a request joined into one.
pub(crate) fn cookie_header(headers: &HeaderMap) -> Option<String> {
    let lines: Vec<&str> = headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .filter(|line| !line.trim().is_empty())
        .collect();
    (!lines.is_empty()).then(|| lines.join("; "))
}

/// A cookie value read from the jar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cookie {
    value: String,
}

impl Cookie {
    pub fn new<S: Into<String>>(value: S) -> Self {
        Self { value: value.into() }
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }

    /// # Errors
    ///
    /// Fails when the value is not JSON for `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_str(&self.value)
    }

    pub fn number(&self) -> Option<f64> {
        self.value.trim().parse().ok()
    }

    /// Any non-empty value is true.
    pub fn boolean(&self) -> bool {
        !self.value.is_empty()
    }
}

impl fmt::Display for Cookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

impl AsRef<str> for Cookie {
    fn as_ref(&self) -> &str {
        &self.value
    }
}

#[derive(Debug, Clone)]
struct Outgoing {
    value: String,
    options: CookieOptions,
    is_set: bool,
}

/// The cookie jar of one request.
#[derive(Debug, Default)]
pub struct Cookies {
    header: Option<String>,
    incoming: OnceCell<HashMap<String, String>>,
    outgoing: Vec<(String, Outgoing)>,
}

impl Cookies {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_headers(headers: &HeaderMap) -> Self {
        Self { header: cookie_header(headers), ..Self::default() }
    }

    pub fn get(&self, name: &str) -> Option<Cookie> {
        if let Some(outgoing) = self.outgoing(name) {
            return outgoing.is_set.then(|| Cookie::new(outgoing.value.clone()));
        }
        self.incoming().get(name).map(Cookie::new)
    }

    pub fn has(&self, name: &str) -> bool {
        match self.outgoing(name) {
            Some(outgoing) => outgoing.is_set,
            None => self.incoming().contains_key(name),
        }
    }

    pub fn set<S: Into<String>>(&mut self, name: &str, value: S, options: CookieOptions) {
        self.record(name, Outgoing { value: value.into(), options, is_set: true });
    }

    /// Stores `value` serialized as JSON.
    ///
    /// # Errors
    ///
    /// Fails when `value` can not be serialized.
    pub fn set_json<T: Serialize + ?Sized>(
        &mut self,
        name: &str,
        value: &T,
        options: CookieOptions,
    ) -> Result<(), serde_json::Error> {
        let json = serde_json::to_string(value)?;
        self.set(name, json, options);
        Ok(())
    }

    /// Expires the cookie in the browser. Only the `domain` and `path` of `options` are kept, they must match
    /// the ones the cookie was set with.
    pub fn delete(&mut self, name: &str, options: &CookieOptions) {
        let mut expired = CookieOptions::new().expires(UNIX_EPOCH);
        expired.domain.clone_from(&options.domain);
        expired.path.clone_from(&options.path);
        self.record(name, Outgoing { value: DELETED.to_string(), options: expired, is_set: false });
    }

    /// Readable cookies: inbound ones not shadowed by a delete, plus the ones set during this request.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Cookie)> + '_ {
        let inbound = self
            .incoming()
            .iter()
            .filter(|(name, _)| self.outgoing(name).is_none())
            .map(|(name, value)| (name.as_str(), Cookie::new(value.as_str())));
        let written = self
            .outgoing
            .iter()
            .filter(|(_, outgoing)| outgoing.is_set)
            .map(|(name, outgoing)| (name.as_str(), Cookie::new(outgoing.value.as_str())));
        inbound.chain(written)
    }

    /// One `Set-Cookie` value per cookie written or deleted during the request, in write order.
    ///
    /// # Errors
    ///
    /// Fails on the first cookie whose options can not be serialized.
    pub fn set_cookie_headers(&self) -> Result<Vec<String>, CookieError> {
        self.outgoing.iter().map(|(name, outgoing)| serialize(name, &outgoing.value, &outgoing.options)).collect()
    }

    fn incoming(&self) -> &HashMap<String, String> {
        self.incoming.get_or_init(|| {
            let mut cookies = HashMap::new();
            if let Some(header) = &self.header {
                for (name, value) in parse(header) {
                    cookies.entry(name).or_insert(value);
                }
            }
            cookies
        })
    }

    fn outgoing(&self, name: &str) -> Option<&Outgoing> {
        self.outgoing.iter().find(|(existing, _)| existing == name).map(|(_, outgoing)| outgoing)
    }

    fn record(&mut self, name: &str, outgoing: Outgoing) {
        match self.outgoing.iter_mut().find(|(existing, _)| existing == name) {
            Some((_, existing)) => *existing = outgoing,
            None => self.outgoing.push((name.to_string(), outgoing)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{parse, serialize, Cookie, CookieError, CookieOptions, CookiePrefix, Cookies, SameSite};
    use http::header::COOKIE;
    use http::{HeaderMap, HeaderValue};
    use serde::{Deserialize, Serialize};
    use std::time::{Duration, SystemTime, UNIX_EPOCH};

    fn jar(header: &'static str) -> Cookies {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static(header));
        Cookies::from_headers(&headers)
    }

    #[test]
    fn parse_decodes_and_unquotes() {
        let pairs = parse(r#"a=1; b="quoted"; c=hello%20world; broken; =empty"#);
        assert_eq!(
            pairs,
            vec![
                ("a".to_string(), "1".to_string()),
                ("b".to_string(), "quoted".to_string()),
                ("c".to_string(), "hello world".to_string()),
            ]
        );
    }

    #[test]
    fn parse_keeps_undecodable_value() {
        assert_eq!(parse("a=%FF"), vec![("a".to_string(), "%FF".to_string())]);
    }

    #[test]
    fn serialize_in_attribute_order() {
        let options = CookieOptions::new()
            .path("/")
            .domain("example.com")
            .max_age(Duration::from_secs(1000))
            .expires(UNIX_EPOCH)
            .http_only(true)
            .secure(true)
            .same_site(SameSite::Strict)
            .partitioned(true);
        let cookie = serialize("session", "a b;c", &options).unwrap();
        assert_eq!(
            cookie,
            "session=a%20b%3Bc; Max-Age=1000; Domain=example.com; Path=/; Expires=Thu, 01 Jan 1970 00:00:00 GMT; \
             HttpOnly; Secure; SameSite=Strict; Partitioned"
        );
    }

    #[test]
    fn secure_prefix_requires_secure() {
        let err = serialize("__Secure-id", "1", &CookieOptions::new()).unwrap_err();
        assert!(matches!(err, CookieError::SecurePrefix { .. }));
    }

    #[test]
    fn host_prefix_rules() {
        let secure = CookieOptions::new().secure(true);
        assert!(matches!(serialize("__Host-id", "1", &secure).unwrap_err(), CookieError::HostPrefixPath { .. }));

        let with_domain = secure.clone().path("/").domain("example.com");
        assert!(matches!(serialize("__Host-id", "1", &with_domain).unwrap_err(), CookieError::HostPrefixDomain { .. }));

        assert_eq!(serialize("__Host-id", "1", &secure.path("/")).unwrap(), "__Host-id=1; Path=/; Secure");
    }

    #[test]
    fn prefix_option_rewrites_name_and_attributes() {
        let options = CookieOptions::new().prefix(CookiePrefix::Host).domain("example.com");
        assert_eq!(serialize("id", "1", &options).unwrap(), "__Host-id=1; Path=/; Secure");

        let options = CookieOptions::new().prefix(CookiePrefix::Secure);
        assert_eq!(serialize("id", "1", &options).unwrap(), "__Secure-id=1; Secure");
    }

    #[test]
    fn lifetime_is_capped() {
        let too_long = CookieOptions::new().max_age(Duration::from_secs(34_560_001));
        assert_eq!(serialize("a", "1", &too_long).unwrap_err(), CookieError::MaxAgeTooLong);

        let far = SystemTime::now() + Duration::from_secs(401 * 24 * 60 * 60);
        let too_far = CookieOptions::new().expires(far);
        assert_eq!(serialize("a", "1", &too_far).unwrap_err(), CookieError::ExpiresTooFar);
    }

    #[test]
    fn partitioned_requires_secure() {
        let err = serialize("a", "1", &CookieOptions::new().partitioned(true)).unwrap_err();
        assert!(matches!(err, CookieError::PartitionedInsecure { .. }));
    }

    #[test]
    fn invalid_name_is_rejected() {
        assert!(matches!(serialize("a b", "1", &CookieOptions::new()), Err(CookieError::InvalidName { .. })));
    }

    #[test]
    fn inbound_first_occurrence_wins() {
        let cookies = jar("hello=world; hello=again; n=42");
        assert_eq!(cookies.get("hello"), Some(Cookie::new("world")));
        assert_eq!(cookies.get("n").unwrap().number(), Some(42.0));
        assert!(cookies.has("n"));
        assert!(!cookies.has("missing"));
    }

    #[test]
    fn delete_shadows_inbound_cookie() {
        let mut cookies = jar("hello=world; other=1");
        cookies.delete("hello", &CookieOptions::new().path("/").secure(true));

        assert!(!cookies.has("hello"));
        assert_eq!(cookies.get("hello"), None);
        assert_eq!(
            cookies.set_cookie_headers().unwrap(),
            vec!["hello=deleted; Path=/; Expires=Thu, 01 Jan 1970 00:00:00 GMT".to_string()]
        );

        let names: Vec<_> = cookies.iter().map(|(name, _)| name.to_string()).collect();
        assert_eq!(names, vec!["other".to_string()]);
    }

    #[test]
    fn set_after_delete_is_readable_again() {
        let mut cookies = Cookies::new();
        cookies.delete("a", &CookieOptions::new());
        cookies.set("a", "2", CookieOptions::new());

        assert_eq!(cookies.get("a").unwrap().as_str(), "2");
        assert_eq!(cookies.set_cookie_headers().unwrap(), vec!["a=2".to_string()]);
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Prefs {
        theme: String,
    }

    #[test]
    fn json_cookie_round_trip_through_header() {
        let mut cookies = Cookies::new();
        cookies.set_json("prefs", &Prefs { theme: "dark".into() }, CookieOptions::new()).unwrap();
        let header = cookies.set_cookie_headers().unwrap().remove(0);

        let (pair, _) = header.split_once(';').unwrap_or((header.as_str(), ""));
        let parsed = parse(pair);
        let prefs: Prefs = Cookie::new(parsed[0].1.clone()).json().unwrap();
        assert_eq!(prefs, Prefs { theme: "dark".into() });
    }

    #[test]
    fn boolean_is_non_empty() {
        assert!(Cookie::new("false").boolean());
        assert!(!Cookie::new("").boolean());
    }
}
