use std::time::Duration;

use bytes::Bytes;
use http::header::{HeaderMap, HeaderName, HeaderValue};

use crate::error::{Error, Result};
use crate::util::{host_header_value, is_supported_scheme};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    /// Response headers (lowercased header names). Multiple values are joined with ", ".
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl HttpResponse {
    pub fn body_utf8(&self) -> Option<&str> {
        std::str::from_utf8(&self.body).ok()
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// A validated, reusable request. Built once and sent many times, so the URL
/// and headers are parsed up front.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub(crate) method: http::Method,
    pub(crate) uri: hyper::Uri,
    pub(crate) host: HeaderValue,
    pub(crate) headers: HeaderMap,
    pub(crate) timeout: Option<Duration>,
}

impl HttpRequest {
    pub fn get(url: &str) -> Result<Self> {
        let parsed = url::Url::parse(url).map_err(|_| Error::InvalidUrl(url.to_string()))?;
        if !is_supported_scheme(&parsed) {
            return Err(Error::UnsupportedScheme(url.to_string()));
        }

        let host = host_header_value(&parsed).ok_or_else(|| Error::InvalidUrl(url.to_string()))?;
        let uri: hyper::Uri = parsed
            .as_str()
            .parse()
            .map_err(|_| Error::InvalidUrl(url.to_string()))?;

        Ok(Self {
            method: http::Method::GET,
            uri,
            host: HeaderValue::from_str(&host)?,
            headers: HeaderMap::new(),
            timeout: None,
        })
    }

    /// Adds a header. Repeated names are sent as repeated header lines.
    #[must_use]
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    /// Overrides the `Host` header while still connecting to the URL's authority.
    pub fn with_host(mut self, host: &str) -> Result<Self> {
        self.host = HeaderValue::from_str(host)?;
        Ok(self)
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_rejects_bad_urls() {
        assert!(matches!(HttpRequest::get("not a url"), Err(Error::InvalidUrl(_))));
        assert!(matches!(
            HttpRequest::get("ftp://example.com/file"),
            Err(Error::UnsupportedScheme(_))
        ));
    }

    #[test]
    fn with_host_rejects_control_characters() {
        let req = HttpRequest::get("http://a/").unwrap_or_else(|e| panic!("request: {e}"));
        assert!(matches!(req.with_host("bad\nhost"), Err(Error::HeaderValue(_))));
    }
}
