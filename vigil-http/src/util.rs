pub(super) fn is_supported_scheme(parsed: &url::Url) -> bool {
    matches!(parsed.scheme(), "http" | "https")
}

/// `Host` header value for a URL, omitting the scheme's default port.
pub(super) fn host_header_value(parsed: &url::Url) -> Option<String> {
    let host = parsed.host_str()?;
    match parsed.port() {
        Some(port) => Some(format!("{host}:{port}")),
        None => Some(host.to_string()),
    }
}
