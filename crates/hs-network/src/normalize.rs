//! Request URL normalization.

use percent_encoding::percent_decode_str;
use url::Url;

/// `scheme://host[:port]/decoded-path` with query and fragment dropped
///
/// A port written in the input is kept even when it is the scheme default.
/// The path is form-decoded (`+` becomes a space, `%XX` sequences are
/// decoded, invalid UTF-8 is replaced). Returns `None` for input that does
/// not parse as an absolute URL with a host.
pub fn format_url_without_query(raw: &str) -> Option<String> {
    let url = Url::parse(raw.trim()).ok()?;
    let host = url.host_str()?;

    let path = url.path().replace('+', " ");
    let decoded = percent_decode_str(&path).decode_utf8_lossy();

    let mut out = String::with_capacity(raw.len());
    out.push_str(url.scheme());
    out.push_str("://");
    out.push_str(host);
    if let Some(port) = url.port().or_else(|| written_port(raw.trim())) {
        out.push(':');
        out.push_str(&port.to_string());
    }
    out.push_str(&decoded);
    Some(out)
}

/// Port spelled out in the authority of `raw`, including a default one the
/// parser normalizes away
fn written_port(raw: &str) -> Option<u16> {
    let (_, rest) = raw.split_once("://")?;
    let authority = rest.split(['/', '?', '#']).next()?;
    let host_port = authority.rsplit('@').next()?;
    let (host, port) = host_port.rsplit_once(':')?;
    if host.starts_with('[') && !host.ends_with(']') {
        return None;
    }
    port.parse().ok()
}

/// Host of an absolute URL, lowercased by the parser
pub fn extract_host(raw: &str) -> Option<String> {
    Url::parse(raw.trim())
        .ok()
        .and_then(|url| url.host_str().map(str::to_string))
}
