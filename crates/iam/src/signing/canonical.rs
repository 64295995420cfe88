//! Canonical signing string for draft-cavage HTTP signatures.

use http::header::HOST;
use http::{Method, Request, Uri};

use super::REQUEST_TARGET;

/// Generic headers followed by the body headers when the body is signed.
pub fn signing_headers<'a>(
    generic_headers: &'a [String],
    body_headers: &'a [String],
    hash_body: bool,
) -> Vec<&'a str> {
    let mut headers: Vec<&str> = generic_headers.iter().map(String::as_str).collect();
    if hash_body {
        headers.extend(body_headers.iter().map(String::as_str));
    }
    headers
}

/// `"<lowercase method> <path and query>"`.
pub fn request_target(method: &Method, uri: &Uri) -> String {
    let path_and_query = uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .filter(|pq| !pq.is_empty())
        .unwrap_or("/");
    format!("{} {}", method.as_str().to_ascii_lowercase(), path_and_query)
}

/// Build the string that gets signed: one `name: value` line per header, in
/// the given order, joined by `\n` with no trailing newline.
///
/// Headers missing from the request render with an empty value.
pub fn signing_string<B>(request: &Request<B>, headers: &[&str]) -> String {
    headers
        .iter()
        .map(|name| {
            let name = name.to_ascii_lowercase();
            let value = match name.as_str() {
                REQUEST_TARGET => request_target(request.method(), request.uri()),
                "host" => host(request),
                _ => header_value(request, &name),
            };
            format!("{name}: {value}")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn host<B>(request: &Request<B>) -> String {
    let uri = request.uri();
    match uri.host() {
        Some(host) if !host.is_empty() => match uri.port_u16() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        },
        _ => header_value(request, HOST.as_str()),
    }
}

fn header_value<B>(request: &Request<B>, name: &str) -> String {
    request
        .headers()
        .get(name)
        .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned())
        .unwrap_or_default()
}
