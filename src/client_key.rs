//! Client identity for rate limiting.
//!
//! The caller's IP is taken from the proxy headers closest to the edge first:
//! `cf-connecting-ip`, then `x-real-ip`, then the first hop listed in
//! `x-forwarded-for`. Callers with none of these share the `unknown` bucket.

use axum::http::HeaderMap;
use std::collections::HashMap;

pub const UNKNOWN_CLIENT: &str = "unknown";

const CF_CONNECTING_IP: &str = "cf-connecting-ip";
const X_REAL_IP: &str = "x-real-ip";
const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// Anything a client IP can be read from. Header names are lowercase.
pub trait HeaderSource {
    fn header(&self, name: &str) -> Option<&str>;
}

impl HeaderSource for HeaderMap {
    fn header(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(|v| v.to_str().ok())
    }
}

impl HeaderSource for HashMap<String, String> {
    fn header(&self, name: &str) -> Option<&str> {
        self.get(name).map(String::as_str)
    }
}

fn non_empty(value: &str) -> Option<&str> {
    let value = value.trim();
    (!value.is_empty()).then_some(value)
}

/// Best-effort client IP, or [`UNKNOWN_CLIENT`].
pub fn client_ip<H: HeaderSource + ?Sized>(headers: &H) -> &str {
    headers
        .header(CF_CONNECTING_IP)
        .and_then(non_empty)
        .or_else(|| headers.header(X_REAL_IP).and_then(non_empty))
        .or_else(|| {
            headers
                .header(X_FORWARDED_FOR)
                .and_then(|list| list.split(',').next())
                .and_then(non_empty)
        })
        .unwrap_or(UNKNOWN_CLIENT)
}

/// Key under which `action` attempts from this caller are counted.
pub fn client_key<H: HeaderSource + ?Sized>(action: &str, headers: &H) -> String {
    format!("{}:{}", action, client_ip(headers))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn forwarded_for_uses_first_hop() {
        let h = headers(&[("x-forwarded-for", "1.2.3.4, 5.6.7.8")]);
        assert_eq!(client_ip(&h), "1.2.3.4");
    }

    #[test]
    fn no_headers_is_unknown() {
        let h = headers(&[]);
        assert_eq!(client_ip(&h), UNKNOWN_CLIENT);
        assert_eq!(client_key("like", &h), "like:unknown");
    }

    #[test]
    fn edge_header_wins() {
        let h = headers(&[
            ("cf-connecting-ip", "9.9.9.9"),
            ("x-real-ip", "8.8.8.8"),
            ("x-forwarded-for", "1.2.3.4"),
        ]);
        assert_eq!(client_ip(&h), "9.9.9.9");

        let h = headers(&[("x-real-ip", " 8.8.8.8 "), ("x-forwarded-for", "1.2.3.4")]);
        assert_eq!(client_ip(&h), "8.8.8.8");
    }

    #[test]
    fn empty_values_fall_through() {
        let h = headers(&[("cf-connecting-ip", ""), ("x-forwarded-for", "  7.7.7.7 ,1.1.1.1")]);
        assert_eq!(client_ip(&h), "7.7.7.7");
    }

    #[test]
    fn reads_http_header_map() {
        let mut h = HeaderMap::new();
        h.insert("x-real-ip", "10.0.0.1".parse().unwrap());
        assert_eq!(client_key("recipe-create", &h), "recipe-create:10.0.0.1");
    }
}
