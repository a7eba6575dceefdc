//! Buffered view of an inbound request as seen by the rule engine.
//!
//! The HTTP adapter reads the body exactly once and hands the core an
//! [`IncomingRequest`]; every rule of a chain and every template pass then
//! borrows the same buffer, so the body stays re-readable for the whole
//! request.
use std::borrow::Cow;

use bytes::Bytes;
use http::{HeaderMap, Method, Uri, header};

/// Ordered, multi-valued `name=value` parameters (query string or form body).
///
/// Names and values are kept as the decoded bytes, so values in a legacy
/// charset reach templates unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params(Vec<(Vec<u8>, Vec<u8>)>);

impl Params {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Decode an `application/x-www-form-urlencoded` byte string.
    ///
    /// `+` becomes a space and `%XX` escapes are decoded; malformed escapes
    /// are kept literally.
    pub fn from_urlencoded(input: &[u8]) -> Self {
        Self(
            input
                .split(|b| *b == b'&')
                .filter(|segment| !segment.is_empty())
                .map(|segment| {
                    let (name, value) = match segment.iter().position(|b| *b == b'=') {
                        Some(i) => (&segment[..i], &segment[i + 1..]),
                        None => (segment, &b""[..]),
                    };
                    (decode_component(name), decode_component(value))
                })
                .collect(),
        )
    }

    /// All values recorded for `name`, in request order.
    pub fn values<'a>(&'a self, name: &[u8]) -> impl Iterator<Item = &'a [u8]> {
        self.0
            .iter()
            .filter(move |(key, _)| key.as_slice() == name)
            .map(|(_, value)| value.as_slice())
    }

    /// The value of `name` when it was given exactly once.
    pub fn single(&self, name: &[u8]) -> Option<&[u8]> {
        let mut values = self.values(name);
        match (values.next(), values.next()) {
            (Some(value), None) => Some(value),
            _ => None,
        }
    }
}

fn decode_component(raw: &[u8]) -> Vec<u8> {
    let spaced: Cow<'_, [u8]> = if raw.contains(&b'+') {
        Cow::Owned(
            raw.iter()
                .map(|&b| if b == b'+' { b' ' } else { b })
                .collect(),
        )
    } else {
        Cow::Borrowed(raw)
    };
    urlencoding::decode_binary(&spaced).into_owned()
}

/// Inbound request with its body fully buffered.
#[derive(Debug, Clone)]
pub struct IncomingRequest {
    pub query: Params,
    /// Query string exactly as received, without the leading `?`.
    pub raw_query: String,
    pub form: Params,
    pub body: Bytes,
}

impl IncomingRequest {
    /// Build the request view from its parts.
    ///
    /// Form fields are only decoded for `POST`, `PUT` and `PATCH` requests
    /// carrying an `application/x-www-form-urlencoded` body; otherwise the
    /// form is empty and `%FORM[..]%` directives render as empty strings.
    pub fn from_parts(method: &Method, uri: &Uri, headers: &HeaderMap, body: Bytes) -> Self {
        let raw_query = uri.query().unwrap_or_default().to_string();
        let query = Params::from_urlencoded(raw_query.as_bytes());

        let form = if Self::carries_form(method, headers) {
            Params::from_urlencoded(&body)
        } else {
            Params::new()
        };

        Self {
            query,
            raw_query,
            form,
            body,
        }
    }

    fn carries_form(method: &Method, headers: &HeaderMap) -> bool {
        if !matches!(*method, Method::POST | Method::PUT | Method::PATCH) {
            return false;
        }
        headers
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split(';').next())
            .is_some_and(|mime| {
                mime.trim()
                    .eq_ignore_ascii_case("application/x-www-form-urlencoded")
            })
    }
}

#[cfg(test)]
mod tests {
    use http::HeaderValue;

    use super::*;

    #[test]
    fn test_single_value_lookup() {
        let params = Params::from_urlencoded(b"q1=value1&q2=a&q2=b&empty=&flag");
        assert_eq!(params.single(b"q1"), Some(&b"value1"[..]));
        assert_eq!(params.single(b"q2"), None);
        assert_eq!(params.single(b"missing"), None);
        assert_eq!(params.single(b"empty"), Some(&b""[..]));
        assert_eq!(params.single(b"flag"), Some(&b""[..]));
        assert_eq!(
            params.values(b"q2").collect::<Vec<_>>(),
            vec![&b"a"[..], &b"b"[..]]
        );
    }

    #[test]
    fn test_percent_decoding() {
        let params = Params::from_urlencoded(b"name=hello+world&x=%3Ctest%3E&bad=%zz");
        assert_eq!(params.single(b"name"), Some(&b"hello world"[..]));
        assert_eq!(params.single(b"x"), Some(&b"<test>"[..]));
        assert_eq!(params.single(b"bad"), Some(&b"%zz"[..]));
    }

    #[test]
    fn test_non_utf8_values_keep_their_bytes() {
        // "привет" in cp1251
        let params = Params::from_urlencoded(b"q=%EF%F0%E8%E2%E5%F2&raw=%FF%FE");
        assert_eq!(
            params.single(b"q"),
            Some(&[0xEF, 0xF0, 0xE8, 0xE2, 0xE5, 0xF2][..])
        );
        assert_eq!(params.single(b"raw"), Some(&[0xFF, 0xFE][..]));
    }

    #[test]
    fn test_form_decoded_only_for_urlencoded_posts() {
        let uri: Uri = "/submit?q=1&q2=%FF".parse().unwrap();
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/x-www-form-urlencoded; charset=utf-8"),
        );

        let post = IncomingRequest::from_parts(
            &Method::POST,
            &uri,
            &headers,
            Bytes::from_static(b"field=abc"),
        );
        assert_eq!(post.form.single(b"field"), Some(&b"abc"[..]));
        assert_eq!(post.query.single(b"q"), Some(&b"1"[..]));
        assert_eq!(post.raw_query, "q=1&q2=%FF");

        let get = IncomingRequest::from_parts(
            &Method::GET,
            &uri,
            &headers,
            Bytes::from_static(b"field=abc"),
        );
        assert_eq!(get.form, Params::new());

        let plain = IncomingRequest::from_parts(
            &Method::POST,
            &uri,
            &HeaderMap::new(),
            Bytes::from_static(b"field=abc"),
        );
        assert_eq!(plain.form, Params::new());
        assert_eq!(plain.body, Bytes::from_static(b"field=abc"));
    }

    #[test]
    fn test_missing_query_is_empty() {
        let uri: Uri = "/plain".parse().unwrap();
        let request =
            IncomingRequest::from_parts(&Method::GET, &uri, &HeaderMap::new(), Bytes::new());
        assert_eq!(request.raw_query, "");
        assert_eq!(request.query, Params::new());
    }
}
