//! Template rendering for rule responses and outbound payloads.
//!
//! A template is plain text with embedded directives:
//!
//! | Directive              | Replaced with                                             |
//! |------------------------|-----------------------------------------------------------|
//! | `%QUERY[name]%`        | the query parameter `name`, if given exactly once         |
//! | `%FORM[name]%`         | the url-encoded form field `name`, if given exactly once  |
//! | `%REGEX[pattern][n]%`  | capture group `n` of the first match of `pattern` in body |
//! | `%BODY%`               | the raw request body                                      |
//!
//! Directives are applied as successive passes in the order above, and each
//! pass scans the output of the previous one. A query value that itself
//! contains `%BODY%` therefore expands in the last pass. `%REGEX%` always
//! searches the original request body, never the partially rendered text.
//!
//! Rendering never fails. Problems with a `%REGEX%` directive yield an empty
//! substitution and a [`TemplateError`] in [`Rendered::errors`] for the caller
//! to log.
use bytes::Bytes;
use once_cell::sync::Lazy;
use regex::bytes::{Captures, NoExpand, Regex};
use thiserror::Error;

use crate::core::request::{IncomingRequest, Params};

static QUERY_RX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"%QUERY\[([^\]]+)\]%").expect("valid QUERY directive pattern"));
static FORM_RX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"%FORM\[([^\]]+)\]%").expect("valid FORM directive pattern"));
static REGEX_RX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"%REGEX\[(.+?)\]\[(\d+)\]%").expect("valid REGEX directive pattern")
});
static BODY_RX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"%BODY%").expect("valid BODY directive pattern"));

/// Non-fatal problem encountered while expanding a directive.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TemplateError {
    #[error("invalid regular expression '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("regular expression is not valid UTF-8")]
    NonUtf8Pattern,

    #[error("invalid capture group index '{index}'")]
    InvalidGroupIndex { index: String },

    #[error("regular expression '{pattern}' does not match the request body")]
    NoMatch { pattern: String },

    #[error("regular expression '{pattern}' has no capture group {group}")]
    MissingGroup { pattern: String, group: usize },
}

/// Output of a render: the bytes plus any non-fatal directive errors.
#[derive(Debug, Default)]
pub struct Rendered {
    pub body: Bytes,
    pub errors: Vec<TemplateError>,
}

/// The substitution directives, in their fixed pass order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive {
    Query,
    Form,
    Regex,
    Body,
}

impl Directive {
    /// Later passes rely on earlier passes having run; do not reorder.
    pub const PASS_ORDER: [Directive; 4] = [
        Directive::Query,
        Directive::Form,
        Directive::Regex,
        Directive::Body,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Directive::Query => "QUERY",
            Directive::Form => "FORM",
            Directive::Regex => "REGEX",
            Directive::Body => "BODY",
        }
    }

    /// Run this directive's pass over `input`.
    pub fn apply(
        self,
        input: &[u8],
        query: &Params,
        form: &Params,
        body: &[u8],
        errors: &mut Vec<TemplateError>,
    ) -> Vec<u8> {
        match self {
            Directive::Query => substitute_param(&QUERY_RX, input, query),
            Directive::Form => substitute_param(&FORM_RX, input, form),
            Directive::Regex => REGEX_RX
                .replace_all(input, |caps: &Captures<'_>| {
                    match extract(&caps[1], &caps[2], body) {
                        Ok(value) => value,
                        Err(e) => {
                            errors.push(e);
                            Vec::new()
                        }
                    }
                })
                .into_owned(),
            Directive::Body => BODY_RX.replace_all(input, NoExpand(body)).into_owned(),
        }
    }
}

fn substitute_param(rx: &Regex, input: &[u8], params: &Params) -> Vec<u8> {
    rx.replace_all(input, |caps: &Captures<'_>| {
        params
            .single(&caps[1])
            .map(<[u8]>::to_vec)
            .unwrap_or_default()
    })
    .into_owned()
}

/// Evaluate one `%REGEX[pattern][group]%` directive against the request body.
fn extract(pattern: &[u8], group: &[u8], body: &[u8]) -> Result<Vec<u8>, TemplateError> {
    let pattern = std::str::from_utf8(pattern).map_err(|_| TemplateError::NonUtf8Pattern)?;
    let search = Regex::new(pattern).map_err(|source| TemplateError::InvalidPattern {
        pattern: pattern.to_string(),
        source,
    })?;
    let group_text = String::from_utf8_lossy(group);
    let group: usize = group_text
        .parse()
        .map_err(|_| TemplateError::InvalidGroupIndex {
            index: group_text.to_string(),
        })?;

    if body.is_empty() {
        return Ok(Vec::new());
    }

    let caps = search
        .captures(body)
        .ok_or_else(|| TemplateError::NoMatch {
            pattern: pattern.to_string(),
        })?;
    if group >= caps.len() {
        return Err(TemplateError::MissingGroup {
            pattern: pattern.to_string(),
            group,
        });
    }
    // A group that exists but did not participate in the match renders empty.
    Ok(caps
        .get(group)
        .map(|m| m.as_bytes().to_vec())
        .unwrap_or_default())
}

/// Render `template` against the request's query, form fields and raw body.
pub fn render(template: &[u8], query: &Params, form: &Params, body: &[u8]) -> Rendered {
    let mut errors = Vec::new();
    let mut output = template.to_vec();
    for directive in Directive::PASS_ORDER {
        output = directive.apply(&output, query, form, body, &mut errors);
    }
    Rendered {
        body: Bytes::from(output),
        errors,
    }
}

/// Convenience wrapper around [`render`] for a buffered request.
pub fn render_request(template: &[u8], request: &IncomingRequest) -> Rendered {
    render(template, &request.query, &request.form, &request.body)
}

/// Check the `%REGEX%` patterns of a template without rendering it.
///
/// Used by configuration validation to surface broken inline templates at
/// startup instead of on the first matching request.
pub fn check_patterns(template: &[u8]) -> Vec<TemplateError> {
    REGEX_RX
        .captures_iter(template)
        .filter_map(|caps| match std::str::from_utf8(&caps[1]) {
            Ok(pattern) => Regex::new(pattern)
                .err()
                .map(|source| TemplateError::InvalidPattern {
                    pattern: pattern.to_string(),
                    source,
                }),
            Err(_) => Some(TemplateError::NonUtf8Pattern),
        })
        .collect()
}
