//! Execution of the rule chain bound to an endpoint.
//!
//! Every rule in the chain renders its template against the same buffered
//! request. Only the last rule's result leaves the executor: either as a local
//! response (`to.url` empty) or as the body and target of an outbound request.
//! Earlier rules are rendered and their output dropped.
use std::sync::Arc;

use bytes::Bytes;

use crate::{
    config::models::{Rule, RuleTo},
    core::{request::IncomingRequest, template, template_cache::TemplateCache},
};

/// Where the final rule forwards its rendered body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyTarget {
    pub url: String,
    pub http_method: String,
    pub headers: Vec<String>,
}

/// Observable result of running a chain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChainOutcome {
    /// `Name: Value` lines of the final rule.
    pub headers: Vec<String>,
    pub body: Bytes,
    /// `Some` when the final rule forwards upstream.
    pub forward: Option<ProxyTarget>,
}

pub struct RuleExecutor {
    templates: Arc<TemplateCache>,
}

impl RuleExecutor {
    pub fn new(templates: Arc<TemplateCache>) -> Self {
        Self { templates }
    }

    /// Run `chain` against `request`.
    pub async fn execute(&self, chain: &[Rule], request: &IncomingRequest) -> ChainOutcome {
        let Some((last, intermediate)) = chain.split_last() else {
            return ChainOutcome::default();
        };

        for rule in intermediate {
            let _ = self.render_rule(rule, request).await;
        }

        let body = self.render_rule(last, request).await;
        let forward = (!last.to.is_local()).then(|| ProxyTarget {
            url: last.to.url.clone(),
            http_method: last.to.http_method.clone(),
            headers: last.to.headers.clone(),
        });

        ChainOutcome {
            headers: last.to.headers.clone(),
            body,
            forward,
        }
    }

    async fn render_rule(&self, rule: &Rule, request: &IncomingRequest) -> Bytes {
        let template = self.resolve_template(&rule.to).await;
        let rendered = template::render_request(&template, request);
        for error in &rendered.errors {
            tracing::warn!(
                path = %rule.from.path,
                error = %error,
                "Template directive substituted with an empty string"
            );
        }
        rendered.body
    }

    /// Inline data first, then the cached data file, else an empty template.
    async fn resolve_template(&self, to: &RuleTo) -> Bytes {
        if !to.data.is_empty() {
            return Bytes::copy_from_slice(to.data.as_bytes());
        }
        if to.data_file.is_empty() {
            return Bytes::new();
        }
        match self.templates.load(&to.data_file).await {
            Ok(contents) => contents,
            Err(e) => {
                tracing::error!("Failed to read template file {}: {}", to.data_file, e);
                Bytes::new()
            }
        }
    }
}
