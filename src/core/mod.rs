pub mod endpoint;
pub mod request;
pub mod rule_chain;
pub mod template;
pub mod template_cache;

pub use endpoint::{Endpoint, EndpointTable, build_endpoints};
pub use request::{IncomingRequest, Params};
pub use rule_chain::{ChainOutcome, ProxyTarget, RuleExecutor};
pub use template::{Directive, Rendered, TemplateError, render};
pub use template_cache::TemplateCache;
