//! HookShield Network
//!
//! Per-request block decisions for the hooked DNS, HTTP, OkHttp and WebView
//! paths, backed by the rule matching engine.

mod events;
mod interceptor;
mod normalize;

pub use events::{EventChannel, EventFeed, RequestDetails, RequestEvent, cidr_notation};
pub use interceptor::{
    InterceptResult, InterceptorConfig, InterceptorStats, RequestInterceptor, RequestKind, StatsSnapshot,
};
pub use normalize::{extract_host, format_url_without_query};
