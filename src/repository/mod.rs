pub mod config;
pub mod http;
pub mod query;
pub mod rate_limit;
pub mod registry;
pub mod resolver;
pub mod retry;

pub use config::{
    CachePolicy, EndpointVars, Endpoints, QueryType, RateLimits, RepositoryConfig,
};
pub use http::{AttoHttpClient, HttpClient, HttpResponse};
pub use query::{QueryOptions, QueryService};
pub use rate_limit::{ConcurrencyLimiter, RequestThrottle, TokenBucket};
pub use registry::{ConfigurationIssue, RepositoryRegistry};
pub use resolver::{CodenameResolver, Resolution, ResolutionWarning};
pub use retry::RetryPolicy;
