use async_trait::async_trait;
use reqwest::{Request, Response};

/// Transport used by [`HttpSource`](crate::source::HttpSource). Wrappers such as
/// [`BearerAuth`](super::BearerAuth) decorate a request before delegating.
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn execute(&self, req: Request) -> reqwest::Result<Response>;
}
