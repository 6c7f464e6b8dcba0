// Source adapters for employer career APIs and the runner that drives them.

pub mod amazon;
pub mod jpmc;
pub mod microsoft;
pub mod runner;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::config::SourceArgs;
use crate::error::{ExtractError, TransportError};
use crate::models::job::CollectedJob;

const USER_AGENT: &str = concat!("jobwatch/", env!("CARGO_PKG_VERSION"));

/// One page of raw items from a source.
#[derive(Debug, Clone, Default)]
pub struct RawPage {
    pub items: Vec<Value>,
    /// `Some(false)` when the response shows there is nothing after this
    /// page. `None` when the source does not say.
    pub has_more: Option<bool>,
}

impl RawPage {
    /// Empty page, which terminates pagination.
    pub fn end() -> Self {
        RawPage {
            items: Vec::new(),
            has_more: Some(false),
        }
    }

    /// Decode a response body. A body that is not JSON is treated as the
    /// end of the result set, not as a transport failure.
    pub fn parse(
        source: &str,
        body: &[u8],
        shape: impl FnOnce(&Value) -> RawPage,
    ) -> RawPage {
        match serde_json::from_slice::<Value>(body) {
            Ok(data) => shape(&data),
            Err(e) => {
                tracing::warn!(source, "Malformed page, stopping pagination: {e}");
                RawPage::end()
            }
        }
    }

    /// `has_more` from a total-hits counter, if the response carries one.
    pub fn more_than(total: Option<u64>, offset: usize, len: usize) -> Option<bool> {
        total.map(|t| ((offset + len) as u64) < t)
    }
}

/// Trait that all job sources implement.
///
/// A source paginates one search term (or the whole feed when it takes no
/// terms) and turns each raw item into a `CollectedJob`. Pagination,
/// recency filtering and dedup live in `runner`.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Short name used in logs, config and the digest.
    fn name(&self) -> &str;

    /// Search terms to run one at a time. `[None]` means a single unfiltered pass.
    fn terms(&self) -> Vec<Option<String>>;

    /// Fetch one page starting at `offset`.
    async fn fetch(&self, term: Option<&str>, offset: usize) -> Result<RawPage, TransportError>;

    /// Parse one raw item. Failure is isolated to that item.
    fn extract(&self, raw: &Value, term: Option<&str>) -> Result<CollectedJob, ExtractError>;
}

/// Minimal HTTP surface the adapters need, so tests can script responses.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn get(&self, url: &str, query: &[(&str, String)]) -> Result<Vec<u8>, TransportError>;
}

/// Shared reqwest client with a per-request timeout.
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()?;
        Ok(ReqwestTransport { client })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get(&self, url: &str, query: &[(&str, String)]) -> Result<Vec<u8>, TransportError> {
        let resp = self
            .client
            .get(url)
            .header("Accept", "application/json")
            .query(query)
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(TransportError::Status {
                status: resp.status().as_u16(),
                url: resp.url().to_string(),
            });
        }

        Ok(resp.bytes().await?.to_vec())
    }
}

pub const SOURCE_NAMES: [&str; 3] = [microsoft::NAME, amazon::NAME, jpmc::NAME];

/// Look up a source by name and build it from the configured settings.
pub fn get_collector(
    name: &str,
    args: &SourceArgs,
    transport: Arc<dyn HttpTransport>,
) -> Option<Arc<dyn SourceAdapter>> {
    match name {
        microsoft::NAME => Some(Arc::new(microsoft::Microsoft::new(
            args.microsoft_settings(),
            transport,
        ))),
        amazon::NAME => Some(Arc::new(amazon::Amazon::new(args.amazon_settings(), transport))),
        jpmc::NAME => Some(Arc::new(jpmc::Jpmc::new(args.jpmc_settings(), transport))),
        _ => None,
    }
}

/// Sources for this cycle: the named ones, or all when none are named.
pub fn build_collectors(
    only: &[String],
    args: &SourceArgs,
    transport: Arc<dyn HttpTransport>,
) -> anyhow::Result<Vec<Arc<dyn SourceAdapter>>> {
    let names: Vec<&str> = if only.is_empty() {
        SOURCE_NAMES.to_vec()
    } else {
        only.iter().map(String::as_str).collect()
    };

    names
        .into_iter()
        .map(|name| {
            get_collector(name, args, transport.clone())
                .ok_or_else(|| anyhow::anyhow!("Unknown source: {name}"))
        })
        .collect()
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use super::*;

    /// Records each request and replays scripted bodies in order.
    /// Once the script runs out every request gets `{}`.
    #[derive(Default)]
    pub struct ScriptedTransport {
        responses: Mutex<VecDeque<Result<Vec<u8>, u16>>>,
        pub requests: Mutex<Vec<(String, Vec<(String, String)>)>>,
    }

    impl ScriptedTransport {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn push_json(&self, body: Value) {
            self.push_raw(body.to_string().into_bytes());
        }

        pub fn push_raw(&self, body: Vec<u8>) {
            self.responses.lock().unwrap().push_back(Ok(body));
        }

        pub fn push_status(&self, status: u16) {
            self.responses.lock().unwrap().push_back(Err(status));
        }

        /// Value of a query parameter on the n-th request.
        pub fn param(&self, n: usize, key: &str) -> Option<String> {
            let requests = self.requests.lock().unwrap();
            requests[n]
                .1
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.clone())
        }

        pub fn request_count(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl HttpTransport for ScriptedTransport {
        async fn get(
            &self,
            url: &str,
            query: &[(&str, String)],
        ) -> Result<Vec<u8>, TransportError> {
            self.requests.lock().unwrap().push((
                url.to_string(),
                query
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.clone()))
                    .collect(),
            ));
            match self.responses.lock().unwrap().pop_front() {
                Some(Ok(body)) => Ok(body),
                Some(Err(status)) => Err(TransportError::Status {
                    status,
                    url: url.to_string(),
                }),
                None => Ok(b"{}".to_vec()),
            }
        }
    }
}
