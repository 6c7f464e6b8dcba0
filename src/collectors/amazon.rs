use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::collectors::{HttpTransport, RawPage, SourceAdapter};
use crate::error::{ExtractError, TransportError};
use crate::models::job::{CollectedJob, JobIdentity};
use crate::normalize::{id_value, parse_timestamp, resolve_link, str_value};

pub const NAME: &str = "amazon";
const COMPANY: &str = "Amazon";

#[derive(Debug, Clone)]
pub struct AmazonSettings {
    pub base_url: String,
    pub terms: Vec<String>,
    pub location: String,
    pub page_size: usize,
}

impl Default for AmazonSettings {
    fn default() -> Self {
        Self {
            base_url: "https://www.amazon.jobs".to_string(),
            terms: Vec::new(),
            location: String::new(),
            page_size: 10,
        }
    }
}

/// amazon.jobs search (`/en/search.json`), results under `jobs`.
pub struct Amazon {
    settings: AmazonSettings,
    transport: Arc<dyn HttpTransport>,
}

impl Amazon {
    pub fn new(settings: AmazonSettings, transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            settings,
            transport,
        }
    }
}

#[async_trait]
impl SourceAdapter for Amazon {
    fn name(&self) -> &str {
        NAME
    }

    fn terms(&self) -> Vec<Option<String>> {
        if self.settings.terms.is_empty() {
            return vec![None];
        }
        self.settings.terms.iter().cloned().map(Some).collect()
    }

    async fn fetch(&self, term: Option<&str>, offset: usize) -> Result<RawPage, TransportError> {
        let url = format!("{}/en/search.json", self.settings.base_url);
        let mut query = vec![
            ("offset", offset.to_string()),
            ("result_limit", self.settings.page_size.to_string()),
            ("sort", "recent".to_string()),
            ("base_query", term.unwrap_or_default().to_string()),
        ];
        if !self.settings.location.is_empty() {
            query.push(("loc_query", self.settings.location.clone()));
        }

        let body = self.transport.get(&url, &query).await?;
        Ok(RawPage::parse(NAME, &body, |data| {
            let items = data
                .get("jobs")
                .and_then(|v| v.as_array())
                .cloned()
                .unwrap_or_default();
            let hits = data.get("hits").and_then(|v| v.as_u64());
            RawPage {
                has_more: RawPage::more_than(hits, offset, items.len()),
                items,
            }
        }))
    }

    fn extract(&self, raw: &Value, term: Option<&str>) -> Result<CollectedJob, ExtractError> {
        let title = str_value(raw, "title").ok_or(ExtractError::MissingField("title"))?;
        let posted_at = parse_timestamp(
            raw.get("updated_at")
                .ok_or(ExtractError::MissingField("updated_at"))?,
        )?;
        let path = str_value(raw, "job_path")
            .or_else(|| str_value(raw, "url"))
            .ok_or(ExtractError::MissingField("job_path"))?;
        let link = resolve_link(&self.settings.base_url, path)?;

        let identity = match id_value(raw.get("id")) {
            Some(id) => JobIdentity::native(NAME, &id),
            None => JobIdentity::derived(NAME, COMPANY, title),
        };

        Ok(CollectedJob {
            identity,
            source: NAME.to_string(),
            company: COMPANY.to_string(),
            title: title.to_string(),
            link,
            source_term: term.unwrap_or_default().to_string(),
            posted_at,
        })
    }
}
