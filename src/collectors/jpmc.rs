use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::collectors::{HttpTransport, RawPage, SourceAdapter};
use crate::error::{ExtractError, TransportError};
use crate::models::job::{CollectedJob, JobIdentity};
use crate::normalize::{id_value, parse_timestamp, str_value};

pub const NAME: &str = "jpmc";
const COMPANY: &str = "JP Morgan";

#[derive(Debug, Clone)]
pub struct JpmcSettings {
    pub base_url: String,
    pub site_number: String,
    pub terms: Vec<String>,
    pub location_id: String,
    pub radius_miles: u32,
    pub location_label: String,
    pub page_size: usize,
}

impl Default for JpmcSettings {
    fn default() -> Self {
        Self {
            base_url: "https://jpmc.fa.oraclecloud.com".to_string(),
            site_number: "CX_1001".to_string(),
            terms: Vec::new(),
            location_id: String::new(),
            radius_miles: 25,
            location_label: String::new(),
            page_size: 25,
        }
    }
}

/// JPMorgan Chase on Oracle HCM recruiting. Requisitions are nested under
/// `items[0].requisitionList`; links come from a fixed template.
pub struct Jpmc {
    settings: JpmcSettings,
    transport: Arc<dyn HttpTransport>,
}

impl Jpmc {
    pub fn new(settings: JpmcSettings, transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            settings,
            transport,
        }
    }

    fn finder(&self, term: Option<&str>) -> String {
        let s = &self.settings;
        let mut finder = format!("findReqs;siteNumber={}", s.site_number);
        if !s.location_id.is_empty() {
            finder.push_str(&format!(
                ",locationId={},radius={},radiusUnit=MI",
                s.location_id, s.radius_miles
            ));
        }
        if let Some(term) = term {
            finder.push_str(&format!(",keyword=\"{}\"", term.replace('"', "")));
        }
        finder
    }

    fn job_link(&self, id: &str) -> String {
        format!(
            "{}/hcmUI/CandidateExperience/en/sites/{}/job/{id}",
            self.settings.base_url, self.settings.site_number
        )
    }
}

#[async_trait]
impl SourceAdapter for Jpmc {
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
        let url = format!(
            "{}/hcmRestApi/resources/latest/recruitingCEJobRequisitions",
            self.settings.base_url
        );
        let query = [
            ("onlyData", "true".to_string()),
            ("limit", self.settings.page_size.to_string()),
            ("offset", offset.to_string()),
            ("finder", self.finder(term)),
        ];

        let body = self.transport.get(&url, &query).await?;
        Ok(RawPage::parse(NAME, &body, |data| parse_page(data, offset)))
    }

    fn extract(&self, raw: &Value, term: Option<&str>) -> Result<CollectedJob, ExtractError> {
        let title = str_value(raw, "Title").ok_or(ExtractError::MissingField("Title"))?;
        let posted_at = parse_timestamp(
            raw.get("PostedDate")
                .ok_or(ExtractError::MissingField("PostedDate"))?,
        )?;
        // The link is built from the id, so there is no fallback identity here.
        let id = id_value(raw.get("Id")).ok_or(ExtractError::MissingField("Id"))?;

        Ok(CollectedJob {
            identity: JobIdentity::native(NAME, &id),
            source: NAME.to_string(),
            company: COMPANY.to_string(),
            title: title.to_string(),
            link: self.job_link(&id),
            source_term: term.unwrap_or(self.settings.location_label.as_str()).to_string(),
            posted_at,
        })
    }
}

fn parse_page(data: &Value, offset: usize) -> RawPage {
    let Some(search) = data
        .get("items")
        .and_then(|v| v.as_array())
        .and_then(|items| items.first())
    else {
        return RawPage::end();
    };

    let items = search
        .get("requisitionList")
        .and_then(|v| v.as_array())
        .cloned()
        .unwrap_or_default();
    let total = search.get("TotalJobsCount").and_then(|v| v.as_u64());

    RawPage {
        has_more: RawPage::more_than(total, offset, items.len()),
        items,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collectors::testing::ScriptedTransport;
    use serde_json::json;

    fn adapter(transport: Arc<ScriptedTransport>, terms: Vec<String>) -> Jpmc {
        Jpmc::new(
            JpmcSettings {
                terms,
                location_id: "300000081155702".to_string(),
                location_label: "Hyderabad".to_string(),
                ..JpmcSettings::default()
            },
            transport,
        )
    }

    #[test]
    fn extracts_requisition_with_template_link() {
        let jpmc = adapter(Arc::new(ScriptedTransport::new()), Vec::new());
        let raw = json!({"Id": "210612345", "Title": "Data Engineer III", "PostedDate": "2026-02-15"});

        let job = jpmc.extract(&raw, None).unwrap();
        assert_eq!(job.identity.as_str(), "jpmc_210612345");
        assert_eq!(job.company, "JP Morgan");
        assert_eq!(
            job.link,
            "https://jpmc.fa.oraclecloud.com/hcmUI/CandidateExperience/en/sites/CX_1001/job/210612345"
        );
        assert_eq!(job.source_term, "Hyderabad");
        assert_eq!(job.posted_at.timestamp(), 1_771_113_600);
    }

    #[test]
    fn missing_id_is_an_item_error() {
        let jpmc = adapter(Arc::new(ScriptedTransport::new()), Vec::new());
        let raw = json!({"Title": "Analyst", "PostedDate": "2026-02-15"});
        assert_eq!(
            jpmc.extract(&raw, None).unwrap_err(),
            ExtractError::MissingField("Id")
        );
    }

    #[tokio::test]
    async fn fetch_builds_finder_and_reads_nested_list() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_json(json!({
            "items": [{"TotalJobsCount": 60, "requisitionList": [{"Id": "1"}, {"Id": "2"}]}],
            "hasMore": false
        }));
        let jpmc = adapter(transport.clone(), vec!["Data".to_string()]);

        let page = jpmc.fetch(Some("Data"), 25).await.unwrap();
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.has_more, Some(true));
        assert_eq!(transport.param(0, "offset").as_deref(), Some("25"));
        assert_eq!(
            transport.param(0, "finder").as_deref(),
            Some("findReqs;siteNumber=CX_1001,locationId=300000081155702,radius=25,radiusUnit=MI,keyword=\"Data\"")
        );
    }

    #[tokio::test]
    async fn empty_items_ends_pagination() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_json(json!({"items": []}));
        transport.push_json(json!({"items": [{"requisitionList": []}]}));
        let jpmc = adapter(transport, Vec::new());

        let first = jpmc.fetch(None, 0).await.unwrap();
        assert!(first.items.is_empty());
        assert_eq!(first.has_more, Some(false));

        let second = jpmc.fetch(None, 0).await.unwrap();
        assert!(second.items.is_empty());
    }
}
