use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::collectors::{HttpTransport, RawPage, SourceAdapter};
use crate::error::{ExtractError, TransportError};
use crate::models::job::{CollectedJob, JobIdentity};
use crate::normalize::{id_value, parse_timestamp, resolve_link, str_value};

pub const NAME: &str = "microsoft";
const COMPANY: &str = "Microsoft";
const ID_PREFIX: &str = "ms";

#[derive(Debug, Clone)]
pub struct MicrosoftSettings {
    pub base_url: String,
    pub terms: Vec<String>,
    pub location: String,
    pub distance_miles: u32,
}

impl Default for MicrosoftSettings {
    fn default() -> Self {
        Self {
            base_url: "https://apply.careers.microsoft.com".to_string(),
            terms: Vec::new(),
            location: String::new(),
            distance_miles: 160,
        }
    }
}

/// Microsoft careers search (`/api/pcsx/search`). One request per term;
/// results live under `data.positions`.
pub struct Microsoft {
    settings: MicrosoftSettings,
    transport: Arc<dyn HttpTransport>,
}

impl Microsoft {
    pub fn new(settings: MicrosoftSettings, transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            settings,
            transport,
        }
    }
}

#[async_trait]
impl SourceAdapter for Microsoft {
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
        let url = format!("{}/api/pcsx/search", self.settings.base_url);
        let mut query = vec![
            ("domain", "microsoft.com".to_string()),
            ("start", offset.to_string()),
            ("sort_by", "distance".to_string()),
            ("filter_distance", self.settings.distance_miles.to_string()),
            ("filter_include_remote", "1".to_string()),
        ];
        if let Some(term) = term {
            query.push(("query", term.to_string()));
        }
        if !self.settings.location.is_empty() {
            query.push(("location", self.settings.location.clone()));
        }

        let body = self.transport.get(&url, &query).await?;
        Ok(RawPage::parse(NAME, &body, |data| parse_page(data, offset)))
    }

    fn extract(&self, raw: &Value, term: Option<&str>) -> Result<CollectedJob, ExtractError> {
        let title = str_value(raw, "name").ok_or(ExtractError::MissingField("name"))?;
        let posted_at = parse_timestamp(
            raw.get("postedTs")
                .ok_or(ExtractError::MissingField("postedTs"))?,
        )?;
        let path = str_value(raw, "positionUrl").ok_or(ExtractError::MissingField("positionUrl"))?;
        let link = resolve_link(&self.settings.base_url, path)?;

        let identity = match id_value(raw.get("id")) {
            Some(id) => JobIdentity::native(ID_PREFIX, &id),
            None => JobIdentity::derived(ID_PREFIX, COMPANY, title),
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

fn parse_page(data: &Value, offset: usize) -> RawPage {
    let inner = data.get("data");
    let items = inner
        .and_then(|d| d.get("positions"))
        .and_then(|v| v.as_array())
        .cloned()
        .unwrap_or_default();
    let total = inner.and_then(|d| d.get("count")).and_then(|v| v.as_u64());

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

    fn adapter(transport: Arc<ScriptedTransport>) -> Microsoft {
        Microsoft::new(
            MicrosoftSettings {
                terms: vec!["Data".to_string(), "Azure".to_string()],
                location: "India, Telangana, Hyderabad".to_string(),
                ..MicrosoftSettings::default()
            },
            transport,
        )
    }

    #[test]
    fn extracts_position() {
        let ms = adapter(Arc::new(ScriptedTransport::new()));
        let raw = json!({
            "id": 1970393556642386_u64,
            "name": "Senior Data Engineer",
            "postedTs": 1771113600,
            "positionUrl": "/careers/job/1970393556642386"
        });

        let job = ms.extract(&raw, Some("Data")).unwrap();
        assert_eq!(job.identity.as_str(), "ms_1970393556642386");
        assert_eq!(job.company, "Microsoft");
        assert_eq!(job.title, "Senior Data Engineer");
        assert_eq!(
            job.link,
            "https://apply.careers.microsoft.com/careers/job/1970393556642386"
        );
        assert_eq!(job.source_term, "Data");
        assert_eq!(job.posted_at.timestamp(), 1771113600);
    }

    #[test]
    fn missing_id_falls_back_to_derived_identity() {
        let ms = adapter(Arc::new(ScriptedTransport::new()));
        let raw = json!({
            "name": "Data Engineer",
            "postedTs": 1771113600,
            "positionUrl": "/careers/job/x"
        });
        let job = ms.extract(&raw, None).unwrap();
        assert_eq!(
            job.identity,
            JobIdentity::derived("ms", "Microsoft", "data engineer")
        );
    }

    #[test]
    fn missing_title_is_an_item_error() {
        let ms = adapter(Arc::new(ScriptedTransport::new()));
        let raw = json!({"id": 1, "postedTs": 1771113600, "positionUrl": "/x"});
        assert_eq!(
            ms.extract(&raw, None).unwrap_err(),
            ExtractError::MissingField("name")
        );
    }

    #[tokio::test]
    async fn fetch_sends_term_offset_and_location() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_json(json!({
            "data": {"positions": [{"id": 1}, {"id": 2}], "count": 12}
        }));
        let ms = adapter(transport.clone());

        let page = ms.fetch(Some("Azure"), 10).await.unwrap();
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.has_more, Some(false));
        assert_eq!(transport.param(0, "query").as_deref(), Some("Azure"));
        assert_eq!(transport.param(0, "start").as_deref(), Some("10"));
        assert_eq!(
            transport.param(0, "location").as_deref(),
            Some("India, Telangana, Hyderabad")
        );
    }

    #[tokio::test]
    async fn missing_positions_is_an_empty_page() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_json(json!({"data": {}}));
        let ms = adapter(transport);

        let page = ms.fetch(Some("Data"), 0).await.unwrap();
        assert!(page.items.is_empty());
    }

    #[tokio::test]
    async fn http_error_is_transport_error() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_status(503);
        let ms = adapter(transport);

        let err = ms.fetch(Some("Data"), 0).await.unwrap_err();
        assert!(matches!(err, TransportError::Status { status: 503, .. }));
    }
}
