//! Alerts adapter, per spec.md §4.8's Alerts row: monotonic page-offset
//! pagination without time filtering.

use std::collections::HashMap;
use std::time::Duration;

use http::Accept;
use sink::{Element, SendOptions};

use crate::adapter::{AlertsAdapter, FetchRequest, Identity};
use crate::parser::event;

pub struct Alerts {
    pub project_id: String,
    pub base_url: String,
    pub page_size: u32,
}

impl Identity for Alerts {
    fn key(&self) -> String {
        format!("{}-alerts", self.project_id)
    }

    /// Unused: alerts pagination has no time filtering, so there is no
    /// publication-delay decision to make.
    fn publication_delay(&self) -> Duration {
        Duration::ZERO
    }
}

impl AlertsAdapter for Alerts {
    fn build_fetch_params(&self, page_num: u32) -> FetchRequest {
        FetchRequest {
            url: format!("{}/groups/{}/alerts", self.base_url, self.project_id),
            query: vec![
                ("pageNum".to_string(), page_num.to_string()),
                ("itemsPerPage".to_string(), self.page_size.to_string()),
            ],
            accept: Accept::Json,
        }
    }

    fn send_options(&self) -> SendOptions {
        let mut extra_headers = HashMap::new();
        extra_headers.insert("X-Sumo-Name".to_string(), "alerts".to_string());
        SendOptions {
            extra_headers,
            endpoint_key: Some(sink::EndpointKey::Logs),
            jsondump: true,
            pathname: Some("alerts.json".to_string()),
        }
    }

    fn transform(&self, raw: http::ClientResponse) -> anyhow::Result<Vec<Element>> {
        let body = raw
            .into_json()
            .ok_or_else(|| anyhow::anyhow!("alerts response was not json"))?;
        let parsed = event::parse(&body, 0.0)?;
        Ok(parsed.records.into_iter().map(Element::Json).collect())
    }

    fn page_size(&self) -> u32 {
        self.page_size
    }
}
