//! Project events adapter, per spec.md §4.8's ProjectEvents row.

use std::collections::HashMap;
use std::time::Duration;

use chrono::SecondsFormat;
use http::Accept;
use sink::{Element, SendOptions};

use crate::adapter::{FetchRequest, Identity, PaginatedAdapter};
use crate::parser::event;
use crate::time::epoch_to_datetime;

pub struct ProjectEvents {
    pub project_id: String,
    pub base_url: String,
    pub page_size: u32,
}

impl Identity for ProjectEvents {
    fn key(&self) -> String {
        format!("{}-projectevents", self.project_id)
    }

    fn publication_delay(&self) -> Duration {
        Duration::from_secs(5 * 60)
    }
}

impl PaginatedAdapter for ProjectEvents {
    fn build_fetch_params(&self, start: f64, end: f64, page_num: u32) -> FetchRequest {
        FetchRequest {
            url: format!("{}/groups/{}/events", self.base_url, self.project_id),
            query: vec![
                (
                    "minDate".to_string(),
                    epoch_to_datetime(start).to_rfc3339_opts(SecondsFormat::Millis, true),
                ),
                (
                    "maxDate".to_string(),
                    epoch_to_datetime(end).to_rfc3339_opts(SecondsFormat::Millis, true),
                ),
                ("pageNum".to_string(), page_num.to_string()),
                ("itemsPerPage".to_string(), self.page_size.to_string()),
            ],
            accept: Accept::Json,
        }
    }

    fn send_options(&self) -> SendOptions {
        let mut extra_headers = HashMap::new();
        extra_headers.insert("X-Sumo-Name".to_string(), "events".to_string());
        SendOptions {
            extra_headers,
            endpoint_key: Some(sink::EndpointKey::Logs),
            jsondump: true,
            pathname: Some("projectevents.json".to_string()),
        }
    }

    fn transform(&self, raw: http::ClientResponse) -> anyhow::Result<(Vec<Element>, Option<f64>)> {
        let body = raw
            .into_json()
            .ok_or_else(|| anyhow::anyhow!("events response was not json"))?;
        let parsed = event::parse(&body, 0.0)?;
        if parsed.records.is_empty() {
            return Ok((Vec::new(), None));
        }
        let elements = parsed.records.into_iter().map(Element::Json).collect();
        Ok((elements, Some(parsed.last_time_epoch)))
    }

    fn moving_window_delta(&self) -> f64 {
        crate::time::MOVING_WINDOW_DELTA_MS
    }
}
