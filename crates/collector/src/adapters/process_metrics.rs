//! Process metrics adapter, per spec.md §4.8's ProcessMetrics row.

use std::collections::HashMap;
use std::time::Duration;

use chrono::SecondsFormat;
use http::Accept;
use sink::{Element, SendOptions};

use crate::adapter::{FetchRequest, Identity, SingleFetchAdapter};
use crate::parser::metric::{self, Qualifier};
use crate::time::epoch_to_datetime;

const GRANULARITY: &str = "PT1M";

pub struct ProcessMetrics {
    pub project_id: String,
    pub base_url: String,
    pub process_id: String,
    pub metric_names: Vec<String>,
    pub cluster_mapping: HashMap<String, String>,
}

impl Identity for ProcessMetrics {
    fn key(&self) -> String {
        format!("{}-{}-processmetrics", self.project_id, self.process_id)
    }

    fn publication_delay(&self) -> Duration {
        Duration::from_secs(20 * 60)
    }
}

impl SingleFetchAdapter for ProcessMetrics {
    fn build_fetch_params(&self, start: f64, end: f64) -> FetchRequest {
        let mut query = vec![
            (
                "start".to_string(),
                epoch_to_datetime(start).to_rfc3339_opts(SecondsFormat::Millis, true),
            ),
            (
                "end".to_string(),
                epoch_to_datetime(end).to_rfc3339_opts(SecondsFormat::Millis, true),
            ),
            ("granularity".to_string(), GRANULARITY.to_string()),
        ];
        for name in &self.metric_names {
            query.push(("m".to_string(), name.clone()));
        }
        FetchRequest {
            url: format!(
                "{}/groups/{}/processes/{}/measurements",
                self.base_url, self.project_id, self.process_id
            ),
            query,
            accept: Accept::Json,
        }
    }

    fn send_options(&self) -> SendOptions {
        let mut extra_headers = HashMap::new();
        extra_headers.insert(
            "Content-Type".to_string(),
            "application/vnd.sumologic.carbon2".to_string(),
        );
        SendOptions {
            extra_headers,
            endpoint_key: Some(sink::EndpointKey::Metrics),
            jsondump: false,
            pathname: Some("process_metrics.log".to_string()),
        }
    }

    fn transform(&self, raw: http::ClientResponse) -> anyhow::Result<(Vec<Element>, Option<f64>)> {
        let body = raw
            .into_json()
            .ok_or_else(|| anyhow::anyhow!("measurements response was not json"))?;
        let parsed = metric::parse(&body, Qualifier::None, &self.cluster_mapping, 0.0)?;
        if parsed.lines.is_empty() {
            return Ok((Vec::new(), None));
        }
        let elements = parsed.lines.into_iter().map(Element::Text).collect();
        Ok((elements, Some(parsed.last_time_epoch)))
    }

    fn moving_window_delta(&self) -> f64 {
        crate::time::MOVING_WINDOW_DELTA_MS
    }
}
