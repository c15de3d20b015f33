//! Log adapter: downloads a gzipped `mongod`/`mongos`/audit log file for one
//! host, per spec.md §4.8's Log row.

use std::collections::HashMap;
use std::time::Duration;

use http::Accept;
use sink::{Element, SendOptions};

use crate::adapter::{FetchRequest, Identity, SingleFetchAdapter};
use crate::parser;

pub struct Log {
    pub project_id: String,
    pub base_url: String,
    pub hostname: String,
    pub filename: String,
    pub cluster_mapping: HashMap<String, String>,
}

impl Identity for Log {
    fn key(&self) -> String {
        format!("{}-{}-{}", self.project_id, self.hostname, self.filename)
    }

    fn publication_delay(&self) -> Duration {
        Duration::from_secs(5 * 60)
    }
}

impl SingleFetchAdapter for Log {
    fn build_fetch_params(&self, start: f64, end: f64) -> FetchRequest {
        FetchRequest {
            url: format!(
                "{}/groups/{}/clusters/{}/logs/{}",
                self.base_url, self.project_id, self.hostname, self.filename
            ),
            query: vec![
                ("startDate".to_string(), (start.trunc() as i64).to_string()),
                ("endDate".to_string(), (end.trunc() as i64).to_string()),
            ],
            accept: Accept::Bytes,
        }
    }

    fn send_options(&self) -> SendOptions {
        let mut extra_headers = HashMap::new();
        extra_headers.insert("X-Sumo-Name".to_string(), self.filename.clone());
        SendOptions {
            extra_headers,
            endpoint_key: Some(sink::EndpointKey::Logs),
            jsondump: true,
            pathname: Some(parser::log::sink_pathname(&self.filename).to_string()),
        }
    }

    fn transform(&self, raw: http::ClientResponse) -> anyhow::Result<(Vec<Element>, Option<f64>)> {
        let body = raw
            .into_bytes()
            .ok_or_else(|| anyhow::anyhow!("log response was not a byte stream"))?;

        let parsed = parser::log::parse(
            &body,
            &self.project_id,
            &self.hostname,
            &self.filename,
            &self.cluster_mapping,
            0.0,
        )?;

        if parsed.records.is_empty() {
            return Ok((Vec::new(), None));
        }

        let elements = parsed.records.into_iter().map(Element::Json).collect();
        Ok((elements, Some(parsed.last_time_epoch)))
    }

    fn moving_window_delta(&self) -> f64 {
        crate::time::MOVING_WINDOW_DELTA_SEC
    }
}
