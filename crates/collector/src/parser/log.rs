//! Decompresses and enriches gzipped MongoDB Atlas log downloads, per
//! spec.md §4.8 "Log parser details" and `api.py::LogAPI.transform_data`.

use std::collections::HashMap;
use std::io::{BufRead, BufReader};

use chrono::DateTime;
use flate2::read::GzDecoder;
use serde_json::Value;
use tracing::warn;

use crate::cluster;

pub struct ParsedLog {
    pub records: Vec<Value>,
    pub last_time_epoch: f64,
}

/// `filename` selects the timestamp field: audit logs nest it under `ts`,
/// normal `mongod`/`mongos` logs under `t`.
pub fn parse(
    gz_body: &[u8],
    project_id: &str,
    hostname: &str,
    filename: &str,
    cluster_mapping: &HashMap<String, String>,
    default_last_time_epoch: f64,
) -> anyhow::Result<ParsedLog> {
    let is_audit = filename.contains("audit");
    let timestamp_field = if is_audit { "ts" } else { "t" };

    let hostname_alias = cluster::replace_cluster_name(hostname, cluster_mapping);
    let cluster_name = cluster::cluster_name(&hostname_alias).to_string();

    let reader = BufReader::new(GzDecoder::new(gz_body));
    let mut records = Vec::new();
    let mut last_time_epoch = default_last_time_epoch;
    let mut carry = String::new();

    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let candidate = if carry.is_empty() {
            line
        } else {
            format!("{carry}{line}")
        };

        let mut msg: Value = match serde_json::from_str(&candidate) {
            Ok(msg) => {
                carry.clear();
                msg
            }
            Err(_) => {
                // Buffer and retry on the next line: the record may have
                // been split across two decoder reads.
                warn!(line_no, "buffering possibly multiline log record");
                carry = candidate;
                continue;
            }
        };

        let date_str = msg
            .get(timestamp_field)
            .and_then(|v| v.get("$date"))
            .and_then(|v| v.as_str())
            .map(str::to_string);

        let Some(date_str) = date_str else {
            warn!(line_no, field = timestamp_field, "log record missing timestamp field");
            continue;
        };

        let epoch = DateTime::parse_from_rfc3339(date_str.trim())
            .map(|dt| dt.timestamp_millis() as f64 / 1000.0)
            .unwrap_or(last_time_epoch);

        if let Value::Object(obj) = &mut msg {
            obj.insert("project_id".into(), Value::String(project_id.to_string()));
            obj.insert("hostname".into(), Value::String(hostname_alias.clone()));
            obj.insert("cluster_name".into(), Value::String(cluster_name.clone()));
            obj.insert("created".into(), Value::String(date_str));
        }

        last_time_epoch = epoch.max(last_time_epoch);
        records.push(msg);
    }

    Ok(ParsedLog {
        records,
        last_time_epoch,
    })
}

/// `db_logs.json` for normal logs, `db_auditlogs.json` for audit logs — used
/// to route output pathnames differently, per spec.md §4.8.
pub fn sink_pathname(filename: &str) -> &'static str {
    if filename.contains("audit") {
        "db_auditlogs.json"
    } else {
        "db_logs.json"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn gzip(lines: &[&str]) -> Vec<u8> {
        let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        for line in lines {
            writeln!(encoder, "{line}").unwrap();
        }
        encoder.finish().unwrap()
    }

    #[test]
    fn enriches_normal_log_lines() {
        let body = gzip(&[r#"{"t":{"$date":"2023-07-26T00:00:00.000Z"},"msg":"hi"}"#]);
        let mapping = HashMap::new();
        let parsed = parse(&body, "P", "c0-shard-00-00", "mongodb.gz", &mapping, 0.0).unwrap();
        assert_eq!(parsed.records.len(), 1);
        let rec = &parsed.records[0];
        assert_eq!(rec["project_id"], "P");
        assert_eq!(rec["hostname"], "c0-shard-00-00");
        assert_eq!(rec["cluster_name"], "c0");
        assert_eq!(rec["created"], "2023-07-26T00:00:00.000Z");
        assert_eq!(parsed.last_time_epoch, 1_690_329_600.0);
    }

    #[test]
    fn recovers_records_split_across_lines() {
        let whole = r#"{"t":{"$date":"2023-07-26T00:00:00.000Z"},"msg":"hi"}"#;
        let (first, second) = whole.split_at(whole.len() / 2);
        let body = gzip(&[first, second]);
        let mapping = HashMap::new();
        let parsed = parse(&body, "P", "host", "mongodb.gz", &mapping, 0.0).unwrap();
        assert_eq!(parsed.records.len(), 1);
        assert_eq!(parsed.records[0]["msg"], "hi");
    }

    #[test]
    fn audit_logs_use_the_ts_field_and_audit_pathname() {
        let body = gzip(&[r#"{"ts":{"$date":"2023-07-26T00:00:00.000Z"},"atype":"authenticate"}"#]);
        let mapping = HashMap::new();
        let parsed = parse(&body, "P", "host", "auditLog.gz", &mapping, 0.0).unwrap();
        assert_eq!(parsed.records.len(), 1);
        assert_eq!(sink_pathname("auditLog.gz"), "db_auditlogs.json");
        assert_eq!(sink_pathname("mongodb.gz"), "db_logs.json");
    }
}
