//! Carbon2-style text-line formatting for process/disk/database metrics,
//! per spec.md §4.8 "Metric parser details" and `api.py`'s three
//! `transform_data` implementations, unified into one function parameterized
//! by the per-kind qualifier tag.

use std::collections::HashMap;

use chrono::DateTime;
use serde_json::Value;

use crate::cluster;

/// The extra tag a disk/database metric line carries beyond the common
/// `projectId`/`hostId`/`processId` set.
#[derive(Debug, Clone, Copy)]
pub enum Qualifier<'a> {
    None,
    Disk(&'a str),
    Database(&'a str),
}

pub struct ParsedMetrics {
    pub lines: Vec<String>,
    pub last_time_epoch: f64,
}

/// `body` is the raw `{measurements: [...], groupId, hostId, processId}`
/// response; datapoints with a null value contribute nothing, per spec.md
/// §8's "null skip" property.
pub fn parse(
    body: &Value,
    qualifier: Qualifier<'_>,
    cluster_mapping: &HashMap<String, String>,
    default_last_time_epoch: f64,
) -> anyhow::Result<ParsedMetrics> {
    let group_id = body
        .get("groupId")
        .and_then(Value::as_str)
        .unwrap_or_default();
    let raw_host_id = body.get("hostId").and_then(Value::as_str).unwrap_or_default();
    let raw_process_id = body
        .get("processId")
        .and_then(Value::as_str)
        .unwrap_or(raw_host_id);

    let host_id = cluster::replace_cluster_name(raw_host_id, cluster_mapping);
    let process_id = cluster::replace_cluster_name(raw_process_id, cluster_mapping);
    let cluster_name = cluster::cluster_name(&host_id).to_string();

    let mut lines = Vec::new();
    let mut last_time_epoch = default_last_time_epoch;

    let measurements = body.get("measurements").and_then(Value::as_array);
    for measurement in measurements.into_iter().flatten() {
        let name = measurement.get("name").and_then(Value::as_str).unwrap_or_default();
        let units = measurement.get("units").and_then(Value::as_str).unwrap_or_default();
        let datapoints = measurement.get("dataPoints").and_then(Value::as_array);

        for point in datapoints.into_iter().flatten() {
            let Some(value) = point.get("value") else {
                continue;
            };
            if value.is_null() {
                continue;
            }
            let Some(timestamp) = point.get("timestamp").and_then(Value::as_str) else {
                continue;
            };
            let Ok(parsed) = DateTime::parse_from_rfc3339(timestamp) else {
                continue;
            };
            let epoch = parsed.timestamp() as f64;

            let qualifier_tag = match qualifier {
                Qualifier::None => String::new(),
                Qualifier::Disk(partition) => format!("partitionName={partition} "),
                Qualifier::Database(database) => format!("databaseName={database} "),
            };

            lines.push(format!(
                "projectId={group_id} {qualifier_tag}hostId={host_id} processId={process_id} metric={name} units={units} cluster_name={cluster_name} {value} {epoch}"
            ));
            last_time_epoch = epoch.max(last_time_epoch);
        }
    }

    Ok(ParsedMetrics {
        lines,
        last_time_epoch,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_one_non_null_datapoint() {
        let body = serde_json::json!({
            "groupId": "P",
            "hostId": "c0-shard-00",
            "processId": "c0-shard-00",
            "measurements": [{
                "name": "CPU",
                "units": "%",
                "dataPoints": [{"timestamp": "2023-07-26T00:00:00Z", "value": 42}],
            }],
        });
        let parsed = parse(&body, Qualifier::None, &HashMap::new(), 0.0).unwrap();
        assert_eq!(parsed.lines.len(), 1);
        assert_eq!(
            parsed.lines[0],
            "projectId=P hostId=c0-shard-00 processId=c0-shard-00 metric=CPU units=% cluster_name=c0 42 1690329600"
        );
        assert_eq!(parsed.last_time_epoch, 1_690_329_600.0);
    }

    #[test]
    fn null_value_contributes_nothing() {
        let body = serde_json::json!({
            "groupId": "P",
            "hostId": "h",
            "processId": "h",
            "measurements": [{
                "name": "CPU",
                "units": "%",
                "dataPoints": [{"timestamp": "2023-07-26T00:00:00Z", "value": null}],
            }],
        });
        let parsed = parse(&body, Qualifier::None, &HashMap::new(), 5.0).unwrap();
        assert!(parsed.lines.is_empty());
        assert_eq!(parsed.last_time_epoch, 5.0);
    }

    #[test]
    fn disk_qualifier_is_inserted_before_host_id() {
        let body = serde_json::json!({
            "groupId": "P",
            "hostId": "h",
            "processId": "h",
            "measurements": [{
                "name": "DISK_UTIL",
                "units": "PERCENT",
                "dataPoints": [{"timestamp": "2023-07-26T00:00:00Z", "value": 1.5}],
            }],
        });
        let parsed = parse(&body, Qualifier::Disk("partition-0"), &HashMap::new(), 0.0).unwrap();
        assert!(parsed.lines[0].contains("partitionName=partition-0 hostId=h"));
    }
}
