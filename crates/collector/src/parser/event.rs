//! Pass-through enrichment for project/org events, per spec.md §4.8 "Event
//! parser details": each result is forwarded as-is and `last_time_epoch`
//! tracks the maximum `created` timestamp seen.

use chrono::DateTime;
use serde_json::Value;

pub struct ParsedEvents {
    pub records: Vec<Value>,
    pub last_time_epoch: f64,
}

pub fn parse(body: &Value, default_last_time_epoch: f64) -> anyhow::Result<ParsedEvents> {
    let mut records = Vec::new();
    let mut last_time_epoch = default_last_time_epoch;

    let results = body.get("results").and_then(Value::as_array);
    for event in results.into_iter().flatten() {
        if let Some(created) = event.get("created").and_then(Value::as_str) {
            if let Ok(parsed) = DateTime::parse_from_rfc3339(created) {
                last_time_epoch = (parsed.timestamp_millis() as f64 / 1000.0).max(last_time_epoch);
            }
        }
        records.push(event.clone());
    }

    Ok(ParsedEvents {
        records,
        last_time_epoch,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracks_max_created_timestamp() {
        let body = serde_json::json!({
            "results": [
                {"id": "1", "created": "2023-07-26T00:00:00.000Z"},
                {"id": "2", "created": "2023-07-26T00:05:00.000Z"},
            ]
        });
        let parsed = parse(&body, 0.0).unwrap();
        assert_eq!(parsed.records.len(), 2);
        assert_eq!(parsed.last_time_epoch, 1_690_329_900.0);
    }

    #[test]
    fn empty_results_leaves_cursor_unchanged() {
        let body = serde_json::json!({"results": []});
        let parsed = parse(&body, 42.0).unwrap();
        assert!(parsed.records.is_empty());
        assert_eq!(parsed.last_time_epoch, 42.0);
    }
}
