//! Per-stream cursor shapes, per spec.md §3. Stored untagged in the KV
//! store so each stream's JSON shape on disk matches exactly one of the
//! three variants below, without an explicit discriminator field.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cursor {
    SimpleTime(SimpleTimeCursor),
    WindowedPaginated(WindowedPaginatedCursor),
    PageOffset(PageOffsetCursor),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimpleTimeCursor {
    pub last_time_epoch: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WindowedPaginatedCursor {
    pub last_time_epoch: f64,
    pub page_num: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time_epoch: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time_epoch: Option<f64>,
}

impl WindowedPaginatedCursor {
    pub fn closed(last_time_epoch: f64) -> Self {
        WindowedPaginatedCursor {
            last_time_epoch,
            page_num: 0,
            start_time_epoch: None,
            end_time_epoch: None,
        }
    }

    pub fn resuming(last_time_epoch: f64, page_num: u32, start: f64, end: f64) -> Self {
        WindowedPaginatedCursor {
            last_time_epoch,
            page_num,
            start_time_epoch: Some(start),
            end_time_epoch: Some(end),
        }
    }

    pub fn is_window_closed(&self) -> bool {
        self.page_num == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageOffsetCursor {
    pub page_num: u32,
    pub last_page_offset: u32,
}

impl Default for PageOffsetCursor {
    fn default() -> Self {
        PageOffsetCursor {
            page_num: 1,
            last_page_offset: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_time_roundtrips_through_json() {
        let cursor = Cursor::SimpleTime(SimpleTimeCursor {
            last_time_epoch: 1_700_000_000.001,
        });
        let encoded = serde_json::to_value(cursor).unwrap();
        assert_eq!(encoded, serde_json::json!({"last_time_epoch": 1_700_000_000.001}));
        let decoded: Cursor = serde_json::from_value(encoded).unwrap();
        assert_eq!(decoded, cursor);
    }

    #[test]
    fn windowed_paginated_roundtrips_with_optional_fields_absent() {
        let cursor = Cursor::WindowedPaginated(WindowedPaginatedCursor::closed(42.0));
        let encoded = serde_json::to_value(cursor).unwrap();
        assert_eq!(encoded, serde_json::json!({"last_time_epoch": 42.0, "page_num": 0}));
    }

    #[test]
    fn page_offset_is_distinguishable_from_simple_time() {
        let cursor = Cursor::PageOffset(PageOffsetCursor {
            page_num: 2,
            last_page_offset: 37,
        });
        let encoded = serde_json::to_value(cursor).unwrap();
        let decoded: Cursor = serde_json::from_value(encoded).unwrap();
        assert_eq!(decoded, cursor);
    }
}
