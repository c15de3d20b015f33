//! Lazy cursor initialization and persistence shared by all three drivers,
//! per spec.md §3's "cursors are created lazily on first run with
//! `last_time_epoch = now − backfill_days·86400`" lifecycle rule.

use crate::cursor::{Cursor, PageOffsetCursor, SimpleTimeCursor, WindowedPaginatedCursor};

pub async fn load_simple_time(
    kv: &dyn kv::Store,
    key: &str,
    default_epoch: f64,
) -> anyhow::Result<SimpleTimeCursor> {
    match kv.get(key).await? {
        Some(value) => match serde_json::from_value::<Cursor>(value)? {
            Cursor::SimpleTime(cursor) => Ok(cursor),
            other => anyhow::bail!("cursor at {key} is not a simple-time cursor: {other:?}"),
        },
        None => Ok(SimpleTimeCursor {
            last_time_epoch: default_epoch,
        }),
    }
}

pub async fn save_simple_time(
    kv: &dyn kv::Store,
    key: &str,
    cursor: SimpleTimeCursor,
) -> anyhow::Result<()> {
    kv.set(key, serde_json::to_value(Cursor::SimpleTime(cursor))?)
        .await?;
    Ok(())
}

pub async fn load_windowed_paginated(
    kv: &dyn kv::Store,
    key: &str,
    default_epoch: f64,
) -> anyhow::Result<WindowedPaginatedCursor> {
    match kv.get(key).await? {
        Some(value) => match serde_json::from_value::<Cursor>(value)? {
            Cursor::WindowedPaginated(cursor) => Ok(cursor),
            other => anyhow::bail!("cursor at {key} is not a windowed-paginated cursor: {other:?}"),
        },
        None => Ok(WindowedPaginatedCursor::closed(default_epoch)),
    }
}

pub async fn save_windowed_paginated(
    kv: &dyn kv::Store,
    key: &str,
    cursor: WindowedPaginatedCursor,
) -> anyhow::Result<()> {
    kv.set(key, serde_json::to_value(Cursor::WindowedPaginated(cursor))?)
        .await?;
    Ok(())
}

pub async fn load_page_offset(kv: &dyn kv::Store, key: &str) -> anyhow::Result<PageOffsetCursor> {
    match kv.get(key).await? {
        Some(value) => match serde_json::from_value::<Cursor>(value)? {
            Cursor::PageOffset(cursor) => Ok(cursor),
            other => anyhow::bail!("cursor at {key} is not a page-offset cursor: {other:?}"),
        },
        None => Ok(PageOffsetCursor::default()),
    }
}

pub async fn save_page_offset(
    kv: &dyn kv::Store,
    key: &str,
    cursor: PageOffsetCursor,
) -> anyhow::Result<()> {
    kv.set(key, serde_json::to_value(Cursor::PageOffset(cursor))?)
        .await?;
    Ok(())
}
