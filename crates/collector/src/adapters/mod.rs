pub mod alerts;
pub mod database_metrics;
pub mod disk_metrics;
pub mod log;
pub mod org_events;
pub mod process_metrics;
pub mod project_events;
