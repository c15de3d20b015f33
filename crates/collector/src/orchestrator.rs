//! Ties discovery and the task list together into one invocation, per
//! spec.md §4.9. Grounded in `main.py::MongoDBAtlasCollector.run` and
//! `build_task_params`.

use std::sync::Arc;

use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tokio::sync::Semaphore;
use tracing::{info, warn};

use config::{MetricKind, StreamKind};

use crate::adapter::{AlertsAdapter, PaginatedAdapter, SingleFetchAdapter};
use crate::adapters::{
    alerts::Alerts, database_metrics::DatabaseMetrics, disk_metrics::DiskMetrics, log::Log,
    org_events::OrgEvents, process_metrics::ProcessMetrics, project_events::ProjectEvents,
};
use crate::adapter::Identity;
use crate::discovery::Discovery;
use crate::driver::{self, Outcome};
use crate::engine::Engine;

const SINGLE_PROCESS_LOCK_KEY: &str = "is_mongodbatlascollector_running";

const DATABASE_LOG_FILES: [&str; 2] = ["mongodb.gz", "mongos.gz"];
const AUDIT_LOG_FILES: [&str; 2] = ["mongodb-audit-log.gz", "mongos-audit-log.gz"];

enum Task {
    SingleFetch(Box<dyn SingleFetchAdapter>),
    Paginated(Box<dyn PaginatedAdapter>),
    Alerts(Box<dyn AlertsAdapter>),
}

impl Task {
    fn key(&self) -> String {
        match self {
            Task::SingleFetch(a) => a.key(),
            Task::Paginated(a) => a.key(),
            Task::Alerts(a) => a.key(),
        }
    }

    async fn run(&self, engine: &Engine) -> Outcome {
        match self {
            Task::SingleFetch(a) => driver::single_fetch::run(a.as_ref(), engine).await,
            Task::Paginated(a) => driver::paginated::run(a.as_ref(), engine).await,
            Task::Alerts(a) => driver::alerts::run(a.as_ref(), engine).await,
        }
    }
}

/// Runs one collection invocation: acquires the single-instance lock,
/// discovers topology, builds and shuffles the task list, runs it through a
/// bounded worker pool, then releases the lock and closes the sink.
///
/// Returns an error only for startup-fatal conditions (lock contention is
/// NOT one of those — a lock held by another instance is a normal, quiet
/// exit) or when no task was produced at all, which spec.md §4.9 treats as
/// a misconfiguration.
pub async fn run(engine: Arc<Engine>) -> anyhow::Result<()> {
    if !acquire_single_instance_lock(&engine).await? {
        info!("another collector instance holds the lock, exiting");
        return Ok(());
    }

    let result = run_tasks(Arc::clone(&engine)).await;

    if let Err(err) = engine.kv.release_lock(SINGLE_PROCESS_LOCK_KEY).await {
        warn!(error = %err, "failed releasing single-instance lock");
    }
    if let Err(err) = engine.sink.close().await {
        warn!(error = %err, "failed closing sink");
    }

    result
}

async fn acquire_single_instance_lock(engine: &Engine) -> anyhow::Result<bool> {
    if engine.kv.acquire_lock(SINGLE_PROCESS_LOCK_KEY).await? {
        return Ok(true);
    }

    let expiry = chrono::Duration::minutes(
        engine.config.collection.single_instance_lock_expiry_minutes,
    );
    if engine
        .kv
        .release_lock_if_expired(SINGLE_PROCESS_LOCK_KEY, expiry)
        .await?
    {
        return Ok(engine.kv.acquire_lock(SINGLE_PROCESS_LOCK_KEY).await?);
    }

    Ok(false)
}

async fn run_tasks(engine: Arc<Engine>) -> anyhow::Result<()> {
    let mut tasks = build_tasks(&engine).await?;
    if tasks.is_empty() {
        anyhow::bail!(
            "no streams produced any task; check Collection.enabled_streams and discovery results"
        );
    }

    let mut rng = SmallRng::from_entropy();
    tasks.shuffle(&mut rng);

    let semaphore = Arc::new(Semaphore::new(engine.config.collection.num_workers.max(1)));
    let mut handles = Vec::with_capacity(tasks.len());

    for task in tasks {
        let semaphore = Arc::clone(&semaphore);
        let engine = Arc::clone(&engine);
        handles.push(tokio::spawn(async move {
            let _permit = semaphore
                .acquire_owned()
                .await
                .expect("semaphore is never closed while workers are running");
            let key = task.key();
            let outcome = task.run(&engine).await;
            match &outcome {
                Outcome::Done => info!(key = %key, "stream completed"),
                Outcome::Failed(reason) => {
                    warn!(key = %key, reason = %reason, "stream failed, will resume next run")
                }
            }
        }));
    }

    for handle in handles {
        handle
            .await
            .map_err(|err| anyhow::anyhow!("worker task panicked: {err}"))?;
    }

    Ok(())
}

async fn build_tasks(engine: &Engine) -> anyhow::Result<Vec<Task>> {
    let streams = &engine.config.collection.enabled_streams;
    let base_url = engine.config.mongodb_atlas.base_url.clone();
    let project_id = engine.config.mongodb_atlas.project_id.clone();
    let page_size = engine.config.collection.page_size;

    let discovery = Discovery::new(engine);
    let mut tasks = Vec::new();

    let needs_processes = streams.iter().any(|s| {
        matches!(
            s,
            StreamKind::DatabaseLog
                | StreamKind::AuditLog
                | StreamKind::ProcessMetrics
                | StreamKind::DiskMetrics
                | StreamKind::DatabaseMetrics
        )
    });

    let (process_ids, hostnames) = if needs_processes {
        discovery.process_names().await?
    } else {
        (Vec::new(), Vec::new())
    };
    let cluster_mapping = if needs_processes {
        discovery.cluster_mapping().await?
    } else {
        Default::default()
    };

    for stream in streams {
        match stream {
            StreamKind::DatabaseLog => {
                for hostname in &hostnames {
                    for filename in DATABASE_LOG_FILES {
                        tasks.push(Task::SingleFetch(Box::new(Log {
                            project_id: project_id.clone(),
                            base_url: base_url.clone(),
                            hostname: hostname.clone(),
                            filename: filename.to_string(),
                            cluster_mapping: cluster_mapping.clone(),
                        })));
                    }
                }
            }
            StreamKind::AuditLog => {
                for hostname in &hostnames {
                    for filename in AUDIT_LOG_FILES {
                        tasks.push(Task::SingleFetch(Box::new(Log {
                            project_id: project_id.clone(),
                            base_url: base_url.clone(),
                            hostname: hostname.clone(),
                            filename: filename.to_string(),
                            cluster_mapping: cluster_mapping.clone(),
                        })));
                    }
                }
            }
            StreamKind::ProjectEvents => {
                tasks.push(Task::Paginated(Box::new(ProjectEvents {
                    project_id: project_id.clone(),
                    base_url: base_url.clone(),
                    page_size,
                })));
            }
            StreamKind::OrgEvents => {
                if let Some(org_id) = &engine.config.mongodb_atlas.org_id {
                    tasks.push(Task::Paginated(Box::new(OrgEvents {
                        org_id: org_id.clone(),
                        base_url: base_url.clone(),
                        page_size,
                    })));
                } else {
                    warn!("OrgEvents enabled but no org_id configured, skipping");
                }
            }
            StreamKind::Alerts => {
                tasks.push(Task::Alerts(Box::new(Alerts {
                    project_id: project_id.clone(),
                    base_url: base_url.clone(),
                    page_size,
                })));
            }
            StreamKind::ProcessMetrics => {
                let metric_names = engine
                    .config
                    .collection
                    .metric_names
                    .get(&MetricKind::Process)
                    .cloned()
                    .unwrap_or_default();
                for process_id in &process_ids {
                    tasks.push(Task::SingleFetch(Box::new(ProcessMetrics {
                        project_id: project_id.clone(),
                        base_url: base_url.clone(),
                        process_id: process_id.clone(),
                        metric_names: metric_names.clone(),
                        cluster_mapping: cluster_mapping.clone(),
                    })));
                }
            }
            StreamKind::DiskMetrics => {
                let metric_names = engine
                    .config
                    .collection
                    .metric_names
                    .get(&MetricKind::Disk)
                    .cloned()
                    .unwrap_or_default();
                let disk_names = discovery.disk_names(&process_ids).await?;
                for process_id in &process_ids {
                    for disk_name in &disk_names {
                        tasks.push(Task::SingleFetch(Box::new(DiskMetrics {
                            project_id: project_id.clone(),
                            base_url: base_url.clone(),
                            process_id: process_id.clone(),
                            disk_name: disk_name.clone(),
                            metric_names: metric_names.clone(),
                            cluster_mapping: cluster_mapping.clone(),
                        })));
                    }
                }
            }
            StreamKind::DatabaseMetrics => {
                let metric_names = engine
                    .config
                    .collection
                    .metric_names
                    .get(&MetricKind::Database)
                    .cloned()
                    .unwrap_or_default();
                let database_names = discovery.database_names(&process_ids).await?;
                for process_id in &process_ids {
                    for database_name in &database_names {
                        tasks.push(Task::SingleFetch(Box::new(DatabaseMetrics {
                            project_id: project_id.clone(),
                            base_url: base_url.clone(),
                            process_id: process_id.clone(),
                            database_name: database_name.clone(),
                            metric_names: metric_names.clone(),
                            cluster_mapping: cluster_mapping.clone(),
                        })));
                    }
                }
            }
        }
    }

    Ok(tasks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::time::Duration;

    use config::{Collection, Config, Environment, Logging, MongoDbAtlas, SumoLogic};

    fn sample_config(enabled_streams: Vec<StreamKind>) -> Config {
        Config {
            mongodb_atlas: MongoDbAtlas {
                public_key: "pub".into(),
                private_key: "priv".into(),
                project_id: "proj".into(),
                org_id: None,
                base_url: "https://cloud.mongodb.com/api/atlas/v1.0".into(),
                cluster_names: Vec::new(),
            },
            collection: Collection {
                enabled_streams,
                metric_names: HashMap::new(),
                page_size: 100,
                timeout: Duration::from_secs(30),
                max_retry: 3,
                backoff_factor: 0.3,
                num_workers: 4,
                backfill_days: 1,
                end_time_safety_offset_seconds: 60,
                min_request_window_length: 300,
                max_request_window_length: 3600,
                data_refresh_ttl_ms: 3_600_000,
                max_payload_bytesize: 1_000_000,
                compressed: true,
                single_instance_lock_expiry_minutes: 10,
                environment: Environment::OnHost,
            },
            logging: Logging {
                level: "info".into(),
            },
            sumo_logic: SumoLogic {
                logs_endpoint: "https://example.invalid/logs".into(),
                metrics_endpoint: "https://example.invalid/metrics".into(),
            },
        }
    }

    fn test_engine(enabled_streams: Vec<StreamKind>) -> Engine {
        Engine::new(
            sample_config(enabled_streams),
            Arc::new(kv::memory::MemoryStore::default()),
            Arc::new(sink::stdout::StdoutSink::new()),
        )
    }

    #[tokio::test]
    async fn single_instance_lock_is_mutually_exclusive() {
        let engine = test_engine(vec![StreamKind::Alerts]);
        assert!(acquire_single_instance_lock(&engine).await.unwrap());
        assert!(!acquire_single_instance_lock(&engine).await.unwrap());
    }

    #[tokio::test]
    async fn expired_lock_is_force_released_and_reacquired() {
        let engine = test_engine(vec![StreamKind::Alerts]);
        engine.kv.acquire_lock(SINGLE_PROCESS_LOCK_KEY).await.unwrap();
        engine
            .kv
            .release_lock_if_expired(SINGLE_PROCESS_LOCK_KEY, chrono::Duration::seconds(-1))
            .await
            .unwrap();
        assert!(acquire_single_instance_lock(&engine).await.unwrap());
    }

    #[tokio::test]
    async fn build_tasks_covers_project_scoped_streams_without_discovery() {
        let engine = test_engine(vec![StreamKind::ProjectEvents, StreamKind::Alerts]);
        let tasks = build_tasks(&engine).await.unwrap();
        assert_eq!(tasks.len(), 2);
    }

    #[tokio::test]
    async fn build_tasks_is_empty_when_org_events_has_no_org_id_configured() {
        let engine = test_engine(vec![StreamKind::OrgEvents]);
        let tasks = build_tasks(&engine).await.unwrap();
        assert!(tasks.is_empty());
    }
}
