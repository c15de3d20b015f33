//! Lists processes, disks, databases, and the cluster-alias map; caches
//! each with a TTL, per spec.md §4.10 and `main.py`'s
//! `_get_process_names`/`_get_disk_names`/`_get_database_names`/
//! `_get_all_processes_from_project`.

use std::collections::{HashMap, HashSet};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::cluster;
use crate::engine::Engine;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ProcessesCache {
    last_set_date_ms: i64,
    process_ids: Vec<String>,
    hostnames: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct NamesCache {
    last_set_date_ms: i64,
    values: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ClusterMappingCache {
    last_set_date_ms: i64,
    values: HashMap<String, String>,
}

fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

fn is_stale(last_set_date_ms: i64, ttl_ms: i64, empty: bool) -> bool {
    empty || now_ms() - last_set_date_ms > ttl_ms
}

/// Walks `url`'s `pageNum` pagination until a page returns no results or
/// the request fails, concatenating `results` across pages. Mirrors
/// `main.py::getpaginateddata`.
async fn paginate_all(
    client: &http::Client,
    url: &str,
    page_size: u32,
) -> anyhow::Result<Vec<serde_json::Value>> {
    let mut page_num = 1u32;
    let mut all_results = Vec::new();

    loop {
        let query = [
            ("pageNum".to_string(), page_num.to_string()),
            ("itemsPerPage".to_string(), page_size.to_string()),
        ];
        let raw = client.get(url, &query, http::Accept::Json).await?;
        let body = raw
            .into_json()
            .ok_or_else(|| anyhow::anyhow!("discovery response was not json"))?;
        let results = body
            .get("results")
            .and_then(serde_json::Value::as_array)
            .cloned()
            .unwrap_or_default();
        if results.is_empty() {
            break;
        }
        all_results.extend(results);
        page_num += 1;
    }

    Ok(all_results)
}

pub struct Discovery<'a> {
    engine: &'a Engine,
}

impl<'a> Discovery<'a> {
    pub fn new(engine: &'a Engine) -> Self {
        Discovery { engine }
    }

    fn ttl_ms(&self) -> i64 {
        self.engine.config.collection.data_refresh_ttl_ms
    }

    async fn cached<T: for<'de> Deserialize<'de>>(&self, key: &str) -> anyhow::Result<Option<T>> {
        match self.engine.kv.get(key).await? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    /// Returns `(process_ids, hostnames)`, refreshing the `processes` and
    /// `cluster_mapping` caches together if either is absent, stale, or empty.
    pub async fn process_names(&self) -> anyhow::Result<(Vec<String>, Vec<String>)> {
        let cached: Option<ProcessesCache> = self.cached("processes").await?;
        let needs_refresh = match &cached {
            None => true,
            Some(c) => is_stale(c.last_set_date_ms, self.ttl_ms(), c.process_ids.is_empty()),
        };

        let cache = if needs_refresh {
            self.refresh_processes().await?
        } else {
            cached.expect("checked above")
        };

        Ok((cache.process_ids, cache.hostnames))
    }

    pub async fn cluster_mapping(&self) -> anyhow::Result<HashMap<String, String>> {
        // Cluster mapping is always refreshed alongside processes, so simply
        // triggering process discovery first guarantees freshness.
        self.process_names().await?;
        let cached: Option<ClusterMappingCache> = self.cached("cluster_mapping").await?;
        Ok(cached.map(|c| c.values).unwrap_or_default())
    }

    async fn refresh_processes(&self) -> anyhow::Result<ProcessesCache> {
        let client = self.engine.http_client(self.engine.atlas_auth());
        let url = format!(
            "{}/groups/{}/processes",
            self.engine.config.mongodb_atlas.base_url, self.engine.config.mongodb_atlas.project_id
        );
        let results = paginate_all(&client, &url, self.engine.config.collection.page_size).await?;

        let user_clusters: HashSet<String> =
            self.engine.config.mongodb_atlas.cluster_names.iter().cloned().collect();

        let mut process_ids = HashSet::new();
        let mut hostnames = HashSet::new();
        let mut cluster_mapping = HashMap::new();

        for obj in &results {
            let hostname = obj.get("hostname").and_then(|v| v.as_str()).unwrap_or_default();
            let user_alias = obj.get("userAlias").and_then(|v| v.as_str()).unwrap_or(hostname);
            let id = obj.get("id").and_then(|v| v.as_str()).unwrap_or(hostname);
            let alias_cluster = cluster::cluster_name(user_alias).to_string();

            if !user_clusters.is_empty() && !user_clusters.contains(&alias_cluster) {
                continue;
            }

            process_ids.insert(id.to_string());
            hostnames.insert(hostname.to_string());
            cluster_mapping.insert(cluster::cluster_name(hostname).to_string(), alias_cluster);
        }

        if !user_clusters.is_empty() && cluster_mapping.is_empty() {
            anyhow::bail!(
                "none of the configured cluster names matched any discovered process alias"
            );
        }

        let processes = ProcessesCache {
            last_set_date_ms: now_ms(),
            process_ids: process_ids.into_iter().collect(),
            hostnames: hostnames.into_iter().collect(),
        };
        self.engine
            .kv
            .set("processes", serde_json::to_value(&processes)?)
            .await?;
        self.engine
            .kv
            .set(
                "cluster_mapping",
                serde_json::to_value(ClusterMappingCache {
                    last_set_date_ms: now_ms(),
                    values: cluster_mapping,
                })?,
            )
            .await?;
        info!(
            process_count = processes.process_ids.len(),
            "refreshed process discovery cache"
        );
        Ok(processes)
    }

    pub async fn disk_names(&self, process_ids: &[String]) -> anyhow::Result<Vec<String>> {
        let cached: Option<NamesCache> = self.cached("disk_names").await?;
        let needs_refresh = match &cached {
            None => true,
            Some(c) => is_stale(c.last_set_date_ms, self.ttl_ms(), c.values.is_empty()),
        };
        if !needs_refresh {
            return Ok(cached.expect("checked above").values);
        }

        let client = self.engine.http_client(self.engine.atlas_auth());
        let mut disks = HashSet::new();
        for process_id in process_ids {
            let url = format!(
                "{}/groups/{}/processes/{}/disks",
                self.engine.config.mongodb_atlas.base_url,
                self.engine.config.mongodb_atlas.project_id,
                process_id
            );
            let results =
                paginate_all(&client, &url, self.engine.config.collection.page_size).await?;
            for obj in results {
                if let Some(name) = obj.get("partitionName").and_then(|v| v.as_str()) {
                    disks.insert(name.to_string());
                }
            }
        }

        let values: Vec<String> = disks.into_iter().collect();
        self.engine
            .kv
            .set(
                "disk_names",
                serde_json::to_value(NamesCache {
                    last_set_date_ms: now_ms(),
                    values: values.clone(),
                })?,
            )
            .await?;
        Ok(values)
    }

    pub async fn database_names(&self, process_ids: &[String]) -> anyhow::Result<Vec<String>> {
        let cached: Option<NamesCache> = self.cached("database_names").await?;
        let needs_refresh = match &cached {
            None => true,
            Some(c) => is_stale(c.last_set_date_ms, self.ttl_ms(), c.values.is_empty()),
        };
        if !needs_refresh {
            return Ok(cached.expect("checked above").values);
        }

        let client = self.engine.http_client(self.engine.atlas_auth());
        let mut databases = HashSet::new();
        for process_id in process_ids {
            let url = format!(
                "{}/groups/{}/processes/{}/databases",
                self.engine.config.mongodb_atlas.base_url,
                self.engine.config.mongodb_atlas.project_id,
                process_id
            );
            let results =
                paginate_all(&client, &url, self.engine.config.collection.page_size).await?;
            for obj in results {
                if let Some(name) = obj.get("databaseName").and_then(|v| v.as_str()) {
                    databases.insert(name.to_string());
                }
            }
        }

        let values: Vec<String> = databases.into_iter().collect();
        self.engine
            .kv
            .set(
                "database_names",
                serde_json::to_value(NamesCache {
                    last_set_date_ms: now_ms(),
                    values: values.clone(),
                })?,
            )
            .await?;
        Ok(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stale_detection_covers_absent_ttl_and_empty_cases() {
        assert!(is_stale(now_ms(), 1000, true));
        assert!(is_stale(now_ms() - 10_000, 1000, false));
        assert!(!is_stale(now_ms(), 60_000, false));
    }
}
