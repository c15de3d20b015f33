//! Cluster-alias substitution shared by the log and metric parsers, per
//! spec.md §4.10's cluster-mapping rule and `api.py`'s
//! `_get_cluster_name`/`_replace_cluster_name`.

use std::collections::HashMap;

/// `"host-shard-00-00"` -> `"host"`. MongoDB Atlas process/host identifiers
/// always carry a `-shard...` suffix that the alias map doesn't include.
pub fn cluster_name(full_name: &str) -> &str {
    full_name.split("-shard").next().unwrap_or(full_name)
}

/// Replaces the cluster-name portion of `full_name` with its alias from
/// `cluster_mapping`, leaving the rest (and the whole string, if no mapping
/// exists) untouched.
pub fn replace_cluster_name(full_name: &str, cluster_mapping: &HashMap<String, String>) -> String {
    let raw = cluster_name(full_name);
    match cluster_mapping.get(raw) {
        Some(alias) if alias != raw => full_name.replacen(raw, alias, 1),
        _ => full_name.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_shard_suffix() {
        assert_eq!(cluster_name("c0-shard-00-00"), "c0");
        assert_eq!(cluster_name("standalone-host"), "standalone-host");
    }

    #[test]
    fn substitutes_alias_when_present() {
        let mut mapping = HashMap::new();
        mapping.insert("c0".to_string(), "prod-cluster".to_string());
        assert_eq!(
            replace_cluster_name("c0-shard-00-00", &mapping),
            "prod-cluster-shard-00-00"
        );
    }

    #[test]
    fn leaves_name_untouched_when_unmapped() {
        let mapping = HashMap::new();
        assert_eq!(
            replace_cluster_name("c0-shard-00-00", &mapping),
            "c0-shard-00-00"
        );
    }
}
