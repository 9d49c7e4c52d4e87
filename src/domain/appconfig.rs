// Copyright (c) Coach Team
// SPDX-License-Identifier: Apache-2.0

//! Version-aware selection of application config rows.
//!
//! Several rows may share a key; the one served to a client is the row with
//! the greatest version not above the client's own. Equal versions resolve
//! to the highest row id.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use tracing::error;

use crate::error::AppResult;
use crate::models::AppConfig;
use crate::store::{ChatStore, ConfigFilter};

/// Client attributes that decide which config rows apply
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigScope {
    pub version: String,
    pub env: String,
    pub app: String,
    pub platform: String,
}

impl ConfigScope {
    pub fn new(version: impl Into<String>, env: impl Into<String>) -> Self {
        Self { version: version.into(), env: env.into(), ..Default::default() }
    }
}

fn components(version: &str) -> Vec<u64> {
    let version = if version.is_empty() { "0.0.0" } else { version };
    version.split('.').map(|part| part.trim().parse().unwrap_or(0)).collect()
}

/// Compares dotted versions numerically, component by component.
///
/// Missing or non-numeric components count as 0 and an empty string is
/// "0.0.0", so "1.2" equals "1.2.0" and "1.10.0" is above "1.2.0".
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    if a == b {
        return Ordering::Equal;
    }
    let (left, right) = (components(a), components(b));
    let len = left.len().max(right.len());
    for i in 0..len {
        let l = left.get(i).copied().unwrap_or(0);
        let r = right.get(i).copied().unwrap_or(0);
        match l.cmp(&r) {
            Ordering::Equal => continue,
            other => return other,
        }
    }
    Ordering::Equal
}

fn outranks(candidate: &AppConfig, current: &AppConfig) -> bool {
    match compare_versions(&candidate.version, &current.version) {
        Ordering::Greater => true,
        Ordering::Equal => candidate.id > current.id,
        Ordering::Less => false,
    }
}

/// Picks the row for `key` that a client at `client_version` should see.
pub fn select_for_key<'a>(
    rows: &'a [AppConfig],
    key: &str,
    client_version: &str,
) -> Option<&'a AppConfig> {
    let mut selected: Option<&AppConfig> = None;
    for row in rows.iter().filter(|row| row.key == key) {
        if compare_versions(&row.version, client_version) == Ordering::Greater {
            continue;
        }
        if selected.map_or(true, |current| outranks(row, current)) {
            selected = Some(row);
        }
    }
    selected
}

/// Groups rows by key and picks one row per key.
///
/// Without a client version, or for rows without a version, the latest row
/// id wins; otherwise rows newer than the client are skipped and the
/// greatest version wins.
pub fn select_by_version(rows: &[AppConfig], client_version: &str) -> BTreeMap<String, AppConfig> {
    let mut selected: BTreeMap<String, AppConfig> = BTreeMap::new();
    for row in rows {
        let unversioned = client_version.is_empty() || row.version.is_empty();
        if !unversioned && compare_versions(&row.version, client_version) == Ordering::Greater {
            continue;
        }
        let replace = match selected.get(&row.key) {
            None => true,
            Some(current) if unversioned => row.id > current.id,
            Some(current) => outranks(row, current),
        };
        if replace {
            selected.insert(row.key.clone(), row.clone());
        }
    }
    selected
}

/// Loads the value of `key` for a client, or `None` when no row applies.
///
/// Config is best-effort: store failures are logged and read as absent.
pub async fn load_value(store: &dyn ChatStore, key: &str, scope: &ConfigScope) -> Option<String> {
    let filter = ConfigFilter {
        key: Some(key.to_string()),
        env: Some(scope.env.clone()),
        ..Default::default()
    };
    let rows = match store.load_configs(&filter).await {
        Ok(rows) => rows,
        Err(e) => {
            error!("Failed to load app config {}: {}", key, e);
            return None;
        }
    };
    select_for_key(&rows, key, &scope.version).map(|row| row.value.clone())
}

/// Every key visible to a client, resolved to its value.
pub async fn list_values(
    store: &dyn ChatStore,
    scope: &ConfigScope,
) -> AppResult<BTreeMap<String, String>> {
    let non_empty = |s: &str| Some(s.to_string()).filter(|s| !s.is_empty());
    let filter = ConfigFilter {
        key: None,
        env: Some(scope.env.clone()),
        app: non_empty(&scope.app),
        platform: non_empty(&scope.platform),
    };
    let rows = store.load_configs(&filter).await?;
    Ok(select_by_version(&rows, &scope.version)
        .into_iter()
        .map(|(key, row)| (key, row.value))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MemoryStore;

    fn row(id: i64, key: &str, version: &str, value: &str) -> AppConfig {
        AppConfig {
            id,
            key: key.into(),
            version: version.into(),
            value: value.into(),
            ..Default::default()
        }
    }

    #[test]
    fn versions_compare_numerically() {
        assert_eq!(compare_versions("1.10.0", "1.2.0"), Ordering::Greater);
        assert_eq!(compare_versions("1.2", "1.2.0"), Ordering::Equal);
        assert_eq!(compare_versions("", "0.0.0"), Ordering::Equal);
        assert_eq!(compare_versions("1.x.3", "1.0.3"), Ordering::Equal);
        assert_eq!(compare_versions("0.9", "1"), Ordering::Less);
    }

    #[test]
    fn picks_greatest_version_not_above_client() {
        let rows = vec![
            row(1, "k", "", "base"),
            row(2, "k", "1.0.0", "one"),
            row(3, "k", "2.0.0", "two"),
        ];
        let picked = select_for_key(&rows, "k", "1.5.0").unwrap();
        assert_eq!(picked.version, "1.0.0");
        assert_eq!(select_for_key(&rows, "k", "").unwrap().value, "base");
        assert!(select_for_key(&rows, "other", "9.9.9").is_none());
    }

    #[test]
    fn equal_versions_resolve_to_highest_id() {
        let rows = vec![row(7, "k", "1.0", "late"), row(4, "k", "1.0.0", "early")];
        assert_eq!(select_for_key(&rows, "k", "1.0.0").unwrap().value, "late");
    }

    #[test]
    fn grouped_selection() {
        let rows = vec![
            row(1, "a", "1.0.0", "a1"),
            row(2, "a", "3.0.0", "a3"),
            row(3, "b", "", "b-unversioned"),
            row(4, "b", "1.1.0", "b11"),
            row(5, "c", "5.0.0", "too-new"),
        ];
        let picked = select_by_version(&rows, "2.0.0");
        assert_eq!(picked["a"].value, "a1");
        assert_eq!(picked["b"].value, "b11");
        assert!(!picked.contains_key("c"));

        let latest = select_by_version(&rows, "");
        assert_eq!(latest["a"].value, "a3");
        assert_eq!(latest["c"].value, "too-new");
    }

    #[tokio::test]
    async fn load_value_respects_env() {
        let store = MemoryStore::default();
        let prod_row = row(1, "greeting", "", "hello prod");
        let dev_row = row(2, "greeting", "", "hello dev");
        store.put_config(AppConfig { env: "prod".into(), ..prod_row }).await;
        store.put_config(AppConfig { env: "dev".into(), ..dev_row }).await;

        let prod = ConfigScope::new("1.0.0", "prod");
        assert_eq!(load_value(&store, "greeting", &prod).await.as_deref(), Some("hello prod"));
        let staging = ConfigScope::new("1.0.0", "staging");
        assert_eq!(load_value(&store, "greeting", &staging).await, None);
    }
}
