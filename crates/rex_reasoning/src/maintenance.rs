//! Periodic background maintenance over [`MemoryStore`]: importance decay,
//! LLM-assisted consolidation, low-importance pruning, and face
//! deduplication, run on a fixed interval behind a busy-retry skip.

use crate::reasoner::ExternalReasoner;
use rex_core::MaintenanceConfig;
use rex_memory::MemoryStore;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct MaintenanceStats {
    pub decayed_count: usize,
    pub consolidated_count: usize,
    pub pruned_count: usize,
    pub merged_faces_count: usize,
    pub duration_seconds: f64,
    pub timestamp: i64,
}

#[derive(Debug, Deserialize, Default)]
struct ConsolidationUpdate {
    id: i64,
    content: Option<String>,
    importance: Option<f32>,
}

#[derive(Debug, Deserialize, Default)]
struct ConsolidationMerged {
    content: String,
    #[serde(default)]
    importance: Option<f32>,
    source_ids: Vec<i64>,
}

#[derive(Debug, Deserialize, Default)]
struct ConsolidationReply {
    #[serde(default)]
    delete_ids: Vec<i64>,
    #[serde(default)]
    updates: Vec<ConsolidationUpdate>,
    #[serde(default)]
    merged: Option<ConsolidationMerged>,
}

pub struct MemoryMaintainer {
    memory: Arc<MemoryStore>,
    reasoner: Arc<dyn ExternalReasoner>,
    config: MaintenanceConfig,
    last_stats: RwLock<Option<MaintenanceStats>>,
}

impl MemoryMaintainer {
    pub fn new(memory: Arc<MemoryStore>, reasoner: Arc<dyn ExternalReasoner>, config: MaintenanceConfig) -> Self {
        Self {
            memory,
            reasoner,
            config,
            last_stats: RwLock::new(None),
        }
    }

    pub async fn last_stats(&self) -> Option<MaintenanceStats> {
        self.last_stats.read().await.clone()
    }

    /// Runs loop forever, sleeping `interval_hours` between cycles (or the
    /// busy-retry interval when `is_busy` returned true), until `stop`
    /// fires. `is_busy` models `Brain.state == INTERACTING`.
    pub async fn run<F>(&self, stop: tokio::sync::Notify, is_busy: F)
    where
        F: Fn() -> bool,
    {
        let initial_delay = Duration::from_secs_f64(self.config.initial_delay_minutes * 60.0);
        tokio::select! {
            _ = tokio::time::sleep(initial_delay) => {}
            _ = stop.notified() => return,
        }

        loop {
            if is_busy() {
                tracing::debug!("maintenance skipped: brain is busy");
                let retry = Duration::from_secs_f64(self.config.busy_retry_minutes * 60.0);
                tokio::select! {
                    _ = tokio::time::sleep(retry) => continue,
                    _ = stop.notified() => return,
                }
            }

            match self.run_cycle(&is_busy).await {
                Ok(stats) => {
                    tracing::info!(
                        decayed = stats.decayed_count,
                        consolidated = stats.consolidated_count,
                        pruned = stats.pruned_count,
                        merged_faces = stats.merged_faces_count,
                        "maintenance cycle complete"
                    );
                    *self.last_stats.write().await = Some(stats);
                }
                Err(e) => tracing::warn!("maintenance cycle failed: {e}"),
            }

            let interval = Duration::from_secs_f64(self.config.interval_hours * 3600.0);
            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = stop.notified() => return,
            }
        }
    }

    pub async fn run_cycle<F>(&self, is_busy: &F) -> anyhow::Result<MaintenanceStats>
    where
        F: Fn() -> bool,
    {
        let started = std::time::Instant::now();
        let decayed_count = self.decay_importance().await?;
        let consolidated_count = self.consolidate_memories(is_busy).await?;
        let pruned_count = self.prune_low_importance().await?;
        let merged_faces_count = self.deduplicate_faces().await?;

        Ok(MaintenanceStats {
            decayed_count,
            consolidated_count,
            pruned_count,
            merged_faces_count,
            duration_seconds: started.elapsed().as_secs_f64(),
            timestamp: chrono::Utc::now().timestamp(),
        })
    }

    async fn decay_importance(&self) -> anyhow::Result<usize> {
        let stale = self
            .memory
            .stale(self.config.access_protection_days, 0.9)
            .await?;
        let now = chrono::Utc::now().timestamp();
        let mut updates = Vec::new();
        for memory in &stale {
            let days_since_access = ((now - memory.last_accessed) as f64 / 86400.0).max(0.0);
            let days_beyond = (days_since_access - self.config.access_protection_days as f64).max(0.0);
            let new_importance =
                (memory.importance as f64 - self.config.decay_rate_per_day as f64 * days_beyond).max(0.0);
            let delta = (memory.importance as f64 - new_importance).abs();
            if delta >= self.config.decay_tolerance as f64 {
                updates.push((memory.id, new_importance as f32));
            }
        }
        let count = updates.len();
        if !updates.is_empty() {
            self.memory.bulk_update_importance(&updates).await?;
        }
        Ok(count)
    }

    async fn consolidate_memories<F>(&self, is_busy: &F) -> anyhow::Result<usize>
    where
        F: Fn() -> bool,
    {
        let grouped = self.memory.by_subject_grouped().await?;
        let mut total_consolidated = 0;
        let mut subjects_processed = 0;

        for (subject, mut memories) in grouped {
            if memories.len() < 2 {
                continue;
            }
            if memories.len() > self.config.consolidation_batch_size {
                memories.sort_by(|a, b| b.importance.partial_cmp(&a.importance).unwrap());
                memories.truncate(self.config.consolidation_batch_size);
            }

            if is_busy() {
                tracing::debug!("consolidation stopped: system became busy");
                break;
            }

            if subjects_processed > 0 && self.config.consolidation_delay_secs > 0.0 {
                tokio::time::sleep(Duration::from_secs_f64(self.config.consolidation_delay_secs)).await;
            }

            match self.consolidate_subject(&subject, &memories).await {
                Ok(affected) => {
                    total_consolidated += affected;
                    subjects_processed += 1;
                }
                Err(e) => tracing::warn!("consolidation failed for '{subject}': {e}"),
            }
        }

        Ok(total_consolidated)
    }

    async fn consolidate_subject(
        &self,
        subject: &str,
        memories: &[rex_core::Memory],
    ) -> anyhow::Result<usize> {
        let valid_ids: std::collections::HashSet<i64> = memories.iter().map(|m| m.id).collect();
        let memory_lines: Vec<String> = memories
            .iter()
            .map(|m| format!("{}: {} [{:.2}]", m.id, m.content, m.importance))
            .collect();
        let prompt = format!(
            "Consolidate these memories about \"{subject}\". Reply with JSON \
             {{\"delete_ids\": [...], \"updates\": [{{\"id\":.., \"content\":.., \"importance\":..}}], \
             \"merged\": {{\"content\":.., \"importance\":.., \"source_ids\": [...]}}}}.\n{}",
            memory_lines.join("\n")
        );

        let response = self
            .reasoner
            .think("You are a memory consolidation assistant. Respond only with valid JSON.", &prompt)
            .await?;
        let reply: ConsolidationReply = match serde_json::from_str(&response) {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!("malformed consolidation reply for '{subject}': {e}");
                return Ok(0);
            }
        };

        let mut affected = 0;
        let mut deleted_ids = std::collections::HashSet::new();

        let validated_delete_ids: Vec<i64> =
            reply.delete_ids.into_iter().filter(|id| valid_ids.contains(id)).collect();
        if !validated_delete_ids.is_empty() {
            self.memory.bulk_delete(&validated_delete_ids).await?;
            deleted_ids.extend(validated_delete_ids.iter().copied());
            affected += validated_delete_ids.len();
        }

        for update in reply.updates {
            if !valid_ids.contains(&update.id) || deleted_ids.contains(&update.id) {
                continue;
            }
            if let Some(content) = &update.content {
                self.memory.update_content(update.id, content).await?;
            }
            if let Some(importance) = update.importance {
                self.memory.update_importance(update.id, importance).await?;
            }
            affected += 1;
        }

        if let Some(merged) = reply.merged {
            if !merged.content.is_empty() && !merged.source_ids.is_empty() {
                let validated_source_ids: Vec<i64> = merged
                    .source_ids
                    .into_iter()
                    .filter(|id| valid_ids.contains(id) && !deleted_ids.contains(id))
                    .collect();
                if !validated_source_ids.is_empty() {
                    if let Some(source) = memories.iter().find(|m| validated_source_ids.contains(&m.id)) {
                        self.memory
                            .remember(source.category, subject, &merged.content, merged.importance.unwrap_or(0.5))
                            .await?;
                        self.memory.bulk_delete(&validated_source_ids).await?;
                        affected += validated_source_ids.len();
                    }
                }
            }
        }

        Ok(affected)
    }

    async fn prune_low_importance(&self) -> anyhow::Result<usize> {
        let stats = self.memory.stats().await?;
        let count = *stats.get("memories").unwrap_or(&0) as usize;
        if count <= self.config.max_memories {
            return Ok(0);
        }
        let excess = count - self.config.max_memories;
        let target = ((excess as f64) * 1.2).ceil() as i64;
        let candidates = self.memory.prune_candidates(self.config.min_importance, target).await?;
        let ids: Vec<i64> = candidates.iter().map(|m| m.id).collect();
        if !ids.is_empty() {
            self.memory.bulk_delete(&ids).await?;
        }
        Ok(ids.len())
    }

    async fn deduplicate_faces(&self) -> anyhow::Result<usize> {
        let clusters = self.memory.duplicate_faces(self.config.face_distance_threshold).await?;
        let mut merged_count = 0;
        for cluster in clusters {
            if cluster.len() < 2 {
                continue;
            }
            let keep = cluster.iter().max_by_key(|f| f.times_seen).unwrap();
            let keep_id = keep.id;
            let delete_ids: Vec<i64> = cluster.iter().filter(|f| f.id != keep_id).map(|f| f.id).collect();
            if !delete_ids.is_empty() {
                self.memory.merge_face_entries(keep_id, &delete_ids).await?;
                merged_count += delete_ids.len();
            }
        }
        Ok(merged_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct MockReasoner {
        response: String,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ExternalReasoner for MockReasoner {
        async fn think(&self, _system: &str, _prompt: &str) -> anyhow::Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.response.clone())
        }
    }

    async fn store() -> (Arc<MemoryStore>, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("m.db");
        let store = MemoryStore::connect(path.to_str().unwrap()).await.unwrap();
        (Arc::new(store), dir)
    }

    #[tokio::test]
    async fn pruning_trims_down_to_max_memories() {
        let (memory, _dir) = store().await;
        for i in 0..10 {
            memory
                .remember(rex_core::MemoryCategory::Fact, &format!("subject{i}"), "content", 0.1)
                .await
                .unwrap();
        }
        let reasoner = Arc::new(MockReasoner {
            response: "{}".to_string(),
            calls: AtomicUsize::new(0),
        });
        let config = MaintenanceConfig {
            max_memories: 5,
            ..Default::default()
        };
        let maintainer = MemoryMaintainer::new(memory.clone(), reasoner, config);
        let stats = maintainer.run_cycle(&|| false).await.unwrap();
        assert!(stats.pruned_count > 0);
        let remaining = memory.stats().await.unwrap();
        assert!(*remaining.get("memories").unwrap() <= 5);
    }

    #[tokio::test]
    async fn consolidation_ignores_ids_outside_the_batch() {
        let (memory, _dir) = store().await;
        let id10 = memory
            .remember(rex_core::MemoryCategory::Fact, "Joe", "likes walks", 0.5)
            .await
            .unwrap();
        let id11 = memory
            .remember(rex_core::MemoryCategory::Fact, "Joe", "likes treats", 0.5)
            .await
            .unwrap();

        let reply = serde_json::json!({
            "delete_ids": [id10, 999999],
            "updates": [{"id": id11, "content": "merged content"}],
        });
        let reasoner = Arc::new(MockReasoner {
            response: reply.to_string(),
            calls: AtomicUsize::new(0),
        });
        let config = MaintenanceConfig::default();
        let maintainer = MemoryMaintainer::new(memory.clone(), reasoner, config);
        let stats = maintainer.run_cycle(&|| false).await.unwrap();
        assert!(stats.consolidated_count >= 2);
        let by_subject = memory.by_subject("Joe").await.unwrap();
        assert!(!by_subject.iter().any(|m| m.id == id10));
        assert!(by_subject.iter().any(|m| m.id == id11 && m.content == "merged content"));
    }

    #[tokio::test]
    async fn busy_predicate_skips_consolidation_without_calling_reasoner() {
        let (memory, _dir) = store().await;
        memory
            .remember(rex_core::MemoryCategory::Fact, "Joe", "a", 0.5)
            .await
            .unwrap();
        memory
            .remember(rex_core::MemoryCategory::Fact, "Joe", "b", 0.5)
            .await
            .unwrap();
        let reasoner = Arc::new(MockReasoner {
            response: "{}".to_string(),
            calls: AtomicUsize::new(0),
        });
        let maintainer = MemoryMaintainer::new(memory, reasoner.clone(), MaintenanceConfig::default());
        maintainer.run_cycle(&|| true).await.unwrap();
        assert_eq!(reasoner.calls.load(Ordering::SeqCst), 0);
    }
}
