#[cfg(test)]
mod store_tests {
    use crate::MemoryStore;
    use rex_core::{Action, GoalStatus, MemoryCategory};
    use tempfile::tempdir;

    async fn store() -> (MemoryStore, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");
        let store = MemoryStore::connect(path.to_str().unwrap()).await.unwrap();
        (store, dir)
    }

    #[tokio::test]
    async fn remember_then_recall_round_trips() {
        let (store, _dir) = store().await;
        store
            .remember(MemoryCategory::Person, "Joe", "Joe likes to play fetch", 0.7)
            .await
            .unwrap();
        let results = store.recall("fetch", 10, None).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].subject, "Joe");
        assert_eq!(results[0].category, MemoryCategory::Person);
        assert_eq!(results[0].access_count, 1);
    }

    #[tokio::test]
    async fn recall_respects_limit() {
        let (store, _dir) = store().await;
        for i in 0..5 {
            store
                .remember(MemoryCategory::Fact, "topic", &format!("fact number {i}"), 0.5)
                .await
                .unwrap();
        }
        let results = store.recall("fact", 3, None).await.unwrap();
        assert!(results.len() <= 3);
    }

    #[tokio::test]
    async fn importance_is_always_clamped() {
        let (store, _dir) = store().await;
        let id = store
            .remember(MemoryCategory::Fact, "x", "over the top", 5.0)
            .await
            .unwrap();
        let fetched = store.by_subject("x").await.unwrap();
        assert_eq!(fetched[0].id, id);
        assert!(fetched[0].importance <= 1.0);

        store.update_importance(id, -3.0).await.unwrap();
        let fetched = store.by_subject("x").await.unwrap();
        assert_eq!(fetched[0].importance, 0.0);
    }

    #[tokio::test]
    async fn learn_trick_rejects_too_many_actions() {
        let (store, _dir) = store().await;
        let too_many = vec![Action::Sit; 11];
        let result = store.learn_trick("overload", "do the thing", &too_many).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn learn_trick_then_find_by_trigger_round_trips() {
        let (store, _dir) = store().await;
        store
            .learn_trick("sit pretty", "sit down please", &[Action::Sit, Action::WagTail])
            .await
            .unwrap();
        let found = store
            .find_trick_by_trigger("could you sit down please right now")
            .await
            .unwrap();
        assert!(found.is_some());
        assert_eq!(found.unwrap().name, "sit pretty");
    }

    #[tokio::test]
    async fn goal_lifecycle_completes_and_leaves_active_list() {
        let (store, _dir) = store().await;
        let id = store.create_goal("learn to shake", 3).await.unwrap();
        let active = store.get_active_goals().await.unwrap();
        assert_eq!(active.len(), 1);

        store.set_goal_status(id, GoalStatus::Completed).await.unwrap();
        let active = store.get_active_goals().await.unwrap();
        assert!(active.is_empty());
        let goal = store.get_goal(id).await.unwrap().unwrap();
        assert_eq!(goal.status, GoalStatus::Completed);
        assert!(goal.completed_at.is_some());
    }

    #[tokio::test]
    async fn goal_priority_is_clamped_to_one_through_five() {
        let (store, _dir) = store().await;
        let id = store.create_goal("overreach", 9).await.unwrap();
        let goal = store.get_goal(id).await.unwrap().unwrap();
        assert_eq!(goal.priority, 5);
    }

    #[tokio::test]
    async fn store_face_then_lookup_by_name_round_trips() {
        let (store, _dir) = store().await;
        let encoding = vec![0.1_f32, 0.2, 0.3];
        store.store_face("Ann", &encoding, "hash1").await.unwrap();
        let faces = store.get_faces_by_name("Ann").await.unwrap();
        assert_eq!(faces.len(), 1);
        assert_eq!(faces[0].encoding, encoding);
    }

    #[tokio::test]
    async fn duplicate_faces_cluster_within_name_only() {
        let (store, _dir) = store().await;
        store.store_face("Ann", &[0.0, 0.0], "h1").await.unwrap();
        store.store_face("Ann", &[0.01, 0.0], "h2").await.unwrap();
        store.store_face("Bob", &[0.0, 0.0], "h3").await.unwrap();

        let clusters = store.duplicate_faces(0.4).await.unwrap();
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].len(), 2);
        assert!(clusters[0].iter().all(|f| f.name == "Ann"));
    }

    #[tokio::test]
    async fn prune_candidates_are_ordered_low_importance_first() {
        let (store, _dir) = store().await;
        store.remember(MemoryCategory::Fact, "a", "a", 0.1).await.unwrap();
        store.remember(MemoryCategory::Fact, "b", "b", 0.9).await.unwrap();
        let candidates = store.prune_candidates(0.2, 10).await.unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].subject, "a");
    }

    #[tokio::test]
    async fn close_is_idempotent_and_rejects_further_mutation() {
        let (store, _dir) = store().await;
        store.close().await;
        store.close().await;
        let result = store.remember(MemoryCategory::Fact, "x", "y", 0.5).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn stats_reflects_inserted_rows() {
        let (store, _dir) = store().await;
        store.remember(MemoryCategory::Fact, "x", "y", 0.5).await.unwrap();
        store.create_goal("a goal", 1).await.unwrap();
        let stats = store.stats().await.unwrap();
        assert_eq!(stats.get("memories"), Some(&1));
        assert_eq!(stats.get("goals"), Some(&1));
    }
}
