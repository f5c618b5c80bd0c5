#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use braid_core::BraidError;
    use braid_llm::MockEmbedding;
    use braid_memory::{
        MemoryKind, MemoryStore, RelationshipGraph, RelationshipUpdate, RetrievalConfig,
        RetrievalEngine,
    };

    fn store() -> Arc<MemoryStore> {
        Arc::new(MemoryStore::open_in_memory(Arc::new(MockEmbedding::new(64))).unwrap())
    }

    fn engine(store: &Arc<MemoryStore>) -> RetrievalEngine {
        RetrievalEngine::new(Arc::clone(store), RetrievalConfig::default())
    }

    // ── Memory Store ───────────────────────────────────────────

    mod append_only {
        use super::*;

        #[tokio::test]
        async fn test_load_all_returns_insertion_order() {
            let store = store();
            let owner = store.create_identity("Alice", "", "h1").unwrap().id;
            for text in ["likes beaches", "allergic to peanuts", "speaks French"] {
                store.append(owner, text, MemoryKind::Turn).await.unwrap();
            }
            let items = store.load_all(owner).unwrap();
            assert_eq!(items.len(), 3);
            assert_eq!(items[0].text, "likes beaches");
            assert_eq!(items[1].text, "allergic to peanuts");
            assert_eq!(items[2].text, "speaks French");
            // Positions are gapless and monotonic
            let positions: Vec<i64> = items.iter().map(|i| i.position).collect();
            assert_eq!(positions, vec![0, 1, 2]);
        }

        #[tokio::test]
        async fn test_append_rejects_empty_text() {
            let store = store();
            let owner = store.create_identity("Alice", "", "h1").unwrap().id;
            let err = store.append(owner, "   ", MemoryKind::Turn).await.unwrap_err();
            assert!(matches!(err, BraidError::Validation(_)));
            assert_eq!(store.count_items(owner).unwrap(), 0);
        }

        #[tokio::test]
        async fn test_append_unknown_owner() {
            let store = store();
            let err = store
                .append(uuid::Uuid::new_v4(), "text", MemoryKind::Turn)
                .await
                .unwrap_err();
            assert!(matches!(err, BraidError::UnknownIdentity(_)));
        }

        #[tokio::test]
        async fn test_embedding_failure_persists_nothing() {
            let store = Arc::new(
                MemoryStore::open_in_memory(Arc::new(MockEmbedding::failing("quota"))).unwrap(),
            );
            let owner = store.create_identity("Alice", "", "h1").unwrap().id;
            let err = store
                .append(owner, "likes beaches", MemoryKind::Turn)
                .await
                .unwrap_err();
            assert!(matches!(err, BraidError::Provider(_)));
            assert_eq!(store.count_items(owner).unwrap(), 0);
        }

        #[tokio::test]
        async fn test_append_clips_to_max_chars() {
            let store = Arc::new(
                MemoryStore::open_in_memory(Arc::new(MockEmbedding::new(64)))
                    .unwrap()
                    .with_max_chars(10),
            );
            let owner = store.create_identity("Alice", "", "h1").unwrap().id;
            let item = store
                .append(owner, "0123456789abcdef", MemoryKind::Turn)
                .await
                .unwrap();
            assert_eq!(item.text, "0123456789");
        }

        #[tokio::test]
        async fn test_owners_are_isolated() {
            let store = store();
            let a = store.create_identity("Alice", "", "h1").unwrap().id;
            let b = store.create_identity("Bob", "", "h2").unwrap().id;
            store.append(a, "alice fact", MemoryKind::Turn).await.unwrap();
            store.append(b, "bob fact", MemoryKind::Turn).await.unwrap();
            let alice_items = store.load_all(a).unwrap();
            assert_eq!(alice_items.len(), 1);
            assert_eq!(alice_items[0].text, "alice fact");
            // Positions count per owner, not globally
            assert_eq!(store.load_all(b).unwrap()[0].position, 0);
        }
    }

    // ── Relationship Graph ─────────────────────────────────────

    mod graph {
        use super::*;

        #[test]
        fn test_exposed_to_creates_inverse_amplify_from() {
            let store = store();
            let graph = RelationshipGraph::new(&store);
            let a = store.create_identity("Alice", "", "h1").unwrap().id;
            let b = store.create_identity("Bob", "", "h2").unwrap().id;

            graph
                .update(a, RelationshipUpdate::exposed_to(vec![b]))
                .unwrap();

            assert_eq!(graph.get_relationships(a).unwrap().exposed_to, vec![b]);
            assert_eq!(graph.get_relationships(b).unwrap().amplify_from, vec![a]);
        }

        #[test]
        fn test_amplify_from_creates_inverse_edge() {
            let store = store();
            let graph = RelationshipGraph::new(&store);
            let a = store.create_identity("Alice", "", "h1").unwrap().id;
            let b = store.create_identity("Bob", "", "h2").unwrap().id;

            // "B wants to read A" is the edge A -> B
            graph
                .update(b, RelationshipUpdate::amplify_from(vec![a]))
                .unwrap();

            assert_eq!(graph.get_relationships(a).unwrap().exposed_to, vec![b]);
            assert_eq!(graph.get_relationships(b).unwrap().amplify_from, vec![a]);
        }

        #[test]
        fn test_update_is_idempotent() {
            let store = store();
            let graph = RelationshipGraph::new(&store);
            let a = store.create_identity("Alice", "", "h1").unwrap().id;
            let b = store.create_identity("Bob", "", "h2").unwrap().id;

            let first = graph
                .update(a, RelationshipUpdate::exposed_to(vec![b]))
                .unwrap();
            let second = graph
                .update(a, RelationshipUpdate::exposed_to(vec![b]))
                .unwrap();
            assert_eq!(first, second);

            let edge_count: i64 = store
                .db()
                .query_row("SELECT count(*) FROM edges", [], |r| r.get(0))
                .unwrap();
            assert_eq!(edge_count, 1);
        }

        #[test]
        fn test_update_preserves_third_party_edges() {
            let store = store();
            let graph = RelationshipGraph::new(&store);
            let a = store.create_identity("Alice", "", "h1").unwrap().id;
            let b = store.create_identity("Bob", "", "h2").unwrap().id;
            let c = store.create_identity("Cara", "", "h3").unwrap().id;

            // C exposes to B independently.
            graph
                .update(c, RelationshipUpdate::exposed_to(vec![b]))
                .unwrap();
            // A rewriting its own exposed_to must not touch C's edge.
            graph
                .update(a, RelationshipUpdate::exposed_to(vec![b]))
                .unwrap();
            graph
                .update(a, RelationshipUpdate::exposed_to(vec![]))
                .unwrap();

            let b_view = graph.get_relationships(b).unwrap();
            assert_eq!(b_view.amplify_from, vec![c]);
        }

        #[test]
        fn test_removal_via_empty_list() {
            let store = store();
            let graph = RelationshipGraph::new(&store);
            let a = store.create_identity("Alice", "", "h1").unwrap().id;
            let b = store.create_identity("Bob", "", "h2").unwrap().id;

            graph
                .update(a, RelationshipUpdate::exposed_to(vec![b]))
                .unwrap();
            let view = graph
                .update(a, RelationshipUpdate::exposed_to(vec![]))
                .unwrap();
            assert!(view.exposed_to.is_empty());
            assert!(graph.get_relationships(b).unwrap().amplify_from.is_empty());
        }

        #[test]
        fn test_self_authorization_rejected() {
            let store = store();
            let graph = RelationshipGraph::new(&store);
            let a = store.create_identity("Alice", "", "h1").unwrap().id;
            let err = graph
                .update(a, RelationshipUpdate::exposed_to(vec![a]))
                .unwrap_err();
            assert!(matches!(err, BraidError::Validation(_)));
        }

        #[test]
        fn test_unknown_target_fails_whole_update() {
            let store = store();
            let graph = RelationshipGraph::new(&store);
            let a = store.create_identity("Alice", "", "h1").unwrap().id;
            let b = store.create_identity("Bob", "", "h2").unwrap().id;
            let ghost = uuid::Uuid::new_v4();

            let err = graph
                .update(a, RelationshipUpdate::exposed_to(vec![b, ghost]))
                .unwrap_err();
            assert!(matches!(err, BraidError::UnknownIdentity(id) if id == ghost));
            // Nothing applied, not even the valid half
            assert!(graph.get_relationships(a).unwrap().exposed_to.is_empty());
        }

        #[test]
        fn test_duplicate_targets_collapse() {
            let store = store();
            let graph = RelationshipGraph::new(&store);
            let a = store.create_identity("Alice", "", "h1").unwrap().id;
            let b = store.create_identity("Bob", "", "h2").unwrap().id;
            let view = graph
                .update(a, RelationshipUpdate::exposed_to(vec![b, b, b]))
                .unwrap();
            assert_eq!(view.exposed_to, vec![b]);
        }

        #[test]
        fn test_get_relationships_unknown_identity() {
            let store = store();
            let graph = RelationshipGraph::new(&store);
            let err = graph.get_relationships(uuid::Uuid::new_v4()).unwrap_err();
            assert!(matches!(err, BraidError::UnknownIdentity(_)));
        }
    }

    // ── Retrieval Engine ───────────────────────────────────────

    mod retrieval {
        use super::*;

        #[tokio::test]
        async fn test_ranks_by_similarity() {
            let store = store();
            let owner = store.create_identity("Alice", "", "h1").unwrap().id;
            store
                .append(owner, "likes beaches", MemoryKind::Turn)
                .await
                .unwrap();
            store
                .append(owner, "allergic to peanuts", MemoryKind::Turn)
                .await
                .unwrap();

            let engine = engine(&store);
            let hits = engine
                .retrieve(owner, "is there anything allergic about peanuts", 2)
                .await
                .unwrap();
            assert_eq!(hits.len(), 2);
            assert_eq!(hits[0].0.text, "allergic to peanuts");
            assert!(hits[0].1 > hits[1].1);
        }

        #[tokio::test]
        async fn test_deterministic_for_fixed_pool() {
            let store = store();
            let owner = store.create_identity("Alice", "", "h1").unwrap().id;
            for text in ["red wine", "white wine", "sparkling water", "green tea"] {
                store.append(owner, text, MemoryKind::Turn).await.unwrap();
            }
            let engine = engine(&store);
            let first = engine.retrieve(owner, "wine pairing", 3).await.unwrap();
            let second = engine.retrieve(owner, "wine pairing", 3).await.unwrap();
            let order = |hits: &[(braid_memory::MemoryItem, f32)]| {
                hits.iter().map(|(i, _)| i.id).collect::<Vec<_>>()
            };
            assert_eq!(order(&first), order(&second));
        }

        #[tokio::test]
        async fn test_tie_breaks_toward_newest() {
            let store = store();
            let owner = store.create_identity("Alice", "", "h1").unwrap().id;
            // Identical text → identical embedding → identical score.
            store
                .append(owner, "repeat me", MemoryKind::Turn)
                .await
                .unwrap();
            store
                .append(owner, "repeat me", MemoryKind::Turn)
                .await
                .unwrap();
            let engine = engine(&store);
            let hits = engine.retrieve(owner, "repeat me", 2).await.unwrap();
            assert_eq!(hits[0].0.position, 1);
            assert_eq!(hits[1].0.position, 0);
        }

        #[tokio::test]
        async fn test_empty_pool_returns_empty() {
            let store = store();
            let owner = store.create_identity("Alice", "", "h1").unwrap().id;
            let engine = engine(&store);
            let hits = engine.retrieve(owner, "anything at all", 4).await.unwrap();
            assert!(hits.is_empty());
        }

        #[tokio::test]
        async fn test_respects_authorization() {
            let store = store();
            let graph = RelationshipGraph::new(&store);
            let alice = store.create_identity("Alice", "", "h1").unwrap().id;
            let bob = store.create_identity("Bob", "", "h2").unwrap().id;
            // A crafted probe: Alice owns exactly the query text, cosine ≈ 1.0.
            store
                .append(alice, "secret picnic location", MemoryKind::Turn)
                .await
                .unwrap();

            let engine = engine(&store);
            let hits = engine
                .retrieve(bob, "secret picnic location", 4)
                .await
                .unwrap();
            assert!(hits.is_empty(), "unauthorized memory must stay invisible");

            // Once Alice exposes to Bob, the same probe hits.
            graph
                .update(alice, RelationshipUpdate::exposed_to(vec![bob]))
                .unwrap();
            let hits = engine
                .retrieve(bob, "secret picnic location", 4)
                .await
                .unwrap();
            assert_eq!(hits.len(), 1);
            assert_eq!(hits[0].0.owner_id, alice);
            assert!(hits[0].1 > 0.99);
        }

        #[tokio::test]
        async fn test_merges_own_and_peer_items() {
            let store = store();
            let graph = RelationshipGraph::new(&store);
            let alice = store.create_identity("Alice", "", "h1").unwrap().id;
            let bob = store.create_identity("Bob", "", "h2").unwrap().id;
            store
                .append(alice, "favorite trail near the lake", MemoryKind::Turn)
                .await
                .unwrap();
            store
                .append(bob, "favorite trail up the mountain", MemoryKind::Turn)
                .await
                .unwrap();
            graph
                .update(alice, RelationshipUpdate::exposed_to(vec![bob]))
                .unwrap();

            let engine = engine(&store);
            let hits = engine.retrieve(bob, "favorite trail", 4).await.unwrap();
            assert_eq!(hits.len(), 2);
            let owners: Vec<_> = hits.iter().map(|(i, _)| i.owner_id).collect();
            assert!(owners.contains(&alice));
            assert!(owners.contains(&bob));
        }

        #[tokio::test]
        async fn test_min_score_falls_back_to_top_k() {
            let store = store();
            let owner = store.create_identity("Alice", "", "h1").unwrap().id;
            store
                .append(owner, "completely unrelated note", MemoryKind::Turn)
                .await
                .unwrap();
            let engine = RetrievalEngine::new(
                Arc::clone(&store),
                RetrievalConfig {
                    min_score: Some(0.99),
                    ..Default::default()
                },
            );
            let hits = engine.retrieve(owner, "quantum chromodynamics", 2).await.unwrap();
            assert_eq!(hits.len(), 1, "threshold miss falls back to top-k");
        }

        #[tokio::test]
        async fn test_k_zero_and_empty_query() {
            let store = store();
            let owner = store.create_identity("Alice", "", "h1").unwrap().id;
            let engine = engine(&store);
            assert!(engine.retrieve(owner, "query", 0).await.unwrap().is_empty());
            let err = engine.retrieve(owner, "  ", 4).await.unwrap_err();
            assert!(matches!(err, BraidError::Validation(_)));
        }
    }

    // ── Identities & sessions ──────────────────────────────────

    mod persistence {
        use super::*;
        use braid_core::{Message, Role};

        #[test]
        fn test_identity_token_lookup() {
            let store = store();
            let alice = store.create_identity("Alice", "surfer", "hash-a").unwrap();
            store.create_identity("Bob", "", "hash-b").unwrap();
            assert_eq!(
                store.find_identity_by_token_hash("hash-a").unwrap(),
                Some(alice.id)
            );
            assert_eq!(store.find_identity_by_token_hash("nope").unwrap(), None);
        }

        #[test]
        fn test_identity_profile_update() {
            let store = store();
            let alice = store.create_identity("Alice", "surfer", "h1").unwrap();
            store
                .set_identity_profile(alice.id, "Alicia", "climber")
                .unwrap();
            let fetched = store.get_identity(alice.id).unwrap().unwrap();
            assert_eq!(fetched.name, "Alicia");
            assert_eq!(fetched.description, "climber");

            let err = store
                .set_identity_profile(uuid::Uuid::new_v4(), "x", "y")
                .unwrap_err();
            assert!(matches!(err, BraidError::UnknownIdentity(_)));
        }

        #[test]
        fn test_session_log_append_order() {
            let store = store();
            let owner = store.create_identity("Alice", "", "h1").unwrap().id;
            let session = store.create_session(owner, "trip planning").unwrap();

            for (role, text) in [
                (Role::System, "you are helpful"),
                (Role::Human, "hello"),
                (Role::Ai, "hi there"),
            ] {
                let msg = Message::text(session.id, role, text);
                store.append_session_message(&msg).unwrap();
            }

            let log = store.load_session_messages(session.id).unwrap();
            assert_eq!(log.len(), 3);
            assert_eq!(log[0].role, Role::System);
            assert_eq!(log[1].text_content(), "hello");
            assert_eq!(log[2].role, Role::Ai);
            assert_eq!(store.message_count(session.id).unwrap(), 3);
        }

        #[test]
        fn test_append_to_unknown_session() {
            let store = store();
            let msg = Message::text(uuid::Uuid::new_v4(), Role::Human, "hello");
            let err = store.append_session_message(&msg).unwrap_err();
            assert!(matches!(err, BraidError::Validation(_)));
        }

        #[test]
        fn test_create_session_unknown_owner() {
            let store = store();
            let err = store
                .create_session(uuid::Uuid::new_v4(), "ghost session")
                .unwrap_err();
            assert!(matches!(err, BraidError::UnknownIdentity(_)));
        }
    }
}
