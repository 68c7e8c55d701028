//! Behavioural tests for the conversation store, run through
//! `Arc<dyn ConversationStore>` against an in-memory libSQL database.

use std::collections::BTreeSet;
use std::sync::Arc;

use conversation_store::store::{self, ConversationStore};
use conversation_store::{Message, StoreConfig};

async fn test_store() -> Arc<dyn ConversationStore> {
    store::connect(&StoreConfig::libsql(":memory:"))
        .await
        .unwrap()
}

fn msg(role: &str, content: &str) -> Message {
    Message::new(role, content)
}

async fn thread_set(store: &dyn ConversationStore, user_id: &str) -> BTreeSet<String> {
    store
        .list_user_threads(user_id)
        .await
        .unwrap()
        .into_iter()
        .collect()
}

#[tokio::test]
async fn end_to_end_scenario() {
    let store = test_store().await;
    let (m1, m2, m3, m4) = (
        msg("user", "m1"),
        msg("assistant", "m2"),
        msg("user", "m3"),
        msg("user", "m4"),
    );

    store
        .save_conversation("u1", "t1", &[m1.clone(), m2.clone()])
        .await
        .unwrap();
    assert_eq!(
        store.get_conversation("u1", "t1").await.unwrap(),
        vec![m1.clone(), m2.clone()]
    );

    store.append_message("u1", "t1", &m3).await.unwrap();
    assert_eq!(
        store.get_conversation("u1", "t1").await.unwrap(),
        vec![m1, m2, m3]
    );

    store.save_conversation("u1", "t2", &[m4]).await.unwrap();
    assert_eq!(
        thread_set(store.as_ref(), "u1").await,
        BTreeSet::from(["t1".to_string(), "t2".to_string()])
    );

    assert!(store.delete_conversation("u1", "t1").await.unwrap());
    assert!(store.get_conversation("u1", "t1").await.unwrap().is_empty());
}

#[tokio::test]
async fn append_to_missing_conversation_creates_it() {
    let store = test_store().await;
    store
        .append_message("u1", "fresh", &msg("user", "first"))
        .await
        .unwrap();

    let record = store.find_conversation("u1", "fresh").await.unwrap().unwrap();
    assert_eq!(record.id, "u1_fresh");
    assert_eq!(record.messages, vec![msg("user", "first")]);
}

#[tokio::test]
async fn appends_grow_by_one_and_keep_order() {
    let store = test_store().await;
    for i in 0..5 {
        store
            .append_message("u1", "t1", &msg("user", &format!("n{i}")))
            .await
            .unwrap();
        let messages = store.get_conversation("u1", "t1").await.unwrap();
        assert_eq!(messages.len(), i + 1);
    }

    let contents: Vec<_> = store
        .get_conversation("u1", "t1")
        .await
        .unwrap()
        .iter()
        .map(|m| m.content().unwrap().to_string())
        .collect();
    assert_eq!(contents, vec!["n0", "n1", "n2", "n3", "n4"]);
}

#[tokio::test]
async fn append_after_save_keeps_saved_history() {
    let store = test_store().await;
    store
        .save_conversation("u1", "t1", &[msg("user", "saved")])
        .await
        .unwrap();
    let saved = store.find_conversation("u1", "t1").await.unwrap().unwrap();

    store
        .append_message("u1", "t1", &msg("assistant", "appended"))
        .await
        .unwrap();
    let after = store.find_conversation("u1", "t1").await.unwrap().unwrap();

    assert_eq!(after.created_at, saved.created_at);
    assert_eq!(
        after.messages,
        vec![msg("user", "saved"), msg("assistant", "appended")]
    );
}

#[tokio::test]
async fn concurrent_appends_lose_nothing() {
    let store = test_store().await;

    let mut handles = Vec::new();
    for i in 0..20 {
        let store = Arc::clone(&store);
        handles.push(tokio::spawn(async move {
            store
                .append_message("u1", "busy", &msg("user", &format!("c{i}")))
                .await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let messages = store.get_conversation("u1", "busy").await.unwrap();
    assert_eq!(messages.len(), 20);
    let distinct: BTreeSet<_> = messages.iter().filter_map(|m| m.content()).collect();
    assert_eq!(distinct.len(), 20);
    assert_eq!(store.list_user_threads("u1").await.unwrap(), vec!["busy"]);
}

#[tokio::test]
async fn one_document_per_pair() {
    let store = test_store().await;
    store.save_conversation("u1", "t1", &[]).await.unwrap();
    store.save_conversation("u1", "t1", &[msg("user", "x")]).await.unwrap();
    store.append_message("u1", "t1", &msg("user", "y")).await.unwrap();

    assert_eq!(store.list_user_threads("u1").await.unwrap(), vec!["t1"]);
    assert_eq!(store.get_conversation("u1", "t1").await.unwrap().len(), 2);
}

#[tokio::test]
async fn list_threads_is_scoped_to_user() {
    let store = test_store().await;
    store.save_conversation("alice", "a1", &[]).await.unwrap();
    store.save_conversation("alice", "a2", &[]).await.unwrap();
    store.append_message("bob", "b1", &msg("user", "hi")).await.unwrap();

    assert_eq!(
        thread_set(store.as_ref(), "alice").await,
        BTreeSet::from(["a1".to_string(), "a2".to_string()])
    );
    assert_eq!(
        thread_set(store.as_ref(), "bob").await,
        BTreeSet::from(["b1".to_string()])
    );
    assert!(store.list_user_threads("carol").await.unwrap().is_empty());
}

#[tokio::test]
async fn delete_is_true_exactly_once() {
    let store = test_store().await;
    store.save_conversation("u1", "t1", &[]).await.unwrap();

    assert!(store.delete_conversation("u1", "t1").await.unwrap());
    assert!(!store.delete_conversation("u1", "t1").await.unwrap());
    assert!(!store.delete_conversation("u1", "missing").await.unwrap());
}

#[tokio::test]
async fn saving_empty_list_reads_back_empty() {
    let store = test_store().await;
    store.save_conversation("u1", "t1", &[]).await.unwrap();

    assert!(store.get_conversation("u1", "t1").await.unwrap().is_empty());
    assert!(store.find_conversation("u1", "t1").await.unwrap().is_some());
}

#[tokio::test]
async fn wipe_clears_every_user() {
    let store = test_store().await;
    store.save_conversation("u1", "t1", &[]).await.unwrap();
    store.append_message("u2", "t2", &msg("user", "x")).await.unwrap();

    assert_eq!(store.wipe_all_conversations().await.unwrap(), 2);
    assert!(store.list_user_threads("u1").await.unwrap().is_empty());
    assert!(store.list_user_threads("u2").await.unwrap().is_empty());
}
