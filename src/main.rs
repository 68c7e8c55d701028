use std::collections::BTreeSet;

use anyhow::{Context, ensure};
use uuid::Uuid;

use conversation_store::store::{self, ConversationStore};
use conversation_store::{Message, StoreConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = StoreConfig::from_env()?;

    eprintln!("🗂  Conversation store v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Backend: {}", config.backend);
    eprintln!("   Database: {}", config.database_name);

    let store = store::connect(&config)
        .await
        .context("failed to open conversation store")?;

    // Fresh user so the check never touches real conversations.
    let user_id = format!("smoke-{}", Uuid::new_v4());
    let outcome = smoke_check(store.as_ref(), &user_id).await;

    for thread in ["test_thread", "thread2"] {
        if let Err(e) = store.delete_conversation(&user_id, thread).await {
            tracing::warn!(thread, "Cleanup failed: {e}");
        }
    }
    store.close().await?;

    outcome?;
    eprintln!("\n✅ All checks passed");
    Ok(())
}

async fn smoke_check(store: &dyn ConversationStore, user_id: &str) -> anyhow::Result<()> {
    eprintln!("\n→ ensure_indexes");
    store.ensure_indexes().await?;

    eprintln!("→ save_conversation");
    let messages = vec![
        Message::new("user", "hello world"),
        Message::new("assistant", "Hi there!"),
    ];
    store
        .save_conversation(user_id, "test_thread", &messages)
        .await?;

    eprintln!("→ get_conversation");
    let loaded = store.get_conversation(user_id, "test_thread").await?;
    ensure!(
        loaded == messages,
        "expected the 2 saved messages, got {}",
        loaded.len()
    );

    eprintln!("→ append_message");
    store
        .append_message(user_id, "test_thread", &Message::new("user", "another message"))
        .await?;
    let loaded = store.get_conversation(user_id, "test_thread").await?;
    ensure!(loaded.len() == 3, "expected 3 messages, got {}", loaded.len());

    eprintln!("→ list_user_threads");
    store
        .save_conversation(user_id, "thread2", &[Message::new("user", "test")])
        .await?;
    let threads: BTreeSet<String> = store.list_user_threads(user_id).await?.into_iter().collect();
    ensure!(
        threads == BTreeSet::from(["test_thread".to_string(), "thread2".to_string()]),
        "unexpected threads: {threads:?}"
    );

    eprintln!("→ delete_conversation");
    ensure!(
        store.delete_conversation(user_id, "test_thread").await?,
        "delete reported nothing removed"
    );
    ensure!(
        !store.delete_conversation(user_id, "test_thread").await?,
        "second delete reported a removal"
    );
    ensure!(
        store.get_conversation(user_id, "test_thread").await?.is_empty(),
        "deleted conversation still readable"
    );

    Ok(())
}
