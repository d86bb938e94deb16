//! `retain chat` - line-oriented conversation over stdin

use retain_cache::CacheCoordinator;
use retain_foundation::{JsonStore, RetentionConfig};
use retain_memory::{ConversationMemory, Role, SessionSnapshot};
use std::convert::Infallible;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};

pub struct ChatOptions {
    pub model: String,
    pub session: String,
    /// Where the session is restored from and saved to, if persisting
    pub store: Option<JsonStore>,
    pub latency: Duration,
}

pub async fn run(config: RetentionConfig, options: ChatOptions) -> anyhow::Result<()> {
    let cache = CacheCoordinator::new(config.cache.clone()).await?;
    let memory = ConversationMemory::new(config.memory.clone())?;

    if let Some(store) = &options.store {
        if let Some(snapshot) = SessionSnapshot::load(store, &options.session)? {
            println!(
                "Resumed session {} ({} messages)",
                options.session, snapshot.metadata.total_messages
            );
            memory.import_session(&options.session, snapshot);
        }
    }

    println!(
        "Session {} - one prompt per line, /clear to forget, Ctrl-D to finish\n",
        options.session
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let prompt = line.trim();
        if prompt.is_empty() {
            continue;
        }

        if prompt == "/clear" {
            memory.clear_session(&options.session);
            if let Some(store) = &options.store {
                SessionSnapshot::remove(store, &options.session)?;
            }
            println!("Session cleared");
            continue;
        }

        memory.add_message(&options.session, Role::User, prompt);

        let latency = options.latency;
        let model = options.model.as_str();
        let reply = cache
            .get_or_generate(
                model,
                prompt,
                || echo(model, prompt, latency),
                None,
                None,
            )
            .await?;

        println!("{}", reply);
        memory.add_message(&options.session, Role::Assistant, reply);
    }

    println!("\n{}", memory.get_context(&options.session));
    println!("{}", cache.stats());

    if let Some(store) = &options.store {
        if let Some(snapshot) = memory.export_session(&options.session) {
            snapshot.save(store, &options.session)?;
            tracing::info!(session = %options.session, "Session saved");
        }
    }

    Ok(())
}

async fn echo(model: &str, prompt: &str, latency: Duration) -> Result<String, Infallible> {
    tokio::time::sleep(latency).await;
    Ok(format!("[{}] echo: {}", model, prompt))
}
