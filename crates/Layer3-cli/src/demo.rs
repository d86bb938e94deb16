//! `retain demo` - guided walk-through of both subsystems

use retain_cache::{CacheCoordinator, RequestOptions};
use retain_foundation::RetentionConfig;
use retain_memory::{ConversationMemory, Role};
use std::convert::Infallible;
use std::time::{Duration, Instant};

const GENERATION_LATENCY: Duration = Duration::from_millis(500);

/// Stand-in for a model call
async fn slow_generate(model: &str, prompt: &str) -> Result<String, Infallible> {
    tokio::time::sleep(GENERATION_LATENCY).await;
    Ok(format!("[{}] Response to: {}", model, prompt))
}

pub async fn run(config: RetentionConfig, model: &str) -> anyhow::Result<()> {
    cache_walkthrough(&config, model).await?;
    memory_walkthrough(&config)?;
    println!("\n✓ Demo complete!");
    Ok(())
}

async fn cache_walkthrough(config: &RetentionConfig, model: &str) -> anyhow::Result<()> {
    println!("🚀 Cache walk-through\n");

    let cache = CacheCoordinator::new(config.cache.clone()).await?;
    println!("Shared tier: {}\n", cache.shared().state());

    let options = RequestOptions::new().with("temperature", 0.7);
    println!(
        "Key for \"What is Python?\": {}\n",
        cache.derive_key(model, "What is Python?", Some(&options))
    );
    let steps = [
        ("first request (miss)", "What is Python?"),
        ("same request (tier 1 hit)", "What is Python?"),
        ("different request (miss)", "Explain machine learning"),
        ("too short to cache (bypass)", "hi"),
    ];

    for (i, (label, prompt)) in steps.iter().enumerate() {
        let started = Instant::now();
        let response = cache
            .get_or_generate(
                model,
                prompt,
                || slow_generate(model, prompt),
                Some(&options),
                None,
            )
            .await?;
        println!(
            "{}. {:<30} {:>6.0?}  {}",
            i + 1,
            label,
            started.elapsed(),
            response
        );
    }

    println!("\n{}", cache.stats());

    let report = cache.invalidate(Some(model)).await;
    println!(
        "Invalidated {}: {} local, {} shared",
        model, report.local_removed, report.shared_removed
    );
    Ok(())
}

fn memory_walkthrough(config: &RetentionConfig) -> anyhow::Result<()> {
    println!("\n🧠 Memory walk-through\n");

    let memory = ConversationMemory::new(config.memory.clone())?;
    let session = "demo";

    let turns = [
        (Role::User, "What is Python?"),
        (
            Role::Assistant,
            "Python is a high-level programming language created by Guido van Rossum. \
             It emphasizes code readability and is widely used in web development, data science and automation.",
        ),
        (Role::User, "How do I install Flask?"),
        (Role::Assistant, "You can install Flask using pip install flask."),
        (Role::User, "Can you explain routing?"),
        (
            Role::Assistant,
            "Routes map URLs to view functions with the @app.route decorator.",
        ),
        (Role::User, "Why does my route return a 404 error?"),
    ];

    for (role, content) in turns {
        let message = memory.add_message(session, role, content);
        println!(
            "{:<9} importance {:.2}  keywords {:?}",
            role.label(),
            message.importance,
            message.keywords
        );
    }

    println!("\n{}", memory.get_context(session));

    if let Some(analytics) = memory.session_analytics(session) {
        println!("{}", serde_json::to_string_pretty(&analytics)?);
    }
    Ok(())
}
