use conductor_agent::StateBridge;
use conductor_core::MemoryBackendKind;

use super::app::{load_config, open_backend};

fn open_bridge() -> anyhow::Result<Option<(StateBridge, usize)>> {
    let (config, paths) = load_config()?;
    if config.memory.backend == MemoryBackendKind::InMemory {
        println!("(The in_memory backend keeps nothing between runs; set memory.backend to sqlite)");
        return Ok(None);
    }
    let backend = open_backend(&config, &paths)?;
    Ok(Some((StateBridge::new(backend), config.orchestrator.history_limit)))
}

pub async fn show(session_id: &str) -> anyhow::Result<()> {
    let Some((bridge, _)) = open_bridge()? else {
        return Ok(());
    };
    let state = bridge.load(session_id).await?;
    if state.is_empty() {
        println!("(No state for session {})", session_id);
    } else {
        println!("{}", serde_json::to_string_pretty(&state.to_value())?);
    }
    Ok(())
}

pub async fn history(session_id: &str, limit: Option<usize>) -> anyhow::Result<()> {
    let Some((bridge, default_limit)) = open_bridge()? else {
        return Ok(());
    };
    let messages = bridge.recent_messages(session_id, limit.unwrap_or(default_limit)).await;
    if messages.is_empty() {
        println!("(No messages for session {})", session_id);
        return Ok(());
    }
    for msg in &messages {
        println!(
            "[{}] {:>9}: {}",
            msg.timestamp.format("%Y-%m-%d %H:%M:%S"),
            msg.role,
            msg.content
        );
    }
    println!();
    println!("{}", bridge.summarize_session(session_id, limit.unwrap_or(default_limit)).await);
    Ok(())
}

pub async fn clear(session_id: &str) -> anyhow::Result<()> {
    let Some((bridge, _)) = open_bridge()? else {
        return Ok(());
    };
    bridge.clear(session_id).await?;
    println!("Cleared session {}", session_id);
    Ok(())
}
