use conductor_agent::ChatResponse;
use std::io::{BufRead, Write};
use std::path::PathBuf;

use super::app::App;

pub async fn run(
    data_dir: Option<PathBuf>,
    message: Option<String>,
    session: Option<String>,
    domain: Option<String>,
) -> anyhow::Result<()> {
    let app = App::build(data_dir)?;
    let session_id = session.unwrap_or_else(|| format!("cli:{}", uuid::Uuid::new_v4()));
    let domain = domain.as_deref();

    if let Some(message) = message {
        let resp = app.orchestrator.handle(&session_id, &message, domain).await;
        print_response(&resp)?;
        return Ok(());
    }

    println!(
        "conductor interactive mode. Session: {} (domain: {})",
        session_id,
        domain.unwrap_or(app.catalog.default_domain())
    );
    println!("Type /summary for a session summary, /quit to exit.");

    let stdin = std::io::stdin();
    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let input = line.trim();
        match input {
            "" => continue,
            "/quit" | "/exit" => break,
            "/summary" => {
                let limit = app.config.orchestrator.history_limit;
                println!("{}", app.orchestrator.bridge().summarize_session(&session_id, limit).await);
            }
            _ => {
                let resp = app.orchestrator.handle(&session_id, input, domain).await;
                print_response(&resp)?;
            }
        }
    }
    Ok(())
}

fn print_response(resp: &ChatResponse) -> anyhow::Result<()> {
    if !resp.is_ok() {
        eprintln!(
            "Error [{}]: {}",
            resp.domain,
            resp.error.as_deref().unwrap_or("unknown error")
        );
        return Ok(());
    }

    match resp.reply() {
        Some(reply) => println!("{}", reply),
        None => println!("{}", serde_json::to_string_pretty(&resp.result)?),
    }
    println!(
        "  [domain: {}, intent: {}, method: {}]",
        resp.domain,
        resp.intent.as_deref().unwrap_or("-"),
        resp.method.map(|m| m.to_string()).unwrap_or_else(|| "-".to_string())
    );
    Ok(())
}
