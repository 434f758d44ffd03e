use std::path::PathBuf;

use super::app::App;

pub async fn route(data_dir: Option<PathBuf>, query: &str, domain: Option<&str>) -> anyhow::Result<()> {
    let app = App::build(data_dir)?;
    let decision = app.orchestrator.router().classify(query.trim(), domain).await;
    println!("{}", serde_json::to_string_pretty(&decision)?);
    Ok(())
}

pub fn graph(data_dir: Option<PathBuf>, intent: &str, domain: Option<&str>) -> anyhow::Result<()> {
    let app = App::build(data_dir)?;
    let domain = domain.unwrap_or(app.catalog.default_domain());
    let graph = app.orchestrator.builder().build(intent, domain)?;
    println!("{}", serde_json::to_string_pretty(&graph.describe())?);
    Ok(())
}

pub fn domains(data_dir: Option<PathBuf>) -> anyhow::Result<()> {
    let app = App::build(data_dir)?;
    let default = app.catalog.default_domain();

    println!();
    for domain in app.catalog.domains() {
        let marker = if domain.name == default { " (default)" } else { "" };
        println!("{}{}", domain.name, marker);
        for intent in &domain.intents {
            let workflow = if domain.workflow(&intent.name).is_some() { "" } else { "  [no workflow]" };
            println!("  - {}: {}{}", intent.name, intent.description, workflow);
            if !intent.keywords.is_empty() {
                println!("      keywords: {}", intent.keywords.join(", "));
            }
        }
    }
    println!();
    Ok(())
}
