use conductor_storage::FeedbackLog;

use super::app::load_config;

pub fn show(date: Option<String>) -> anyhow::Result<()> {
    let (_, paths) = load_config()?;
    let log = FeedbackLog::new(paths);
    let date = date.unwrap_or_else(|| chrono::Utc::now().format("%Y-%m-%d").to_string());
    if chrono::NaiveDate::parse_from_str(&date, "%Y-%m-%d").is_err() {
        anyhow::bail!("Invalid date '{}', expected YYYY-MM-DD", date);
    }

    let records = log.read_date(&date)?;
    if records.is_empty() {
        println!("(No feedback recorded on {})", date);
        return Ok(());
    }

    println!();
    println!("Feedback for {} ({} records)", date, records.len());
    for r in &records {
        println!(
            "  {} {:<8} {:<7} {:.2}  {}  {}",
            r.timestamp.format("%H:%M:%S"),
            r.source,
            r.decision.as_str(),
            r.score,
            r.session_id,
            r.comment
        );
    }
    println!();
    Ok(())
}
