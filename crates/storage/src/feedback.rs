use async_trait::async_trait;
use chrono::Utc;
use conductor_core::types::FeedbackRecord;
use conductor_core::{Paths, Result};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use tracing::error;

/// Destination for feedback records. A failing sink fails the feedback step.
#[async_trait]
pub trait FeedbackSink: Send + Sync {
    async fn persist(&self, record: &FeedbackRecord) -> Result<()>;
}

/// Adapts a synchronous closure into a sink.
pub struct FnSink<F> {
    func: F,
}

impl<F> FnSink<F>
where
    F: Fn(&FeedbackRecord) -> Result<()> + Send + Sync,
{
    pub fn new(func: F) -> Self {
        Self { func }
    }
}

#[async_trait]
impl<F> FeedbackSink for FnSink<F>
where
    F: Fn(&FeedbackRecord) -> Result<()> + Send + Sync,
{
    async fn persist(&self, record: &FeedbackRecord) -> Result<()> {
        (self.func)(record)
    }
}

/// Daily JSONL feedback log under `<base>/feedback/YYYY-MM-DD.jsonl`.
pub struct FeedbackLog {
    paths: Paths,
}

impl FeedbackLog {
    pub fn new(paths: Paths) -> Self {
        Self { paths }
    }

    fn log_file_path(&self, date: &str) -> PathBuf {
        self.paths.feedback_file(date)
    }

    pub fn append(&self, record: &FeedbackRecord) -> Result<()> {
        let date = record.timestamp.format("%Y-%m-%d").to_string();
        let log_file = self.log_file_path(&date);

        if let Some(parent) = log_file.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut file = OpenOptions::new().create(true).append(true).open(&log_file)?;
        let json = serde_json::to_string(record)?;
        writeln!(file, "{}", json)?;
        Ok(())
    }

    /// Read feedback records from a specific date
    pub fn read_date(&self, date: &str) -> Result<Vec<FeedbackRecord>> {
        let log_file = self.log_file_path(date);
        if !log_file.exists() {
            return Ok(Vec::new());
        }

        let content = std::fs::read_to_string(&log_file)?;
        let mut records = Vec::new();
        for line in content.lines() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<FeedbackRecord>(line) {
                Ok(record) => records.push(record),
                Err(e) => {
                    error!(error = %e, line = %line, "Failed to parse feedback record");
                }
            }
        }
        Ok(records)
    }

    pub fn read_today(&self) -> Result<Vec<FeedbackRecord>> {
        let today = Utc::now().format("%Y-%m-%d").to_string();
        self.read_date(&today)
    }
}

#[async_trait]
impl FeedbackSink for FeedbackLog {
    async fn persist(&self, record: &FeedbackRecord) -> Result<()> {
        self.append(record)
    }
}
