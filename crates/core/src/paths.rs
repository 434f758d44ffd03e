use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct Paths {
    pub base: PathBuf,
}

impl Paths {
    pub fn new() -> Self {
        let base = dirs::home_dir()
            .map(|h| h.join(".conductor"))
            .unwrap_or_else(|| PathBuf::from(".conductor"));
        Self { base }
    }

    pub fn with_base(base: PathBuf) -> Self {
        Self { base }
    }

    pub fn config_file(&self) -> PathBuf {
        self.base.join("config.json")
    }

    /// Default location of the per-domain intent and workflow files.
    pub fn data_dir(&self) -> PathBuf {
        self.base.join("data")
    }

    pub fn memory_db(&self) -> PathBuf {
        self.base.join("memory.db")
    }

    pub fn feedback_dir(&self) -> PathBuf {
        self.base.join("feedback")
    }

    pub fn feedback_file(&self, date: &str) -> PathBuf {
        self.feedback_dir().join(format!("{}.jsonl", date))
    }
}

impl Default for Paths {
    fn default() -> Self {
        Self::new()
    }
}
