use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct Paths {
    pub base: PathBuf,
}

impl Paths {
    pub fn new() -> Self {
        let base = dirs::home_dir()
            .map(|h| h.join(".rampup"))
            .unwrap_or_else(|| PathBuf::from(".rampup"));
        Self { base }
    }

    pub fn with_base(base: PathBuf) -> Self {
        Self { base }
    }

    pub fn config_file(&self) -> PathBuf {
        self.base.join("config.json")
    }

    pub fn sessions_dir(&self) -> PathBuf {
        self.base.join("sessions")
    }

    pub fn session_file(&self, session_id: &str) -> PathBuf {
        let safe_id = session_id.replace([':', '/', '\\'], "_");
        self.sessions_dir().join(format!("{}.jsonl", safe_id))
    }

    pub fn index_db(&self) -> PathBuf {
        self.base.join("index").join("documents.db")
    }

    pub fn content_dir(&self) -> PathBuf {
        self.base.join("content")
    }

    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.base)?;
        std::fs::create_dir_all(self.sessions_dir())?;
        std::fs::create_dir_all(self.base.join("index"))?;
        std::fs::create_dir_all(self.content_dir())?;
        Ok(())
    }
}

impl Default for Paths {
    fn default() -> Self {
        Self::new()
    }
}
