use std::path::PathBuf;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;

/// Append-only log of history envelopes, oldest first.
#[async_trait]
pub trait Storage: Send + Sync {
    async fn append(&self, entry: String) -> Result<(), String>;
    async fn entries(&self) -> Result<Vec<String>, String>;
    async fn clear(&self) -> Result<(), String>;
}

#[derive(Default)]
pub struct MemoryStorage {
    entries: RwLock<Vec<String>>,
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn append(&self, entry: String) -> Result<(), String> {
        self.entries.write().await.push(entry);
        Ok(())
    }

    async fn entries(&self) -> Result<Vec<String>, String> {
        Ok(self.entries.read().await.clone())
    }

    async fn clear(&self) -> Result<(), String> {
        self.entries.write().await.clear();
        Ok(())
    }
}

/// Keeps the log in memory and mirrors it to a JSON-lines file so a restart
/// picks up the current drawing.
pub struct FileStorage {
    path: PathBuf,
    entries: RwLock<Vec<String>>,
}

impl FileStorage {
    pub async fn open(path: PathBuf) -> Result<Self, String> {
        let entries = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => contents
                .lines()
                .filter(|line| !line.trim().is_empty())
                .map(str::to_string)
                .collect(),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(error) => {
                return Err(format!(
                    "Failed to read history file {}: {error}",
                    path.display()
                ))
            }
        };
        Ok(Self {
            path,
            entries: RwLock::new(entries),
        })
    }
}

#[async_trait]
impl Storage for FileStorage {
    async fn append(&self, entry: String) -> Result<(), String> {
        let mut entries = self.entries.write().await;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| format!("Failed to open history file {}: {e}", self.path.display()))?;
        let mut line = entry.clone();
        line.push('\n');
        file.write_all(line.as_bytes())
            .await
            .map_err(|e| format!("Failed to append to history file: {e}"))?;
        entries.push(entry);
        Ok(())
    }

    async fn entries(&self) -> Result<Vec<String>, String> {
        Ok(self.entries.read().await.clone())
    }

    async fn clear(&self) -> Result<(), String> {
        let mut entries = self.entries.write().await;
        tokio::fs::write(&self.path, b"")
            .await
            .map_err(|e| format!("Failed to truncate history file: {e}"))?;
        entries.clear();
        Ok(())
    }
}
