use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::Mutex;
use tokio::fs;

use crate::services::error::ServiceError;

/// Byte storage for event attachments.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    async fn upload(&self, key: &str, data: Vec<u8>) -> Result<(), ServiceError>;
    async fn download(&self, key: &str) -> Result<Vec<u8>, ServiceError>;
    async fn delete(&self, key: &str) -> Result<(), ServiceError>;
}

pub struct LocalStorage {
    base_path: PathBuf,
}

impl LocalStorage {
    pub async fn new(base_path: impl Into<PathBuf>) -> Result<Self, anyhow::Error> {
        let base_path = base_path.into();
        fs::create_dir_all(&base_path).await?;
        Ok(Self { base_path })
    }

    fn resolve(&self, key: &str) -> Result<PathBuf, ServiceError> {
        let relative = Path::new(key);
        let safe = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        if key.is_empty() || !safe {
            return Err(ServiceError::Internal(anyhow::anyhow!(
                "Refusing storage key outside base path: {}",
                key
            )));
        }
        Ok(self.base_path.join(relative))
    }
}

#[async_trait]
impl ObjectStorage for LocalStorage {
    async fn upload(&self, key: &str, data: Vec<u8>) -> Result<(), ServiceError> {
        let path = self.resolve(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| anyhow::anyhow!("Failed to create {}: {}", parent.display(), e))?;
        }
        fs::write(&path, data)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to write {}: {}", path.display(), e))?;
        Ok(())
    }

    async fn download(&self, key: &str) -> Result<Vec<u8>, ServiceError> {
        let path = self.resolve(key)?;
        match fs::read(&path).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(ServiceError::NotFound("File"))
            }
            Err(e) => Err(anyhow::anyhow!("Failed to read {}: {}", path.display(), e).into()),
        }
    }

    async fn delete(&self, key: &str) -> Result<(), ServiceError> {
        let path = self.resolve(key)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(anyhow::anyhow!("Failed to delete {}: {}", path.display(), e).into()),
        }
    }
}

#[derive(Default)]
pub struct InMemoryStorage {
    objects: Mutex<HashMap<String, Vec<u8>>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.objects
            .lock()
            .map(|objects| objects.contains_key(key))
            .unwrap_or(false)
    }
}

#[async_trait]
impl ObjectStorage for InMemoryStorage {
    async fn upload(&self, key: &str, data: Vec<u8>) -> Result<(), ServiceError> {
        self.objects
            .lock()
            .map_err(|e| anyhow::anyhow!("In-memory storage mutex poisoned: {}", e))?
            .insert(key.to_string(), data);
        Ok(())
    }

    async fn download(&self, key: &str) -> Result<Vec<u8>, ServiceError> {
        self.objects
            .lock()
            .map_err(|e| anyhow::anyhow!("In-memory storage mutex poisoned: {}", e))?
            .get(key)
            .cloned()
            .ok_or(ServiceError::NotFound("File"))
    }

    async fn delete(&self, key: &str) -> Result<(), ServiceError> {
        self.objects
            .lock()
            .map_err(|e| anyhow::anyhow!("In-memory storage mutex poisoned: {}", e))?
            .remove(key);
        Ok(())
    }
}
