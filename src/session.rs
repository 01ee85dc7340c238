//! 会话存储抽象
//! 身份解析只需要按键读写 JSON 值；HTTP 层使用 tower-sessions，测试使用内存实现

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Mutex;

use crate::error::AppError;

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Value>, AppError>;

    async fn set(&self, key: &str, value: Value) -> Result<(), AppError>;

    async fn remove(&self, key: &str) -> Result<(), AppError>;

    /// 更换会话 ID 并保留数据；身份变化前调用，旧 Cookie 随之失效
    async fn cycle_id(&self) -> Result<(), AppError>;
}

#[async_trait]
impl SessionStore for tower_sessions::Session {
    async fn get(&self, key: &str) -> Result<Option<Value>, AppError> {
        tower_sessions::Session::get::<Value>(self, key)
            .await
            .map_err(|e| AppError::Session(e.to_string()))
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), AppError> {
        self.insert(key, value)
            .await
            .map_err(|e| AppError::Session(e.to_string()))
    }

    async fn remove(&self, key: &str) -> Result<(), AppError> {
        tower_sessions::Session::remove::<Value>(self, key)
            .await
            .map(|_| ())
            .map_err(|e| AppError::Session(e.to_string()))
    }

    async fn cycle_id(&self) -> Result<(), AppError> {
        tower_sessions::Session::cycle_id(self)
            .await
            .map_err(|e| AppError::Session(e.to_string()))
    }
}

/// 单个会话的内存实现
#[derive(Debug, Default)]
pub struct MemorySession {
    values: Mutex<HashMap<String, Value>>,
    generation: AtomicU64,
}

impl MemorySession {
    pub fn new() -> Self {
        Self::default()
    }

    /// 会话 ID 已更换的次数
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionStore for MemorySession {
    async fn get(&self, key: &str) -> Result<Option<Value>, AppError> {
        Ok(self.values.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), AppError> {
        self.values.lock().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), AppError> {
        self.values.lock().await.remove(key);
        Ok(())
    }

    async fn cycle_id(&self) -> Result<(), AppError> {
        self.generation.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
