//! Trellis 统一错误类型定义
//!
//! 使用 `thiserror` 库提供统一的错误处理，支持错误链式传播。
//! 旅行工具的失败不走这里，见 `travel::TravelError`。

use std::io;
use thiserror::Error;

/// Trellis 错误类型
#[derive(Debug, Error)]
pub enum TrellisError {
    /// I/O 错误（文件读写、目录操作等）
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON 解析 / 序列化错误
    #[error("JSON error: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// SQLite 错误
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// 存储错误（通用）
    #[error("Storage error: {0}")]
    Storage(String),

    /// 资源不存在
    #[error("Not found: {0}")]
    NotFound(String),

    /// 无效数据（用户输入或持久化内容）
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// 除数为零
    #[error("Cannot divide by zero!")]
    DivisionByZero,
}

/// Trellis Result 类型别名
pub type Result<T> = std::result::Result<T, TrellisError>;

impl TrellisError {
    /// 创建 Storage 错误
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    /// 创建 NotFound 错误
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// 创建 InvalidData 错误
    pub fn invalid_data(msg: impl Into<String>) -> Self {
        Self::InvalidData(msg.into())
    }
}
