//! # 统一错误处理模块
//!
//! 定义 jana-tools 的所有错误类型，使用 `thiserror` 派生。
//!
//! 未定义的统计量（分母为零）不是错误，用 `Option<f64>::None` 表示，
//! 输出时显示为 "n/a"。
//!
//! ## 依赖关系
//! - 被所有其他模块使用
//! - 无外部模块依赖

use thiserror::Error;

/// jana-tools 统一错误类型
#[derive(Error, Debug)]
pub enum JanaError {
    // ─────────────────────────────────────────────────────────────
    // I/O 错误
    // ─────────────────────────────────────────────────────────────
    #[error("Failed to read file: {path}")]
    FileReadError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file: {path}")]
    FileWriteError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Directory not found: {path}")]
    DirectoryNotFound { path: String },

    #[error("File not found: {path}")]
    FileNotFound { path: String },

    // ─────────────────────────────────────────────────────────────
    // 解析错误
    // ─────────────────────────────────────────────────────────────
    #[error("Malformed file {path}, line {line}: {reason}")]
    MalformedFile {
        path: String,
        line: usize,
        reason: String,
    },

    #[error("Reflection lists are not compatible: {0}")]
    IncompatibleFiles(String),

    // ─────────────────────────────────────────────────────────────
    // 对称性错误
    // ─────────────────────────────────────────────────────────────
    #[error("Invalid symmetry operation set: {0}")]
    SymmetryError(String),

    // ─────────────────────────────────────────────────────────────
    // 参数错误
    // ─────────────────────────────────────────────────────────────
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    // ─────────────────────────────────────────────────────────────
    // CSV 错误
    // ─────────────────────────────────────────────────────────────
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    // ─────────────────────────────────────────────────────────────
    // 其他
    // ─────────────────────────────────────────────────────────────
    #[error("No matching files found with pattern: {pattern}")]
    NoFilesFound { pattern: String },

    #[error("{0}")]
    Other(String),
}

impl JanaError {
    /// 构造带文件与行号的格式错误
    pub fn malformed(path: &str, line: usize, reason: impl Into<String>) -> Self {
        JanaError::MalformedFile {
            path: path.to_string(),
            line,
            reason: reason.into(),
        }
    }
}

/// Result 类型别名
pub type Result<T> = std::result::Result<T, JanaError>;
