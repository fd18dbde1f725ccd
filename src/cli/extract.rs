//! # extract 子命令 CLI 定义
//!
//! 从 `.ref` 精修日志中提取精修程序报告的 R 因子。
//!
//! ## 依赖关系
//! - 被 `cli/mod.rs` 使用
//! - 参数传递给 `commands/extract.rs`

use clap::Args;
use std::path::PathBuf;

/// extract 子命令参数
#[derive(Args, Debug)]
pub struct ExtractArgs {
    /// Folders containing Jana .ref files (default: current directory)
    pub dirs: Vec<PathBuf>,

    /// Search subdirectories as well
    #[arg(short, long, default_value_t = false)]
    pub recursive: bool,

    /// Export the extracted values to a CSV file
    #[arg(long)]
    pub csv: Option<PathBuf>,
}
