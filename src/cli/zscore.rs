//! # zscore 子命令 CLI 定义
//!
//! 比较同一数据对两种对映体模型的精修结果（两个 M83 文件）。
//!
//! ## 依赖关系
//! - 被 `cli/mod.rs` 使用
//! - 参数传递给 `commands/zscore.rs`

use crate::cli::merge::LayoutChoice;

use clap::Args;
use std::path::PathBuf;

/// zscore 子命令参数
#[derive(Args, Debug)]
pub struct ZScoreArgs {
    /// Refinement of the first enantiomorph (name.m83 or name)
    pub first: PathBuf,

    /// Refinement of the inverted model (default: name_INV next to the first)
    pub second: Option<PathBuf>,

    /// M83 column layout
    #[arg(long, value_enum, default_value = "auto")]
    pub layout: LayoutChoice,

    /// Export the comparison to a CSV file
    #[arg(long)]
    pub csv: Option<PathBuf>,
}
