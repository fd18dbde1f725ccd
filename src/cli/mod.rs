//! # CLI 模块
//!
//! 使用 `clap` 定义命令行参数和子命令。
//!
//! ## 命令结构
//! - `merge`: 合并对称等价衍射点并计算原始/合并后 R 因子
//! - `extract`: 从 `.ref` 精修日志提取 R 因子
//! - `zscore`: 比较两种对映体模型的精修，判定绝对结构
//!
//! ## 依赖关系
//! - 被 `main.rs` 使用
//! - 子模块: merge, extract, zscore

pub mod extract;
pub mod merge;
pub mod zscore;

use clap::{Parser, Subcommand};

/// jana-tools - Jana 3D ED 精修的合并与 R 因子工具
#[derive(Parser)]
#[command(name = "jana-tools")]
#[command(version)]
#[command(about = "Merge 3D ED reflections and recompute R factors of Jana refinements", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// 可用的子命令
#[derive(Subcommand)]
pub enum Commands {
    /// Merge symmetry-equivalent reflections and recompute R factors (M50 + M83)
    Merge(merge::MergeArgs),

    /// List the R factors reported in Jana .ref files
    Extract(extract::ExtractArgs),

    /// Compare refinements of both enantiomorphs (z-score of the absolute structure)
    Zscore(zscore::ZScoreArgs),
}
