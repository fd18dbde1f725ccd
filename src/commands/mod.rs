//! # 命令执行模块
//!
//! 实现各子命令的业务逻辑。
//!
//! ## 依赖关系
//! - 被 `main.rs` 调用
//! - 使用 `cli/`, `parsers/`, `merge/`, `report/`, `utils/`
//! - 子模块: merge, extract, zscore

pub mod extract;
pub mod merge;
pub mod zscore;

use crate::cli::Commands;
use crate::error::Result;

/// 执行命令
pub fn run(cmd: Commands) -> Result<()> {
    match cmd {
        Commands::Merge(args) => merge::execute(args),
        Commands::Extract(args) => extract::execute(args),
        Commands::Zscore(args) => zscore::execute(args),
    }
}
