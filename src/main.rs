//! # jana-tools - Jana 3D ED 精修的合并与 R 因子工具
//!
//! 读取 Jana 精修文件，把对称等价衍射点合并后重新计算 R 因子，
//! 便于比较动力学精修中原始与合并数据的拟合质量。
//!
//! ## 子命令
//! - `merge`   - 合并衍射点并报告原始/合并 R 因子（M50 + M83，可选 .ref、M42、CIF）
//! - `extract` - 列出 `.ref` 日志中精修程序报告的 R 因子
//! - `zscore`  - 比较两种对映体模型的精修（绝对结构 z 分数）
//!
//! ## 依赖关系
//! ```text
//! main.rs
//!   ├── cli/        (命令行参数定义)
//!   ├── commands/   (命令执行逻辑)
//!   │     ├── parsers/   (M50, M83, M42, .ref 解析器)
//!   │     ├── merge/     (对称约化、合并、R 因子)
//!   │     ├── report/    (表格、CSV、CIF 输出)
//!   │     ├── batch/     (批量文件收集与并行执行)
//!   │     └── models/    (数据模型)
//!   ├── utils/      (工具函数)
//!   └── error.rs    (错误处理)
//! ```

mod batch;
mod cli;
mod commands;
mod error;
mod merge;
mod models;
mod parsers;
mod report;
mod utils;

use clap::Parser;
use cli::Cli;

fn main() {
    // Initialize colored output for Windows compatibility
    #[cfg(windows)]
    colored::control::set_virtual_terminal(true).ok();

    let cli = Cli::parse();

    if let Err(e) = commands::run(cli.command) {
        utils::output::print_error(&format!("{}", e));
        std::process::exit(1);
    }
}
