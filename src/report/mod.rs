//! # 报告模块
//!
//! 消费 `RFactorSummary`、`RefinementLog` 与对映体比较结果，输出终端表格、CSV 与 CIF 文本块。
//!
//! ## 子模块
//! - `table`: 终端表格
//! - `export`: CSV 导出
//! - `cif`: CIF 写出
//!
//! ## 依赖关系
//! - 被 `commands/` 使用
//! - 使用 `models/summary.rs`

pub mod cif;
pub mod export;
pub mod table;
