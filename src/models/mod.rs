//! # 数据模型模块
//!
//! 定义衍射点、对称操作与 R 因子汇总的数据模型。
//!
//! ## 依赖关系
//! - 被 `parsers/`、`merge/`、`report/` 和 `commands/` 使用
//! - 子模块: reflection, symmetry, summary

pub mod reflection;
pub mod summary;
pub mod symmetry;

pub use reflection::{Amplitudes, GroupKey, Hkl, MergedReflection, Observation, Reflection};
pub use summary::{
    fixed, percent, BlockSummary, DuplicateStatistics, GoodnessOfFit, RFactorSummary, RFactors,
};
pub use symmetry::{BlockSymmetry, SymmetryOperation, SymmetryOperationSet};
