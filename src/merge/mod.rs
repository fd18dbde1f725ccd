//! # 合并与 R 因子模块
//!
//! 由 M50 的点群与 M83 的衍射点计算原始与合并后的 R 因子汇总。
//!
//! ## 流程
//! 1. 按数据块与规范指数分组（`reducer`）
//! 2. 合并每组（`engine`）
//! 3. 对原始集合与合并集合分别计算 R 因子，全局与逐块（`rfactors`）
//!
//! ## 子模块
//! - `reducer`: 对称约化
//! - `engine`: 合并引擎
//! - `rfactors`: R 因子与 GOF
//! - `sum`: 顺序无关求和
//! - `enantiomorph`: 对映体精修的 z 分数比较
//!
//! ## 依赖关系
//! - 被 `commands/merge.rs`、`commands/zscore.rs` 使用
//! - 使用 `models/`, `parsers/`

pub mod enantiomorph;
pub mod engine;
pub mod reducer;
pub mod rfactors;
pub mod sum;

pub use reducer::SymmetryReducer;

use crate::error::Result;
use crate::models::{BlockSummary, RFactorSummary};
use crate::parsers::m50::Settings;
use crate::parsers::m83::ReflectionList;

use clap::ValueEnum;
use serde::Serialize;
use std::collections::BTreeMap;

/// 重复组强度的平均方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize)]
pub enum Averaging {
    /// 1/σ² 加权平均
    #[default]
    Weighted,
    /// 算术平均，σ = sqrt(Σσ²)/n
    Arithmetic,
}

impl std::fmt::Display for Averaging {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Averaging::Weighted => write!(f, "weighted"),
            Averaging::Arithmetic => write!(f, "arithmetic"),
        }
    }
}

/// 合并参数
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MergeConfig {
    /// observed 判据 Io > k·σ(Io) 中的 k
    pub sigma_factor: f64,
    /// 合并权重 1/(σ(Fo)² + (u·Fo)²) 中的 u
    pub instability_factor: f64,
    pub averaging: Averaging,
    /// 是否把 Friedel 对视为等价
    pub friedel: bool,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            sigma_factor: 3.0,
            instability_factor: 0.01,
            averaging: Averaging::Weighted,
            friedel: false,
        }
    }
}

/// 一次精修的输入数据
#[derive(Debug, Clone)]
pub struct Refinement {
    /// 精修名称
    pub name: String,
    pub settings: Settings,
    pub reflections: ReflectionList,
    /// 精修参数个数（来自 `.ref` 或命令行）
    pub parameters: Option<usize>,
    /// 各数据块平均厚度（来自 M42）
    pub thickness: BTreeMap<u32, f64>,
}

/// R 因子分析器
pub struct RFactorAnalyzer {
    config: MergeConfig,
}

impl RFactorAnalyzer {
    pub fn new(config: MergeConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MergeConfig {
        &self.config
    }

    /// 计算原始与合并后的 R 因子汇总
    pub fn analyze(&self, refinement: &Refinement) -> Result<RFactorSummary> {
        let symmetry = if self.config.friedel {
            refinement.settings.symmetry.clone().with_friedel()?
        } else {
            refinement.settings.symmetry.clone()
        };
        let reducer = SymmetryReducer::uniform(symmetry);

        let reflections = &refinement.reflections.reflections;
        let (merged, duplicates) = engine::merge(reflections, &reducer, &self.config);

        let raw_blocks = rfactors::compute_by_block(reflections);
        let mut merged_blocks = rfactors::compute_by_block(&merged);

        let blocks = raw_blocks
            .into_iter()
            .map(|(block, raw)| BlockSummary {
                block,
                raw,
                merged: merged_blocks.remove(&block),
                thickness: refinement.thickness.get(&block).copied(),
            })
            .collect();

        Ok(RFactorSummary {
            name: refinement.name.clone(),
            space_group: refinement.settings.space_group.clone(),
            parameters: refinement.parameters,
            gof: rfactors::goodness_of_fit(reflections, refinement.parameters),
            raw: rfactors::compute(reflections),
            merged: Some(rfactors::compute(&merged)),
            duplicates: Some(duplicates),
            blocks,
        })
    }
}
