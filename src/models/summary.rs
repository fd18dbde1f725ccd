//! # R 因子汇总数据模型
//!
//! 合并引擎与 R 因子计算器的结构化输出，供表格、CSV 与 CIF 输出使用。
//! 所有 R 值以分数存储（0.0965 表示 9.65%），无法定义时为 `None`。
//!
//! ## 依赖关系
//! - 被 `merge/` 构造
//! - 被 `report/` 与 `commands/` 消费

use serde::Serialize;

/// 一组 R 因子
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct RFactors {
    pub nobs: usize,
    pub nall: usize,
    pub robs: Option<f64>,
    pub wrobs: Option<f64>,
    pub rall: Option<f64>,
    pub wrall: Option<f64>,
    /// 基于强度的 wR2(obs)
    pub wr2obs: Option<f64>,
    /// 基于强度的 wR2(all)
    pub wr2all: Option<f64>,
}

/// 拟合优度
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct GoodnessOfFit {
    pub obs: Option<f64>,
    pub all: Option<f64>,
}

/// 重复衍射点与合并统计（"File check"）
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct DuplicateStatistics {
    /// 输入衍射点数
    pub input_count: usize,
    /// 同一数据块内完全相同 hkl 的重复数
    pub exact_duplicates: usize,
    /// 去除完全重复后的衍射点数
    pub unique_indices: usize,
    /// 点群下的独立衍射点（分组）数
    pub groups: usize,
    /// 输入数 − 分组数
    pub duplicate_count: usize,
    /// 最大多重度
    pub max_multiplicity: usize,
    /// 原始 observed 数
    pub raw_nobs: usize,
    /// 合并后 observed 数
    pub merged_nobs: usize,
    /// Σ|Io − <Io>| / Σ|Io|
    pub r_int: Option<f64>,
}

/// 单个数据块的汇总（不含拟合优度）
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BlockSummary {
    pub block: u32,
    pub raw: RFactors,
    pub merged: Option<RFactors>,
    /// 来自 M42 的平均厚度 (Å)
    pub thickness: Option<f64>,
}

/// 一次精修的 R 因子汇总
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RFactorSummary {
    /// 精修名称（文件主名）
    pub name: String,
    pub space_group: Option<String>,
    /// 精修参数个数（外部提供）
    pub parameters: Option<usize>,
    pub gof: GoodnessOfFit,
    pub raw: RFactors,
    pub merged: Option<RFactors>,
    pub duplicates: Option<DuplicateStatistics>,
    pub blocks: Vec<BlockSummary>,
}

impl RFactorSummary {
    pub fn is_multiblock(&self) -> bool {
        self.blocks.len() > 1
    }

    pub fn block(&self, block: u32) -> Option<&BlockSummary> {
        self.blocks.iter().find(|b| b.block == block)
    }
}

/// 以百分数格式化统计量，未定义时为 "n/a"
pub fn percent(value: Option<f64>) -> String {
    match value {
        Some(v) if v.is_finite() => format!("{:.2}", 100.0 * v),
        _ => "n/a".to_string(),
    }
}

/// 以固定小数位格式化，未定义时为 "n/a"
pub fn fixed(value: Option<f64>, decimals: usize) -> String {
    match value {
        Some(v) if v.is_finite() => format!("{:.*}", decimals, v),
        _ => "n/a".to_string(),
    }
}
