//! # merge 子命令 CLI 定义
//!
//! 合并对称等价衍射点并重新计算 R 因子。
//!
//! ## 依赖关系
//! - 被 `cli/mod.rs` 使用
//! - 参数传递给 `commands/merge.rs`

use crate::error::{JanaError, Result};
use crate::merge::{Averaging, MergeConfig};
use crate::parsers::layout::ColumnLayout;

use clap::{Args, ValueEnum};
use std::path::PathBuf;

/// M83 列布局选择
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq, Default)]
pub enum LayoutChoice {
    /// Detect from the length of the first reflection line
    #[default]
    Auto,
    /// Jana2006 fixed format
    Jana2006,
    /// Jana2020 fixed format
    Jana2020,
}

impl LayoutChoice {
    /// 显式布局；`Auto` 返回 None
    pub fn layout(&self) -> Option<&'static ColumnLayout> {
        self.to_possible_value()
            .and_then(|value| ColumnLayout::by_name(value.get_name()))
    }
}

/// merge 子命令参数
#[derive(Args, Debug)]
pub struct MergeArgs {
    /// Input: any Jana file of a refinement (name.m50, name.m83, name) or a directory
    pub input: PathBuf,

    /// Significance factor k: a reflection is observed if I > k·σ(I)
    #[arg(long, env = "JANA_TOOLS_SIGMA_FACTOR", default_value_t = 3.0)]
    pub sigma_factor: f64,

    /// Instability factor u of the merged weights w = 1/(σ(F)² + (u·F)²)
    #[arg(long, env = "JANA_TOOLS_INSTABILITY", default_value_t = 0.01)]
    pub instability_factor: f64,

    /// Averaging of symmetry-equivalent intensities
    #[arg(long, value_enum, default_value = "weighted")]
    pub averaging: Averaging,

    /// M83 column layout
    #[arg(long, value_enum, default_value = "auto")]
    pub layout: LayoutChoice,

    /// Treat Friedel pairs as equivalent (add inversion to the point group)
    #[arg(long, default_value_t = false)]
    pub friedel: bool,

    /// Number of refined parameters (overrides the value read from the .ref file)
    #[arg(short, long)]
    pub parameters: Option<usize>,

    /// Export the summaries to a CSV file
    #[arg(long)]
    pub csv: Option<PathBuf>,

    // ─────────────────────────────────────────────────────────────
    // CIF 输出参数（单精修模式）
    // ─────────────────────────────────────────────────────────────
    /// CIF file to receive the R-factor text block in _refine_special_details
    #[arg(long)]
    pub cif: Option<PathBuf>,

    /// Write the modified CIF here instead of overwriting --cif
    #[arg(long, requires = "cif")]
    pub cif_output: Option<PathBuf>,

    /// Remove CIF loops whose first tag starts with this prefix (repeatable, e.g. _refln_)
    #[arg(long = "drop-loop", requires = "cif")]
    pub drop_loops: Vec<String>,

    // ─────────────────────────────────────────────────────────────
    // 批量处理参数
    // ─────────────────────────────────────────────────────────────
    /// Glob pattern for reflection files (batch mode)
    #[arg(long, default_value = "*.m83")]
    pub pattern: String,

    /// Number of parallel jobs (0 = auto, batch mode only)
    #[arg(short, long, default_value_t = 0)]
    pub jobs: usize,

    /// Recurse into subdirectories (batch mode)
    #[arg(short, long, default_value_t = false)]
    pub recursive: bool,
}

impl MergeArgs {
    /// 检查数值参数
    pub fn validate(&self) -> Result<()> {
        if !self.sigma_factor.is_finite() || self.sigma_factor < 0.0 {
            return Err(JanaError::InvalidArgument(format!(
                "--sigma-factor must be a non-negative number, got {}",
                self.sigma_factor
            )));
        }
        if !self.instability_factor.is_finite() || self.instability_factor < 0.0 {
            return Err(JanaError::InvalidArgument(format!(
                "--instability-factor must be a non-negative number, got {}",
                self.instability_factor
            )));
        }
        if self.parameters == Some(0) {
            return Err(JanaError::InvalidArgument(
                "--parameters must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// 合并参数
    pub fn merge_config(&self) -> MergeConfig {
        MergeConfig {
            sigma_factor: self.sigma_factor,
            instability_factor: self.instability_factor,
            averaging: self.averaging,
            friedel: self.friedel,
        }
    }
}
