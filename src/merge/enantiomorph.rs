//! # 绝对结构判定（对映体比较）
//!
//! 比较同一数据对两种对映体模型的动力学精修：逐个衍射点比较 |Io − Ic|，
//! 统计第一个模型拟合更好的衍射点数 k，
//!
//! - `z = (k − N/2) / (√N / 2)`
//! - `p = Φ(z)`：第一个模型为正确对映体的概率（标准正态分布函数）
//!
//! 只用强度差，σ(Io) 不参与。逐块给出结果，多块精修另附合计行。
//!
//! ## 依赖关系
//! - 被 `commands/zscore.rs` 使用
//! - 使用 `merge/rfactors.rs` 计算 Rall
//! - 使用 `libm` 的 `erf`

use crate::error::{JanaError, Result};
use crate::merge::rfactors;
use crate::models::Reflection;

use serde::Serialize;
use std::collections::BTreeSet;

/// 一个子集（单个数据块或全部）的比较结果
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EnantiomorphComparison {
    /// 数据块编号，合计行为 None
    pub block: Option<u32>,
    /// 参与比较的衍射点数 N
    pub count: usize,
    /// 第一个模型拟合更好的衍射点数 k
    pub better_first: usize,
    pub z: Option<f64>,
    /// 第一个模型正确的概率
    pub probability: Option<f64>,
    pub rall_first: Option<f64>,
    pub rall_second: Option<f64>,
}

impl EnantiomorphComparison {
    pub fn better_second(&self) -> usize {
        self.count - self.better_first
    }
}

/// z 分数与对应概率；N = 0 时均为 None
pub fn z_score(count: usize, better_first: usize) -> (Option<f64>, Option<f64>) {
    if count == 0 {
        return (None, None);
    }
    let n = count as f64;
    let z = (better_first as f64 - n / 2.0) / (n.sqrt() / 2.0);
    let p = 0.5 + 0.5 * libm::erf(z / std::f64::consts::SQRT_2);
    (Some(z), Some(p))
}

/// 两份衍射点列表必须逐行对应：相同的数据块、指数与 Io
fn check_compatible(first: &[Reflection], second: &[Reflection]) -> Result<()> {
    if first.len() != second.len() {
        return Err(JanaError::IncompatibleFiles(format!(
            "{} vs {} reflections",
            first.len(),
            second.len()
        )));
    }
    for (i, (a, b)) in first.iter().zip(second).enumerate() {
        if a.block != b.block || a.hkl != b.hkl || a.i_obs != b.i_obs {
            return Err(JanaError::IncompatibleFiles(format!(
                "reflection {} differs: {:?} Io = {} vs {:?} Io = {}",
                i + 1,
                a.hkl,
                a.i_obs,
                b.hkl,
                b.i_obs
            )));
        }
    }
    Ok(())
}

fn compare_subset(block: Option<u32>, pairs: &[(&Reflection, &Reflection)]) -> EnantiomorphComparison {
    let better_first = pairs
        .iter()
        .filter(|(a, b)| (a.i_obs - a.i_calc).abs() < (b.i_obs - b.i_calc).abs())
        .count();
    let (z, probability) = z_score(pairs.len(), better_first);

    EnantiomorphComparison {
        block,
        count: pairs.len(),
        better_first,
        z,
        probability,
        rall_first: rfactors::compute(pairs.iter().map(|(a, _)| *a)).rall,
        rall_second: rfactors::compute(pairs.iter().map(|(_, b)| *b)).rall,
    }
}

/// 逐块比较两次精修；多块时追加合计行
pub fn compare(first: &[Reflection], second: &[Reflection]) -> Result<Vec<EnantiomorphComparison>> {
    check_compatible(first, second)?;

    let pairs: Vec<(&Reflection, &Reflection)> = first.iter().zip(second).collect();
    let blocks: BTreeSet<u32> = first.iter().map(|r| r.block).collect();

    let mut rows: Vec<EnantiomorphComparison> = blocks
        .iter()
        .map(|&block| {
            let subset: Vec<_> = pairs.iter().copied().filter(|(a, _)| a.block == block).collect();
            compare_subset(Some(block), &subset)
        })
        .collect();

    if blocks.len() > 1 {
        rows.push(compare_subset(None, &pairs));
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model(i_calc: &[f64]) -> Vec<Reflection> {
        let i_obs = [100.0, 80.0, 60.0, 40.0];
        i_obs
            .iter()
            .zip(i_calc)
            .enumerate()
            .map(|(i, (&io, &ic))| Reflection::new([i as i32 + 1, 0, 0], io, 5.0, ic))
            .collect()
    }

    #[test]
    fn test_z_score_values() {
        assert_eq!(z_score(0, 0), (None, None));

        let (z, p) = z_score(100, 50);
        assert_eq!(z, Some(0.0));
        assert!((p.unwrap() - 0.5).abs() < 1e-12);

        // k = 60 of 100: z = 10 / 5 = 2, Φ(2) = 0.97725
        let (z, p) = z_score(100, 60);
        assert!((z.unwrap() - 2.0).abs() < 1e-12);
        assert!((p.unwrap() - 0.977_249_868).abs() < 1e-8);

        let (z, p) = z_score(100, 40);
        assert!((z.unwrap() + 2.0).abs() < 1e-12);
        assert!((p.unwrap() - 0.022_750_132).abs() < 1e-8);
    }

    #[test]
    fn test_compare_single_block() {
        let first = model(&[99.0, 81.0, 60.0, 30.0]);
        let second = model(&[90.0, 70.0, 61.0, 39.0]);
        let rows = compare(&first, &second).unwrap();

        assert_eq!(rows.len(), 1);
        let row = rows[0];
        assert_eq!(row.block, Some(1));
        assert_eq!(row.count, 4);
        // |ΔI|: 1 < 10, 1 < 10, 0 < 1, 10 > 1
        assert_eq!(row.better_first, 3);
        assert_eq!(row.better_second(), 1);
        assert!((row.z.unwrap() - 1.0).abs() < 1e-12);
        assert!(row.rall_first.unwrap() < row.rall_second.unwrap());
    }

    #[test]
    fn test_ties_count_for_second() {
        let first = model(&[100.0, 80.0, 60.0, 40.0]);
        let rows = compare(&first, &first).unwrap();
        assert_eq!(rows[0].better_first, 0);
        assert!(rows[0].z.unwrap() < 0.0);
    }

    #[test]
    fn test_multiblock_adds_combined_row() {
        let mut first = model(&[99.0, 81.0, 60.0, 30.0]);
        let mut second = model(&[90.0, 70.0, 61.0, 39.0]);
        for r in first[2..].iter_mut().chain(second[2..].iter_mut()) {
            r.block = 2;
        }
        let rows = compare(&first, &second).unwrap();

        let blocks: Vec<_> = rows.iter().map(|r| r.block).collect();
        assert_eq!(blocks, vec![Some(1), Some(2), None]);
        assert_eq!(rows[0].count + rows[1].count, rows[2].count);
        assert_eq!(rows[2].better_first, 3);
    }

    #[test]
    fn test_incompatible_lists() {
        let first = model(&[99.0, 81.0, 60.0, 30.0]);
        let mut second = first.clone();
        second[2].i_obs = 61.0;
        assert!(matches!(
            compare(&first, &second),
            Err(JanaError::IncompatibleFiles(_))
        ));
        assert!(matches!(
            compare(&first, &second[..3]),
            Err(JanaError::IncompatibleFiles(_))
        ));
    }
}
