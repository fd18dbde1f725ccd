//! # R 因子计算
//!
//! 在振幅上计算：
//! - `R = Σ|Fo − Fc| / Σ|Fo|`（observed → Robs，全部 → Rall）
//! - `wR = sqrt(Σ w(Fo − Fc)² / Σ w·Fo²)`
//! - `wR2 = sqrt(Σ w'(Io − Ic)² / Σ w'·Io²)`，强度权重 `w' = w / (4|Io|)`，Io = 0 的项为零
//! - `GOF = sqrt(Σ w(Fo − Fc)² / (N − P))`
//!
//! 分母为零或参数个数未知时结果为 `None`。
//!
//! ## 依赖关系
//! - 被 `merge/mod.rs` 使用
//! - 使用 `merge/sum.rs`, `models/reflection.rs`

use crate::merge::sum::stable_sum;
use crate::models::{GoodnessOfFit, Observation, RFactors};

use std::collections::BTreeMap;

/// 一个子集的各项求和
#[derive(Debug, Default)]
struct Terms {
    count: usize,
    abs_delta: Vec<f64>,
    abs_fo: Vec<f64>,
    weighted_residual: Vec<f64>,
    weighted_fo: Vec<f64>,
    weighted_i_residual: Vec<f64>,
    weighted_io: Vec<f64>,
}

impl Terms {
    fn push<T: Observation>(&mut self, item: &T) {
        let a = item.amplitudes();
        self.count += 1;
        self.abs_delta.push((a.fo - a.fc).abs());
        self.abs_fo.push(a.fo.abs());
        self.weighted_residual.push(item.weighted_residual_sq());
        self.weighted_fo.push(item.weight() * a.fo * a.fo);

        let (i_obs, i_calc) = item.intensities();
        let intensity_weight = if i_obs != 0.0 {
            item.weight() / (4.0 * i_obs.abs())
        } else {
            0.0
        };
        self.weighted_i_residual
            .push(intensity_weight * (i_obs - i_calc).powi(2));
        self.weighted_io.push(intensity_weight * i_obs * i_obs);
    }

    fn r(&self) -> Option<f64> {
        ratio(stable_sum(self.abs_delta.clone()), stable_sum(self.abs_fo.clone()))
    }

    fn wr(&self) -> Option<f64> {
        ratio(
            stable_sum(self.weighted_residual.clone()),
            stable_sum(self.weighted_fo.clone()),
        )
        .map(f64::sqrt)
    }

    fn wr2(&self) -> Option<f64> {
        ratio(
            stable_sum(self.weighted_i_residual.clone()),
            stable_sum(self.weighted_io.clone()),
        )
        .map(f64::sqrt)
    }

    fn gof(&self, parameters: Option<usize>) -> Option<f64> {
        let p = parameters?;
        if self.count <= p {
            return None;
        }
        let chi2 = stable_sum(self.weighted_residual.clone());
        let value = (chi2 / (self.count - p) as f64).sqrt();
        value.is_finite().then_some(value)
    }
}

fn ratio(numerator: f64, denominator: f64) -> Option<f64> {
    if denominator > 0.0 && denominator.is_finite() && numerator.is_finite() {
        Some(numerator / denominator)
    } else {
        None
    }
}

fn collect<'a, T, I>(items: I) -> (Terms, Terms)
where
    T: Observation + 'a,
    I: IntoIterator<Item = &'a T>,
{
    let mut observed = Terms::default();
    let mut all = Terms::default();
    for item in items {
        all.push(item);
        if item.is_observed() {
            observed.push(item);
        }
    }
    (observed, all)
}

/// 计算一组观测量的 R 因子
pub fn compute<'a, T, I>(items: I) -> RFactors
where
    T: Observation + 'a,
    I: IntoIterator<Item = &'a T>,
{
    let (observed, all) = collect(items);
    RFactors {
        nobs: observed.count,
        nall: all.count,
        robs: observed.r(),
        wrobs: observed.wr(),
        rall: all.r(),
        wrall: all.wr(),
        wr2obs: observed.wr2(),
        wr2all: all.wr2(),
    }
}

/// 拟合优度；参数个数未知或 N ≤ P 时为 None
pub fn goodness_of_fit<'a, T, I>(items: I, parameters: Option<usize>) -> GoodnessOfFit
where
    T: Observation + 'a,
    I: IntoIterator<Item = &'a T>,
{
    let (observed, all) = collect(items);
    GoodnessOfFit {
        obs: observed.gof(parameters),
        all: all.gof(parameters),
    }
}

/// 按数据块分别计算 R 因子
pub fn compute_by_block<T: Observation>(items: &[T]) -> BTreeMap<u32, RFactors> {
    let mut blocks: BTreeMap<u32, Vec<&T>> = BTreeMap::new();
    for item in items {
        blocks.entry(item.block()).or_default().push(item);
    }
    blocks
        .into_iter()
        .map(|(block, members)| (block, compute(members.into_iter())))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merge::engine::merge;
    use crate::merge::reducer::SymmetryReducer;
    use crate::merge::MergeConfig;
    use crate::models::{Reflection, SymmetryOperationSet};

    fn refined(hkl: [i32; 3], i_obs: f64, sigma: f64, i_calc: f64) -> Reflection {
        let r = Reflection::new(hkl, i_obs, sigma, i_calc);
        let ws = r.amplitudes.weight_sqrt(0.0);
        let delta = ws * (r.amplitudes.fo - r.amplitudes.fc);
        r.with_file_weight(ws, delta)
    }

    fn dataset() -> Vec<Reflection> {
        vec![
            refined([1, 0, 0], 400.0, 10.0, 361.0),
            refined([0, 1, 0], 900.0, 20.0, 1024.0),
            refined([0, 0, 1], 100.0, 5.0, 121.0),
            refined([1, 1, 0], 25.0, 10.0, 4.0),
            refined([1, 0, 1], 9.0, 8.0, 25.0),
            refined([0, 1, 1], -4.0, 6.0, 1.0),
            refined([1, 1, 1], 64.0, 6.0, 49.0).with_block(2),
        ]
    }

    #[test]
    fn test_r_value_by_hand() {
        let items = vec![
            refined([1, 0, 0], 400.0, 10.0, 361.0),
            refined([0, 1, 0], 100.0, 5.0, 121.0),
        ];
        let r = compute(&items);
        // |20 − 19| + |10 − 11| over 20 + 10
        assert_eq!(r.nobs, 2);
        assert_eq!(r.nall, 2);
        assert!((r.robs.unwrap() - 2.0 / 30.0).abs() < 1e-12);
        assert!((r.rall.unwrap() - 2.0 / 30.0).abs() < 1e-12);
    }

    #[test]
    fn test_intensity_wr2_by_hand() {
        let mut items = vec![
            refined([1, 0, 0], 400.0, 10.0, 361.0),
            refined([0, 1, 0], 100.0, 5.0, 121.0),
        ];
        // w = 16 for both; w' = w / 4Io = 0.01, 0.04
        let expected = ((0.01 * 39.0f64.powi(2) + 0.04 * 21.0f64.powi(2)) / (1600.0 + 400.0)).sqrt();
        let r = compute(&items);
        assert!((r.wr2obs.unwrap() - expected).abs() < 1e-12);
        assert!((r.wr2all.unwrap() - expected).abs() < 1e-12);

        // Io = 0 has no intensity weight
        items.push(refined([0, 0, 2], 0.0, 3.0, 4.0));
        let r = compute(&items);
        assert_eq!(r.nall, 3);
        assert!((r.wr2all.unwrap() - expected).abs() < 1e-12);
    }

    #[test]
    fn test_non_negative_and_observed_subset() {
        let items = dataset();
        let r = compute(&items);
        assert_eq!(r.nall, 7);
        assert_eq!(r.nobs, 4);
        for value in [r.robs, r.wrobs, r.rall, r.wrall] {
            assert!(value.unwrap() >= 0.0);
        }
        assert!(r.robs.unwrap() <= r.rall.unwrap());
        assert!(r.wrobs.unwrap() <= r.wrall.unwrap());
    }

    #[test]
    fn test_empty_set_is_undefined() {
        let r = compute(&Vec::<Reflection>::new());
        assert_eq!(r.nall, 0);
        assert_eq!(r.robs, None);
        assert_eq!(r.wrall, None);
    }

    #[test]
    fn test_goodness_of_fit() {
        let items = dataset();
        assert_eq!(goodness_of_fit(&items, None).all, None);
        assert_eq!(goodness_of_fit(&items, Some(7)).all, None);
        assert_eq!(goodness_of_fit(&items, Some(4)).obs, None);

        let gof = goodness_of_fit(&items, Some(2));
        let chi2: f64 = items.iter().map(|r| r.weighted_residual_sq()).sum();
        assert!((gof.all.unwrap() - (chi2 / 5.0).sqrt()).abs() < 1e-9);
        assert!(gof.obs.unwrap() > 0.0);
    }

    #[test]
    fn test_per_block() {
        let blocks = compute_by_block(&dataset());
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[&1].nall, 6);
        assert_eq!(blocks[&2].nall, 1);
        assert!((blocks[&2].rall.unwrap() - 1.0 / 8.0).abs() < 1e-12);
    }

    #[test]
    fn test_merge_without_duplicates_is_passthrough() {
        let items = dataset();
        let reducer = SymmetryReducer::uniform(SymmetryOperationSet::trivial());
        let (merged, stats) = merge(&items, &reducer, &MergeConfig::default());
        assert_eq!(stats.duplicate_count, 0);

        let raw = compute(&items);
        let after = compute(&merged);
        assert_eq!(raw, after);
        assert_eq!(compute_by_block(&items), compute_by_block(&merged));
    }
}
