//! # 合并引擎
//!
//! 按 (数据块, 规范指数) 对衍射点分组，每组合并为一个 `MergedReflection`，
//! 同时统计重复衍射点。
//!
//! ## 合并规则
//! - 默认按 1/σ² 加权平均，σ = (Σ 1/σ²)^(-1/2)；组内含 σ = 0 时改用算术平均
//! - 算术模式：<Io>、<Ic> 为算术平均，σ = sqrt(Σσ²)/n，单点组也按此重新推导
//! - 加权模式下单点组原样保留观测标记、权重和加权残差
//! - 加权模式下多点组的权重乘以成员文件权重相对 1/(σ(F)² + (uF)²) 的平均比例，
//!   与单点组保持同一标度
//! - 合并后 observed 判据：Io > k·σ(Io)
//!
//! 所有求和经 `sum::stable_sum`，输出按分组键排序，结果与输入顺序无关。
//!
//! ## 依赖关系
//! - 被 `merge/mod.rs` 使用
//! - 使用 `merge/reducer.rs`, `merge/sum.rs`

use crate::merge::reducer::SymmetryReducer;
use crate::merge::sum::stable_sum;
use crate::merge::{Averaging, MergeConfig};
use crate::models::{
    Amplitudes, DuplicateStatistics, GroupKey, MergedReflection, Observation, Reflection,
};

use std::collections::{BTreeMap, HashSet};

/// 一个重复组：同一数据块内规范指数相同的衍射点
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateGroup {
    pub key: GroupKey,
    /// 成员在输入序列中的下标
    pub members: Vec<usize>,
}

impl DuplicateGroup {
    pub fn multiplicity(&self) -> usize {
        self.members.len()
    }
}

/// 分组，按键升序返回
pub fn group(reflections: &[Reflection], reducer: &SymmetryReducer) -> Vec<DuplicateGroup> {
    let mut groups: BTreeMap<GroupKey, Vec<usize>> = BTreeMap::new();
    for (i, reflection) in reflections.iter().enumerate() {
        groups.entry(reducer.group_key(reflection)).or_default().push(i);
    }
    groups
        .into_iter()
        .map(|(key, members)| DuplicateGroup { key, members })
        .collect()
}

/// 合并全部衍射点并给出重复统计
pub fn merge(
    reflections: &[Reflection],
    reducer: &SymmetryReducer,
    config: &MergeConfig,
) -> (Vec<MergedReflection>, DuplicateStatistics) {
    let groups = group(reflections, reducer);

    let merged: Vec<MergedReflection> = groups
        .iter()
        .map(|g| {
            let members: Vec<&Reflection> = g.members.iter().map(|&i| &reflections[i]).collect();
            merge_group(g.key, &members, config)
        })
        .collect();

    let statistics = statistics(reflections, &groups, &merged);
    (merged, statistics)
}

/// 合并一个重复组
pub fn merge_group(
    key: GroupKey,
    members: &[&Reflection],
    config: &MergeConfig,
) -> MergedReflection {
    if let [single] = members {
        if config.averaging == Averaging::Weighted {
            return passthrough(key, single);
        }
    }

    let n = members.len() as f64;
    let arithmetic =
        config.averaging == Averaging::Arithmetic || members.iter().any(|r| r.sigma <= 0.0);

    let (i_obs, i_calc, sigma) = if arithmetic {
        let i_obs = stable_sum(members.iter().map(|r| r.i_obs).collect()) / n;
        let i_calc = stable_sum(members.iter().map(|r| r.i_calc).collect()) / n;
        let sigma = stable_sum(members.iter().map(|r| r.sigma * r.sigma).collect()).sqrt() / n;
        (i_obs, i_calc, sigma)
    } else {
        let weights: Vec<f64> = members.iter().map(|r| 1.0 / (r.sigma * r.sigma)).collect();
        let total = stable_sum(weights.clone());
        let i_obs = stable_sum(
            members.iter().zip(&weights).map(|(r, w)| w * r.i_obs).collect(),
        ) / total;
        let i_calc = stable_sum(
            members.iter().zip(&weights).map(|(r, w)| w * r.i_calc).collect(),
        ) / total;
        (i_obs, i_calc, 1.0 / total.sqrt())
    };

    let dispersion = stable_sum(members.iter().map(|r| (r.i_obs - i_obs).powi(2)).collect());
    let abs_deviation = stable_sum(members.iter().map(|r| (r.i_obs - i_obs).abs()).collect());
    let abs_intensity = stable_sum(members.iter().map(|r| r.i_obs.abs()).collect());

    let amplitudes = Amplitudes::from_intensities(i_obs, sigma, i_calc);
    let mut weight_sqrt = amplitudes.weight_sqrt(config.instability_factor);
    if config.averaging == Averaging::Weighted {
        weight_sqrt *= file_weight_scale(members, config.instability_factor).sqrt();
    }

    MergedReflection {
        key,
        i_obs,
        sigma,
        i_calc,
        multiplicity: members.len(),
        dispersion,
        abs_deviation,
        abs_intensity,
        observed: i_obs > config.sigma_factor * sigma,
        weight_sqrt,
        weighted_delta: weight_sqrt * (amplitudes.fo - amplitudes.fc),
        amplitudes,
    }
}

/// 文件权重与重新推导权重之比的平均值；无可用成员时为 1
fn file_weight_scale(members: &[&Reflection], instability_factor: f64) -> f64 {
    let ratios: Vec<f64> = members
        .iter()
        .filter_map(|r| {
            let derived = r.amplitudes.weight_sqrt(instability_factor).powi(2);
            let ratio = r.weight() / derived;
            (derived > 0.0 && ratio.is_finite() && ratio > 0.0).then_some(ratio)
        })
        .collect();
    if ratios.is_empty() {
        return 1.0;
    }
    let n = ratios.len() as f64;
    stable_sum(ratios) / n
}

/// 单点组：保留原始衍射点的观测标记、权重与残差
fn passthrough(key: GroupKey, reflection: &Reflection) -> MergedReflection {
    MergedReflection {
        key,
        i_obs: reflection.i_obs,
        sigma: reflection.sigma,
        i_calc: reflection.i_calc,
        multiplicity: 1,
        dispersion: 0.0,
        abs_deviation: 0.0,
        abs_intensity: reflection.i_obs.abs(),
        observed: reflection.observed,
        weight_sqrt: reflection.weight_sqrt,
        weighted_delta: reflection.weighted_delta,
        amplitudes: reflection.amplitudes,
    }
}

fn statistics(
    reflections: &[Reflection],
    groups: &[DuplicateGroup],
    merged: &[MergedReflection],
) -> DuplicateStatistics {
    let input_count = reflections.len();
    let distinct: HashSet<(u32, [i32; 3])> =
        reflections.iter().map(|r| (r.block, r.hkl)).collect();
    let exact_duplicates = input_count - distinct.len();

    // R(int) 只统计多重度 ≥ 2 的组
    let multiple: Vec<&MergedReflection> = merged.iter().filter(|m| m.multiplicity > 1).collect();
    let deviation = stable_sum(multiple.iter().map(|m| m.abs_deviation).collect());
    let intensity = stable_sum(multiple.iter().map(|m| m.abs_intensity).collect());
    let r_int = if intensity > 0.0 {
        Some(deviation / intensity)
    } else {
        None
    };

    DuplicateStatistics {
        input_count,
        exact_duplicates,
        unique_indices: input_count - exact_duplicates,
        groups: groups.len(),
        duplicate_count: input_count - groups.len(),
        max_multiplicity: groups.iter().map(|g| g.multiplicity()).max().unwrap_or(0),
        raw_nobs: reflections.iter().filter(|r| r.observed).count(),
        merged_nobs: merged.iter().filter(|m| m.observed).count(),
        r_int,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{SymmetryOperation, SymmetryOperationSet};

    fn monoclinic_reducer() -> SymmetryReducer {
        let ops = ["x y z", "-x y+1/2 -z+1/2", "-x -y -z", "x -y+1/2 z+1/2"]
            .iter()
            .map(|e| SymmetryOperation::from_xyz(e).unwrap().reciprocal().unwrap())
            .collect();
        SymmetryReducer::uniform(SymmetryOperationSet::new(ops).unwrap())
    }

    fn sample() -> Vec<Reflection> {
        vec![
            Reflection::new([1, 2, 3], 100.0, 10.0, 90.0),
            Reflection::new([-1, 2, -3], 200.0, 20.0, 95.0),
            Reflection::new([1, -2, 3], 130.0, 15.0, 92.0),
            Reflection::new([1, 2, 3], 110.0, 10.0, 90.0),
            Reflection::new([2, 0, 0], 50.0, 5.0, 40.0),
            Reflection::new([0, 1, 0], 4.0, 3.0, 2.0),
            Reflection::new([0, -1, 0], 2.0, 3.0, 2.0),
            Reflection::new([1, 2, 3], 80.0, 8.0, 90.0).with_block(2),
            Reflection::new([3, 1, 1], -5.0, 4.0, 1.0),
        ]
    }

    #[test]
    fn test_weighted_mean() {
        let config = MergeConfig::default();
        let a = Reflection::new([1, 0, 0], 100.0, 10.0, 80.0);
        let b = Reflection::new([-1, 0, 0], 200.0, 20.0, 90.0);
        let key = GroupKey { block: 1, hkl: [-1, 0, 0] };
        let m = merge_group(key, &[&a, &b], &config);

        // w = 0.01, 0.0025
        assert!((m.i_obs - 120.0).abs() < 1e-9);
        assert!((m.i_calc - 82.0).abs() < 1e-9);
        assert!((m.sigma - 1.0 / 0.0125f64.sqrt()).abs() < 1e-9);
        assert_eq!(m.multiplicity, 2);
        assert!((m.dispersion - (400.0 + 6400.0)).abs() < 1e-9);
        assert!(m.observed);
    }

    #[test]
    fn test_arithmetic_mean() {
        let config = MergeConfig {
            averaging: Averaging::Arithmetic,
            ..MergeConfig::default()
        };
        let a = Reflection::new([1, 0, 0], 100.0, 10.0, 80.0);
        let b = Reflection::new([-1, 0, 0], 200.0, 20.0, 90.0);
        let key = GroupKey { block: 1, hkl: [-1, 0, 0] };
        let m = merge_group(key, &[&a, &b], &config);

        assert!((m.i_obs - 150.0).abs() < 1e-9);
        assert!((m.i_calc - 85.0).abs() < 1e-9);
        assert!((m.sigma - 500.0f64.sqrt() / 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_zero_sigma_falls_back_to_arithmetic() {
        let config = MergeConfig::default();
        let a = Reflection::new([1, 0, 0], 100.0, 0.0, 80.0);
        let b = Reflection::new([-1, 0, 0], 200.0, 20.0, 90.0);
        let key = GroupKey { block: 1, hkl: [-1, 0, 0] };
        let m = merge_group(key, &[&a, &b], &config);
        assert!((m.i_obs - 150.0).abs() < 1e-9);
        assert!(m.sigma.is_finite());
    }

    #[test]
    fn test_two_weak_reflections_can_merge_to_observed() {
        let config = MergeConfig::default();
        let a = Reflection::new([1, 0, 0], 25.0, 10.0, 20.0);
        let b = Reflection::new([-1, 0, 0], 25.0, 10.0, 20.0);
        assert!(!a.observed && !b.observed);
        let key = GroupKey { block: 1, hkl: [-1, 0, 0] };
        assert!(merge_group(key, &[&a, &b], &config).observed);
    }

    #[test]
    fn test_singleton_passthrough() {
        let raw = Reflection::new([2, 0, 0], 50.0, 5.0, 40.0)
            .with_file_weight(0.7, 0.35)
            .with_observed(false);
        let key = GroupKey { block: 1, hkl: [-2, 0, 0] };

        let m = merge_group(key, &[&raw], &MergeConfig::default());
        assert_eq!(m.weight_sqrt, 0.7);
        assert_eq!(m.weighted_delta, 0.35);
        assert!(!m.observed);

        let config = MergeConfig {
            averaging: Averaging::Arithmetic,
            ..MergeConfig::default()
        };
        let m = merge_group(key, &[&raw], &config);
        assert!(m.observed);
        assert_ne!(m.weight_sqrt, 0.7);
    }

    #[test]
    fn test_weighted_rfactors_independent_of_file_weight_scale() {
        use crate::merge::rfactors;

        let reducer = SymmetryReducer::uniform(SymmetryOperationSet::trivial().with_friedel().unwrap());
        let config = MergeConfig::default();
        let raw = [
            ([1, 2, 3], 100.0, 10.0, 90.0),
            ([-1, -2, -3], 120.0, 12.0, 90.0),
            ([2, 0, 0], 50.0, 5.0, 40.0),
            ([0, 1, 4], 30.0, 6.0, 36.0),
        ];

        let wrall = |c: f64| {
            let reflections: Vec<Reflection> = raw
                .iter()
                .map(|&(hkl, i_obs, sigma, i_calc)| {
                    let r = Reflection::new(hkl, i_obs, sigma, i_calc);
                    let ws = r.amplitudes.weight_sqrt(config.instability_factor) / c.sqrt();
                    let delta = ws * (r.amplitudes.fo - r.amplitudes.fc);
                    r.with_file_weight(ws, delta)
                })
                .collect();
            let (merged, _) = merge(&reflections, &reducer, &config);
            assert_eq!(merged.len(), 3);
            rfactors::compute(&merged).wrall.unwrap()
        };

        let reference = wrall(1.0);
        let scaled = wrall(4.0);
        assert!((reference - scaled).abs() < 1e-12 * reference);
    }

    #[test]
    fn test_duplicate_statistics() {
        let reflections = sample();
        let (merged, stats) = merge(&reflections, &monoclinic_reducer(), &MergeConfig::default());

        assert_eq!(stats.input_count, 9);
        assert_eq!(stats.exact_duplicates, 1);
        assert_eq!(stats.unique_indices, 8);
        // {123 x4 in block 1}, {200}, {010, 0-10}, {123 in block 2}, {311}
        assert_eq!(stats.groups, 5);
        assert_eq!(stats.duplicate_count, 4);
        assert_eq!(stats.max_multiplicity, 4);
        assert_eq!(merged.len(), 5);
        assert!(stats.r_int.unwrap() > 0.0);
    }

    #[test]
    fn test_blocks_never_merge() {
        let reflections = sample();
        let (merged, _) = merge(&reflections, &monoclinic_reducer(), &MergeConfig::default());
        let block2: Vec<_> = merged.iter().filter(|m| m.key.block == 2).collect();
        assert_eq!(block2.len(), 1);
        assert_eq!(block2[0].multiplicity, 1);
        assert_eq!(block2[0].i_obs, 80.0);
    }

    #[test]
    fn test_merge_is_permutation_invariant() {
        let reducer = monoclinic_reducer();
        for averaging in [Averaging::Weighted, Averaging::Arithmetic] {
            let config = MergeConfig {
                averaging,
                ..MergeConfig::default()
            };
            let reflections = sample();
            let reference = merge(&reflections, &reducer, &config);

            let mut reversed = reflections.clone();
            reversed.reverse();
            assert_eq!(merge(&reversed, &reducer, &config), reference);

            let mut rotated = reflections.clone();
            rotated.rotate_left(4);
            assert_eq!(merge(&rotated, &reducer, &config), reference);
        }
    }

    #[test]
    fn test_conservation() {
        let reflections = sample();
        let (merged, stats) = merge(&reflections, &monoclinic_reducer(), &MergeConfig::default());
        let total: usize = merged.iter().map(|m| m.multiplicity).sum();
        assert_eq!(total, reflections.len());
        assert!(merged.len() <= reflections.len());
        assert!(stats.merged_nobs <= stats.raw_nobs);
    }

    #[test]
    fn test_output_sorted_by_key() {
        let (merged, _) = merge(&sample(), &monoclinic_reducer(), &MergeConfig::default());
        let keys: Vec<GroupKey> = merged.iter().map(|m| m.key).collect();
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);
    }
}
