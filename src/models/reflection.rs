//! # 衍射点数据模型
//!
//! 定义原始衍射点（M83 一行）与合并后衍射点，以及 R 因子计算所需的
//! `Observation` 接口。
//!
//! ## 振幅约定
//! 统计量在结构因子振幅上计算，振幅由强度按 Jana 的弱衍射点规则导出：
//! - `Io < 0.01·σ(Io)`：`Fo = sqrt(max(Io, 0))`，`σ(Fo) = 5·sqrt(σ(Io))`
//! - 否则：`Fo = sqrt(Io)`，`σ(Fo) = σ(Io) / (2·Fo)`
//! - `Fc = sqrt(max(Ic, 0))`
//!
//! ## 依赖关系
//! - 被 `parsers/m83.rs` 构造
//! - 被 `merge/` 消费

use serde::Serialize;

/// Miller 指数 (h, k, l)
pub type Hkl = [i32; 3];

/// 弱衍射点判据中的相对阈值
const WEAK_INTENSITY_RATIO: f64 = 0.01;

/// 由强度导出的结构因子振幅
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Amplitudes {
    /// 观测振幅 Fo
    pub fo: f64,
    /// 观测振幅标准差 σ(Fo)
    pub sigma_fo: f64,
    /// 计算振幅 Fc
    pub fc: f64,
}

impl Amplitudes {
    /// 按 Jana 规则从强度导出振幅
    pub fn from_intensities(i_obs: f64, sigma: f64, i_calc: f64) -> Self {
        let fc = i_calc.max(0.0).sqrt();
        let (fo, sigma_fo) = if i_obs < WEAK_INTENSITY_RATIO * sigma || i_obs <= 0.0 {
            (i_obs.max(0.0).sqrt(), 5.0 * sigma.sqrt())
        } else {
            let fo = i_obs.sqrt();
            (fo, sigma / (2.0 * fo))
        };
        Amplitudes { fo, sigma_fo, fc }
    }

    /// 权重平方根 1/sqrt(σ(Fo)² + (u·Fo)²)，分母为零时返回 0
    pub fn weight_sqrt(&self, instability_factor: f64) -> f64 {
        let variance =
            self.sigma_fo * self.sigma_fo + (instability_factor * self.fo).powi(2);
        if variance > 0.0 && variance.is_finite() {
            1.0 / variance.sqrt()
        } else {
            0.0
        }
    }
}

/// 参与 R 因子计算的观测量
///
/// 原始衍射点与合并衍射点都实现此接口，R 因子计算器只依赖它。
pub trait Observation {
    /// 所属数据块
    fn block(&self) -> u32;

    /// 是否为 "observed"
    fn is_observed(&self) -> bool;

    /// 振幅
    fn amplitudes(&self) -> &Amplitudes;

    /// 权重 w
    fn weight(&self) -> f64;

    /// (Io, Ic)
    fn intensities(&self) -> (f64, f64);

    /// w·(Fo − Fc)²
    fn weighted_residual_sq(&self) -> f64 {
        let a = self.amplitudes();
        self.weight() * (a.fo - a.fc).powi(2)
    }
}

/// 单个原始衍射点
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reflection {
    /// Miller 指数
    pub hkl: Hkl,
    /// 观测强度 Io
    pub i_obs: f64,
    /// 观测强度标准差 σ(Io)
    pub sigma: f64,
    /// 计算强度 Ic
    pub i_calc: f64,
    /// 是否为 "observed"
    pub observed: bool,
    /// 数据块编号（单块精修为 1）
    pub block: u32,
    /// 帧 (zone) 编号，运动学精修为 0
    pub zone: u32,
    /// 精修程序写出的权重平方根 sqrt(w)
    pub weight_sqrt: f64,
    /// 精修程序写出的 w(Fo − Fc)
    pub weighted_delta: f64,
    /// 导出振幅
    pub amplitudes: Amplitudes,
}

impl Reflection {
    /// 由强度创建衍射点，权重取 1/σ(Fo)²
    pub fn new(hkl: Hkl, i_obs: f64, sigma: f64, i_calc: f64) -> Self {
        let amplitudes = Amplitudes::from_intensities(i_obs, sigma, i_calc);
        let weight_sqrt = amplitudes.weight_sqrt(0.0);
        Reflection {
            hkl,
            i_obs,
            sigma,
            i_calc,
            observed: i_obs > 3.0 * sigma,
            block: 1,
            zone: 0,
            weight_sqrt,
            weighted_delta: weight_sqrt * (amplitudes.fo - amplitudes.fc),
            amplitudes,
        }
    }

    pub fn with_block(mut self, block: u32) -> Self {
        self.block = block;
        self
    }

    pub fn with_zone(mut self, zone: u32) -> Self {
        self.zone = zone;
        self
    }

    pub fn with_observed(mut self, observed: bool) -> Self {
        self.observed = observed;
        self
    }

    /// 使用精修程序给出的权重与加权残差
    pub fn with_file_weight(mut self, weight_sqrt: f64, weighted_delta: f64) -> Self {
        self.weight_sqrt = weight_sqrt;
        self.weighted_delta = weighted_delta;
        self
    }
}

impl Observation for Reflection {
    fn block(&self) -> u32 {
        self.block
    }

    fn is_observed(&self) -> bool {
        self.observed
    }

    fn amplitudes(&self) -> &Amplitudes {
        &self.amplitudes
    }

    fn weight(&self) -> f64 {
        self.weight_sqrt * self.weight_sqrt
    }

    fn intensities(&self) -> (f64, f64) {
        (self.i_obs, self.i_calc)
    }

    // 使用文件中的 w(Fo−Fc)，与精修程序自身的 wR 保持一致
    fn weighted_residual_sq(&self) -> f64 {
        self.weighted_delta * self.weighted_delta
    }
}

/// 合并分组键：同一数据块内的规范指数
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct GroupKey {
    pub block: u32,
    pub hkl: Hkl,
}

/// 合并后的衍射点（每个重复组一个）
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MergedReflection {
    /// 分组键（规范指数）
    pub key: GroupKey,
    /// 平均观测强度
    pub i_obs: f64,
    /// 合并后标准差
    pub sigma: f64,
    /// 平均计算强度
    pub i_calc: f64,
    /// 参与合并的衍射点数
    pub multiplicity: usize,
    /// Σ(Io − <Io>)²
    pub dispersion: f64,
    /// Σ|Io − <Io>|
    pub abs_deviation: f64,
    /// Σ|Io|
    pub abs_intensity: f64,
    /// 是否为 "observed"
    pub observed: bool,
    /// 权重平方根
    pub weight_sqrt: f64,
    /// w(Fo − Fc)
    pub weighted_delta: f64,
    /// 导出振幅
    pub amplitudes: Amplitudes,
}

impl Observation for MergedReflection {
    fn block(&self) -> u32 {
        self.key.block
    }

    fn is_observed(&self) -> bool {
        self.observed
    }

    fn amplitudes(&self) -> &Amplitudes {
        &self.amplitudes
    }

    fn weight(&self) -> f64 {
        self.weight_sqrt * self.weight_sqrt
    }

    fn intensities(&self) -> (f64, f64) {
        (self.i_obs, self.i_calc)
    }

    fn weighted_residual_sq(&self) -> f64 {
        self.weighted_delta * self.weighted_delta
    }
}
