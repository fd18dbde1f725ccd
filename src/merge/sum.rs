//! # 顺序无关的 f64 求和
//!
//! 各项先按值排序（`total_cmp`），再做 Neumaier 补偿累加。相同的项集合
//! 无论以何种顺序给出，结果逐位相同。
//!
//! ## 依赖关系
//! - 被 `merge/engine.rs` 与 `merge/rfactors.rs` 使用

/// 对一组项做排序补偿求和
pub fn stable_sum(mut terms: Vec<f64>) -> f64 {
    terms.sort_by(|a, b| a.total_cmp(b));
    neumaier(&terms)
}

/// Neumaier 补偿累加（按给定顺序）
fn neumaier(terms: &[f64]) -> f64 {
    let mut sum = 0.0f64;
    let mut compensation = 0.0f64;
    for &x in terms {
        let t = sum + x;
        if sum.abs() >= x.abs() {
            compensation += (sum - t) + x;
        } else {
            compensation += (x - t) + sum;
        }
        sum = t;
    }
    sum + compensation
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_independent() {
        let a = vec![0.1, 1e16, 0.3, -1e16, 0.2, 7.5];
        let mut b = a.clone();
        b.reverse();
        assert_eq!(stable_sum(a).to_bits(), stable_sum(b).to_bits());
    }

    #[test]
    fn test_compensation() {
        // 朴素累加在这里丢失 1.0
        let terms = vec![1.0, 1e100, 1.0, -1e100];
        assert_eq!(stable_sum(terms), 2.0);
    }

    #[test]
    fn test_empty() {
        assert_eq!(stable_sum(Vec::new()), 0.0);
    }
}
