//! # 对称操作数据模型
//!
//! 倒空间中作用于 Miller 指数的整数 3×3 矩阵，以及由其组成的点群操作集合。
//!
//! M50 中的 `symmetry` 行给出实空间操作 R（如 `-x y+1/2 -z`），
//! 作用于 (h, k, l) 的倒空间操作为 (Rᵀ)⁻¹。
//!
//! ## 依赖关系
//! - 被 `parsers/m50.rs` 构造
//! - 被 `merge/reducer.rs` 使用

use crate::error::{JanaError, Result};
use crate::models::Hkl;

use std::collections::BTreeMap;

/// 闭包允许的最大操作数（m-3m 加 Friedel 也只有 48 个）
const MAX_GROUP_ORDER: usize = 192;

/// 单个对称操作（整数矩阵）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SymmetryOperation {
    pub matrix: [[i32; 3]; 3],
}

impl SymmetryOperation {
    pub const IDENTITY: SymmetryOperation = SymmetryOperation {
        matrix: [[1, 0, 0], [0, 1, 0], [0, 0, 1]],
    };

    pub const INVERSION: SymmetryOperation = SymmetryOperation {
        matrix: [[-1, 0, 0], [0, -1, 0], [0, 0, -1]],
    };

    pub fn new(matrix: [[i32; 3]; 3]) -> Self {
        SymmetryOperation { matrix }
    }

    /// 从 `x y z` 形式的实空间操作解析旋转部分
    ///
    /// 分量之间可用空格或逗号分隔，平移部分被忽略。
    pub fn from_xyz(expression: &str) -> Result<Self> {
        let components: Vec<&str> = expression
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|s| !s.is_empty())
            .collect();

        if components.len() != 3 {
            return Err(JanaError::SymmetryError(format!(
                "expected 3 components in '{}', found {}",
                expression.trim(),
                components.len()
            )));
        }

        let mut matrix = [[0i32; 3]; 3];
        for (row, component) in components.iter().enumerate() {
            let mut sign = 1;
            for c in component.chars() {
                match c.to_ascii_lowercase() {
                    '+' => sign = 1,
                    '-' => sign = -1,
                    'x' | 'y' | 'z' => {
                        let col = (c.to_ascii_lowercase() as u8 - b'x') as usize;
                        matrix[row][col] = sign;
                        sign = 1;
                    }
                    '0'..='9' | '/' | '.' => {}
                    _ => {
                        return Err(JanaError::SymmetryError(format!(
                            "unexpected character '{}' in '{}'",
                            c,
                            expression.trim()
                        )))
                    }
                }
            }
        }

        Ok(SymmetryOperation { matrix })
    }

    /// 作用于 Miller 指数
    pub fn apply(&self, hkl: Hkl) -> Hkl {
        let m = &self.matrix;
        [
            m[0][0] * hkl[0] + m[0][1] * hkl[1] + m[0][2] * hkl[2],
            m[1][0] * hkl[0] + m[1][1] * hkl[1] + m[1][2] * hkl[2],
            m[2][0] * hkl[0] + m[2][1] * hkl[1] + m[2][2] * hkl[2],
        ]
    }

    /// 矩阵乘积 self · other；整数溢出说明操作不属于有限群
    pub fn compose(&self, other: &SymmetryOperation) -> Result<SymmetryOperation> {
        let mut matrix = [[0i32; 3]; 3];
        for (i, row) in matrix.iter_mut().enumerate() {
            for (j, value) in row.iter_mut().enumerate() {
                *value = (0..3)
                    .try_fold(0i32, |acc, k| {
                        self.matrix[i][k]
                            .checked_mul(other.matrix[k][j])
                            .and_then(|p| acc.checked_add(p))
                    })
                    .ok_or_else(|| {
                        JanaError::SymmetryError(format!(
                            "composing {:?} with {:?} overflows; the set is not a finite point group",
                            self.matrix, other.matrix
                        ))
                    })?;
            }
        }
        Ok(SymmetryOperation { matrix })
    }

    /// 行列式
    pub fn determinant(&self) -> i32 {
        let m = &self.matrix;
        m[0][0] * (m[1][1] * m[2][2] - m[1][2] * m[2][1])
            - m[0][1] * (m[1][0] * m[2][2] - m[1][2] * m[2][0])
            + m[0][2] * (m[1][0] * m[2][1] - m[1][1] * m[2][0])
    }

    fn transpose(&self) -> SymmetryOperation {
        let m = &self.matrix;
        SymmetryOperation {
            matrix: [
                [m[0][0], m[1][0], m[2][0]],
                [m[0][1], m[1][1], m[2][1]],
                [m[0][2], m[1][2], m[2][2]],
            ],
        }
    }

    /// 整数逆矩阵；行列式不为 ±1 时逆矩阵不是整数，返回错误
    pub fn inverse(&self) -> Result<SymmetryOperation> {
        let det = self.determinant();
        if det != 1 && det != -1 {
            return Err(JanaError::SymmetryError(format!(
                "operation {:?} has determinant {} and no integral inverse",
                self.matrix, det
            )));
        }

        let m = &self.matrix;
        // 伴随矩阵 / det
        let cofactor = |r0: usize, r1: usize, c0: usize, c1: usize| {
            m[r0][c0] * m[r1][c1] - m[r0][c1] * m[r1][c0]
        };
        let adjugate = [
            [cofactor(1, 2, 1, 2), -cofactor(0, 2, 1, 2), cofactor(0, 1, 1, 2)],
            [-cofactor(1, 2, 0, 2), cofactor(0, 2, 0, 2), -cofactor(0, 1, 0, 2)],
            [cofactor(1, 2, 0, 1), -cofactor(0, 2, 0, 1), cofactor(0, 1, 0, 1)],
        ];

        let mut matrix = adjugate;
        for row in matrix.iter_mut() {
            for value in row.iter_mut() {
                *value *= det;
            }
        }
        Ok(SymmetryOperation { matrix })
    }

    /// 实空间操作 R 对应的倒空间操作 (Rᵀ)⁻¹
    pub fn reciprocal(&self) -> Result<SymmetryOperation> {
        self.transpose().inverse()
    }

    pub fn is_identity(&self) -> bool {
        *self == Self::IDENTITY
    }
}

/// 点群操作集合（对合成封闭，含单位操作）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymmetryOperationSet {
    operations: Vec<SymmetryOperation>,
}

impl SymmetryOperationSet {
    /// 校验单位操作并生成合成闭包
    pub fn new(operations: Vec<SymmetryOperation>) -> Result<Self> {
        if !operations.iter().any(|op| op.is_identity()) {
            return Err(JanaError::SymmetryError(
                "identity operation is missing".to_string(),
            ));
        }

        for op in &operations {
            let det = op.determinant();
            if det != 1 && det != -1 {
                return Err(JanaError::SymmetryError(format!(
                    "operation {:?} has determinant {}",
                    op.matrix, det
                )));
            }
        }

        let mut closed: Vec<SymmetryOperation> = Vec::with_capacity(operations.len());
        for op in operations {
            if !closed.contains(&op) {
                closed.push(op);
            }
        }

        // 反复合成直到不再产生新操作
        loop {
            let snapshot = closed.clone();
            let mut added = false;
            for a in &snapshot {
                for b in &snapshot {
                    let c = a.compose(b)?;
                    if !closed.contains(&c) {
                        closed.push(c);
                        added = true;
                        if closed.len() > MAX_GROUP_ORDER {
                            return Err(JanaError::SymmetryError(format!(
                                "closure exceeds {} operations; the set is not a finite point group",
                                MAX_GROUP_ORDER
                            )));
                        }
                    }
                }
            }
            if !added {
                break;
            }
        }

        Ok(SymmetryOperationSet { operations: closed })
    }

    /// 只含单位操作（P1）
    pub fn trivial() -> Self {
        SymmetryOperationSet {
            operations: vec![SymmetryOperation::IDENTITY],
        }
    }

    /// 加入反演操作，使 Friedel 对等价
    pub fn with_friedel(self) -> Result<Self> {
        if self.contains_inversion() {
            return Ok(self);
        }
        let mut operations = self.operations;
        operations.push(SymmetryOperation::INVERSION);
        SymmetryOperationSet::new(operations)
    }

    pub fn contains_inversion(&self) -> bool {
        self.operations.contains(&SymmetryOperation::INVERSION)
    }

    pub fn operations(&self) -> &[SymmetryOperation] {
        &self.operations
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}

/// 按数据块区分的对称性（孪晶各组分可有不同操作集合）
#[derive(Debug, Clone)]
pub struct BlockSymmetry {
    default: SymmetryOperationSet,
    overrides: BTreeMap<u32, SymmetryOperationSet>,
}

impl BlockSymmetry {
    pub fn uniform(default: SymmetryOperationSet) -> Self {
        BlockSymmetry {
            default,
            overrides: BTreeMap::new(),
        }
    }

    pub fn with_block(mut self, block: u32, set: SymmetryOperationSet) -> Self {
        self.overrides.insert(block, set);
        self
    }

    pub fn for_block(&self, block: u32) -> &SymmetryOperationSet {
        self.overrides.get(&block).unwrap_or(&self.default)
    }
}
