//! # 对称约化
//!
//! 把 Miller 指数映射到其在点群轨道中的规范代表：对所有操作求像，
//! 取字典序最小者。等价指数总得到同一个键，与输入顺序无关。
//!
//! ## 依赖关系
//! - 被 `merge/engine.rs` 使用
//! - 使用 `models/symmetry.rs`

use crate::models::{BlockSymmetry, GroupKey, Hkl, Reflection, SymmetryOperationSet};

/// 规范指数：轨道中的字典序最小值
pub fn canonicalize(hkl: Hkl, set: &SymmetryOperationSet) -> Hkl {
    set.operations()
        .iter()
        .map(|op| op.apply(hkl))
        .min()
        .unwrap_or(hkl)
}

/// 按数据块选择操作集合的约化器
#[derive(Debug, Clone)]
pub struct SymmetryReducer {
    symmetry: BlockSymmetry,
}

impl SymmetryReducer {
    pub fn new(symmetry: BlockSymmetry) -> Self {
        SymmetryReducer { symmetry }
    }

    /// 所有数据块共用一个操作集合
    pub fn uniform(set: SymmetryOperationSet) -> Self {
        SymmetryReducer::new(BlockSymmetry::uniform(set))
    }

    pub fn canonicalize(&self, hkl: Hkl, block: u32) -> Hkl {
        canonicalize(hkl, self.symmetry.for_block(block))
    }

    /// 衍射点的合并分组键
    pub fn group_key(&self, reflection: &Reflection) -> GroupKey {
        GroupKey {
            block: reflection.block,
            hkl: self.canonicalize(reflection.hkl, reflection.block),
        }
    }

    pub fn symmetry(&self) -> &BlockSymmetry {
        &self.symmetry
    }
}
