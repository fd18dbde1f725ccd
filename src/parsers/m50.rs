//! # Jana M50 设置文件解析器
//!
//! 读取标题、晶胞、空间群与对称操作。`symmetry` 行给出实空间操作，
//! 解析时转换为作用于 Miller 指数的倒空间操作 (Rᵀ)⁻¹。
//!
//! ## M50 片段
//! ```text
//! title   LTA
//! cell 11.9 11.9 11.9 90 90 90
//! spgroup P21/c 14 1
//! symmetry x y z
//! symmetry -x y+1/2 -z+1/2
//! ...
//! refine
//!   fsquare 0 ...
//! end refine
//! ```
//!
//! ## 依赖关系
//! - 被 `commands/merge.rs` 使用
//! - 使用 `models/symmetry.rs`

use crate::error::{JanaError, Result};
use crate::models::{SymmetryOperation, SymmetryOperationSet};
use crate::parsers::read_source;

use std::path::Path;

/// M50 中与合并相关的设置
#[derive(Debug, Clone)]
pub struct Settings {
    /// 来源文件
    pub source: String,
    pub title: Option<String>,
    /// 晶胞参数 a b c α β γ
    pub cell: Option<[f64; 6]>,
    /// 空间群符号
    pub space_group: Option<String>,
    /// 空间群编号
    pub space_group_number: Option<u32>,
    /// `symmetry` 行原文
    pub symmetry_expressions: Vec<String>,
    /// 倒空间点群操作
    pub symmetry: SymmetryOperationSet,
}

/// 解析 M50 文件
pub fn parse_m50_file(path: &Path) -> Result<Settings> {
    let content = read_source(path)?;
    parse_m50_content(&content, &path.display().to_string())
}

/// 从字符串内容解析 M50
pub fn parse_m50_content(content: &str, source: &str) -> Result<Settings> {
    let mut title: Option<String> = None;
    let mut cell: Option<[f64; 6]> = None;
    let mut space_group: Option<String> = None;
    let mut space_group_number: Option<u32> = None;
    let mut expressions: Vec<String> = Vec::new();
    let mut operations: Vec<SymmetryOperation> = Vec::new();
    let mut finished = false;

    for (i, line) in content.lines().enumerate() {
        let line_no = i + 1;
        let line = line.trim_end_matches('\r');

        if line.starts_with("end refine") {
            finished = true;
            break;
        } else if let Some(rest) = line.strip_prefix("title") {
            title = Some(rest.trim().to_string());
        } else if let Some(rest) = line.strip_prefix("cell") {
            let values: Vec<f64> = rest
                .split_whitespace()
                .map(|v| v.parse::<f64>())
                .collect::<std::result::Result<_, _>>()
                .map_err(|_| JanaError::malformed(source, line_no, "non-numeric cell parameter"))?;
            if values.len() != 6 {
                return Err(JanaError::malformed(
                    source,
                    line_no,
                    format!("expected 6 cell parameters, found {}", values.len()),
                ));
            }
            cell = Some([values[0], values[1], values[2], values[3], values[4], values[5]]);
        } else if let Some(rest) = line.strip_prefix("spgroup") {
            let parts: Vec<&str> = rest.split_whitespace().collect();
            if parts.is_empty() {
                return Err(JanaError::malformed(source, line_no, "empty spgroup record"));
            }
            space_group = Some(parts[0].to_string());
            space_group_number = parts.get(1).and_then(|n| n.parse().ok());
        } else if let Some(rest) = line.strip_prefix("symmetry") {
            let expression = rest.trim().to_string();
            let operation = SymmetryOperation::from_xyz(&expression)
                .and_then(|op| op.reciprocal())
                .map_err(|e| JanaError::malformed(source, line_no, e.to_string()))?;
            expressions.push(expression);
            operations.push(operation);
        }
    }

    if !finished {
        return Err(JanaError::malformed(
            source,
            content.lines().count().max(1),
            "missing 'end refine' record (truncated file?)",
        ));
    }

    // 没有 symmetry 记录时按 P1 处理
    let symmetry = if operations.is_empty() {
        SymmetryOperationSet::trivial()
    } else {
        SymmetryOperationSet::new(operations)?
    };

    Ok(Settings {
        source: source.to_string(),
        title,
        cell,
        space_group,
        space_group_number,
        symmetry_expressions: expressions,
        symmetry,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const M50_P21C: &str = "Version Jana2020
title   test structure
cell 5.4 7.1 9.3 90 101.2 90
esdcell 0.001 0.001 0.001 0 0.01 0
spgroup P21/c 14 1
lattice P
symmetry x y z
symmetry -x y+1/2 -z+1/2
symmetry -x -y -z
symmetry x -y+1/2 z+1/2
unitsnumb 4
atlist C 4 H 8
refine
  fsquare 0 snlmx 0.7
end refine
";

    #[test]
    fn test_parse_m50_monoclinic() {
        let settings = parse_m50_content(M50_P21C, "test.m50").unwrap();
        assert_eq!(settings.title.as_deref(), Some("test structure"));
        assert_eq!(settings.space_group.as_deref(), Some("P21/c"));
        assert_eq!(settings.space_group_number, Some(14));
        assert_eq!(settings.cell.unwrap()[4], 101.2);
        assert_eq!(settings.symmetry_expressions.len(), 4);
        assert_eq!(settings.symmetry.len(), 4);
        assert!(settings.symmetry.contains_inversion());
    }

    #[test]
    fn test_esdcell_is_not_cell() {
        let settings = parse_m50_content(M50_P21C, "test.m50").unwrap();
        assert_eq!(settings.cell.unwrap()[0], 5.4);
    }

    #[test]
    fn test_truncated_m50() {
        let truncated = M50_P21C.replace("end refine\n", "");
        assert!(matches!(
            parse_m50_content(&truncated, "t.m50"),
            Err(JanaError::MalformedFile { .. })
        ));
    }

    #[test]
    fn test_no_symmetry_records_is_p1() {
        let settings = parse_m50_content("title x\nend refine\n", "t.m50").unwrap();
        assert_eq!(settings.symmetry.len(), 1);
        assert_eq!(settings.space_group, None);
    }

    #[test]
    fn test_missing_identity_is_symmetry_error() {
        let content = "spgroup P2 3\nsymmetry -x y -z\nend refine\n";
        assert!(matches!(
            parse_m50_content(content, "t.m50"),
            Err(JanaError::SymmetryError(_))
        ));
    }

    #[test]
    fn test_infinite_order_symmetry_is_symmetry_error() {
        let content = "spgroup P1 1\nsymmetry x y z\nsymmetry x+y x z\nend refine\n";
        assert!(matches!(
            parse_m50_content(content, "t.m50"),
            Err(JanaError::SymmetryError(_))
        ));
    }

    #[test]
    fn test_bad_symmetry_line_reports_line() {
        let content = "spgroup P1 1\nsymmetry x y z\nsymmetry x y\nend refine\n";
        assert!(matches!(
            parse_m50_content(content, "t.m50"),
            Err(JanaError::MalformedFile { line: 3, .. })
        ));
    }
}
