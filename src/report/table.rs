//! # 终端表格
//!
//! 把 `RFactorSummary`、`RefinementLog` 与对映体比较结果格式化为 `tabled` 表格。
//! R 值以百分数显示，保留两位小数，未定义为 "n/a"。
//!
//! ## 依赖关系
//! - 被 `commands/merge.rs` 和 `commands/extract.rs` 使用
//! - 被 `commands/zscore.rs` 使用
//! - 使用 `models/summary.rs`, `parsers/ref_file.rs`, `merge/enantiomorph.rs`

use crate::merge::enantiomorph::EnantiomorphComparison;
use crate::models::{fixed, percent, RFactorSummary, RFactors};
use crate::parsers::ref_file::RefinementLog;

use tabled::{Table, Tabled};

/// 原始 / 合并 R 因子行
#[derive(Debug, Clone, Tabled)]
struct RFactorRow {
    #[tabled(rename = "")]
    label: String,
    #[tabled(rename = "Nobs")]
    nobs: usize,
    #[tabled(rename = "Nall")]
    nall: usize,
    #[tabled(rename = "obs")]
    robs: String,
    #[tabled(rename = "all")]
    rall: String,
    #[tabled(rename = "weighted")]
    wrall: String,
    #[tabled(rename = "wR2 (I)")]
    wr2all: String,
}

impl RFactorRow {
    fn new(label: &str, factors: &RFactors) -> Self {
        Self {
            label: label.to_string(),
            nobs: factors.nobs,
            nall: factors.nall,
            robs: percent(factors.robs),
            rall: percent(factors.rall),
            wrall: percent(factors.wrall),
            wr2all: percent(factors.wr2all),
        }
    }
}

/// 逐块行
#[derive(Debug, Clone, Tabled)]
struct BlockRow {
    #[tabled(rename = "Block")]
    block: u32,
    #[tabled(rename = "Thickness (Å)")]
    thickness: String,
    #[tabled(rename = "Nobs")]
    nobs: usize,
    #[tabled(rename = "Nall")]
    nall: usize,
    #[tabled(rename = "Robs")]
    robs: String,
    #[tabled(rename = "Rall")]
    rall: String,
    #[tabled(rename = "wRall")]
    wrall: String,
    #[tabled(rename = "MRobs")]
    mrobs: String,
    #[tabled(rename = "MRall")]
    mrall: String,
    #[tabled(rename = "MwRall")]
    mwrall: String,
}

/// 批量模式中每个精修一行
#[derive(Debug, Clone, Tabled)]
struct BatchRow {
    #[tabled(rename = "Refinement")]
    name: String,
    #[tabled(rename = "Space group")]
    space_group: String,
    #[tabled(rename = "Blocks")]
    blocks: usize,
    #[tabled(rename = "Nobs/Nall")]
    counts: String,
    #[tabled(rename = "Robs")]
    robs: String,
    #[tabled(rename = "Rall")]
    rall: String,
    #[tabled(rename = "wRall")]
    wrall: String,
    #[tabled(rename = "MNobs/MNall")]
    merged_counts: String,
    #[tabled(rename = "MRobs")]
    mrobs: String,
    #[tabled(rename = "MRall")]
    mrall: String,
    #[tabled(rename = "MwRall")]
    mwrall: String,
}

/// `.ref` 提取结果行
#[derive(Debug, Clone, Tabled)]
struct ExtractRow {
    #[tabled(rename = "File")]
    file: String,
    #[tabled(rename = "Parameters")]
    parameters: String,
    #[tabled(rename = "Nobs")]
    nobs: String,
    #[tabled(rename = "Nall")]
    nall: String,
    #[tabled(rename = "GOFobs")]
    gof_obs: String,
    #[tabled(rename = "GOFall")]
    gof_all: String,
    #[tabled(rename = "Robs")]
    robs: String,
    #[tabled(rename = "Rall")]
    rall: String,
    #[tabled(rename = "wRall")]
    wrall: String,
}

/// 对映体比较行
#[derive(Debug, Clone, Tabled)]
struct ZScoreRow {
    #[tabled(rename = "Block")]
    block: String,
    #[tabled(rename = "N")]
    count: usize,
    #[tabled(rename = "k")]
    better_first: usize,
    #[tabled(rename = "N-k")]
    better_second: usize,
    #[tabled(rename = "z")]
    z: String,
    #[tabled(rename = "p(#1)")]
    probability: String,
    #[tabled(rename = "Rall(#1)")]
    rall_first: String,
    #[tabled(rename = "Rall(#2)")]
    rall_second: String,
}

/// 数据块标签，合计行为 "comb."
pub fn block_label(block: Option<u32>) -> String {
    block
        .map(|b| b.to_string())
        .unwrap_or_else(|| "comb.".to_string())
}

/// 对映体比较表
pub fn zscore_table(rows: &[EnantiomorphComparison]) -> String {
    let rows: Vec<ZScoreRow> = rows
        .iter()
        .map(|r| ZScoreRow {
            block: block_label(r.block),
            count: r.count,
            better_first: r.better_first,
            better_second: r.better_second(),
            z: r.z.map(|z| format!("{:.1}σ", z)).unwrap_or_else(|| "n/a".to_string()),
            probability: percent(r.probability),
            rall_first: percent(r.rall_first),
            rall_second: percent(r.rall_second),
        })
        .collect();
    Table::new(&rows).to_string()
}

/// 重复衍射点检查（文本行）
pub fn file_check_lines(summary: &RFactorSummary) -> Vec<String> {
    let mut lines = Vec::new();
    let Some(d) = summary.duplicates else {
        return lines;
    };

    lines.push(format!("Number of duplicates: {}", d.exact_duplicates));
    lines.push(format!(
        "All reflections without duplicates: {}",
        d.unique_indices
    ));
    lines.push(format!(
        "'P1':   {} / {}  observed/all reflections",
        summary.raw.nobs, summary.raw.nall
    ));
    if let Some(merged) = summary.merged {
        lines.push(format!(
            "Merge:  {} / {}  observed/all reflections (point group of {}, {} symmetry duplicates)",
            merged.nobs,
            merged.nall,
            summary.space_group.as_deref().unwrap_or("?"),
            d.duplicate_count
        ));
    }
    if let Some(r_int) = d.r_int {
        lines.push(format!(
            "R(int) = {}%  (max. multiplicity {})",
            percent(Some(r_int)),
            d.max_multiplicity
        ));
    }
    lines
}

/// 原始与合并 R 因子对照表
pub fn summary_table(summary: &RFactorSummary) -> String {
    let mut rows = vec![RFactorRow::new("R", &summary.raw)];
    if let Some(merged) = &summary.merged {
        rows.push(RFactorRow::new("MR", merged));
    }
    Table::new(&rows).to_string()
}

/// 拟合优度一行文本
pub fn gof_line(summary: &RFactorSummary) -> String {
    format!(
        "GOF(obs) = {}  GOF(all) = {}  ({} parameters)",
        fixed(summary.gof.obs, 2),
        fixed(summary.gof.all, 2),
        summary
            .parameters
            .map(|p| p.to_string())
            .unwrap_or_else(|| "unknown".to_string())
    )
}

/// 逐块表格；单块精修返回 None
pub fn block_table(summary: &RFactorSummary) -> Option<String> {
    if !summary.is_multiblock() {
        return None;
    }
    let rows: Vec<BlockRow> = summary
        .blocks
        .iter()
        .map(|b| {
            let merged = b.merged.unwrap_or_default();
            BlockRow {
                block: b.block,
                thickness: fixed(b.thickness, 1),
                nobs: b.raw.nobs,
                nall: b.raw.nall,
                robs: percent(b.raw.robs),
                rall: percent(b.raw.rall),
                wrall: percent(b.raw.wrall),
                mrobs: percent(merged.robs),
                mrall: percent(merged.rall),
                mwrall: percent(merged.wrall),
            }
        })
        .collect();
    Some(Table::new(&rows).to_string())
}

/// 批量汇总表
pub fn batch_table(summaries: &[RFactorSummary]) -> String {
    let rows: Vec<BatchRow> = summaries
        .iter()
        .map(|s| {
            let merged = s.merged.unwrap_or_default();
            BatchRow {
                name: s.name.clone(),
                space_group: s.space_group.clone().unwrap_or_else(|| "?".to_string()),
                blocks: s.blocks.len(),
                counts: format!("{}/{}", s.raw.nobs, s.raw.nall),
                robs: percent(s.raw.robs),
                rall: percent(s.raw.rall),
                wrall: percent(s.raw.wrall),
                merged_counts: format!("{}/{}", merged.nobs, merged.nall),
                mrobs: percent(merged.robs),
                mrall: percent(merged.rall),
                mwrall: percent(merged.wrall),
            }
        })
        .collect();
    Table::new(&rows).to_string()
}

/// 一个目录中 `.ref` 日志的表格，多块精修附加逐块行
pub fn extract_table(logs: &[RefinementLog]) -> String {
    let mut rows = Vec::new();
    for log in logs.iter().filter(|l| l.is_complete()) {
        let factors = log.factors.unwrap_or_default();
        rows.push(ExtractRow {
            file: log.name.clone(),
            parameters: log.parameters.map(|p| p.to_string()).unwrap_or_default(),
            nobs: factors.nobs.to_string(),
            nall: factors.nall.to_string(),
            gof_obs: fixed(log.gof.obs, 2),
            gof_all: fixed(log.gof.all, 2),
            robs: percent(factors.robs),
            rall: percent(factors.rall),
            wrall: percent(factors.wrall),
        });
        for block in &log.blocks {
            rows.push(ExtractRow {
                file: format!("  └ {}", block.label),
                parameters: String::new(),
                nobs: block.factors.nobs.to_string(),
                nall: block.factors.nall.to_string(),
                gof_obs: String::new(),
                gof_all: String::new(),
                robs: percent(block.factors.robs),
                rall: percent(block.factors.rall),
                wrall: percent(block.factors.wrall),
            });
        }
    }
    Table::new(&rows).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BlockSummary, DuplicateStatistics, GoodnessOfFit};
    use crate::parsers::ref_file::parse_ref_content;

    fn factors(nobs: usize, nall: usize, robs: f64, rall: f64, wrall: f64) -> RFactors {
        RFactors {
            nobs,
            nall,
            robs: Some(robs),
            wrobs: None,
            rall: Some(rall),
            wrall: Some(wrall),
            wr2obs: None,
            wr2all: None,
        }
    }

    fn summary() -> RFactorSummary {
        RFactorSummary {
            name: "lta".to_string(),
            space_group: Some("Fm-3c".to_string()),
            parameters: Some(67),
            gof: GoodnessOfFit {
                obs: Some(3.412),
                all: None,
            },
            raw: factors(988, 1794, 0.0965, 0.1179, 0.1058),
            merged: Some(factors(176, 218, 0.0691, 0.0739, 0.0772)),
            duplicates: Some(DuplicateStatistics {
                input_count: 1794,
                exact_duplicates: 240,
                unique_indices: 1554,
                groups: 218,
                duplicate_count: 1576,
                max_multiplicity: 48,
                raw_nobs: 988,
                merged_nobs: 176,
                r_int: Some(0.123),
            }),
            blocks: vec![BlockSummary {
                block: 1,
                raw: factors(988, 1794, 0.0965, 0.1179, 0.1058),
                merged: Some(factors(176, 218, 0.0691, 0.0739, 0.0772)),
                thickness: None,
            }],
        }
    }

    #[test]
    fn test_file_check_lines() {
        let lines = file_check_lines(&summary());
        assert_eq!(lines[0], "Number of duplicates: 240");
        assert_eq!(lines[1], "All reflections without duplicates: 1554");
        assert!(lines[2].contains("988 / 1794"));
        assert!(lines[3].contains("176 / 218"));
        assert!(lines[4].contains("12.30"));
    }

    #[test]
    fn test_summary_table_values() {
        let table = summary_table(&summary());
        for value in ["9.65", "11.79", "10.58", "6.91", "7.39", "7.72"] {
            assert!(table.contains(value), "missing {} in\n{}", value, table);
        }
    }

    #[test]
    fn test_zscore_table() {
        let rows = [
            EnantiomorphComparison {
                block: Some(1),
                count: 100,
                better_first: 60,
                z: Some(2.0),
                probability: Some(0.9772),
                rall_first: Some(0.1012),
                rall_second: Some(0.1135),
            },
            EnantiomorphComparison {
                block: None,
                count: 0,
                better_first: 0,
                z: None,
                probability: None,
                rall_first: None,
                rall_second: None,
            },
        ];
        let table = zscore_table(&rows);
        for value in ["2.0σ", "97.72", "10.12", "11.35", "comb.", "n/a"] {
            assert!(table.contains(value), "missing {} in\n{}", value, table);
        }
    }

    #[test]
    fn test_gof_line() {
        let line = gof_line(&summary());
        assert!(line.contains("GOF(obs) = 3.41"));
        assert!(line.contains("GOF(all) = n/a"));
        assert!(line.contains("67 parameters"));
    }

    #[test]
    fn test_block_table_only_for_multiblock() {
        let mut s = summary();
        assert!(block_table(&s).is_none());

        s.blocks.push(BlockSummary {
            block: 2,
            raw: factors(10, 20, 0.2, 0.3, 0.25),
            merged: None,
            thickness: Some(512.34),
        });
        let table = block_table(&s).unwrap();
        assert!(table.contains("512.3"));
        assert!(table.contains("n/a"));
    }

    #[test]
    fn test_batch_and_extract_tables() {
        let table = batch_table(&[summary()]);
        assert!(table.contains("lta"));
        assert!(table.contains("176/218"));

        let content = "Last screen information window\n\
---------------\n\
|R factors : [1794=988+806/67] |\n\
|GOF(obs)= 3.41 GOF(all)= 2.65 |\n\
|R(obs)= 9.65 wR(obs)= 10.02 R(all)= 11.79 wR(all)= 10.58 |\n\
---------------\n";
        let log = parse_ref_content(content, "lta.ref", "lta").unwrap();
        let table = extract_table(&[log]);
        assert!(table.contains("67"));
        assert!(table.contains("2.65"));
        assert!(table.contains("10.58"));
    }
}
