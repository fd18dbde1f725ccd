//! # CSV 导出
//!
//! 导出 R 因子汇总（每个精修一行，多块精修附加逐块行）、`.ref` 提取结果
//! 与对映体比较结果。
//! R 值以百分数写出，未定义为 "n/a"。
//!
//! ## 依赖关系
//! - 被 `commands/merge.rs`、`commands/extract.rs` 和 `commands/zscore.rs` 调用
//! - 使用 `csv` 库写入 CSV 文件

use crate::error::{JanaError, Result};
use crate::merge::enantiomorph::EnantiomorphComparison;
use crate::models::{fixed, percent, RFactorSummary, RFactors};
use crate::parsers::ref_file::RefinementLog;
use crate::report::table::block_label;

use std::path::Path;

fn factor_fields(factors: Option<&RFactors>) -> Vec<String> {
    match factors {
        Some(f) => vec![
            f.nobs.to_string(),
            f.nall.to_string(),
            percent(f.robs),
            percent(f.wrobs),
            percent(f.rall),
            percent(f.wrall),
            percent(f.wr2obs),
            percent(f.wr2all),
        ],
        None => vec!["n/a".to_string(); 8],
    }
}

/// 导出 R 因子汇总
pub fn summaries_to_csv(summaries: &[RFactorSummary], output_path: &Path) -> Result<()> {
    let mut wtr = csv::Writer::from_path(output_path).map_err(JanaError::CsvError)?;

    wtr.write_record([
        "refinement",
        "scope",
        "space_group",
        "parameters",
        "thickness",
        "gof_obs",
        "gof_all",
        "nobs",
        "nall",
        "robs",
        "wrobs",
        "rall",
        "wrall",
        "wr2obs",
        "wr2all",
        "merged_nobs",
        "merged_nall",
        "mrobs",
        "mwrobs",
        "mrall",
        "mwrall",
        "mwr2obs",
        "mwr2all",
        "duplicates",
        "groups",
        "r_int",
    ])
    .map_err(JanaError::CsvError)?;

    for s in summaries {
        let space_group = s.space_group.clone().unwrap_or_default();
        let parameters = s.parameters.map(|p| p.to_string()).unwrap_or_default();

        let mut record = vec![
            s.name.clone(),
            "all".to_string(),
            space_group.clone(),
            parameters.clone(),
            String::new(),
            fixed(s.gof.obs, 3),
            fixed(s.gof.all, 3),
        ];
        record.extend(factor_fields(Some(&s.raw)));
        record.extend(factor_fields(s.merged.as_ref()));
        match &s.duplicates {
            Some(d) => record.extend([
                d.duplicate_count.to_string(),
                d.groups.to_string(),
                percent(d.r_int),
            ]),
            None => record.extend(vec![String::new(); 3]),
        }
        wtr.write_record(&record).map_err(JanaError::CsvError)?;

        if !s.is_multiblock() {
            continue;
        }
        for b in &s.blocks {
            let mut record = vec![
                s.name.clone(),
                format!("block{}", b.block),
                space_group.clone(),
                parameters.clone(),
                fixed(b.thickness, 1),
                String::new(),
                String::new(),
            ];
            record.extend(factor_fields(Some(&b.raw)));
            record.extend(factor_fields(b.merged.as_ref()));
            record.extend(vec![String::new(); 3]);
            wtr.write_record(&record).map_err(JanaError::CsvError)?;
        }
    }

    wtr.flush().map_err(|e| JanaError::FileWriteError {
        path: output_path.display().to_string(),
        source: e,
    })?;

    Ok(())
}

/// 导出 `.ref` 提取结果
pub fn logs_to_csv(logs: &[RefinementLog], output_path: &Path) -> Result<()> {
    let mut wtr = csv::Writer::from_path(output_path).map_err(JanaError::CsvError)?;

    wtr.write_record([
        "file", "scope", "parameters", "gof_obs", "gof_all", "nobs", "nall", "robs", "wrobs",
        "rall", "wrall", "wr2obs", "wr2all",
    ])
    .map_err(JanaError::CsvError)?;

    for log in logs.iter().filter(|l| l.is_complete()) {
        let mut record = vec![
            log.source.clone(),
            "all".to_string(),
            log.parameters.map(|p| p.to_string()).unwrap_or_default(),
            fixed(log.gof.obs, 2),
            fixed(log.gof.all, 2),
        ];
        record.extend(factor_fields(log.factors.as_ref()));
        wtr.write_record(&record).map_err(JanaError::CsvError)?;

        for block in &log.blocks {
            let mut record = vec![
                log.source.clone(),
                block.label.clone(),
                block.parameters.to_string(),
                String::new(),
                String::new(),
            ];
            record.extend(factor_fields(Some(&block.factors)));
            wtr.write_record(&record).map_err(JanaError::CsvError)?;
        }
    }

    wtr.flush().map_err(|e| JanaError::FileWriteError {
        path: output_path.display().to_string(),
        source: e,
    })?;

    Ok(())
}

/// 导出对映体比较结果
pub fn comparisons_to_csv(rows: &[EnantiomorphComparison], output_path: &Path) -> Result<()> {
    let mut wtr = csv::Writer::from_path(output_path).map_err(JanaError::CsvError)?;

    wtr.write_record(["block", "n", "k", "n_minus_k", "z", "p_first", "rall_first", "rall_second"])
        .map_err(JanaError::CsvError)?;

    for r in rows {
        wtr.write_record([
            block_label(r.block),
            r.count.to_string(),
            r.better_first.to_string(),
            r.better_second().to_string(),
            fixed(r.z, 2),
            percent(r.probability),
            percent(r.rall_first),
            percent(r.rall_second),
        ])
        .map_err(JanaError::CsvError)?;
    }

    wtr.flush().map_err(|e| JanaError::FileWriteError {
        path: output_path.display().to_string(),
        source: e,
    })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BlockSummary, GoodnessOfFit};
    use crate::parsers::ref_file::{RefBlockRow, RefinementLog};
    use std::fs;

    fn factors(nobs: usize, nall: usize) -> RFactors {
        RFactors {
            nobs,
            nall,
            robs: Some(0.1),
            wrobs: Some(0.11),
            rall: Some(0.12),
            wrall: Some(0.13),
            wr2obs: None,
            wr2all: None,
        }
    }

    #[test]
    fn test_summaries_csv_with_blocks() {
        let summary = RFactorSummary {
            name: "lta".to_string(),
            space_group: Some("P21/c".to_string()),
            parameters: Some(184),
            gof: GoodnessOfFit {
                obs: Some(2.5),
                all: Some(1.8),
            },
            raw: factors(30, 60),
            merged: None,
            duplicates: None,
            blocks: vec![
                BlockSummary {
                    block: 1,
                    raw: factors(10, 20),
                    merged: None,
                    thickness: Some(400.0),
                },
                BlockSummary {
                    block: 2,
                    raw: factors(20, 40),
                    merged: None,
                    thickness: None,
                },
            ],
        };

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("summary.csv");
        summaries_to_csv(&[summary], &path).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("refinement,scope,space_group"));
        assert!(lines[1].starts_with("lta,all,P21/c,184,,2.500,1.800,30,60,10.00,11.00,12.00,13.00,n/a"));
        assert!(lines[2].starts_with("lta,block1,P21/c,184,400.0,,,10,20"));
        assert!(lines[3].starts_with("lta,block2,P21/c,184,n/a,,,20,40"));
    }

    #[test]
    fn test_logs_csv_skips_incomplete() {
        let complete = RefinementLog {
            source: "a/lta.ref".to_string(),
            name: "lta".to_string(),
            parameters: Some(184),
            gof: GoodnessOfFit::default(),
            factors: Some(factors(30, 60)),
            multiblock: true,
            blocks: vec![RefBlockRow {
                label: "Block1".to_string(),
                cycle: 12,
                parameters: 184,
                factors: factors(10, 20),
            }],
        };
        let incomplete = RefinementLog {
            source: "a/broken.ref".to_string(),
            name: "broken".to_string(),
            parameters: None,
            gof: GoodnessOfFit::default(),
            factors: None,
            multiblock: false,
            blocks: Vec::new(),
        };

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("extract.csv");
        logs_to_csv(&[complete, incomplete], &path).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().count(), 3);
        assert!(text.contains("a/lta.ref,Block1,184,,,10,20"));
        assert!(!text.contains("broken"));
    }
}
