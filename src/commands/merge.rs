//! # merge 子命令实现
//!
//! 读取一次精修的 M50/M83（及可选的 `.ref`、M42），合并对称等价衍射点，
//! 报告原始与合并后的 R 因子。
//!
//! ## 功能
//! - 单精修模式：详细报告，可写入 CIF
//! - 批量目录模式：并行处理所有 `*.m83`，输出汇总表
//! - 可选 CSV 导出
//!
//! ## 依赖关系
//! - 使用 `cli/merge.rs` 定义的 MergeArgs
//! - 使用 `parsers/` 读取 Jana 文件
//! - 使用 `merge/` 进行合并与 R 因子计算
//! - 使用 `report/` 输出表格、CSV 与 CIF
//! - 使用 `batch/` 模块进行批量处理

use crate::batch::{BatchRunner, FileCollector, ProcessResult};
use crate::cli::merge::MergeArgs;
use crate::error::{JanaError, Result};
use crate::merge::{RFactorAnalyzer, Refinement};
use crate::models::{percent, RFactorSummary};
use crate::parsers::m42::{parse_m42_file, FrameParameters};
use crate::parsers::m50::parse_m50_file;
use crate::parsers::m83::parse_m83_file;
use crate::parsers::ref_file::{parse_ref_file, RefinementLog};
use crate::parsers::{companion, refinement_stem};
use crate::report::{cif, export, table};
use crate::utils::{output, progress};

use std::path::{Path, PathBuf};

/// 执行 merge 命令
pub fn execute(args: MergeArgs) -> Result<()> {
    output::print_header("Reflection Merging & R Factors");
    args.validate()?;

    // 检测输入类型：文件、精修名称或目录
    if args.input.is_file() {
        execute_single(&refinement_stem(&args.input), &args)
    } else if args.input.is_dir() {
        execute_batch(&args)
    } else if companion(&args.input, "m83").is_file() {
        execute_single(&args.input, &args)
    } else {
        Err(JanaError::FileNotFound {
            path: args.input.display().to_string(),
        })
    }
}

/// 读取的精修及其可选配套文件
struct LoadedRefinement {
    refinement: Refinement,
    log: Option<RefinementLog>,
    frames: Option<FrameParameters>,
}

/// 读取一次精修的全部输入文件
fn load_refinement(stem: &Path, args: &MergeArgs) -> Result<LoadedRefinement> {
    let settings = parse_m50_file(&companion(stem, "m50"))?;
    let reflections = parse_m83_file(
        &companion(stem, "m83"),
        args.layout.layout(),
        args.sigma_factor,
    )?;

    let ref_path = companion(stem, "ref");
    let log = if ref_path.is_file() {
        Some(parse_ref_file(&ref_path)?)
    } else {
        None
    };

    let m42_path = companion(stem, "m42");
    let frames = if m42_path.is_file() {
        Some(parse_m42_file(&m42_path)?)
    } else {
        None
    };

    let name = stem
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("unknown")
        .to_string();

    let refinement = Refinement {
        name,
        settings,
        reflections,
        // 命令行优先于 .ref 中的值
        parameters: args
            .parameters
            .or_else(|| log.as_ref().and_then(|l| l.parameters)),
        thickness: frames
            .as_ref()
            .map(|f| f.block_thickness())
            .unwrap_or_default(),
    };

    Ok(LoadedRefinement {
        refinement,
        log,
        frames,
    })
}

/// 单精修模式
fn execute_single(stem: &Path, args: &MergeArgs) -> Result<()> {
    output::print_info(&format!("Single refinement mode: '{}'", stem.display()));

    let loaded = load_refinement(stem, args)?;
    let refinement = &loaded.refinement;

    output::print_input("M50", &refinement.settings.source);
    output::print_detail(&format!(
        "Space group {} ({} point-group operations)",
        refinement.settings.space_group.as_deref().unwrap_or("?"),
        refinement.settings.symmetry.len()
    ));
    output::print_input("M83", &refinement.reflections.source);
    output::print_detail(&format!(
        "{} reflections ({} observed) in {} block(s), {} layout",
        refinement.reflections.reflections.len(),
        refinement.reflections.observed_count(),
        refinement.reflections.blocks().len(),
        refinement.reflections.layout
    ));
    if let Some(log) = &loaded.log {
        output::print_input("REF", &log.source);
    }
    if let Some(frames) = &loaded.frames {
        output::print_input("M42", &companion(stem, "m42").display().to_string());
        output::print_detail(&format!(
            "{} of {} frames used in {} block(s)",
            frames.used_count(),
            frames.frames.len(),
            frames.block_count()
        ));
    }
    if refinement.parameters.is_none() {
        output::print_warning("Number of parameters unknown; GOF not computed (use --parameters)");
    }

    let analyzer = RFactorAnalyzer::new(args.merge_config());
    let config = analyzer.config();
    output::print_info(&format!(
        "Merging: {} averaging, observed if I > {}·σ(I), u = {}{}",
        config.averaging,
        config.sigma_factor,
        config.instability_factor,
        if config.friedel { ", Friedel pairs merged" } else { "" }
    ));

    let spinner = progress::create_spinner("Merging reflections...");
    let result = analyzer.analyze(refinement);
    spinner.finish_and_clear();
    let summary = result?;

    output::print_separator();
    println!("File check:");
    for line in table::file_check_lines(&summary) {
        output::print_detail(&line);
    }
    println!();
    println!("{}", table::summary_table(&summary));
    println!("{}", table::gof_line(&summary));

    if let Some(blocks) = table::block_table(&summary) {
        println!();
        println!("{}", blocks);
    }

    if let Some(factors) = loaded.log.as_ref().and_then(|l| l.factors) {
        output::print_info(&format!(
            "Reported by Jana: Robs = {}%, wRobs = {}%, Rall = {}%, wRall = {}%",
            percent(factors.robs),
            percent(factors.wrobs),
            percent(factors.rall),
            percent(factors.wrall)
        ));
    }

    if let Some(csv_path) = &args.csv {
        export::summaries_to_csv(std::slice::from_ref(&summary), csv_path)?;
        output::print_done(&format!("CSV written to '{}'", csv_path.display()));
    }

    if let Some(cif_path) = &args.cif {
        let target = args.cif_output.as_ref().unwrap_or(cif_path);
        cif::write_cif(cif_path, target, &summary, &args.drop_loops)?;
        output::print_done(&format!("CIF written to '{}'", target.display()));
    }

    output::print_separator();
    output::print_success(&format!("Merged '{}'", summary.name));
    Ok(())
}

/// 批量处理模式
fn execute_batch(args: &MergeArgs) -> Result<()> {
    output::print_info(&format!("Batch mode: directory '{}'", args.input.display()));

    if args.cif.is_some() {
        output::print_warning("--cif is only used in single refinement mode; ignored");
    }

    // 收集文件
    let files = FileCollector::new(args.input.clone())
        .with_pattern(&args.pattern)
        .recursive(args.recursive)
        .collect();

    if files.is_empty() {
        return Err(JanaError::NoFilesFound {
            pattern: args.pattern.clone(),
        });
    }

    output::print_info(&format!("Found {} reflection files", files.len()));

    let analyzer = RFactorAnalyzer::new(args.merge_config());

    // 并行处理
    let runner = BatchRunner::new(args.jobs);
    let result = runner.run(files, "Merging", |file| {
        process_batch_file(file, args, &analyzer)
    })?;

    // 打印统计
    output::print_separator();
    if !result.outputs.is_empty() {
        println!("{}", table::batch_table(&result.outputs));
    }

    for path in &result.skipped {
        output::print_skip(&format!("{}: no matching .m50", path));
    }

    output::print_success(&format!(
        "Batch complete: {} success, {} skipped, {} failed",
        result.success(),
        result.skipped.len(),
        result.failures.len()
    ));

    if !result.failures.is_empty() {
        output::print_warning("Failed refinements:");
        for (path, err) in result.failures.iter().take(10) {
            output::print_error(&format!("  {}: {}", path, err));
        }
        if result.failures.len() > 10 {
            output::print_warning(&format!("  ... and {} more", result.failures.len() - 10));
        }
    }

    if let Some(csv_path) = &args.csv {
        export::summaries_to_csv(&result.outputs, csv_path)?;
        output::print_done(&format!("CSV written to '{}'", csv_path.display()));
    }

    Ok(())
}

/// 处理批量中的单个 M83 文件
fn process_batch_file(
    file: &PathBuf,
    args: &MergeArgs,
    analyzer: &RFactorAnalyzer,
) -> ProcessResult<RFactorSummary> {
    let stem = refinement_stem(file);
    if !companion(&stem, "m50").is_file() {
        return ProcessResult::Skipped(file.display().to_string());
    }

    match load_refinement(&stem, args).and_then(|loaded| analyzer.analyze(&loaded.refinement)) {
        Ok(summary) => ProcessResult::Success(summary),
        Err(e) => ProcessResult::Failed(file.display().to_string(), e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Cli, Commands};
    use clap::Parser;
    use std::fs;

    const M50: &str = "\
title test
cell 5 6 7 90 100 90
spgroup P2/m 10
symmetry x y z
symmetry -x y -z
symmetry -x -y -z
symmetry x -y z
end refine
";

    fn m83_line(h: i32, k: i32, l: i32, ic: f64, io: f64, sigma: f64) -> String {
        format!(
            "{:4}{:4}{:4}{:15.6}{:15.6}{:15.6} {}    1{:10.3}{:10.2}{:10.2}{:10.2}{:15.5}{:10.2}{:10.2}{:10.2}",
            h, k, l, ic, io, sigma, 'o', 0.5, 10.0, 10.0, 0.5, 0.0, 0.0, 0.0, 0.0
        )
    }

    fn args(input: &Path, extra: &[&str]) -> MergeArgs {
        let mut argv = vec!["jana-tools".to_string(), "merge".to_string()];
        argv.push(input.display().to_string());
        argv.extend(extra.iter().map(|s| s.to_string()));
        match Cli::parse_from(argv).command {
            Commands::Merge(args) => args,
            _ => unreachable!(),
        }
    }

    fn write_refinement(dir: &Path, name: &str) -> PathBuf {
        let stem = dir.join(name);
        fs::write(companion(&stem, "m50"), M50).unwrap();
        let lines = [
            m83_line(1, 2, 3, 95.0, 100.0, 5.0),
            m83_line(-1, 2, -3, 95.0, 110.0, 5.0),
            m83_line(2, 0, 0, 380.0, 400.0, 10.0),
        ];
        fs::write(companion(&stem, "m83"), lines.join("\n") + "\n").unwrap();
        stem
    }

    #[test]
    fn test_load_refinement_with_parameter_override() {
        let dir = tempfile::tempdir().unwrap();
        let stem = write_refinement(dir.path(), "lta");

        let loaded = load_refinement(&stem, &args(&stem, &["-p", "12"])).unwrap();
        assert_eq!(loaded.refinement.name, "lta");
        assert_eq!(loaded.refinement.parameters, Some(12));
        assert_eq!(loaded.refinement.reflections.reflections.len(), 3);
        assert!(loaded.log.is_none());
        assert!(loaded.frames.is_none());
        assert!(loaded.refinement.thickness.is_empty());
    }

    #[test]
    fn test_batch_file_skipped_without_m50() {
        let dir = tempfile::tempdir().unwrap();
        let stem = write_refinement(dir.path(), "lta");
        fs::remove_file(companion(&stem, "m50")).unwrap();

        let a = args(dir.path(), &[]);
        let analyzer = RFactorAnalyzer::new(a.merge_config());
        let result = process_batch_file(&companion(&stem, "m83"), &a, &analyzer);
        assert!(matches!(result, ProcessResult::Skipped(_)));
    }

    #[test]
    fn test_batch_file_merges_equivalents() {
        let dir = tempfile::tempdir().unwrap();
        let stem = write_refinement(dir.path(), "lta");

        let a = args(dir.path(), &[]);
        let analyzer = RFactorAnalyzer::new(a.merge_config());
        let ProcessResult::Success(summary) =
            process_batch_file(&companion(&stem, "m83"), &a, &analyzer)
        else {
            panic!("expected success");
        };
        assert_eq!(summary.raw.nall, 3);
        assert_eq!(summary.merged.map(|m| m.nall), Some(2));
    }

    #[test]
    fn test_execute_single_writes_csv() {
        let dir = tempfile::tempdir().unwrap();
        let stem = write_refinement(dir.path(), "lta");
        let csv_path = dir.path().join("out.csv");

        let a = args(
            &companion(&stem, "m83"),
            &["--csv", csv_path.to_str().unwrap()],
        );
        execute(a).unwrap();
        assert!(fs::read_to_string(&csv_path).unwrap().contains("lta"));
    }

    #[test]
    fn test_execute_missing_input() {
        let dir = tempfile::tempdir().unwrap();
        let a = args(&dir.path().join("nothing"), &[]);
        assert!(matches!(execute(a), Err(JanaError::FileNotFound { .. })));
    }
}
