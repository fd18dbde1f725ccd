//! # extract 子命令实现
//!
//! 扫描目录中的 `.ref` 精修日志，按目录列出精修程序报告的 R 因子，
//! 并标出没有完整信息窗口的日志。
//!
//! ## 依赖关系
//! - 使用 `cli/extract.rs` 定义的 ExtractArgs
//! - 使用 `parsers/ref_file.rs` 解析日志
//! - 使用 `report/` 输出表格与 CSV

use crate::batch::FileCollector;
use crate::cli::extract::ExtractArgs;
use crate::error::{JanaError, Result};
use crate::parsers::ref_file::{parse_ref_file, RefinementLog};
use crate::report::{export, table};
use crate::utils::output;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// 执行 extract 命令
pub fn execute(args: ExtractArgs) -> Result<()> {
    output::print_header("Jana Refinement Log Extraction");

    let dirs = if args.dirs.is_empty() {
        vec![PathBuf::from(".")]
    } else {
        args.dirs.clone()
    };

    let mut files = Vec::new();
    for dir in &dirs {
        if !dir.is_dir() {
            return Err(JanaError::DirectoryNotFound {
                path: dir.display().to_string(),
            });
        }
        files.extend(
            FileCollector::new(dir.clone())
                .with_pattern("*.ref")
                .recursive(args.recursive)
                .collect(),
        );
    }

    if files.is_empty() {
        return Err(JanaError::NoFilesFound {
            pattern: "*.ref".to_string(),
        });
    }

    output::print_info(&format!("Found {} refinement logs", files.len()));

    let mut parsed = Vec::new();
    let mut failures = Vec::new();
    for file in files {
        match parse_ref_file(&file) {
            Ok(log) => parsed.push((file, log)),
            Err(e) => failures.push((file.display().to_string(), e.to_string())),
        }
    }

    let folders = group_by_folder(parsed);
    let mut all_logs = Vec::new();

    for (folder, logs) in folders {
        output::print_separator();
        output::print_info(&format!("Folder: {}", folder.display()));

        if logs.iter().any(|l| l.is_complete()) {
            println!("{}", table::extract_table(&logs));
        }

        for log in logs.iter().filter(|l| !l.is_complete()) {
            output::print_warning(&format!("INCOMPLETE REFINEMENT OUTPUT: {}", log.source));
        }

        all_logs.extend(logs);
    }

    for (path, err) in &failures {
        output::print_error(&format!("  {}: {}", path, err));
    }

    if let Some(csv_path) = &args.csv {
        export::logs_to_csv(&all_logs, csv_path)?;
        output::print_done(&format!("CSV written to '{}'", csv_path.display()));
    }

    let complete = all_logs.iter().filter(|l| l.is_complete()).count();
    output::print_separator();
    output::print_success(&format!(
        "Extracted {} logs: {} complete, {} incomplete, {} unreadable",
        all_logs.len() + failures.len(),
        complete,
        all_logs.len() - complete,
        failures.len()
    ));

    Ok(())
}

/// 按所在目录分组，目录与文件均保持排序
fn group_by_folder(items: Vec<(PathBuf, RefinementLog)>) -> BTreeMap<PathBuf, Vec<RefinementLog>> {
    let mut groups: BTreeMap<PathBuf, Vec<RefinementLog>> = BTreeMap::new();
    for (path, log) in items {
        let folder = path.parent().map(Path::to_path_buf).unwrap_or_default();
        groups.entry(folder).or_default().push(log);
    }
    groups
}
