//! # zscore 子命令实现
//!
//! 读取同一数据对两种对映体模型精修得到的 M83 文件，
//! 逐块给出 z 分数、第一个模型正确的概率与两者的 Rall。
//!
//! ## 依赖关系
//! - 使用 `cli/zscore.rs` 定义的 ZScoreArgs
//! - 使用 `parsers/m83.rs` 读取衍射点
//! - 使用 `merge/enantiomorph.rs` 计算 z 分数
//! - 使用 `report/` 输出表格与 CSV

use crate::cli::zscore::ZScoreArgs;
use crate::error::{JanaError, Result};
use crate::merge::enantiomorph::{compare, EnantiomorphComparison};
use crate::merge::MergeConfig;
use crate::models::percent;
use crate::parsers::m83::parse_m83_file;
use crate::parsers::{companion, refinement_stem};
use crate::report::{export, table};
use crate::utils::output;

use std::path::{Path, PathBuf};

/// 反转模型的默认名称后缀
const INVERTED_SUFFIX: &str = "_INV";

/// 执行 zscore 命令
pub fn execute(args: ZScoreArgs) -> Result<()> {
    output::print_header("Absolute Structure Determination");

    let first = m83_path(&args.first);
    let second = match &args.second {
        Some(path) => m83_path(path),
        None => inverted_path(&args.first),
    };
    for path in [&first, &second] {
        if !path.is_file() {
            return Err(JanaError::FileNotFound {
                path: path.display().to_string(),
            });
        }
    }

    // observed 标记不参与比较
    let sigma_factor = MergeConfig::default().sigma_factor;
    let first_list = parse_m83_file(&first, args.layout.layout(), sigma_factor)?;
    let second_list = parse_m83_file(&second, args.layout.layout(), sigma_factor)?;
    output::print_input("#1", &first_list.source);
    output::print_input("#2", &second_list.source);

    let rows = compare(&first_list.reflections, &second_list.reflections)?;
    output::print_info(&format!(
        "{} reflections compared in {} block(s)",
        first_list.reflections.len(),
        first_list.blocks().len()
    ));

    output::print_separator();
    println!("{}", table::zscore_table(&rows));

    if let Some(line) = rows.last().and_then(verdict) {
        output::print_success(&line);
    }

    if let Some(csv_path) = &args.csv {
        export::comparisons_to_csv(&rows, csv_path)?;
        output::print_done(&format!("CSV written to '{}'", csv_path.display()));
    }

    Ok(())
}

/// 接受 `name.m83` 或精修名称
fn m83_path(path: &Path) -> PathBuf {
    companion(&refinement_stem(path), "m83")
}

/// `run/lta.m83` -> `run/lta_INV.m83`
fn inverted_path(first: &Path) -> PathBuf {
    let mut stem = refinement_stem(first).into_os_string();
    stem.push(INVERTED_SUFFIX);
    companion(Path::new(&stem), "m83")
}

/// 总体结论：z > 0 支持 #1，z < 0 支持 #2
fn verdict(row: &EnantiomorphComparison) -> Option<String> {
    let z = row.z?;
    let p = row.probability?;
    let (model, probability) = if z >= 0.0 { ("#1", p) } else { ("#2", 1.0 - p) };
    Some(format!(
        "Model {} is the correct enantiomorph with probability {}% (z = {:.1})",
        model,
        percent(Some(probability)),
        z.abs()
    ))
}
