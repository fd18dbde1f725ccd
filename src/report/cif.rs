//! # CIF 写出
//!
//! 把 R 因子汇总格式化为文本块，写入 CIF 的 `_refine_special_details`
//! （分号文本字段，替换原有值），并可删除首个标签以指定前缀开头的循环
//! （例如精修程序写出的 `_refln_` 衍射点列表）。
//!
//! ## 依赖关系
//! - 被 `commands/merge.rs` 使用
//! - 使用 `models/summary.rs`
//! - 使用 `regex` 定位已有字段

use crate::error::{JanaError, Result};
use crate::models::{fixed, percent, RFactorSummary};

use regex::{NoExpand, Regex};
use std::fs;
use std::path::Path;

const DETAILS_TAG: &str = "_refine_special_details";

/// 生成写入 `_refine_special_details` 的文本块
pub fn format_details(summary: &RFactorSummary) -> String {
    let mut lines = Vec::new();

    if summary.is_multiblock() {
        lines.push(format!(
            "Refinement against {} data blocks.",
            summary.blocks.len()
        ));
        lines.push("Block  Thickness(A)  Nobs  Nall   Robs   Rall  wRall".to_string());
        for b in &summary.blocks {
            lines.push(format!(
                "{:>5}  {:>12}  {:>4}  {:>4}  {:>5}  {:>5}  {:>5}",
                b.block,
                fixed(b.thickness, 1),
                b.raw.nobs,
                b.raw.nall,
                percent(b.raw.robs),
                percent(b.raw.rall),
                percent(b.raw.wrall)
            ));
        }
    } else if let Some(thickness) = summary.blocks.first().and_then(|b| b.thickness) {
        lines.push(format!("Mean crystal thickness: {:.1} A.", thickness));
    }

    lines.push(format!(
        "R factors (%) for {}/{} observed/all reflections: Robs {}, Rall {}, wRall {}.",
        summary.raw.nobs,
        summary.raw.nall,
        percent(summary.raw.robs),
        percent(summary.raw.rall),
        percent(summary.raw.wrall)
    ));

    if let Some(merged) = &summary.merged {
        lines.push(format!(
            "After merging symmetry-equivalent reflections in the point group of {} \
             ({}/{} observed/all): MRobs {}, MRall {}, MwRall {}.",
            summary.space_group.as_deref().unwrap_or("?"),
            merged.nobs,
            merged.nall,
            percent(merged.robs),
            percent(merged.rall),
            percent(merged.wrall)
        ));
    }

    lines.join("\n")
}

/// 插入或替换 `_refine_special_details` 的值
pub fn upsert_special_details(cif_text: &str, details: &str) -> Result<String> {
    let field = format!("{}\n;\n{}\n;\n", DETAILS_TAG, details.trim_end());

    // 分号文本字段、写在下一行的值，或同一行内的值
    let pattern = Regex::new(
        r"(?m)^_refine_special_details[ \t]*(?:\r?\n;(?s:.*?)^;[ \t]*\r?$|\r?\n[ \t]*[^_;#\s][^\r\n]*|[^\r\n]*)\r?\n?",
    )
    .map_err(|e| JanaError::Other(e.to_string()))?;

    if pattern.is_match(cif_text) {
        Ok(pattern.replace(cif_text, NoExpand(&field)).into_owned())
    } else {
        Ok(format!("{}\n\n{}", cif_text.trim_end(), field))
    }
}

/// 删除首个标签以 `prefix` 开头的 `loop_`
pub fn remove_loops(cif_text: &str, prefix: &str) -> String {
    let lines: Vec<&str> = cif_text.lines().collect();
    let mut kept: Vec<&str> = Vec::with_capacity(lines.len());
    let mut i = 0;

    while i < lines.len() {
        let line = lines[i];
        let is_loop = line.trim().eq_ignore_ascii_case("loop_");
        let first_tag = lines.get(i + 1).map(|l| l.trim()).unwrap_or("");

        if !(is_loop && first_tag.starts_with(prefix)) {
            kept.push(line);
            i += 1;
            continue;
        }

        // 跳过 loop_ 与标签行
        i += 1;
        while i < lines.len() && lines[i].trim_start().starts_with('_') {
            i += 1;
        }
        // 跳过数据行，分号文本字段内部不判断结束
        let mut in_text_field = false;
        while i < lines.len() {
            let line = lines[i];
            if line.starts_with(';') {
                in_text_field = !in_text_field;
                i += 1;
                continue;
            }
            if !in_text_field && ends_loop(line) {
                break;
            }
            i += 1;
        }
    }

    let mut result = kept.join("\n");
    if cif_text.ends_with('\n') {
        result.push('\n');
    }
    result
}

fn ends_loop(line: &str) -> bool {
    let trimmed = line.trim_start();
    trimmed.is_empty()
        || trimmed.starts_with('_')
        || trimmed.starts_with('#')
        || trimmed.to_ascii_lowercase().starts_with("loop_")
        || trimmed.to_ascii_lowercase().starts_with("data_")
}

/// 读取 CIF，写入文本块并删除指定循环
pub fn write_cif(
    input: &Path,
    output: &Path,
    summary: &RFactorSummary,
    drop_loops: &[String],
) -> Result<()> {
    let text = fs::read_to_string(input).map_err(|e| JanaError::FileReadError {
        path: input.display().to_string(),
        source: e,
    })?;

    let mut text = upsert_special_details(&text, &format_details(summary))?;
    for prefix in drop_loops {
        text = remove_loops(&text, prefix);
    }

    fs::write(output, text).map_err(|e| JanaError::FileWriteError {
        path: output.display().to_string(),
        source: e,
    })
}
