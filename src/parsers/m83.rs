//! # Jana M83 衍射点列表解析器
//!
//! 每行一个衍射点：h k l、Ic、Io、σ(Io)、observed 标记、w(Fo−Fc)、1/weight，
//! 动力学精修行尾为 `Zone` 或 `Zone%Block`。以 `B` 开头的行
//! （`BlockN begin/end`）是多块精修的分隔标记，跳过。
//!
//! 列位置由 `ColumnLayout` 给出，未指定时按首个数据行的长度识别。
//!
//! ## 依赖关系
//! - 被 `commands/merge.rs` 使用
//! - 使用 `parsers/layout.rs`, `models/reflection.rs`

use crate::error::{JanaError, Result};
use crate::models::{Hkl, Reflection};
use crate::parsers::layout::{ColumnLayout, RefinementKind};
use crate::parsers::read_source;

use std::collections::BTreeSet;
use std::ops::Range;
use std::path::Path;
use std::str::FromStr;

/// 解析后的衍射点列表
#[derive(Debug, Clone)]
pub struct ReflectionList {
    /// 来源文件
    pub source: String,
    /// 使用的列布局名称
    pub layout: &'static str,
    /// 精修类型
    pub kind: RefinementKind,
    /// 衍射点（保持文件顺序）
    pub reflections: Vec<Reflection>,
}

impl ReflectionList {
    /// 出现的数据块编号（升序）
    pub fn blocks(&self) -> BTreeSet<u32> {
        self.reflections.iter().map(|r| r.block).collect()
    }

    pub fn observed_count(&self) -> usize {
        self.reflections.iter().filter(|r| r.observed).count()
    }
}

/// 解析 M83 文件
pub fn parse_m83_file(
    path: &Path,
    layout: Option<&'static ColumnLayout>,
    sigma_factor: f64,
) -> Result<ReflectionList> {
    let content = read_source(path)?;
    parse_m83_content(&content, &path.display().to_string(), layout, sigma_factor)
}

/// 从字符串内容解析 M83
///
/// `sigma_factor` 仅用于 observed 标记列无法识别的行：`Io > k·σ(Io)`。
pub fn parse_m83_content(
    content: &str,
    source: &str,
    layout: Option<&'static ColumnLayout>,
    sigma_factor: f64,
) -> Result<ReflectionList> {
    let mut data_lines = content
        .lines()
        .enumerate()
        .map(|(i, line)| (i + 1, line.trim_end_matches('\r')))
        .filter(|(_, line)| !line.trim().is_empty() && !line.starts_with('B'))
        .peekable();

    let (first_no, first_line) = match data_lines.peek() {
        Some(&(no, line)) => (no, line),
        None => return Err(JanaError::malformed(source, 1, "no reflections found")),
    };

    let (layout, kind) = match layout {
        Some(layout) => (layout, layout.kind_for(first_line.len())),
        None => ColumnLayout::detect(first_line.len()).ok_or_else(|| {
            JanaError::malformed(
                source,
                first_no,
                format!(
                    "unknown M83 line length {}; select the column layout explicitly",
                    first_line.len()
                ),
            )
        })?,
    };

    let mut reflections = Vec::new();
    for (line_no, line) in data_lines {
        reflections.push(parse_line(line, line_no, source, layout, kind, sigma_factor)?);
    }

    Ok(ReflectionList {
        source: source.to_string(),
        layout: layout.name,
        kind,
        reflections,
    })
}

/// 解析单行
fn parse_line(
    line: &str,
    line_no: usize,
    source: &str,
    layout: &ColumnLayout,
    kind: RefinementKind,
    sigma_factor: f64,
) -> Result<Reflection> {
    let text = |name: &str, range: &Range<usize>| take(layout, line, range, name, source, line_no);

    let hkl: Hkl = [
        parse_value(text("h", &layout.h)?, "h", source, line_no)?,
        parse_value(text("k", &layout.k)?, "k", source, line_no)?,
        parse_value(text("l", &layout.l)?, "l", source, line_no)?,
    ];
    let i_calc: f64 = parse_value(text("Ic", &layout.i_calc)?, "Ic", source, line_no)?;
    let i_obs: f64 = parse_value(text("Io", &layout.i_obs)?, "Io", source, line_no)?;
    let sigma: f64 = parse_value(text("sigma(Io)", &layout.sigma)?, "sigma(Io)", source, line_no)?;
    let weighted_delta: f64 = parse_value(
        text("w(Fo-Fc)", &layout.weighted_delta)?,
        "w(Fo-Fc)",
        source,
        line_no,
    )?;
    let inverse_weight: f64 = parse_value(
        text("1/weight", &layout.inverse_weight)?,
        "1/weight",
        source,
        line_no,
    )?;

    if sigma < 0.0 {
        return Err(JanaError::malformed(
            source,
            line_no,
            format!("negative sigma(Io) {}", sigma),
        ));
    }
    if inverse_weight <= 0.0 {
        return Err(JanaError::malformed(
            source,
            line_no,
            format!("non-positive 1/weight {}", inverse_weight),
        ));
    }

    let flag = text("obs", &layout.obs_flag)?;
    let observed = if flag.contains('o') {
        true
    } else if flag.contains('<') {
        false
    } else {
        i_obs > sigma_factor * sigma
    };

    let (zone, block) = match kind {
        RefinementKind::Kinematical => (0, 1),
        RefinementKind::Dynamical => parse_zone_block(line, line_no, source)?,
    };

    Ok(Reflection::new(hkl, i_obs, sigma, i_calc)
        .with_observed(observed)
        .with_zone(zone)
        .with_block(block)
        .with_file_weight(1.0 / inverse_weight, weighted_delta))
}

/// 取固定列字段，行太短时报错
fn take<'a>(
    layout: &ColumnLayout,
    line: &'a str,
    range: &Range<usize>,
    name: &str,
    source: &str,
    line_no: usize,
) -> Result<&'a str> {
    layout.field(line, range).ok_or_else(|| {
        JanaError::malformed(
            source,
            line_no,
            format!("line too short for column '{}' ({} chars)", name, line.len()),
        )
    })
}

/// 解析数值字段；索引为整数，强度保持完整精度
fn parse_value<T: FromStr>(text: &str, name: &str, source: &str, line_no: usize) -> Result<T> {
    text.parse::<T>().map_err(|_| {
        JanaError::malformed(source, line_no, format!("non-numeric {} '{}'", name, text))
    })
}

/// 行尾 `Zone` 或 `Zone%Block`
fn parse_zone_block(line: &str, line_no: usize, source: &str) -> Result<(u32, u32)> {
    let token = line
        .split_whitespace()
        .last()
        .ok_or_else(|| JanaError::malformed(source, line_no, "missing zone column"))?;

    let parse = |text: &str| -> Result<u32> {
        text.parse::<u32>().map_err(|_| {
            JanaError::malformed(source, line_no, format!("invalid Zone%Block '{}'", token))
        })
    };

    match token.split_once('%') {
        Some((zone, block)) => Ok((parse(zone)?, parse(block)?)),
        None => Ok((parse(token)?, 1)),
    }
}
