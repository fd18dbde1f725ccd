//! # Jana `.ref` 精修日志解析器
//!
//! 从精修日志末尾的 "Last screen information window" 读取精修程序自己报告的
//! 参数个数、Nobs/Nall、GOF 与 R 因子；多块精修额外读取
//! "R-factors overview" 中各数据块的行。
//!
//! ## 信息窗口片段
//! ```text
//! Last screen information window
//! -----------------------------------------------------------------
//! |Overall R factors : [6299=2361+3938/184]                       |
//! |GOF(obs)= 2.53 GOF(all)= 1.81                                  |
//! |R(obs)= 9.65 wR(obs)= 10.21 R(all)= 11.79 wR(all)= 10.58       |
//! -----------------------------------------------------------------
//! ```
//!
//! 日志中的 R 值为百分数，解析后按分数存储，与 `RFactors` 一致。
//!
//! ## 依赖关系
//! - 被 `commands/extract.rs` 和 `commands/merge.rs` 使用
//! - 使用 `models/summary.rs`

use crate::error::{JanaError, Result};
use crate::models::{GoodnessOfFit, RFactors};
use crate::parsers::read_source;

use std::path::Path;

/// 信息窗口起始行
const WINDOW_MARKER: &str = "Last screen information window";

/// 多块概览起始行
const OVERVIEW_MARKER: &str = "* R-factors overview *";

/// 多块概览中的一个数据块行
#[derive(Debug, Clone, PartialEq)]
pub struct RefBlockRow {
    /// 数据块标签（如 `Block1`）
    pub label: String,
    /// 精修循环编号
    pub cycle: u32,
    pub parameters: usize,
    pub factors: RFactors,
}

/// 一个 `.ref` 日志的解析结果
#[derive(Debug, Clone, PartialEq)]
pub struct RefinementLog {
    /// 来源文件
    pub source: String,
    /// 精修名称（文件主名）
    pub name: String,
    /// 精修参数个数
    pub parameters: Option<usize>,
    pub gof: GoodnessOfFit,
    /// 精修程序报告的总体 R 因子；信息窗口缺失时为 None
    pub factors: Option<RFactors>,
    pub multiblock: bool,
    pub blocks: Vec<RefBlockRow>,
}

impl RefinementLog {
    /// 日志是否包含完整的信息窗口
    pub fn is_complete(&self) -> bool {
        self.factors.is_some()
    }
}

/// 解析 `.ref` 文件
pub fn parse_ref_file(path: &Path) -> Result<RefinementLog> {
    let content = read_source(path)?;
    let name = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("unknown")
        .to_string();
    parse_ref_content(&content, &path.display().to_string(), &name)
}

/// 从字符串内容解析 `.ref` 日志
pub fn parse_ref_content(content: &str, source: &str, name: &str) -> Result<RefinementLog> {
    let lines: Vec<&str> = content.lines().map(|l| l.trim_end_matches('\r')).collect();

    let mut log = RefinementLog {
        source: source.to_string(),
        name: name.to_string(),
        parameters: None,
        gof: GoodnessOfFit::default(),
        factors: None,
        multiblock: false,
        blocks: Vec::new(),
    };

    let mut i = 0;
    while i < lines.len() {
        let line = lines[i];
        if line.starts_with(WINDOW_MARKER) {
            i = parse_window(&lines, i, source, &mut log)?;
        } else if line.starts_with(OVERVIEW_MARKER) {
            i = parse_overview(&lines, i + 2, &mut log);
        } else {
            i += 1;
        }
    }

    Ok(log)
}

/// 读取信息窗口，返回窗口之后的行号（0 起）
fn parse_window(lines: &[&str], start: usize, source: &str, log: &mut RefinementLog) -> Result<usize> {
    let mut dashes = 0;
    let mut counts: Option<(usize, usize, usize)> = None;
    let mut gof = GoodnessOfFit::default();
    let mut values: Vec<(String, f64)> = Vec::new();

    let mut j = start;
    while j < lines.len() && dashes < 2 {
        let line = lines[j];
        let line_no = j + 1;
        if line.trim_start().starts_with("--") {
            dashes += 1;
        } else if line.starts_with("|R factors") || line.starts_with("|Overall R factors") {
            if line.starts_with("|Overall") {
                log.multiblock = true;
            }
            counts = Some(parse_counts(line).ok_or_else(|| {
                JanaError::malformed(source, line_no, "expected [Nall=Nobs+N/Nparameters]")
            })?);
        } else if line.starts_with("|GOF(obs)=") {
            for (label, value) in labelled_values(line, source, line_no)? {
                match label.as_str() {
                    "GOF(obs)" => gof.obs = Some(value),
                    "GOF(all)" => gof.all = Some(value),
                    _ => {}
                }
            }
        } else if line.starts_with("|R(obs)=") {
            values = labelled_values(line, source, line_no)?;
        } else if line.starts_with("***") {
            break;
        }
        j += 1;
    }

    let lookup = |label: &str| {
        values
            .iter()
            .find(|(l, _)| l == label)
            .map(|(_, v)| v / 100.0)
    };

    if let Some((nall, nobs, parameters)) = counts {
        log.parameters = Some(parameters);
        log.gof = gof;
        log.factors = Some(RFactors {
            nobs,
            nall,
            robs: lookup("R(obs)"),
            wrobs: lookup("wR(obs)"),
            rall: lookup("R(all)"),
            wrall: lookup("wR(all)"),
            wr2obs: None,
            wr2all: None,
        });
    }

    Ok(j.max(start + 1))
}

/// `[Nall=Nobs+N/Nparameters]` -> (Nall, Nobs, Nparameters)
fn parse_counts(line: &str) -> Option<(usize, usize, usize)> {
    let start = line.find('[')? + 1;
    let end = line[start..].find(']')? + start;
    let data = &line[start..end];

    let (nall, rest) = data.split_once('=')?;
    let (nobs, rest) = rest.split_once('+')?;
    let (_, parameters) = rest.split_once('/')?;

    Some((
        nall.trim().parse().ok()?,
        nobs.trim().parse().ok()?,
        parameters.trim().parse().ok()?,
    ))
}

/// 读取 `label= value` 形式的数值对
fn labelled_values(line: &str, source: &str, line_no: usize) -> Result<Vec<(String, f64)>> {
    let mut result = Vec::new();
    let mut pending: Option<String> = None;

    for token in line.split_whitespace() {
        let token = token.trim_matches('|');
        if token.is_empty() {
            continue;
        }
        if let Some(label) = pending.take() {
            let value = token.parse::<f64>().map_err(|_| {
                JanaError::malformed(source, line_no, format!("non-numeric value for {}", label))
            })?;
            result.push((label, value));
        } else if let Some((label, value)) = token.split_once('=') {
            if value.is_empty() {
                pending = Some(label.to_string());
            } else {
                let value = value.parse::<f64>().map_err(|_| {
                    JanaError::malformed(source, line_no, format!("non-numeric value for {}", label))
                })?;
                result.push((label.to_string(), value));
            }
        }
    }

    Ok(result)
}

/// 读取多块概览，返回概览结束后的行号（0 起）
fn parse_overview(lines: &[&str], start: usize, log: &mut RefinementLog) -> usize {
    let mut label = String::new();
    let mut j = start;

    while j < lines.len() {
        let line = lines[j];
        j += 1;

        if line.starts_with("***") {
            break;
        }
        if line.starts_with("Block") {
            label = line.split("->").next().unwrap_or("").trim().to_string();
            continue;
        }
        if let Some(rest) = line.strip_prefix('#') {
            if let Some((number, _)) = rest.split_once(':') {
                label = format!("Block{}", number.trim());
                continue;
            }
        }

        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.len() == 9 {
            if let Some(row) = overview_row(&label, &tokens) {
                log.blocks.push(row);
            }
        }
    }

    j
}

/// `cycle Robs wRobs Rall wRall Nobs Nall Nparameters ratio`
fn overview_row(label: &str, tokens: &[&str]) -> Option<RefBlockRow> {
    let percent = |s: &str| s.parse::<f64>().ok().map(|v| v / 100.0);
    Some(RefBlockRow {
        label: label.to_string(),
        cycle: tokens[0].parse().ok()?,
        parameters: tokens[7].parse().ok()?,
        factors: RFactors {
            nobs: tokens[5].parse().ok()?,
            nall: tokens[6].parse().ok()?,
            robs: Some(percent(tokens[1])?),
            wrobs: Some(percent(tokens[2])?),
            rall: Some(percent(tokens[3])?),
            wrall: Some(percent(tokens[4])?),
            wr2obs: None,
            wr2all: None,
        },
    })
}
