//! # Jana M42 帧参数解析器
//!
//! 动力学精修的 M42 为每一帧写出一个 `# Zone N` 记录：
//!
//! ```text
//! # Zone   1
//!  -0.8914   0.4012  -0.2107   12.0000   0.0000   1.0000              T
//!    1.0214  842.113
//!    0.0000   0.0000
//! ```
//!
//! 第二行第 60 列为使用标记 (`T`/`F`)，第三行为 scale `[0,9)` 与厚度 `[9,18)`。
//! 帧编号回落时进入下一个数据块。
//!
//! ## 依赖关系
//! - 被 `commands/merge.rs` 使用

use crate::error::{JanaError, Result};
use crate::parsers::read_source;

use std::collections::BTreeMap;
use std::path::Path;

/// 使用标记所在列
const USE_FLAG_COLUMN: usize = 60;

/// 单帧参数
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub block: u32,
    pub zone: u32,
    /// 是否参与精修
    pub used: bool,
    pub scale: f64,
    /// 厚度 (Å)
    pub thickness: f64,
}

/// M42 中所有帧
#[derive(Debug, Clone, Default)]
pub struct FrameParameters {
    pub frames: Vec<Frame>,
}

impl FrameParameters {
    /// 各数据块中参与精修帧的平均厚度
    pub fn block_thickness(&self) -> BTreeMap<u32, f64> {
        let mut sums: BTreeMap<u32, (f64, usize)> = BTreeMap::new();
        for frame in self.frames.iter().filter(|f| f.used) {
            let entry = sums.entry(frame.block).or_insert((0.0, 0));
            entry.0 += frame.thickness;
            entry.1 += 1;
        }
        sums.into_iter()
            .map(|(block, (sum, n))| (block, sum / n as f64))
            .collect()
    }

    pub fn block_count(&self) -> usize {
        self.frames
            .iter()
            .map(|f| f.block)
            .max()
            .map(|b| b as usize)
            .unwrap_or(0)
    }

    pub fn used_count(&self) -> usize {
        self.frames.iter().filter(|f| f.used).count()
    }
}

/// 解析 M42 文件
pub fn parse_m42_file(path: &Path) -> Result<FrameParameters> {
    let content = read_source(path)?;
    parse_m42_content(&content, &path.display().to_string())
}

/// 从字符串内容解析 M42
pub fn parse_m42_content(content: &str, source: &str) -> Result<FrameParameters> {
    let lines: Vec<&str> = content.lines().map(|l| l.trim_end_matches('\r')).collect();
    let mut frames = Vec::new();
    let mut block = 1u32;
    let mut previous = 0u32;

    for (i, line) in lines.iter().enumerate() {
        if line.starts_with("---------------") {
            break;
        }
        let Some(rest) = line.strip_prefix("# Zone") else {
            continue;
        };

        let zone: u32 = rest
            .split_whitespace()
            .next()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| JanaError::malformed(source, i + 1, "missing zone number"))?;

        let orientation = lines
            .get(i + 1)
            .ok_or_else(|| JanaError::malformed(source, i + 2, "truncated zone record"))?;
        let used = orientation.as_bytes().get(USE_FLAG_COLUMN) == Some(&b'T');

        let parameters = lines
            .get(i + 2)
            .ok_or_else(|| JanaError::malformed(source, i + 3, "truncated zone record"))?;
        let scale = fixed_field(parameters, 0..9, "scale", source, i + 3)?;
        let thickness = fixed_field(parameters, 9..18, "thickness", source, i + 3)?;

        if zone < previous {
            block += 1;
        }
        previous = zone;

        frames.push(Frame {
            block,
            zone,
            used,
            scale,
            thickness,
        });
    }

    Ok(FrameParameters { frames })
}

fn fixed_field(
    line: &str,
    range: std::ops::Range<usize>,
    name: &str,
    source: &str,
    line_no: usize,
) -> Result<f64> {
    line.get(range)
        .map(str::trim)
        .and_then(|s| s.parse::<f64>().ok())
        .ok_or_else(|| JanaError::malformed(source, line_no, format!("invalid {} field", name)))
}
