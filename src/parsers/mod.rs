//! # 解析器模块
//!
//! 提供 Jana 精修文件的解析器：M50（设置与对称性）、M83（衍射点列表）、
//! M42（帧参数）以及 `.ref` 精修日志。
//!
//! ## 依赖关系
//! - 被 `commands/` 模块使用
//! - 使用 `models/` 数据模型
//! - 子模块: layout, m42, m50, m83, ref_file

pub mod layout;
pub mod m42;
pub mod m50;
pub mod m83;
pub mod ref_file;

use crate::error::{JanaError, Result};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// 读取整个文本文件，文件不存在时返回 `FileNotFound`
pub fn read_source(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => JanaError::FileNotFound {
            path: path.display().to_string(),
        },
        _ => JanaError::FileReadError {
            path: path.display().to_string(),
            source: e,
        },
    })
}

/// 同一精修的配套文件：在精修名称后追加扩展名
///
/// 名称本身可以含点（`lta.v2` -> `lta.v2.m83`），因此不用 `with_extension`。
pub fn companion(stem: &Path, extension: &str) -> PathBuf {
    let mut name = stem.as_os_str().to_owned();
    name.push(".");
    name.push(extension);
    PathBuf::from(name)
}

/// 精修名称：去掉 Jana 扩展名后的路径
///
/// `run/lta.m83`、`run/lta.m50` 与 `run/lta` 都得到 `run/lta`。
pub fn refinement_stem(path: &Path) -> PathBuf {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|s| s.to_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "m50" | "m83" | "m42" | "m40" | "ref" => path.with_extension(""),
        _ => path.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_refinement_stem() {
        assert_eq!(refinement_stem(Path::new("run/lta.m83")), PathBuf::from("run/lta"));
        assert_eq!(refinement_stem(Path::new("run/lta.M50")), PathBuf::from("run/lta"));
        assert_eq!(refinement_stem(Path::new("run/lta")), PathBuf::from("run/lta"));
    }

    #[test]
    fn test_companion_path() {
        let stem = refinement_stem(Path::new("dyn/lta_dyn.m50"));
        assert_eq!(companion(&stem, "m83"), PathBuf::from("dyn/lta_dyn.m83"));
        assert_eq!(companion(Path::new("lta.v2"), "m50"), PathBuf::from("lta.v2.m50"));
    }

    #[test]
    fn test_read_missing_file() {
        let result = read_source(Path::new("/nonexistent/lta.m50"));
        assert!(matches!(result, Err(JanaError::FileNotFound { .. })));
    }
}
