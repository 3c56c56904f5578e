//! 路径工具
//!
//! 配置文件和 TLS 证书路径支持 `~` 开头的写法。

use std::path::{Path, PathBuf};

/// 展开路径中的 tilde (~) 为用户主目录
///
/// - `~` 和 `~/path` 会被展开
/// - `~user/path` 不支持，原样返回
/// - 无法获取主目录时原样返回
pub fn expand_tilde<P: AsRef<Path>>(path: P) -> PathBuf {
    let path = path.as_ref();
    let path_str = path.to_string_lossy();

    if !path_str.starts_with('~') {
        return path.to_path_buf();
    }

    let home_dir = match dirs::home_dir() {
        Some(dir) => dir,
        None => return path.to_path_buf(),
    };

    if path_str == "~" {
        home_dir
    } else if let Some(rest) = path_str.strip_prefix("~/") {
        home_dir.join(rest)
    } else {
        path.to_path_buf()
    }
}
