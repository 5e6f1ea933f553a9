// error.rs — 错误类型定义
// 所有模块共用同一个错误枚举，调用方据此区分“没有可做的事”与“出错了”

use std::path::{Path, PathBuf};

/// 程序运行期间可能出现的错误
#[derive(Debug, thiserror::Error)]
pub enum BingError {
    /// 访问元数据接口或图片地址时的网络错误（含非 2xx 状态码）
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// XML 格式错误或缺少必需的元素
    #[error("XML parse error: {0}")]
    Parse(String),

    /// 创建目录或写入文件失败
    #[error("filesystem error at {}: {source}", .path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// 系统壁纸设置命令执行失败
    #[error("failed to set wallpaper: {0}")]
    Setter(String),

    /// 配置项无法使用（如无法定位程序所在目录）
    #[error("configuration error: {0}")]
    Config(String),
}

impl BingError {
    /// 把 io::Error 包装成带路径信息的 Filesystem 错误
    pub fn fs(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Filesystem {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_display() {
        let err = BingError::Parse("missing <url>".to_string());
        let msg = err.to_string();
        assert!(msg.contains("XML"));
        assert!(msg.contains("missing <url>"));
    }

    #[test]
    fn test_filesystem_error_includes_path() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = BingError::fs("/tmp/images/20240115.jpg", io_err);
        let msg = err.to_string();
        assert!(msg.contains("20240115.jpg"));
        assert!(msg.contains("denied"));
        assert!(matches!(err, BingError::Filesystem { .. }));
    }

    #[test]
    fn test_setter_error_display() {
        let err = BingError::Setter("gsettings exited with 1".to_string());
        assert!(err.to_string().contains("gsettings exited with 1"));
    }
}
