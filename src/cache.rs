// cache.rs — 本地图片缓存
// 以日期为键，每个日期对应保存目录下唯一的 <date>.jpg 文件

use crate::error::BingError;
use crate::source::ImageEntry;
use std::fs;
use std::path::{Path, PathBuf};

/// 一张以日期命名的缓存图片
///
/// 文件存在即视为已下载完成，不做大小或哈希校验。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedImage {
    /// 8 位日期字符串，如 "20240115"
    pub date: String,
    /// 本地保存路径
    pub path: PathBuf,
    /// 元数据中解析出的下载地址
    pub url: String,
}

impl CachedImage {
    /// 在请求时检查文件是否已存在
    pub fn exists(&self) -> bool {
        ImageCache::exists(&self.path)
    }
}

/// 缓存目录
#[derive(Debug, Clone)]
pub struct ImageCache {
    dir: PathBuf,
}

impl ImageCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// 确保缓存目录存在，目录已存在时不报错
    pub fn ensure_dir(&self) -> Result<(), BingError> {
        fs::create_dir_all(&self.dir).map_err(|e| BingError::fs(&self.dir, e))
    }

    /// 日期 -> `<dir>/<date>.jpg`
    pub fn local_path(&self, date: &str) -> PathBuf {
        self.dir.join(format!("{date}.jpg"))
    }

    pub fn exists(path: &Path) -> bool {
        // 同名目录不算缓存命中
        path.is_file()
    }

    /// 把一条元数据映射为缓存条目
    pub fn resolve(&self, entry: &ImageEntry) -> CachedImage {
        CachedImage {
            date: entry.start_date.clone(),
            path: self.local_path(&entry.start_date),
            url: entry.url.clone(),
        }
    }
}
