// source/mod.rs — 每日图片源模块入口
pub mod bing;

// 定义图片源必须实现的通用 Trait，编排逻辑只依赖这个接口

use crate::error::BingError;
use async_trait::async_trait;
use std::path::Path;

/// 元数据文档中的一张图片
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageEntry {
    /// 图片的起始日期（8 位数字，如 "20240115"），同时作为缓存键
    pub start_date: String,
    /// 已补全主机名的绝对下载地址
    pub url: String,
    /// 版权说明，仅用于进度输出
    pub copyright: Option<String>,
}

/// 每日图片源的抽象 Trait
#[async_trait]
pub trait ImageArchive {
    /// 获取从 `index` 天前开始、连续 `days` 天的图片元数据
    async fn fetch_metadata(&self, index: u32, days: u32) -> Result<Vec<ImageEntry>, BingError>;

    /// 把 `url` 对应的图片下载到 `dest`
    async fn download(&self, url: &str, dest: &Path) -> Result<(), BingError>;
}
