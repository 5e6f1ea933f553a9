// runner.rs — 主流程编排
// 拉取元数据 -> 查缓存 -> 下载 -> 可选地设置壁纸，全程顺序执行

use crate::cache::{CachedImage, ImageCache};
use crate::error::BingError;
use crate::setter::WallpaperSetter;
use crate::source::ImageArchive;
use rust_i18n::t;

/// 一次运行的参数
#[derive(Debug, Clone, Copy)]
pub struct RunRequest {
    /// 从今天往回数的天数，0 表示今天
    pub index: u32,
    /// 连续请求的天数
    pub days: u32,
    pub set_wallpaper: bool,
}

/// 单个日期的处理结果
#[derive(Debug, PartialEq, Eq)]
pub enum Outcome {
    AlreadyCached,
    Downloaded,
    Failed(String),
}

#[derive(Debug)]
pub struct DayReport {
    pub date: String,
    pub outcome: Outcome,
}

/// 整次运行的汇总
#[derive(Debug, Default)]
pub struct RunReport {
    /// 元数据获取失败的原因；失败时不会处理任何日期
    pub fetch_error: Option<BingError>,
    pub days: Vec<DayReport>,
}

impl RunReport {
    pub fn has_failures(&self) -> bool {
        self.fetch_error.is_some()
            || self
                .days
                .iter()
                .any(|day| matches!(day.outcome, Outcome::Failed(_)))
    }

    pub fn count(&self, outcome: &Outcome) -> usize {
        self.days.iter().filter(|day| &day.outcome == outcome).count()
    }
}

/// 按元数据返回的顺序逐个处理日期
///
/// 元数据获取失败只记录到报告里；单个日期下载失败会跳过该日期继续处理后面的日期。
pub async fn run(
    cache: &ImageCache,
    archive: &dyn ImageArchive,
    setter: &dyn WallpaperSetter,
    request: &RunRequest,
) -> RunReport {
    let mut report = RunReport::default();

    // 元数据失败时整次运行没有可处理的日期，直接返回
    let entries = match archive.fetch_metadata(request.index, request.days).await {
        Ok(entries) => entries,
        Err(err) => {
            match err {
                BingError::Parse(_) => {
                    eprintln!("{}", t!("error_xml", index => request.index, error => err));
                }
                _ => eprintln!("{}", t!("error_fetch", index => request.index, error => err)),
            }
            tracing::warn!(index = request.index, error = %err, "metadata fetch failed");
            report.fetch_error = Some(err);
            return report;
        }
    };

    // 空列表不算失败
    if entries.is_empty() {
        println!("{}", t!("no_images", index => request.index));
    }

    for entry in &entries {
        let image = cache.resolve(entry);
        if let Some(copyright) = &entry.copyright {
            tracing::debug!(date = %image.date, copyright = %copyright, "image metadata");
        }

        let outcome = process_day(&image, archive, setter, request).await;
        report.days.push(DayReport {
            date: image.date,
            outcome,
        });
    }

    report
}

async fn process_day(
    image: &CachedImage,
    archive: &dyn ImageArchive,
    setter: &dyn WallpaperSetter,
    request: &RunRequest,
) -> Outcome {
    // 只看文件是否存在；下载中途失败不会留下 <date>.jpg
    let outcome = if image.exists() {
        println!("{}", t!("already_downloaded", date => image.date));
        Outcome::AlreadyCached
    } else {
        println!(
            "{}",
            t!("downloading", date => image.date, index => request.index)
        );
        match archive.download(&image.url, &image.path).await {
            Ok(()) => {
                println!("{}", t!("save_path", path => image.path.display()));
                Outcome::Downloaded
            }
            Err(err) => {
                eprintln!("{}", t!("error_download", date => image.date, error => err));
                tracing::warn!(date = %image.date, error = %err, "download failed");
                return Outcome::Failed(err.to_string());
            }
        }
    };

    // 设置壁纸失败只提示一次，不影响本日期的结果和退出码
    if request.set_wallpaper {
        if let Err(err) = setter.set(&image.path) {
            eprintln!("{}", t!("set_failed"));
            tracing::warn!(date = %image.date, error = %err, "wallpaper not set");
        }
    }

    outcome
}
