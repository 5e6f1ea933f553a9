// config.rs — 配置管理模块
// 遵循 Unix 风格：从 ~/.config/bingwall/config.toml 读取配置（只读，不回写）

use crate::error::BingError;
use crate::source::bing::{DEFAULT_ENDPOINT, DEFAULT_IMAGE_HOST};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// 覆盖保存目录的环境变量
pub const SAVE_DIR_ENV: &str = "BINGWALL_SAVE_DIR";

/// 展开路径中的 ~ 和环境变量 ($HOME, ${XDG_PICTURES_DIR} 等)
/// 支持格式: ~/path, $HOME/path, ${HOME}/path
///
/// `home` 同时作为 `~` 和 `$HOME` 的取值，其余变量从进程环境读取；
/// 展开失败（如变量值不是 UTF-8）时保留原文并给出警告
fn expand_path(path_str: &str, home: Option<&Path>) -> PathBuf {
    // shellexpand 的 home 回调要求返回 AsRef<str>，先转成 String
    let home_str = home.map(|h| h.to_string_lossy().into_owned());

    let lookup = |name: &str| -> Result<Option<String>, env::VarError> {
        if name == "HOME" {
            if let Some(h) = &home_str {
                return Ok(Some(h.clone()));
            }
        }
        // 未定义的变量返回 None，非 UTF-8 等错误原样返回
        match env::var(name) {
            Ok(value) => Ok(Some(value)),
            Err(env::VarError::NotPresent) => Ok(None),
            Err(e) => Err(e),
        }
    };

    match shellexpand::full_with_context(path_str, || home_str.as_deref(), lookup) {
        Ok(expanded) => PathBuf::from(expanded.into_owned()),
        Err(e) => {
            tracing::warn!(path = path_str, error = %e, "could not expand save_dir, using it verbatim");
            PathBuf::from(path_str)
        }
    }
}

/// 映射 config.toml 文件内容的嵌套结构体
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFile {
    #[serde(default)]
    common: CommonConfig,
    #[serde(default)]
    archive: ArchiveConfig,
}

#[derive(Debug, Deserialize, Default)]
struct CommonConfig {
    /// 图片保存目录 (支持 ~、$HOME 等环境变量，相对路径则相对于 $HOME)
    save_dir: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ArchiveConfig {
    #[serde(default = "default_endpoint")]
    endpoint: String,
    #[serde(default = "default_image_host")]
    image_host: String,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            image_host: default_image_host(),
        }
    }
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}
fn default_image_host() -> String {
    DEFAULT_IMAGE_HOST.to_string()
}

/// 启动时计算一次、之后以参数形式传递的配置
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// 图片缓存目录
    pub save_dir: PathBuf,
    /// 元数据接口地址
    pub endpoint: String,
    /// 图片主机名
    pub image_host: String,
    /// 读取的配置文件路径（可能不存在）
    pub config_path: Option<PathBuf>,
}

impl AppConfig {
    /// 初始化配置
    ///
    /// 优先级：环境变量 > 配置文件 > 程序所在目录下的 images/
    pub fn load(config_path: Option<PathBuf>) -> Result<Self, BingError> {
        let home = env::var_os("HOME").map(PathBuf::from);
        let config_path = config_path.or_else(|| {
            home.as_ref()
                .map(|h| h.join(".config").join("bingwall").join("config.toml"))
        });

        let config_file = config_path
            .as_deref()
            .and_then(Self::load_config_from_file)
            .unwrap_or_default();

        let exe = env::current_exe().map_err(|e| BingError::Config(e.to_string()))?;
        let exe_dir = exe
            .parent()
            .ok_or_else(|| BingError::Config(format!("no parent directory for {}", exe.display())))?;

        let mut config = Self::resolve(
            config_file,
            exe_dir,
            home.as_deref(),
            env::var(SAVE_DIR_ENV).ok(),
        );
        config.config_path = config_path;
        Ok(config)
    }

    /// 合并各来源的配置项
    pub fn resolve(
        config_file: ConfigFile,
        exe_dir: &Path,
        home: Option<&Path>,
        env_save_dir: Option<String>,
    ) -> Self {
        // 保存目录：
        // 1. 配置了路径：展开 ~ 和环境变量
        // 2. 相对路径则相对于 $HOME（没有 $HOME 时相对于程序目录）
        // 3. 未配置：程序所在目录下的 images/
        let save_dir = match env_save_dir
            .filter(|s| !s.is_empty())
            .or(config_file.common.save_dir)
        {
            Some(dir_str) => {
                let p = expand_path(&dir_str, home); // 展开 ~ 和 $HOME 等变量
                if p.is_absolute() {
                    p
                } else {
                    home.unwrap_or(exe_dir).join(p)
                }
            }
            None => exe_dir.join("images"),
        };

        Self {
            save_dir,
            endpoint: config_file.archive.endpoint,
            image_host: config_file.archive.image_host,
            config_path: None,
        }
    }

    /// 辅助函数：解析 TOML 配置文件，文件不存在时静默使用默认值
    fn load_config_from_file(path: &Path) -> Option<ConfigFile> {
        let content = fs::read_to_string(path).ok()?;
        match toml::from_str(&content) {
            Ok(file) => Some(file),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "ignoring unparsable config file");
                None
            }
        }
    }
}
