// setter.rs — 系统壁纸设置模块
// 启动时按操作系统选定一种实现，之后通过 Trait 对象注入编排逻辑

use crate::error::BingError;
use rust_i18n::t;
use std::path::Path;
use std::process::Command;

/// 支持的平台
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Windows,
    Linux,
    MacOs,
    Unsupported,
}

impl Platform {
    /// 将 `std::env::consts::OS` 的取值映射为平台
    pub fn from_os(os: &str) -> Self {
        match os {
            "windows" => Self::Windows,
            "linux" => Self::Linux,
            "macos" => Self::MacOs,
            _ => Self::Unsupported,
        }
    }
}

/// 把本地图片设为桌面壁纸
pub trait WallpaperSetter {
    fn platform(&self) -> Platform;

    /// # 参数
    /// - `path`: 图片的绝对路径
    fn set(&self, path: &Path) -> Result<(), BingError>;
}

/// 为指定的操作系统名称选择实现
pub fn for_platform(os: &str) -> Box<dyn WallpaperSetter> {
    match Platform::from_os(os) {
        Platform::Windows => Box::new(WindowsSetter),
        Platform::Linux => Box::new(GnomeSetter),
        Platform::MacOs => Box::new(MacOsSetter),
        Platform::Unsupported => Box::new(UnsupportedSetter { os: os.to_string() }),
    }
}

pub fn for_current_platform() -> Box<dyn WallpaperSetter> {
    for_platform(std::env::consts::OS)
}

fn path_str(path: &Path) -> Result<&str, BingError> {
    path.to_str()
        .ok_or_else(|| BingError::Setter(t!("error_utf8").into_owned()))
}

/// 运行外部命令，非零退出码视为失败
fn run_command(cmd: &mut Command) -> Result<(), BingError> {
    // .output() 同步执行并捕获 stdout/stderr；程序不存在时在这里返回 io::Error
    let output = cmd
        .output()
        .map_err(|e| BingError::Setter(format!("{:?}: {e}", cmd.get_program())))?;

    // 退出码非 0 时，把 stderr 的内容带进错误信息
    if output.status.success() {
        Ok(())
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr);
        Err(BingError::Setter(format!(
            "{:?} exited with {}: {}",
            cmd.get_program(),
            output.status,
            stderr.trim()
        )))
    }
}

/// 调用 `wallpaper` 库设置壁纸
///
/// 失败信息由调用方统一输出，这里只返回错误
fn set_with_wallpaper_crate(path: &Path) -> Result<(), BingError> {
    println!("{}", t!("setting_wallpaper", path => path.display()));
    let path = path_str(path)?;

    // 这个库会按操作系统调用相应的 API
    wallpaper::set_from_path(path).map_err(|e| BingError::Setter(e.to_string()))?;
    println!("{}", t!("set_done"));
    Ok(())
}

/// Windows：`wallpaper` 库内部调用 SystemParametersInfoW
pub struct WindowsSetter;

impl WallpaperSetter for WindowsSetter {
    fn platform(&self) -> Platform {
        Platform::Windows
    }

    fn set(&self, path: &Path) -> Result<(), BingError> {
        set_with_wallpaper_crate(path)
    }
}

/// Linux：写入 GNOME 的桌面背景配置，不支持其他桌面环境
pub struct GnomeSetter;

/// `gsettings set` 的参数
fn gsettings_args(key: &str, path: &Path) -> [String; 4] {
    [
        "set".to_string(),
        "org.gnome.desktop.background".to_string(),
        key.to_string(),
        format!("file://{}", path.display()),
    ]
}

impl WallpaperSetter for GnomeSetter {
    fn platform(&self) -> Platform {
        Platform::Linux
    }

    fn set(&self, path: &Path) -> Result<(), BingError> {
        println!("{}", t!("setting_wallpaper", path => path.display()));
        run_command(Command::new("gsettings").args(gsettings_args("picture-uri", path)))?;

        // GNOME 42+ 的深色模式读取单独的键，旧版本没有这个键
        if let Err(e) =
            run_command(Command::new("gsettings").args(gsettings_args("picture-uri-dark", path)))
        {
            tracing::warn!(error = %e, "could not set picture-uri-dark");
        }

        println!("{}", t!("set_done"));
        Ok(())
    }
}

/// macOS：`wallpaper` 库通过 System Events 为每个桌面设置图片
pub struct MacOsSetter;

impl WallpaperSetter for MacOsSetter {
    fn platform(&self) -> Platform {
        Platform::MacOs
    }

    fn set(&self, path: &Path) -> Result<(), BingError> {
        set_with_wallpaper_crate(path)
    }
}

fn unsupported_message(os: &str) -> String {
    t!("os_not_supported", os => os).into_owned()
}

/// 未支持的平台：只提示，不报错
pub struct UnsupportedSetter {
    os: String,
}

impl WallpaperSetter for UnsupportedSetter {
    fn platform(&self) -> Platform {
        Platform::Unsupported
    }

    fn set(&self, path: &Path) -> Result<(), BingError> {
        println!("{}", unsupported_message(&self.os));
        tracing::warn!(os = %self.os, path = %path.display(), "wallpaper not set on unsupported platform");
        Ok(())
    }
}
