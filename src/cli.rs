// cli.rs — 命令行接口定义模块
// 使用 clap 的 derive 模式定义参数，不设子命令

use clap::Parser;
use clap_complete::Shell; // Shell 枚举：Bash, Zsh, Fish, Elvish, PowerShell
use std::path::PathBuf;

/// 下载 Bing 每日图片，可选设为桌面壁纸
///
/// 用法示例:
///   bingwall
///   bingwall --index 1 --numberOfDays 3
///   bingwall --setWallpaper
#[derive(Parser, Debug)]
#[command(name = "bingwall")]
#[command(version)]
#[command(about = "Download the Bing image of the day and optionally set it as wallpaper")]
pub struct Cli {
    /// 从今天往回数的天数（0 = 今天）
    #[arg(short, long, default_value_t = 0, value_name = "DAYS")]
    pub index: u32,

    /// 要下载的天数
    #[arg(
        short = 'n',
        long = "numberOfDays",
        default_value_t = 1,
        value_name = "N",
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    pub number_of_days: u32,

    /// 下载后设置为桌面壁纸
    #[arg(short, long = "setWallpaper", overrides_with = "no_set_wallpaper")]
    set_wallpaper: bool,

    /// 兼容旧脚本的 --no-setWallpaper，与 --setWallpaper 以最后出现的为准
    #[arg(long = "no-setWallpaper", hide = true, overrides_with = "set_wallpaper")]
    no_set_wallpaper: bool,

    /// 配置文件路径（默认 ~/.config/bingwall/config.toml）
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// 输出调试日志
    #[arg(short, long)]
    pub verbose: bool,

    /// 打印 shell 补全脚本后退出
    ///
    ///   bingwall --completions zsh > ~/.zsh/completions/_bingwall
    #[arg(long, value_name = "SHELL")]
    pub completions: Option<Shell>,
}

impl Cli {
    /// 是否需要设置壁纸
    pub fn set_wallpaper(&self) -> bool {
        self.set_wallpaper && !self.no_set_wallpaper
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_command_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["bingwall"]).unwrap();
        assert_eq!(cli.index, 0);
        assert_eq!(cli.number_of_days, 1);
        assert!(!cli.set_wallpaper());
        assert!(cli.completions.is_none());
    }

    #[test]
    fn test_long_flags() {
        let cli = Cli::try_parse_from([
            "bingwall",
            "--index",
            "2",
            "--numberOfDays",
            "3",
            "--setWallpaper",
        ])
        .unwrap();
        assert_eq!(cli.index, 2);
        assert_eq!(cli.number_of_days, 3);
        assert!(cli.set_wallpaper());
    }

    #[test]
    fn test_short_flags() {
        let cli = Cli::try_parse_from(["bingwall", "-i", "1", "-n", "5", "-s", "-v"]).unwrap();
        assert_eq!(cli.index, 1);
        assert_eq!(cli.number_of_days, 5);
        assert!(cli.set_wallpaper());
        assert!(cli.verbose);
    }

    #[test]
    fn test_no_set_wallpaper_last_flag_wins() {
        let cli = Cli::try_parse_from(["bingwall", "--setWallpaper", "--no-setWallpaper"]).unwrap();
        assert!(!cli.set_wallpaper());

        let cli = Cli::try_parse_from(["bingwall", "--no-setWallpaper", "--setWallpaper"]).unwrap();
        assert!(cli.set_wallpaper());

        let cli = Cli::try_parse_from(["bingwall", "--no-setWallpaper"]).unwrap();
        assert!(!cli.set_wallpaper());
    }

    #[test]
    fn test_rejects_invalid_values() {
        assert!(Cli::try_parse_from(["bingwall", "--numberOfDays", "0"]).is_err());
        assert!(Cli::try_parse_from(["bingwall", "--index", "-1"]).is_err());
    }

    #[test]
    fn test_completions_shell() {
        let cli = Cli::try_parse_from(["bingwall", "--completions", "zsh"]).unwrap();
        assert_eq!(cli.completions, Some(Shell::Zsh));
    }
}
