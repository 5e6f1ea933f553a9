// main.rs — 程序入口
// 负责初始化日志与运行时、解析命令行参数、组装各组件并执行一次下载流程

mod cache;
mod cli;
mod config;
mod error;
mod runner;
mod setter;
mod source;

// 初始化多语言支持，嵌入 locales 目录下的所有翻译
rust_i18n::i18n!("locales", fallback = "en");

use cache::ImageCache;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::Cli;
use config::AppConfig;
use runner::{Outcome, RunRequest};
use rust_i18n::t;
use source::bing::BingClient;
use tracing_subscriber::EnvFilter;

/// 所有请求按顺序 await，单线程运行时即可
#[tokio::main(flavor = "current_thread")]
async fn main() {
    if let Err(err) = run_cli().await {
        eprintln!("bingwall: {err}");
        std::process::exit(1);
    }
}

async fn run_cli() -> Result<(), Box<dyn std::error::Error>> {
    // 自动检测系统语言并设置
    let locale = std::env::var("LANG").unwrap_or_else(|_| "en".to_string());
    if locale.starts_with("zh") {
        rust_i18n::set_locale("zh-CN");
    } else {
        rust_i18n::set_locale("en");
    }

    let cli = Cli::parse();

    if let Some(shell) = cli.completions {
        generate(shell, &mut Cli::command(), "bingwall", &mut std::io::stdout());
        return Ok(());
    }

    init_tracing(cli.verbose);

    let config = AppConfig::load(cli.config.clone())?;
    tracing::debug!(
        config_path = ?config.config_path,
        save_dir = %config.save_dir.display(),
        endpoint = %config.endpoint,
        "configuration loaded"
    );

    // 确保缓存目录存在
    let cache = ImageCache::new(&config.save_dir);
    cache.ensure_dir()?;

    let archive = BingClient::new(config.endpoint.clone(), config.image_host.clone());
    let wallpaper_setter = setter::for_current_platform();
    tracing::debug!(platform = ?wallpaper_setter.platform(), "wallpaper setter selected");

    let request = RunRequest {
        index: cli.index,
        days: cli.number_of_days,
        set_wallpaper: cli.set_wallpaper(),
    };

    let report = runner::run(&cache, &archive, wallpaper_setter.as_ref(), &request).await;

    println!(
        "{}",
        t!(
            "run_summary",
            downloaded => report.count(&Outcome::Downloaded),
            cached => report.count(&Outcome::AlreadyCached),
            dir => cache.dir().display()
        )
    );

    for day in &report.days {
        if let Outcome::Failed(reason) = &day.outcome {
            tracing::debug!(date = %day.date, %reason, "day not downloaded");
        }
    }

    if report.has_failures() {
        return Err(t!("error_run_incomplete", index => request.index).into());
    }
    Ok(())
}

/// 日志输出到 stderr，`RUST_LOG` 优先于 `--verbose`
fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "bingwall=debug" } else { "bingwall=warn" };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();
}
