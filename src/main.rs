// main.rs — 程序入口
// 负责初始化日志与运行时、解析命令行参数、分发子命令

mod caption;
mod cli;
mod config;
mod error;
mod fetch;
mod imaging;
mod logging;
mod setter;
mod source;
mod state;
#[cfg(test)]
mod testing;
mod updater;

// 初始化多语言支持，嵌入 locales 目录下的所有翻译
rust_i18n::i18n!("locales");

use caption::{Caption, CaptionRules};
use clap::{CommandFactory, Parser}; // CommandFactory 用于生成补全脚本
use clap_complete::generate;
use cli::{Cli, Commands, ConfigAction};
use config::AppConfig;
use fetch::HttpFetcher;
use rust_i18n::t; // 引入翻译宏
use setter::SystemWallpaper;
use state::FileStateStore;
use updater::{RunOutcome, Updater, UpdaterSettings};

type AppUpdater = Updater<HttpFetcher, FileStateStore, SystemWallpaper>;

/// 单线程运行时：每次运行都是一条顺序执行的流水线
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 自动检测系统语言并设置
    let locale = std::env::var("LANG").unwrap_or_else(|_| "en".to_string());
    if locale.starts_with("zh") {
        rust_i18n::set_locale("zh-CN");
    } else {
        rust_i18n::set_locale("en");
    }

    let cli = Cli::parse();
    logging::init(cli.verbose);

    // 不带子命令时进入定时循环
    match cli.command.unwrap_or(Commands::Watch) {
        Commands::Watch => {
            let config = AppConfig::load()?;
            let updater = build_updater(&config)?;
            println!("{}", t!("watch_start", minutes => config.schedule.interval_minutes));
            updater::watch(
                &updater,
                || config.directory_url(chrono::Utc::now()),
                config.interval(),
            )
            .await;
        }
        Commands::Once => {
            let config = AppConfig::load()?;
            handle_once(&config).await?;
        }
        Commands::Caption { name } => {
            let config = AppConfig::load()?;
            let caption = Caption::from_name(&name, &CaptionRules::from_config(&config));
            println!("{caption}");
        }
        Commands::Config { action } => {
            let config = AppConfig::load()?;
            handle_config(&config, &action)?;
        }
        Commands::Completions { shell } => {
            generate(shell, &mut Cli::command(), "viirs-wall", &mut std::io::stdout());
        }
    }

    Ok(())
}

fn build_updater(config: &AppConfig) -> Result<AppUpdater, error::WallError> {
    config.ensure_dirs()?;
    let fetcher = HttpFetcher::new(&config.http)?;
    let state = FileStateStore::new(&config.state_file);
    Ok(Updater::new(
        fetcher,
        state,
        SystemWallpaper,
        UpdaterSettings::from_config(config),
    ))
}

/// 处理 once 子命令：检查一次并打印结果
async fn handle_once(config: &AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let updater = build_updater(config)?;
    let directory = config.directory_url(chrono::Utc::now())?;

    match updater.run_once(&directory).await? {
        RunOutcome::NoImages => println!("{}", t!("run_no_images", url => directory)),
        RunOutcome::Unchanged { source } => {
            println!("{}", t!("run_unchanged", source => source))
        }
        RunOutcome::Applied { source, path } => {
            println!("{}", t!("run_applied", source => source));
            println!("{}", t!("save_path", path => path.display()));
        }
    }
    Ok(())
}

/// 处理 config 子命令：查看配置
fn handle_config(config: &AppConfig, action: &ConfigAction) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        ConfigAction::Show => {
            println!("{}", t!("config_title"));
            println!("{}", t!("config_path", path => config.config_path.display()));
            let directory = config.directory_url(chrono::Utc::now())?;
            println!("{}", t!("config_directory", url => directory));
            println!(
                "{}",
                t!("config_wallpaper_dir", path => config.wallpaper_dir.display())
            );
            println!("{}", t!("config_state_file", path => config.state_file.display()));
            println!(
                "{}",
                t!("config_interval", minutes => config.schedule.interval_minutes)
            );
            println!("{}", t!("config_style", style => format!("{:?}", config.style)));
        }
        ConfigAction::Schema => {
            println!("{}", AppConfig::get_schema());
        }
        ConfigAction::Dump => {
            println!("{}", config.to_toml());
        }
    }
    Ok(())
}
