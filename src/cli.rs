// cli.rs — 命令行接口定义模块
// 不带任何参数运行时等同于 `viirs-wall watch`

use clap::{Parser, Subcommand}; // Parser: 解析命令行参数的 trait; Subcommand: 定义子命令的 trait
use clap_complete::Shell; // Shell 枚举：Bash, Zsh, Fish, Elvish, PowerShell

/// VIIRS 卫星图壁纸
///
/// 定期从目录列表中获取最新的 VIIRS 真彩色图片，
/// 转为 JPEG、加上拍摄时间标题后设置为系统壁纸。
#[derive(Parser)]
#[command(name = "viirs-wall")]
#[command(version)] // 自动从 Cargo.toml 读取 version 字段
#[command(author)]
#[command(about = "Keep the desktop wallpaper on the latest VIIRS true-color satellite tile")]
pub struct Cli {
    /// 输出调试日志
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// 持续运行：立即检查一次，之后按配置的间隔重复（默认行为）
    Watch,

    /// 只检查并更新一次
    Once,

    /// 打印某个文件名对应的标题
    ///
    /// 用法示例:
    ///   viirs-wall caption npp_viirs_true_color_20251215_140512_GreatLakes.png
    Caption {
        /// 文件名或完整 URL
        name: String,
    },

    /// 配置管理操作
    ///
    /// 用法示例:
    ///   viirs-wall config show
    ///   viirs-wall config dump
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// 生成 shell 补全脚本（支持 bash, zsh, fish, elvish, powershell）
    ///
    /// 用法示例：
    ///   viirs-wall completions zsh > ~/.zsh/completions/_viirs-wall
    Completions {
        /// 目标 shell 类型
        shell: Shell,
    },
}

/// 配置管理操作
#[derive(Subcommand)]
pub enum ConfigAction {
    /// 查看当前配置简报
    Show,
    /// 生成配置文件对应的 JSON Schema
    Schema,
    /// 以 TOML 格式打印当前完整配置内容
    Dump,
}
