// logging.rs — 日志初始化
// 日志写到 stderr，级别优先读取 RUST_LOG

use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "viirs_wall=info";
const VERBOSE_LOG_FILTER: &str = "viirs_wall=debug";

pub fn init(verbose: bool) {
    let default = if verbose { VERBOSE_LOG_FILTER } else { DEFAULT_LOG_FILTER };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    // 重复初始化（例如测试中）时忽略错误
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
