// error.rs — 错误类型
// 每一类失败对应一个变体，由调用方决定记录后继续还是向上传播

use std::path::PathBuf;

/// 单次运行中可能出现的错误
#[derive(Debug, thiserror::Error)]
pub enum WallError {
    /// 请求失败、超时或返回非成功状态码
    #[error("request to {url} failed: {reason}")]
    Network { url: String, reason: String },

    /// 目录页面中没有任何链接
    #[error("directory listing at {url} contains no links")]
    Parse { url: String },

    /// 下载图片失败
    #[error("download of {url} failed: {reason}")]
    Download { url: String, reason: String },

    /// 下载的字节不是有效图片
    #[error("could not decode image {path}: {source}")]
    ImageDecode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// 字体无法加载（总会回退到内置点阵字体）
    #[error("could not load font {path}: {reason}")]
    FontLoad { path: PathBuf, reason: String },

    /// 状态文件读写失败
    #[error("state file {path}: {source}")]
    StateIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// 系统壁纸接口调用失败
    #[error("failed to set wallpaper: {0}")]
    PlatformApply(String),

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// 配置项取值非法
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl WallError {
    pub fn network(url: impl Into<String>, reason: impl ToString) -> Self {
        Self::Network {
            url: url.into(),
            reason: reason.to_string(),
        }
    }

    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, WallError>;
