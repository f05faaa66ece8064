// setter.rs — 系统壁纸设置模块

use crate::error::{Result, WallError};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};

/// 壁纸显示方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum WallpaperStyle {
    Center,
    Crop,
    Fit,
    Span,
    #[default]
    Stretch,
    Tile,
}

impl From<WallpaperStyle> for wallpaper::Mode {
    fn from(style: WallpaperStyle) -> Self {
        match style {
            WallpaperStyle::Center => wallpaper::Mode::Center,
            WallpaperStyle::Crop => wallpaper::Mode::Crop,
            WallpaperStyle::Fit => wallpaper::Mode::Fit,
            WallpaperStyle::Span => wallpaper::Mode::Span,
            WallpaperStyle::Stretch => wallpaper::Mode::Stretch,
            WallpaperStyle::Tile => wallpaper::Mode::Tile,
        }
    }
}

/// 桌面配置接口的抽象，测试时可替换为记录调用的实现
pub trait WallpaperApplier {
    /// `path` 必须是绝对路径
    fn apply(&self, path: &Path, style: WallpaperStyle) -> Result<()>;
}

/// 通过 wallpaper 库调用当前操作系统的桌面接口
pub struct SystemWallpaper;

impl WallpaperApplier for SystemWallpaper {
    fn apply(&self, path: &Path, style: WallpaperStyle) -> Result<()> {
        if !path.is_absolute() {
            return Err(WallError::PlatformApply(format!(
                "{} is not an absolute path",
                path.display()
            )));
        }
        let path_str = path.to_str().ok_or_else(|| {
            WallError::PlatformApply(format!("{} is not valid UTF-8", path.display()))
        })?;

        info!(path = %path.display(), ?style, "setting wallpaper");

        // 这个库会自动识别操作系统并调用相应的 API
        wallpaper::set_from_path(path_str).map_err(|e| WallError::PlatformApply(e.to_string()))?;

        // 不少桌面环境不支持显示方式，只记录警告
        if let Err(e) = wallpaper::set_mode(style.into()) {
            warn!(?style, error = %e, "desktop did not accept wallpaper style");
        }
        Ok(())
    }
}
