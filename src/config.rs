// config.rs — 配置管理模块
// 遵循 Unix 风格：优先从 ~/.config/viirs-wall/config.toml 读取配置

use crate::error::{Result, WallError};
use crate::setter::WallpaperStyle;
use chrono::FixedOffset;
use schemars::JsonSchema; // 引入用于生成 JSON Schema 的 trait
use serde::{Deserialize, Serialize}; // 引入序列化与反序列化 trait
use shellexpand::tilde; // 用于展开 ~ 和环境变量
use std::collections::BTreeMap;
use std::env; // 环境变量模块
use std::fs; // 文件系统模块
use std::path::{Path, PathBuf}; // 路径处理类型
use std::time::Duration;
use tracing::warn;
use url::Url;

const APP_DIR: &str = "viirs-wall";
/// 最长检查间隔：一周
const MAX_INTERVAL_MINUTES: u64 = 7 * 24 * 60;
/// 字号最多占图片高度的一半
const MAX_FONT_SCALE: f32 = 0.5;
const MAX_PADDING_FACTOR: f32 = 4.0;

/// 展开路径中的 ~ 和环境变量，相对路径则相对于 $HOME
fn expand_path(path_str: &str, home: &Path) -> PathBuf {
    let p = PathBuf::from(tilde(path_str).into_owned());
    if p.is_absolute() { p } else { home.join(p) }
}

/// 映射 config.toml 文件内容的嵌套结构体
#[derive(Debug, Deserialize, Serialize, Default, JsonSchema)]
pub(crate) struct ConfigFile {
    #[serde(default)]
    source: SourceConfig,
    #[serde(default)]
    http: HttpConfig,
    #[serde(default)]
    schedule: ScheduleConfig,
    #[serde(default)]
    output: OutputConfig,
    #[serde(default)]
    caption: CaptionConfig,
    #[serde(default)]
    state: StateConfig,
}

/// 图片目录来源
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
pub struct SourceConfig {
    /// 目录列表根地址（必须以 / 结尾）
    #[serde(default = "default_root_url")]
    pub root_url: String,
    /// 是否在根地址后追加当前 UTC 年月 (YYYY/MM/)
    #[serde(default = "default_true")]
    pub monthly_subdirectory: bool,
    /// 视为图片的文件扩展名（不区分大小写）
    #[serde(default = "default_extension")]
    pub image_extension: String,
    /// 最多保留的候选数量
    #[serde(default = "default_candidates")]
    pub candidates: usize,
    /// 子目录最大下探层数
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            root_url: default_root_url(),
            monthly_subdirectory: true,
            image_extension: default_extension(),
            candidates: default_candidates(),
            max_depth: default_max_depth(),
        }
    }
}

/// 请求超时（秒）
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
pub struct HttpConfig {
    #[serde(default = "default_listing_timeout")]
    pub listing_timeout_secs: u64,
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_secs: u64,
    #[serde(default = "default_download_timeout")]
    pub download_timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            listing_timeout_secs: default_listing_timeout(),
            probe_timeout_secs: default_probe_timeout(),
            download_timeout_secs: default_download_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

/// 定时任务配置
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
pub struct ScheduleConfig {
    /// 两次检查之间的间隔（分钟）
    #[serde(default = "default_interval")]
    pub interval_minutes: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            interval_minutes: default_interval(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
struct OutputConfig {
    /// 最终壁纸保存目录 (支持 ~、$HOME 等环境变量，相对路径则相对于 $HOME)
    wallpaper_dir: Option<String>,
    /// 临时下载目录
    work_dir: Option<String>,
    /// JPEG 质量 (1-100)
    #[serde(default = "default_quality")]
    jpeg_quality: u8,
    /// 壁纸显示方式 (center / crop / fit / span / stretch / tile)
    #[serde(default)]
    style: WallpaperStyle,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            wallpaper_dir: None,
            work_dir: None,
            jpeg_quality: default_quality(),
            style: WallpaperStyle::default(),
        }
    }
}

/// 标题叠加配置
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
pub struct CaptionConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// 字号占图片高度的比例
    #[serde(default = "default_font_scale")]
    pub font_scale: f32,
    /// 内边距占字号的比例
    #[serde(default = "default_padding")]
    pub padding_factor: f32,
    /// 依次尝试的 TrueType 字体，全部失败时使用内置点阵字体
    #[serde(default = "default_fonts")]
    pub fonts: Vec<String>,
    /// 固定时区偏移（小时），不考虑夏令时
    #[serde(default = "default_offset")]
    pub utc_offset_hours: i32,
    #[serde(default = "default_zone_label")]
    pub zone_label: String,
    /// 区域代号 -> 显示名称
    #[serde(default = "default_regions")]
    pub regions: BTreeMap<String, String>,
}

impl Default for CaptionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            font_scale: default_font_scale(),
            padding_factor: default_padding(),
            fonts: default_fonts(),
            utc_offset_hours: default_offset(),
            zone_label: default_zone_label(),
            regions: default_regions(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, JsonSchema)]
struct StateConfig {
    /// 记录上次应用的图片地址的文件
    file: Option<String>,
}

fn default_root_url() -> String {
    "https://apps.glerl.noaa.gov/erddap/files/GL_VIIRS_True_Color/".to_string()
}
fn default_true() -> bool {
    true
}
fn default_extension() -> String {
    "png".to_string()
}
fn default_candidates() -> usize {
    3
}
fn default_max_depth() -> usize {
    4
}
fn default_listing_timeout() -> u64 {
    30
}
fn default_probe_timeout() -> u64 {
    20
}
fn default_download_timeout() -> u64 {
    60
}
fn default_user_agent() -> String {
    format!("viirs-wall/{}", env!("CARGO_PKG_VERSION"))
}
fn default_interval() -> u64 {
    30
}
fn default_quality() -> u8 {
    95
}
fn default_font_scale() -> f32 {
    0.02
}
fn default_padding() -> f32 {
    0.4
}
fn default_fonts() -> Vec<String> {
    [
        "arial.ttf",
        "Segoe UI.ttf",
        "C:\\Windows\\Fonts\\arial.ttf",
        "C:\\Windows\\Fonts\\segoeui.ttf",
        "/System/Library/Fonts/Supplemental/Arial.ttf",
        "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
        "/usr/share/fonts/TTF/DejaVuSans.ttf",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}
fn default_offset() -> i32 {
    -5
}
fn default_zone_label() -> String {
    "EST".to_string()
}
fn default_regions() -> BTreeMap<String, String> {
    BTreeMap::from([(
        "GreatLakes".to_string(),
        "NOAA CoastWatch | Great Lakes Regional Node".to_string(),
    )])
}

/// 应用全局配置项（已解析路径并校验取值）
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// 配置文件所在路径
    pub config_path: PathBuf,
    pub source: SourceConfig,
    pub http: HttpConfig,
    pub schedule: ScheduleConfig,
    pub caption: CaptionConfig,
    /// 由 caption.utc_offset_hours 换算的固定时区
    pub utc_offset: FixedOffset,
    /// 最终壁纸目录
    pub wallpaper_dir: PathBuf,
    /// 临时文件目录
    pub work_dir: PathBuf,
    pub jpeg_quality: u8,
    pub style: WallpaperStyle,
    pub state_file: PathBuf,
}

impl AppConfig {
    /// 读取配置：环境变量 > 配置文件 > 默认值
    pub fn load() -> Result<Self> {
        let home = dirs::home_dir()
            .ok_or_else(|| WallError::Config("cannot determine home directory".to_string()))?;
        let config_path = match env::var("VIIRS_WALL_CONFIG") {
            Ok(p) => expand_path(&p, &home),
            Err(_) => home.join(".config").join(APP_DIR).join("config.toml"),
        };
        let file = Self::load_config_from_file(&config_path);
        Self::from_file(file, config_path, &home, env::var("VIIRS_WALL_ROOT_URL").ok())
    }

    /// 辅助函数：解析 TOML 配置文件，不存在时使用默认值，解析失败时记录警告
    fn load_config_from_file(path: &Path) -> ConfigFile {
        let content = match fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return ConfigFile::default(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "config file unreadable, using defaults");
                return ConfigFile::default();
            }
        };
        toml::from_str(&content).unwrap_or_else(|e| {
            warn!(path = %path.display(), error = %e, "config file invalid, using defaults");
            ConfigFile::default()
        })
    }

    pub(crate) fn from_file(
        file: ConfigFile,
        config_path: PathBuf,
        home: &Path,
        root_override: Option<String>,
    ) -> Result<Self> {
        let mut source = file.source;
        if let Some(root) = root_override {
            source.root_url = root;
        }
        if source.candidates == 0 {
            return Err(WallError::Config("source.candidates must be at least 1".to_string()));
        }
        let root = Url::parse(&source.root_url)
            .map_err(|e| WallError::Config(format!("source.root_url {}: {e}", source.root_url)))?;
        if root.cannot_be_a_base() {
            return Err(WallError::Config(format!("source.root_url {} is not a directory URL", root)));
        }
        if !(1..=100).contains(&file.output.jpeg_quality) {
            return Err(WallError::Config("output.jpeg_quality must be within 1..=100".to_string()));
        }
        if !(1..=MAX_INTERVAL_MINUTES).contains(&file.schedule.interval_minutes) {
            return Err(WallError::Config(format!(
                "schedule.interval_minutes must be within 1..={MAX_INTERVAL_MINUTES}"
            )));
        }
        let font_scale = file.caption.font_scale;
        if !(font_scale.is_finite() && font_scale > 0.0 && font_scale <= MAX_FONT_SCALE) {
            return Err(WallError::Config(format!(
                "caption.font_scale must be within (0, {MAX_FONT_SCALE}]"
            )));
        }
        let padding = file.caption.padding_factor;
        if !(padding.is_finite() && (0.0..=MAX_PADDING_FACTOR).contains(&padding)) {
            return Err(WallError::Config(format!(
                "caption.padding_factor must be within 0..={MAX_PADDING_FACTOR}"
            )));
        }
        let utc_offset = FixedOffset::east_opt(file.caption.utc_offset_hours.saturating_mul(3600))
            .filter(|_| file.caption.utc_offset_hours.abs() < 24)
            .ok_or_else(|| {
                WallError::Config("caption.utc_offset_hours must be within ±23".to_string())
            })?;

        let config_dir = config_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| home.join(".config").join(APP_DIR));

        // 未配置时的默认目录：$HOME/Pictures/viirs-wall 与 $HOME/.cache/viirs-wall
        let wallpaper_dir = file
            .output
            .wallpaper_dir
            .as_deref()
            .map(|d| expand_path(d, home))
            .unwrap_or_else(|| home.join("Pictures").join(APP_DIR));
        let work_dir = file
            .output
            .work_dir
            .as_deref()
            .map(|d| expand_path(d, home))
            .unwrap_or_else(|| home.join(".cache").join(APP_DIR));
        let state_file = file
            .state
            .file
            .as_deref()
            .map(|f| expand_path(f, home))
            .unwrap_or_else(|| config_dir.join("last_url.txt"));

        Ok(Self {
            config_path,
            source,
            http: file.http,
            schedule: file.schedule,
            caption: file.caption,
            utc_offset,
            wallpaper_dir,
            work_dir,
            jpeg_quality: file.output.jpeg_quality,
            style: file.output.style,
            state_file,
        })
    }

    /// 确保所有必要的目录都存在
    pub fn ensure_dirs(&self) -> Result<()> {
        for dir in [&self.wallpaper_dir, &self.work_dir] {
            fs::create_dir_all(dir)
                .map_err(|e| WallError::io(format!("creating {}", dir.display()), e))?;
        }
        Ok(())
    }

    /// 当前月份对应的目录地址
    pub fn directory_url(&self, now: chrono::DateTime<chrono::Utc>) -> Result<Url> {
        let mut root = self.source.root_url.clone();
        if !root.ends_with('/') {
            root.push('/');
        }
        let root = Url::parse(&root).map_err(|e| WallError::Config(e.to_string()))?;
        if !self.source.monthly_subdirectory {
            return Ok(root);
        }
        root.join(&now.format("%Y/%m/").to_string())
            .map_err(|e| WallError::Config(e.to_string()))
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.schedule.interval_minutes.clamp(1, MAX_INTERVAL_MINUTES) * 60)
    }

    fn to_file(&self) -> ConfigFile {
        ConfigFile {
            source: self.source.clone(),
            http: self.http.clone(),
            schedule: self.schedule.clone(),
            output: OutputConfig {
                wallpaper_dir: Some(self.wallpaper_dir.to_string_lossy().to_string()),
                work_dir: Some(self.work_dir.to_string_lossy().to_string()),
                jpeg_quality: self.jpeg_quality,
                style: self.style,
            },
            caption: self.caption.clone(),
            state: StateConfig {
                file: Some(self.state_file.to_string_lossy().to_string()),
            },
        }
    }

    /// 获取配置文件的 JSON Schema
    pub fn get_schema() -> String {
        let schema = schemars::schema_for!(ConfigFile);
        serde_json::to_string_pretty(&schema).unwrap_or_else(|_| "{}".to_string())
    }

    /// 将当前配置转换为 TOML 字符串
    pub fn to_toml(&self) -> String {
        toml::to_string_pretty(&self.to_file())
            .unwrap_or_else(|_| "# Error serializing config".to_string())
    }
}
