// updater.rs — 单次更新流程与定时循环
// 列目录 -> 挑选 -> 比对状态 -> 下载 -> 转换加标题 -> 设置壁纸 -> 记录状态

use crate::caption::{Caption, CaptionRules};
use crate::config::AppConfig;
use crate::error::{Result, WallError};
use crate::fetch::Fetcher;
use crate::imaging::font::FontChain;
use crate::imaging::{self, CaptionLayout, CaptionSpec};
use crate::setter::{WallpaperApplier, WallpaperStyle};
use crate::source::recency::{RecencyOptions, select_recent};
use crate::source::size::select_largest;
use crate::state::StateStore;
use std::fs;
use std::path::{Path, PathBuf};
use std::pin::pin;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use url::Url;

/// 输出文件名前缀，清理旧壁纸时只删除带此前缀的文件
pub const FILE_PREFIX: &str = "viirs-wall-";

/// 单次运行的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// 任何层级都没有找到图片
    NoImages,
    /// 选中的图片与上次相同，未做任何处理
    Unchanged { source: Url },
    Applied { source: Url, path: PathBuf },
}

/// 运行所需的全部参数（从 AppConfig 拆出，便于测试构造）
#[derive(Debug, Clone)]
pub struct UpdaterSettings {
    pub image_extension: String,
    pub candidates: usize,
    pub max_depth: usize,
    pub wallpaper_dir: PathBuf,
    pub work_dir: PathBuf,
    pub jpeg_quality: u8,
    pub style: WallpaperStyle,
    /// `None` 表示不叠加标题
    pub caption: Option<CaptionSettings>,
}

#[derive(Debug, Clone)]
pub struct CaptionSettings {
    pub rules: CaptionRules,
    pub fonts: FontChain,
    pub layout: CaptionLayout,
}

impl UpdaterSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        let caption = config.caption.enabled.then(|| CaptionSettings {
            rules: CaptionRules::from_config(config),
            fonts: FontChain::new(config.caption.fonts.iter().map(PathBuf::from)),
            layout: CaptionLayout {
                font_scale: config.caption.font_scale,
                padding_factor: config.caption.padding_factor,
            },
        });
        Self {
            image_extension: config.source.image_extension.clone(),
            candidates: config.source.candidates,
            max_depth: config.source.max_depth,
            wallpaper_dir: config.wallpaper_dir.clone(),
            work_dir: config.work_dir.clone(),
            jpeg_quality: config.jpeg_quality,
            style: config.style,
            caption,
        }
    }
}

/// 把网络、状态与桌面接口组合成一次完整的更新
pub struct Updater<F, S, A> {
    fetcher: F,
    state: S,
    applier: A,
    settings: UpdaterSettings,
}

/// URL 最后一段去掉扩展名，用于生成本地文件名
fn file_stem(url: &Url) -> String {
    let name = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .unwrap_or_default();
    let stem = Path::new(name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default();
    let cleaned: String = stem
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
        .collect();
    if cleaned.is_empty() { "image".to_string() } else { cleaned }
}

/// 删除临时文件，失败只返回错误由调用方记录
pub fn remove_file(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(WallError::io(format!("deleting {}", path.display()), e)),
    }
}

/// 删除目录中除 `keep` 外所有带前缀的旧壁纸，返回删除数量
pub fn prune_outputs(dir: &Path, keep: &Path) -> Result<usize> {
    let entries = fs::read_dir(dir)
        .map_err(|e| WallError::io(format!("reading {}", dir.display()), e))?;
    let mut deleted = 0;
    for entry in entries.flatten() {
        let path = entry.path();
        let is_ours = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with(FILE_PREFIX));
        if !is_ours || path == keep || !path.is_file() {
            continue;
        }
        match remove_file(&path) {
            Ok(()) => deleted += 1,
            Err(e) => warn!(error = %e, "could not delete old wallpaper"),
        }
    }
    Ok(deleted)
}

impl<F, S, A> Updater<F, S, A>
where
    F: Fetcher,
    S: StateStore,
    A: WallpaperApplier,
{
    pub fn new(fetcher: F, state: S, applier: A, settings: UpdaterSettings) -> Self {
        Self {
            fetcher,
            state,
            applier,
            settings,
        }
    }

    /// 读取失败当作没有记录
    fn previous_source(&self) -> Option<String> {
        match self.state.get() {
            Ok(previous) => previous,
            Err(e) => {
                warn!(error = %e, "could not read state, treating as no previous image");
                None
            }
        }
    }

    /// 执行一次完整流程；只有设置壁纸成功后才写入状态
    pub async fn run_once(&self, directory: &Url) -> Result<RunOutcome> {
        let previous = self.previous_source();

        info!(%directory, "searching for recent images");
        let options = RecencyOptions {
            limit: self.settings.candidates,
            max_depth: self.settings.max_depth,
            image_extension: &self.settings.image_extension,
        };
        let recent = select_recent(&self.fetcher, directory, &options).await?;
        if recent.is_empty() {
            info!(%directory, "no images found");
            return Ok(RunOutcome::NoImages);
        }
        debug!(candidates = ?recent.iter().map(|c| c.url.as_str()).collect::<Vec<_>>(), "recent images");

        let Some(chosen) = select_largest(&self.fetcher, recent).await else {
            return Ok(RunOutcome::NoImages);
        };
        let source = chosen.url;
        info!(%source, size = ?chosen.size, "selected image");

        if previous.as_deref() == Some(source.as_str()) {
            info!(%source, "same image as last run, skipping");
            return Ok(RunOutcome::Unchanged { source });
        }

        let path = self.produce(&source).await?;
        self.applier.apply(&path, self.settings.style)?;
        info!(path = %path.display(), "wallpaper set");

        if let Err(e) = self.state.set(source.as_str()) {
            warn!(error = %e, "could not record applied image");
        }
        match prune_outputs(&self.settings.wallpaper_dir, &path) {
            Ok(0) => {}
            Ok(n) => debug!(deleted = n, "removed old wallpapers"),
            Err(e) => warn!(error = %e, "could not prune old wallpapers"),
        }

        Ok(RunOutcome::Applied { source, path })
    }

    /// 下载到临时文件并生成最终 JPEG，临时文件总会尝试删除
    async fn produce(&self, source: &Url) -> Result<PathBuf> {
        let stem = file_stem(source);
        let extension = self.settings.image_extension.trim_start_matches('.');
        let download_path = self
            .settings
            .work_dir
            .join(format!("{FILE_PREFIX}download.{extension}"));
        let output_path = self.settings.wallpaper_dir.join(format!("{FILE_PREFIX}{stem}.jpg"));

        let rendered = self.download_and_render(source, &download_path, &output_path).await;
        if let Err(e) = remove_file(&download_path) {
            warn!(error = %e, "could not delete temporary download");
        }
        rendered?;

        // 桌面接口要求绝对路径
        let absolute = std::path::absolute(&output_path)
            .map_err(|e| WallError::io(format!("resolving {}", output_path.display()), e))?;
        Ok(absolute)
    }

    async fn download_and_render(
        &self,
        source: &Url,
        download_path: &Path,
        output_path: &Path,
    ) -> Result<()> {
        let bytes = self.fetcher.get_bytes(source).await?;
        tokio::fs::write(download_path, &bytes)
            .await
            .map_err(|e| WallError::io(format!("writing {}", download_path.display()), e))?;
        info!(bytes = bytes.len(), path = %download_path.display(), "downloaded image");

        let caption_text = self.settings.caption.as_ref().map(|c| {
            let caption = Caption::from_name(source.as_str(), &c.rules);
            if caption.timestamp_utc.is_none() {
                warn!(%source, "no capture time in file name");
            }
            let text = caption.to_string();
            info!(caption = %text, "adding caption");
            text
        });
        let caption = self.settings.caption.as_ref().zip(caption_text.as_deref()).map(
            |(settings, text)| CaptionSpec {
                text,
                fonts: &settings.fonts,
                layout: settings.layout,
            },
        );

        imaging::render_wallpaper(download_path, output_path, caption, self.settings.jpeg_quality)
    }
}

/// 定时循环：立即执行一次，之后每隔 `interval` 再执行；单次失败只记录日志
pub async fn watch<F, S, A>(
    updater: &Updater<F, S, A>,
    directory_for_now: impl Fn() -> Result<Url>,
    interval: Duration,
) where
    F: Fetcher,
    S: StateStore,
    A: WallpaperApplier,
{
    watch_until(updater, directory_for_now, interval, tokio::signal::ctrl_c()).await;
}

/// `shutdown` 完成时退出，无论正在运行还是在等待下一轮
pub async fn watch_until<F, S, A, T>(
    updater: &Updater<F, S, A>,
    directory_for_now: impl Fn() -> Result<Url>,
    interval: Duration,
    shutdown: impl Future<Output = T>,
) where
    F: Fetcher,
    S: StateStore,
    A: WallpaperApplier,
{
    let mut shutdown = pin!(shutdown);
    loop {
        let run = async {
            let directory = directory_for_now()?;
            updater.run_once(&directory).await
        };
        let outcome = tokio::select! {
            outcome = run => outcome,
            _ = &mut shutdown => {
                info!("interrupted during a run, exiting");
                return;
            }
        };
        match outcome {
            Ok(outcome) => debug!(?outcome, "run finished"),
            Err(e) => error!(error = %e, "run failed, will retry at next interval"),
        }

        info!(minutes = interval.as_secs() / 60, "checking for a new image after the interval");
        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = &mut shutdown => {
                info!("interrupted, exiting");
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::MemoryStateStore;
    use crate::testing::ScriptedFetcher;
    use chrono::FixedOffset;
    use image::{ImageFormat, Rgba, RgbaImage};
    use std::collections::BTreeMap;
    use std::io::Cursor;
    use std::sync::Mutex;

    const DIR: &str = "https://host/files/2025/12/";
    const NEWEST: &str = "https://host/files/2025/12/npp_viirs_true_color_20251215_140512_GreatLakes.png";
    const OLDER: &str = "https://host/files/2025/12/npp_viirs_true_color_20251214_180000_GreatLakes.png";

    #[derive(Default)]
    struct RecordingApplier {
        applied: Mutex<Vec<(PathBuf, WallpaperStyle)>>,
        fail: bool,
    }

    impl WallpaperApplier for &RecordingApplier {
        fn apply(&self, path: &Path, style: WallpaperStyle) -> Result<()> {
            if self.fail {
                return Err(WallError::PlatformApply("desktop refused".to_string()));
            }
            self.applied.lock().unwrap().push((path.to_path_buf(), style));
            Ok(())
        }
    }

    /// 读写都失败的状态文件
    struct BrokenStateStore;

    impl StateStore for BrokenStateStore {
        fn get(&self) -> Result<Option<String>> {
            Err(broken_state())
        }
        fn set(&self, _value: &str) -> Result<()> {
            Err(broken_state())
        }
    }

    fn broken_state() -> WallError {
        WallError::StateIo {
            path: PathBuf::from("/unreadable/last_url.txt"),
            source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        }
    }

    /// 所有请求都不返回，模拟卡住的下载
    struct StalledFetcher;

    #[async_trait::async_trait]
    impl Fetcher for StalledFetcher {
        async fn get_text(&self, _url: &Url) -> Result<String> {
            std::future::pending().await
        }
        async fn head_size(&self, _url: &Url) -> Result<Option<u64>> {
            std::future::pending().await
        }
        async fn get_size(&self, _url: &Url) -> Result<Option<u64>> {
            std::future::pending().await
        }
        async fn get_bytes(&self, _url: &Url) -> Result<Vec<u8>> {
            std::future::pending().await
        }
    }

    fn png_bytes() -> Vec<u8> {
        let mut bytes = Vec::new();
        RgbaImage::from_pixel(80, 60, Rgba([20, 90, 160, 200]))
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        bytes
    }

    fn fetcher() -> ScriptedFetcher {
        ScriptedFetcher::default()
            .listing(
                DIR,
                &[
                    "../",
                    "npp_viirs_true_color_20251214_180000_GreatLakes.png",
                    "npp_viirs_true_color_20251215_140512_GreatLakes.png",
                ],
            )
            .head_size(NEWEST, 1000)
            .head_size(OLDER, 2000)
            .body(OLDER, png_bytes())
    }

    fn settings(root: &Path) -> UpdaterSettings {
        let wallpaper_dir = root.join("walls");
        let work_dir = root.join("work");
        fs::create_dir_all(&wallpaper_dir).unwrap();
        fs::create_dir_all(&work_dir).unwrap();
        UpdaterSettings {
            image_extension: "png".to_string(),
            candidates: 3,
            max_depth: 2,
            wallpaper_dir,
            work_dir,
            jpeg_quality: 90,
            style: WallpaperStyle::Fit,
            caption: Some(CaptionSettings {
                rules: CaptionRules {
                    offset: FixedOffset::west_opt(5 * 3600).unwrap(),
                    zone_label: "EST".to_string(),
                    regions: BTreeMap::new(),
                },
                fonts: FontChain::default(),
                layout: CaptionLayout::default(),
            }),
        }
    }

    fn dir() -> Url {
        Url::parse(DIR).unwrap()
    }

    #[tokio::test]
    async fn applies_largest_recent_image_and_records_it() {
        let tmp = tempfile::tempdir().unwrap();
        let applier = RecordingApplier::default();
        let updater = Updater::new(fetcher(), MemoryStateStore::default(), &applier, settings(tmp.path()));

        let outcome = updater.run_once(&dir()).await.unwrap();
        let RunOutcome::Applied { source, path } = outcome else {
            panic!("expected an applied wallpaper, got {outcome:?}");
        };
        assert_eq!(source.as_str(), OLDER);
        assert!(path.is_absolute());
        assert_eq!(
            path.file_name().unwrap().to_str().unwrap(),
            "viirs-wall-npp_viirs_true_color_20251214_180000_GreatLakes.jpg"
        );
        let written = image::open(&path).unwrap();
        assert!(!written.color().has_alpha());

        assert_eq!(applier.applied.lock().unwrap().as_slice(), &[(path.clone(), WallpaperStyle::Fit)]);
        assert_eq!(updater.state.get().unwrap().as_deref(), Some(OLDER));
        // 临时下载已删除
        assert_eq!(fs::read_dir(tmp.path().join("work")).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn unchanged_image_skips_download_and_apply() {
        let tmp = tempfile::tempdir().unwrap();
        let applier = RecordingApplier::default();
        let updater = Updater::new(
            fetcher(),
            MemoryStateStore::with_value(OLDER),
            &applier,
            settings(tmp.path()),
        );

        let outcome = updater.run_once(&dir()).await.unwrap();
        assert_eq!(outcome, RunOutcome::Unchanged { source: Url::parse(OLDER).unwrap() });
        assert_eq!(updater.fetcher.count("GET"), 0);
        assert!(applier.applied.lock().unwrap().is_empty());
        assert_eq!(fs::read_dir(tmp.path().join("walls")).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn empty_listing_reports_no_images() {
        let tmp = tempfile::tempdir().unwrap();
        let applier = RecordingApplier::default();
        let fetcher = ScriptedFetcher::default().listing(DIR, &["readme.txt"]);
        let updater = Updater::new(fetcher, MemoryStateStore::default(), &applier, settings(tmp.path()));
        assert_eq!(updater.run_once(&dir()).await.unwrap(), RunOutcome::NoImages);
    }

    #[tokio::test]
    async fn failed_apply_keeps_previous_state() {
        let tmp = tempfile::tempdir().unwrap();
        let applier = RecordingApplier {
            fail: true,
            ..Default::default()
        };
        let updater = Updater::new(
            fetcher(),
            MemoryStateStore::with_value(NEWEST),
            &applier,
            settings(tmp.path()),
        );
        let err = updater.run_once(&dir()).await.unwrap_err();
        assert!(matches!(err, WallError::PlatformApply(_)));
        assert_eq!(updater.state.get().unwrap().as_deref(), Some(NEWEST));
    }

    #[tokio::test]
    async fn undecodable_download_is_cleaned_up() {
        let tmp = tempfile::tempdir().unwrap();
        let applier = RecordingApplier::default();
        let fetcher = fetcher().body(OLDER, b"<html>503</html>".to_vec());
        let updater = Updater::new(fetcher, MemoryStateStore::default(), &applier, settings(tmp.path()));

        let err = updater.run_once(&dir()).await.unwrap_err();
        assert!(matches!(err, WallError::ImageDecode { .. }));
        assert_eq!(fs::read_dir(tmp.path().join("work")).unwrap().count(), 0);
        assert_eq!(updater.state.get().unwrap(), None);
    }

    #[tokio::test]
    async fn failed_download_is_a_download_error() {
        let tmp = tempfile::tempdir().unwrap();
        let applier = RecordingApplier::default();
        let fetcher = ScriptedFetcher::default()
            .listing(DIR, &["npp_viirs_true_color_20251215_140512_GreatLakes.png"]);
        let updater = Updater::new(fetcher, MemoryStateStore::default(), &applier, settings(tmp.path()));
        let err = updater.run_once(&dir()).await.unwrap_err();
        assert!(matches!(err, WallError::Download { .. }));
    }

    #[tokio::test]
    async fn state_errors_are_not_fatal() {
        let tmp = tempfile::tempdir().unwrap();
        let applier = RecordingApplier::default();
        let updater = Updater::new(fetcher(), BrokenStateStore, &applier, settings(tmp.path()));

        let outcome = updater.run_once(&dir()).await.unwrap();
        assert!(matches!(outcome, RunOutcome::Applied { ref source, .. } if source.as_str() == OLDER));
        assert_eq!(applier.applied.lock().unwrap().len(), 1);

        // 读不到上次记录，所以同一张图会再次应用
        let again = updater.run_once(&dir()).await.unwrap();
        assert!(matches!(again, RunOutcome::Applied { .. }));
        assert_eq!(applier.applied.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn unwritable_download_leaves_nothing_behind() {
        let tmp = tempfile::tempdir().unwrap();
        let applier = RecordingApplier::default();
        let mut settings = settings(tmp.path());
        settings.work_dir = tmp.path().join("missing");
        let updater = Updater::new(fetcher(), MemoryStateStore::default(), &applier, settings);

        let err = updater.run_once(&dir()).await.unwrap_err();
        assert!(matches!(err, WallError::Io { .. }));
        assert!(!tmp.path().join("missing").exists());
        assert_eq!(fs::read_dir(tmp.path().join("walls")).unwrap().count(), 0);
        assert!(applier.applied.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn watch_stops_while_waiting_for_next_run() {
        let tmp = tempfile::tempdir().unwrap();
        let applier = RecordingApplier::default();
        let updater = Updater::new(fetcher(), MemoryStateStore::default(), &applier, settings(tmp.path()));

        watch_until(
            &updater,
            || Ok(dir()),
            Duration::from_secs(3600),
            tokio::time::sleep(Duration::from_millis(200)),
        )
        .await;
        assert_eq!(applier.applied.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn watch_stops_during_a_stalled_run() {
        let tmp = tempfile::tempdir().unwrap();
        let applier = RecordingApplier::default();
        let updater = Updater::new(StalledFetcher, MemoryStateStore::default(), &applier, settings(tmp.path()));

        watch_until(&updater, || Ok(dir()), Duration::from_secs(3600), std::future::ready(())).await;
        assert!(applier.applied.lock().unwrap().is_empty());
    }

    #[test]
    fn prune_keeps_current_and_foreign_files() {
        let tmp = tempfile::tempdir().unwrap();
        let keep = tmp.path().join("viirs-wall-new.jpg");
        for name in ["viirs-wall-old.jpg", "viirs-wall-new.jpg", "holiday.jpg"] {
            fs::write(tmp.path().join(name), b"x").unwrap();
        }
        assert_eq!(prune_outputs(tmp.path(), &keep).unwrap(), 1);
        assert!(keep.exists());
        assert!(tmp.path().join("holiday.jpg").exists());
        assert!(!tmp.path().join("viirs-wall-old.jpg").exists());
    }

    #[test]
    fn stems_are_safe_file_names() {
        let url = Url::parse("https://h/a/npp%20tile_20250101_000000.png?x=1").unwrap();
        assert_eq!(file_stem(&url), "npp_20tile_20250101_000000");
        assert_eq!(file_stem(&Url::parse("https://h/").unwrap()), "image");
    }
}
