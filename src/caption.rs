// caption.rs — 从文件名推导标题
// 例: npp_viirs_true_color_20251215_140512_GreatLakes.png
//  -> VIIRS NPP | 2025-12-15 09:05:12 EST | NOAA CoastWatch | Great Lakes Regional Node

use chrono::{Duration, FixedOffset, NaiveDate, NaiveDateTime};
use regex::Regex;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::LazyLock;

// 只接受 ASCII 数字，后面按字节切分
static TIMESTAMP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([0-9]{8})_([0-9]{6})").expect("timestamp pattern"));
static REGION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"_([A-Za-z][A-Za-z0-9]*)\.[A-Za-z0-9]+$").expect("region pattern"));

const SEPARATOR: &str = " | ";
const UNKNOWN_TIME: &str = "Date/Time Unknown";

/// 卫星平台
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Npp,
    Jpss1,
    Jpss2,
    /// 无法识别时的通用标签
    Viirs,
}

impl Platform {
    fn detect(lower_name: &str) -> Self {
        if lower_name.contains("npp_") {
            Self::Npp
        } else if lower_name.contains("j1_") || lower_name.contains("jpss1") {
            Self::Jpss1
        } else if lower_name.contains("j2_") || lower_name.contains("jpss2") {
            Self::Jpss2
        } else {
            Self::Viirs
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Npp => "NPP",
            Self::Jpss1 => "JPSS-1",
            Self::Jpss2 => "JPSS-2",
            Self::Viirs => "VIIRS",
        }
    }
}

/// 时区与区域名称表
#[derive(Debug, Clone)]
pub struct CaptionRules {
    pub offset: FixedOffset,
    pub zone_label: String,
    pub regions: BTreeMap<String, String>,
}

impl CaptionRules {
    pub fn from_config(config: &crate::config::AppConfig) -> Self {
        Self {
            offset: config.utc_offset,
            zone_label: config.caption.zone_label.clone(),
            regions: config.caption.regions.clone(),
        }
    }

    fn region_label(&self, token: &str) -> Option<String> {
        self.regions
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(token))
            .map(|(_, label)| label.clone())
    }
}

/// 标题内容，完全由文件名决定
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caption {
    pub platform: Platform,
    pub timestamp_utc: Option<NaiveDateTime>,
    pub timestamp_local: Option<NaiveDateTime>,
    pub region: Option<String>,
    zone_label: String,
}

/// URL 或路径的最后一段，去掉查询串
fn base_name(url_or_path: &str) -> &str {
    let without_query = url_or_path.split(['?', '#']).next().unwrap_or(url_or_path);
    without_query
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(without_query)
}

/// 第一个 YYYYMMDD_HHMMSS，无法构成合法日期时间时返回 None
pub fn parse_timestamp(name: &str) -> Option<NaiveDateTime> {
    let caps = TIMESTAMP.captures(name)?;
    let (date, time) = (&caps[1], &caps[2]);
    let field = |s: &str| s.parse::<u32>().ok();
    NaiveDate::from_ymd_opt(
        date[0..4].parse().ok()?,
        field(&date[4..6])?,
        field(&date[6..8])?,
    )?
    .and_hms_opt(field(&time[0..2])?, field(&time[2..4])?, field(&time[4..6])?)
}

impl Caption {
    pub fn from_name(url_or_path: &str, rules: &CaptionRules) -> Self {
        let name = base_name(url_or_path);
        let platform = Platform::detect(&name.to_ascii_lowercase());

        let timestamp_utc = parse_timestamp(name);
        let shift = Duration::seconds(i64::from(rules.offset.local_minus_utc()));
        let timestamp_local = timestamp_utc.and_then(|t| t.checked_add_signed(shift));

        let region = REGION
            .captures(name)
            .and_then(|caps| rules.region_label(&caps[1]));

        Self {
            platform,
            timestamp_utc,
            timestamp_local,
            region,
            zone_label: rules.zone_label.clone(),
        }
    }
}

impl fmt::Display for Caption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.platform {
            Platform::Viirs => f.write_str("VIIRS")?,
            other => write!(f, "VIIRS {}", other.label())?,
        }
        f.write_str(SEPARATOR)?;
        match self.timestamp_local {
            Some(local) => write!(f, "{} {}", local.format("%Y-%m-%d %H:%M:%S"), self.zone_label)?,
            None => f.write_str(UNKNOWN_TIME)?,
        }
        if let Some(region) = &self.region {
            f.write_str(SEPARATOR)?;
            f.write_str(region)?;
        }
        Ok(())
    }
}
