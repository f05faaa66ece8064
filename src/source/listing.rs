// listing.rs — 目录列表页解析
// 只负责单层列表，不做递归

use super::{DirectoryEntry, EntryKind};
use crate::error::{Result, WallError};
use crate::fetch::Fetcher;
use scraper::{Html, Selector};
use std::collections::HashSet;
use tracing::debug;
use url::Url;

/// 获取并解析一个目录页
///
/// 页面中没有任何链接时返回 `WallError::Parse`；
/// 排序链接 (`?C=N;O=D`)、锚点和无法解析的地址会被丢弃，重复链接只保留第一次出现。
pub async fn list_directory<F: Fetcher + ?Sized>(
    fetcher: &F,
    url: &Url,
    image_extension: &str,
) -> Result<Vec<DirectoryEntry>> {
    let html = fetcher.get_text(url).await?;
    let hrefs = extract_hrefs(&html);
    if hrefs.is_empty() {
        return Err(WallError::Parse {
            url: url.to_string(),
        });
    }

    let mut seen = HashSet::new();
    let entries: Vec<DirectoryEntry> = hrefs
        .iter()
        .filter_map(|href| classify(url, href, image_extension))
        .filter(|entry| seen.insert(entry.url.clone()))
        .collect();

    debug!(%url, links = hrefs.len(), entries = entries.len(), "parsed directory listing");
    Ok(entries)
}

/// 按文档顺序提取所有 `<a href>` 的目标
fn extract_hrefs(html: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let Ok(selector) = Selector::parse("a[href]") else {
        return Vec::new();
    };
    document
        .select(&selector)
        .filter_map(|a| a.value().attr("href"))
        .map(|href| href.trim().to_string())
        .filter(|href| !href.is_empty())
        .collect()
}

fn classify(base: &Url, href: &str, image_extension: &str) -> Option<DirectoryEntry> {
    if href.starts_with('?') || href.starts_with('#') {
        return None;
    }
    let mut url = base.join(href).ok()?;
    if !matches!(url.scheme(), "http" | "https" | "file") {
        return None;
    }
    // ./?C=M;O=A 之类的排序链接指向当前目录本身
    if url.query().is_some() {
        return None;
    }
    url.set_fragment(None);

    let path = url.path();
    if let Some(dir) = path.strip_suffix('/') {
        let name = dir.rsplit('/').next().unwrap_or_default().to_string();
        return Some(DirectoryEntry {
            name,
            url,
            kind: EntryKind::Subdirectory,
        });
    }

    let name = path.rsplit('/').next().unwrap_or_default().to_string();
    let suffix = format!(".{}", image_extension.trim_start_matches('.').to_ascii_lowercase());
    let kind = if name.to_ascii_lowercase().ends_with(&suffix) {
        EntryKind::Image
    } else {
        EntryKind::Other
    };
    Some(DirectoryEntry { name, url, kind })
}
