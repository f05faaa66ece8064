// recency.rs — 按文件名挑选最新的图片
// 文件名中包含补零的日期时间，字符串倒序即时间倒序

use super::listing::list_directory;
use super::{Candidate, DirectoryEntry, EntryKind};
use crate::error::{Result, WallError};
use crate::fetch::Fetcher;
use std::collections::HashSet;
use tracing::{debug, warn};
use url::Url;

/// 下探参数
#[derive(Debug, Clone)]
pub struct RecencyOptions<'a> {
    /// 最多返回的候选数量
    pub limit: usize,
    /// 根目录为第 0 层，超过该层数的子目录不再展开
    pub max_depth: usize,
    pub image_extension: &'a str,
}

/// 同一目录中按文件名倒序取前 `limit` 张图片
pub fn newest_images(entries: &[DirectoryEntry], limit: usize) -> Vec<Candidate> {
    let mut images: Vec<&DirectoryEntry> = entries
        .iter()
        .filter(|e| e.kind == EntryKind::Image)
        .collect();
    images.sort_by(|a, b| b.name.cmp(&a.name));
    images
        .into_iter()
        .take(limit)
        .map(|e| Candidate::new(e.url.clone()))
        .collect()
}

/// 子目录必须严格位于当前目录之下，`../`、指回上层或只多出查询串的链接都不算
fn is_below(parent: &Url, child: &Url) -> bool {
    child.scheme() == parent.scheme()
        && child.host_str() == parent.host_str()
        && child.port_or_known_default() == parent.port_or_known_default()
        && child.query().is_none()
        && child.path().len() > parent.path().len()
        && child.path().starts_with(parent.path())
}

/// 从 `root` 开始查找最新的图片
///
/// 当前目录有图片就直接返回；否则按列表顺序依次进入子目录，返回第一个非空结果
/// （first-match，而不是比较所有子目录后取全局最新）。
/// 用显式工作栈代替递归，并以 `max_depth` 和已访问集合限制范围。
pub async fn select_recent<F: Fetcher + ?Sized>(
    fetcher: &F,
    root: &Url,
    options: &RecencyOptions<'_>,
) -> Result<Vec<Candidate>> {
    if options.limit == 0 {
        return Ok(Vec::new());
    }

    let mut stack: Vec<(Url, usize)> = vec![(root.clone(), 0)];
    let mut visited: HashSet<Url> = HashSet::new();

    while let Some((dir, depth)) = stack.pop() {
        if !visited.insert(dir.clone()) {
            continue;
        }

        let entries = match list_directory(fetcher, &dir, options.image_extension).await {
            Ok(entries) => entries,
            Err(WallError::Parse { url }) if depth > 0 => {
                warn!(%url, "subdirectory listing has no links, skipping");
                continue;
            }
            Err(e) => return Err(e),
        };

        let found = newest_images(&entries, options.limit);
        if !found.is_empty() {
            debug!(%dir, depth, count = found.len(), "found recent images");
            return Ok(found);
        }

        if depth >= options.max_depth {
            debug!(%dir, depth, "max depth reached, not descending");
            continue;
        }

        // 倒序入栈，保证按列表顺序依次访问
        let subdirs: Vec<&DirectoryEntry> = entries
            .iter()
            .filter(|e| e.kind == EntryKind::Subdirectory && is_below(&dir, &e.url))
            .collect();
        for entry in subdirs.into_iter().rev() {
            stack.push((entry.url.clone(), depth + 1));
        }
    }

    Ok(Vec::new())
}
