// size.rs — 在候选中挑选体积最大的图片

use super::Candidate;
use crate::fetch::Fetcher;
use tracing::debug;
use url::Url;

/// 先 HEAD，拿不到 Content-Length（或为 0）时再用 GET 的响应头
///
/// 探测失败只当作“没有大小信息”，不会让整次运行失败。
pub async fn probe_size<F: Fetcher + ?Sized>(fetcher: &F, url: &Url) -> Option<u64> {
    let head = match fetcher.head_size(url).await {
        Ok(size) => size.filter(|s| *s > 0),
        Err(e) => {
            debug!(%url, error = %e, "HEAD probe failed");
            None
        }
    };
    if head.is_some() {
        return head;
    }

    match fetcher.get_size(url).await {
        Ok(size) => size.filter(|s| *s > 0),
        Err(e) => {
            debug!(%url, error = %e, "GET probe failed");
            None
        }
    }
}

/// 返回体积最大的候选；大小相同保留靠前的，全部未知时返回第一个
pub async fn select_largest<F: Fetcher + ?Sized>(
    fetcher: &F,
    candidates: Vec<Candidate>,
) -> Option<Candidate> {
    let mut best: Option<Candidate> = None;
    let mut first: Option<Candidate> = None;

    for mut candidate in candidates {
        candidate.size = probe_size(fetcher, &candidate.url).await;
        debug!(url = %candidate.url, size = ?candidate.size, "probed candidate");

        if first.is_none() {
            first = Some(candidate.clone());
        }
        let larger = match (&best, candidate.size) {
            (_, None) => false,
            (None, Some(_)) => true,
            (Some(current), Some(size)) => size > current.size.unwrap_or(0),
        };
        if larger {
            best = Some(candidate);
        }
    }

    best.or(first)
}
