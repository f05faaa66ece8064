// source/mod.rs — 图片来源模块入口
// 读取目录列表页，挑选最新且最大的图片

pub mod listing;
pub mod recency;
pub mod size;

use url::Url;

/// 目录项的类别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Image,
    Subdirectory,
    Other,
}

/// 目录页中的一条链接
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryEntry {
    /// 链接目标的最后一段路径（子目录不含结尾的 /）
    pub name: String,
    /// 相对于目录页解析后的绝对地址
    pub url: Url,
    pub kind: EntryKind,
}

/// 一次挑选过程中的候选图片
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub url: Url,
    /// 探测到的字节数
    pub size: Option<u64>,
}

impl Candidate {
    pub fn new(url: Url) -> Self {
        Self { url, size: None }
    }
}
