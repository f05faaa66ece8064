// testing.rs — 测试用的内存 Fetcher

use crate::error::{Result, WallError};
use crate::fetch::Fetcher;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use url::Url;

/// 按 URL 预设响应，并记录每次调用
#[derive(Default)]
pub struct ScriptedFetcher {
    pages: HashMap<String, String>,
    head_sizes: HashMap<String, u64>,
    get_sizes: HashMap<String, u64>,
    bodies: HashMap<String, Vec<u8>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedFetcher {
    pub fn page(mut self, url: &str, html: &str) -> Self {
        self.pages.insert(url.to_string(), html.to_string());
        self
    }

    /// 生成一个 Apache/ERDDAP 风格的目录页
    pub fn listing(self, url: &str, hrefs: &[&str]) -> Self {
        let rows: String = hrefs
            .iter()
            .map(|h| format!("<tr><td><a href=\"{h}\">{h}</a></td></tr>\n"))
            .collect();
        let html = format!(
            "<html><body><table>\n<tr><th><a href=\"?C=N;O=D\">Name</a></th></tr>\n{rows}</table></body></html>"
        );
        self.page(url, &html)
    }

    pub fn head_size(mut self, url: &str, size: u64) -> Self {
        self.head_sizes.insert(url.to_string(), size);
        self
    }

    pub fn get_size(mut self, url: &str, size: u64) -> Self {
        self.get_sizes.insert(url.to_string(), size);
        self
    }

    pub fn body(mut self, url: &str, bytes: Vec<u8>) -> Self {
        self.bodies.insert(url.to_string(), bytes);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, verb: &str) -> usize {
        self.calls()
            .iter()
            .filter(|c| c.split(' ').next() == Some(verb))
            .count()
    }

    fn record(&self, verb: &str, url: &Url) {
        self.calls.lock().unwrap().push(format!("{verb} {url}"));
    }
}

#[async_trait]
impl Fetcher for ScriptedFetcher {
    async fn get_text(&self, url: &Url) -> Result<String> {
        self.record("LIST", url);
        self.pages
            .get(url.as_str())
            .cloned()
            .ok_or_else(|| WallError::network(url.as_str(), "404 Not Found"))
    }

    async fn head_size(&self, url: &Url) -> Result<Option<u64>> {
        self.record("HEAD", url);
        Ok(self.head_sizes.get(url.as_str()).copied())
    }

    async fn get_size(&self, url: &Url) -> Result<Option<u64>> {
        self.record("PROBE", url);
        Ok(self.get_sizes.get(url.as_str()).copied())
    }

    async fn get_bytes(&self, url: &Url) -> Result<Vec<u8>> {
        self.record("GET", url);
        self.bodies
            .get(url.as_str())
            .cloned()
            .ok_or_else(|| WallError::Download {
                url: url.to_string(),
                reason: "404 Not Found".to_string(),
            })
    }
}
