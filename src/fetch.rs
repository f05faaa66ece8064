// fetch.rs — HTTP 访问抽象
// 所有网络请求都经过 Fetcher trait，测试时替换为内存实现

use crate::config::HttpConfig;
use crate::error::{Result, WallError};
use async_trait::async_trait;
use reqwest::header::CONTENT_LENGTH;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// 目录抓取与图片下载所需的全部网络操作
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// GET 并返回文本内容，非 2xx 状态视为 Network 错误
    async fn get_text(&self, url: &Url) -> Result<String>;

    /// HEAD 请求中的 Content-Length
    async fn head_size(&self, url: &Url) -> Result<Option<u64>>;

    /// GET 请求响应头中的 Content-Length，不读取响应体
    async fn get_size(&self, url: &Url) -> Result<Option<u64>>;

    /// 下载完整内容，非 2xx 状态视为 Download 错误
    async fn get_bytes(&self, url: &Url) -> Result<Vec<u8>>;
}

/// 基于 reqwest 的实现，每类请求使用各自的超时
pub struct HttpFetcher {
    /// HTTP 客户端（内部有连接池，应复用）
    client: reqwest::Client,
    listing_timeout: Duration,
    probe_timeout: Duration,
    download_timeout: Duration,
}

impl HttpFetcher {
    pub fn new(config: &HttpConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(|e| WallError::Config(format!("http client: {e}")))?;
        Ok(Self {
            client,
            listing_timeout: Duration::from_secs(config.listing_timeout_secs),
            probe_timeout: Duration::from_secs(config.probe_timeout_secs),
            download_timeout: Duration::from_secs(config.download_timeout_secs),
        })
    }
}

/// 直接读取响应头；reqwest 的 content_length() 对 HEAD 响应返回 0
fn header_length(response: &reqwest::Response) -> Option<u64> {
    response
        .headers()
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn get_text(&self, url: &Url) -> Result<String> {
        debug!(%url, "listing");
        let response = self
            .client
            .get(url.clone())
            .timeout(self.listing_timeout)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| WallError::network(url.as_str(), e))?;
        response
            .text()
            .await
            .map_err(|e| WallError::network(url.as_str(), e))
    }

    async fn head_size(&self, url: &Url) -> Result<Option<u64>> {
        let response = self
            .client
            .head(url.clone())
            .timeout(self.probe_timeout)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| WallError::network(url.as_str(), e))?;
        Ok(header_length(&response))
    }

    async fn get_size(&self, url: &Url) -> Result<Option<u64>> {
        // send() 在收到响应头后返回，丢弃 response 即中止响应体传输
        let response = self
            .client
            .get(url.clone())
            .timeout(self.probe_timeout)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| WallError::network(url.as_str(), e))?;
        Ok(header_length(&response))
    }

    async fn get_bytes(&self, url: &Url) -> Result<Vec<u8>> {
        let download_err = |e: reqwest::Error| WallError::Download {
            url: url.to_string(),
            reason: e.to_string(),
        };
        let response = self
            .client
            .get(url.clone())
            .timeout(self.download_timeout)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(download_err)?;
        let bytes = response.bytes().await.map_err(download_err)?;
        Ok(bytes.to_vec())
    }
}
