use anyhow::{Context as _, anyhow};
use bytes::Bytes;
use reqwest::header::{CONTENT_TYPE, HeaderValue};
use serde::Serialize;
use url::Url;

#[derive(Clone)]
pub struct Fetcher {
    client: reqwest::Client,
}

impl Fetcher {
    pub fn new(user_agent: &str) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .context("build reqwest client")?;
        Ok(Self { client })
    }

    pub async fn get_bytes(&self, url: Url) -> anyhow::Result<Bytes> {
        let resp = self
            .client
            .get(url.clone())
            .send()
            .await
            .with_context(|| format!("GET {}", url))?;

        let status = resp.status();
        if !status.is_success() {
            tracing::warn!(%status, %url, "request rejected");
            return Err(anyhow!("GET {} failed with status {}", url, status));
        }

        let bytes = resp.bytes().await.context("read response body")?;
        tracing::debug!(%url, bytes = bytes.len(), "GET ok");
        Ok(bytes)
    }

    /// POSTs `body` as JSON and returns the raw response body.
    pub async fn post_json<T: Serialize + ?Sized>(
        &self,
        url: Url,
        body: &T,
    ) -> anyhow::Result<Bytes> {
        let payload = serde_json::to_vec(body).context("encode request body")?;
        let resp = self
            .client
            .post(url.clone())
            .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .body(payload)
            .send()
            .await
            .with_context(|| format!("POST {}", url))?;

        let status = resp.status();
        if !status.is_success() {
            tracing::warn!(%status, %url, "request rejected");
            return Err(anyhow!("POST {} failed with status {}", url, status));
        }

        let bytes = resp.bytes().await.context("read response body")?;
        tracing::debug!(%url, bytes = bytes.len(), "POST ok");
        Ok(bytes)
    }
}
