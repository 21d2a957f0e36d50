//! Query API client.
//!
//! [`ExplorerApi`] is the black-box contract every component depends on;
//! [`HttpApi`] talks to the REST backend over a shared pooled reqwest client
//! with bounded retries on transient failures.

use crate::block_number::BlockNumber;
use crate::error::{ExplorerError, ExplorerResult};
use crate::types::{
    AccountBalances, Block, BlockSearch, Event, Extrinsic, ExtrinsicIndex, LogEntry, Page,
};
use async_trait::async_trait;
use rand::{thread_rng, Rng};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::sync::OnceLock;
use std::time::Duration;

#[async_trait]
pub trait ExplorerApi: Send + Sync {
    async fn recent_blocks(&self, limit: u32) -> ExplorerResult<Vec<Block>>;

    async fn block_by_number(&self, number: &BlockNumber) -> ExplorerResult<Block>;

    async fn block_by_hash(&self, hash: &str) -> ExplorerResult<Block>;

    async fn search_blocks(&self, query: &BlockSearch) -> ExplorerResult<Vec<Block>>;

    async fn block_extrinsics(
        &self,
        number: &BlockNumber,
        page: u32,
        page_size: u32,
        filter: Option<&ExtrinsicIndex>,
    ) -> ExplorerResult<Page<Extrinsic>>;

    async fn block_events(
        &self,
        number: &BlockNumber,
        page: u32,
        page_size: u32,
        filter: Option<&ExtrinsicIndex>,
    ) -> ExplorerResult<Page<Event>>;

    async fn block_logs(&self, number: &BlockNumber) -> ExplorerResult<Vec<LogEntry>>;

    async fn recent_extrinsics(&self, limit: u32) -> ExplorerResult<Vec<Extrinsic>>;

    async fn extrinsic_by_hash(&self, hash: &str) -> ExplorerResult<Extrinsic>;

    async fn account_balances(&self, account_id: &str) -> ExplorerResult<AccountBalances>;
}

static HTTP: OnceLock<reqwest::Client> = OnceLock::new();

fn http_client() -> &'static reqwest::Client {
    HTTP.get_or_init(|| {
        reqwest::Client::builder()
            .pool_max_idle_per_host(8)
            .tcp_nodelay(true)
            .build()
            .unwrap_or_else(|e| {
                log::warn!("[api] falling back to default http client: {e}");
                reqwest::Client::new()
            })
    })
}

fn is_transient(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

/// 300, 600, 1200, ... ms (capped at 9600) plus up to 250 ms of jitter.
fn backoff_delay_ms(attempt: u32) -> u64 {
    let base = 300u64.saturating_mul(1u64 << (attempt.clamp(1, 6) - 1));
    let jitter: u64 = thread_rng().gen_range(0..=250);
    base + jitter
}

#[derive(Deserialize)]
struct BlocksEnvelope {
    #[serde(default)]
    blocks: Vec<Block>,
}

#[derive(Deserialize)]
struct ExtrinsicsEnvelope {
    #[serde(default)]
    extrinsics: Vec<Extrinsic>,
}

#[derive(Deserialize)]
struct LogsEnvelope {
    #[serde(default)]
    logs: Vec<LogEntry>,
}

#[derive(Deserialize)]
struct PageEnvelope<T> {
    #[serde(alias = "extrinsics", alias = "events")]
    items: Vec<T>,
    #[serde(default)]
    total: u64,
    #[serde(default)]
    total_pages: u64,
}

impl<T> From<PageEnvelope<T>> for Page<T> {
    fn from(p: PageEnvelope<T>) -> Self {
        Page {
            items: p.items,
            total: p.total,
            total_pages: p.total_pages,
        }
    }
}

#[derive(Clone, Debug)]
pub struct HttpApi {
    base_url: String,
    timeout: Duration,
    retries: u32,
}

impl HttpApi {
    pub fn new(base_url: &str, timeout_ms: u64, retries: u32) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout: Duration::from_millis(timeout_ms),
            retries,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// GET `path` and decode the JSON body.
    ///
    /// 404 and a literal `null` body are reported as `NotFound(what)`.
    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
        what: &str,
    ) -> ExplorerResult<T> {
        let url = format!("{}{}", self.base_url, path);
        let mut attempt = 0u32;
        loop {
            log::debug!("[api] GET {url} attempt={attempt}");
            let res = http_client()
                .get(&url)
                .query(query)
                .timeout(self.timeout)
                .send()
                .await;

            let res = match res {
                Ok(r) => r,
                Err(e) if attempt < self.retries => {
                    attempt += 1;
                    let back_ms = backoff_delay_ms(attempt);
                    log::warn!("[api] {path} transport error, retry={attempt} backoff={back_ms}ms: {e}");
                    tokio::time::sleep(Duration::from_millis(back_ms)).await;
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            let status = res.status().as_u16();
            if status == 404 {
                return Err(ExplorerError::not_found(what));
            }
            if res.status().is_success() {
                let body = res.text().await?;
                if body.trim() == "null" {
                    return Err(ExplorerError::not_found(what));
                }
                return Ok(serde_json::from_str(&body)?);
            }
            if is_transient(status) && attempt < self.retries {
                attempt += 1;
                let back_ms = backoff_delay_ms(attempt);
                log::warn!("[api] {path} http {status}, retry={attempt} backoff={back_ms}ms");
                tokio::time::sleep(Duration::from_millis(back_ms)).await;
                continue;
            }
            let detail = res.text().await.unwrap_or_default();
            return Err(ExplorerError::http(status, error_detail(&detail)));
        }
    }
}

// FastAPI errors look like {"detail": "..."}; fall back to the raw body.
fn error_detail(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("detail").and_then(|d| d.as_str()).map(str::to_string))
        .unwrap_or_else(|| body.chars().take(200).collect())
}

fn page_query(page: u32, page_size: u32, filter: Option<&ExtrinsicIndex>) -> Vec<(&'static str, String)> {
    let mut q = vec![("page", page.to_string()), ("page_size", page_size.to_string())];
    if let Some(f) = filter {
        q.push(("extrinsic_id", f.to_string()));
    }
    q
}

#[async_trait]
impl ExplorerApi for HttpApi {
    async fn recent_blocks(&self, limit: u32) -> ExplorerResult<Vec<Block>> {
        let env: BlocksEnvelope = self
            .get_json("/blocks/recent", &[("limit", limit.to_string())], "recent blocks")
            .await?;
        Ok(env.blocks)
    }

    async fn block_by_number(&self, number: &BlockNumber) -> ExplorerResult<Block> {
        self.get_json(&format!("/blocks/{number}"), &[], &format!("block {number}"))
            .await
    }

    async fn block_by_hash(&self, hash: &str) -> ExplorerResult<Block> {
        let path = format!("/blocks/hash/{}", urlencoding::encode(hash));
        self.get_json(&path, &[], &format!("block with hash {hash}")).await
    }

    async fn search_blocks(&self, query: &BlockSearch) -> ExplorerResult<Vec<Block>> {
        let env: BlocksEnvelope = self
            .get_json("/blocks/search", &query.query_pairs(), "matching blocks")
            .await?;
        Ok(env.blocks)
    }

    async fn block_extrinsics(
        &self,
        number: &BlockNumber,
        page: u32,
        page_size: u32,
        filter: Option<&ExtrinsicIndex>,
    ) -> ExplorerResult<Page<Extrinsic>> {
        let env: PageEnvelope<Extrinsic> = self
            .get_json(
                &format!("/blocks/{number}/extrinsics"),
                &page_query(page, page_size, filter),
                &format!("block {number}"),
            )
            .await?;
        Ok(env.into())
    }

    async fn block_events(
        &self,
        number: &BlockNumber,
        page: u32,
        page_size: u32,
        filter: Option<&ExtrinsicIndex>,
    ) -> ExplorerResult<Page<Event>> {
        let env: PageEnvelope<Event> = self
            .get_json(
                &format!("/blocks/{number}/events"),
                &page_query(page, page_size, filter),
                &format!("block {number}"),
            )
            .await?;
        Ok(env.into())
    }

    async fn block_logs(&self, number: &BlockNumber) -> ExplorerResult<Vec<LogEntry>> {
        let env: LogsEnvelope = self
            .get_json(&format!("/blocks/{number}/logs"), &[], &format!("block {number}"))
            .await?;
        Ok(env.logs)
    }

    async fn recent_extrinsics(&self, limit: u32) -> ExplorerResult<Vec<Extrinsic>> {
        let env: ExtrinsicsEnvelope = self
            .get_json("/extrinsics/recent", &[("limit", limit.to_string())], "recent extrinsics")
            .await?;
        Ok(env.extrinsics)
    }

    async fn extrinsic_by_hash(&self, hash: &str) -> ExplorerResult<Extrinsic> {
        let path = format!("/extrinsics/hash/{}", urlencoding::encode(hash));
        self.get_json(&path, &[], &format!("extrinsic with hash {hash}")).await
    }

    async fn account_balances(&self, account_id: &str) -> ExplorerResult<AccountBalances> {
        let path = format!("/accounts/{}", urlencoding::encode(account_id));
        self.get_json(&path, &[], &format!("account {account_id}")).await
    }
}
