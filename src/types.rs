use crate::block_number::BlockNumber;
use crate::error::{ExplorerError, ExplorerResult};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

/// Untyped payload (`args`, event `data`, log `value`), kept verbatim for display.
pub type Payload = serde_json::Value;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub number: BlockNumber,
    pub hash: String,
    #[serde(rename = "parenthash")]
    pub parent_hash: String,
    #[serde(rename = "stateroot", default)]
    pub state_root: String,
    #[serde(rename = "extrinsicsroot", default)]
    pub extrinsics_root: String,
    /// Epoch milliseconds.
    pub timestamp: i64,
    #[serde(rename = "authorid", default)]
    pub author_id: String,
    #[serde(default)]
    pub finalized: bool,
    #[serde(default)]
    pub extrinsics_count: u64,
    #[serde(default)]
    pub events_count: u64,
    #[serde(default)]
    pub logs_count: u64,
}

/// `<blockNumber>-<position>` identifier of an extrinsic.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ExtrinsicIndex {
    pub block: BlockNumber,
    pub position: u32,
}

impl ExtrinsicIndex {
    pub fn new(block: BlockNumber, position: u32) -> Self {
        Self { block, position }
    }

    pub fn next(&self) -> Self {
        Self::new(self.block.clone(), self.position.saturating_add(1))
    }

    pub fn prev(&self) -> Option<Self> {
        self.position
            .checked_sub(1)
            .map(|p| Self::new(self.block.clone(), p))
    }
}

impl FromStr for ExtrinsicIndex {
    type Err = ExplorerError;

    fn from_str(s: &str) -> ExplorerResult<Self> {
        let (block, pos) = s
            .split_once('-')
            .ok_or_else(|| ExplorerError::invalid_format(format!("extrinsic index '{s}' has no '-'")))?;
        let block = BlockNumber::parse(block)?;
        let position = pos.parse::<u32>().map_err(|_| {
            ExplorerError::invalid_format(format!("extrinsic position '{pos}' is not a number"))
        })?;
        Ok(Self { block, position })
    }
}

impl fmt::Display for ExtrinsicIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.block, self.position)
    }
}

impl Serialize for ExtrinsicIndex {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ExtrinsicIndex {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodRef {
    pub pallet: String,
    pub method: String,
}

impl fmt::Display for MethodRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.pallet, self.method)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Extrinsic {
    pub index: ExtrinsicIndex,
    pub method: MethodRef,
    #[serde(
        rename = "signature",
        default,
        deserialize_with = "de_signer",
        serialize_with = "ser_signer"
    )]
    pub signer: Option<String>,
    #[serde(default)]
    pub success: bool,
    #[serde(rename = "pays_fee", default)]
    pub pays_fee: bool,
    #[serde(default)]
    pub hash: Option<String>,
    #[serde(default)]
    pub nonce: Option<String>,
    #[serde(default)]
    pub tip: Option<String>,
    #[serde(default)]
    pub args: Payload,
}

// Wire shape is `signature: { signer: { id } } | null`.
#[derive(Deserialize, Serialize)]
struct WireSignature {
    signer: Option<WireSigner>,
}

#[derive(Deserialize, Serialize)]
struct WireSigner {
    id: String,
}

fn de_signer<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    let sig = Option::<WireSignature>::deserialize(deserializer)?;
    Ok(sig.and_then(|s| s.signer).map(|s| s.id))
}

fn ser_signer<S: serde::Serializer>(signer: &Option<String>, serializer: S) -> Result<S::Ok, S::Error> {
    signer
        .as_ref()
        .map(|id| WireSignature {
            signer: Some(WireSigner { id: id.clone() }),
        })
        .serialize(serializer)
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EventSource {
    Extrinsic,
    OnInitialize,
    OnFinalize,
    Other(String),
}

impl From<String> for EventSource {
    fn from(s: String) -> Self {
        match s.as_str() {
            "extrinsic" => EventSource::Extrinsic,
            "onInitialize" => EventSource::OnInitialize,
            "onFinalize" => EventSource::OnFinalize,
            _ => EventSource::Other(s),
        }
    }
}

impl EventSource {
    pub fn as_str(&self) -> &str {
        match self {
            EventSource::Extrinsic => "extrinsic",
            EventSource::OnInitialize => "onInitialize",
            EventSource::OnFinalize => "onFinalize",
            EventSource::Other(s) => s,
        }
    }
}

impl Serialize for EventSource {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for EventSource {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(EventSource::from)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub pallet: String,
    pub method: String,
    #[serde(default)]
    pub data: Payload,
    pub source: EventSource,
    #[serde(default, alias = "extrinsic_id")]
    pub extrinsic_index: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    #[serde(rename = "type")]
    pub kind: String,
    pub index: String,
    #[serde(default)]
    pub value: Payload,
}

/// One page of a paginated sub-resource.
#[derive(Clone, Debug, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub total_pages: u64,
}

impl<T> Page<T> {
    /// A page holding a complete, unpaginated list.
    pub fn whole(items: Vec<T>) -> Self {
        let total = items.len() as u64;
        Self {
            items,
            total,
            total_pages: u64::from(total > 0),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetBalance {
    #[serde(rename = "assetId", alias = "asset_id")]
    pub asset_id: String,
    pub balance: String,
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default)]
    pub decimals: Option<u32>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountBalances {
    pub account_id: String,
    #[serde(default)]
    pub balances: Vec<AssetBalance>,
}

/// Filter for the "search blocks" operation. Empty fields are left out of the query.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BlockSearch {
    pub number: Option<BlockNumber>,
    pub hash: Option<String>,
    pub author: Option<String>,
    pub finalized_only: bool,
}

impl BlockSearch {
    /// Free text that is neither a number nor a hash is matched against block authors.
    pub fn from_free_text(text: &str) -> Self {
        let text = text.trim();
        Self {
            author: (!text.is_empty()).then(|| text.to_string()),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.query_pairs().is_empty()
    }

    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut q = Vec::new();
        if let Some(n) = &self.number {
            q.push(("block_number", n.to_string()));
        }
        if let Some(h) = self.hash.as_deref().filter(|h| !h.is_empty()) {
            q.push(("hash", h.to_string()));
        }
        if let Some(a) = self.author.as_deref().filter(|a| !a.is_empty()) {
            q.push(("author", a.to_string()));
        }
        if self.finalized_only {
            q.push(("finalized", "true".to_string()));
        }
        q
    }
}
