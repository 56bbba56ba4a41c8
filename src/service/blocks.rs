//! Block lookups by hash or height.
//!
//! # Design Decisions
//! - Caches are keyed by hash only; a height is resolved to a hash on every
//!   call since the block at a height can change in a reorg

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::ServiceResult;
use crate::rpc::types::VerboseBlock;
use crate::rpc::RpcError;
use crate::service::core::ServiceCore;

/// Block argument: a height or anything else, which is treated as a hash.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum BlockRef {
    Height(u64),
    Hash(String),
}

impl BlockRef {
    /// All-digit strings are heights; other strings pass through as hashes.
    pub fn parse(arg: &str) -> Self {
        if !arg.is_empty() && arg.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(height) = arg.parse() {
                return BlockRef::Height(height);
            }
        }
        BlockRef::Hash(arg.to_string())
    }
}

impl From<u64> for BlockRef {
    fn from(height: u64) -> Self {
        BlockRef::Height(height)
    }
}

impl From<&str> for BlockRef {
    fn from(arg: &str) -> Self {
        BlockRef::parse(arg)
    }
}

impl From<String> for BlockRef {
    fn from(arg: String) -> Self {
        BlockRef::parse(&arg)
    }
}

/// Header view with the field names API consumers expect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockHeader {
    pub hash: String,
    pub version: i64,
    pub confirmations: i64,
    pub height: u64,
    pub chain_work: String,
    pub prev_hash: Option<String>,
    pub next_hash: Option<String>,
    pub merkle_root: String,
    pub time: u64,
    pub median_time: u64,
    pub nonce: u64,
    pub bits: String,
    pub difficulty: f64,
}

impl From<&VerboseBlock> for BlockHeader {
    fn from(block: &VerboseBlock) -> Self {
        Self {
            hash: block.hash.clone(),
            version: block.version,
            confirmations: block.confirmations,
            height: block.height,
            chain_work: block.chainwork.clone(),
            prev_hash: block.previousblockhash.clone(),
            next_hash: block.nextblockhash.clone(),
            merkle_root: block.merkleroot.clone(),
            time: block.time,
            median_time: block.mediantime,
            nonce: block.nonce,
            bits: block.bits.clone(),
            difficulty: block.difficulty,
        }
    }
}

/// Header view plus the block's txids.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockOverview {
    #[serde(flatten)]
    pub header: BlockHeader,
    pub txids: Vec<String>,
}

/// Resolve heights through `getblockhash`; hashes are returned unchanged.
pub async fn maybe_get_block_hash(
    core: &ServiceCore,
    block: impl Into<BlockRef>,
) -> ServiceResult<String> {
    match block.into() {
        BlockRef::Height(height) => Ok(core.pool.request("getblockhash", vec![json!(height)]).await?),
        BlockRef::Hash(hash) => Ok(hash),
    }
}

/// Serialized block bytes.
pub async fn raw_block(core: &ServiceCore, block: impl Into<BlockRef>) -> ServiceResult<Vec<u8>> {
    let hash = maybe_get_block_hash(core, block).await?;
    let caches = &core.caches;
    let hex_block = match caches.lookup(&caches.raw_block, &hash) {
        Some(hex_block) => hex_block,
        None => {
            let generation = caches.generation();
            let hex_block: String = core
                .pool
                .request("getblock", vec![json!(hash), json!(false)])
                .await?;
            caches.store(&caches.raw_block, generation, hash, hex_block.clone());
            hex_block
        }
    };
    let bytes = hex::decode(&hex_block)
        .map_err(|e| RpcError::InvalidResponse(format!("getblock: {}", e)))?;
    Ok(bytes)
}

pub async fn block_overview(
    core: &ServiceCore,
    block: impl Into<BlockRef>,
) -> ServiceResult<BlockOverview> {
    let hash = maybe_get_block_hash(core, block).await?;
    let caches = &core.caches;
    let verbose = match caches.lookup(&caches.block, &hash) {
        Some(verbose) => verbose,
        None => {
            let generation = caches.generation();
            let verbose: VerboseBlock = core
                .pool
                .request("getblock", vec![json!(hash), json!(true)])
                .await?;
            caches.store(&caches.block, generation, hash, verbose.clone());
            verbose
        }
    };
    Ok(BlockOverview {
        header: BlockHeader::from(&verbose),
        txids: verbose.tx,
    })
}

pub async fn block_header(
    core: &ServiceCore,
    block: impl Into<BlockRef>,
) -> ServiceResult<BlockHeader> {
    let hash = maybe_get_block_hash(core, block).await?;
    header_by_hash(core, hash).await
}

async fn header_by_hash(core: &ServiceCore, hash: String) -> ServiceResult<BlockHeader> {
    let caches = &core.caches;
    if let Some(verbose) = caches.lookup(&caches.block_header, &hash) {
        return Ok(BlockHeader::from(&verbose));
    }
    let generation = caches.generation();
    let verbose: VerboseBlock = core
        .pool
        .request("getblockheader", vec![json!(hash)])
        .await?;
    let header = BlockHeader::from(&verbose);
    caches.store(&caches.block_header, generation, hash, verbose);
    Ok(header)
}

/// Up to `count` consecutive headers starting at `block`, following
/// `nextblockhash` and stopping early at the tip.
pub async fn block_headers(
    core: &ServiceCore,
    block: impl Into<BlockRef>,
    count: usize,
) -> ServiceResult<Vec<BlockHeader>> {
    let mut next = Some(maybe_get_block_hash(core, block).await?);
    let mut headers = Vec::with_capacity(count);
    while headers.len() < count {
        let Some(hash) = next.take() else { break };
        let header = header_by_hash(core, hash).await?;
        next = header.next_hash.clone();
        headers.push(header);
    }
    Ok(headers)
}

/// Block hashes with timestamps in `[low, high]`.
pub async fn block_hashes_by_timestamp(
    core: &ServiceCore,
    high: u64,
    low: u64,
) -> ServiceResult<Vec<String>> {
    Ok(core
        .pool
        .request("getblockhashes", vec![json!(high), json!(low)])
        .await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServiceConfig;
    use crate::rpc::mock::MockRpc;
    use std::sync::Arc;
    use std::time::Duration;

    const BLOCK_HASH: &str = "00000000050a6d07f583beba2d803296eb1e9d4980c4a20f206c584e89a4f02b";

    fn core_with(mock: &Arc<MockRpc>) -> Arc<ServiceCore> {
        let core = ServiceCore::new(ServiceConfig::default());
        core.pool.register(mock.clone(), None, false);
        core
    }

    fn fast_core() -> Arc<ServiceCore> {
        let mut config = ServiceConfig::default();
        config.timing.try_all_interval_ms = 1;
        ServiceCore::new(config)
    }

    fn header_json(hash: &str, height: u64, next: Option<&str>) -> serde_json::Value {
        json!({
            "hash": hash,
            "version": 536870912,
            "confirmations": 5,
            "height": height,
            "chainwork": "00000000000000000000000000000000000000000000000ad467352c93bc6a3b",
            "previousblockhash": "0000000000000504235b2aff578a48470dbf6b94dafa9b3703bbf0ed554c9dd9",
            "nextblockhash": next,
            "merkleroot": "124e0f3fb5aa268f102b0447002dd9700988fc570efcb3e0b5b396ac7db437a9",
            "time": 1462979126,
            "mediantime": 1462976771,
            "nonce": 2981820714u64,
            "bits": "1a13ca10",
            "difficulty": 847779.0710240941
        })
    }

    #[test]
    fn test_block_ref_parse() {
        assert_eq!(BlockRef::parse("10"), BlockRef::Height(10));
        assert_eq!(BlockRef::parse("109a"), BlockRef::Hash("109a".into()));
        assert_eq!(
            BlockRef::parse("8oUSpiq5REeEKAzS1qSXoJbZ9TRfH1L6mi"),
            BlockRef::Hash("8oUSpiq5REeEKAzS1qSXoJbZ9TRfH1L6mi".into())
        );
        assert_eq!(BlockRef::from(7u64), BlockRef::Height(7));
    }

    #[tokio::test]
    async fn test_maybe_get_block_hash() {
        let mock = MockRpc::new();
        mock.on("getblockhash", Ok(json!("blockhash")));
        let core = core_with(&mock);

        assert_eq!(maybe_get_block_hash(&core, "109a").await.unwrap(), "109a");
        assert_eq!(mock.calls("getblockhash"), 0);
        assert_eq!(maybe_get_block_hash(&core, "10").await.unwrap(), "blockhash");
        assert_eq!(maybe_get_block_hash(&core, 10u64).await.unwrap(), "blockhash");
        assert_eq!(mock.calls("getblockhash"), 2);
    }

    #[tokio::test]
    async fn test_maybe_get_block_hash_tries_other_node() {
        let core = fast_core();
        let failing = MockRpc::new();
        failing.on("getblockhash", Err(RpcError::upstream(-1, "test")));
        let healthy = MockRpc::new();
        healthy.on("getblockhash", Ok(json!("blockhash")));
        core.pool.register(failing.clone(), None, false);
        core.pool.register(healthy.clone(), None, false);

        assert_eq!(maybe_get_block_hash(&core, 10u64).await.unwrap(), "blockhash");
        assert_eq!(failing.calls("getblockhash") + healthy.calls("getblockhash"), 2);
    }

    #[tokio::test]
    async fn test_raw_block_cached_by_hash() {
        let mock = MockRpc::new();
        mock.on("getblock", Ok(json!("0100ff")));
        mock.on("getblockhash", Ok(json!(BLOCK_HASH)));
        let core = core_with(&mock);

        assert_eq!(raw_block(&core, BLOCK_HASH).await.unwrap(), vec![0x01, 0x00, 0xff]);
        assert_eq!(raw_block(&core, 0u64).await.unwrap(), vec![0x01, 0x00, 0xff]);
        assert_eq!(mock.calls("getblock"), 1);
        assert_eq!(mock.calls("getblockhash"), 1);
        assert_eq!(mock.params("getblock")[0], vec![json!(BLOCK_HASH), json!(false)]);
    }

    #[tokio::test]
    async fn test_raw_block_failover() {
        let core = fast_core();
        let failing = MockRpc::new();
        failing.on("getblock", Err(RpcError::upstream(-1, "Test error")));
        let healthy = MockRpc::new();
        healthy.on("getblock", Ok(json!("00")));
        core.pool.register(failing.clone(), None, false);
        core.pool.register(failing.clone(), None, false);
        core.pool.register(healthy.clone(), None, false);

        let started = tokio::time::Instant::now();
        raw_block(&core, BLOCK_HASH).await.unwrap();
        assert_eq!(failing.calls("getblock"), 2);
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_block_overview() {
        let mock = MockRpc::new();
        let mut block = header_json(BLOCK_HASH, 828781, Some("00000000000000eedd967ec155f237f033686f0924d574b946caf1b0e89551b8"));
        block["tx"] = json!(["aa", "bb"]);
        mock.on("getblock", Ok(block));
        let core = core_with(&mock);

        for _ in 0..2 {
            let overview = block_overview(&core, BLOCK_HASH).await.unwrap();
            assert_eq!(overview.header.height, 828781);
            assert_eq!(overview.header.nonce, 2981820714);
            assert_eq!(overview.header.chain_work, "00000000000000000000000000000000000000000000000ad467352c93bc6a3b");
            assert_eq!(overview.txids, vec!["aa", "bb"]);
        }
        assert_eq!(mock.calls("getblock"), 1);

        let view = serde_json::to_value(block_overview(&core, BLOCK_HASH).await.unwrap()).unwrap();
        assert_eq!(view["prevHash"], "0000000000000504235b2aff578a48470dbf6b94dafa9b3703bbf0ed554c9dd9");
        assert_eq!(view["medianTime"], 1462976771);
        assert_eq!(view["txids"], json!(["aa", "bb"]));
    }

    #[tokio::test]
    async fn test_block_header_from_height() {
        let mock = MockRpc::new();
        mock.on("getblockhash", Ok(json!(BLOCK_HASH)));
        mock.on("getblockheader", Ok(header_json(BLOCK_HASH, 828781, None)));
        let core = core_with(&mock);

        let header = block_header(&core, 0u64).await.unwrap();
        assert_eq!(header.hash, BLOCK_HASH);
        assert_eq!(header.merkle_root, "124e0f3fb5aa268f102b0447002dd9700988fc570efcb3e0b5b396ac7db437a9");
        assert_eq!(header.next_hash, None);
        assert_eq!(mock.params("getblockheader")[0], vec![json!(BLOCK_HASH)]);
    }

    #[tokio::test]
    async fn test_block_headers_follow_next_hash() {
        let mock = MockRpc::new();
        mock.once("getblockheader", Ok(header_json("h1", 1, Some("h2"))));
        mock.once("getblockheader", Ok(header_json("h2", 2, Some("h3"))));
        mock.once("getblockheader", Ok(header_json("h3", 3, None)));
        let core = core_with(&mock);

        let headers = block_headers(&core, "h1", 25).await.unwrap();
        let hashes: Vec<_> = headers.iter().map(|h| h.hash.as_str()).collect();
        assert_eq!(hashes, vec!["h1", "h2", "h3"]);

        core.caches.reset_all();
        mock.once("getblockheader", Ok(header_json("h1", 1, Some("h2"))));
        mock.once("getblockheader", Ok(header_json("h2", 2, Some("h3"))));
        let headers = block_headers(&core, "h1", 2).await.unwrap();
        assert_eq!(headers.len(), 2);
    }

    #[tokio::test]
    async fn test_block_hashes_by_timestamp() {
        let mock = MockRpc::new();
        mock.on("getblockhashes", Ok(json!(["b2", "b1"])));
        let core = core_with(&mock);
        let hashes = block_hashes_by_timestamp(&core, 1441914000, 1441911000).await.unwrap();
        assert_eq!(hashes, vec!["b2", "b1"]);
        assert_eq!(mock.params("getblockhashes")[0], vec![json!(1441914000), json!(1441911000)]);

        mock.on("getblockhashes", Err(RpcError::upstream(-1, "error")));
        let err = block_hashes_by_timestamp(&core, 1, 0).await.unwrap_err();
        assert_eq!(err.to_string(), "error");
    }
}
