//! Chain-wide queries and pass-through commands.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::ServiceResult;
use crate::rpc::types::{BlockchainInfo, NetworkInfo, SpentInfo, RPC_INVALID_ADDRESS_OR_KEY};
use crate::service::core::ServiceCore;

/// Output whose spender is looked up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutPoint {
    pub txid: String,
    pub index: u32,
}

/// Merged network and blockchain info.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainInfo {
    pub version: u64,
    pub protocol_version: u64,
    pub blocks: u64,
    pub time_offset: i64,
    pub connections: u64,
    pub difficulty: f64,
    pub network: String,
    pub relay_fee: f64,
    pub errors: String,
    pub sub_version: String,
    pub chain: String,
    pub best_block_hash: String,
}

pub async fn best_block_hash(core: &ServiceCore) -> ServiceResult<String> {
    Ok(core.pool.request("getbestblockhash", Vec::new()).await?)
}

/// Latest chain lock exactly as the daemon reports it.
pub async fn best_chain_lock(core: &ServiceCore) -> ServiceResult<Value> {
    Ok(core.pool.request("getbestchainlock", Vec::new()).await?)
}

/// Spender of `outpoint`; an unspent output yields an empty record.
pub async fn spent_info(core: &ServiceCore, outpoint: &OutPoint) -> ServiceResult<SpentInfo> {
    match core.pool.request("getspentinfo", vec![json!(outpoint)]).await {
        Ok(info) => Ok(info),
        Err(e) if e.code() == Some(RPC_INVALID_ADDRESS_OR_KEY) => Ok(SpentInfo::default()),
        Err(e) => Err(e.into()),
    }
}

pub async fn info(core: &ServiceCore) -> ServiceResult<ChainInfo> {
    let network: NetworkInfo = core.pool.request("getnetworkinfo", Vec::new()).await?;
    let chain: BlockchainInfo = core.blockchain_info().await?;
    Ok(ChainInfo {
        version: network.version,
        protocol_version: network.protocolversion,
        blocks: chain.blocks,
        time_offset: network.timeoffset,
        connections: network.connections,
        difficulty: chain.difficulty,
        network: core.config.network.name().to_string(),
        relay_fee: network.relayfee,
        errors: network.warnings,
        sub_version: network.subversion,
        chain: chain.chain,
        best_block_hash: chain.bestblockhash,
    })
}

/// Fee per kB for confirmation within `blocks`; `-1` when the daemon has no estimate.
pub async fn estimate_fee(core: &ServiceCore, blocks: u32) -> ServiceResult<f64> {
    Ok(core.pool.request("estimatefee", vec![json!(blocks)]).await?)
}

/// Broadcast a hex transaction, returning its txid.
pub async fn send_transaction(
    core: &ServiceCore,
    tx_hex: &str,
    allow_absurd_fees: bool,
) -> ServiceResult<String> {
    Ok(core
        .pool
        .request("sendrawtransaction", vec![json!(tx_hex), json!(allow_absurd_fees)])
        .await?)
}

/// Mine `blocks` blocks (regtest).
pub async fn generate_blocks(core: &ServiceCore, blocks: u32) -> ServiceResult<Vec<String>> {
    Ok(core.pool.request("generate", vec![json!(blocks)]).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Network, ServiceConfig};
    use crate::error::ServiceError;
    use crate::rpc::mock::MockRpc;
    use crate::rpc::RpcError;
    use std::sync::Arc;

    fn core_with(mock: &Arc<MockRpc>, network: Network) -> Arc<ServiceCore> {
        let core = ServiceCore::new(ServiceConfig { network, ..Default::default() });
        core.pool.register(mock.clone(), None, false);
        core
    }

    #[tokio::test]
    async fn test_spent_info() {
        let mock = MockRpc::new();
        mock.once("getspentinfo", Err(RpcError::upstream(-5, "test")));
        mock.once("getspentinfo", Err(RpcError::upstream(-1, "error")));
        mock.once("getspentinfo", Ok(json!({"txid": "txid", "index": 10, "height": 101})));
        let core = core_with(&mock, Network::Livenet);
        let outpoint = OutPoint { txid: "a".into(), index: 0 };

        assert_eq!(spent_info(&core, &outpoint).await.unwrap(), SpentInfo::default());
        let err = spent_info(&core, &outpoint).await.unwrap_err();
        assert!(matches!(err, ServiceError::Rpc(_)));
        let info = spent_info(&core, &outpoint).await.unwrap();
        assert_eq!(info.txid.as_deref(), Some("txid"));
        assert_eq!(info.index, Some(10));
        assert_eq!(info.height, Some(101));
        assert_eq!(mock.params("getspentinfo")[0], vec![json!({"txid": "a", "index": 0})]);
    }

    #[tokio::test]
    async fn test_info_merges_network_and_chain() {
        let mock = MockRpc::new();
        mock.on(
            "getnetworkinfo",
            Ok(json!({"version": 1, "protocolversion": 1, "subversion": "/Alterdotd-test:1.0.0/",
                      "timeoffset": 1, "connections": 1, "relayfee": 10, "warnings": ""})),
        );
        mock.on(
            "getblockchaininfo",
            Ok(json!({"bestblockhash": "00000000", "blocks": 1, "chain": "test", "difficulty": 1, "warnings": ""})),
        );
        let core = core_with(&mock, Network::Testnet);

        let info = info(&core).await.unwrap();
        assert_eq!(info.best_block_hash, "00000000");
        assert_eq!(info.version, 1);
        assert_eq!(info.chain, "test");
        assert_eq!(info.sub_version, "/Alterdotd-test:1.0.0/");
        assert_eq!(info.relay_fee, 10.0);
        assert_eq!(info.network, "testnet");
        assert_eq!(info.errors, "");
    }

    #[tokio::test]
    async fn test_pass_through_commands() {
        let mock = MockRpc::new();
        mock.on("estimatefee", Ok(json!(-1)));
        mock.on("sendrawtransaction", Ok(json!("txid")));
        mock.on("generate", Ok(json!(["hash"])));
        mock.on("getbestblockhash", Ok(json!("besthash")));
        mock.on(
            "getbestchainlock",
            Ok(json!({"bestchainlock": {"blockhash": "20b6", "height": 151, "known_block": true}})),
        );
        let core = core_with(&mock, Network::Regtest);

        assert_eq!(estimate_fee(&core, 1).await.unwrap(), -1.0);
        assert_eq!(send_transaction(&core, "0100", true).await.unwrap(), "txid");
        assert_eq!(mock.params("sendrawtransaction")[0], vec![json!("0100"), json!(true)]);
        assert_eq!(generate_blocks(&core, 10).await.unwrap(), vec!["hash"]);
        assert_eq!(best_block_hash(&core).await.unwrap(), "besthash");
        let lock = best_chain_lock(&core).await.unwrap();
        assert_eq!(lock["bestchainlock"]["height"], 151);
    }

    #[tokio::test]
    async fn test_chain_lock_error_is_rpc_error() {
        let mock = MockRpc::new();
        mock.on("getbestchainlock", Err(RpcError::upstream(-32603, "error")));
        let core = core_with(&mock, Network::Livenet);
        let err = best_chain_lock(&core).await.unwrap_err();
        assert_eq!(err.rpc_code(), Some(-32603));
    }
}
