//! RPC error definitions and the daemon's wire records.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Daemon is still loading its block index.
pub const RPC_IN_WARMUP: i64 = -28;

/// Unknown address, key or transaction (also used for "no spent info").
pub const RPC_INVALID_ADDRESS_OR_KEY: i64 = -5;

/// Errors that can occur talking to an upstream daemon.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RpcError {
    /// The daemon answered with a JSON-RPC error object.
    #[error("{message}")]
    Upstream { code: i64, message: String },

    /// Connection or HTTP level failure.
    #[error("RPC transport error: {0}")]
    Transport(String),

    /// Request timed out at the transport layer.
    #[error("RPC timeout after {0} seconds")]
    Timeout(u64),

    /// The daemon answered but the payload did not have the expected shape.
    #[error("Invalid RPC response: {0}")]
    InvalidResponse(String),

    /// The node pool is empty.
    #[error("No RPC nodes available")]
    NoNodes,
}

impl RpcError {
    pub fn upstream(code: i64, message: impl Into<String>) -> Self {
        Self::Upstream { code, message: message.into() }
    }

    /// Upstream error code, if the daemon produced one.
    pub fn code(&self) -> Option<i64> {
        match self {
            RpcError::Upstream { code, .. } => Some(*code),
            _ => None,
        }
    }

    pub fn is_warmup(&self) -> bool {
        self.code() == Some(RPC_IN_WARMUP)
    }
}

/// Result type for RPC operations.
pub type RpcResult<T> = Result<T, RpcError>;

/// Confirmed unspent output as returned by `getaddressutxos`.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AddressUtxo {
    pub address: String,
    pub txid: String,
    pub output_index: u32,
    pub script: String,
    pub satoshis: i64,
    pub height: u64,
}

/// One `getaddressmempool` entry.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct MempoolDelta {
    pub address: String,
    pub txid: String,
    pub index: u32,
    pub satoshis: i64,
    #[serde(default)]
    pub timestamp: u64,
    /// Previous output consumed by this delta, when it is a spend.
    #[serde(default)]
    pub prevtxid: Option<String>,
    #[serde(default)]
    pub prevout: Option<u32>,
    #[serde(default)]
    pub script: Option<String>,
}

/// `getaddressbalance` result.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct AddressBalance {
    pub balance: i64,
    pub received: i64,
}

/// `getblockchaininfo` subset.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct BlockchainInfo {
    pub chain: String,
    pub blocks: u64,
    pub headers: u64,
    pub bestblockhash: String,
    pub difficulty: f64,
    pub verificationprogress: f64,
    pub warnings: String,
}

/// `getnetworkinfo` subset.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct NetworkInfo {
    pub version: u64,
    pub protocolversion: u64,
    pub subversion: String,
    pub timeoffset: i64,
    pub connections: u64,
    pub relayfee: f64,
    pub warnings: String,
}

/// Verbose `getblock` / `getblockheader` record.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct VerboseBlock {
    pub hash: String,
    pub version: i64,
    pub confirmations: i64,
    pub height: u64,
    pub chainwork: String,
    pub previousblockhash: Option<String>,
    pub nextblockhash: Option<String>,
    pub merkleroot: String,
    pub time: u64,
    pub mediantime: u64,
    pub nonce: u64,
    pub bits: String,
    pub difficulty: f64,
    pub tx: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct ScriptSig {
    #[serde(default)]
    pub hex: String,
    #[serde(default)]
    pub asm: String,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct ScriptPubKey {
    #[serde(default)]
    pub hex: String,
    #[serde(default)]
    pub asm: String,
    #[serde(default)]
    pub addresses: Option<Vec<String>>,
}

/// Input of a verbose `getrawtransaction` record (address-indexed daemons add
/// `valueSat` and `address`).
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct RawInput {
    #[serde(default)]
    pub txid: Option<String>,
    #[serde(default)]
    pub vout: Option<u32>,
    #[serde(default)]
    pub sequence: u64,
    #[serde(default, rename = "scriptSig")]
    pub script_sig: Option<ScriptSig>,
    #[serde(default)]
    pub coinbase: Option<String>,
    #[serde(default, rename = "valueSat")]
    pub value_sat: Option<i64>,
    #[serde(default)]
    pub address: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct RawOutput {
    #[serde(default, rename = "valueSat")]
    pub value_sat: i64,
    #[serde(default, rename = "scriptPubKey")]
    pub script_pub_key: ScriptPubKey,
    #[serde(default, rename = "spentTxId")]
    pub spent_tx_id: Option<String>,
    #[serde(default, rename = "spentIndex")]
    pub spent_index: Option<u32>,
    #[serde(default, rename = "spentHeight")]
    pub spent_height: Option<i64>,
}

/// Verbose `getrawtransaction` record.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct RawTransaction {
    pub txid: Option<String>,
    pub hex: String,
    pub blockhash: Option<String>,
    pub height: Option<i64>,
    pub version: i64,
    pub locktime: u64,
    pub time: Option<u64>,
    pub vin: Vec<RawInput>,
    pub vout: Vec<RawOutput>,
}

impl RawTransaction {
    /// Unique input and output addresses, inputs first, in order of appearance.
    pub fn addresses(&self) -> Vec<String> {
        let mut seen: Vec<String> = Vec::new();
        let inputs = self.vin.iter().filter_map(|i| i.address.clone());
        let outputs = self
            .vout
            .iter()
            .flat_map(|o| o.script_pub_key.addresses.clone().unwrap_or_default());
        for address in inputs.chain(outputs) {
            if !seen.contains(&address) {
                seen.push(address);
            }
        }
        seen
    }
}

/// `getspentinfo` result; all fields empty when the output is unspent.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct SpentInfo {
    #[serde(default)]
    pub txid: Option<String>,
    #[serde(default)]
    pub index: Option<u32>,
    #[serde(default)]
    pub height: Option<i64>,
}
