//! Governance objects, sporks and the masternode list.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

use crate::error::{ServiceError, ServiceResult};
use crate::rpc::RpcError;
use crate::service::core::ServiceCore;

/// Governance object kinds as encoded in `DataObject.type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GovObjectType {
    Proposal,
    Trigger,
}

impl GovObjectType {
    pub fn code(self) -> u64 {
        match self {
            GovObjectType::Proposal => 1,
            GovObjectType::Trigger => 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GovObject {
    #[serde(rename = "Hash")]
    pub hash: String,
    #[serde(rename = "DataHex")]
    pub data_hex: String,
    #[serde(rename = "DataObject")]
    pub data_object: Value,
    #[serde(rename = "AbsoluteYesCount")]
    pub absolute_yes_count: i64,
    #[serde(rename = "YesCount")]
    pub yes_count: i64,
    #[serde(rename = "NoCount")]
    pub no_count: i64,
    #[serde(rename = "AbstainCount")]
    pub abstain_count: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct RawGovObject {
    #[serde(rename = "Hash")]
    hash: String,
    #[serde(rename = "DataHex")]
    data_hex: String,
    #[serde(rename = "DataString")]
    data_string: Option<String>,
    #[serde(rename = "DataObject")]
    data_object: Option<Value>,
    #[serde(rename = "AbsoluteYesCount")]
    absolute_yes_count: i64,
    #[serde(rename = "YesCount")]
    yes_count: i64,
    #[serde(rename = "NoCount")]
    no_count: i64,
    #[serde(rename = "AbstainCount")]
    abstain_count: i64,
}

impl RawGovObject {
    /// Payload object: `DataString` is `[["proposal", {...}]]`; older daemons
    /// send `DataObject` directly.
    fn payload(&self) -> Value {
        if let Some(data) = &self.data_string {
            if let Ok(Value::Array(outer)) = serde_json::from_str::<Value>(data) {
                if let Some(object) = outer
                    .first()
                    .and_then(Value::as_array)
                    .and_then(|inner| inner.get(1))
                {
                    return object.clone();
                }
            }
        }
        self.data_object.clone().unwrap_or(Value::Null)
    }

    fn into_object(self) -> GovObject {
        let data_object = self.payload();
        GovObject {
            hash: self.hash,
            data_hex: self.data_hex,
            data_object,
            absolute_yes_count: self.absolute_yes_count,
            yes_count: self.yes_count,
            no_count: self.no_count,
            abstain_count: self.abstain_count,
        }
    }
}

/// `gobject list` answers with a map keyed by hash; accept a plain list too.
fn raw_objects(value: Value) -> ServiceResult<Vec<RawGovObject>> {
    let entries: Vec<Value> = match value {
        Value::Array(items) => items,
        Value::Object(map) => map.into_iter().map(|(_, v)| v).collect(),
        other => {
            return Err(RpcError::InvalidResponse(format!("gobject: unexpected {}", other)).into())
        }
    };
    entries
        .into_iter()
        .map(|v| {
            serde_json::from_value(v)
                .map_err(|e| ServiceError::from(RpcError::InvalidResponse(format!("gobject: {}", e))))
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SporkList {
    pub sporks: BTreeMap<String, i64>,
}

/// One row of the zipped `masternodelist` modes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MasternodeEntry {
    pub vin: String,
    pub status: String,
    pub rank: u64,
    pub ip: String,
    pub protocol: u64,
    pub payee: String,
    pub activeseconds: u64,
    pub lastseen: u64,
}

const MASTERNODE_MODES: [&str; 7] =
    ["rank", "protocol", "payee", "lastseen", "activeseconds", "addr", "status"];

const MASTERNODE_LIST_KEY: &str = "masternodelist";

pub async fn gov_object_list(
    core: &ServiceCore,
    kind: GovObjectType,
) -> ServiceResult<Vec<GovObject>> {
    let value: Value = core.pool.request("gobject", vec![json!("list")]).await?;
    let objects = raw_objects(value)?
        .into_iter()
        .map(RawGovObject::into_object)
        .filter(|o| o.data_object.get("type").and_then(Value::as_u64) == Some(kind.code()))
        .collect();
    Ok(objects)
}

pub async fn gov_object_hash(core: &ServiceCore, hash: &str) -> ServiceResult<Vec<GovObject>> {
    let raw: RawGovObject = core
        .pool
        .request("gobject", vec![json!("get"), json!(hash)])
        .await?;
    Ok(vec![raw.into_object()])
}

pub async fn spork_list(core: &ServiceCore) -> ServiceResult<SporkList> {
    let sporks = core.pool.request("spork", vec![json!("show")]).await?;
    Ok(SporkList { sporks })
}

/// Masternode list; only served by a fully synced daemon.
pub async fn masternode_list(core: &ServiceCore) -> ServiceResult<Vec<MasternodeEntry>> {
    if !core.is_synced().await? {
        return Err(ServiceError::NotSynced);
    }

    let caches = &core.caches;
    let key = MASTERNODE_LIST_KEY.to_string();
    if let Some(list) = caches.lookup(&caches.masternode_list, &key) {
        return Ok(list);
    }
    let generation = caches.generation();

    let mut modes: Vec<Map<String, Value>> = Vec::with_capacity(MASTERNODE_MODES.len());
    for mode in MASTERNODE_MODES {
        modes.push(core.pool.request("masternodelist", vec![json!(mode)]).await?);
    }
    let [rank, protocol, payee, lastseen, activeseconds, addr, status] = &modes[..] else {
        return Err(RpcError::InvalidResponse("masternodelist: missing mode".into()).into());
    };

    let list: Vec<MasternodeEntry> = rank
        .iter()
        .map(|(vin, r)| {
            let text = |m: &Map<String, Value>| {
                m.get(vin).and_then(Value::as_str).unwrap_or_default().to_string()
            };
            let number = |m: &Map<String, Value>| m.get(vin).and_then(Value::as_u64).unwrap_or(0);
            MasternodeEntry {
                vin: vin.clone(),
                status: text(status),
                rank: r.as_u64().unwrap_or(0),
                ip: text(addr),
                protocol: number(protocol),
                payee: text(payee),
                activeseconds: number(activeseconds),
                lastseen: number(lastseen),
            }
        })
        .collect();

    caches.store(&caches.masternode_list, generation, key, list.clone());
    Ok(list)
}
