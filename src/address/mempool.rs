//! Reconciliation of confirmed address data with mempool deltas.
//!
//! # Responsibilities
//! - Sum the signed mempool balance of an address set
//! - Derive the newest-first mempool txid list
//! - Merge confirmed UTXOs with pending outputs so that nothing spent by a
//!   pending transaction is reported as unspent
//!
//! # Design Decisions
//! - Spends are collected over the whole delta batch before anything is
//!   emitted, so a chain of unconfirmed spends collapses to its last output
//! - Pending outputs come first, newest first, followed by confirmed ones

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::rpc::types::{AddressUtxo, MempoolDelta};

/// Unspent output with either a confirmed height or a mempool timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnspentOutput {
    pub address: String,
    pub txid: String,
    pub output_index: u32,
    pub script: String,
    pub satoshis: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<u64>,
}

impl From<AddressUtxo> for UnspentOutput {
    fn from(utxo: AddressUtxo) -> Self {
        Self {
            address: utxo.address,
            txid: utxo.txid,
            output_index: utxo.output_index,
            script: utxo.script,
            satoshis: utxo.satoshis,
            height: Some(utxo.height),
            timestamp: None,
        }
    }
}

/// Signed sum of all deltas.
pub fn balance_from_mempool(deltas: &[MempoolDelta]) -> i64 {
    deltas.iter().map(|d| d.satoshis).sum()
}

/// Unique txids in delta order (oldest first).
pub fn txids_from_mempool(deltas: &[MempoolDelta]) -> Vec<String> {
    let mut seen = HashSet::new();
    deltas
        .iter()
        .filter(|d| seen.insert(d.txid.as_str()))
        .map(|d| d.txid.clone())
        .collect()
}

/// Pending outputs and spends found in one delta batch.
#[derive(Debug, Default)]
struct MempoolView<'a> {
    spent: HashSet<(&'a str, u32)>,
    outputs: Vec<&'a MempoolDelta>,
}

impl<'a> MempoolView<'a> {
    fn from_deltas(deltas: &'a [MempoolDelta]) -> Self {
        let mut view = Self::default();
        for delta in deltas {
            match (&delta.prevtxid, delta.prevout) {
                (Some(prevtxid), Some(prevout)) => {
                    view.spent.insert((prevtxid.as_str(), prevout));
                }
                _ if delta.satoshis > 0 => view.outputs.push(delta),
                _ => {}
            }
        }
        view.outputs.reverse();
        view
    }

    fn is_spent(&self, txid: &str, index: u32) -> bool {
        self.spent.contains(&(txid, index))
    }
}

/// Addresses whose pending outputs carry no script and need one resolved.
pub fn addresses_needing_script(deltas: &[MempoolDelta]) -> Vec<String> {
    let view = MempoolView::from_deltas(deltas);
    let mut addresses: Vec<String> = Vec::new();
    for delta in view.outputs {
        if delta.script.is_none() && !addresses.contains(&delta.address) {
            addresses.push(delta.address.clone());
        }
    }
    addresses
}

/// Merge `confirmed` with the pending `deltas`.
///
/// `scripts` maps an address to its output script, used for pending outputs
/// whose delta carries no script of its own.
pub fn reconcile_utxos(
    confirmed: Vec<AddressUtxo>,
    deltas: &[MempoolDelta],
    scripts: &HashMap<String, String>,
) -> Vec<UnspentOutput> {
    let view = MempoolView::from_deltas(deltas);

    let pending = view.outputs.iter().map(|delta| UnspentOutput {
        address: delta.address.clone(),
        txid: delta.txid.clone(),
        output_index: delta.index,
        script: delta
            .script
            .clone()
            .or_else(|| scripts.get(&delta.address).cloned())
            .unwrap_or_default(),
        satoshis: delta.satoshis,
        height: None,
        timestamp: Some(delta.timestamp),
    });

    let mut emitted: HashSet<(String, u32)> = HashSet::new();
    let mut result = Vec::new();
    for utxo in pending.chain(confirmed.into_iter().map(UnspentOutput::from)) {
        if view.is_spent(&utxo.txid, utxo.output_index) {
            continue;
        }
        if emitted.insert((utxo.txid.clone(), utxo.output_index)) {
            result.push(utxo);
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const ADDRESS: &str = "XnQuJpAgEDNtRwoXWLfuEs69cMgCYS8rgs";
    const CONFIRMED_TX: &str = "46f24e0c274fc07708b781963576c4c5d5625d926dbb0a17fa865dcd9fe58ea0";
    const SPEND_TX: &str = "e9dcf22807db77ac0276b03cc2d3a8b03c4837db8ac6650501ef45af1c807cce";
    const MEMPOOL_SCRIPT: &str = "76a914809dc14496f99b6deb722cf46d89d22f4beb8efd88ac";

    fn confirmed(index: u32, satoshis: i64) -> AddressUtxo {
        AddressUtxo {
            address: ADDRESS.into(),
            txid: CONFIRMED_TX.into(),
            output_index: index,
            script: "76a914f399b4b8894f1153b96fce29f05e6e116eb4c21788ac".into(),
            satoshis,
            height: 207111,
        }
    }

    fn deltas(value: serde_json::Value) -> Vec<MempoolDelta> {
        serde_json::from_value(value).unwrap()
    }

    fn spend(index: u32, prevout: u32) -> serde_json::Value {
        json!({
            "txid": SPEND_TX, "satoshis": -7679241, "address": ADDRESS, "index": index,
            "timestamp": 1461342707725u64, "prevtxid": CONFIRMED_TX, "prevout": prevout
        })
    }

    fn scripts() -> HashMap<String, String> {
        HashMap::from([(ADDRESS.to_string(), MEMPOOL_SCRIPT.to_string())])
    }

    #[test]
    fn test_mempool_outputs_replace_spent_confirmed() {
        let batch = deltas(json!([
            spend(0, 1),
            {"txid": "f637384e9f81f18767ea50e00bce58fc9848b6588a1130529eebba22a410155f",
             "satoshis": 100000, "address": ADDRESS, "index": 0, "timestamp": 1461342833133u64},
            {"txid": "f71bccef3a8f5609c7f016154922adbfe0194a96fb17a798c24077c18d0a9345",
             "satoshis": 400000, "address": ADDRESS, "index": 1, "timestamp": 1461342954813u64}
        ]));
        let utxos = reconcile_utxos(vec![confirmed(1, 7679241)], &batch, &scripts());
        assert_eq!(utxos.len(), 2);
        assert_eq!(
            utxos[0],
            UnspentOutput {
                address: ADDRESS.into(),
                txid: "f71bccef3a8f5609c7f016154922adbfe0194a96fb17a798c24077c18d0a9345".into(),
                output_index: 1,
                script: MEMPOOL_SCRIPT.into(),
                satoshis: 400000,
                height: None,
                timestamp: Some(1461342954813),
            }
        );
        assert_eq!(utxos[1].output_index, 0);
        assert_eq!(utxos[1].satoshis, 100000);
    }

    #[test]
    fn test_multiple_spent_outputs() {
        let batch = deltas(json!([spend(0, 1), spend(1, 2)]));
        let utxos = reconcile_utxos(vec![confirmed(1, 7679241), confirmed(2, 7679241)], &batch, &scripts());
        assert!(utxos.is_empty());
    }

    #[test]
    fn test_three_confirmed_to_one() {
        let batch = deltas(json!([
            spend(0, 0),
            spend(0, 1),
            spend(1, 2),
            {"txid": SPEND_TX, "satoshis": 100000, "address": ADDRESS, "index": 1,
             "script": MEMPOOL_SCRIPT, "timestamp": 1461342833133u64}
        ]));
        let confirmed = vec![confirmed(0, 7679241), confirmed(1, 7679241), confirmed(2, 7679241)];
        let utxos = reconcile_utxos(confirmed, &batch, &HashMap::new());
        assert_eq!(utxos.len(), 1);
        assert_eq!(utxos[0].script, MEMPOOL_SCRIPT);
    }

    #[test]
    fn test_chained_mempool_spends_collapse() {
        let mut batch = Vec::new();
        for index in 0..3 {
            batch.push(json!({"txid": CONFIRMED_TX, "satoshis": 7679241, "address": ADDRESS,
                              "index": index, "timestamp": 1461342707724u64}));
        }
        batch.extend([spend(0, 0), spend(0, 1), spend(1, 2)]);
        batch.push(json!({"txid": SPEND_TX, "satoshis": 100000, "address": ADDRESS, "index": 1,
                          "timestamp": 1461342833133u64}));
        let utxos = reconcile_utxos(Vec::new(), &deltas(json!(batch)), &scripts());
        assert_eq!(utxos.len(), 1);
        assert_eq!(utxos[0].txid, SPEND_TX);
        assert_eq!(utxos[0].output_index, 1);
        assert_eq!(utxos[0].script, MEMPOOL_SCRIPT);
        assert_eq!(utxos[0].timestamp, Some(1461342833133));
    }

    #[test]
    fn test_zero_value_spend() {
        let mut zero = spend(0, 1);
        zero["satoshis"] = json!(0);
        let utxos = reconcile_utxos(vec![confirmed(1, 0)], &deltas(json!([zero])), &scripts());
        assert!(utxos.is_empty());
    }

    #[test]
    fn test_non_spending_mempool_keeps_confirmed() {
        let batch = deltas(json!([
            {"txid": SPEND_TX, "satoshis": 10000, "address": ADDRESS, "index": 0,
             "timestamp": 1461342707725u64}
        ]));
        let utxos = reconcile_utxos(vec![confirmed(1, 0)], &batch, &scripts());
        assert_eq!(utxos.len(), 2);
        assert_eq!(utxos[1].height, Some(207111));
    }

    #[test]
    fn test_duplicate_outputs_are_dropped() {
        let batch = deltas(json!([
            {"txid": CONFIRMED_TX, "satoshis": 7679241, "address": ADDRESS, "index": 1,
             "timestamp": 1u64}
        ]));
        let utxos = reconcile_utxos(vec![confirmed(1, 7679241)], &batch, &scripts());
        assert_eq!(utxos.len(), 1);
        assert_eq!(utxos[0].timestamp, Some(1));
    }

    #[test]
    fn test_mempool_balance_and_txids() {
        let batch = deltas(json!([
            {"txid": "a", "satoshis": 1, "address": ADDRESS, "index": 0},
            {"txid": "b", "satoshis": -900002, "address": ADDRESS, "index": 0},
            {"txid": "a", "satoshis": 0, "address": ADDRESS, "index": 1}
        ]));
        assert_eq!(balance_from_mempool(&batch), -900001);
        assert_eq!(txids_from_mempool(&batch), vec!["a", "b"]);
        assert_eq!(addresses_needing_script(&batch), vec![ADDRESS]);
    }
}
