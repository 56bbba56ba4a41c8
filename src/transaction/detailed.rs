//! Detailed transaction view assembled from a verbose RPC record.

use serde::{Deserialize, Serialize};

use crate::rpc::types::{RawInput, RawOutput, RawTransaction};

/// Input spending a previous output.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SpendInput {
    pub prev_tx_id: Option<String>,
    pub output_index: Option<u32>,
    pub satoshis: i64,
    pub sequence: u64,
    pub script: Option<String>,
    pub script_asm: Option<String>,
    pub address: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum DetailedInput {
    Coinbase { coinbase: String },
    Spend(SpendInput),
}

impl DetailedInput {
    pub fn address(&self) -> Option<&str> {
        match self {
            DetailedInput::Spend(input) => input.address.as_deref(),
            DetailedInput::Coinbase { .. } => None,
        }
    }

    pub fn satoshis(&self) -> i64 {
        match self {
            DetailedInput::Spend(input) => input.satoshis,
            DetailedInput::Coinbase { .. } => 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DetailedOutput {
    pub satoshis: i64,
    pub script: String,
    pub script_asm: String,
    /// Set only when the script resolves to exactly one address.
    pub address: Option<String>,
    pub spent_tx_id: Option<String>,
    pub spent_index: Option<u32>,
    pub spent_height: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DetailedTransaction {
    pub hash: String,
    pub hex: String,
    pub block_hash: Option<String>,
    /// `-1` while unconfirmed.
    pub height: i64,
    pub block_timestamp: Option<u64>,
    pub version: i64,
    pub locktime: u64,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub coinbase: bool,
    pub inputs: Vec<DetailedInput>,
    pub outputs: Vec<DetailedOutput>,
    pub input_satoshis: i64,
    pub output_satoshis: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fee_satoshis: Option<i64>,
    /// Relative to the tip at the time of the lookup.
    #[serde(default)]
    pub confirmations: u64,
}

impl DetailedTransaction {
    /// Build the view for `txid` from its verbose record.
    pub fn from_raw(txid: &str, raw: &RawTransaction) -> Self {
        let coinbase = raw.vin.iter().any(|input| input.coinbase.is_some());
        let inputs: Vec<DetailedInput> = raw.vin.iter().map(detail_input).collect();
        let outputs: Vec<DetailedOutput> = raw.vout.iter().map(detail_output).collect();

        let input_satoshis = inputs.iter().map(DetailedInput::satoshis).sum();
        let output_satoshis = outputs.iter().map(|o| o.satoshis).sum();

        Self {
            hash: raw.txid.clone().unwrap_or_else(|| txid.to_string()),
            hex: raw.hex.clone(),
            block_hash: raw.blockhash.clone(),
            height: raw.height.unwrap_or(-1),
            block_timestamp: raw.time,
            version: raw.version,
            locktime: raw.locktime,
            coinbase,
            inputs,
            outputs,
            input_satoshis,
            output_satoshis,
            fee_satoshis: (!coinbase).then(|| input_satoshis - output_satoshis),
            confirmations: 0,
        }
    }
}

fn detail_input(input: &RawInput) -> DetailedInput {
    if let Some(coinbase) = &input.coinbase {
        return DetailedInput::Coinbase {
            coinbase: coinbase.clone(),
        };
    }
    DetailedInput::Spend(SpendInput {
        prev_tx_id: input.txid.clone(),
        output_index: input.vout,
        satoshis: input.value_sat.unwrap_or(0),
        sequence: input.sequence,
        script: input.script_sig.as_ref().map(|s| s.hex.clone()),
        script_asm: input.script_sig.as_ref().map(|s| s.asm.clone()),
        address: input.address.clone(),
    })
}

fn detail_output(output: &RawOutput) -> DetailedOutput {
    let address = match output.script_pub_key.addresses.as_deref() {
        Some([single]) => Some(single.clone()),
        _ => None,
    };
    DetailedOutput {
        satoshis: output.value_sat,
        script: output.script_pub_key.hex.clone(),
        script_asm: output.script_pub_key.asm.clone(),
        address,
        spent_tx_id: output.spent_tx_id.clone(),
        spent_index: output.spent_index,
        spent_height: output.spent_height,
    }
}

/// Confirmations of a transaction at `tx_height` given the current tip.
///
/// Unconfirmed (negative height) gives 0. A transaction above the tip means the
/// tip is stale; that is logged and also reported as 0.
pub fn confirmations(tip_height: u64, tx_height: i64) -> u64 {
    if tx_height < 0 {
        return 0;
    }
    let confirmations = tip_height as i64 - tx_height + 1;
    if confirmations < 0 {
        tracing::warn!(
            tip_height,
            tx_height,
            "Negative confirmations calculated for transaction"
        );
        return 0;
    }
    confirmations as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const TXID: &str = "2d950d00494caf6bfc5fff2a3f839f0eb50f663ae85ce092bc5f9d45296ae91f";

    fn raw() -> RawTransaction {
        serde_json::from_value(json!({
            "hex": "0100",
            "blockhash": "00000000000ec715852ea2ecae4dc8563f62d603c820f81ac284cd5be0a944d6",
            "height": 530482,
            "version": 1,
            "locktime": 411451,
            "time": 1439559434000u64,
            "vin": [{
                "valueSat": 110,
                "address": "mgY65WSfEmsyYaYPQaXhmXMeBhwp4EcsQW",
                "txid": "3d003413c13eec3fa8ea1fe8bbff6f40718c66facffe2544d7516c9e2900cac2",
                "sequence": 4294967295u64,
                "vout": 0,
                "scriptSig": {"hex": "scriptSigHex", "asm": "scriptSigAsm"}
            }],
            "vout": [{
                "spentTxId": "4316b98e7504073acd19308b4b8c9f4eeb5e811455c54c0ebfe276c0b1eb6315",
                "spentIndex": 2,
                "spentHeight": 100,
                "valueSat": 100,
                "scriptPubKey": {
                    "hex": "76a914",
                    "asm": "OP_DUP",
                    "addresses": ["mgY65WSfEmsyYaYPQaXhmXMeBhwp4EcsQW"]
                }
            }]
        }))
        .unwrap()
    }

    #[test]
    fn test_all_properties() {
        let tx = DetailedTransaction::from_raw(TXID, &raw());
        assert_eq!(tx.hash, TXID);
        assert!(!tx.coinbase);
        assert_eq!(tx.height, 530482);
        assert_eq!(tx.block_timestamp, Some(1439559434000));
        assert_eq!(tx.input_satoshis, 110);
        assert_eq!(tx.output_satoshis, 100);
        assert_eq!(tx.fee_satoshis, Some(10));

        match &tx.inputs[0] {
            DetailedInput::Spend(input) => {
                assert_eq!(input.output_index, Some(0));
                assert_eq!(input.sequence, 0xFFFF_FFFF);
                assert_eq!(input.script.as_deref(), Some("scriptSigHex"));
                assert_eq!(input.script_asm.as_deref(), Some("scriptSigAsm"));
            }
            other => panic!("unexpected input {:?}", other),
        }
        let output = &tx.outputs[0];
        assert_eq!(output.address.as_deref(), Some("mgY65WSfEmsyYaYPQaXhmXMeBhwp4EcsQW"));
        assert_eq!(output.spent_index, Some(2));
        assert_eq!(output.spent_height, Some(100));
    }

    #[test]
    fn test_coinbase() {
        let mut raw = raw();
        raw.vin = vec![RawInput {
            coinbase: Some("abcdef".into()),
            ..Default::default()
        }];
        let tx = DetailedTransaction::from_raw(TXID, &raw);
        assert!(tx.coinbase);
        assert_eq!(tx.fee_satoshis, None);
        assert_eq!(tx.inputs[0], DetailedInput::Coinbase { coinbase: "abcdef".into() });

        let json = serde_json::to_value(&tx).unwrap();
        assert_eq!(json["inputs"][0], json!({"coinbase": "abcdef"}));
        assert!(json.get("feeSatoshis").is_none());
    }

    #[test]
    fn test_output_address_needs_exactly_one() {
        for addresses in [Some(vec![]), Some(vec!["one".to_string(), "two".to_string()]), None] {
            let mut raw = raw();
            raw.vout[0].script_pub_key.addresses = addresses;
            let tx = DetailedTransaction::from_raw(TXID, &raw);
            assert_eq!(tx.outputs[0].address, None);
        }
    }

    #[test]
    fn test_missing_script_sig_and_height() {
        let mut raw = raw();
        raw.vin[0].script_sig = None;
        raw.height = None;
        let tx = DetailedTransaction::from_raw(TXID, &raw);
        match &tx.inputs[0] {
            DetailedInput::Spend(input) => assert_eq!(input.script, None),
            other => panic!("unexpected input {:?}", other),
        }
        assert_eq!(tx.height, -1);
    }

    #[test]
    fn test_confirmations() {
        assert_eq!(confirmations(10, 10), 1);
        assert_eq!(confirmations(11, 10), 2);
        assert_eq!(confirmations(10, -1), 0);
        assert_eq!(confirmations(3, 10), 0);
        assert_eq!(confirmations(1000, 1), 1000);
    }
}
