//! Per-address view of a detailed transaction.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::transaction::detailed::DetailedTransaction;

/// Where a watched address appears in one transaction.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AddressIndexes {
    pub input_indexes: Vec<usize>,
    pub output_indexes: Vec<usize>,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct AddressDetails {
    pub addresses: BTreeMap<String, AddressIndexes>,
    /// Net effect on the watched addresses: received minus spent.
    pub satoshis: i64,
}

/// History item: a transaction plus how it touches the queried addresses.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AddressDetailedTransaction {
    pub addresses: BTreeMap<String, AddressIndexes>,
    pub satoshis: i64,
    pub confirmations: u64,
    pub tx: DetailedTransaction,
}

/// Collect input/output positions and the net amount for `addresses` only.
pub fn address_details(tx: &DetailedTransaction, addresses: &[String]) -> AddressDetails {
    let mut details = AddressDetails::default();
    let watched = |address: Option<&str>| -> Option<String> {
        address
            .filter(|a| addresses.iter().any(|w| w == a))
            .map(str::to_string)
    };

    for (index, input) in tx.inputs.iter().enumerate() {
        if let Some(address) = watched(input.address()) {
            details.satoshis -= input.satoshis();
            details
                .addresses
                .entry(address)
                .or_default()
                .input_indexes
                .push(index);
        }
    }
    for (index, output) in tx.outputs.iter().enumerate() {
        if let Some(address) = watched(output.address.as_deref()) {
            details.satoshis += output.satoshis;
            details
                .addresses
                .entry(address)
                .or_default()
                .output_indexes
                .push(index);
        }
    }
    details
}
