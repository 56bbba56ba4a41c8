//! Address query arguments and their validation.

use serde::Deserialize;
use serde_json::Value;

use crate::error::{ServiceError, ServiceResult};

/// One address or a list of them.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum AddressArg {
    One(String),
    Many(Vec<String>),
}

impl AddressArg {
    pub fn into_list(self) -> Vec<String> {
        match self {
            AddressArg::One(address) => vec![address],
            AddressArg::Many(addresses) => addresses,
        }
    }
}

impl From<&str> for AddressArg {
    fn from(address: &str) -> Self {
        AddressArg::One(address.to_string())
    }
}

impl From<String> for AddressArg {
    fn from(address: String) -> Self {
        AddressArg::One(address)
    }
}

impl From<Vec<String>> for AddressArg {
    fn from(addresses: Vec<String>) -> Self {
        AddressArg::Many(addresses)
    }
}

impl TryFrom<Value> for AddressArg {
    type Error = ServiceError;

    fn try_from(value: Value) -> ServiceResult<Self> {
        serde_json::from_value(value).map_err(|_| {
            ServiceError::validation("Addresses are expected to be a string or a list of strings")
        })
    }
}

/// Pagination bound given as a number or a numeric string.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum PageBound {
    Number(u64),
    Text(String),
}

impl PageBound {
    fn resolve(&self, name: &str) -> ServiceResult<usize> {
        match self {
            PageBound::Number(n) => Ok(*n as usize),
            PageBound::Text(text) => text.trim().parse().map_err(|_| {
                ServiceError::validation(format!("\"{}\" ({}) is expected to be a number", name, text))
            }),
        }
    }
}

impl From<usize> for PageBound {
    fn from(n: usize) -> Self {
        PageBound::Number(n as u64)
    }
}

impl From<&str> for PageBound {
    fn from(text: &str) -> Self {
        PageBound::Text(text.to_string())
    }
}

/// Options shared by the address queries. Unset fields take per-query defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AddressOptions {
    /// Include mempool data; defaults to `true`.
    pub query_mempool: Option<bool>,
    /// Upper block height of a range query.
    pub start: Option<u64>,
    /// Lower block height of a range query.
    pub end: Option<u64>,
    pub from: Option<PageBound>,
    pub to: Option<PageBound>,
    /// Leave the txid list out of a summary.
    pub no_tx_list: bool,
}

impl AddressOptions {
    pub fn query_mempool(&self) -> bool {
        self.query_mempool.unwrap_or(true)
    }

    /// `(from, to)` with defaults applied.
    pub fn window(&self, default_to: usize) -> ServiceResult<(usize, usize)> {
        let from = match &self.from {
            Some(bound) => bound.resolve("from")?,
            None => 0,
        };
        let to = match &self.to {
            Some(bound) => bound.resolve("to")?,
            None => default_to,
        };
        Ok((from, to))
    }
}

/// Height bounds for a confirmed txid query, as sent to the daemon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeightRange {
    pub start: u64,
    pub end: u64,
}

/// Range query when both `start` and `end` are given. `start` is the higher
/// height; the daemon expects the opposite order, so the bounds are swapped.
pub fn height_range(options: &AddressOptions) -> ServiceResult<Option<HeightRange>> {
    match (options.start, options.end) {
        (Some(start), Some(end)) => {
            if end > start {
                return Err(ServiceError::validation(
                    "\"end\" is expected to be less than or equal to \"start\"",
                ));
            }
            Ok(Some(HeightRange { start: end, end: start }))
        }
        _ => Ok(None),
    }
}

/// Reject `from >= to`.
pub fn check_order(from: usize, to: usize) -> ServiceResult<()> {
    if from >= to {
        return Err(ServiceError::validation(format!(
            "\"from\" ({}) is expected to be less than \"to\" ({})",
            from, to
        )));
    }
    Ok(())
}

/// Reject windows wider than `max`.
pub fn check_window(from: usize, to: usize, max: usize) -> ServiceResult<()> {
    if to.saturating_sub(from) > max {
        return Err(ServiceError::validation(format!(
            "\"from\" ({}) and \"to\" ({}) range should be less than or equal to {}",
            from, to, max
        )));
    }
    Ok(())
}

pub fn check_address_count(addresses: &[String], max: usize) -> ServiceResult<()> {
    if addresses.len() > max {
        return Err(ServiceError::validation(format!(
            "Maximum number of addresses ({}) exceeded",
            max
        )));
    }
    Ok(())
}

/// `list[from..to]`, clamped to the list length.
pub fn paginate<T: Clone>(list: &[T], from: usize, to: usize) -> ServiceResult<Vec<T>> {
    check_order(from, to)?;
    let start = from.min(list.len());
    let end = to.min(list.len());
    Ok(list[start..end].to_vec())
}
