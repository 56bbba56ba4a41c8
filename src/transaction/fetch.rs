//! Cached transaction lookups through the node pool.

use serde_json::json;

use crate::error::ServiceResult;
use crate::rpc::types::RawTransaction;
use crate::service::core::ServiceCore;
use crate::transaction::address_details::{address_details, AddressDetailedTransaction};
use crate::transaction::detailed::DetailedTransaction;

/// Serialized transaction as hex.
pub async fn raw_transaction(core: &ServiceCore, txid: &str) -> ServiceResult<String> {
    let caches = &core.caches;
    let key = txid.to_string();
    if let Some(hex) = caches.lookup(&caches.raw_transaction, &key) {
        return Ok(hex);
    }
    let generation = caches.generation();
    let hex: String = core
        .pool
        .request("getrawtransaction", vec![json!(txid), json!(0)])
        .await?;
    caches.store(&caches.raw_transaction, generation, key, hex.clone());
    Ok(hex)
}

/// Verbose daemon record.
pub async fn verbose_transaction(core: &ServiceCore, txid: &str) -> ServiceResult<RawTransaction> {
    let caches = &core.caches;
    let key = txid.to_string();
    if let Some(tx) = caches.lookup(&caches.transaction, &key) {
        return Ok(tx);
    }
    let generation = caches.generation();
    let tx: RawTransaction = core
        .pool
        .request("getrawtransaction", vec![json!(txid), json!(1)])
        .await?;
    caches.store(&caches.transaction, generation, key, tx.clone());
    Ok(tx)
}

pub async fn detailed_transaction(
    core: &ServiceCore,
    txid: &str,
) -> ServiceResult<DetailedTransaction> {
    let caches = &core.caches;
    let key = txid.to_string();
    let mut tx = match caches.lookup(&caches.transaction_detailed, &key) {
        Some(tx) => tx,
        None => {
            let generation = caches.generation();
            let raw: RawTransaction = core
                .pool
                .request("getrawtransaction", vec![json!(txid), json!(1)])
                .await?;
            let tx = DetailedTransaction::from_raw(txid, &raw);
            caches.store(&caches.transaction_detailed, generation, key, tx.clone());
            tx
        }
    };
    tx.confirmations = core.confirmations(tx.height);
    Ok(tx)
}

/// Detailed transaction plus its effect on `addresses`.
pub async fn address_detailed_transaction(
    core: &ServiceCore,
    txid: &str,
    addresses: &[String],
) -> ServiceResult<AddressDetailedTransaction> {
    let tx = detailed_transaction(core, txid).await?;
    let details = address_details(&tx, addresses);
    Ok(AddressDetailedTransaction {
        addresses: details.addresses,
        satoshis: details.satoshis,
        confirmations: tx.confirmations,
        tx,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServiceConfig;
    use crate::rpc::mock::MockRpc;
    use crate::rpc::RpcError;
    use crate::error::ServiceError;
    use std::sync::Arc;

    const TXID: &str = "46f24e0c274fc07708b781963576c4c5d5625d926dbb0a17fa865dcd9fe58ea0";

    fn core_with(mock: &Arc<MockRpc>) -> Arc<ServiceCore> {
        let core = ServiceCore::new(ServiceConfig::default());
        core.pool.register(mock.clone(), None, false);
        core
    }

    #[tokio::test]
    async fn test_detailed_transaction_is_cached() {
        let mock = MockRpc::new();
        mock.on("getrawtransaction", Ok(json!({"hex": "00", "height": 20})));
        let core = core_with(&mock);

        let first = detailed_transaction(&core, TXID).await.unwrap();
        let second = detailed_transaction(&core, TXID).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first.hash, TXID);
        assert_eq!(mock.calls("getrawtransaction"), 1);
    }

    #[tokio::test]
    async fn test_rpc_error_is_propagated() {
        let mock = MockRpc::new();
        mock.on("getrawtransaction", Err(RpcError::upstream(-1, "Test error")));
        let core = core_with(&mock);
        let err = raw_transaction(&core, TXID).await.unwrap_err();
        assert!(matches!(err, ServiceError::Rpc(_)));
        assert_eq!(err.rpc_code(), Some(-1));
    }

    #[tokio::test]
    async fn test_address_detailed_confirmations() {
        let mock = MockRpc::new();
        mock.on("getrawtransaction", Ok(json!({"hex": "00", "height": 20})));
        let core = core_with(&mock);
        core.tip.set(300, "tip");
        let details = address_detailed_transaction(&core, TXID, &[]).await.unwrap();
        assert_eq!(details.confirmations, 281);
        assert_eq!(details.satoshis, 0);
        assert_eq!(details.tx.height, 20);
    }

    #[tokio::test]
    async fn test_detailed_transaction_reports_confirmations() {
        let mock = MockRpc::new();
        mock.on("getrawtransaction", Ok(json!({"hex": "00", "height": 10})));
        let core = core_with(&mock);
        core.tip.set(12, "tip");

        let tx = detailed_transaction(&core, TXID).await.unwrap();
        assert_eq!(tx.confirmations, 3);
        let value = serde_json::to_value(&tx).unwrap();
        assert_eq!(value["confirmations"], 3);

        // Served from cache, still relative to the current tip.
        core.tip.set(13, "next");
        assert_eq!(detailed_transaction(&core, TXID).await.unwrap().confirmations, 4);
        assert_eq!(mock.calls("getrawtransaction"), 1);
    }

    #[tokio::test]
    async fn test_unconfirmed_detailed_transaction_has_no_confirmations() {
        let mock = MockRpc::new();
        mock.on("getrawtransaction", Ok(json!({"hex": "00", "height": -1})));
        let core = core_with(&mock);
        core.tip.set(12, "tip");

        let tx = detailed_transaction(&core, TXID).await.unwrap();
        assert_eq!(tx.height, -1);
        assert_eq!(tx.confirmations, 0);
    }
}
