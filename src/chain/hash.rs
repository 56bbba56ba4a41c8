//! Hashing and address checks on raw chain data.

use sha2::{Digest, Sha256};

fn sha256d(data: &[u8]) -> [u8; 32] {
    let first = Sha256::digest(data);
    Sha256::digest(first).into()
}

/// Transaction id of a serialized transaction: double SHA-256, byte-reversed, hex.
pub fn txid(raw_tx: &[u8]) -> String {
    let mut digest = sha256d(raw_tx);
    digest.reverse();
    hex::encode(digest)
}

/// Base58check validity: 21-byte payload plus a 4-byte double SHA-256 checksum.
pub fn is_valid_address(address: &str) -> bool {
    let decoded = match bs58::decode(address).into_vec() {
        Ok(bytes) => bytes,
        Err(_) => return false,
    };
    if decoded.len() != 25 {
        return false;
    }
    let (payload, checksum) = decoded.split_at(21);
    sha256d(payload)[..4] == *checksum
}
