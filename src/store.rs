//! Content-addressed block and transaction stores.
//!
//! Append-only: an entry is never overwritten once set, and nothing is
//! evicted. Every proposed block's transactions land here, side branches
//! included, so reorg rollbacks can always restore prior pixel owners.

use std::collections::HashMap;

use crate::block::Block;
use crate::transaction::Transaction;
use crate::types::Hash;

#[derive(Debug, Clone, Default)]
pub struct BlockStore {
    items: HashMap<Hash, Block>,
}

impl BlockStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a block under its id; returns the id.
    pub fn set(&mut self, block: Block) -> Hash {
        let id = block.id();
        self.items.entry(id).or_insert(block);
        id
    }

    pub fn get(&self, hash: &Hash) -> Option<&Block> {
        self.items.get(hash)
    }

    pub fn contains(&self, hash: &Hash) -> bool {
        self.items.contains_key(hash)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct TxStore {
    items: HashMap<Hash, Transaction>,
}

impl TxStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a transaction under its id; returns the id.
    pub fn set(&mut self, tx: Transaction) -> Hash {
        let id = tx.id();
        self.items.entry(id).or_insert(tx);
        id
    }

    pub fn get(&self, hash: &Hash) -> Option<&Transaction> {
        self.items.get(hash)
    }

    pub fn contains(&self, hash: &Hash) -> bool {
        self.items.contains_key(hash)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::PrivateKey;
    use crate::types::NULL_HASH;

    fn coinbase(seed: u8) -> Transaction {
        Transaction::builder()
            .to(PrivateKey::from_bytes(&[seed; 32]).unwrap().public_key())
            .at(0, 0)
            .build()
            .unwrap()
    }

    #[test]
    fn test_tx_store_set_get() {
        let mut store = TxStore::new();
        let tx = coinbase(1);
        let id = store.set(tx.clone());
        assert_eq!(id, tx.id());
        assert_eq!(store.get(&id), Some(&tx));
        assert!(store.contains(&id));
        assert!(store.get(&NULL_HASH).is_none());
    }

    #[test]
    fn test_stores_never_overwrite() {
        let mut store = TxStore::new();
        let tx = coinbase(2);
        store.set(tx.clone());
        store.set(tx);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_block_store_set_get() {
        let mut store = BlockStore::new();
        let block = Block::from_coinbase(coinbase(3), NULL_HASH, 0, 0, 0x207fffff);
        let id = store.set(block.clone());
        assert!(store.contains(&id));
        assert_eq!(store.get(&id), Some(&block));
        assert!(!store.is_empty());
    }
}
