//! The chain manager: block tree, cumulative work, and the pixel grid.
//!
//! Blocks and transactions are immutable once stored; only the chain
//! indices and the pixel map mutate, and only through the proposal
//! protocol. A proposal either completes its reorg atomically or restores
//! the indices to their pre-call state before the error propagates.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::block::Block;
use crate::error::{ChainError, Result};
use crate::pow::work_unit;
use crate::sighash;
use crate::store::{BlockStore, TxStore};
use crate::transaction::Transaction;
use crate::types::{hash_from_hex, hash_to_hex, Hash, Position, NULL_HASH};

/// Hashes rolled back and applied by one proposal.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProposeOutcome {
    /// Blocks removed from the active chain, tip-first.
    pub unconfirmed: Vec<Hash>,
    /// Blocks appended to the active chain, ancestor-first.
    pub confirmed: Vec<Hash>,
}

/// Portable snapshot of the chain indices; hashes rendered as hex.
///
/// Pixels are re-derivable from the active chain and are not included.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainSnapshot {
    pub tip: String,
    pub work: HashMap<String, u128>,
    pub next: HashMap<String, String>,
    pub hash_by_height: HashMap<i64, String>,
    pub height: HashMap<String, i64>,
    pub prev: HashMap<String, String>,
}

#[derive(Debug, Clone)]
pub struct Blockchain {
    /// Head of the current best chain; `NULL_HASH` before any block.
    tip: Hash,
    /// Cumulative work per known block; `NULL_HASH` anchors at zero.
    work: HashMap<Hash, u128>,
    /// Height per active-chain block; `NULL_HASH` sits at -1.
    height: HashMap<Hash, i64>,
    /// Active-chain block per height.
    hash_by_height: HashMap<i64, Hash>,
    /// Parent link for every known block.
    prev: HashMap<Hash, Hash>,
    /// Forward link along the active chain only.
    next: HashMap<Hash, Hash>,
    /// World state: the most recent owning transaction per coordinate.
    pixels: HashMap<Position, Transaction>,
    block_store: BlockStore,
    tx_store: TxStore,
}

impl Blockchain {
    pub fn new() -> Self {
        let mut work = HashMap::new();
        work.insert(NULL_HASH, 0);
        let mut height = HashMap::new();
        height.insert(NULL_HASH, -1);
        Blockchain {
            tip: NULL_HASH,
            work,
            height,
            hash_by_height: HashMap::new(),
            prev: HashMap::new(),
            next: HashMap::new(),
            pixels: HashMap::new(),
            block_store: BlockStore::new(),
            tx_store: TxStore::new(),
        }
    }

    pub fn tip(&self) -> Hash {
        self.tip
    }

    pub fn get_current_height(&self) -> i64 {
        self.height.get(&self.tip).copied().unwrap_or(-1)
    }

    pub fn get_block(&self, hash: &Hash) -> Option<&Block> {
        self.block_store.get(hash)
    }

    pub fn get_transaction(&self, hash: &Hash) -> Option<&Transaction> {
        self.tx_store.get(hash)
    }

    pub fn get_tip_block(&self) -> Option<&Block> {
        self.block_store.get(&self.tip)
    }

    pub fn contains_block(&self, hash: &Hash) -> bool {
        self.block_store.contains(hash)
    }

    /// The owning transaction at a coordinate, if the pixel is mined.
    pub fn pixel(&self, position: &Position) -> Option<&Transaction> {
        self.pixels.get(position)
    }

    pub fn pixels(&self) -> &HashMap<Position, Transaction> {
        &self.pixels
    }

    /// Offer a block to the chain.
    ///
    /// The block and its transactions are always persisted, even when the
    /// block lands on a side branch. The active chain switches only when
    /// the block's cumulative work exceeds the tip's, in which case the
    /// returned outcome lists the rolled-back and newly-applied blocks.
    pub fn propose_new_block(&mut self, block: Block) -> Result<ProposeOutcome> {
        let hash = block.id();
        let parent = block.header.prev_hash;
        if !self.is_known(&parent) {
            return Err(ChainError::MissingParent {
                block: hash_to_hex(&hash),
                parent: hash_to_hex(&parent),
            });
        }

        // Persist first: side branches must stay replayable for rollbacks.
        for tx in &block.transactions {
            self.tx_store.set(tx.clone());
        }
        self.block_store.set(block);
        self.prev.insert(hash, parent);
        let parent_work = self.work[&parent];
        self.work.insert(hash, parent_work + work_unit(&hash));

        if self.work[&hash] <= self.work[&self.tip] {
            debug!(block = %hash_to_hex(&hash), "accepted on side branch");
            return Ok(ProposeOutcome::default());
        }

        let (unconfirmed, confirmed) = self.append_new_block(hash)?;
        info!(
            tip = %hash_to_hex(&self.tip),
            unconfirmed = unconfirmed.len(),
            confirmed = confirmed.len(),
            "switched active chain"
        );
        Ok(ProposeOutcome {
            unconfirmed,
            confirmed,
        })
    }

    /// Validate a candidate block against the current grid and indices.
    ///
    /// The caller guarantees the block would extend the tip; intra-block
    /// transfer chains are tracked in a scratch view so the live pixel map
    /// is never touched.
    pub fn check_valid_block(&self, block: &Block) -> Result<()> {
        let hash = block.id();
        let parent = block.header.prev_hash;
        if !self.is_known(&parent) {
            return Err(ChainError::MissingParent {
                block: hash_to_hex(&hash),
                parent: hash_to_hex(&parent),
            });
        }

        let coinbase = block.transactions.first().ok_or_else(|| {
            ChainError::InvalidArgument("block has no transactions".to_string())
        })?;
        if !coinbase.is_coinbase() {
            return Err(ChainError::InvalidArgument(
                "first transaction must be a coinbase".to_string(),
            ));
        }
        if !block.valid_merkle_root() {
            return Err(ChainError::InvalidArgument(
                "merkle root does not match transactions".to_string(),
            ));
        }
        if !block.header.valid_proof_of_work()? {
            return Err(ChainError::InvalidProofOfWork(block.id_hex()));
        }

        let height = match self.height.get(&parent) {
            Some(h) => h + 1,
            None => {
                return Err(ChainError::InvalidArgument(
                    "parent is not on the active chain".to_string(),
                ))
            }
        };
        if i64::from(block.header.height) != height {
            return Err(ChainError::InvalidArgument(format!(
                "header height {} does not match chain height {height}",
                block.header.height
            )));
        }

        let mined = coinbase.position;
        if self.pixels.contains_key(&mined) {
            return Err(ChainError::PixelMined { position: mined });
        }
        if height > 0
            && !mined
                .neighbors()
                .iter()
                .any(|n| self.pixels.contains_key(n))
        {
            return Err(ChainError::NotAdjacent { position: mined });
        }

        // Per-position view of the block being applied: starts at the
        // coinbase for the mined pixel and at the live grid elsewhere, then
        // follows the last validated in-block owner.
        let mut scratch: HashMap<Position, &Transaction> = HashMap::new();
        scratch.insert(mined, coinbase);
        for (index, tx) in block.transactions.iter().enumerate().skip(1) {
            if tx.is_coinbase() {
                return Err(ChainError::InvalidArgument(
                    "only the first transaction may be a coinbase".to_string(),
                ));
            }
            let position = tx.position;
            let owner_tx: &Transaction = match scratch.get(&position) {
                Some(t) => t,
                None => self.pixels.get(&position).ok_or_else(|| {
                    ChainError::InvalidArgument(format!(
                        "transfer of unowned pixel at {position}"
                    ))
                })?,
            };
            let signature = tx.signature.as_ref().ok_or_else(|| {
                ChainError::InvalidArgument("transfer carries no signature".to_string())
            })?;
            if tx.previous != owner_tx.id() || !sighash::verify(tx, signature, &owner_tx.owner) {
                return Err(ChainError::SignatureMismatch {
                    txid: tx.id_hex(),
                    block: hash_to_hex(&hash),
                    index,
                });
            }
            scratch.insert(position, tx);
        }
        Ok(())
    }

    /// Hashes walking back from the tip: ten single steps, then a doubling
    /// stride, with the genesis block always last.
    pub fn get_block_locator(&self) -> Vec<Hash> {
        let mut locator = Vec::new();
        let mut height = self.get_current_height();
        let mut step: i64 = 1;
        while height > 0 {
            if let Some(hash) = self.hash_by_height.get(&height) {
                locator.push(*hash);
            }
            if locator.len() >= 10 {
                step *= 2;
            }
            height -= step;
        }
        if let Some(genesis) = self.hash_by_height.get(&0) {
            locator.push(*genesis);
        }
        locator
    }

    /// Export the chain indices in portable form.
    pub fn to_object(&self) -> ChainSnapshot {
        ChainSnapshot {
            tip: hash_to_hex(&self.tip),
            work: self
                .work
                .iter()
                .map(|(h, w)| (hash_to_hex(h), *w))
                .collect(),
            next: self
                .next
                .iter()
                .map(|(h, n)| (hash_to_hex(h), hash_to_hex(n)))
                .collect(),
            hash_by_height: self
                .hash_by_height
                .iter()
                .map(|(h, v)| (*h, hash_to_hex(v)))
                .collect(),
            height: self
                .height
                .iter()
                .map(|(h, v)| (hash_to_hex(h), *v))
                .collect(),
            prev: self
                .prev
                .iter()
                .map(|(h, p)| (hash_to_hex(h), hash_to_hex(p)))
                .collect(),
        }
    }

    /// Rebuild the indices from a snapshot. Stores and pixels start empty;
    /// use [`Blockchain::from_object_with_stores`] to restore the grid.
    pub fn from_object(snapshot: &ChainSnapshot) -> Result<Blockchain> {
        let mut chain = Blockchain::new();
        chain.tip = hash_from_hex(&snapshot.tip)?;
        chain.work = decode_hash_keys(&snapshot.work)?;
        chain.height = decode_hash_keys(&snapshot.height)?;
        chain.next = decode_hash_map(&snapshot.next)?;
        chain.prev = decode_hash_map(&snapshot.prev)?;
        chain.hash_by_height = snapshot
            .hash_by_height
            .iter()
            .map(|(h, v)| Ok((*h, hash_from_hex(v)?)))
            .collect::<Result<_>>()?;
        Ok(chain)
    }

    /// Rebuild indices from a snapshot and the grid from stored blocks by
    /// replaying the active chain genesis-first.
    pub fn from_object_with_stores(
        snapshot: &ChainSnapshot,
        block_store: BlockStore,
        tx_store: TxStore,
    ) -> Result<Blockchain> {
        let mut chain = Blockchain::from_object(snapshot)?;
        chain.block_store = block_store;
        chain.tx_store = tx_store;
        for height in 0..=chain.get_current_height() {
            let hash = chain.hash_by_height.get(&height).ok_or_else(|| {
                ChainError::InvalidArgument(format!("snapshot misses height {height}"))
            })?;
            let block = chain
                .block_store
                .get(hash)
                .ok_or_else(|| ChainError::InvalidArgument(format!(
                    "store misses active block {}",
                    hash_to_hex(hash)
                )))?
                .clone();
            for tx in block.transactions {
                chain.pixels.insert(tx.position, tx);
            }
        }
        Ok(chain)
    }

    /// Drop `prev`/`work` entries of dead side branches: blocks that are
    /// neither on the active chain nor an ancestor of any remaining block.
    /// Stores are untouched. Returns the number of entries discarded.
    pub fn prune(&mut self) -> usize {
        let mut removed = 0;
        loop {
            let referenced: std::collections::HashSet<Hash> =
                self.prev.values().copied().collect();
            let dead: Vec<Hash> = self
                .prev
                .keys()
                .filter(|h| !self.height.contains_key(*h) && !referenced.contains(*h))
                .copied()
                .collect();
            if dead.is_empty() {
                return removed;
            }
            for hash in dead {
                self.prev.remove(&hash);
                self.work.remove(&hash);
                removed += 1;
            }
        }
    }

    fn is_known(&self, hash: &Hash) -> bool {
        *hash == NULL_HASH || self.work.contains_key(hash)
    }

    /// Switch the active chain onto `hash`, which carries more work than
    /// the tip. On validation failure every index is restored before the
    /// error propagates.
    fn append_new_block(&mut self, hash: Hash) -> Result<(Vec<Hash>, Vec<Hash>)> {
        // Walk the new branch back to the first block already active.
        let mut to_confirm = Vec::new();
        let mut cursor = hash;
        while !self.height.contains_key(&cursor) {
            to_confirm.push(cursor);
            cursor = *self.prev.get(&cursor).ok_or_else(|| {
                ChainError::InvalidArgument(format!(
                    "broken parent link at {}",
                    hash_to_hex(&cursor)
                ))
            })?;
        }
        let ancestor = cursor;

        // Walk the old branch back to the same ancestor.
        let mut to_unconfirm = Vec::new();
        let mut cursor = self.tip;
        while cursor != ancestor {
            to_unconfirm.push(cursor);
            cursor = *self.prev.get(&cursor).ok_or_else(|| {
                ChainError::InvalidArgument(format!(
                    "broken parent link at {}",
                    hash_to_hex(&cursor)
                ))
            })?;
        }

        to_confirm.reverse();

        for hash in &to_unconfirm {
            self.unconfirm(*hash)?;
        }

        let mut applied: Vec<Hash> = Vec::new();
        for hash in &to_confirm {
            let block = self.stored_block(hash)?;
            let outcome = self.check_valid_block(&block).and_then(|()| self.confirm(&block));
            if let Err(err) = outcome {
                debug!(
                    block = %hash_to_hex(hash),
                    reason = %err,
                    "rolling back failed chain switch"
                );
                for hash in applied.iter().rev() {
                    self.unconfirm(*hash)?;
                }
                for hash in to_unconfirm.iter().rev() {
                    let block = self.stored_block(hash)?;
                    self.confirm(&block)?;
                }
                return Err(err);
            }
            applied.push(*hash);
        }

        Ok((to_unconfirm, to_confirm))
    }

    /// Extend the active chain by one block and apply its transactions to
    /// the grid. Precondition: the block's parent is the tip.
    fn confirm(&mut self, block: &Block) -> Result<()> {
        let hash = block.id();
        let parent = block.header.prev_hash;
        if parent != self.tip {
            return Err(ChainError::InvalidArgument(format!(
                "cannot confirm {}: parent is not the tip",
                hash_to_hex(&hash)
            )));
        }
        let height = self.height[&parent] + 1;
        self.next.insert(parent, hash);
        self.tip = hash;
        self.height.insert(hash, height);
        self.hash_by_height.insert(height, hash);
        for tx in &block.transactions {
            self.pixels.insert(tx.position, tx.clone());
        }
        Ok(())
    }

    /// Remove the tip block from the active chain and roll its pixel
    /// mutations back. Transfers restore the transaction they spent; the
    /// coinbase frees its coordinate.
    fn unconfirm(&mut self, hash: Hash) -> Result<()> {
        if hash != self.tip {
            return Err(ChainError::InvalidArgument(format!(
                "cannot unconfirm {}: not the tip",
                hash_to_hex(&hash)
            )));
        }
        let block = self.stored_block(&hash)?;
        let parent = block.header.prev_hash;
        let height = self.height[&hash];

        self.tip = parent;
        self.next.remove(&parent);
        self.hash_by_height.remove(&height);
        self.height.remove(&hash);

        for tx in block.transactions.iter().skip(1).rev() {
            let spent = self
                .tx_store
                .get(&tx.previous)
                .ok_or_else(|| {
                    ChainError::InvalidArgument(format!(
                        "store misses spent transaction {}",
                        hash_to_hex(&tx.previous)
                    ))
                })?
                .clone();
            self.pixels.insert(spent.position, spent);
        }
        if let Some(coinbase) = block.coinbase() {
            self.pixels.remove(&coinbase.position);
        }
        Ok(())
    }

    fn stored_block(&self, hash: &Hash) -> Result<Block> {
        self.block_store
            .get(hash)
            .cloned()
            .ok_or_else(|| {
                ChainError::InvalidArgument(format!(
                    "store misses block {}",
                    hash_to_hex(hash)
                ))
            })
    }
}

impl Default for Blockchain {
    fn default() -> Self {
        Self::new()
    }
}

fn decode_hash_keys<V: Copy>(map: &HashMap<String, V>) -> Result<HashMap<Hash, V>> {
    map.iter()
        .map(|(h, v)| Ok((hash_from_hex(h)?, *v)))
        .collect()
}

fn decode_hash_map(map: &HashMap<String, String>) -> Result<HashMap<Hash, Hash>> {
    map.iter()
        .map(|(h, v)| Ok((hash_from_hex(h)?, hash_from_hex(v)?)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::DEFAULT_BITS;
    use crate::crypto::PrivateKey;
    use crate::miner::Miner;

    fn key(seed: u8) -> PrivateKey {
        PrivateKey::from_bytes(&[seed; 32]).unwrap()
    }

    fn coinbase(seed: u8, x: i32, y: i32, color: u32) -> Transaction {
        Transaction::builder()
            .to(key(seed).public_key())
            .colored(color)
            .at(x, y)
            .build()
            .unwrap()
    }

    fn mine(prev: Hash, height: u32, cb: Transaction) -> Block {
        Miner::new(prev, height, cb, 1432594281, DEFAULT_BITS)
            .run()
            .unwrap()
            .expect("search completes")
    }

    fn chain_with_genesis() -> (Blockchain, Block) {
        let mut chain = Blockchain::new();
        let genesis = mine(NULL_HASH, 0, coinbase(1, 0, 0, 0xffffffff));
        chain.propose_new_block(genesis.clone()).unwrap();
        (chain, genesis)
    }

    #[test]
    fn test_new_chain_is_empty() {
        let chain = Blockchain::new();
        assert_eq!(chain.tip(), NULL_HASH);
        assert_eq!(chain.get_current_height(), -1);
        assert!(chain.get_tip_block().is_none());
        assert!(chain.pixels().is_empty());
        assert!(chain.get_block_locator().is_empty());
    }

    #[test]
    fn test_propose_genesis_confirms_it() {
        let (chain, genesis) = chain_with_genesis();
        assert_eq!(chain.tip(), genesis.id());
        assert_eq!(chain.get_current_height(), 0);
        assert_eq!(
            chain.pixel(&Position::new(0, 0)),
            Some(&genesis.transactions[0])
        );
    }

    #[test]
    fn test_propose_with_unknown_parent_fails() {
        let mut chain = Blockchain::new();
        let block = mine([7u8; 32], 1, coinbase(1, 0, 0, 1));
        assert!(matches!(
            chain.propose_new_block(block),
            Err(ChainError::MissingParent { .. })
        ));
        assert_eq!(chain.tip(), NULL_HASH);
    }

    #[test]
    fn test_equal_work_block_stays_side_branch() {
        let (mut chain, genesis) = chain_with_genesis();
        let rival = mine(NULL_HASH, 0, coinbase(2, 5, 5, 2));
        let outcome = chain.propose_new_block(rival.clone()).unwrap();
        assert_eq!(outcome, ProposeOutcome::default());
        assert_eq!(chain.tip(), genesis.id());
        // the side branch block is persisted and queryable
        assert!(chain.contains_block(&rival.id()));
        assert!(chain.get_transaction(&rival.transactions[0].id()).is_some());
        assert!(chain.pixel(&Position::new(5, 5)).is_none());
    }

    #[test]
    fn test_transfer_unowned_pixel_rejected() {
        let (mut chain, genesis) = chain_with_genesis();
        let mut transfer = Transaction::builder()
            .from(genesis.transactions[0].id())
            .to(key(2).public_key())
            .colored(3)
            .at(9, 9) // nothing owned at this coordinate
            .build()
            .unwrap();
        transfer.sign(&key(1)).unwrap();

        let mut miner = Miner::new(genesis.id(), 1, coinbase(3, 0, 1, 4), 1432594281, DEFAULT_BITS);
        miner.add_transaction(transfer);
        let mined = miner.run().unwrap().unwrap();

        let err = chain.propose_new_block(mined).unwrap_err();
        assert!(matches!(err, ChainError::InvalidArgument(_)));
        assert_eq!(chain.tip(), genesis.id());
    }

    #[test]
    fn test_block_locator_shape() {
        let (mut chain, genesis) = chain_with_genesis();
        let mut prev = genesis;
        for i in 1..=40u32 {
            let block = mine(prev.id(), i, coinbase(1, 0, i as i32, i));
            chain.propose_new_block(block.clone()).unwrap();
            prev = block;
        }
        let locator = chain.get_block_locator();
        assert_eq!(locator[0], chain.tip());
        // ten unit steps: heights 40..31
        for (i, hash) in locator.iter().take(10).enumerate() {
            assert_eq!(*hash, chain.hash_by_height[&(40 - i as i64)]);
        }
        // exponential back-off afterwards, genesis last
        assert_eq!(*locator.last().unwrap(), chain.hash_by_height[&0]);
        assert!(locator.len() < 41);
    }

    #[test]
    fn test_snapshot_roundtrip() {
        let (mut chain, genesis) = chain_with_genesis();
        let block = mine(genesis.id(), 1, coinbase(2, 0, 1, 9));
        chain.propose_new_block(block).unwrap();

        let snapshot = chain.to_object();
        let json = serde_json::to_string(&snapshot).unwrap();
        let decoded: ChainSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, snapshot);

        let restored = Blockchain::from_object(&decoded).unwrap();
        assert_eq!(restored.tip(), chain.tip());
        assert_eq!(restored.get_current_height(), chain.get_current_height());
        assert_eq!(restored.work, chain.work);
        assert_eq!(restored.height, chain.height);
        assert_eq!(restored.prev, chain.prev);
        assert_eq!(restored.next, chain.next);
        assert_eq!(restored.hash_by_height, chain.hash_by_height);
    }

    #[test]
    fn test_snapshot_with_stores_rebuilds_pixels() {
        let (mut chain, genesis) = chain_with_genesis();
        let block = mine(genesis.id(), 1, coinbase(2, 0, 1, 9));
        chain.propose_new_block(block).unwrap();

        let restored = Blockchain::from_object_with_stores(
            &chain.to_object(),
            chain.block_store.clone(),
            chain.tx_store.clone(),
        )
        .unwrap();
        assert_eq!(restored.pixels, chain.pixels);
    }

    #[test]
    fn test_prune_drops_dead_side_branch() {
        let (mut chain, genesis) = chain_with_genesis();
        // dead rival chain of two blocks
        let rival1 = mine(NULL_HASH, 0, coinbase(2, 5, 5, 1));
        let rival2 = mine(rival1.id(), 1, coinbase(2, 5, 6, 2));
        // grow the active chain past the rival first
        let a = mine(genesis.id(), 1, coinbase(1, 0, 1, 3));
        let b = mine(a.id(), 2, coinbase(1, 0, 2, 4));
        chain.propose_new_block(a).unwrap();
        chain.propose_new_block(b).unwrap();
        chain.propose_new_block(rival1.clone()).unwrap();
        chain.propose_new_block(rival2.clone()).unwrap();

        assert_eq!(chain.prune(), 2);
        assert!(!chain.work.contains_key(&rival1.id()));
        assert!(!chain.work.contains_key(&rival2.id()));
        // active entries survive
        assert!(chain.work.contains_key(&chain.tip()));
        // stores keep everything
        assert!(chain.contains_block(&rival1.id()));
    }
}
