//! Nonce search over a candidate block template.
//!
//! The miner is a cooperative iterator: each [`Miner::work`] call advances
//! the nonce once and reports [`WorkResult::Pending`] or
//! [`WorkResult::Found`]. Hosts that want a busy loop call [`Miner::run`];
//! hosts that interleave transaction submission and tip updates drive
//! `work` in batches. A successful search stops the miner; it must be
//! re-seeded with [`Miner::new_tip`] before it will search again.

use tracing::debug;

use crate::block::Block;
use crate::error::Result;
use crate::transaction::Transaction;
use crate::types::Hash;

/// Outcome of one nonce step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkResult {
    /// The current nonce does not satisfy the target.
    Pending,
    /// The completed block; the miner is stopped.
    Found(Block),
}

#[derive(Debug, Clone)]
pub struct Miner {
    template: Block,
    running: bool,
}

impl Miner {
    /// Seed a miner with a template built from a parent tip and a coinbase.
    pub fn new(previous: Hash, height: u32, coinbase: Transaction, time: u32, bits: u32) -> Miner {
        Miner {
            template: Block::from_coinbase(coinbase, previous, height, time, bits),
            running: true,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn template(&self) -> &Block {
        &self.template
    }

    /// One search iteration: advance the nonce and test proof-of-work.
    ///
    /// Returns `Pending` without touching the template when the miner is
    /// stopped.
    pub fn work(&mut self) -> Result<WorkResult> {
        if !self.running {
            return Ok(WorkResult::Pending);
        }
        self.template.header.increase_nonce();
        if self.template.header.valid_proof_of_work()? {
            self.running = false;
            debug!(
                block = %self.template.id_hex(),
                nonce = self.template.header.nonce,
                "found block"
            );
            return Ok(WorkResult::Found(self.template.clone()));
        }
        Ok(WorkResult::Pending)
    }

    /// Drive [`Miner::work`] until a block is found or the miner is stopped.
    pub fn run(&mut self) -> Result<Option<Block>> {
        while self.running {
            if let WorkResult::Found(block) = self.work()? {
                return Ok(Some(block));
            }
        }
        Ok(None)
    }

    /// Clear the run flag; the next `work`/`run` iteration exits.
    pub fn stop(&mut self) {
        self.running = false;
    }

    /// Append a transaction to the template. The merkle root changes, so
    /// nonce work accumulated against the old root no longer applies.
    pub fn add_transaction(&mut self, tx: Transaction) {
        self.template.add_transaction(tx);
    }

    /// Re-seed the template on top of a new tip, optionally swapping in a
    /// fresh coinbase, and start searching again.
    pub fn new_tip(&mut self, tip: &Block, coinbase: Option<Transaction>) {
        let coinbase = coinbase.unwrap_or_else(|| self.template.transactions[0].clone());
        self.template = Block::from_coinbase(
            coinbase,
            tip.id(),
            tip.header.height + 1,
            self.template.header.time,
            self.template.header.bits,
        );
        self.running = true;
    }
}
