//! # Pixelchain
//!
//! Proof-of-work blockchain engine for a collaborative pixel grid. Each
//! coinbase transaction mines one pixel at an integer coordinate, binding
//! it to a 32-bit RGBA color and an owning secp256k1 key; later
//! transactions transfer a pixel to a new owner under the previous owner's
//! signature. Blocks chain under Nakamoto-style proof-of-work and the
//! world grid is a derived view of the best chain.
//!
//! ## Architecture
//!
//! - [`chain::Blockchain`] owns the block tree, cumulative work, height
//!   index and the live pixel grid, and switches chains atomically when a
//!   heavier branch appears.
//! - [`miner::Miner`] searches header nonces cooperatively, one
//!   [`miner::Miner::work`] step at a time.
//! - [`transaction`], [`block`], [`pow`], [`sighash`] implement the
//!   consensus record layouts and checks; [`crypto`] and [`codec`] are the
//!   primitive adapters underneath them.
//!
//! ## Usage
//!
//! ```
//! use pixelchain::constants::DEFAULT_BITS;
//! use pixelchain::{Blockchain, Miner, Position, PrivateKey, Transaction, NULL_HASH};
//!
//! let key = PrivateKey::from_bytes(&[1u8; 32]).unwrap();
//! let coinbase = Transaction::builder()
//!     .to(key.public_key())
//!     .colored(0xff0000ff)
//!     .at(0, 0)
//!     .build()
//!     .unwrap();
//!
//! let mut miner = Miner::new(NULL_HASH, 0, coinbase, 1432594281, DEFAULT_BITS);
//! let genesis = miner.run().unwrap().expect("search completes");
//!
//! let mut chain = Blockchain::new();
//! chain.propose_new_block(genesis.clone()).unwrap();
//! assert_eq!(chain.tip(), genesis.id());
//! assert!(chain.pixel(&Position::new(0, 0)).is_some());
//! ```

pub mod block;
pub mod chain;
pub mod codec;
pub mod constants;
pub mod crypto;
pub mod error;
pub mod miner;
pub mod pow;
pub mod sighash;
pub mod store;
pub mod transaction;
pub mod types;

pub use block::{merkle_root, Block, BlockHeader};
pub use chain::{Blockchain, ChainSnapshot, ProposeOutcome};
pub use crypto::{PrivateKey, PublicKey, Signature};
pub use error::{ChainError, Result};
pub use miner::{Miner, WorkResult};
pub use store::{BlockStore, TxStore};
pub use transaction::{Transaction, TransactionBuilder};
pub use types::{Color, Hash, Position, NULL_HASH};
