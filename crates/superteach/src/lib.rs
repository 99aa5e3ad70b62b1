//! superteach starter
//!
//! a devnet wallet page without the page: connect a browser wallet, show its
//! balance, send a native transfer, and push a file from a url to ipfs.
//!
//! everything the browser provides (wallet, storage, toasts, navigation,
//! timers) sits behind a trait so the flows run natively under tokio in
//! tests and under wasm-bindgen in `superteach-web`.
//!
//! ## transfer flow
//!
//! ```text
//! form ─► TransferRequest ─► balance check ─► blockhash ─► build
//!                                                           │
//!        explorer link ◄─ confirm ◄─ sendTransaction ◄─ wallet sign
//! ```
//!
//! transactions are built and serialized here (legacy message format, one
//! system transfer instruction); the wallet only signs.

pub mod balance;
pub mod config;
pub mod error;
pub mod host;
pub mod page;
pub mod pubkey;
pub mod rpc;
pub mod session;
pub mod storage;
pub mod testing;
pub mod transfer;
pub mod tx;
pub mod units;
pub mod upload;
pub mod wallet;

pub use balance::{Balance, BalanceReader};
pub use config::{Cluster, StarterConfig};
pub use error::{Result, StarterError};
pub use page::{Home, HomeServices, PageState};
pub use pubkey::{Blockhash, Pubkey, Signature};
pub use rpc::{ChainRpc, Commitment, JsonRpcClient};
pub use session::{Session, SessionManager};
pub use storage::{KeyValueStore, MemoryStore};
pub use transfer::{TransferExecutor, TransferRequest, TransferResult, TransferStage};
pub use tx::Transaction;
pub use units::LAMPORTS_PER_SOL;
pub use upload::{HttpSource, StorageUploader, UploadExecutor, UploadResult};
pub use wallet::{KeypairWallet, WalletProvider};
