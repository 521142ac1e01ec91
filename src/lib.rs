pub mod account_actor;
pub mod cli;
pub mod config;
pub mod csv_io;
pub mod engine;
pub mod errors;
pub mod gate;
pub mod ids;
pub mod journal;
pub mod models;
pub mod server;
pub mod session;
pub mod shards;
pub mod storage;

pub use config::CoreConfig;
pub use engine::TransactionEngine;
pub use errors::{CoreError, ValidationError};
pub use ids::{AccountNumber, OwnerId, TransactionId};
pub use journal::JournaledStore;
pub use models::{
    Account, AccountKind, AccountPatch, NewAccount, TransactionKind, TransactionRecord,
    TransactionRequest,
};
pub use storage::{BankStore, MemoryStore, StoreError};
