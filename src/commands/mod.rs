pub mod geth;
pub mod miner;
pub mod network;
pub mod wallet;
