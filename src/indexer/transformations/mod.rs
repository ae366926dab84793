pub mod blocks;
pub mod transactions;
