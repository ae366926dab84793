pub mod blocks;
pub mod contracts;
pub mod traces;
pub mod transactions;
