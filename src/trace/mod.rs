//! Flattening of per-transaction message traces into ordered steps.

use alloy_primitives::{Address, B256, keccak256};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::chain::ChainClient;
use crate::models::datasets::traces::{TraceNode, TraceOp, TraceStep};

pub struct TraceCollector {
    chain: Arc<dyn ChainClient>,
}

impl TraceCollector {
    pub fn new(chain: Arc<dyn ChainClient>) -> Self {
        Self { chain }
    }

    /// Walk `root` depth first in pre-order and emit one step per CREATE and
    /// CALL node. Each node's bytecode hash is fetched from the chain before
    /// its children are visited, so steps come out in call-stack entry order.
    pub async fn collect(&self, root: &TraceNode) -> Vec<TraceStep> {
        let mut steps = Vec::new();
        let mut stack = vec![(root, 0usize)];

        while let Some((node, depth)) = stack.pop() {
            match node {
                TraceNode::Step | TraceNode::Precompile { .. } => continue,
                TraceNode::Create {
                    deployed_contract, ..
                } => {
                    if let Some(address) = deployed_contract {
                        steps.push(TraceStep {
                            op: TraceOp::Create2,
                            contract_hashed_bytecode: self.hashed_bytecode(*address).await,
                            address: *address,
                            input: None,
                            depth,
                            return_data: None,
                        });
                    }
                }
                TraceNode::Call {
                    address,
                    calldata,
                    return_data,
                    ..
                } => {
                    steps.push(TraceStep {
                        op: TraceOp::Call,
                        contract_hashed_bytecode: self.hashed_bytecode(*address).await,
                        address: *address,
                        input: Some(calldata.clone()),
                        depth,
                        return_data: Some(return_data.clone()),
                    });
                }
            }

            // Reversed so the first child is popped next
            stack.extend(node.children().iter().rev().map(|child| (child, depth + 1)));
        }

        steps
    }

    async fn hashed_bytecode(&self, address: Address) -> Option<B256> {
        match self.chain.get_code(address).await {
            Ok(code) => Some(keccak256(&code)),
            Err(e) => {
                warn!("Couldn't fetch bytecode at {}: {}", address, e);
                None
            }
        }
    }
}

/// Collected steps waiting for their transaction to be synced.
///
/// Traces tagged with a transaction hash are matched by hash. An untagged
/// trace sits in a single pending slot and goes to whichever transaction is
/// synced next, which is only reliable for one transaction per block.
#[derive(Debug, Default)]
pub struct TraceBuffer {
    by_hash: HashMap<B256, Vec<TraceStep>>,
    pending: Option<Vec<TraceStep>>,
}

impl TraceBuffer {
    pub fn insert(&mut self, tx_hash: Option<B256>, steps: Vec<TraceStep>) {
        match tx_hash {
            Some(hash) => {
                self.by_hash.insert(hash, steps);
            }
            None => {
                if self.pending.is_some() {
                    debug!("Replacing an unclaimed pending trace");
                }
                self.pending = Some(steps);
            }
        }
    }

    /// Remove and return the steps for `tx_hash`, falling back to the pending slot.
    pub fn take(&mut self, tx_hash: B256) -> Option<Vec<TraceStep>> {
        self.by_hash
            .remove(&tx_hash)
            .or_else(|| self.pending.take())
    }

    /// Drop a keyed trace whose transaction won't be synced. The pending slot is kept.
    pub fn discard(&mut self, tx_hash: B256) {
        self.by_hash.remove(&tx_hash);
    }

    /// Drop every keyed trace and return how many were dropped. The pending slot is kept.
    pub fn discard_keyed(&mut self) -> usize {
        let dropped = self.by_hash.len();
        self.by_hash.clear();
        dropped
    }

    pub fn clear(&mut self) {
        self.by_hash.clear();
        self.pending = None;
    }

    pub fn is_empty(&self) -> bool {
        self.by_hash.is_empty() && self.pending.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(depth: usize) -> TraceStep {
        TraceStep {
            op: TraceOp::Call,
            contract_hashed_bytecode: None,
            address: Address::ZERO,
            input: None,
            depth,
            return_data: None,
        }
    }

    #[test]
    fn keyed_traces_match_their_transaction() {
        let mut buffer = TraceBuffer::default();
        let first = B256::repeat_byte(1);
        let second = B256::repeat_byte(2);
        buffer.insert(Some(second), vec![step(2)]);
        buffer.insert(Some(first), vec![step(1)]);

        assert_eq!(buffer.take(first), Some(vec![step(1)]));
        assert_eq!(buffer.take(first), None);
        assert_eq!(buffer.take(second), Some(vec![step(2)]));
        assert!(buffer.is_empty());
    }

    #[test]
    fn pending_trace_goes_to_next_transaction() {
        let mut buffer = TraceBuffer::default();
        buffer.insert(None, vec![step(0)]);

        assert_eq!(buffer.take(B256::repeat_byte(9)), Some(vec![step(0)]));
        assert_eq!(buffer.take(B256::repeat_byte(10)), None);
    }

    #[test]
    fn discard_keyed_keeps_the_pending_slot() {
        let mut buffer = TraceBuffer::default();
        buffer.insert(Some(B256::repeat_byte(1)), vec![step(1)]);
        buffer.insert(Some(B256::repeat_byte(2)), vec![step(2)]);
        buffer.insert(None, vec![step(0)]);

        assert_eq!(buffer.discard_keyed(), 2);
        assert_eq!(buffer.take(B256::repeat_byte(1)), Some(vec![step(0)]));
        assert!(buffer.is_empty());
    }
}
