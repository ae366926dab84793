use alloy_primitives::{Address, B256, Bytes};
use serde::{Deserialize, Serialize};

////////////////////////////////////// Host Data ///////////////////////////////////////
/// One node of the message trace a host produces for an executed transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum TraceNode {
    /// A plain EVM instruction.
    Step,
    Precompile {
        address: Address,
    },
    #[serde(rename_all = "camelCase")]
    Create {
        /// Address of the deployed contract, `None` when deployment failed.
        deployed_contract: Option<Address>,
        #[serde(default)]
        steps: Vec<TraceNode>,
    },
    #[serde(rename_all = "camelCase")]
    Call {
        address: Address,
        #[serde(default)]
        calldata: Bytes,
        #[serde(default)]
        return_data: Bytes,
        #[serde(default)]
        steps: Vec<TraceNode>,
    },
}

impl TraceNode {
    pub fn children(&self) -> &[TraceNode] {
        match self {
            Self::Create { steps, .. } | Self::Call { steps, .. } => steps,
            Self::Step | Self::Precompile { .. } => &[],
        }
    }
}

/////////////////////////////////// Synced Data ////////////////////////////////////////
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TraceOp {
    #[serde(rename = "CALL")]
    Call,
    #[serde(rename = "CREATE2")]
    Create2,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceStep {
    pub op: TraceOp,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contract_hashed_bytecode: Option<B256>,
    pub address: Address,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input: Option<Bytes>,
    pub depth: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_data: Option<Bytes>,
}
