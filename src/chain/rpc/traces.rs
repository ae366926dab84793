use alloy_primitives::Address;
use alloy_rpc_types_trace::geth::CallFrame;

use crate::models::datasets::traces::TraceNode;

// Precompiles live at 0x01..=0x0a on mainnet-like dev chains
fn is_precompile(address: &Address) -> bool {
    let bytes = address.as_slice();
    bytes[..19].iter().all(|b| *b == 0) && (1..=0x0a).contains(&bytes[19])
}

/// Convert a call-tracer frame tree into the host trace shape, depth first.
pub fn into_trace_node(frame: CallFrame) -> TraceNode {
    let steps = frame.calls.into_iter().map(into_trace_node).collect();

    match frame.typ.to_uppercase().as_str() {
        "CREATE" | "CREATE2" => TraceNode::Create {
            deployed_contract: frame.to.filter(|_| frame.error.is_none()),
            steps,
        },
        "CALL" | "STATICCALL" | "DELEGATECALL" | "CALLCODE" => match frame.to {
            Some(address) if is_precompile(&address) => TraceNode::Precompile { address },
            Some(address) => TraceNode::Call {
                address,
                calldata: frame.input,
                return_data: frame.output.unwrap_or_default(),
                steps,
            },
            None => TraceNode::Step,
        },
        _ => TraceNode::Step,
    }
}
