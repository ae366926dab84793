use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

////////////////////////////////// Compiler Output /////////////////////////////////////
// Subset of a Hardhat build-info file: solc standard JSON input and output.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BuildInfo {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub input: BuildInput,
    #[serde(default)]
    pub output: BuildOutput,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BuildInput {
    #[serde(default)]
    pub sources: BTreeMap<String, InputSource>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct InputSource {
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BuildOutput {
    /// Source file -> contract name -> compiled contract.
    #[serde(default)]
    pub contracts: BTreeMap<String, BTreeMap<String, CompiledContract>>,
    #[serde(default)]
    pub sources: BTreeMap<String, OutputSource>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CompiledContract {
    #[serde(default)]
    pub abi: Value,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OutputSource {
    #[serde(default)]
    pub ast: Value,
}

/////////////////////////////////// Synced Data ////////////////////////////////////////
/// Self-contained description of one contract, sent as an opaque string.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractArtifact<'a> {
    pub contract_name: &'a str,
    pub abi: &'a Value,
    pub ast: &'a Value,
    pub source: Option<&'a str>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ArtifactBundle {
    pub name: String,
    pub address: String,
    pub abi: Value,
    pub artifact: String,
    /// Contract name -> serialized [`ContractArtifact`], target excluded.
    pub dependencies: BTreeMap<String, String>,
}

impl ArtifactBundle {
    /// True when the requested contract was not found in any build unit.
    pub fn is_empty(&self) -> bool {
        self.name.is_empty()
    }
}
