pub mod hardhat;

use serde_json::Value;
use std::collections::HashSet;
use tracing::{debug, warn};

use crate::models::datasets::contracts::{ArtifactBundle, BuildInfo, ContractArtifact};
use crate::models::errors::SyncError;

/// Where compiled build units come from.
pub trait ArtifactSource: Send + Sync {
    /// Every compiled contract, as `source/File.sol:Name`.
    fn fully_qualified_names(&self) -> Result<Vec<String>, SyncError>;

    /// Build info that produced `fully_qualified_name`, `None` if none was recorded.
    fn build_info(&self, fully_qualified_name: &str) -> Result<Option<BuildInfo>, SyncError>;
}

pub struct ArtifactResolver {
    source: Box<dyn ArtifactSource>,
}

impl ArtifactResolver {
    pub fn new(source: Box<dyn ArtifactSource>) -> Self {
        Self { source }
    }

    /// Bundle `contract_name` with every other co-compiled contract.
    ///
    /// Returns an empty bundle (see [`ArtifactBundle::is_empty`]) when no
    /// build unit defines the contract. A dependency name defined in more
    /// than one source file keeps the last definition seen.
    pub fn resolve(&self, contract_name: &str, address: &str) -> Result<ArtifactBundle, SyncError> {
        let mut bundle = ArtifactBundle::default();
        let mut seen_builds = HashSet::new();

        for fully_qualified_name in self.source.fully_qualified_names()? {
            let build_info = match self.source.build_info(&fully_qualified_name) {
                Ok(Some(build_info)) => build_info,
                Ok(None) => {
                    debug!("No build info for {}, skipping", fully_qualified_name);
                    continue;
                }
                Err(e) => {
                    warn!("Skipping {}: {}", fully_qualified_name, e);
                    continue;
                }
            };

            // Several contracts usually share one build
            if let Some(id) = &build_info.id {
                if !seen_builds.insert(id.clone()) {
                    continue;
                }
            }

            collect_build(&build_info, contract_name, address, &mut bundle)?;
        }

        Ok(bundle)
    }
}

fn collect_build(
    build_info: &BuildInfo,
    contract_name: &str,
    address: &str,
    bundle: &mut ArtifactBundle,
) -> Result<(), SyncError> {
    for (contract_file, contracts) in &build_info.output.contracts {
        let ast = build_info
            .output
            .sources
            .get(contract_file)
            .map(|source| &source.ast)
            .unwrap_or(&Value::Null);
        let source = build_info
            .input
            .sources
            .get(contract_file)
            .and_then(|source| source.content.as_deref());

        for (name, contract) in contracts {
            let artifact = serde_json::to_string(&ContractArtifact {
                contract_name: name,
                abi: &contract.abi,
                ast,
                source,
            })
            .map_err(|e| SyncError::Artifacts {
                message: format!("failed to serialize {name}: {e}"),
            })?;

            if name == contract_name {
                bundle.name = name.clone();
                bundle.address = address.to_string();
                bundle.abi = contract.abi.clone();
                bundle.artifact = artifact;
            } else {
                if bundle.dependencies.insert(name.clone(), artifact).is_some() {
                    debug!("{} is defined more than once, keeping {}", name, contract_file);
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::BTreeMap;

    struct StaticSource(BTreeMap<String, Option<BuildInfo>>);

    impl ArtifactSource for StaticSource {
        fn fully_qualified_names(&self) -> Result<Vec<String>, SyncError> {
            Ok(self.0.keys().cloned().collect())
        }

        fn build_info(&self, fully_qualified_name: &str) -> Result<Option<BuildInfo>, SyncError> {
            Ok(self.0.get(fully_qualified_name).cloned().flatten())
        }
    }

    fn build(id: &str, file: &str, names: &[&str]) -> BuildInfo {
        let contracts: serde_json::Map<String, Value> = names
            .iter()
            .map(|name| (name.to_string(), json!({ "abi": [{ "name": format!("{name}Fn") }] })))
            .collect();
        serde_json::from_value(json!({
            "id": id,
            "input": { "sources": { file: { "content": format!("// {file}") } } },
            "output": {
                "contracts": { file: contracts },
                "sources": { file: { "ast": { "absolutePath": file } } }
            }
        }))
        .unwrap()
    }

    #[test]
    fn duplicate_dependency_keeps_last_definition() {
        let mut units = BTreeMap::new();
        units.insert("a/Token.sol:Token".to_string(), Some(build("1", "a/Token.sol", &["Token", "Math"])));
        units.insert("b/Math.sol:Math".to_string(), Some(build("2", "b/Math.sol", &["Math"])));
        units.insert("c/Missing.sol:Missing".to_string(), None);

        let bundle = ArtifactResolver::new(Box::new(StaticSource(units)))
            .resolve("Token", "0xabc")
            .unwrap();

        assert_eq!(bundle.name, "Token");
        assert_eq!(bundle.dependencies.len(), 1);
        assert!(bundle.dependencies["Math"].contains("b/Math.sol"));
        assert!(!bundle.dependencies.contains_key("Token"));
    }
}
