use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

use crate::artifacts::ArtifactSource;
use crate::models::datasets::contracts::BuildInfo;
use crate::models::errors::SyncError;

const BUILD_INFO_DIR: &str = "build-info";
const DEBUG_SUFFIX: &str = ".dbg.json";

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ArtifactHeader {
    contract_name: String,
    source_name: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DebugFile {
    build_info: String,
}

/// Reads a Hardhat `artifacts/` directory.
///
/// Each contract has `<source>/<Name>.json` and a `<Name>.dbg.json` next to
/// it pointing at the build info under `build-info/`.
pub struct HardhatArtifacts {
    root: PathBuf,
}

impl HardhatArtifacts {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, SyncError> {
        let content = fs::read_to_string(path).map_err(|e| SyncError::Artifacts {
            message: format!("{}: {e}", path.display()),
        })?;
        serde_json::from_str(&content).map_err(|e| SyncError::Artifacts {
            message: format!("{}: {e}", path.display()),
        })
    }
}

impl ArtifactSource for HardhatArtifacts {
    fn fully_qualified_names(&self) -> Result<Vec<String>, SyncError> {
        if !self.root.is_dir() {
            debug!("No artifacts directory at {}", self.root.display());
            return Ok(Vec::new());
        }

        let mut names = Vec::new();
        let entries = WalkDir::new(&self.root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| entry.file_name() != BUILD_INFO_DIR);

        for entry in entries {
            let entry = entry.map_err(|e| SyncError::Artifacts {
                message: e.to_string(),
            })?;
            let file_name = entry.file_name().to_string_lossy();
            if !entry.file_type().is_file()
                || !file_name.ends_with(".json")
                || file_name.ends_with(DEBUG_SUFFIX)
            {
                continue;
            }

            match Self::read_json::<ArtifactHeader>(entry.path()) {
                Ok(header) => names.push(format!("{}:{}", header.source_name, header.contract_name)),
                Err(e) => debug!("Not a contract artifact, skipping: {}", e),
            }
        }

        Ok(names)
    }

    fn build_info(&self, fully_qualified_name: &str) -> Result<Option<BuildInfo>, SyncError> {
        let Some((source_name, contract_name)) = fully_qualified_name.rsplit_once(':') else {
            return Err(SyncError::Artifacts {
                message: format!("not a fully qualified name: {fully_qualified_name}"),
            });
        };

        let debug_path = self
            .root
            .join(source_name)
            .join(format!("{contract_name}{DEBUG_SUFFIX}"));
        if !debug_path.is_file() {
            return Ok(None);
        }

        let debug_file: DebugFile = Self::read_json(&debug_path)?;
        let build_info_path = debug_path
            .parent()
            .unwrap_or(&self.root)
            .join(debug_file.build_info);

        Self::read_json(&build_info_path).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn write(path: &Path, value: serde_json::Value) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, value.to_string()).unwrap();
    }

    #[test]
    fn reads_names_and_build_info() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        let contract_dir = root.join("contracts/Token.sol");

        write(
            &contract_dir.join("Token.json"),
            json!({ "contractName": "Token", "sourceName": "contracts/Token.sol", "abi": [] }),
        );
        write(
            &contract_dir.join("Token.dbg.json"),
            json!({ "_format": "hh-sol-dbg-1", "buildInfo": "../../build-info/abc.json" }),
        );
        write(
            &root.join("build-info/abc.json"),
            json!({
                "id": "abc",
                "input": { "sources": { "contracts/Token.sol": { "content": "contract Token {}" } } },
                "output": { "contracts": { "contracts/Token.sol": { "Token": { "abi": [] } } } }
            }),
        );

        let artifacts = HardhatArtifacts::new(root);
        let names = artifacts.fully_qualified_names().unwrap();
        assert_eq!(names, vec!["contracts/Token.sol:Token".to_string()]);

        let build_info = artifacts.build_info(&names[0]).unwrap().unwrap();
        assert_eq!(build_info.id.as_deref(), Some("abc"));
        assert!(build_info.output.contracts["contracts/Token.sol"].contains_key("Token"));

        assert!(artifacts.build_info("contracts/Other.sol:Other").unwrap().is_none());
    }

    #[test]
    fn missing_directory_has_no_names() {
        let artifacts = HardhatArtifacts::new("/nonexistent/artifacts");
        assert!(artifacts.fully_qualified_names().unwrap().is_empty());
    }
}
