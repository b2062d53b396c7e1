use crate::domain::ml::feature_registry::FEATURE_NAMES;
use crate::domain::ml::horizon::Horizon;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

pub const MANIFEST_FILE_NAME: &str = "features.json";
pub const PACKAGE_FORMAT_VERSION: &str = "1.0";
pub const PACKAGE_TYPE: &str = "split_prob_json";

/// `features.json` written next to the three horizon ensembles of a package
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageManifest {
    #[serde(default)]
    pub symbol: String,
    #[serde(default)]
    pub version: String,
    #[serde(rename = "type", default)]
    pub package_type: String,
    /// Evaluator input order. Older packages call this `names`.
    #[serde(alias = "names", default)]
    pub inputs: Vec<String>,
    #[serde(default)]
    pub models: Vec<String>,
    #[serde(default)]
    pub thresholds: BTreeMap<Horizon, f64>,
}

impl PackageManifest {
    pub fn for_symbol(symbol: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            version: PACKAGE_FORMAT_VERSION.to_string(),
            package_type: PACKAGE_TYPE.to_string(),
            inputs: FEATURE_NAMES.iter().map(|s| s.to_string()).collect(),
            models: Horizon::ALL.iter().map(|h| h.package_file_name()).collect(),
            thresholds: Horizon::ALL
                .iter()
                .map(|h| (*h, h.spec().threshold))
                .collect(),
        }
    }
}

/// Evaluator input order from any manifest-shaped JSON: `inputs`, else the
/// legacy `names`. Other keys are not inspected, so manifests written by
/// other tools still yield their order. Non-string entries are skipped.
pub fn manifest_inputs(manifest: &Value) -> Vec<String> {
    manifest
        .get("inputs")
        .or_else(|| manifest.get("names"))
        .and_then(Value::as_array)
        .map(|names| {
            names
                .iter()
                .filter_map(|n| n.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manifest_contents() {
        let manifest = PackageManifest::for_symbol("CCS.N0000");
        assert_eq!(manifest.inputs, FEATURE_NAMES.to_vec());
        assert_eq!(
            manifest.models,
            vec!["model_4H.json", "model_2D.json", "model_5D.json"]
        );
        assert_eq!(manifest.thresholds[&Horizon::FiveDays], 0.05);
    }

    #[test]
    fn test_manifest_json_shape() {
        let manifest = PackageManifest::for_symbol("AAPL");
        let value = serde_json::to_value(&manifest).unwrap();
        assert_eq!(value["type"], "split_prob_json");
        assert_eq!(value["version"], "1.0");
        assert_eq!(value["thresholds"]["2D"], 0.03);
        assert_eq!(value["inputs"][0], "Vol_Z_1H");
    }

    #[test]
    fn test_inputs_read_from_foreign_manifests() {
        let no_symbol = serde_json::json!({ "names": ["hour_of_day"] });
        assert_eq!(manifest_inputs(&no_symbol), vec!["hour_of_day"]);

        let odd_fields = serde_json::json!({
            "version": 1.0,
            "thresholds": { "1W": 0.1 },
            "inputs": ["Vol_Z_1H", 3, "hour_of_day"],
            "names": ["ignored"]
        });
        assert_eq!(manifest_inputs(&odd_fields), vec!["Vol_Z_1H", "hour_of_day"]);

        assert!(manifest_inputs(&serde_json::json!({ "inputs": "Vol_Z_1H" })).is_empty());
    }

    #[test]
    fn test_legacy_names_key() {
        let json = r#"{"symbol": "AAPL", "names": ["Vol_Z", "Elasticity"]}"#;
        let manifest: PackageManifest = serde_json::from_str(json).unwrap();
        assert_eq!(manifest.inputs, vec!["Vol_Z", "Elasticity"]);
        assert!(manifest.thresholds.is_empty());
    }
}
