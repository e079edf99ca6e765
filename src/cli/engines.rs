//! Engines command implementation

use crate::cli::output::{format_engines_json, format_engines_table, EngineView};
use crate::cli::{load_config, EnginesArgs};
use crate::registry::EngineRegistry;

/// Handle `engines` command
pub fn handle_engines(args: &EnginesArgs) -> Result<String, Box<dyn std::error::Error>> {
    let config = load_config(&args.config)?;
    let registry = EngineRegistry::from_config(&config.engines)?;
    list_engines(&registry, args.json)
}

/// Render every registered engine, sorted by name.
pub fn list_engines(
    registry: &EngineRegistry,
    json: bool,
) -> Result<String, Box<dyn std::error::Error>> {
    let views: Vec<EngineView> = registry
        .all()
        .iter()
        .map(|e| EngineView::from(e.as_ref()))
        .collect();

    if json {
        Ok(format_engines_json(&views)?)
    } else {
        Ok(format_engines_table(&views))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::EngineSettings;

    fn registry() -> EngineRegistry {
        let registry = EngineRegistry::new();
        registry
            .add_engine(EngineSettings::new("fast-local", "http://localhost:8080", "qwen2.5-7b"))
            .unwrap();
        registry
            .add_engine(EngineSettings::new("batched-gpu", "http://gpu:8000", "qwen2.5-32b"))
            .unwrap();
        registry
    }

    #[test]
    fn test_list_engines_table() {
        let output = list_engines(&registry(), false).unwrap();
        assert!(output.contains("fast-local"));
        assert!(output.contains("batched-gpu"));
    }

    #[test]
    fn test_list_engines_json_sorted() {
        let output = list_engines(&registry(), true).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(parsed["engines"][0]["name"], "batched-gpu");
        assert_eq!(parsed["engines"][1]["name"], "fast-local");
    }

    #[test]
    fn test_handle_engines_from_file() {
        let temp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(
            temp.path(),
            "[[engines]]\nname = \"fast-local\"\nurl = \"http://localhost:8080\"\nmodel = \"m\"\n",
        )
        .unwrap();

        let args = EnginesArgs {
            json: true,
            config: temp.path().to_path_buf(),
        };
        let output = handle_engines(&args).unwrap();
        assert!(output.contains("fast-local"));
    }
}
