pub mod config {
    use serde::Deserialize;
    use std::fs;
    use std::path::{Path, PathBuf};

    #[derive(Debug, Clone, Deserialize, Default)]
    pub struct OutputConfig {
        pub format: Option<String>,   // "graphviz" | "cypher" | "arangodb" | "mermaid"
        pub truncate: Option<usize>,
    }

    #[derive(Debug, Clone, Deserialize, Default)]
    pub struct Config {
        pub output: Option<OutputConfig>,
    }

    fn default_config_path(root: &Path) -> PathBuf {
        root.join("kube-graph.toml")
    }

    #[must_use]
    pub fn load_config_at(path: &Path) -> Option<Config> {
        let data = fs::read_to_string(path).ok()?;
        toml::from_str::<Config>(&data).ok()
    }

    #[must_use]
    pub fn load_config_near(root: &Path) -> Option<Config> {
        let p = default_config_path(root);
        if p.exists() {
            load_config_at(&p)
        } else {
            None
        }
    }

}
