//! Project configuration for DocDrift

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Name of the per-project state directory
pub const STATE_DIR: &str = ".docdrift";

/// Configuration for a project being analyzed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepoConfig {
    /// Directories (relative to the project root) holding source code
    #[serde(default = "default_source_dirs")]
    pub source_dirs: Vec<String>,

    /// Documentation directory; root-level README files are always included
    #[serde(default = "default_docs_dir")]
    pub docs_dir: String,

    /// Source file extensions to analyze
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,

    /// Patterns to ignore (glob patterns)
    #[serde(default = "default_ignore_patterns")]
    pub ignore_patterns: Vec<String>,

    /// Import specifier prefixes mapped to project-relative directories
    #[serde(default = "default_path_aliases")]
    pub path_aliases: BTreeMap<String, String>,

    /// Call graph defaults
    #[serde(default)]
    pub call_graph: CallGraphConfig,

    /// LLM endpoint configuration
    #[serde(default)]
    pub llm: LlmConfig,
}

/// Defaults for call graph builds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallGraphConfig {
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
    #[serde(default = "default_true")]
    pub resolve_imports: bool,
    #[serde(default = "default_true")]
    pub extract_conditionals: bool,
    #[serde(default = "default_true")]
    pub track_exceptions: bool,
}

impl Default for CallGraphConfig {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            resolve_imports: true,
            extract_conditionals: true,
            track_exceptions: true,
        }
    }
}

/// LLM configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// API endpoint URL (e.g., http://localhost:11434/api for Ollama)
    pub endpoint: Option<String>,

    /// Model name to use
    pub model: Option<String>,

    /// API key (if required)
    pub api_key: Option<String>,

    /// Maximum tokens for response
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,

    /// Temperature for generation
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Request timeout; a slow backend degrades instead of blocking
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            model: None,
            api_key: None,
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_source_dirs() -> Vec<String> {
    vec!["src".to_string(), "lib".to_string()]
}

fn default_docs_dir() -> String {
    "docs".to_string()
}

fn default_extensions() -> Vec<String> {
    ["ts", "tsx", "js", "jsx", "mjs", "cjs", "py", "rs"]
        .iter()
        .map(|e| e.to_string())
        .collect()
}

fn default_ignore_patterns() -> Vec<String> {
    vec![
        "node_modules/**".to_string(),
        "target/**".to_string(),
        ".git/**".to_string(),
        "dist/**".to_string(),
        ".docdrift/**".to_string(),
    ]
}

fn default_path_aliases() -> BTreeMap<String, String> {
    BTreeMap::from([("@/".to_string(), "src/".to_string())])
}

fn default_max_depth() -> usize {
    3
}

fn default_true() -> bool {
    true
}

fn default_max_tokens() -> usize {
    2048
}

fn default_temperature() -> f32 {
    0.3
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for RepoConfig {
    fn default() -> Self {
        Self {
            source_dirs: default_source_dirs(),
            docs_dir: default_docs_dir(),
            extensions: default_extensions(),
            ignore_patterns: default_ignore_patterns(),
            path_aliases: default_path_aliases(),
            call_graph: CallGraphConfig::default(),
            llm: LlmConfig::default(),
        }
    }
}

impl RepoConfig {
    /// Load configuration from the project or return defaults
    pub fn load_or_default(project_root: &Path) -> Result<Self> {
        let config_path = project_root.join(STATE_DIR).join("config.toml");

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)
                .with_context(|| format!("Failed to read config file: {:?}", config_path))?;
            let config: RepoConfig = toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {:?}", config_path))?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to the project
    pub fn save(&self, project_root: &Path) -> Result<()> {
        let state_dir = project_root.join(STATE_DIR);
        std::fs::create_dir_all(&state_dir)?;

        let config_path = state_dir.join("config.toml");
        let content = toml::to_string_pretty(self).context("Failed to serialize configuration")?;

        std::fs::write(&config_path, content)
            .with_context(|| format!("Failed to write config file: {:?}", config_path))?;

        Ok(())
    }

    /// Check if a project-relative path should be ignored
    pub fn should_ignore(&self, path: &str) -> bool {
        self.ignore_patterns
            .iter()
            .any(|pattern| glob_match_simple(pattern, path))
    }

    /// Check if a path has a configured source extension
    pub fn is_source_file(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|ext| self.extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)))
            .unwrap_or(false)
    }
}

/// Simple glob matching helper
fn glob_match_simple(pattern: &str, path: &str) -> bool {
    if pattern.contains("**") {
        let parts: Vec<&str> = pattern.split("**").collect();
        if parts.len() == 2 {
            let prefix = parts[0].trim_end_matches('/');
            let suffix = parts[1].trim_start_matches('/');
            let in_prefix = prefix.is_empty()
                || path.starts_with(&format!("{}/", prefix))
                || path.contains(&format!("/{}/", prefix));
            return in_prefix && (suffix.is_empty() || glob_match_simple(suffix, path));
        }
    }

    if pattern.contains('*') {
        let parts: Vec<&str> = pattern.split('*').collect();
        if parts.len() == 2 {
            let name = path.rsplit('/').next().unwrap_or(path);
            return (path.starts_with(parts[0]) || name.starts_with(parts[0]))
                && path.ends_with(parts[1]);
        }
    }

    path == pattern || path.ends_with(&format!("/{}", pattern))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RepoConfig::default();
        assert_eq!(config.source_dirs, vec!["src", "lib"]);
        assert_eq!(config.call_graph.max_depth, 3);
        assert!(config.call_graph.resolve_imports);
        assert_eq!(config.path_aliases.get("@/").map(String::as_str), Some("src/"));
        assert!(config.is_source_file(Path::new("a/b.tsx")));
        assert!(!config.is_source_file(Path::new("README.md")));
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: RepoConfig = toml::from_str("docs_dir = \"guide\"\n[call_graph]\nmax_depth = 5\n").unwrap();
        assert_eq!(config.docs_dir, "guide");
        assert_eq!(config.call_graph.max_depth, 5);
        assert!(config.call_graph.track_exceptions);
        assert_eq!(config.llm.timeout_secs, 30);
    }

    #[test]
    fn test_glob_matching() {
        assert!(glob_match_simple("*.md", "README.md"));
        assert!(glob_match_simple("node_modules/**", "node_modules/pkg/index.js"));
        assert!(glob_match_simple("node_modules/**", "web/node_modules/pkg/index.js"));
        assert!(!glob_match_simple("dist/**", "src/distance.ts"));
        assert!(!glob_match_simple("*.rs", "README.md"));
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = RepoConfig::default();
        config.docs_dir = "handbook".to_string();
        config.save(dir.path()).unwrap();

        let loaded = RepoConfig::load_or_default(dir.path()).unwrap();
        assert_eq!(loaded.docs_dir, "handbook");
    }
}
