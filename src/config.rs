//! Runtime configuration for loadstone.
//!
//! Layered: built-in defaults, then the optional `.loadstone/loadstone.toml`
//! file, then environment variables (a `.env` file is honored via dotenvy).
//! Missing dataset settings fall back to placeholders with a logged warning
//! so exploratory sessions still work.
//!
//! ```toml
//! [warehouse]
//! base_url = "https://warehouse.internal"
//!
//! [datasets]
//! source = "proj.raw"
//! target = "proj.marts"
//!
//! [limits]
//! sample_rows = 10
//! plan_iterations = 3
//! sql_iterations = 5
//! call_timeout_secs = 60
//!
//! [reasoner]
//! cmd = "llm"
//! args = ["--no-stream"]
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

const PLACEHOLDER_SOURCE: &str = "mock_project.mock_dataset";
const PLACEHOLDER_TARGET: &str = "mock_project.mock_target";

#[derive(Debug, Clone)]
pub struct Config {
    pub project_dir: PathBuf,
    pub state_file: PathBuf,
    /// Dataset to discover source tables in.
    pub source_dataset: String,
    /// Dataset that data-movement jobs write into.
    pub target_dataset: String,
    pub warehouse_url: String,
    pub warehouse_token: Option<String>,
    pub reasoner_cmd: String,
    pub reasoner_args: Vec<String>,
    pub sample_row_limit: usize,
    pub plan_max_iterations: u32,
    pub sql_max_iterations: u32,
    pub call_timeout_secs: u64,
    pub verbose: bool,
}

#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    #[serde(default)]
    warehouse: WarehouseSection,
    #[serde(default)]
    datasets: DatasetsSection,
    #[serde(default)]
    limits: LimitsSection,
    #[serde(default)]
    reasoner: ReasonerSection,
}

#[derive(Debug, Default, Deserialize)]
struct WarehouseSection {
    base_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct DatasetsSection {
    source: Option<String>,
    target: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct LimitsSection {
    sample_rows: Option<usize>,
    plan_iterations: Option<u32>,
    sql_iterations: Option<u32>,
    call_timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ReasonerSection {
    cmd: Option<String>,
    #[serde(default)]
    args: Vec<String>,
}

impl FileConfig {
    fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }
}

impl Config {
    /// Resolve the full configuration for a project directory.
    pub fn load(project_dir: PathBuf, verbose: bool) -> Result<Self> {
        let project_dir = project_dir
            .canonicalize()
            .context("Failed to resolve project directory")?;

        // .env in the project dir, if any; environment wins over file config.
        let _ = dotenvy::from_path(project_dir.join(".env"));

        let loadstone_dir = project_dir.join(".loadstone");
        let file = FileConfig::load(&loadstone_dir.join("loadstone.toml"))?;

        let source_dataset = std::env::var("DATA_SOURCE")
            .ok()
            .or(file.datasets.source)
            .unwrap_or_else(|| {
                tracing::warn!("DATA_SOURCE not set, using placeholder dataset");
                PLACEHOLDER_SOURCE.to_string()
            });
        let target_dataset = std::env::var("DATA_TARGET")
            .ok()
            .or(file.datasets.target)
            .unwrap_or_else(|| {
                tracing::warn!("DATA_TARGET not set, using placeholder dataset");
                PLACEHOLDER_TARGET.to_string()
            });

        let warehouse_url = std::env::var("WAREHOUSE_API_URL")
            .ok()
            .or(file.warehouse.base_url)
            .unwrap_or_else(|| "http://localhost:8080".to_string());
        let warehouse_token = std::env::var("WAREHOUSE_API_TOKEN").ok();

        let reasoner_cmd = std::env::var("REASONER_CMD")
            .ok()
            .or(file.reasoner.cmd)
            .unwrap_or_else(|| "llm".to_string());

        Ok(Self {
            state_file: loadstone_dir.join("session.json"),
            project_dir,
            source_dataset,
            target_dataset,
            warehouse_url,
            warehouse_token,
            reasoner_cmd,
            reasoner_args: file.reasoner.args,
            sample_row_limit: file.limits.sample_rows.unwrap_or(10),
            plan_max_iterations: file.limits.plan_iterations.unwrap_or(3),
            sql_max_iterations: file.limits.sql_iterations.unwrap_or(5),
            call_timeout_secs: file.limits.call_timeout_secs.unwrap_or(60),
            verbose,
        })
    }

    pub fn ensure_directories(&self) -> Result<()> {
        if let Some(parent) = self.state_file.parent() {
            std::fs::create_dir_all(parent).context("Failed to create .loadstone directory")?;
        }
        Ok(())
    }
}
