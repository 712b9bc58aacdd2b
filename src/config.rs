//! Engine configuration.
//!
//! The registries an engine consults (regions, units and supported operations) are held in
//! an immutable [EngineConfig] that is injected into the
//! [Orchestrator](crate::orchestrator::Orchestrator).

use crate::catalog::normalize_parameter;
use crate::cli::CommandLineArgs;
use crate::geo::BoundingBox;
use crate::models::TimestampSource;
use crate::operation::Operation;

use expanduser::expanduser;
use serde::Deserialize;
use thiserror::Error;
use tracing::info;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Error loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Error reading the configuration file or expanding a path
    #[error("error reading configuration")]
    Io(#[from] std::io::Error),

    /// The configuration file is not valid
    #[error("configuration file is not valid")]
    Json(#[from] serde_json::Error),

    /// A region's minimum exceeds its maximum
    #[error("region '{name}' has a minimum greater than its maximum")]
    InvalidRegion { name: String },
}

/// Engine configuration
///
/// Every field is optional in a configuration file; missing fields take their defaults.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Root directory holding one dataset directory per parameter
    pub dataset_root: PathBuf,
    /// File extension of raster files, without the dot
    pub extension: String,
    /// Named regions, keyed by lower-case name
    pub regions: BTreeMap<String, BoundingBox>,
    /// Unit of each parameter, keyed by parameter name
    pub units: BTreeMap<String, String>,
    /// Operations run for an `all` query, in report order
    pub operations: Vec<Operation>,
    /// Source of temporal series timestamps
    pub timestamps: TimestampSource,
    /// Maximum time in seconds a single operation may take
    pub query_timeout: Option<u64>,
    /// Run the operations of an `all` query on the rayon pool
    pub use_rayon: bool,
}

/// Default region registry
pub fn default_regions() -> BTreeMap<String, BoundingBox> {
    BTreeMap::from([
        (
            "atlantic ocean".to_string(),
            BoundingBox::new(-80.0, 20.0, -60.0, 70.0),
        ),
        (
            "indian ocean".to_string(),
            BoundingBox::new(20.0, 120.0, -60.0, 30.0),
        ),
        (
            "pacific ocean".to_string(),
            BoundingBox::new(180.0, 300.0, -60.0, 60.0),
        ),
    ])
}

/// Default unit table
pub fn default_units() -> BTreeMap<String, String> {
    BTreeMap::from([
        ("ocean currents".to_string(), "m/s".to_string()),
        ("water vapour".to_string(), "mm".to_string()),
    ])
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            dataset_root: PathBuf::from("~/datasets"),
            extension: "tif".to_string(),
            regions: default_regions(),
            units: default_units(),
            operations: Operation::ALL.to_vec(),
            timestamps: TimestampSource::default(),
            query_timeout: None,
            use_rayon: false,
        }
    }
}

impl EngineConfig {
    /// Load a configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Load a configuration from JSON text.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = serde_json::from_str(text)?;
        config.normalized().validate()
    }

    /// Build the configuration from command line arguments.
    ///
    /// Starts from the configuration file, if given, or the defaults. Arguments given on the
    /// command line take precedence over the file. The dataset root has `~` expanded.
    pub fn from_args(args: &CommandLineArgs) -> Result<Self, ConfigError> {
        let mut config = match &args.config {
            Some(path) => {
                info!("Loading configuration from {}", path);
                Self::from_file(&expanduser(path)?)?
            }
            None => Self::default(),
        };
        if let Some(dataset_root) = &args.dataset_root {
            config.dataset_root = PathBuf::from(dataset_root);
        }
        config.dataset_root = expanduser(config.dataset_root.to_string_lossy())?;
        if let Some(timestamps) = args.timestamps {
            config.timestamps = timestamps;
        }
        if args.query_timeout.is_some() {
            config.query_timeout = args.query_timeout;
        }
        config.use_rayon |= args.use_rayon;
        Ok(config)
    }

    /// Lower-case region names and strip a leading dot from the extension.
    fn normalized(mut self) -> Self {
        self.regions = self
            .regions
            .into_iter()
            .map(|(name, bbox)| (name.trim().to_lowercase(), bbox))
            .collect();
        self.extension = self.extension.trim_start_matches('.').to_string();
        self
    }

    /// Check that every region is well formed.
    pub fn validate(self) -> Result<Self, ConfigError> {
        if let Some((name, _)) = self.regions.iter().find(|(_, bbox)| !bbox.is_well_formed()) {
            return Err(ConfigError::InvalidRegion { name: name.clone() });
        }
        Ok(self)
    }

    /// Returns the bounding box of a region, matching its name case-insensitively.
    pub fn region(&self, name: &str) -> Option<&BoundingBox> {
        self.regions.get(&name.trim().to_lowercase())
    }

    /// Returns the unit of a parameter, or an empty string if it is not known.
    ///
    /// Parameter names are compared after normalisation, so `ocean_currents` and
    /// `Ocean Currents` share a unit.
    pub fn unit(&self, parameter: &str) -> &str {
        let parameter = normalize_parameter(parameter);
        self.units
            .iter()
            .find(|(name, _)| normalize_parameter(name) == parameter)
            .map(|(_, unit)| unit.as_str())
            .unwrap_or("")
    }
}
