//! Converter configuration
//!
//! Loaded from YAML. Resolution order for the file:
//! 1. Explicit path (`--config`)
//! 2. `CF2TF_CONFIG` environment variable
//! 3. `cf2tf.yaml` in the service directory, if present
//! 4. Built-in defaults
//!
//! After loading, `AWS_REGION`/`AWS_DEFAULT_REGION`, `AWS_ACCOUNT_ID` and
//! `AWS_PROFILE` override the file. Command-line flags override both.
//!
//! ```yaml
//! environment:
//!   region: eu-west-1
//!   account_id: "123456789012"
//! provider:
//!   profile: dev
//!   version: "~> 2.0"
//! imports:
//!   shared-vpc-id: vpc-0abc
//! remote_state:
//!   name: shared
//!   backend: s3
//!   config:
//!     bucket: tf-state
//!     key: shared.tfstate
//! output_dir: .serverless
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::converter::DEFAULT_PROVIDER_VERSION;
use crate::reference_map::DeploymentEnvironment;
use crate::remote_state::{NoRemoteState, RemoteState, StaticRemoteState, TerraformRemoteState};

/// Environment variable naming the config file
pub const CONFIG_ENV: &str = "CF2TF_CONFIG";

/// Config file looked up in the service directory
pub const CONFIG_FILE_NAME: &str = "cf2tf.yaml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

/// `provider` section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub profile: Option<String>,
    pub version: String,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            profile: None,
            version: DEFAULT_PROVIDER_VERSION.to_string(),
        }
    }
}

/// `remote_state` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteStateConfig {
    #[serde(default = "default_remote_state_name")]
    pub name: String,
    pub backend: String,
    #[serde(default)]
    pub config: BTreeMap<String, JsonValue>,
}

fn default_remote_state_name() -> String {
    "imports".to_string()
}

/// Full configuration file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Cf2TfConfig {
    pub environment: DeploymentEnvironment,
    pub provider: ProviderConfig,
    /// Static values for `Fn::ImportValue`, by export name
    pub imports: BTreeMap<String, JsonValue>,
    pub remote_state: Option<RemoteStateConfig>,
    pub output_dir: Option<PathBuf>,
}

impl Cf2TfConfig {
    /// Load a config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_yaml_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn from_yaml_str(text: &str) -> Result<Self, serde_yaml::Error> {
        // An empty file is a valid, all-defaults config
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(text)
    }

    /// Find and load the config for a service, falling back to defaults
    pub fn discover(explicit: Option<&Path>, service_dir: &Path) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            return Self::load(path);
        }
        let local = service_dir.join(CONFIG_FILE_NAME);
        if local.is_file() {
            return Self::load(local);
        }
        debug!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Apply `AWS_*` overrides from the process environment
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply `AWS_*` overrides from `lookup`
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(region) = lookup("AWS_REGION").or_else(|| lookup("AWS_DEFAULT_REGION")) {
            debug!("Region overridden from environment: {}", region);
            self.environment.region = region;
        }
        if let Some(account) = lookup("AWS_ACCOUNT_ID") {
            self.environment.account_id = account;
        }
        if let Some(profile) = lookup("AWS_PROFILE") {
            self.provider.profile = Some(profile);
        }
    }

    /// Accessor for `Fn::ImportValue`: remote state when configured, else
    /// the static `imports` table, else none
    pub fn remote_state(&self) -> Box<dyn RemoteState> {
        if let Some(state) = self.terraform_remote_state() {
            return Box::new(state);
        }
        if !self.imports.is_empty() {
            return Box::new(StaticRemoteState::new(self.imports.clone()));
        }
        Box::new(NoRemoteState)
    }

    /// The `terraform_remote_state` data source to declare, if configured
    pub fn terraform_remote_state(&self) -> Option<TerraformRemoteState> {
        self.remote_state.as_ref().map(|remote| {
            let mut state = TerraformRemoteState::new(&remote.name, &remote.backend);
            state.config = remote.config.clone();
            state
        })
    }
}
