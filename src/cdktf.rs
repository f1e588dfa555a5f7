//! CDKTF project plumbing
//!
//! Writes the `cdktf.json` project file next to a Serverless service and
//! drives the `cdktf` CLI (`get`, `synth`, `deploy`) for one converted stack.
//! The CLI is run with the service directory as working directory and the
//! converter as the CDKTF app, so `synth` and `deploy` go through the same
//! conversion the `convert` command performs.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;
use xshell::{cmd, Shell};

use crate::converter::DEFAULT_PROVIDER_VERSION;

/// Project file the `cdktf` CLI reads
pub const PROJECT_FILE_NAME: &str = "cdktf.json";

/// `cdktf` binary installed by the service's node_modules
pub const DEFAULT_CDKTF_BIN: &str = "./node_modules/.bin/cdktf";

/// `cdktf.json` contents
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSettings {
    pub language: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app: Option<String>,
    pub code_maker_output: String,
    pub output: String,
    pub terraform_providers: Vec<String>,
}

impl Default for ProjectSettings {
    fn default() -> Self {
        Self {
            language: "typescript".to_string(),
            app: None,
            code_maker_output: ".serverless/.gen".to_string(),
            output: ".serverless/cdktf.out".to_string(),
            terraform_providers: vec![format!("aws@{}", DEFAULT_PROVIDER_VERSION)],
        }
    }
}

impl ProjectSettings {
    /// Pin the AWS provider to `version`
    pub fn with_provider_version(mut self, version: &str) -> Self {
        self.terraform_providers = vec![format!("aws@{}", version)];
        self
    }
}

/// Write `cdktf.json` into `dir`
pub fn write_project_file(dir: impl AsRef<Path>, settings: &ProjectSettings) -> Result<PathBuf> {
    let path = dir.as_ref().join(PROJECT_FILE_NAME);
    let text = serde_json::to_string_pretty(settings)?;
    std::fs::write(&path, text + "\n")
        .with_context(|| format!("Failed to write {}", path.display()))?;
    info!("Wrote {}", path.display());
    Ok(path)
}

/// Synthesized output directory for a stack, relative to the service
pub fn stack_output_dir(stack: &str) -> PathBuf {
    PathBuf::from(format!(".serverless/cdktf-{}", stack))
}

// =============================================================================
// CLI RUNNER
// =============================================================================

/// Runs the `cdktf` CLI inside a service directory
pub struct Runner {
    sh: Shell,
    cdktf_bin: PathBuf,
    app_bin: String,
}

impl Runner {
    pub fn new(service_dir: impl AsRef<Path>) -> Result<Self> {
        let sh = Shell::new()?;
        sh.change_dir(service_dir.as_ref());
        Ok(Self {
            sh,
            cdktf_bin: PathBuf::from(DEFAULT_CDKTF_BIN),
            app_bin: "cf2tf".to_string(),
        })
    }

    pub fn with_cdktf_bin(mut self, path: impl Into<PathBuf>) -> Self {
        self.cdktf_bin = path.into();
        self
    }

    /// Command the CDKTF CLI invokes as its app
    pub fn with_app_bin(mut self, bin: impl Into<String>) -> Self {
        self.app_bin = bin.into();
        self
    }

    /// App command converting `stack` into its output directory
    pub fn app_command(&self, stack: &str) -> String {
        format!(
            "{} convert --stack {} --out {}",
            self.app_bin,
            stack,
            stack_output_dir(stack).display()
        )
    }

    fn stack_args(&self, subcommand: &str, stack: &str) -> Vec<String> {
        let mut args = vec![
            subcommand.to_string(),
            "-a".to_string(),
            self.app_command(stack),
            "-o".to_string(),
            stack_output_dir(stack).display().to_string(),
        ];
        if subcommand == "deploy" {
            args.push("--auto-approve".to_string());
        }
        args
    }

    /// Arguments of `cdktf synth` for `stack`
    pub fn synth_args(&self, stack: &str) -> Vec<String> {
        self.stack_args("synth", stack)
    }

    /// Arguments of `cdktf deploy` for `stack`
    pub fn deploy_args(&self, stack: &str) -> Vec<String> {
        self.stack_args("deploy", stack)
    }

    /// Generate provider bindings
    pub fn get(&self) -> Result<()> {
        self.run(vec!["get".to_string()])
    }

    pub fn synth(&self, stack: &str) -> Result<()> {
        self.run(self.synth_args(stack))
    }

    pub fn deploy(&self, stack: &str) -> Result<()> {
        self.run(self.deploy_args(stack))
    }

    fn run(&self, args: Vec<String>) -> Result<()> {
        let sh = &self.sh;
        let bin = &self.cdktf_bin;
        let subcommand = args.first().cloned().unwrap_or_default();
        info!("Running cdktf {}", subcommand);
        cmd!(sh, "{bin} {args...}")
            .run()
            .with_context(|| format!("cdktf {} failed", subcommand))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_project_settings() {
        let json = serde_json::to_value(ProjectSettings::default()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "language": "typescript",
                "codeMakerOutput": ".serverless/.gen",
                "output": ".serverless/cdktf.out",
                "terraformProviders": ["aws@~> 2.0"]
            })
        );
    }

    #[test]
    fn test_write_project_file() {
        let dir = tempfile::tempdir().unwrap();
        let settings = ProjectSettings {
            app: Some("cf2tf convert".to_string()),
            ..ProjectSettings::default()
        }
        .with_provider_version("~> 3.0");
        let path = write_project_file(dir.path(), &settings).unwrap();

        assert_eq!(path, dir.path().join(PROJECT_FILE_NAME));
        let read: ProjectSettings =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(read, settings);
        assert_eq!(read.terraform_providers, vec!["aws@~> 3.0".to_string()]);
    }

    #[test]
    fn test_synth_and_deploy_args() {
        let dir = tempfile::tempdir().unwrap();
        let runner = Runner::new(dir.path()).unwrap().with_app_bin("/opt/cf2tf");

        assert_eq!(
            runner.synth_args("create"),
            vec![
                "synth",
                "-a",
                "/opt/cf2tf convert --stack create --out .serverless/cdktf-create",
                "-o",
                ".serverless/cdktf-create",
            ]
        );
        let deploy = runner.deploy_args("update");
        assert_eq!(deploy[0], "deploy");
        assert_eq!(deploy.last().map(String::as_str), Some("--auto-approve"));
    }

    #[test]
    fn test_missing_cdktf_bin_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let runner = Runner::new(dir.path())
            .unwrap()
            .with_cdktf_bin(dir.path().join("no-such-cdktf"));
        let err = runner.get().unwrap_err();
        assert!(err.to_string().contains("cdktf get failed"));
    }
}
