//! cf2tf Command Line Interface
//!
//! Converts Serverless-generated CloudFormation templates into Terraform JSON
//! and drives the CDKTF CLI over the result.
//!
//! # Usage
//!
//! ```bash
//! # Convert the update stack of the service in the current directory
//! cf2tf convert --stack update
//!
//! # Convert an arbitrary template into a directory
//! cf2tf convert --template template.json --region eu-west-1 --out cdktf.out
//!
//! # Write cdktf.json, fetch providers, deploy both stacks
//! cf2tf init && cf2tf get && cf2tf deploy
//! ```

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cf2tf::cdktf::{self, ProjectSettings, Runner};
use cf2tf::serverless::{self, STACKS};
use cf2tf::{convert_with_config, synth, Cf2TfConfig, SourceTemplate, TerraformStack};

#[derive(Parser)]
#[command(name = "cf2tf")]
#[command(version)]
#[command(about = "Convert Serverless CloudFormation templates into Terraform (CDKTF) stacks")]
#[command(long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Serverless service directory
    #[arg(long, global = true, default_value = ".", env = "CF2TF_SERVICE_PATH")]
    service_path: PathBuf,

    /// Config file (defaults to CF2TF_CONFIG, then cf2tf.yaml in the service directory)
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Json,
    Pretty,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert a template into Terraform JSON
    Convert {
        /// Template file (defaults to the service's generated template for --stack)
        #[arg(short, long)]
        template: Option<PathBuf>,

        /// Serverless stack to convert: create or update
        #[arg(short, long, default_value = "update")]
        stack: String,

        #[arg(long)]
        region: Option<String>,

        #[arg(long)]
        account_id: Option<String>,

        #[arg(long)]
        profile: Option<String>,

        /// Write cdk.tf.json into this directory instead of printing it
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Printed output format
        #[arg(long, short = 'f', default_value = "pretty", value_enum)]
        format: OutputFormat,
    },

    /// Write cdktf.json into the service directory
    Init {
        /// Target directory (defaults to the service directory)
        #[arg(long)]
        dir: Option<PathBuf>,
    },

    /// Run `cdktf get`
    Get {
        #[arg(long)]
        cdktf_bin: Option<PathBuf>,
    },

    /// Run `cdktf synth` for a stack (every generated stack if omitted)
    Synth {
        #[arg(short, long)]
        stack: Option<String>,

        #[arg(long)]
        cdktf_bin: Option<PathBuf>,
    },

    /// Run `cdktf deploy --auto-approve` for a stack (every generated stack if omitted)
    Deploy {
        #[arg(short, long)]
        stack: Option<String>,

        #[arg(long)]
        cdktf_bin: Option<PathBuf>,
    },
}

// =============================================================================
// MAIN
// =============================================================================

fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // stdout carries the synthesized JSON
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cf2tf=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let mut config = Cf2TfConfig::discover(cli.config.as_deref(), &cli.service_path)?;
    config.apply_env_overrides();

    match cli.command {
        Commands::Convert {
            template,
            stack,
            region,
            account_id,
            profile,
            out,
            format,
        } => {
            if let Some(region) = region {
                config.environment.region = region;
            }
            if let Some(account_id) = account_id {
                config.environment.account_id = account_id;
            }
            if profile.is_some() {
                config.provider.profile = profile;
            }
            let template_path = match template {
                Some(path) => path,
                None => {
                    check_stack(&stack)?;
                    config.environment.stack_name = stack.clone();
                    serverless::stack_template_path(&cli.service_path, &stack)
                }
            };
            let result = convert(&template_path, &config)?;
            match out.or_else(|| config.output_dir.clone()) {
                Some(dir) => {
                    synth::write(&result, dir)?;
                }
                None => print_stack(&result, format)?,
            }
        }

        Commands::Init { dir } => {
            let dir = dir.unwrap_or_else(|| cli.service_path.clone());
            let settings = ProjectSettings::default().with_provider_version(&config.provider.version);
            cdktf::write_project_file(dir, &settings)?;
        }

        Commands::Get { cdktf_bin } => {
            runner(&cli.service_path, cdktf_bin)?.get()?;
        }

        Commands::Synth { stack, cdktf_bin } => {
            let runner = runner(&cli.service_path, cdktf_bin)?;
            for stack in target_stacks(&cli.service_path, stack)? {
                runner.synth(&stack)?;
            }
        }

        Commands::Deploy { stack, cdktf_bin } => {
            let runner = runner(&cli.service_path, cdktf_bin)?;
            for stack in target_stacks(&cli.service_path, stack)? {
                runner.deploy(&stack)?;
            }
        }
    }

    Ok(())
}

fn convert(path: &Path, config: &Cf2TfConfig) -> Result<TerraformStack> {
    let template = SourceTemplate::from_path(path)
        .with_context(|| format!("Failed to load template {}", path.display()))?;
    let stack = convert_with_config(&template, config)
        .with_context(|| format!("Failed to convert {}", path.display()))?;
    Ok(stack)
}

fn print_stack(stack: &TerraformStack, format: OutputFormat) -> Result<()> {
    let json = synth::to_json(stack);
    let text = match format {
        OutputFormat::Json => serde_json::to_string(&json)?,
        OutputFormat::Pretty => serde_json::to_string_pretty(&json)?,
    };
    println!("{}", text);
    Ok(())
}

fn check_stack(stack: &str) -> Result<()> {
    if !STACKS.contains(&stack) {
        bail!("Unknown stack '{}', expected one of: {}", stack, STACKS.join(", "));
    }
    Ok(())
}

/// The requested stack, or every stack the service has a template for
fn target_stacks(service_path: &Path, stack: Option<String>) -> Result<Vec<String>> {
    if let Some(stack) = stack {
        check_stack(&stack)?;
        return Ok(vec![stack]);
    }
    let stacks: Vec<String> = serverless::stack_templates(service_path)
        .into_iter()
        .map(|t| t.stack)
        .collect();
    if stacks.is_empty() {
        bail!(
            "No generated templates in {}, run `serverless package` first",
            service_path.join(serverless::SERVERLESS_DIR).display()
        );
    }
    Ok(stacks)
}

/// Runner using this executable as the CDKTF app
fn runner(service_path: &Path, cdktf_bin: Option<PathBuf>) -> Result<Runner> {
    let exe = std::env::current_exe().context("Failed to locate the cf2tf executable")?;
    let mut runner = Runner::new(service_path)?.with_app_bin(exe.display().to_string());
    if let Some(bin) = cdktf_bin {
        runner = runner.with_cdktf_bin(bin);
    }
    Ok(runner)
}
