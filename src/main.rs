//! Command-line front-end for batch surface generation.

use std::io::Write as _;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use molsurf::batch::{run_batch, BatchOptions};
use molsurf::engine::native::NativeEngine;
use molsurf::manifest::ManifestDialect;
use molsurf::options::{Granularity, Options, QualityLevel, SurfaceOverrides};

#[derive(Parser)]
#[command(
    name = "molsurf",
    version,
    about = "Batch molecular-surface OBJ export"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Write one OBJ surface per manifest row.
    Run(RunArgs),
    /// Print the default options as TOML.
    Config,
    /// Print the options JSON schema.
    Schema,
}

#[derive(clap::Args)]
struct RunArgs {
    /// Manifest file, one structure reference per line.
    manifest: PathBuf,
    /// Directory receiving `<basename>.obj` files.
    output_dir: PathBuf,
    /// TOML options file.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Manifest row grammar (`assembly` or `flat`).
    #[arg(long)]
    dialect: Option<ManifestDialect>,
    /// Solvent probe radius in angstroms.
    #[arg(long)]
    probe_radius: Option<f32>,
    /// Mesh quality (`auto`, `highest` .. `lowest`).
    #[arg(long)]
    quality: Option<QualityLevel>,
    /// One mesh per `structure` or per `chain`.
    #[arg(long)]
    granularity: Option<Granularity>,
    /// Deposited-file URL template with an `{entry}` placeholder.
    #[arg(long)]
    url_template: Option<String>,
    /// Assembly-file URL template with `{entry}` and `{assembly}`.
    #[arg(long)]
    assembly_url_template: Option<String>,
}

impl RunArgs {
    /// Config file (or defaults) with command-line values on top.
    fn options(&self) -> Result<Options, String> {
        let mut options = match &self.config {
            Some(path) => Options::load(path)
                .map_err(|e| format!("{}: {e}", path.display()))?,
            None => Options::default(),
        };
        if let Some(dialect) = self.dialect {
            options.manifest.dialect = dialect;
        }
        if let Some(template) = &self.url_template {
            options.source.url_template.clone_from(template);
        }
        if let Some(template) = &self.assembly_url_template {
            options.source.assembly_url_template = Some(template.clone());
        }
        options.surface = options.surface.merged(&SurfaceOverrides {
            probe_radius: self.probe_radius,
            quality: self.quality,
            granularity: self.granularity,
        });
        options.validate().map_err(|e| e.to_string())?;
        Ok(options)
    }
}

fn run(args: &RunArgs) -> Result<(), String> {
    let options = args.options()?;
    match options.to_toml() {
        Ok(text) => log::debug!("options:\n{text}"),
        Err(e) => log::warn!("cannot render options as TOML: {e}"),
    }

    let batch = BatchOptions {
        dialect: options.manifest.dialect,
        surface: options.surface.clone(),
    };
    let report = run_batch(
        &args.manifest,
        &args.output_dir,
        &batch,
        || NativeEngine::new(&options.engine),
        &options.source,
    )
    .map_err(|e| e.to_string())?;

    for failure in &report.failures {
        log::warn!(
            "{}: not written ({} stage)",
            failure.basename,
            failure.error.stage()
        );
    }
    Ok(())
}

fn print(text: &str) -> Result<(), String> {
    writeln!(std::io::stdout().lock(), "{text}").map_err(|e| e.to_string())
}

fn execute(cli: &Cli) -> Result<(), String> {
    match &cli.command {
        Command::Run(args) => run(args),
        Command::Config => print(
            &Options::default().to_toml().map_err(|e| e.to_string())?,
        ),
        Command::Schema => print(
            &serde_json::to_string_pretty(&Options::json_schema())
                .map_err(|e| e.to_string())?,
        ),
    }
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("info"),
    )
    .init();

    let cli = Cli::parse();
    match execute(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(extra: &[&str]) -> RunArgs {
        let mut argv = vec!["molsurf", "run", "m.txt", "out"];
        argv.extend_from_slice(extra);
        match Cli::parse_from(argv).command {
            Command::Run(args) => args,
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn flags_override_defaults() {
        let options = args(&[
            "--probe-radius",
            "2.0",
            "--quality",
            "low",
            "--granularity",
            "chain",
            "--dialect",
            "flat",
        ])
        .options()
        .unwrap();
        assert_eq!(options.surface.probe_radius, 2.0);
        assert_eq!(options.surface.quality, QualityLevel::Low);
        assert_eq!(options.surface.granularity, Granularity::Chain);
        assert_eq!(options.manifest.dialect, ManifestDialect::Flat);
    }

    #[test]
    fn resolved_options_render_as_toml() {
        let options =
            args(&["--probe-radius", "2.5"]).options().unwrap();
        let text = options.to_toml().unwrap();
        assert!(text.contains("probe_radius = 2.5"));
    }

    #[test]
    fn invalid_template_is_rejected() {
        let run_args = args(&["--url-template", "https://h/x.cif"]);
        assert!(run_args.options().is_err());
    }

    #[test]
    fn config_file_is_layered_under_flags() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("opts.toml");
        let toml = "[surface]\nprobe_radius = 1.0\nquality = \"medium\"\n";
        std::fs::write(&path, toml).unwrap();
        let config = path.to_str().unwrap();
        let options = args(&["--config", config, "--quality", "lowest"])
            .options()
            .unwrap();
        assert_eq!(options.surface.probe_radius, 1.0);
        assert_eq!(options.surface.quality, QualityLevel::Lowest);
    }
}
