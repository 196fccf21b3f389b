use std::process::ExitCode;

use clap::Parser;
use miette::IntoDiagnostic;
use tracing::info;
use tracing_subscriber::EnvFilter;

use kmz2shp::app::{RunController, RunOptions};
use kmz2shp::config::{ConfigLoader, Overrides};
use kmz2shp::domain::VectorDriver;
use kmz2shp::error::ConvertError;
use kmz2shp::ogr::OgrToolsClient;
use kmz2shp::output::{ConsoleOutput, JsonOutput, OutputMode};

#[derive(Parser)]
#[command(name = "kmz2shp")]
#[command(about = "Convert a directory tree of KMZ archives into ESRI Shapefile datasets")]
#[command(version, author)]
struct Cli {
    /// Folder scanned recursively for .kmz files
    #[arg(long)]
    input: Option<String>,

    /// Folder receiving one dataset directory per input, the ledger and error reports
    #[arg(long)]
    output: Option<String>,

    #[arg(long)]
    config: Option<String>,

    #[arg(long)]
    driver: Option<VectorDriver>,

    /// Report what would be converted without touching any file
    #[arg(long)]
    dry_run: bool,

    /// Print the run summary as JSON instead of progress lines
    #[arg(long)]
    non_interactive: bool,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(err) = report.downcast_ref::<ConvertError>() {
            return ExitCode::from(map_exit_code(err));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &ConvertError) -> u8 {
    match error {
        ConvertError::ConfigRead(_) | ConvertError::ConfigParse(_) | ConvertError::InvalidPath(_) => {
            2
        }
        ConvertError::MissingTool(_) => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output_mode = if cli.non_interactive {
        OutputMode::NonInteractive
    } else {
        OutputMode::Interactive
    };

    let config = ConfigLoader::resolve(
        cli.config.as_deref(),
        Overrides {
            input_root: cli.input,
            output_root: cli.output,
            driver: cli.driver,
        },
    )?;
    info!(
        input_root = %config.input_root,
        output_root = %config.output_root,
        driver = %config.driver,
        "resolved configuration"
    );

    let options = RunOptions {
        dry_run: cli.dry_run,
    };
    let mut controller = RunController::connect(config, &options, || {
        let ogr = OgrToolsClient::new()?;
        let tools = ogr.tool_info();
        info!(ogrinfo = ?tools.ogrinfo, ogr2ogr = ?tools.ogr2ogr, "using GDAL tools");
        Ok((ogr.clone(), ogr))
    })?;

    match output_mode {
        OutputMode::NonInteractive => {
            let summary = controller.execute(options, &JsonOutput)?;
            JsonOutput::print_summary(&summary).into_diagnostic()?;
        }
        OutputMode::Interactive => {
            let summary = controller.execute(options, &ConsoleOutput)?;
            ConsoleOutput::print_summary(&summary).into_diagnostic()?;
        }
    }
    Ok(())
}
