use std::fs;
use std::time::{Duration, Instant};

use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::config::ResolvedConfig;
use crate::domain::{ConversionOutcome, INPUT_EXTENSION, InputArchive, PAYLOAD_EXTENSION};
use crate::error::ConvertError;
use crate::fs_util::{extract_payload, find_inputs};
use crate::ledger::ConversionLedger;
use crate::ogr::{VectorReader, VectorWriter};
use crate::report::ErrorCollector;
use crate::workspace::Workspace;

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub dry_run: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub total: usize,
    pub converted: usize,
    pub skipped: usize,
    pub failed: Vec<String>,
    pub pending: Vec<String>,
    pub dry_run: bool,
    pub ledger_path: String,
    pub error_report: Option<String>,
}

impl RunSummary {
    pub fn headline(&self) -> String {
        format!("Successfully converted {} / {}", self.converted, self.total)
    }
}

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub message: String,
    pub elapsed: Option<Duration>,
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

/// Owns everything one conversion run mutates. Build a fresh controller for
/// every run.
#[derive(Debug)]
pub struct RunController<R: VectorReader, W: VectorWriter> {
    config: ResolvedConfig,
    reader: R,
    writer: W,
    workspace: Workspace,
    ledger: ConversionLedger,
    errors: ErrorCollector,
    converted: usize,
    skipped: usize,
}

impl<R: VectorReader, W: VectorWriter> RunController<R, W> {
    pub fn new(config: ResolvedConfig, reader: R, writer: W) -> Self {
        let workspace = Workspace::new(config.workspace_path());
        Self {
            config,
            reader,
            writer,
            workspace,
            ledger: ConversionLedger::new(),
            errors: ErrorCollector::new(),
            converted: 0,
            skipped: 0,
        }
    }

    /// Builds the capability pair with `connect` before constructing the
    /// controller. When that fails the scratch workspace is still purged,
    /// unless this is a dry run, and the ledger is left untouched.
    pub fn connect(
        config: ResolvedConfig,
        options: &RunOptions,
        connect: impl FnOnce() -> Result<(R, W), ConvertError>,
    ) -> Result<Self, ConvertError> {
        match connect() {
            Ok((reader, writer)) => Ok(Self::new(config, reader, writer)),
            Err(err) => {
                if options.dry_run {
                    return Err(err);
                }
                if let Err(purge_err) = Workspace::new(config.workspace_path()).release() {
                    error!(error = %purge_err, "failed to purge scratch workspace");
                }
                Err(err)
            }
        }
    }

    pub fn ledger(&self) -> &ConversionLedger {
        &self.ledger
    }

    pub fn errors(&self) -> &ErrorCollector {
        &self.errors
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    /// Loads the ledger, converts every pending input, then persists the
    /// ledger and the error report and purges the scratch workspace. A fatal
    /// error still persists what was gathered and purges before returning.
    /// A dry run writes and removes nothing.
    pub fn execute(
        &mut self,
        options: RunOptions,
        sink: &dyn ProgressSink,
    ) -> Result<RunSummary, ConvertError> {
        let ledger_path = self.config.ledger_path();
        self.ledger = match ConversionLedger::load(&ledger_path) {
            Ok(ledger) => ledger,
            Err(err) => {
                // Never write back a ledger that failed to load.
                if !options.dry_run {
                    self.purge_after_fatal();
                }
                return Err(err);
            }
        };
        self.errors = ErrorCollector::new();
        self.converted = 0;
        self.skipped = 0;

        let run = self.convert_all(&options, sink);
        if options.dry_run {
            return run;
        }

        match run {
            Ok(summary) => self.finish(summary),
            Err(err) => {
                error!(error = %err, "conversion run aborted");
                if let Err(persist_err) = self.ledger.persist(&ledger_path) {
                    error!(error = %persist_err, "failed to persist ledger after abort");
                }
                if let Err(report_err) = self.errors.persist(self.config.report_dir()) {
                    error!(error = %report_err, "failed to write error report after abort");
                }
                self.purge_after_fatal();
                Err(err)
            }
        }
    }

    fn convert_all(
        &mut self,
        options: &RunOptions,
        sink: &dyn ProgressSink,
    ) -> Result<RunSummary, ConvertError> {
        let inputs = find_inputs(
            &self.config.input_root,
            INPUT_EXTENSION,
            Some(self.workspace.path()),
        )?;
        let total = inputs.len();
        info!(input_root = %self.config.input_root, total, "starting conversion run");

        let mut pending = Vec::new();
        for (position, input) in inputs.iter().enumerate() {
            let index = position + 1;
            if options.dry_run {
                if self.ledger.contains(input.as_str()) {
                    self.skipped += 1;
                } else {
                    pending.push(input.as_str().to_string());
                }
                continue;
            }

            let outcome = self.convert_one(input, index, total, sink);
            match outcome {
                ConversionOutcome::Converted { output_dir } => {
                    debug!(input = %input, output = %output_dir, "recorded conversion");
                    self.ledger.record(input.as_str());
                    self.converted += 1;
                }
                ConversionOutcome::Skipped => self.skipped += 1,
                ConversionOutcome::Failed { .. } => self.errors.record(input.as_str()),
            }
        }

        sink.event(ProgressEvent {
            message: "Conversions complete".to_string(),
            elapsed: None,
        });

        Ok(RunSummary {
            total,
            converted: self.converted,
            skipped: self.skipped,
            failed: self.errors.failed().to_vec(),
            pending,
            dry_run: options.dry_run,
            ledger_path: self.config.ledger_path().to_string(),
            error_report: None,
        })
    }

    /// Runs one input through its state machine. Failures are folded into
    /// the outcome; the scratch workspace is purged before this returns.
    pub fn convert_one(
        &self,
        input: &InputArchive,
        index: usize,
        total: usize,
        sink: &dyn ProgressSink,
    ) -> ConversionOutcome {
        if self.ledger.contains(input.as_str()) {
            sink.event(ProgressEvent {
                message: format!("Skipping {index} / {total} - Already converted"),
                elapsed: None,
            });
            return ConversionOutcome::Skipped;
        }

        let start = Instant::now();
        let result = match self.workspace.lease() {
            Ok(lease) => self.attempt(input, lease.path()),
            Err(err) => Err(err),
        };
        let elapsed = Some(start.elapsed());

        match result {
            Ok(output_dir) => {
                info!(input = %input, output = %output_dir, "converted");
                sink.event(ProgressEvent {
                    message: format!("Converted {index} / {total}"),
                    elapsed,
                });
                ConversionOutcome::Converted { output_dir }
            }
            Err(err) => {
                warn!(input = %input, error = %err, "conversion failed");
                sink.event(ProgressEvent {
                    message: format!("Failed on {index} / {total}"),
                    elapsed,
                });
                sink.event(ProgressEvent {
                    message: format!("Error converting {input}: {err}"),
                    elapsed: None,
                });
                ConversionOutcome::Failed {
                    reason: err.to_string(),
                }
            }
        }
    }

    fn attempt(
        &self,
        input: &InputArchive,
        scratch: &Utf8Path,
    ) -> Result<Utf8PathBuf, ConvertError> {
        let payload = extract_payload(input.path(), scratch, PAYLOAD_EXTENSION)?;
        let source = self.reader.open(&payload, true)?;
        let layer = source.layer(0)?;

        let name = input.output_name()?;
        let output_dir = self.config.output_root.join(&name);
        fs::create_dir_all(output_dir.as_std_path())
            .map_err(|err| ConvertError::VectorWrite(format!("create {output_dir}: {err}")))?;

        let dataset = self
            .writer
            .create_dataset(&output_dir, self.config.driver)?;
        let copied =
            self.writer
                .copy_layer(&dataset, layer, &name, &self.config.layer_options)?;
        debug!(layer = %copied.name, files = copied.files.len(), "copied layer");
        Ok(output_dir)
    }

    fn finish(&self, mut summary: RunSummary) -> Result<RunSummary, ConvertError> {
        let persisted = self.ledger.persist(&self.config.ledger_path());
        let report = self.errors.persist(self.config.report_dir());
        let released = self.workspace.release();

        persisted?;
        summary.error_report = report?.map(|path| path.to_string());
        released?;
        Ok(summary)
    }

    fn purge_after_fatal(&self) {
        if let Err(err) = self.workspace.release() {
            error!(error = %err, "failed to purge scratch workspace");
        }
    }
}
