/// Package export pipeline
/// Fetches a package's normalized modules, assembles ABI entries and appends them to the package's file

use crate::persist;
use crate::rpc::SuiRpcClient;
use move_abi::{parse_module_map, AbiAssembler, AbiEntry, AbiSummary, Translator};
use serde_json::Value;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{error, info};

/// Characters of the package address used in output file names.
const FILE_PREFIX_LEN: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportKind {
    /// Events and every exposed function.
    Full,
    /// Entry functions only.
    EntryFunctions,
    /// Events only, with package-qualified names.
    Events,
}

impl ExportKind {
    pub fn file_suffix(&self) -> &'static str {
        match self {
            ExportKind::Full => "abi",
            ExportKind::EntryFunctions => "func",
            ExportKind::Events => "event",
        }
    }
}

impl fmt::Display for ExportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportKind::Full => write!(f, "abi"),
            ExportKind::EntryFunctions => write!(f, "functions"),
            ExportKind::Events => write!(f, "events"),
        }
    }
}

/// Outcome of one package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageReport {
    pub package: String,
    pub path: PathBuf,
    /// `None` when the package was skipped.
    pub summary: Option<AbiSummary>,
    pub written: usize,
}

impl PackageReport {
    pub fn is_ok(&self) -> bool {
        self.summary.is_some()
    }
}

pub struct AbiExporter {
    client: SuiRpcClient,
    translator: Translator,
    output_dir: PathBuf,
}

impl AbiExporter {
    pub fn new(client: SuiRpcClient, translator: Translator, output_dir: impl Into<PathBuf>) -> Self {
        AbiExporter {
            client,
            translator,
            output_dir: output_dir.into(),
        }
    }

    /// `<output_dir>/<first 6 chars of package>_<suffix>.json`
    pub fn output_path(&self, package: &str, kind: ExportKind) -> PathBuf {
        let prefix: String = package.chars().take(FILE_PREFIX_LEN).collect();
        self.output_dir
            .join(format!("{}_{}.json", prefix, kind.file_suffix()))
    }

    /// Run every package through the pipeline, one after another.
    pub async fn export_packages(
        &self,
        packages: &[String],
        kind: ExportKind,
        batch: bool,
    ) -> Vec<PackageReport> {
        if batch && packages.len() > 1 {
            info!(packages = packages.len(), "Fetching packages in one batch request");
            let results = self.client.get_normalized_modules_batch(packages).await;
            return packages
                .iter()
                .zip(results)
                .map(|(package, result)| self.export_response(package, kind, &result))
                .collect();
        }

        let mut reports = Vec::with_capacity(packages.len());
        for package in packages {
            reports.push(self.export_package(package, kind).await);
        }
        reports
    }

    pub async fn export_package(&self, package: &str, kind: ExportKind) -> PackageReport {
        info!(package = %package, kind = %kind, "Fetching normalized modules");
        let result = self.client.get_normalized_modules(package).await;
        self.export_response(package, kind, &result)
    }

    /// Assemble and persist from an RPC result that has already been fetched.
    pub fn export_response(&self, package: &str, kind: ExportKind, result: &Value) -> PackageReport {
        let path = self.output_path(package, kind);

        let modules = match parse_module_map(result) {
            Ok(modules) => modules,
            Err(e) => {
                error!(package = %package, error = %e, "Invalid response from RPC call");
                return PackageReport {
                    package: package.to_string(),
                    path,
                    summary: None,
                    written: 0,
                };
            }
        };

        let assembler = AbiAssembler::new(&self.translator);
        let entries = match kind {
            ExportKind::Full => assembler.assemble(&modules),
            ExportKind::EntryFunctions => assembler.assemble_entry_functions(&modules),
            ExportKind::Events => assembler.assemble_events_qualified(package, &modules),
        };

        let summary = AbiSummary::of(&entries);
        let written = persist_entries(&path, &entries);
        report_missing(package, kind, &summary);

        info!(
            package = %package,
            path = %path.display(),
            events = summary.events,
            functions = summary.functions,
            written = written,
            "ABI stored"
        );

        PackageReport {
            package: package.to_string(),
            path,
            summary: Some(summary),
            written,
        }
    }
}

fn persist_entries(path: &Path, entries: &[AbiEntry]) -> usize {
    entries
        .iter()
        .filter(|entry| persist::append(path, *entry))
        .count()
}

fn report_missing(package: &str, kind: ExportKind, summary: &AbiSummary) {
    let short: String = package.chars().take(FILE_PREFIX_LEN).collect();
    if kind != ExportKind::EntryFunctions && summary.events == 0 {
        info!("No events found in contract {}", short);
    }
    if kind != ExportKind::Events && summary.functions == 0 {
        info!("No functions found in contract {}", short);
    }
}
