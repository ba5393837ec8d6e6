// Report generation.
//
// A report is a dataset (users with their VMs, or a VM status count) plus
// generation metadata. Each `ReportFormat` renders it to text; the
// `ReportWriter` places the result under `<output_dir>/<format dir>/`.

mod html;
mod json;
mod markdown;

pub use html::HtmlReport;
pub use json::JsonReport;
pub use markdown::MarkdownReport;

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::Local;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::api::ApiClient;
use crate::error::Result;
use crate::models::{add_vms_to_users, User, VirtualMachine};

pub const REPORT_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct ReportMetadata {
    pub generated_at: String,
    pub generator: String,
    pub version: String,
}

impl ReportMetadata {
    pub fn now(generator: &str) -> Self {
        Self {
            generated_at: Local::now().to_rfc3339(),
            generator: generator.to_string(),
            version: REPORT_VERSION.to_string(),
        }
    }
}

/// Aggregate counts over users that already carry their VMs.
#[derive(Serialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct UsersVmsSummary {
    pub total_users: usize,
    pub total_vms: usize,
    pub vms_by_status: BTreeMap<String, usize>,
    pub users_with_vms: usize,
    pub users_without_vms: usize,
}

impl UsersVmsSummary {
    pub fn from_users(users: &[User]) -> Self {
        let mut summary = Self {
            total_users: users.len(),
            ..Self::default()
        };
        for user in users {
            if user.vms.is_empty() {
                summary.users_without_vms += 1;
                continue;
            }
            summary.users_with_vms += 1;
            summary.total_vms += user.vms.len();
            for vm in &user.vms {
                *summary
                    .vms_by_status
                    .entry(vm.status.to_string())
                    .or_default() += 1;
            }
        }
        summary
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct UsersVmsReport {
    pub summary: UsersVmsSummary,
    pub users: Vec<User>,
}

impl UsersVmsReport {
    pub fn new(users: Vec<User>) -> Self {
        Self {
            summary: UsersVmsSummary::from_users(&users),
            users,
        }
    }
}

/// VM counts by status.
#[derive(Serialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusSummary {
    pub total_vms: usize,
    pub total_users: usize,
    pub vm_status_summary: BTreeMap<String, usize>,
}

impl StatusSummary {
    pub fn from_vms(vms: &[VirtualMachine], total_users: usize) -> Self {
        let mut counts = BTreeMap::new();
        for vm in vms {
            *counts.entry(vm.status.to_string()).or_default() += 1;
        }
        Self {
            total_vms: vms.len(),
            total_users,
            vm_status_summary: counts,
        }
    }

    /// Share of `count` in the total, as a percentage.
    pub fn percentage(&self, count: usize) -> f64 {
        if self.total_vms == 0 {
            0.0
        } else {
            count as f64 * 100.0 / self.total_vms as f64
        }
    }
}

/// One output format.
pub trait ReportFormat {
    /// Recorded as `generator` in the metadata.
    fn generator_name(&self) -> &'static str;
    fn extension(&self) -> &'static str;
    /// Directory under the output root where this format's files go.
    fn subdirectory(&self) -> &'static str;
    fn render_users_vms(&self, meta: &ReportMetadata, report: &UsersVmsReport) -> Result<String>;
    fn render_status(&self, meta: &ReportMetadata, report: &StatusSummary) -> Result<String>;
}

/// Every available format, in the order `--format all` writes them.
pub fn all_formats() -> Vec<Box<dyn ReportFormat>> {
    vec![
        Box::new(JsonReport),
        Box::new(MarkdownReport),
        Box::new(HtmlReport),
    ]
}

/// Writes rendered reports below an output directory.
#[derive(Debug, Clone)]
pub struct ReportWriter {
    output_dir: PathBuf,
}

impl ReportWriter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Target path for a report. A missing extension is appended; no name
    /// at all gives `report_<timestamp>.<ext>`.
    pub fn target_path(&self, format: &dyn ReportFormat, filename: Option<&str>) -> PathBuf {
        let ext = format.extension();
        let name = match filename {
            Some(name) if name.ends_with(&format!(".{ext}")) => name.to_string(),
            Some(name) => format!("{name}.{ext}"),
            None => format!("report_{}.{ext}", Local::now().format("%Y%m%d_%H%M%S")),
        };
        self.output_dir.join(format.subdirectory()).join(name)
    }

    pub fn write(&self, format: &dyn ReportFormat, content: &str, filename: Option<&str>) -> Result<PathBuf> {
        let path = self.target_path(format, filename);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, content).inspect_err(|e| {
            error!(path = %path.display(), error = %e, "failed to write report");
        })?;
        info!(path = %path.display(), generator = format.generator_name(), bytes = content.len(), "report written");
        Ok(path)
    }

    pub fn write_users_vms(
        &self,
        format: &dyn ReportFormat,
        report: &UsersVmsReport,
        filename: Option<&str>,
    ) -> Result<PathBuf> {
        let meta = ReportMetadata::now(format.generator_name());
        let content = format.render_users_vms(&meta, report)?;
        self.write(format, &content, filename)
    }

    pub fn write_status(
        &self,
        format: &dyn ReportFormat,
        report: &StatusSummary,
        filename: Option<&str>,
    ) -> Result<PathBuf> {
        let meta = ReportMetadata::now(format.generator_name());
        let content = format.render_status(&meta, report)?;
        self.write(format, &content, filename)
    }
}

/// Fetches live data and writes reports from it.
pub struct ReportService<'a> {
    api: &'a ApiClient,
    writer: ReportWriter,
}

impl<'a> ReportService<'a> {
    pub fn new(api: &'a ApiClient, writer: ReportWriter) -> Self {
        Self { api, writer }
    }

    /// Users and VMs from the API. A failed fetch is logged and treated as
    /// an empty list so the caller can decide what is reportable.
    pub fn fetch_data(&self) -> (Vec<User>, Vec<VirtualMachine>) {
        let users = self.api.get_users().unwrap_or_else(|e| {
            error!(error = %e, "could not fetch users");
            Vec::new()
        });
        let vms = self.api.get_vms().unwrap_or_else(|e| {
            error!(error = %e, "could not fetch VMs");
            Vec::new()
        });
        (users, vms)
    }

    /// Users joined with their VMs. `None` when either list is empty.
    pub fn generate_users_vms(
        &self,
        formats: &[Box<dyn ReportFormat>],
        filename: &str,
    ) -> Result<Option<Vec<PathBuf>>> {
        let (mut users, vms) = self.fetch_data();
        if users.is_empty() || vms.is_empty() {
            warn!(users = users.len(), vms = vms.len(), "missing data, skipping users/VMs report");
            return Ok(None);
        }
        add_vms_to_users(&mut users, &vms);
        let report = UsersVmsReport::new(users);
        formats
            .iter()
            .map(|format| self.writer.write_users_vms(format.as_ref(), &report, Some(filename)))
            .collect::<Result<Vec<_>>>()
            .map(Some)
    }

    /// VM counts by status. `None` when there are no VMs.
    pub fn generate_status(
        &self,
        formats: &[Box<dyn ReportFormat>],
        filename: &str,
    ) -> Result<Option<Vec<PathBuf>>> {
        let (users, vms) = self.fetch_data();
        if vms.is_empty() {
            warn!("no VMs available, skipping status report");
            return Ok(None);
        }
        let report = StatusSummary::from_vms(&vms, users.len());
        formats
            .iter()
            .map(|format| self.writer.write_status(format.as_ref(), &report, Some(filename)))
            .collect::<Result<Vec<_>>>()
            .map(Some)
    }
}

/// Escape text for inclusion in a Markdown table cell.
pub(crate) fn md_cell(text: &str) -> String {
    text.replace('|', "\\|").replace('\n', " ")
}

#[cfg(test)]
pub(crate) mod fixtures {
    use crate::models::{parse_unix_timestamp, User, VirtualMachine, VmStatus};

    pub fn vm(id: i64, user_id: i64, status: VmStatus) -> VirtualMachine {
        VirtualMachine {
            id,
            user_id,
            name: format!("web-{id}"),
            operating_system: "Debian 11".into(),
            cpu_cores: 2,
            ram_gb: 8,
            disk_gb: 100,
            status,
            created_at: parse_unix_timestamp(1_700_000_000_000).unwrap(),
        }
    }

    pub fn users() -> Vec<User> {
        let created_at = parse_unix_timestamp(1_690_000_000_000).unwrap();
        vec![
            User {
                id: 1,
                name: "Inès Bouvet".into(),
                email: "ines.bouvet@tech.io".into(),
                created_at,
                vms: vec![vm(1, 1, VmStatus::Running), vm(2, 1, VmStatus::Stopped)],
            },
            User {
                id: 2,
                name: "Jean <Dupont> & Fils".into(),
                email: "jean@dupont21.com".into(),
                created_at,
                vms: vec![vm(3, 2, VmStatus::Running)],
            },
            User {
                id: 3,
                name: "Zoé|Martin".into(),
                email: "zoe.martin@corp.com".into(),
                created_at,
                vms: Vec::new(),
            },
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::{users, vm};
    use super::*;
    use crate::models::VmStatus;

    #[test]
    fn summary_counts_users_and_statuses() {
        let summary = UsersVmsSummary::from_users(&users());
        assert_eq!(summary.total_users, 3);
        assert_eq!(summary.total_vms, 3);
        assert_eq!(summary.users_with_vms, 2);
        assert_eq!(summary.users_without_vms, 1);
        assert_eq!(summary.vms_by_status.get("running"), Some(&2));
        assert_eq!(summary.vms_by_status.get("stopped"), Some(&1));
    }

    #[test]
    fn status_summary_counts_and_percentages() {
        let vms = vec![
            vm(1, 1, VmStatus::Running),
            vm(2, 1, VmStatus::Running),
            vm(3, 2, VmStatus::Paused),
            vm(4, 2, VmStatus::Running),
        ];
        let summary = StatusSummary::from_vms(&vms, 2);
        assert_eq!(summary.total_vms, 4);
        assert_eq!(summary.vm_status_summary.get("running"), Some(&3));
        assert!((summary.percentage(3) - 75.0).abs() < f64::EPSILON);
        assert_eq!(StatusSummary::default().percentage(1), 0.0);
    }

    #[test]
    fn target_path_appends_extension_once() {
        let writer = ReportWriter::new("outputs");
        assert_eq!(
            writer.target_path(&JsonReport, Some("vm_users")),
            Path::new("outputs/json/vm_users.json")
        );
        assert_eq!(
            writer.target_path(&MarkdownReport, Some("vm_users.md")),
            Path::new("outputs/markdown/vm_users.md")
        );
        let generated = writer.target_path(&HtmlReport, None);
        let name = generated.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("report_") && name.ends_with(".html"), "{name}");
    }

    #[test]
    fn writer_creates_directories() {
        let dir = tempfile::tempdir().unwrap();
        let writer = ReportWriter::new(dir.path().join("outputs"));
        let report = UsersVmsReport::new(users());

        for format in all_formats() {
            let path = writer
                .write_users_vms(format.as_ref(), &report, Some("vm_users"))
                .unwrap();
            assert!(path.is_file(), "{}", path.display());
            assert!(path.starts_with(dir.path().join("outputs").join(format.subdirectory())));
        }
    }
}
