use std::fmt::Write as _;

use super::{md_cell, ReportFormat, ReportMetadata, StatusSummary, UsersVmsReport};
use crate::error::Result;

pub struct MarkdownReport;

fn header(out: &mut String, title: &str, meta: &ReportMetadata) {
    let _ = writeln!(out, "# {title}\n");
    let _ = writeln!(
        out,
        "_Generated at {} by {} v{}_\n",
        meta.generated_at, meta.generator, meta.version
    );
}

impl ReportFormat for MarkdownReport {
    fn generator_name(&self) -> &'static str {
        "MarkdownReport"
    }

    fn extension(&self) -> &'static str {
        "md"
    }

    fn subdirectory(&self) -> &'static str {
        "markdown"
    }

    fn render_users_vms(&self, meta: &ReportMetadata, report: &UsersVmsReport) -> Result<String> {
        let mut out = String::new();
        let summary = &report.summary;
        header(&mut out, "Users and VMs report", meta);

        out.push_str("## Summary\n\n| Metric | Value |\n|---|---|\n");
        let _ = writeln!(out, "| Total users | {} |", summary.total_users);
        let _ = writeln!(out, "| Total VMs | {} |", summary.total_vms);
        let _ = writeln!(out, "| Users with VMs | {} |", summary.users_with_vms);
        let _ = writeln!(out, "| Users without VMs | {} |\n", summary.users_without_vms);

        if !summary.vms_by_status.is_empty() {
            out.push_str("### VMs by status\n\n| Status | Count |\n|---|---|\n");
            for (status, count) in &summary.vms_by_status {
                let _ = writeln!(out, "| {status} | {count} |");
            }
            out.push('\n');
        }

        out.push_str("## Users\n");
        for user in &report.users {
            let _ = writeln!(out, "\n### {} (#{})\n", md_cell(&user.name), user.id);
            let _ = writeln!(out, "- Email: {}", user.email);
            let _ = writeln!(out, "- Created: {}", user.created_at.format("%Y-%m-%d %H:%M"));
            let _ = writeln!(out, "- VMs: {}", user.vms.len());
            if user.vms.is_empty() {
                continue;
            }
            out.push_str("\n| ID | Name | OS | CPU | RAM (GB) | Disk (GB) | Status |\n");
            out.push_str("|---|---|---|---|---|---|---|\n");
            for vm in &user.vms {
                let _ = writeln!(
                    out,
                    "| {} | {} | {} | {} | {} | {} | {} |",
                    vm.id,
                    md_cell(&vm.name),
                    md_cell(&vm.operating_system),
                    vm.cpu_cores,
                    vm.ram_gb,
                    vm.disk_gb,
                    vm.status
                );
            }
        }
        Ok(out)
    }

    fn render_status(&self, meta: &ReportMetadata, report: &StatusSummary) -> Result<String> {
        let mut out = String::new();
        header(&mut out, "VM status report", meta);
        let _ = writeln!(out, "- Total VMs: {}", report.total_vms);
        let _ = writeln!(out, "- Total users: {}\n", report.total_users);
        out.push_str("| Status | Count | Share |\n|---|---|---|\n");
        for (status, count) in &report.vm_status_summary {
            let _ = writeln!(out, "| {status} | {count} | {:.1}% |", report.percentage(*count));
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::fixtures::{users, vm};
    use crate::models::VmStatus;

    #[test]
    fn users_report_lists_summary_and_vms() {
        let meta = ReportMetadata::now("MarkdownReport");
        let text = MarkdownReport
            .render_users_vms(&meta, &UsersVmsReport::new(users()))
            .unwrap();
        assert!(text.starts_with("# Users and VMs report"));
        assert!(text.contains("| Total VMs | 3 |"));
        assert!(text.contains("| running | 2 |"));
        assert!(text.contains("### Inès Bouvet (#1)"));
        assert!(text.contains("| 1 | web-1 | Debian 11 | 2 | 8 | 100 | running |"));
        assert!(text.contains("### Zoé\\|Martin (#3)"));
    }

    #[test]
    fn status_report_has_shares() {
        let meta = ReportMetadata::now("MarkdownReport");
        let vms = vec![vm(1, 1, VmStatus::Running), vm(2, 1, VmStatus::Deleting)];
        let text = MarkdownReport
            .render_status(&meta, &StatusSummary::from_vms(&vms, 1))
            .unwrap();
        assert!(text.contains("| deleting | 1 | 50.0% |"));
        assert!(text.contains("- Total VMs: 2"));
    }
}
