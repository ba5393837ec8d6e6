use std::fmt::Write as _;

use super::{ReportFormat, ReportMetadata, StatusSummary, UsersVmsReport};
use crate::error::Result;

pub struct HtmlReport;

const STYLE: &str = "body{font-family:sans-serif;margin:2em}table{border-collapse:collapse;margin:1em 0}\
th,td{border:1px solid #ccc;padding:4px 8px;text-align:left}th{background:#f0f0f0}";

/// Escape the five HTML-significant characters.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

fn open(out: &mut String, title: &str, meta: &ReportMetadata) {
    let _ = write!(
        out,
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n<title>{title}</title>\n\
         <style>{STYLE}</style>\n</head>\n<body>\n<h1>{title}</h1>\n\
         <p class=\"meta\">Generated at {} by {} v{}</p>\n",
        escape(&meta.generated_at),
        escape(&meta.generator),
        escape(&meta.version)
    );
}

fn close(out: &mut String) {
    out.push_str("</body>\n</html>\n");
}

fn row(out: &mut String, cells: &[String]) {
    out.push_str("<tr>");
    for cell in cells {
        let _ = write!(out, "<td>{}</td>", escape(cell));
    }
    out.push_str("</tr>\n");
}

fn head(out: &mut String, cells: &[&str]) {
    out.push_str("<table>\n<tr>");
    for cell in cells {
        let _ = write!(out, "<th>{cell}</th>");
    }
    out.push_str("</tr>\n");
}

impl ReportFormat for HtmlReport {
    fn generator_name(&self) -> &'static str {
        "HtmlReport"
    }

    fn extension(&self) -> &'static str {
        "html"
    }

    fn subdirectory(&self) -> &'static str {
        "html"
    }

    fn render_users_vms(&self, meta: &ReportMetadata, report: &UsersVmsReport) -> Result<String> {
        let mut out = String::new();
        let summary = &report.summary;
        open(&mut out, "Users and VMs report", meta);

        out.push_str("<h2>Summary</h2>\n");
        head(&mut out, &["Metric", "Value"]);
        row(&mut out, &["Total users".into(), summary.total_users.to_string()]);
        row(&mut out, &["Total VMs".into(), summary.total_vms.to_string()]);
        row(&mut out, &["Users with VMs".into(), summary.users_with_vms.to_string()]);
        row(&mut out, &["Users without VMs".into(), summary.users_without_vms.to_string()]);
        out.push_str("</table>\n");

        if !summary.vms_by_status.is_empty() {
            out.push_str("<h3>VMs by status</h3>\n");
            head(&mut out, &["Status", "Count"]);
            for (status, count) in &summary.vms_by_status {
                row(&mut out, &[status.clone(), count.to_string()]);
            }
            out.push_str("</table>\n");
        }

        out.push_str("<h2>Users</h2>\n");
        for user in &report.users {
            let _ = writeln!(
                out,
                "<h3>{} (#{})</h3>\n<p>{} &middot; created {} &middot; {} VM(s)</p>",
                escape(&user.name),
                user.id,
                escape(&user.email),
                user.created_at.format("%Y-%m-%d %H:%M"),
                user.vms.len()
            );
            if user.vms.is_empty() {
                continue;
            }
            head(&mut out, &["ID", "Name", "OS", "CPU", "RAM (GB)", "Disk (GB)", "Status"]);
            for vm in &user.vms {
                row(
                    &mut out,
                    &[
                        vm.id.to_string(),
                        vm.name.clone(),
                        vm.operating_system.clone(),
                        vm.cpu_cores.to_string(),
                        vm.ram_gb.to_string(),
                        vm.disk_gb.to_string(),
                        vm.status.to_string(),
                    ],
                );
            }
            out.push_str("</table>\n");
        }
        close(&mut out);
        Ok(out)
    }

    fn render_status(&self, meta: &ReportMetadata, report: &StatusSummary) -> Result<String> {
        let mut out = String::new();
        open(&mut out, "VM status report", meta);
        let _ = writeln!(
            out,
            "<p>{} VM(s) across {} user(s)</p>",
            report.total_vms, report.total_users
        );
        head(&mut out, &["Status", "Count", "Share"]);
        for (status, count) in &report.vm_status_summary {
            row(
                &mut out,
                &[
                    status.clone(),
                    count.to_string(),
                    format!("{:.1}%", report.percentage(*count)),
                ],
            );
        }
        out.push_str("</table>\n");
        close(&mut out);
        Ok(out)
    }
}
