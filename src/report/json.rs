use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use serde_json::json;

use super::{ReportFormat, ReportMetadata, StatusSummary, UsersVmsReport};
use crate::error::Result;

/// `{"metadata": ..., "data": ...}` with sorted keys and four-space indent.
pub struct JsonReport;

impl JsonReport {
    fn render<T: Serialize>(meta: &ReportMetadata, data: &T) -> Result<String> {
        // Going through `Value` sorts object keys.
        let document = json!({
            "metadata": serde_json::to_value(meta)?,
            "data": serde_json::to_value(data)?,
        });
        let mut out = Vec::new();
        let mut ser = serde_json::Serializer::with_formatter(&mut out, PrettyFormatter::with_indent(b"    "));
        document.serialize(&mut ser)?;
        out.push(b'\n');
        Ok(String::from_utf8_lossy(&out).into_owned())
    }
}

impl ReportFormat for JsonReport {
    fn generator_name(&self) -> &'static str {
        "JsonReport"
    }

    fn extension(&self) -> &'static str {
        "json"
    }

    fn subdirectory(&self) -> &'static str {
        "json"
    }

    fn render_users_vms(&self, meta: &ReportMetadata, report: &UsersVmsReport) -> Result<String> {
        Self::render(meta, report)
    }

    fn render_status(&self, meta: &ReportMetadata, report: &StatusSummary) -> Result<String> {
        Self::render(meta, report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::fixtures::users;
    use serde_json::Value;

    #[test]
    fn document_has_metadata_and_data() {
        let meta = ReportMetadata::now("JsonReport");
        let text = JsonReport
            .render_users_vms(&meta, &UsersVmsReport::new(users()))
            .unwrap();
        let doc: Value = serde_json::from_str(&text).unwrap();

        assert_eq!(doc["metadata"]["generator"], "JsonReport");
        assert_eq!(doc["data"]["summary"]["total_vms"], 3);
        assert_eq!(doc["data"]["users"][0]["name"], "Inès Bouvet");
        assert_eq!(doc["data"]["users"][0]["vms"].as_array().unwrap().len(), 2);
        assert!(text.contains("\n    \"data\""), "four-space indent expected");
        assert!(text.contains("Inès"), "non-ASCII kept as-is");
    }

    #[test]
    fn keys_are_sorted() {
        let meta = ReportMetadata::now("JsonReport");
        let text = JsonReport
            .render_status(&meta, &StatusSummary::default())
            .unwrap();
        let data_at = text.find("\"data\"").unwrap();
        let meta_at = text.find("\"metadata\"").unwrap();
        assert!(data_at < meta_at);
    }
}
