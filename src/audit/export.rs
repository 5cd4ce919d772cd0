//! Audit log export

use crate::core::error::EngineResult;

use super::log::PermissionAuditEntry;

/// Supported export formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    /// Direct serialization of the entries, ISO-8601 timestamps
    Json,
    /// Fixed 8-column layout for spreadsheet review
    Csv,
}

const CSV_HEADER: &str = "Timestamp,Operation,URI,Decision,Reason,Executed,Tool,Risk Level";

/// Render audit entries in the requested format
pub fn export_entries(
    entries: &[PermissionAuditEntry],
    format: ExportFormat,
) -> EngineResult<String> {
    match format {
        ExportFormat::Json => Ok(serde_json::to_string_pretty(entries)?),
        ExportFormat::Csv => Ok(export_csv(entries)),
    }
}

fn export_csv(entries: &[PermissionAuditEntry]) -> String {
    let mut out = String::from(CSV_HEADER);
    out.push('\n');

    for entry in entries {
        // Reasons are free text; commas would break the column count
        let reason = entry.result.reason.replace(',', ";");
        out.push_str(&format!(
            "{},{},{},{},{},{},{},{}\n",
            entry.context.timestamp.to_rfc3339(),
            entry.context.operation,
            entry.context.uri,
            entry.result.decision,
            reason,
            entry.executed,
            entry.context.requesting_tool,
            entry.result.risk_level,
        ));
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::context::PermissionContext;
    use crate::core::types::{OperationKind, PermissionDecision, ResourceScope};
    use crate::rules::PermissionResult;

    fn entry_with_reason(reason: &str) -> PermissionAuditEntry {
        let context =
            PermissionContext::new("/a.txt", OperationKind::Read, ResourceScope::File, "reader");
        let result = PermissionResult::manual(PermissionDecision::Allow, reason);
        PermissionAuditEntry::new("e1", context, result, true)
    }

    #[test]
    fn test_csv_header_and_columns() {
        let csv = export_entries(&[entry_with_reason("fine")], ExportFormat::Csv).unwrap();
        let mut lines = csv.lines();

        assert_eq!(lines.next().unwrap(), CSV_HEADER);
        let row = lines.next().unwrap();
        assert_eq!(row.split(',').count(), 8);
        assert!(row.contains("/a.txt"));
        assert!(row.contains("allow"));
    }

    #[test]
    fn test_csv_commas_in_reason_become_semicolons() {
        let csv = export_entries(
            &[entry_with_reason("matched rule: a, b, and c")],
            ExportFormat::Csv,
        )
        .unwrap();
        let row = csv.lines().nth(1).unwrap();

        assert_eq!(row.split(',').count(), 8);
        assert!(row.contains("matched rule: a; b; and c"));
    }

    #[test]
    fn test_json_round_trips() {
        let json = export_entries(&[entry_with_reason("fine")], ExportFormat::Json).unwrap();
        let back: Vec<PermissionAuditEntry> = serde_json::from_str(&json).unwrap();
        assert_eq!(back.len(), 1);
        assert_eq!(back[0].id, "e1");
        // ISO-8601 timestamp
        assert!(json.contains("T"));
    }

    #[test]
    fn test_empty_export() {
        let csv = export_entries(&[], ExportFormat::Csv).unwrap();
        assert_eq!(csv.trim_end(), CSV_HEADER);

        let json = export_entries(&[], ExportFormat::Json).unwrap();
        assert_eq!(json.trim(), "[]");
    }
}
