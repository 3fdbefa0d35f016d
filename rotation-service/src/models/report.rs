//! IAM credential report parsing.
//!
//! The report is a CSV export with one row per user. Only the columns needed
//! to date console passwords are kept.

use chrono::NaiveDate;
use csv::StringRecord;
use service_core::error::AppError;
use std::collections::HashMap;

const USER_COLUMN: &str = "user";
const PASSWORD_LAST_CHANGED_COLUMN: &str = "password_last_changed";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CredentialReportEntry {
    pub user: String,
    pub password_last_changed: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default)]
pub struct CredentialReport {
    entries: HashMap<String, CredentialReportEntry>,
}

impl CredentialReport {
    pub fn parse(content: &[u8]) -> Result<Self, AppError> {
        if content.iter().all(u8::is_ascii_whitespace) {
            return Err(AppError::InternalError(anyhow::anyhow!(
                "credential report is empty"
            )));
        }

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(content);

        let headers = reader.headers().map_err(|e| {
            AppError::InternalError(anyhow::anyhow!("failed to read credential report header: {}", e))
        })?;
        let user_idx = column_index(headers, USER_COLUMN)?;
        let changed_idx = column_index(headers, PASSWORD_LAST_CHANGED_COLUMN)?;

        let mut entries = HashMap::new();
        for (idx, result) in reader.records().enumerate() {
            let record = match result {
                Ok(record) => record,
                Err(e) => {
                    tracing::warn!(row = idx + 2, error = %e, "Skipping unreadable credential report row");
                    continue;
                }
            };
            let Some(user) = record.get(user_idx).filter(|user| !user.is_empty()) else {
                continue;
            };
            let password_last_changed = record.get(changed_idx).and_then(parse_report_date);

            entries.insert(
                user.to_string(),
                CredentialReportEntry {
                    user: user.to_string(),
                    password_last_changed,
                },
            );
        }

        Ok(Self { entries })
    }

    pub fn entry(&self, user_name: &str) -> Option<&CredentialReportEntry> {
        self.entries.get(user_name)
    }

    pub fn password_last_changed(&self, user_name: &str) -> Option<NaiveDate> {
        self.entry(user_name)
            .and_then(|entry| entry.password_last_changed)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn column_index(header: &StringRecord, name: &str) -> Result<usize, AppError> {
    header.iter().position(|column| column == name).ok_or_else(|| {
        AppError::InternalError(anyhow::anyhow!(
            "credential report has no '{}' column",
            name
        ))
    })
}

/// Report timestamps look like `2024-01-31T09:15:00+00:00`; placeholders such
/// as `N/A` or `not_supported` yield `None`.
fn parse_report_date(value: &str) -> Option<NaiveDate> {
    let date_part = value.trim().split('T').next()?;
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const REPORT: &str = "user,arn,user_creation_time,password_enabled,password_last_used,password_last_changed,password_next_rotation\n\
<root_account>,arn:aws:iam::123456789012:root,2019-01-01T00:00:00+00:00,not_supported,2024-01-01T00:00:00+00:00,not_supported,not_supported\n\
alice,arn:aws:iam::123456789012:user/alice,2020-05-01T10:00:00+00:00,true,2024-02-01T08:00:00+00:00,2024-01-15T17:45:12+00:00,N/A\n\
bob,arn:aws:iam::123456789012:user/bob,2021-06-01T10:00:00+00:00,false,N/A,N/A,N/A\n";

    #[test]
    fn parses_password_last_changed_by_user() {
        let report = CredentialReport::parse(REPORT.as_bytes()).unwrap();

        assert_eq!(report.len(), 3);
        assert_eq!(
            report.password_last_changed("alice"),
            NaiveDate::from_ymd_opt(2024, 1, 15)
        );
        assert_eq!(report.password_last_changed("bob"), None);
        assert_eq!(report.password_last_changed("<root_account>"), None);
        assert_eq!(report.password_last_changed("mallory"), None);
    }

    #[test]
    fn rejects_report_without_required_columns() {
        let err = CredentialReport::parse(b"user,arn\nalice,arn:aws:iam::1:user/alice\n").unwrap_err();
        assert!(err.to_string().contains("password_last_changed"));
    }

    #[test]
    fn quoted_user_names_keep_their_columns() {
        let report = CredentialReport::parse(
            b"user,arn,password_last_used,password_last_changed\n\
\"ops,admin\",arn:aws:iam::123456789012:user/ops,2024-03-01T09:00:00+00:00,2023-01-10T12:00:00+00:00\n",
        )
        .unwrap();

        assert_eq!(report.len(), 1);
        assert_eq!(
            report.password_last_changed("ops,admin"),
            NaiveDate::from_ymd_opt(2023, 1, 10)
        );
        assert!(report.entry("\"ops").is_none());
    }

    #[test]
    fn rejects_empty_report() {
        assert!(CredentialReport::parse(b"").is_err());
    }
}
