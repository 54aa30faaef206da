use std::string::FromUtf8Error;

use chrono::NaiveDate;
use csv::{QuoteStyle, Terminator, WriterBuilder};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::risk::LearnerAlert;

const BOM: char = '\u{feff}';

pub const ATTENDANCE_HEADERS: [&str; 7] = [
    "date",
    "cohortNumber",
    "learnerDocId",
    "learnerName",
    "present",
    "excused",
    "reason",
];

pub const ALERT_HEADERS: [&str; 5] = [
    "learnerDocId",
    "learnerName",
    "consecutiveUnexcused",
    "monthlyUnexcused",
    "criterion",
];

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("csv encoding failed: {0}")]
    Csv(#[from] csv::Error),
    #[error("csv buffer flush failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("csv output is not valid utf-8: {0}")]
    Utf8(#[from] FromUtf8Error),
}

/// A flat record whose fields are looked up by header name.
pub trait ExportRow {
    /// `None` serializes as an empty cell.
    fn field(&self, header: &str) -> Option<String>;
}

impl ExportRow for Map<String, Value> {
    fn field(&self, header: &str) -> Option<String> {
        match self.get(header)? {
            Value::Null => None,
            Value::String(text) => Some(text.clone()),
            other => Some(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceExportRow {
    pub date: NaiveDate,
    pub cohort_number: String,
    pub learner_doc_id: String,
    pub learner_name: String,
    pub present: bool,
    pub excused: bool,
    pub reason: Option<String>,
}

impl ExportRow for AttendanceExportRow {
    fn field(&self, header: &str) -> Option<String> {
        match header {
            "date" => Some(self.date.format("%Y-%m-%d").to_string()),
            "cohortNumber" => Some(self.cohort_number.clone()),
            "learnerDocId" => Some(self.learner_doc_id.clone()),
            "learnerName" => Some(self.learner_name.clone()),
            "present" => Some(self.present.to_string()),
            "excused" => Some(self.excused.to_string()),
            "reason" => self.reason.clone(),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertExportRow {
    pub learner_doc_id: String,
    pub learner_name: String,
    pub consecutive_unexcused: u32,
    pub monthly_unexcused: u32,
    pub criterion: &'static str,
}

impl AlertExportRow {
    pub fn new(alert: &LearnerAlert, learner_doc_id: &str, learner_name: &str) -> Self {
        Self {
            learner_doc_id: learner_doc_id.to_string(),
            learner_name: learner_name.to_string(),
            consecutive_unexcused: alert.consecutive_unexcused,
            monthly_unexcused: alert.monthly_unexcused,
            criterion: alert.criterion.label(),
        }
    }
}

impl ExportRow for AlertExportRow {
    fn field(&self, header: &str) -> Option<String> {
        match header {
            "learnerDocId" => Some(self.learner_doc_id.clone()),
            "learnerName" => Some(self.learner_name.clone()),
            "consecutiveUnexcused" => Some(self.consecutive_unexcused.to_string()),
            "monthlyUnexcused" => Some(self.monthly_unexcused.to_string()),
            "criterion" => Some(self.criterion.to_string()),
            _ => None,
        }
    }
}

/// Serialize rows under `headers` as a BOM-prefixed, `\n`-separated CSV payload
/// without a trailing newline.
pub fn to_csv<R: ExportRow>(rows: &[R], headers: &[&str]) -> Result<String, ExportError> {
    let mut builder = WriterBuilder::new();
    builder
        .quote_style(QuoteStyle::Never)
        .terminator(Terminator::Any(b'\n'));

    let mut lines = Vec::with_capacity(rows.len() + 1);
    lines.push(encode_line(&builder, headers.iter().map(|header| escape_field(header)))?);
    for row in rows {
        lines.push(encode_line(
            &builder,
            headers
                .iter()
                .map(|header| escape_field(&row.field(header).unwrap_or_default())),
        )?);
    }

    let body = lines.join("\n");
    let mut payload = String::with_capacity(body.len() + BOM.len_utf8());
    payload.push(BOM);
    payload.push_str(&body);
    Ok(payload)
}

/// Quote a field containing `"`, `,` or a newline, doubling inner quotes.
fn escape_field(value: &str) -> String {
    if value.contains(|c: char| matches!(c, '"' | ',' | '\n')) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// One record of already-escaped fields, without its terminator.
fn encode_line<I>(builder: &WriterBuilder, fields: I) -> Result<String, ExportError>
where
    I: IntoIterator<Item = String>,
{
    let fields: Vec<String> = fields.into_iter().collect();
    // The writer quotes a lone empty field; it is an empty line here.
    if let [only] = fields.as_slice() {
        if only.is_empty() {
            return Ok(String::new());
        }
    }

    let mut writer = builder.from_writer(Vec::new());
    writer.write_record(&fields)?;
    let bytes = writer
        .into_inner()
        .map_err(|err| ExportError::Io(err.into_error()))?;
    let mut line = String::from_utf8(bytes)?;
    if line.ends_with('\n') {
        line.pop();
    }
    Ok(line)
}
