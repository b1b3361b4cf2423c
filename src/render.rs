//! Spreadsheet rendering of a classified change set.

use crate::error::ReportError;
use crate::model::{ChangeRecord, Classification, Summary};
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use rust_xlsxwriter::{Color, DocProperties, ExcelDateTime, Format, Workbook};

pub const SHEET_NAME: &str = "AWS Resources Report";
pub const CONTENT_TYPE: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

pub const HEADERS: [&str; 11] = [
    "Actor",
    "Resource ID",
    "Resource Type",
    "State",
    "Region",
    "Created At",
    "Last Modified",
    "Change Type",
    "Tags",
    "Extra Info",
    "Change Summary",
];

const HEADER_FILL: u32 = 0x366092;
const MAX_COLUMN_WIDTH: usize = 50;
const TAG_SEPARATOR: &str = ", ";
const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportRow {
    pub classification: Classification,
    pub cells: [String; HEADERS.len()],
}

#[derive(Debug, Clone)]
pub struct RenderedReport {
    pub bytes: Vec<u8>,
    pub summary: Summary,
    pub rows: Vec<ReportRow>,
}

/// Rows in emission order: grouped Created, Modified, Deleted, Existing,
/// keeping the incoming order inside each group.
pub fn rows(changes: &[ChangeRecord]) -> Vec<ReportRow> {
    Classification::ALL
        .iter()
        .flat_map(|class| changes.iter().filter(move |c| c.classification == *class))
        .map(row)
        .collect()
}

fn row(c: &ChangeRecord) -> ReportRow {
    let r = &c.resource;
    let tags = if r.tags.is_empty() {
        "No tags".to_string()
    } else {
        r.tags
            .iter()
            .map(|(k, v)| format!("{k}:{v}"))
            .collect::<Vec<_>>()
            .join(TAG_SEPARATOR)
    };
    let extra = if r.extra.is_empty() {
        String::new()
    } else {
        serde_json::to_string(&r.extra).unwrap_or_default()
    };

    ReportRow {
        classification: c.classification,
        cells: [
            c.actor.clone(),
            r.resource_id.clone(),
            r.resource_type.clone(),
            r.state.clone(),
            r.region.clone(),
            time_cell(r.created_at),
            time_cell(r.last_modified_at),
            c.classification.to_string(),
            tags,
            extra,
            c.change_summary.clone().unwrap_or_default(),
        ],
    }
}

fn time_cell(t: Option<DateTime<Utc>>) -> String {
    t.map(|t| t.format(TIME_FORMAT).to_string())
        .unwrap_or_else(|| "Unknown".to_string())
}

/// Renders the change set into an xlsx workbook.
///
/// Output is a pure function of `changes` and `report_date`: the workbook
/// creation time is pinned to the report date so identical input yields
/// identical bytes.
pub fn render(changes: &[ChangeRecord], report_date: NaiveDate) -> Result<RenderedReport, ReportError> {
    let rows = rows(changes);
    let summary = Summary::from_changes(changes);

    let mut workbook = Workbook::new();
    let created = ExcelDateTime::from_ymd(
        u16::try_from(report_date.year()).map_err(|e| ReportError::Render(e.to_string()))?,
        report_date.month() as u8,
        report_date.day() as u8,
    )?;
    workbook.set_properties(
        &DocProperties::new()
            .set_title(&format!("AWS Resource Report {report_date}"))
            .set_creation_datetime(&created),
    );

    let sheet = workbook.add_worksheet();
    sheet.set_name(SHEET_NAME)?;

    let header = Format::new()
        .set_bold()
        .set_font_color(Color::White)
        .set_background_color(Color::RGB(HEADER_FILL));
    let fills: Vec<(Classification, Format)> = Classification::ALL
        .iter()
        .map(|c| (*c, Format::new().set_background_color(Color::RGB(c.fill_rgb()))))
        .collect();

    let mut widths: Vec<usize> = HEADERS.iter().map(|h| h.chars().count()).collect();

    for (col, title) in HEADERS.iter().enumerate() {
        sheet.write_string_with_format(0, col as u16, *title, &header)?;
    }

    for (i, row) in rows.iter().enumerate() {
        let Some((_, fill)) = fills.iter().find(|(c, _)| *c == row.classification) else {
            continue;
        };
        let row_num = (i + 1) as u32;
        for (col, cell) in row.cells.iter().enumerate() {
            sheet.write_string_with_format(row_num, col as u16, cell.as_str(), fill)?;
            widths[col] = widths[col].max(cell.chars().count());
        }
    }

    for (col, w) in widths.iter().enumerate() {
        sheet.set_column_width(col as u16, ((*w + 2).min(MAX_COLUMN_WIDTH)) as f64)?;
    }
    sheet.set_freeze_panes(1, 0)?;

    let bytes = workbook.save_to_buffer()?;
    Ok(RenderedReport { bytes, summary, rows })
}
