use std::path::Path;

use rust_xlsxwriter::{Format, FormatAlign, Workbook, Worksheet};

use super::transform::SheetRow;
use crate::config::LabelsConfig;
use crate::error::ExportError;

const ROW_HEIGHT: f64 = 15.0;
const COLUMN_WIDTHS: [f64; 9] = [20.0, 45.0, 50.0, 16.0, 16.0, 16.0, 20.0, 10.0, 30.0];
const LAST_COLUMN: u16 = COLUMN_WIDTHS.len() as u16 - 1;

/// Rows written per sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkbookSummary {
    pub open_rows: usize,
    pub archived_rows: usize,
}

struct SheetFormats {
    header: Format,
    left: Format,
    center: Format,
}

impl SheetFormats {
    fn new() -> Self {
        let header = Format::new()
            .set_align(FormatAlign::Left)
            .set_align(FormatAlign::Top)
            .set_bold()
            .set_text_wrap();
        let left = Format::new()
            .set_align(FormatAlign::Left)
            .set_align(FormatAlign::Top)
            .set_text_wrap();
        let center = Format::new()
            .set_align(FormatAlign::Center)
            .set_align(FormatAlign::Top)
            .set_text_wrap();
        Self {
            header,
            left,
            center,
        }
    }
}

/// Split rows between the open and archived sheets and save the workbook.
pub fn write_workbook(
    path: &Path,
    rows: &[SheetRow],
    labels: &LabelsConfig,
) -> Result<WorkbookSummary, ExportError> {
    let (archived, open): (Vec<&SheetRow>, Vec<&SheetRow>) = rows.iter().partition(|r| r.closed);
    let formats = SheetFormats::new();
    let mut workbook = Workbook::new();

    for (name, sheet_rows) in [
        (&labels.sheet_opened_cards, &open),
        (&labels.sheet_archived_cards, &archived),
    ] {
        let sheet = workbook.add_worksheet();
        sheet.set_name(name.as_str())?;
        write_sheet(sheet, sheet_rows, labels, &formats)?;
    }

    workbook.save(path)?;
    tracing::info!(path = %path.display(), open = open.len(), archived = archived.len(), "workbook saved");

    Ok(WorkbookSummary {
        open_rows: open.len(),
        archived_rows: archived.len(),
    })
}

fn write_sheet(
    sheet: &mut Worksheet,
    rows: &[&SheetRow],
    labels: &LabelsConfig,
    formats: &SheetFormats,
) -> Result<(), ExportError> {
    sheet.set_portrait();
    sheet.set_default_row_height(ROW_HEIGHT);
    for (col, width) in COLUMN_WIDTHS.iter().enumerate() {
        sheet.set_column_width(col as u16, *width)?;
    }

    for (col, header) in labels.headers().iter().enumerate() {
        sheet.write_string_with_format(0, col as u16, *header, &formats.header)?;
    }

    let mut row_num: u32 = 1;
    for row in rows {
        let text_cells = [
            (0, row.list_name.as_str(), &formats.left),
            (1, row.title.as_str(), &formats.left),
            (2, row.description.as_str(), &formats.left),
            (3, row.start_date.as_str(), &formats.center),
            (4, row.due_date.as_str(), &formats.center),
            (5, row.last_activity_date.as_str(), &formats.center),
            (6, row.labels.as_str(), &formats.left),
            (8, row.short_url.as_str(), &formats.left),
        ];
        for (col, value, format) in text_cells {
            sheet.write_string_with_format(row_num, col, value, format)?;
        }
        sheet.write_number_with_format(row_num, 7, f64::from(row.short_id), &formats.center)?;
        row_num += 1;
    }

    sheet.autofilter(0, 0, row_num - 1, LAST_COLUMN)?;
    Ok(())
}
