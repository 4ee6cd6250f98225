//! Monthly PDF report.
//!
//! The report content is assembled into [`MonthlyReport`] first and drawn
//! onto A4 pages by [`render_pdf`] afterwards.

use std::fs::File;
use std::path::Path;

use printpdf::{
    BuiltinFont, IndirectFontRef, Line, Mm, PdfDocument, PdfDocumentReference, PdfLayerReference,
    Point,
};

use crate::aggregate::MonthlySummary;
use crate::error::AppError;
use crate::money::{format_currency, format_report_date};

pub const NO_INCOMES: &str = "No incomes for this month.";
pub const NO_EXPENSES: &str = "No expenses for this month.";

const PAGE_WIDTH: f32 = 210.0;
const PAGE_HEIGHT: f32 = 297.0;
const MARGIN: f32 = 20.0;
const ROW_HEIGHT: f32 = 7.0;
const BODY_SIZE: f32 = 10.0;
const MAX_CELL_CHARS: usize = 48;

#[derive(Debug, Clone)]
pub struct ReportTable {
    pub heading: &'static str,
    pub columns: [&'static str; 3],
    pub rows: Vec<[String; 3]>,
}

#[derive(Debug, Clone)]
pub struct MonthlyReport {
    pub title: String,
    pub summary: Vec<(&'static str, String)>,
    pub incomes: ReportTable,
    pub expenses: ReportTable,
    pub filename: String,
}

pub fn build_monthly_report(username: &str, summary: &MonthlySummary) -> MonthlyReport {
    let window = summary.window;
    let month = window.month.unwrap_or_default();

    let mut income_rows: Vec<[String; 3]> = summary
        .incomes
        .iter()
        .map(|income| {
            [
                format_report_date(income.occurred_on),
                income.source.clone(),
                format_currency(income.amount_cents),
            ]
        })
        .collect();
    if income_rows.is_empty() {
        income_rows.push(placeholder_row(NO_INCOMES));
    }

    let mut expense_rows: Vec<[String; 3]> = summary
        .expenses
        .iter()
        .map(|expense| {
            [
                format_report_date(expense.occurred_on),
                expense.label().to_string(),
                format_currency(expense.amount_cents),
            ]
        })
        .collect();
    if expense_rows.is_empty() {
        expense_rows.push(placeholder_row(NO_EXPENSES));
    }

    MonthlyReport {
        title: format!("Monthly Report - {} {}", window.month_name(), window.year),
        summary: vec![
            ("User", username.to_string()),
            ("Total Income", format_currency(summary.income_cents)),
            ("Total Expenses", format_currency(summary.expense_cents)),
            ("Balance", format_currency(summary.remaining_cents)),
        ],
        incomes: ReportTable {
            heading: "Incomes",
            columns: ["Date", "Source", "Amount"],
            rows: income_rows,
        },
        expenses: ReportTable {
            heading: "Expenses",
            columns: ["Date", "Category / Title", "Amount"],
            rows: expense_rows,
        },
        filename: format!("monthly_report_{}_{}.pdf", window.year, month),
    }
}

fn placeholder_row(message: &str) -> [String; 3] {
    ["-".to_string(), message.to_string(), "-".to_string()]
}

fn pdf_error(err: printpdf::Error) -> AppError {
    AppError::Pdf(err.to_string())
}

struct PageWriter {
    doc: PdfDocumentReference,
    layer: PdfLayerReference,
    regular: IndirectFontRef,
    bold: IndirectFontRef,
    y: f32,
}

impl PageWriter {
    fn new(title: &str, font_path: Option<&Path>) -> Result<Self, AppError> {
        let (doc, page, layer) = PdfDocument::new(title, Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "content");
        let (regular, bold) = match font_path {
            Some(path) => {
                let file = File::open(path)
                    .map_err(|err| AppError::Pdf(format!("{}: {err}", path.display())))?;
                let font = doc.add_external_font(file).map_err(pdf_error)?;
                (font.clone(), font)
            }
            None => (
                doc.add_builtin_font(BuiltinFont::Helvetica).map_err(pdf_error)?,
                doc.add_builtin_font(BuiltinFont::HelveticaBold).map_err(pdf_error)?,
            ),
        };
        let layer = doc.get_page(page).get_layer(layer);
        Ok(PageWriter {
            doc,
            layer,
            regular,
            bold,
            y: PAGE_HEIGHT - MARGIN,
        })
    }

    /// Starts a new page when fewer than `needed` millimetres remain.
    fn reserve(&mut self, needed: f32) {
        if self.y - needed >= MARGIN {
            return;
        }
        let (page, layer) = self.doc.add_page(Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "content");
        self.layer = self.doc.get_page(page).get_layer(layer);
        self.y = PAGE_HEIGHT - MARGIN;
    }

    fn text(&self, text: &str, size: f32, x: f32, bold: bool) {
        let font = if bold { &self.bold } else { &self.regular };
        self.layer.use_text(text, size, Mm(x), Mm(self.y), font);
    }

    // Helvetica digits are 0.556 em wide, close enough for amounts.
    fn text_right(&self, text: &str, size: f32, right: f32, bold: bool) {
        let width = text.chars().count() as f32 * size * 0.556 * 0.3528;
        self.text(text, size, right - width, bold);
    }

    fn rule(&self, from: f32, to: f32, y: f32) {
        self.layer.set_outline_thickness(0.5);
        self.layer.add_line(Line {
            points: vec![
                (Point::new(Mm(from), Mm(y)), false),
                (Point::new(Mm(to), Mm(y)), false),
            ],
            is_closed: false,
        });
    }

    fn title(&mut self, title: &str) {
        self.reserve(14.0);
        self.text(title, 18.0, MARGIN, true);
        self.y -= 14.0;
    }

    fn summary(&mut self, rows: &[(&'static str, String)]) {
        let label_x = MARGIN;
        let value_right = MARGIN + 140.0;
        for (label, value) in rows {
            self.reserve(ROW_HEIGHT);
            self.text(label, BODY_SIZE, label_x, false);
            self.text_right(value, BODY_SIZE, value_right, false);
            self.rule(label_x, value_right, self.y - 2.0);
            self.y -= ROW_HEIGHT;
        }
        self.y -= 6.0;
    }

    fn table(&mut self, table: &ReportTable) {
        // date, text, amount columns: 3cm, 8cm, 3cm
        let columns = [MARGIN, MARGIN + 30.0, MARGIN + 110.0];
        let right = MARGIN + 140.0;

        self.reserve(ROW_HEIGHT * 3.0);
        self.text(table.heading, 13.0, MARGIN, true);
        self.y -= ROW_HEIGHT + 2.0;

        self.header_row(&table.columns, &columns, right);
        for row in &table.rows {
            if self.y - ROW_HEIGHT < MARGIN {
                self.reserve(ROW_HEIGHT * 2.0);
                self.header_row(&table.columns, &columns, right);
            }
            self.text(&row[0], BODY_SIZE, columns[0] + 1.0, false);
            self.text(&clip(&row[1]), BODY_SIZE, columns[1] + 1.0, false);
            self.text_right(&row[2], BODY_SIZE, right - 1.0, false);
            self.rule(MARGIN, right, self.y - 2.0);
            self.y -= ROW_HEIGHT;
        }
        self.y -= 6.0;
    }

    fn header_row(&mut self, names: &[&'static str; 3], columns: &[f32; 3], right: f32) {
        self.rule(MARGIN, right, self.y + 5.0);
        for (name, x) in names.iter().zip(columns) {
            self.text(name, BODY_SIZE, x + 1.0, true);
        }
        self.rule(MARGIN, right, self.y - 2.0);
        self.y -= ROW_HEIGHT;
    }

    fn finish(self) -> Result<Vec<u8>, AppError> {
        self.doc.save_to_bytes().map_err(pdf_error)
    }
}

fn clip(text: &str) -> String {
    if text.chars().count() <= MAX_CELL_CHARS {
        return text.to_string();
    }
    let mut clipped: String = text.chars().take(MAX_CELL_CHARS - 3).collect();
    clipped.push_str("...");
    clipped
}

/// Draws the report. `font_path` names a TrueType font to embed; without
/// one the builtin Helvetica is used and the currency symbol is lost.
pub fn render_pdf(report: &MonthlyReport, font_path: Option<&Path>) -> Result<Vec<u8>, AppError> {
    let mut writer = PageWriter::new(&report.title, font_path)?;
    writer.title(&report.title);
    writer.summary(&report.summary);
    writer.table(&report.incomes);
    writer.table(&report.expenses);
    writer.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::{monthly_summary, Listing, Window};
    use crate::config::AppConfig;
    use crate::db::tests::{add_expense, add_income, add_user, date, memory_db};
    use crate::models::ExpenseCategory;

    #[test]
    fn empty_month_uses_placeholder_rows() {
        let conn = memory_db();
        let alice = add_user(&conn, "alice");
        let today = date(2025, 3, 20);
        add_expense(&conn, alice, ExpenseCategory::Travel, 15_000, date(2025, 3, 5));

        let window = Window::month(2025, 3).unwrap();
        let summary = monthly_summary(&conn, alice, window, today, Listing::default()).unwrap();
        let report = build_monthly_report("alice", &summary);

        assert_eq!(report.title, "Monthly Report - March 2025");
        assert_eq!(report.filename, "monthly_report_2025_3.pdf");
        assert_eq!(report.incomes.rows.len(), 1);
        assert_eq!(report.incomes.rows[0][1], NO_INCOMES);
        assert_eq!(
            report.expenses.rows,
            vec![["05 Mar 2025".to_string(), "Travel".to_string(), "₹150.00".to_string()]]
        );
        assert_eq!(report.summary[0], ("User", "alice".to_string()));
        assert_eq!(report.summary[3], ("Balance", "₹-150.00".to_string()));
    }

    #[test]
    fn uncategorized_expense_falls_back_to_title() {
        let conn = memory_db();
        let alice = add_user(&conn, "alice");
        let today = date(2025, 3, 20);
        add_income(&conn, alice, 123_450, date(2025, 3, 1));
        add_expense(&conn, alice, ExpenseCategory::Others, 500, date(2025, 3, 2));
        crate::db::delete_category(&conn, ExpenseCategory::Others).unwrap();

        let window = Window::month(2025, 3).unwrap();
        let summary = monthly_summary(&conn, alice, window, today, Listing::default()).unwrap();
        let report = build_monthly_report("alice", &summary);

        assert_eq!(report.expenses.rows[0][1], "Others spending");
        assert_eq!(report.incomes.rows[0][2], "₹1,234.50");
        assert_eq!(report.summary[1].1, "₹1,234.50");
    }

    #[test]
    fn renders_a_pdf_document() {
        let conn = memory_db();
        let alice = add_user(&conn, "alice");
        let today = date(2025, 3, 20);
        for day in 1..=28 {
            add_expense(&conn, alice, ExpenseCategory::EatingOut, 1_000 + i64::from(day), date(2025, 3, day));
            add_income(&conn, alice, 5_000, date(2025, 3, day));
        }
        let window = Window::month(2025, 3).unwrap();
        let summary = monthly_summary(&conn, alice, window, today, Listing::default()).unwrap();
        let report = build_monthly_report("alice", &summary);

        let bytes = render_pdf(&report, None).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn default_font_carries_the_currency_glyph() {
        let conn = memory_db();
        let alice = add_user(&conn, "alice");
        let today = date(2025, 3, 20);
        add_income(&conn, alice, 123_450, date(2025, 3, 1));
        let window = Window::month(2025, 3).unwrap();
        let summary = monthly_summary(&conn, alice, window, today, Listing::default()).unwrap();
        let report = build_monthly_report("alice", &summary);

        let font = AppConfig::default().pdf_font.unwrap();
        assert!(font.is_file(), "{} is missing", font.display());
        let bytes = render_pdf(&report, Some(&font)).unwrap();
        let text = String::from_utf8_lossy(&bytes);
        assert!(text.contains("FontFile2"));
        // ToUnicode entry mapping some glyph id to U+20B9
        assert!(text.contains("> <20b9>"));
    }

    #[test]
    fn missing_font_is_an_error() {
        let report = MonthlyReport {
            title: "t".to_string(),
            summary: Vec::new(),
            incomes: ReportTable { heading: "Incomes", columns: ["a", "b", "c"], rows: Vec::new() },
            expenses: ReportTable { heading: "Expenses", columns: ["a", "b", "c"], rows: Vec::new() },
            filename: "x.pdf".to_string(),
        };
        let result = render_pdf(&report, Some(Path::new("/nonexistent/font.ttf")));
        assert!(matches!(result, Err(AppError::Pdf(_))));
    }

    #[test]
    fn long_cells_are_clipped() {
        let long = "x".repeat(100);
        let clipped = clip(&long);
        assert_eq!(clipped.chars().count(), MAX_CELL_CHARS);
        assert!(clipped.ends_with("..."));
        assert_eq!(clip("short"), "short");
    }
}
