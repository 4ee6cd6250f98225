//! Sums and groupings of a user's incomes and expenses over time windows.
//!
//! Every function takes the user id explicitly, and the functions whose
//! result depends on "now" take `today` so callers decide what now means.

use chrono::{Datelike, Duration, Months, NaiveDate};
use rusqlite::{Connection, Result};

use crate::db;
use crate::models::{BudgetRecord, CategoryTotal, DateRange, ExpenseCategory, ExpenseRecord, IncomeRecord};
use crate::money::month_name;

/// A calendar month or a whole year.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub year: i32,
    pub month: Option<u32>,
    range: DateRange,
}

impl Window {
    pub fn month(year: i32, month: u32) -> Option<Self> {
        let start = NaiveDate::from_ymd_opt(year, month, 1)?;
        let end = start.checked_add_months(Months::new(1))?;
        Some(Window {
            year,
            month: Some(month),
            range: DateRange { start, end },
        })
    }

    pub fn year(year: i32) -> Option<Self> {
        let start = NaiveDate::from_ymd_opt(year, 1, 1)?;
        let end = NaiveDate::from_ymd_opt(year.checked_add(1)?, 1, 1)?;
        Some(Window {
            year,
            month: None,
            range: DateRange { start, end },
        })
    }

    /// The month `date` falls in.
    pub fn containing(date: NaiveDate) -> Self {
        let start = date - Duration::days(i64::from(date.day0()));
        Window {
            year: date.year(),
            month: Some(date.month()),
            range: DateRange {
                start,
                end: start + Months::new(1),
            },
        }
    }

    /// Month window from raw `month`/`year` query values. Each value that is
    /// missing, non-numeric or out of range is replaced by today's.
    pub fn from_query(month: Option<&str>, year: Option<&str>, today: NaiveDate) -> Self {
        let month = month
            .and_then(|value| value.trim().parse::<u32>().ok())
            .filter(|value| (1..=12).contains(value))
            .unwrap_or_else(|| today.month());
        let year = year
            .and_then(|value| value.trim().parse::<i32>().ok())
            .unwrap_or_else(|| today.year());
        Window::month(year, month).unwrap_or_else(|| Window::containing(today))
    }

    pub fn range(&self) -> DateRange {
        self.range
    }

    /// One calendar month earlier. Year windows step back a year.
    pub fn previous(&self) -> Option<Self> {
        match self.month {
            Some(1) => Window::month(self.year.checked_sub(1)?, 12),
            Some(month) => Window::month(self.year, month - 1),
            None => Window::year(self.year.checked_sub(1)?),
        }
    }

    /// True when the window starts after the month containing `today`.
    pub fn is_future(&self, today: NaiveDate) -> bool {
        match self.month {
            Some(month) => {
                self.year > today.year() || (self.year == today.year() && month > today.month())
            }
            None => self.year > today.year(),
        }
    }

    pub fn month_name(&self) -> &'static str {
        self.month.map(month_name).unwrap_or("")
    }
}

/// How many records of each kind a monthly summary lists. `None` lists all.
#[derive(Debug, Clone, Copy, Default)]
pub struct Listing {
    pub incomes: Option<usize>,
    pub expenses: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct MonthlySummary {
    pub window: Window,
    pub income_cents: i64,
    pub expense_cents: i64,
    pub remaining_cents: i64,
    pub by_category: Vec<CategoryTotal>,
    pub budgets: Vec<BudgetRecord>,
    pub incomes: Vec<IncomeRecord>,
    pub expenses: Vec<ExpenseRecord>,
}

impl MonthlySummary {
    fn empty(window: Window) -> Self {
        MonthlySummary {
            window,
            income_cents: 0,
            expense_cents: 0,
            remaining_cents: 0,
            by_category: Vec::new(),
            budgets: Vec::new(),
            incomes: Vec::new(),
            expenses: Vec::new(),
        }
    }
}

/// Totals, category breakdown, budgets and listings for one month. Months
/// after the current one are always reported empty without querying.
pub fn monthly_summary(
    conn: &Connection,
    user_id: i64,
    window: Window,
    today: NaiveDate,
    listing: Listing,
) -> Result<MonthlySummary> {
    if window.is_future(today) {
        return Ok(MonthlySummary::empty(window));
    }
    let range = window.range();
    let income_cents = db::income_total(conn, user_id, Some(range))?;
    let expense_cents = db::expense_total(conn, user_id, Some(range))?;
    let budgets = budget_status(conn, user_id, window)?;
    Ok(MonthlySummary {
        window,
        income_cents,
        expense_cents,
        remaining_cents: income_cents - expense_cents,
        by_category: db::expense_totals_by_category(conn, user_id, range)?,
        budgets,
        incomes: db::list_incomes(conn, user_id, Some(range), listing.incomes)?,
        expenses: db::list_expenses(conn, user_id, Some(range), listing.expenses)?,
    })
}

/// Stored budgets of a month window with what was spent against each. Unlike
/// `monthly_summary` this is not blanked for future months.
pub fn budget_status(conn: &Connection, user_id: i64, window: Window) -> Result<Vec<BudgetRecord>> {
    match window.month {
        Some(month) => db::list_budgets(conn, user_id, month, window.year, window.range()),
        None => Ok(Vec::new()),
    }
}

/// Years with at least one income or expense, ascending. A user without
/// records gets the current year.
pub fn available_years(conn: &Connection, user_id: i64, today: NaiveDate) -> Result<Vec<i32>> {
    let years = db::record_years(conn, user_id)?;
    if years.is_empty() {
        Ok(vec![today.year()])
    } else {
        Ok(years)
    }
}

/// `(current - previous) / previous * 100`, with a zero previous month
/// reported as 100 when anything was spent now and 0 otherwise.
pub fn percentage_change(current_cents: i64, previous_cents: i64) -> f64 {
    if previous_cents > 0 {
        (current_cents - previous_cents) as f64 / previous_cents as f64 * 100.0
    } else if current_cents > 0 {
        100.0
    } else {
        0.0
    }
}

#[derive(Debug, Clone)]
pub struct MonthTotals {
    pub window: Window,
    pub income_cents: i64,
    pub expense_cents: i64,
    pub balance_cents: i64,
}

fn month_totals(conn: &Connection, user_id: i64, window: Window) -> Result<MonthTotals> {
    let income_cents = db::income_total(conn, user_id, Some(window.range()))?;
    let expense_cents = db::expense_total(conn, user_id, Some(window.range()))?;
    Ok(MonthTotals {
        window,
        income_cents,
        expense_cents,
        balance_cents: income_cents - expense_cents,
    })
}

#[derive(Debug, Clone, PartialEq)]
pub struct CategoryComparison {
    pub category: ExpenseCategory,
    pub current_cents: i64,
    pub previous_cents: i64,
    pub difference_cents: i64,
    pub percentage_change: f64,
}

#[derive(Debug, Clone)]
pub struct MonthComparison {
    pub current: MonthTotals,
    pub previous: MonthTotals,
    pub categories: Vec<CategoryComparison>,
    pub previous_expenses: Vec<ExpenseRecord>,
}

fn total_for(totals: &[CategoryTotal], category: ExpenseCategory) -> i64 {
    totals
        .iter()
        .find(|total| total.category == Some(category))
        .map(|total| total.total_cents)
        .unwrap_or(0)
}

/// The month containing `today` against the month before it, per category
/// in enumeration order.
pub fn compare_months(conn: &Connection, user_id: i64, today: NaiveDate) -> Result<MonthComparison> {
    let current_window = Window::containing(today);
    // The month before the earliest representable one does not exist;
    // compare against the same month then, which yields zero differences.
    let previous_window = current_window.previous().unwrap_or(current_window);

    let current_by_category = db::expense_totals_by_category(conn, user_id, current_window.range())?;
    let previous_by_category = db::expense_totals_by_category(conn, user_id, previous_window.range())?;

    let categories = ExpenseCategory::ALL
        .into_iter()
        .map(|category| {
            let current_cents = total_for(&current_by_category, category);
            let previous_cents = total_for(&previous_by_category, category);
            CategoryComparison {
                category,
                current_cents,
                previous_cents,
                difference_cents: current_cents - previous_cents,
                percentage_change: percentage_change(current_cents, previous_cents),
            }
        })
        .collect();

    Ok(MonthComparison {
        current: month_totals(conn, user_id, current_window)?,
        previous: month_totals(conn, user_id, previous_window)?,
        categories,
        previous_expenses: db::list_expenses(conn, user_id, Some(previous_window.range()), None)?,
    })
}

#[derive(Debug, Clone, PartialEq)]
pub struct MonthBreakdown {
    pub month: u32,
    pub income_cents: i64,
    pub expense_cents: i64,
    pub balance_cents: i64,
}

impl MonthBreakdown {
    pub fn month_name(&self) -> &'static str {
        month_name(self.month)
    }
}

#[derive(Debug, Clone)]
pub struct YearlyRollup {
    pub year: i32,
    pub income_cents: i64,
    pub expense_cents: i64,
    pub balance_cents: i64,
    pub by_category: Vec<CategoryTotal>,
    /// Always twelve entries, January first.
    pub months: Vec<MonthBreakdown>,
}

pub fn yearly_rollup(conn: &Connection, user_id: i64, window: Window) -> Result<YearlyRollup> {
    let range = window.range();
    let income_cents = db::income_total(conn, user_id, Some(range))?;
    let expense_cents = db::expense_total(conn, user_id, Some(range))?;
    let monthly = db::monthly_totals(conn, user_id, range)?;

    let months = (1..=12u32)
        .map(|month| {
            let (income, expense) = monthly
                .iter()
                .find(|(m, _, _)| *m == month)
                .map(|(_, income, expense)| (*income, *expense))
                .unwrap_or((0, 0));
            MonthBreakdown {
                month,
                income_cents: income,
                expense_cents: expense,
                balance_cents: income - expense,
            }
        })
        .collect();

    Ok(YearlyRollup {
        year: window.year,
        income_cents,
        expense_cents,
        balance_cents: income_cents - expense_cents,
        by_category: db::expense_totals_by_category(conn, user_id, range)?,
        months,
    })
}
