use serde::Serialize;
use serde_json::{json, Value};

use crate::aggregate::{CategoryComparison, MonthBreakdown, MonthComparison, MonthlySummary, Window, YearlyRollup};
use crate::models::{BudgetRecord, CategoryOption, CategoryTotal, ExpenseCategory, ExpenseRecord, IncomeRecord};
use crate::money::{format_currency, format_money, month_name};

pub const UNCATEGORIZED: &str = "Uncategorized";

#[derive(Serialize)]
pub struct IncomeView {
    pub id: i64,
    pub amount: String,
    pub source: String,
    pub description: Option<String>,
    pub occurred_on: String,
}

#[derive(Serialize)]
pub struct ExpenseView {
    pub id: i64,
    pub amount: String,
    pub title: String,
    pub label: String,
    pub category_code: Option<&'static str>,
    pub category_name: String,
    pub description: Option<String>,
    pub occurred_on: String,
}

#[derive(Serialize)]
struct CategoryTotalView {
    code: Option<&'static str>,
    name: &'static str,
    total: String,
}

#[derive(Serialize)]
struct BudgetView {
    id: i64,
    category_name: &'static str,
    budget: String,
    spent: String,
    remaining: String,
    percent: i64,
}

#[derive(Serialize)]
struct MonthBreakdownView {
    month: u32,
    month_name: &'static str,
    income: String,
    expenses: String,
    balance: String,
}

#[derive(Serialize)]
struct CategoryComparisonView {
    category: &'static str,
    current: String,
    previous: String,
    difference: String,
    percentage_change: String,
}

#[derive(Serialize)]
struct MonthOption {
    number: u32,
    name: &'static str,
}

pub fn income_view(record: &IncomeRecord) -> IncomeView {
    IncomeView {
        id: record.id,
        amount: format_money(record.amount_cents),
        source: record.source.clone(),
        description: record.description.clone(),
        occurred_on: record.occurred_on.format("%Y-%m-%d").to_string(),
    }
}

pub fn expense_view(record: &ExpenseRecord) -> ExpenseView {
    ExpenseView {
        id: record.id,
        amount: format_money(record.amount_cents),
        title: record.title.clone(),
        label: record.label().to_string(),
        category_code: record.category.map(ExpenseCategory::code),
        category_name: record
            .category
            .map(ExpenseCategory::display_name)
            .unwrap_or(UNCATEGORIZED)
            .to_string(),
        description: record.description.clone(),
        occurred_on: record.occurred_on.format("%Y-%m-%d").to_string(),
    }
}

fn category_total_view(total: &CategoryTotal) -> CategoryTotalView {
    CategoryTotalView {
        code: total.category.map(ExpenseCategory::code),
        name: total
            .category
            .map(ExpenseCategory::display_name)
            .unwrap_or(UNCATEGORIZED),
        total: format_money(total.total_cents),
    }
}

fn budget_percent(amount_cents: i64, spent_cents: i64) -> i64 {
    if amount_cents == 0 {
        0
    } else {
        ((spent_cents as f64 / amount_cents as f64) * 100.0).round() as i64
    }
}

fn budget_view(record: &BudgetRecord) -> BudgetView {
    BudgetView {
        id: record.id,
        category_name: record.category.display_name(),
        budget: format_money(record.amount_cents),
        spent: format_money(record.spent_cents),
        remaining: format_money(record.amount_cents - record.spent_cents),
        percent: budget_percent(record.amount_cents, record.spent_cents),
    }
}

fn month_breakdown_view(entry: &MonthBreakdown) -> MonthBreakdownView {
    MonthBreakdownView {
        month: entry.month,
        month_name: entry.month_name(),
        income: format_money(entry.income_cents),
        expenses: format_money(entry.expense_cents),
        balance: format_money(entry.balance_cents),
    }
}

fn comparison_view(entry: &CategoryComparison) -> CategoryComparisonView {
    CategoryComparisonView {
        category: entry.category.display_name(),
        current: format_money(entry.current_cents),
        previous: format_money(entry.previous_cents),
        difference: format_money(entry.difference_cents),
        percentage_change: format!("{:.1}", entry.percentage_change),
    }
}

pub fn category_options() -> Vec<CategoryOption> {
    ExpenseCategory::ALL.into_iter().map(CategoryOption::from).collect()
}

fn month_options() -> Vec<MonthOption> {
    (1..=12)
        .map(|number| MonthOption {
            number,
            name: month_name(number),
        })
        .collect()
}

pub fn dashboard_context(username: &str, summary: &MonthlySummary, years: &[i32], recent: usize) -> Value {
    json!({
        "username": username,
        "current_month": summary.window.month_name(),
        "selected_month": summary.window.month,
        "selected_year": summary.window.year,
        "total_income": format_money(summary.income_cents),
        "total_expenses": format_money(summary.expense_cents),
        "remaining": format_money(summary.remaining_cents),
        "remaining_display": format_currency(summary.remaining_cents),
        "expenses_by_category": summary.by_category.iter().map(category_total_view).collect::<Vec<_>>(),
        "budgets": summary.budgets.iter().map(budget_view).collect::<Vec<_>>(),
        "recent_incomes": summary.incomes.iter().map(income_view).collect::<Vec<_>>(),
        "recent_expenses": summary.expenses.iter().map(expense_view).collect::<Vec<_>>(),
        "recent": recent,
        "months": month_options(),
        "available_years": years,
    })
}

pub fn budgets_context(username: &str, window: Window, budgets: &[BudgetRecord], years: &[i32], error: Option<&str>) -> Value {
    json!({
        "username": username,
        "current_month": window.month_name(),
        "selected_month": window.month,
        "selected_year": window.year,
        "budgets": budgets.iter().map(budget_view).collect::<Vec<_>>(),
        "categories": category_options(),
        "months": month_options(),
        "available_years": years,
        "error": error,
    })
}

pub fn yearly_context(username: &str, rollup: &YearlyRollup, years: &[i32]) -> Value {
    json!({
        "username": username,
        "year": rollup.year,
        "yearly_income": format_money(rollup.income_cents),
        "yearly_expenses": format_money(rollup.expense_cents),
        "yearly_balance": format_money(rollup.balance_cents),
        "expenses_by_category": rollup.by_category.iter().map(category_total_view).collect::<Vec<_>>(),
        "monthly_data": rollup.months.iter().map(month_breakdown_view).collect::<Vec<_>>(),
        "available_years": years,
    })
}

pub fn comparison_context(username: &str, comparison: &MonthComparison) -> Value {
    let current = &comparison.current;
    let previous = &comparison.previous;
    json!({
        "username": username,
        "current_month": current.window.month_name(),
        "current_year": current.window.year,
        "last_month": previous.window.month_name(),
        "last_year": previous.window.year,
        "current_income": format_money(current.income_cents),
        "current_expenses": format_money(current.expense_cents),
        "current_balance": format_money(current.balance_cents),
        "last_income": format_money(previous.income_cents),
        "last_expenses": format_money(previous.expense_cents),
        "last_balance": format_money(previous.balance_cents),
        "category_comparison": comparison.categories.iter().map(comparison_view).collect::<Vec<_>>(),
        "last_month_expenses": comparison.previous_expenses.iter().map(expense_view).collect::<Vec<_>>(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::{monthly_summary, Listing};
    use crate::db::tests::{add_expense, add_income, add_user, date, memory_db};

    #[test]
    fn budget_percent_rounds_and_handles_zero() {
        assert_eq!(budget_percent(0, 500), 0);
        assert_eq!(budget_percent(300, 100), 33);
        assert_eq!(budget_percent(1_000, 1_500), 150);
    }

    #[test]
    fn dashboard_context_matches_summary() {
        let conn = memory_db();
        let alice = add_user(&conn, "alice");
        let today = date(2025, 3, 14);
        add_expense(&conn, alice, ExpenseCategory::Travel, 15_000, date(2025, 3, 2));
        add_income(&conn, alice, 100_000, date(2025, 3, 1));

        let summary = monthly_summary(&conn, alice, Window::containing(today), today, Listing::default()).unwrap();
        let context = dashboard_context("alice", &summary, &[2025], 10);

        assert_eq!(context["current_month"], "March");
        assert_eq!(context["total_income"], "1000.00");
        assert_eq!(context["total_expenses"], "150.00");
        assert_eq!(context["remaining"], "850.00");
        assert_eq!(context["expenses_by_category"][0]["code"], "travel");
        assert_eq!(context["expenses_by_category"][0]["total"], "150.00");
        assert_eq!(context["months"].as_array().unwrap().len(), 12);
    }
}
