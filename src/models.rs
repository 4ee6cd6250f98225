use chrono::NaiveDate;
use serde::Serialize;

/// Half-open date range `[start, end)` used to filter records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: i64,
    pub username: String,
}

/// Fixed set of expense categories. Rows in `expense_categories` are seeded
/// from this list so expenses and budgets can reference them by id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpenseCategory {
    Entertainment,
    EatingOut,
    Clothing,
    Travel,
    BillsRent,
    PersonalCare,
    Others,
}

impl ExpenseCategory {
    pub const ALL: [ExpenseCategory; 7] = [
        ExpenseCategory::Entertainment,
        ExpenseCategory::EatingOut,
        ExpenseCategory::Clothing,
        ExpenseCategory::Travel,
        ExpenseCategory::BillsRent,
        ExpenseCategory::PersonalCare,
        ExpenseCategory::Others,
    ];

    pub fn code(self) -> &'static str {
        match self {
            ExpenseCategory::Entertainment => "entertainment",
            ExpenseCategory::EatingOut => "eating_out",
            ExpenseCategory::Clothing => "clothing",
            ExpenseCategory::Travel => "travel",
            ExpenseCategory::BillsRent => "bills_rent",
            ExpenseCategory::PersonalCare => "personal_care",
            ExpenseCategory::Others => "others",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            ExpenseCategory::Entertainment => "Entertainment",
            ExpenseCategory::EatingOut => "Eating Out",
            ExpenseCategory::Clothing => "Clothing & Shoes",
            ExpenseCategory::Travel => "Travel",
            ExpenseCategory::BillsRent => "Bills & Rent",
            ExpenseCategory::PersonalCare => "Personal Care",
            ExpenseCategory::Others => "Others",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|category| category.code() == code)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CategoryOption {
    pub code: &'static str,
    pub name: &'static str,
}

impl From<ExpenseCategory> for CategoryOption {
    fn from(category: ExpenseCategory) -> Self {
        CategoryOption {
            code: category.code(),
            name: category.display_name(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct IncomeRecord {
    pub id: i64,
    pub amount_cents: i64,
    pub source: String,
    pub description: Option<String>,
    pub occurred_on: NaiveDate,
}

#[derive(Debug, Clone)]
pub struct ExpenseRecord {
    pub id: i64,
    pub category: Option<ExpenseCategory>,
    pub amount_cents: i64,
    pub title: String,
    pub description: Option<String>,
    pub occurred_on: NaiveDate,
}

impl ExpenseRecord {
    /// Category display name, or the title when the expense is uncategorized.
    pub fn label(&self) -> &str {
        match self.category {
            Some(category) => category.display_name(),
            None => &self.title,
        }
    }
}

/// Fields a user may set on an income, for both create and update.
#[derive(Debug, Clone)]
pub struct IncomeDraft {
    pub amount_cents: i64,
    pub source: String,
    pub description: Option<String>,
    pub occurred_on: NaiveDate,
}

#[derive(Debug, Clone)]
pub struct ExpenseDraft {
    pub category: ExpenseCategory,
    pub amount_cents: i64,
    pub title: String,
    pub description: Option<String>,
    pub occurred_on: NaiveDate,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CategoryTotal {
    pub category: Option<ExpenseCategory>,
    pub total_cents: i64,
}

#[derive(Debug, Clone)]
pub struct BudgetRecord {
    pub id: i64,
    pub category: ExpenseCategory,
    pub amount_cents: i64,
    pub spent_cents: i64,
}
