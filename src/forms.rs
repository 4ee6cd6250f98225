use std::collections::BTreeMap;

use chrono::NaiveDate;
use rocket::FromForm;
use serde::Serialize;

use crate::models::{ExpenseCategory, ExpenseDraft, ExpenseRecord, IncomeDraft, IncomeRecord};
use crate::money::{format_money, parse_amount_to_cents};

/// Field name to message, rendered next to the offending input.
pub type FieldErrors = BTreeMap<&'static str, &'static str>;

// Every field is optional so a missing one becomes a message on the form
// instead of a rejected request.
#[derive(Debug, Default, FromForm, Serialize)]
pub struct IncomeForm {
    pub amount: Option<String>,
    pub source: Option<String>,
    pub description: Option<String>,
    pub date: Option<String>,
}

#[derive(Debug, Default, FromForm, Serialize)]
pub struct ExpenseForm {
    pub amount: Option<String>,
    pub title: Option<String>,
    pub category: Option<String>,
    pub description: Option<String>,
    pub date: Option<String>,
}

#[derive(Debug, Default, FromForm, Serialize)]
pub struct BudgetForm {
    pub category: Option<String>,
    pub month: Option<String>,
    pub year: Option<String>,
    pub amount: Option<String>,
}

#[derive(FromForm)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

#[derive(FromForm)]
pub struct RegisterForm {
    pub username: String,
    pub password: String,
    pub confirm_password: String,
}

fn filled(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|value| !value.is_empty())
}

fn validate_amount(value: &Option<String>, errors: &mut FieldErrors) -> i64 {
    match filled(value) {
        None => {
            errors.insert("amount", "Enter an amount.");
            0
        }
        Some(raw) => match parse_amount_to_cents(raw) {
            Some(cents) if cents > 0 => cents,
            _ => {
                errors.insert("amount", "Enter a positive amount with at most two decimals.");
                0
            }
        },
    }
}

fn validate_date(value: &Option<String>, today: NaiveDate, errors: &mut FieldErrors) -> NaiveDate {
    match filled(value) {
        None => today,
        Some(raw) => NaiveDate::parse_from_str(raw, "%Y-%m-%d").unwrap_or_else(|_| {
            errors.insert("date", "Enter a date as YYYY-MM-DD.");
            today
        }),
    }
}

impl IncomeForm {
    pub fn validate(&self, today: NaiveDate) -> Result<IncomeDraft, FieldErrors> {
        let mut errors = FieldErrors::new();
        let amount_cents = validate_amount(&self.amount, &mut errors);
        let source = filled(&self.source).unwrap_or_default().to_string();
        if source.is_empty() {
            errors.insert("source", "Enter where the income came from.");
        }
        let occurred_on = validate_date(&self.date, today, &mut errors);
        if !errors.is_empty() {
            return Err(errors);
        }
        Ok(IncomeDraft {
            amount_cents,
            source,
            description: filled(&self.description).map(str::to_string),
            occurred_on,
        })
    }

    pub fn from_record(record: &IncomeRecord) -> Self {
        IncomeForm {
            amount: Some(format_money(record.amount_cents)),
            source: Some(record.source.clone()),
            description: record.description.clone(),
            date: Some(record.occurred_on.format("%Y-%m-%d").to_string()),
        }
    }
}

impl ExpenseForm {
    /// Code of the submitted category, if one was chosen. Whether the code
    /// names a real category is up to the caller.
    pub fn category_code(&self) -> Option<&str> {
        filled(&self.category)
    }

    pub fn validate(&self, category: Option<ExpenseCategory>, today: NaiveDate) -> Result<ExpenseDraft, FieldErrors> {
        let mut errors = FieldErrors::new();
        let amount_cents = validate_amount(&self.amount, &mut errors);
        let title = filled(&self.title).unwrap_or_default().to_string();
        if title.is_empty() {
            errors.insert("title", "Enter a title.");
        }
        if category.is_none() {
            errors.insert("category", "Choose a category.");
        }
        let occurred_on = validate_date(&self.date, today, &mut errors);
        match category {
            Some(category) if errors.is_empty() => Ok(ExpenseDraft {
                category,
                amount_cents,
                title,
                description: filled(&self.description).map(str::to_string),
                occurred_on,
            }),
            _ => Err(errors),
        }
    }

    pub fn from_record(record: &ExpenseRecord) -> Self {
        ExpenseForm {
            amount: Some(format_money(record.amount_cents)),
            title: Some(record.title.clone()),
            category: record.category.map(|category| category.code().to_string()),
            description: record.description.clone(),
            date: Some(record.occurred_on.format("%Y-%m-%d").to_string()),
        }
    }
}

impl BudgetForm {
    pub fn category_code(&self) -> Option<&str> {
        filled(&self.category)
    }

    /// `(month, year, amount_cents)` or the first problem found.
    pub fn validate(&self) -> Result<(u32, i32, i64), &'static str> {
        let month = filled(&self.month)
            .and_then(|raw| raw.parse::<u32>().ok())
            .filter(|month| (1..=12).contains(month))
            .ok_or("Choose a month.")?;
        let year = filled(&self.year)
            .and_then(|raw| raw.parse::<i32>().ok())
            .ok_or("Choose a year.")?;
        let amount = filled(&self.amount)
            .and_then(parse_amount_to_cents)
            .filter(|cents| *cents > 0)
            .ok_or("Enter a positive budget amount.")?;
        Ok((month, year, amount))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 14).unwrap()
    }

    #[test]
    fn income_defaults_date_to_today() {
        let form = IncomeForm {
            amount: Some("1000".to_string()),
            source: Some(" Salary ".to_string()),
            description: Some("  ".to_string()),
            date: None,
        };
        let draft = form.validate(today()).unwrap();
        assert_eq!(draft.amount_cents, 100_000);
        assert_eq!(draft.source, "Salary");
        assert_eq!(draft.description, None);
        assert_eq!(draft.occurred_on, today());
    }

    #[test]
    fn income_reports_every_bad_field() {
        let form = IncomeForm {
            amount: Some("0".to_string()),
            source: None,
            description: None,
            date: Some("14/03/2025".to_string()),
        };
        let errors = form.validate(today()).unwrap_err();
        assert!(errors.contains_key("amount"));
        assert!(errors.contains_key("source"));
        assert!(errors.contains_key("date"));
    }

    #[test]
    fn expense_requires_category() {
        let form = ExpenseForm {
            amount: Some("150".to_string()),
            title: Some("Train".to_string()),
            category: None,
            description: None,
            date: Some("2025-03-02".to_string()),
        };
        assert_eq!(form.category_code(), None);
        let errors = form.validate(None, today()).unwrap_err();
        assert_eq!(errors.keys().copied().collect::<Vec<_>>(), vec!["category"]);

        let draft = form.validate(Some(ExpenseCategory::Travel), today()).unwrap();
        assert_eq!(draft.amount_cents, 15_000);
        assert_eq!(draft.occurred_on, NaiveDate::from_ymd_opt(2025, 3, 2).unwrap());
    }

    #[test]
    fn budget_form_checks_ranges() {
        let mut form = BudgetForm {
            category: Some("travel".to_string()),
            month: Some("3".to_string()),
            year: Some("2025".to_string()),
            amount: Some("500".to_string()),
        };
        assert_eq!(form.validate(), Ok((3, 2025, 50_000)));
        form.month = Some("13".to_string());
        assert_eq!(form.validate(), Err("Choose a month."));
        form.month = Some("3".to_string());
        form.amount = Some("-1".to_string());
        assert_eq!(form.validate(), Err("Enter a positive budget amount."));
    }
}
