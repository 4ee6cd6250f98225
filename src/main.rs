#[macro_use]
extern crate rocket;

mod aggregate;
mod auth;
mod config;
mod db;
mod error;
mod forms;
mod models;
mod money;
mod report;
mod views;

use chrono::{Datelike, Local, NaiveDate};
use rocket::fairing::{self, AdHoc};
use rocket::figment::Figment;
use rocket::form::Form;
use rocket::fs::FileServer;
use rocket::http::{CookieJar, Header};
use rocket::response::Redirect;
use rocket::{Build, Rocket, State};
use rocket_dyn_templates::Template;
use serde_json::json;

use aggregate::{Listing, Window};
use auth::require_user;
use config::AppConfig;
use db::DbPool;
use error::{AppError, AppResult};
use forms::{BudgetForm, ExpenseForm, FieldErrors, IncomeForm};
use models::{ExpenseCategory, User};
use money::format_money;

const RECENT_INCOMES: usize = 5;
const SIDEBAR_RECORDS: usize = 5;

#[derive(Responder)]
enum FormReply {
    Done(Redirect),
    #[response(status = 422)]
    Invalid(Template),
}

#[derive(Responder)]
#[response(content_type = "application/pdf")]
struct PdfDownload {
    body: Vec<u8>,
    disposition: Header<'static>,
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Resolves a submitted category code. Unknown codes, and codes whose row was
/// removed, are not-found errors.
fn resolve_category(conn: &rusqlite::Connection, code: Option<&str>) -> AppResult<Option<(ExpenseCategory, i64)>> {
    let Some(code) = code else {
        return Ok(None);
    };
    let category = ExpenseCategory::from_code(code).ok_or(AppError::NotFound("category"))?;
    let id = db::category_id(conn, category)?.ok_or(AppError::NotFound("category"))?;
    Ok(Some((category, id)))
}

fn render_dashboard(
    pool: &State<DbPool>,
    cookies: &CookieJar<'_>,
    config: &AppConfig,
    month: Option<String>,
    year: Option<String>,
    recent: Option<String>,
) -> AppResult<Template> {
    let user = require_user(pool, cookies)?;
    let today = today();
    let window = Window::from_query(month.as_deref(), year.as_deref(), today);
    let recent = config.recent_limit(recent.as_deref());
    let listing = Listing {
        incomes: Some(RECENT_INCOMES),
        expenses: Some(recent),
    };

    let conn = pool.get()?;
    let summary = aggregate::monthly_summary(&conn, user.id, window, today, listing)?;
    let years = aggregate::available_years(&conn, user.id, today)?;
    let context = views::dashboard_context(&user.username, &summary, &years, recent);
    Ok(Template::render("dashboard", &context))
}

#[get("/?<month>&<year>&<recent>")]
fn home(
    pool: &State<DbPool>,
    cookies: &CookieJar<'_>,
    config: &State<AppConfig>,
    month: Option<String>,
    year: Option<String>,
    recent: Option<String>,
) -> AppResult<Template> {
    render_dashboard(pool, cookies, config, month, year, recent)
}

#[get("/dashboard?<month>&<year>&<recent>")]
fn dashboard(
    pool: &State<DbPool>,
    cookies: &CookieJar<'_>,
    config: &State<AppConfig>,
    month: Option<String>,
    year: Option<String>,
    recent: Option<String>,
) -> AppResult<Template> {
    render_dashboard(pool, cookies, config, month, year, recent)
}

fn income_form_page(
    conn: &rusqlite::Connection,
    user: &User,
    values: &IncomeForm,
    errors: &FieldErrors,
) -> AppResult<Template> {
    let today = today();
    let summary = aggregate::monthly_summary(conn, user.id, Window::containing(today), today, Listing {
        incomes: Some(0),
        expenses: Some(0),
    })?;
    let recent = db::list_incomes(conn, user.id, None, Some(SIDEBAR_RECORDS))?;
    let context = json!({
        "username": user.username,
        "current_month": summary.window.month_name(),
        "total_income": format_money(summary.income_cents),
        "total_expenses": format_money(summary.expense_cents),
        "remaining": format_money(summary.remaining_cents),
        "recent_incomes": recent.iter().map(views::income_view).collect::<Vec<_>>(),
        "values": values,
        "errors": errors,
    });
    Ok(Template::render("add_income", &context))
}

#[get("/add-income")]
fn add_income(pool: &State<DbPool>, cookies: &CookieJar<'_>) -> AppResult<Template> {
    let user = require_user(pool, cookies)?;
    let conn = pool.get()?;
    income_form_page(&conn, &user, &IncomeForm::default(), &FieldErrors::new())
}

#[post("/add-income", data = "<form>")]
fn add_income_post(
    pool: &State<DbPool>,
    cookies: &CookieJar<'_>,
    form: Form<IncomeForm>,
) -> AppResult<FormReply> {
    let user = require_user(pool, cookies)?;
    let conn = pool.get()?;
    let form = form.into_inner();
    match form.validate(today()) {
        Ok(draft) => {
            let id = db::insert_income(&conn, user.id, &draft)?;
            log::info!("user {} added income {id}", user.id);
            Ok(FormReply::Done(Redirect::to("/dashboard/")))
        }
        Err(errors) => Ok(FormReply::Invalid(income_form_page(&conn, &user, &form, &errors)?)),
    }
}

#[get("/incomes")]
fn all_incomes(pool: &State<DbPool>, cookies: &CookieJar<'_>) -> AppResult<Template> {
    let user = require_user(pool, cookies)?;
    let conn = pool.get()?;
    let incomes = db::list_incomes(&conn, user.id, None, None)?;
    let total = db::income_total(&conn, user.id, None)?;
    let context = json!({
        "username": user.username,
        "incomes": incomes.iter().map(views::income_view).collect::<Vec<_>>(),
        "total_incomes": format_money(total),
    });
    Ok(Template::render("all_incomes", &context))
}

fn render_edit_income(user: &User, income_id: i64, values: &IncomeForm, errors: &FieldErrors) -> Template {
    Template::render(
        "edit_income",
        json!({
            "username": user.username,
            "income_id": income_id,
            "values": values,
            "errors": errors,
        }),
    )
}

#[get("/income/edit/<income_id>")]
fn edit_income(pool: &State<DbPool>, cookies: &CookieJar<'_>, income_id: i64) -> AppResult<Template> {
    let user = require_user(pool, cookies)?;
    let conn = pool.get()?;
    let income = db::get_income(&conn, user.id, income_id)?.ok_or(AppError::NotFound("income"))?;
    Ok(render_edit_income(&user, income_id, &IncomeForm::from_record(&income), &FieldErrors::new()))
}

#[post("/income/edit/<income_id>", data = "<form>")]
fn edit_income_post(
    pool: &State<DbPool>,
    cookies: &CookieJar<'_>,
    income_id: i64,
    form: Form<IncomeForm>,
) -> AppResult<FormReply> {
    let user = require_user(pool, cookies)?;
    let conn = pool.get()?;
    let form = form.into_inner();
    let draft = match form.validate(today()) {
        Ok(draft) => draft,
        Err(errors) => {
            db::get_income(&conn, user.id, income_id)?.ok_or(AppError::NotFound("income"))?;
            return Ok(FormReply::Invalid(render_edit_income(&user, income_id, &form, &errors)));
        }
    };
    if !db::update_income(&conn, user.id, income_id, &draft)? {
        return Err(AppError::NotFound("income"));
    }
    log::info!("user {} updated income {income_id}", user.id);
    Ok(FormReply::Done(Redirect::to("/incomes/")))
}

#[post("/income/delete/<income_id>")]
fn delete_income(pool: &State<DbPool>, cookies: &CookieJar<'_>, income_id: i64) -> AppResult<Redirect> {
    let user = require_user(pool, cookies)?;
    let conn = pool.get()?;
    if !db::delete_income(&conn, user.id, income_id)? {
        return Err(AppError::NotFound("income"));
    }
    log::info!("user {} deleted income {income_id}", user.id);
    Ok(Redirect::to("/incomes/"))
}

fn expense_form_page(
    conn: &rusqlite::Connection,
    user: &User,
    values: &ExpenseForm,
    errors: &FieldErrors,
) -> AppResult<Template> {
    let recent = db::list_expenses(conn, user.id, None, Some(SIDEBAR_RECORDS))?;
    let context = json!({
        "username": user.username,
        "current_month": Window::containing(today()).month_name(),
        "categories": views::category_options(),
        "recent_expenses": recent.iter().map(views::expense_view).collect::<Vec<_>>(),
        "values": values,
        "errors": errors,
    });
    Ok(Template::render("add_expense", &context))
}

#[get("/add-expense")]
fn add_expense(pool: &State<DbPool>, cookies: &CookieJar<'_>) -> AppResult<Template> {
    let user = require_user(pool, cookies)?;
    let conn = pool.get()?;
    expense_form_page(&conn, &user, &ExpenseForm::default(), &FieldErrors::new())
}

#[post("/add-expense", data = "<form>")]
fn add_expense_post(
    pool: &State<DbPool>,
    cookies: &CookieJar<'_>,
    form: Form<ExpenseForm>,
) -> AppResult<FormReply> {
    let user = require_user(pool, cookies)?;
    let conn = pool.get()?;
    let form = form.into_inner();
    let category = resolve_category(&conn, form.category_code())?;
    match form.validate(category.map(|(category, _)| category), today()) {
        Ok(draft) => {
            let id = db::insert_expense(&conn, user.id, &draft)?;
            log::info!("user {} added expense {id}", user.id);
            Ok(FormReply::Done(Redirect::to("/dashboard/")))
        }
        Err(errors) => Ok(FormReply::Invalid(expense_form_page(&conn, &user, &form, &errors)?)),
    }
}

#[get("/expenses")]
fn all_expenses(pool: &State<DbPool>, cookies: &CookieJar<'_>) -> AppResult<Template> {
    let user = require_user(pool, cookies)?;
    let conn = pool.get()?;
    let expenses = db::list_expenses(&conn, user.id, None, None)?;
    let total = db::expense_total(&conn, user.id, None)?;
    let context = json!({
        "username": user.username,
        "expenses": expenses.iter().map(views::expense_view).collect::<Vec<_>>(),
        "total_expenses": format_money(total),
    });
    Ok(Template::render("all_expenses", &context))
}

fn render_edit_expense(user: &User, expense_id: i64, values: &ExpenseForm, errors: &FieldErrors) -> Template {
    Template::render(
        "edit_expense",
        json!({
            "username": user.username,
            "expense_id": expense_id,
            "categories": views::category_options(),
            "values": values,
            "errors": errors,
        }),
    )
}

#[get("/expense/edit/<expense_id>")]
fn edit_expense(pool: &State<DbPool>, cookies: &CookieJar<'_>, expense_id: i64) -> AppResult<Template> {
    let user = require_user(pool, cookies)?;
    let conn = pool.get()?;
    let expense = db::get_expense(&conn, user.id, expense_id)?.ok_or(AppError::NotFound("expense"))?;
    Ok(render_edit_expense(&user, expense_id, &ExpenseForm::from_record(&expense), &FieldErrors::new()))
}

#[post("/expense/edit/<expense_id>", data = "<form>")]
fn edit_expense_post(
    pool: &State<DbPool>,
    cookies: &CookieJar<'_>,
    expense_id: i64,
    form: Form<ExpenseForm>,
) -> AppResult<FormReply> {
    let user = require_user(pool, cookies)?;
    let conn = pool.get()?;
    let form = form.into_inner();
    let category = resolve_category(&conn, form.category_code())?;
    let draft = match form.validate(category.map(|(category, _)| category), today()) {
        Ok(draft) => draft,
        Err(errors) => {
            db::get_expense(&conn, user.id, expense_id)?.ok_or(AppError::NotFound("expense"))?;
            return Ok(FormReply::Invalid(render_edit_expense(&user, expense_id, &form, &errors)));
        }
    };
    if !db::update_expense(&conn, user.id, expense_id, &draft)? {
        return Err(AppError::NotFound("expense"));
    }
    log::info!("user {} updated expense {expense_id}", user.id);
    Ok(FormReply::Done(Redirect::to("/expenses/")))
}

#[post("/expense/delete/<expense_id>")]
fn delete_expense(pool: &State<DbPool>, cookies: &CookieJar<'_>, expense_id: i64) -> AppResult<Redirect> {
    let user = require_user(pool, cookies)?;
    let conn = pool.get()?;
    if !db::delete_expense(&conn, user.id, expense_id)? {
        return Err(AppError::NotFound("expense"));
    }
    log::info!("user {} deleted expense {expense_id}", user.id);
    Ok(Redirect::to("/expenses/"))
}

fn budgets_page(
    conn: &rusqlite::Connection,
    user: &User,
    window: Window,
    error: Option<&str>,
) -> AppResult<Template> {
    let budgets = aggregate::budget_status(conn, user.id, window)?;
    let years = aggregate::available_years(conn, user.id, today())?;
    let context = views::budgets_context(&user.username, window, &budgets, &years, error);
    Ok(Template::render("budgets", &context))
}

#[get("/budgets?<month>&<year>")]
fn budgets(
    pool: &State<DbPool>,
    cookies: &CookieJar<'_>,
    month: Option<String>,
    year: Option<String>,
) -> AppResult<Template> {
    let user = require_user(pool, cookies)?;
    let conn = pool.get()?;
    let window = Window::from_query(month.as_deref(), year.as_deref(), today());
    budgets_page(&conn, &user, window, None)
}

#[post("/budgets", data = "<form>")]
fn set_budget(
    pool: &State<DbPool>,
    cookies: &CookieJar<'_>,
    form: Form<BudgetForm>,
) -> AppResult<FormReply> {
    let user = require_user(pool, cookies)?;
    let conn = pool.get()?;
    let form = form.into_inner();
    let category = resolve_category(&conn, form.category_code())?;
    let checked = match category {
        Some((_, category_id)) => form.validate().map(|values| (category_id, values)),
        None => Err("Choose a category."),
    };
    match checked {
        Ok((category_id, (month, year, amount_cents))) => {
            db::upsert_budget(&conn, user.id, category_id, month, year, amount_cents)?;
            log::info!("user {} set budget for {month}/{year}", user.id);
            Ok(FormReply::Done(Redirect::to(format!("/budgets?month={month}&year={year}"))))
        }
        Err(message) => {
            let window = Window::from_query(form.month.as_deref(), form.year.as_deref(), today());
            Ok(FormReply::Invalid(budgets_page(&conn, &user, window, Some(message))?))
        }
    }
}

#[get("/yearly-report")]
fn yearly_report_current(pool: &State<DbPool>, cookies: &CookieJar<'_>) -> AppResult<Template> {
    yearly_report_for(pool, cookies, None)
}

#[get("/yearly-report/<year>")]
fn yearly_report(pool: &State<DbPool>, cookies: &CookieJar<'_>, year: i32) -> AppResult<Template> {
    yearly_report_for(pool, cookies, Some(year))
}

fn yearly_report_for(pool: &State<DbPool>, cookies: &CookieJar<'_>, year: Option<i32>) -> AppResult<Template> {
    let user = require_user(pool, cookies)?;
    let today = today();
    let window = match year {
        Some(year) => Window::year(year).ok_or(AppError::NotFound("year"))?,
        None => Window::year(today.year()).ok_or(AppError::NotFound("year"))?,
    };
    let conn = pool.get()?;
    let rollup = aggregate::yearly_rollup(&conn, user.id, window)?;
    let years = aggregate::available_years(&conn, user.id, today)?;
    Ok(Template::render(
        "yearly_report",
        &views::yearly_context(&user.username, &rollup, &years),
    ))
}

#[get("/compare-months")]
fn compare_months(pool: &State<DbPool>, cookies: &CookieJar<'_>) -> AppResult<Template> {
    let user = require_user(pool, cookies)?;
    let conn = pool.get()?;
    let comparison = aggregate::compare_months(&conn, user.id, today())?;
    Ok(Template::render(
        "compare_months",
        &views::comparison_context(&user.username, &comparison),
    ))
}

#[get("/monthly-report/download?<month>&<year>")]
fn monthly_report_pdf(
    pool: &State<DbPool>,
    cookies: &CookieJar<'_>,
    config: &State<AppConfig>,
    month: Option<String>,
    year: Option<String>,
) -> AppResult<PdfDownload> {
    let user = require_user(pool, cookies)?;
    let today = today();
    let window = Window::from_query(month.as_deref(), year.as_deref(), today);
    let conn = pool.get()?;
    let summary = aggregate::monthly_summary(&conn, user.id, window, today, Listing::default())?;
    drop(conn);

    let report = report::build_monthly_report(&user.username, &summary);
    let body = report::render_pdf(&report, config.pdf_font.as_deref())?;
    log::info!("user {} exported {}", user.id, report.filename);
    Ok(PdfDownload {
        body,
        disposition: Header::new(
            "Content-Disposition",
            format!("attachment; filename=\"{}\"", report.filename),
        ),
    })
}

async fn init_database(rocket: Rocket<Build>) -> fairing::Result {
    let Some(config) = rocket.state::<AppConfig>() else {
        log::error!("configuration was not loaded");
        return Err(rocket);
    };
    let path = config.database_path.clone();
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        if let Err(err) = std::fs::create_dir_all(parent) {
            log::error!("cannot create {}: {err}", parent.display());
            return Err(rocket);
        }
    }
    match db::init_db(&path) {
        Ok(pool) => {
            log::info!("database ready at {}", path.display());
            Ok(rocket.manage(pool))
        }
        Err(err) => {
            log::error!("cannot open database {}: {err}", path.display());
            Err(rocket)
        }
    }
}

fn build_rocket(figment: Figment) -> Rocket<Build> {
    rocket::custom(figment)
        .attach(AdHoc::config::<AppConfig>())
        .attach(AdHoc::try_on_ignite("SQLite database", init_database))
        .mount(
            "/",
            routes![
                auth::register,
                auth::register_post,
                auth::login,
                auth::login_post,
                auth::logout,
                home,
                dashboard,
                add_income,
                add_income_post,
                all_incomes,
                edit_income,
                edit_income_post,
                delete_income,
                add_expense,
                add_expense_post,
                all_expenses,
                edit_expense,
                edit_expense_post,
                delete_expense,
                budgets,
                set_budget,
                yearly_report_current,
                yearly_report,
                compare_months,
                monthly_report_pdf
            ],
        )
        .mount("/static", FileServer::from("static"))
        .attach(Template::fairing())
}

#[launch]
fn rocket() -> _ {
    build_rocket(rocket::Config::figment())
}
