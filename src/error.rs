use rocket::http::Status;
use rocket::request::Request;
use rocket::response::{self, Redirect, Responder};
use thiserror::Error;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("not signed in")]
    Unauthenticated,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("pdf error: {0}")]
    Pdf(String),
}

impl<'r> Responder<'r, 'static> for AppError {
    fn respond_to(self, request: &'r Request<'_>) -> response::Result<'static> {
        match self {
            AppError::Unauthenticated => Redirect::to("/login").respond_to(request),
            AppError::NotFound(what) => {
                log::warn!("{} {}: {what} not found", request.method(), request.uri());
                Err(Status::NotFound)
            }
            other => {
                log::error!("{} {}: {other}", request.method(), request.uri());
                Err(Status::InternalServerError)
            }
        }
    }
}
