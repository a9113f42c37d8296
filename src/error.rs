use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use thiserror::Error;
use tracing::error;

use crate::slug::MAX_SLUG_LEN;
use crate::views;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    #[error("content is required")]
    EmptyContent,
    #[error("password is required")]
    EmptyPassword,
    #[error(
        "custom slug may only contain letters, numbers, hyphens (-) and underscores (_), \
         up to {} characters",
        MAX_SLUG_LEN
    )]
    InvalidSlug,
    #[error("the slug \"{0}\" is already taken, choose another or leave it blank for a random one")]
    SlugTaken(String),
    #[error("could not allocate an unused slug after {0} attempts")]
    SlugsExhausted(usize),
    #[error("incorrect password")]
    WrongPassword,
    #[error("not found")]
    NotFound,
    #[error("database error")]
    Database { source: sqlx::Error },
    #[error("database migration error")]
    Migrate {
        #[from]
        source: sqlx::migrate::MigrateError,
    },
    #[error("password hashing error")]
    PasswordHash {
        #[from]
        source: argon2::password_hash::Error,
    },
}

impl Error {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::EmptyContent => StatusCode::BAD_REQUEST,
            Error::EmptyPassword => StatusCode::BAD_REQUEST,
            Error::InvalidSlug => StatusCode::BAD_REQUEST,
            Error::SlugTaken(_) => StatusCode::CONFLICT,
            Error::SlugsExhausted(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::WrongPassword => StatusCode::FORBIDDEN,
            Error::NotFound => StatusCode::NOT_FOUND,
            Error::Database { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Error::Migrate { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Error::PasswordHash { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Whether the error was caused by the submitted form rather than the server.
    pub fn is_user_error(&self) -> bool {
        self.status_code().is_client_error()
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status_code = self.status_code();

        let page = match &self {
            Error::NotFound => views::not_found(),
            e if e.is_user_error() => views::error_page(status_code, &e.to_string()),
            e => {
                error!("request failed: {e:?}");
                views::error_page(status_code, "something went wrong, please try again later")
            }
        };

        (status_code, Html(page)).into_response()
    }
}

impl From<sqlx::Error> for Error {
    fn from(source: sqlx::Error) -> Self {
        match source {
            sqlx::Error::RowNotFound => Error::NotFound,
            _ => Error::Database { source },
        }
    }
}

/// Whether a database error is a violated UNIQUE constraint.
pub(crate) fn is_unique_violation(error: &sqlx::Error) -> bool {
    // SQLITE_CONSTRAINT_UNIQUE and SQLITE_CONSTRAINT_PRIMARYKEY
    const UNIQUE_CODES: [&str; 2] = ["2067", "1555"];

    match error {
        sqlx::Error::Database(db_error) => {
            db_error
                .code()
                .map_or(false, |code| UNIQUE_CODES.contains(&code.as_ref()))
                || db_error.message().contains("UNIQUE constraint failed")
        }
        _ => false,
    }
}
