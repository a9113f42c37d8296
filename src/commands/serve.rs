use std::net::SocketAddr;

use axum::extract::{DefaultBodyLimit, Path, State};
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::routing::get;
use axum::{Form, Router};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing::info;
use urlencoding::encode;

use crate::config::Config;
use crate::controllers::paste;
use crate::db::Database;
use crate::error::Error;
use crate::types::forms::{CreatePaste, EditPaste};
use crate::{markdown, views, App};

pub async fn run(app: App) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([127, 0, 0, 1], app.config.port));

    info!("listening on http://{addr}");

    axum::Server::bind(&addr)
        .serve(router(app).into_make_service())
        .await?;

    Ok(())
}

pub fn router(app: App) -> Router {
    let max_content_size = app.config.limits.max_content_size;

    Router::new()
        .route("/", get(index).post(create_paste))
        .route("/:slug", get(view_paste))
        .route("/:slug/edit", get(edit_form).post(edit_paste))
        .fallback(not_found)
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(max_content_size))
        .layer(TraceLayer::new_for_http())
        .with_state(app)
}

async fn index() -> Html<String> {
    Html(views::index("", "", None))
}

async fn not_found() -> Error {
    Error::NotFound
}

async fn create_paste(
    State(db): State<Database>,
    Form(form): Form<CreatePaste>,
) -> crate::Result<Response> {
    let custom_slug = Some(form.custom_slug.as_str());
    match paste::create(&db, &form.content, &form.password, custom_slug).await {
        Ok(paste) => Ok(redirect_to_paste(&paste.slug)),
        // re-render the form so nothing typed is lost
        Err(e) if e.is_user_error() => {
            let page = views::index(&form.content, &form.custom_slug, Some(&e.to_string()));
            Ok((e.status_code(), Html(page)).into_response())
        }
        Err(e) => Err(e),
    }
}

async fn view_paste(
    State(config): State<Config>,
    State(db): State<Database>,
    Path(slug): Path<String>,
) -> crate::Result<Html<String>> {
    let paste = paste::get(&db, &slug).await?;
    let rendered = markdown::render(&paste.content);
    Ok(Html(views::paste(&paste, &rendered, &config.base_url)))
}

async fn edit_form(
    State(db): State<Database>,
    Path(slug): Path<String>,
) -> crate::Result<Html<String>> {
    let paste = paste::get(&db, &slug).await?;
    Ok(Html(views::edit(&paste.slug, &paste.content, None)))
}

async fn edit_paste(
    State(db): State<Database>,
    Path(slug): Path<String>,
    Form(form): Form<EditPaste>,
) -> crate::Result<Response> {
    match paste::update(&db, &slug, &form.content, &form.password).await {
        Ok(paste) => Ok(redirect_to_paste(&paste.slug)),
        Err(e) if e.is_user_error() && !matches!(e, Error::NotFound) => {
            // show what was submitted, or the stored content if nothing was
            let content = if form.content.is_empty() {
                paste::get(&db, &slug).await?.content
            } else {
                form.content
            };
            let page = views::edit(&slug, &content, Some(&e.to_string()));
            Ok((e.status_code(), Html(page)).into_response())
        }
        Err(e) => Err(e),
    }
}

fn redirect_to_paste(slug: &str) -> Response {
    Redirect::to(&format!("/{}", encode(slug))).into_response()
}
