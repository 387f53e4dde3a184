use anyhow::{Context, Result};
use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    serve, Form, Router,
};
use minijinja::{path_loader, Environment};
use minijinja_autoreload::AutoReloader;
use serde::Serialize;
use std::{
    net::SocketAddr,
    path::{Path, PathBuf},
    sync::Arc,
};
use tokio::sync::Mutex;
use tower_http::{services::ServeDir, trace::TraceLayer};
use tracing::{error, info, warn};

use crate::agent::{FlowError, TravelAgent};
use crate::booking::{BookingConfirmation, Selections};
use crate::preferences::{TravelForm, DATE_FORMAT};
use crate::session::{Phase, SearchResults, Session};

const PAGE_TEMPLATE: &str = "index.html";

// Shared application state
#[derive(Clone)]
pub struct AppState {
    templates: Arc<AutoReloader>,
    // One session for the whole server, held for the length of a request cycle
    agent: Arc<Mutex<TravelAgent>>,
}

impl AppState {
    pub fn new(templates_dir: impl Into<PathBuf>, agent: TravelAgent) -> Self {
        Self {
            templates: Arc::new(create_minijinja_env(templates_dir.into())),
            agent: Arc::new(Mutex::new(agent)),
        }
    }
}

// Minijinja Environment setup
fn create_minijinja_env(templates_dir: PathBuf) -> AutoReloader {
    AutoReloader::new(move |notifier| {
        let mut env = Environment::new();
        env.set_loader(path_loader(&templates_dir));
        notifier.watch_path(&templates_dir, true);
        Ok(env)
    })
}

/// Everything the page template needs for one render.
#[derive(Serialize, Default)]
struct PageView {
    phase: Option<Phase>,
    form: TravelForm,
    results: Option<SearchResults>,
    selections: Selections,
    confirmation: Option<BookingConfirmation>,
    // Each warning renders next to the form that produced it.
    search_warning: Option<String>,
    booking_warning: Option<String>,
    error: Option<String>,
}

impl PageView {
    fn from_session(session: &Session) -> Self {
        Self {
            phase: Some(session.phase()),
            form: session
                .preferences()
                .map(TravelForm::from)
                .unwrap_or_else(fresh_form),
            results: session.results().cloned(),
            selections: session.selections().cloned().unwrap_or_default(),
            confirmation: session.confirmation().cloned(),
            ..Default::default()
        }
    }
}

// Dates default to today and party size to one adult, as a fresh form would.
fn fresh_form() -> TravelForm {
    let today = chrono::Local::now()
        .date_naive()
        .format(DATE_FORMAT)
        .to_string();
    TravelForm {
        departure_date: today.clone(),
        return_date: today,
        num_adults: "1".to_string(),
        num_children: "0".to_string(),
        ..Default::default()
    }
}

fn render(state: &AppState, status: StatusCode, view: &PageView) -> Response {
    // Acquire env, get template, and render within the same block
    let rendered = state.templates.acquire_env().and_then(|env| {
        env.get_template(PAGE_TEMPLATE).and_then(|tmpl| {
            tmpl.render(minijinja::context! {
                title => "Your Personal Travel Agent",
                page => view,
            })
        })
    });
    match rendered {
        Ok(html) => (status, Html(html)).into_response(),
        Err(e) => {
            error!("Failed to get or render template: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Html(format!("Internal Server Error: {}", e)),
            )
                .into_response()
        }
    }
}

async fn index_handler(State(state): State<AppState>) -> Response {
    let agent = state.agent.lock().await;
    let view = PageView::from_session(agent.session());
    render(&state, StatusCode::OK, &view)
}

async fn search_handler(
    State(state): State<AppState>,
    Form(form): Form<TravelForm>,
) -> Response {
    let mut agent = state.agent.lock().await;
    match agent.search(&form).await {
        Ok(_) => render(&state, StatusCode::OK, &PageView::from_session(agent.session())),
        Err(FlowError::Warning(warning)) => {
            warn!(%warning, "Search rejected");
            let view = PageView {
                form,
                search_warning: Some(warning.to_string()),
                ..PageView::from_session(agent.session())
            };
            render(&state, StatusCode::OK, &view)
        }
        Err(err @ FlowError::Generation { .. }) => {
            let view = PageView {
                form,
                error: Some(err.to_string()),
                ..PageView::from_session(agent.session())
            };
            render(&state, StatusCode::BAD_GATEWAY, &view)
        }
    }
}

async fn book_handler(
    State(state): State<AppState>,
    Form(selections): Form<Selections>,
) -> Response {
    let mut agent = state.agent.lock().await;
    match agent.book(selections.clone()) {
        Ok(_) => render(&state, StatusCode::OK, &PageView::from_session(agent.session())),
        Err(err) => {
            warn!(error = %err, "Booking rejected");
            let view = PageView {
                selections,
                booking_warning: Some(err.to_string()),
                ..PageView::from_session(agent.session())
            };
            render(&state, StatusCode::OK, &view)
        }
    }
}

/// Build the application router.
pub fn router(state: AppState, static_dir: &Path) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/search", post(search_handler))
        .route("/book", post(book_handler))
        .nest_service("/static", ServeDir::new(static_dir))
        .with_state(state)
        .layer(TraceLayer::new_for_http()) // Add request logging
}

pub async fn start_web_server(addr: SocketAddr, state: AppState, static_dir: &Path) -> Result<()> {
    let app = router(state, static_dir);

    info!("Web server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context(format!("Failed to bind to address {}", addr))?;

    serve(listener, app.into_make_service())
        .await
        .context("Web server failed")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_form_defaults() {
        let form = fresh_form();
        assert_eq!(form.num_adults, "1");
        assert_eq!(form.num_children, "0");
        assert!(form.destination.is_empty());
        assert_eq!(form.departure_date, form.return_date);
        assert_eq!(form.departure_date.len(), "2024-06-01".len());
    }

    #[test]
    fn test_idle_view_uses_fresh_form() {
        let view = PageView::from_session(&Session::Idle);
        assert_eq!(view.phase, Some(Phase::Idle));
        assert!(view.results.is_none());
        assert!(view.confirmation.is_none());
        assert_eq!(view.form.num_adults, "1");
    }
}
