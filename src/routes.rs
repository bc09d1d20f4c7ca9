use std::{collections::HashMap, sync::Arc};

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::json;
use tracing::warn;

use crate::{
    AppState,
    catalog::{self, Params, Section},
    error::{AppError, AppResult},
    templates::{self, Choices, Panel},
};

#[derive(Debug, Deserialize)]
pub struct SectionQuery {
    section: Option<String>,
}

pub async fn index(
    State(state): State<Arc<AppState>>,
    Query(q): Query<SectionQuery>,
) -> AppResult<Html<String>> {
    let section = match q.section.as_deref().map(str::trim) {
        None | Some("") => Section::Documents,
        Some(slug) => Section::from_slug(slug)
            .ok_or_else(|| AppError::InvalidInput { field: "section", value: slug.to_string() })?,
    };

    let choices = load_choices(&state, section).await;
    Ok(Html(templates::section_page(section, &choices, &Params::default(), None)))
}

/// Runs an operation and renders its section with the result on top. Query
/// failures are shown in the result panel; only an unknown id is a page error.
pub async fn run(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(values): Query<HashMap<String, String>>,
) -> AppResult<Html<String>> {
    let op = catalog::find(&id)?;
    let params = Params::new(values);

    let result = catalog::execute(&state.services, op, &params).await;
    let choices = load_choices(&state, op.section).await;

    Ok(Html(templates::section_page(
        op.section,
        &choices,
        &params,
        Some(Panel { operation: op, result: &result }),
    )))
}

pub async fn api_run(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(values): Query<HashMap<String, String>>,
) -> Response {
    let result = async {
        let op = catalog::find(&id)?;
        catalog::execute(&state.services, op, &Params::new(values)).await
    }
    .await;

    match result {
        Ok(outcome) => Json(outcome).into_response(),
        Err(err) => {
            let status = match &err {
                AppError::UnknownOperation(_) => StatusCode::NOT_FOUND,
                e if e.is_user_input() => StatusCode::BAD_REQUEST,
                e if e.is_connectivity() => StatusCode::SERVICE_UNAVAILABLE,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            };
            (status, Json(json!({ "error": err.display_message() }))).into_response()
        },
    }
}

pub async fn health(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let timeout = state.services.query_timeout;
    let (documents, graph) = tokio::join!(
        tokio::time::timeout(timeout, state.services.films.ping()),
        tokio::time::timeout(timeout, state.services.graph.ping()),
    );

    Json(json!({ "documents": health_status(documents), "graph": health_status(graph) }))
}

fn health_status<T>(result: Result<AppResult<T>, tokio::time::error::Elapsed>) -> String {
    match result {
        Ok(Ok(_)) => "ok".to_string(),
        Ok(Err(err)) => err.display_message(),
        Err(_) => "timed out".to_string(),
    }
}

/// Actor and director names for the pickers. Only the graph-backed sections
/// need them; a failure degrades the pickers to free text.
async fn load_choices(state: &AppState, section: Section) -> Choices {
    if section == Section::Documents {
        return Choices::default();
    }

    let timeout = state.services.query_timeout;
    let graph = &state.services.graph;
    let names = async {
        let actors = tokio::time::timeout(timeout, graph.list_actors()).await.map_err(|_| {
            AppError::Timeout { operation: "list-actors".to_string(), seconds: timeout.as_secs() }
        })??;
        let directors = if section == Section::Graph {
            tokio::time::timeout(timeout, graph.list_directors()).await.map_err(|_| {
                AppError::Timeout {
                    operation: "list-directors".to_string(),
                    seconds: timeout.as_secs(),
                }
            })??
        } else {
            Vec::new()
        };
        Ok::<_, AppError>((actors, directors))
    }
    .await;

    match names {
        Ok((actors, directors)) => Choices { actors, directors, warning: None },
        Err(err) => {
            warn!(error = %err, "could not load actor and director names");
            Choices {
                warning: Some(format!(
                    "Actor and director lists are unavailable, type names instead. {}",
                    err.display_message()
                )),
                ..Choices::default()
            }
        },
    }
}
