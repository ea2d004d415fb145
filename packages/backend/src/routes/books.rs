use axum::extract::{Path, State};
use axum::response::IntoResponse;
use serde::Serialize;

use pulpit_algo::PracticeItem;

use crate::response::{ok, AppError};
use crate::state::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BookDetail<'a> {
    name: &'a str,
    items: Vec<&'a PracticeItem>,
}

pub(super) async fn list_books(State(state): State<AppState>) -> impl IntoResponse {
    ok(state.library().summaries())
}

pub(super) async fn get_book(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let library = state.library();
    let book = library
        .get(&name)
        .ok_or_else(|| AppError::not_found(format!("book '{name}' not found")))?;

    let detail = BookDetail {
        name: &name,
        items: book.items().iter().map(|item| item.as_ref()).collect(),
    };
    Ok(ok(serde_json::to_value(detail).map_err(|e| AppError::internal(e.to_string()))?))
}
