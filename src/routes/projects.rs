use axum::extract::{Json, Query, State};
use serde::Serialize;
use tracing::info;

use crate::auth::AuthenticatedUser;
use crate::deletion;
use crate::error::{AppError, AppResult};
use crate::state::AppState;

use super::files::{load_project, ProjectQuery};

#[derive(Serialize)]
pub struct ContentsRemovedResponse {
    pub removed: bool,
}

/// Empties a project: every catalog row in one bulk commit, then the whole
/// bucket prefix. A project with no files is reported as a failure so the
/// caller can tell it apart from a successful wipe.
pub async fn remove_contents(
    State(state): State<AppState>,
    Query(query): Query<ProjectQuery>,
    user: AuthenticatedUser,
) -> AppResult<Json<ContentsRemovedResponse>> {
    user.require_file_mutation()?;
    let storage = state.object_store().map_err(AppError::from)?;

    let mut conn = state.db()?;
    let project = load_project(&mut conn, &query.project)?;
    if project.bucket.trim().is_empty() {
        return Err(AppError::internal(format!(
            "project {} has no bucket configured",
            project.public_id
        )));
    }

    deletion::delete_all(&mut conn, &project).map_err(AppError::from)?;

    // catalog commits before the bucket wipe: a failure here can only leave
    // orphaned objects, never rows pointing at deleted objects
    storage
        .remove_prefix(&project.bucket, "")
        .await
        .map_err(|err| AppError::internal(format!("failed to empty bucket: {err}")))?;

    info!(project = %project.public_id, "removed all project contents");
    Ok(Json(ContentsRemovedResponse { removed: true }))
}
