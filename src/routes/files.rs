use std::collections::BTreeMap;

use axum::extract::{Json, Query, State};
use diesel::prelude::*;
use diesel::PgConnection;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::auth::AuthenticatedUser;
use crate::catalog::{self, VersionReplacement};
use crate::deletion::{self, BatchOutcome};
use crate::error::{AppError, AppResult};
use crate::listing;
use crate::models::{File, NewFile, Project};
use crate::paths;
use crate::schema::files;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct ProjectQuery {
    pub project: String,
}

#[derive(Deserialize)]
pub struct ListQuery {
    pub project: String,
    #[serde(default = "default_subpath")]
    pub subpath: String,
    #[serde(default)]
    pub show_size: bool,
}

fn default_subpath() -> String {
    paths::ROOT.to_string()
}

#[derive(Deserialize)]
pub struct NewFileRequest {
    pub name: String,
    pub name_in_bucket: String,
    #[serde(default = "default_subpath")]
    pub subpath: String,
    pub size: i64,
    pub size_stored: i64,
    pub salt: String,
    pub public_key: String,
    pub checksum: String,
    #[serde(default)]
    pub compressed: bool,
}

#[derive(Serialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Serialize)]
pub struct ListedItem {
    pub name: String,
    pub folder: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
}

#[derive(Serialize)]
pub struct ListResponse {
    pub files_folders: Vec<ListedItem>,
}

#[derive(Serialize)]
pub struct MatchResponse {
    pub files: BTreeMap<String, String>,
}

#[derive(Serialize, Clone)]
pub struct FileInfoEntry {
    pub name: String,
    pub name_in_bucket: String,
    pub subpath: String,
    pub size: i64,
    pub size_stored: i64,
    pub salt: String,
    pub public_key: String,
    pub checksum: String,
    pub compressed: bool,
}

impl From<File> for FileInfoEntry {
    fn from(file: File) -> Self {
        Self {
            name: file.name,
            name_in_bucket: file.name_in_bucket,
            subpath: file.subpath,
            size: file.size,
            size_stored: file.size_stored,
            salt: file.salt,
            public_key: file.public_key,
            checksum: file.checksum,
            compressed: file.compressed,
        }
    }
}

#[derive(Serialize)]
pub struct FileInfoResponse {
    pub files: BTreeMap<String, FileInfoEntry>,
    pub folders: BTreeMap<String, Vec<FileInfoEntry>>,
}

#[derive(Serialize)]
pub struct RemovalReport {
    pub not_removed: BTreeMap<String, String>,
    pub not_exists: Vec<String>,
}

impl From<BatchOutcome> for RemovalReport {
    fn from(outcome: BatchOutcome) -> Self {
        Self {
            not_removed: outcome.not_removed,
            not_exists: outcome.not_exists,
        }
    }
}

#[derive(Deserialize)]
pub struct UpdateFileRequest {
    pub name: String,
}

pub(super) fn load_project(conn: &mut PgConnection, public_id: &str) -> AppResult<Project> {
    catalog::find_project(conn, public_id)
        .map_err(AppError::from)?
        .ok_or_else(AppError::not_found)
}

/// Registers a file after its upload to the bucket has completed. The catalog
/// row and the project size grow in the same transaction.
pub async fn new_file(
    State(state): State<AppState>,
    Query(query): Query<ProjectQuery>,
    user: AuthenticatedUser,
    Json(payload): Json<NewFileRequest>,
) -> AppResult<Json<MessageResponse>> {
    user.require_file_mutation()?;
    let mut conn = state.db()?;
    let project = load_project(&mut conn, &query.project)?;

    if catalog::find_file(&mut conn, project.id, &payload.name)?.is_some() {
        return Err(AppError::bad_request(format!(
            "file '{}' already exists in project {}",
            payload.name, project.public_id
        )));
    }

    let new_file = NewFile {
        id: Uuid::new_v4(),
        project_id: project.id,
        name: payload.name.clone(),
        name_in_bucket: payload.name_in_bucket,
        subpath: payload.subpath,
        size: payload.size,
        size_stored: payload.size_stored,
        salt: payload.salt,
        public_key: payload.public_key,
        checksum: payload.checksum,
        compressed: payload.compressed,
    };

    let file = catalog::register_file(&mut conn, &project, new_file)?;
    info!(project = %project.public_id, file = %file.name, size = file.size, "registered new file");

    Ok(Json(MessageResponse {
        message: format!("File '{}' added to catalog.", file.name),
    }))
}

/// Replaces the stored version of an existing file: new bucket key, sizes and
/// crypto metadata; the project size moves by the delta.
pub async fn replace_file(
    State(state): State<AppState>,
    Query(query): Query<ProjectQuery>,
    user: AuthenticatedUser,
    Json(payload): Json<NewFileRequest>,
) -> AppResult<Json<MessageResponse>> {
    user.require_file_mutation()?;
    let mut conn = state.db()?;
    let project = load_project(&mut conn, &query.project)?;

    let file = catalog::find_file(&mut conn, project.id, &payload.name)?
        .ok_or_else(AppError::not_found)?;

    let updated = catalog::replace_version(
        &mut conn,
        &project,
        &file,
        VersionReplacement {
            name_in_bucket: payload.name_in_bucket,
            size: payload.size,
            size_stored: payload.size_stored,
            salt: payload.salt,
            public_key: payload.public_key,
            checksum: payload.checksum,
            compressed: payload.compressed,
        },
    )?;
    info!(project = %project.public_id, file = %updated.name, "replaced file version");

    Ok(Json(MessageResponse {
        message: format!("File '{}' updated in catalog.", updated.name),
    }))
}

/// Maps the requested display names to their bucket keys, silently skipping
/// names with no catalog row.
pub async fn match_files(
    State(state): State<AppState>,
    Query(query): Query<ProjectQuery>,
    user: AuthenticatedUser,
    Json(names): Json<Vec<String>>,
) -> AppResult<Json<MatchResponse>> {
    user.require_file_mutation()?;
    let mut conn = state.db()?;
    let project = load_project(&mut conn, &query.project)?;

    let rows: Vec<(String, String)> = files::table
        .filter(files::project_id.eq(project.id))
        .filter(files::name.eq_any(&names))
        .select((files::name, files::name_in_bucket))
        .load(&mut conn)
        .map_err(AppError::from)?;

    Ok(Json(MatchResponse {
        files: rows.into_iter().collect(),
    }))
}

/// One directory level of the project, files and immediate child folders.
/// Folder sizes are computed on demand and only when asked for.
pub async fn list_files(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
    _user: AuthenticatedUser,
) -> AppResult<Json<ListResponse>> {
    let mut conn = state.db()?;
    let project = load_project(&mut conn, &query.project)?;

    let listing = listing::items_in_subpath(&mut conn, project.id, &query.subpath)?;
    debug!(
        project = %project.public_id,
        subpath = %query.subpath,
        files = listing.files.len(),
        folders = listing.folders.len(),
        "resolved folder listing"
    );

    let at_root = query.subpath == paths::ROOT;
    let mut files_folders = Vec::with_capacity(listing.files.len() + listing.folders.len());

    for (name, size) in listing.files {
        let display = if at_root {
            name
        } else {
            last_segment(&name).to_string()
        };
        files_folders.push(ListedItem {
            name: display,
            folder: false,
            size: query.show_size.then(|| format_byte_size(size)),
        });
    }

    for folder in listing.folders {
        let size = if query.show_size {
            Some(format_byte_size(listing::folder_size(
                &mut conn, project.id, &folder,
            )?))
        } else {
            None
        };
        let display = if at_root {
            folder
        } else {
            last_segment(&folder).to_string()
        };
        files_folders.push(ListedItem {
            name: display,
            folder: true,
            size,
        });
    }

    Ok(Json(ListResponse { files_folders }))
}

/// Download metadata for the named paths: exact file names first, everything
/// else tried as a folder prefix.
pub async fn file_info(
    State(state): State<AppState>,
    Query(query): Query<ProjectQuery>,
    _user: AuthenticatedUser,
    Json(requested): Json<Vec<String>>,
) -> AppResult<Json<FileInfoResponse>> {
    let mut conn = state.db()?;
    let project = load_project(&mut conn, &query.project)?;

    let matched: Vec<File> = files::table
        .filter(files::project_id.eq(project.id))
        .filter(files::name.eq_any(&requested))
        .load(&mut conn)
        .map_err(AppError::from)?;

    let mut file_entries: BTreeMap<String, FileInfoEntry> = BTreeMap::new();
    for file in matched {
        file_entries.insert(file.name.clone(), FileInfoEntry::from(file));
    }

    let mut folder_entries: BTreeMap<String, Vec<FileInfoEntry>> = BTreeMap::new();
    for path in &requested {
        if file_entries.contains_key(path) {
            continue;
        }
        let prefix = path.trim_end_matches('/');
        let contents: Vec<File> = files::table
            .filter(files::project_id.eq(project.id))
            .filter(files::subpath.like(format!("{prefix}%")))
            .load(&mut conn)
            .map_err(AppError::from)?;
        if !contents.is_empty() {
            folder_entries.insert(
                path.clone(),
                contents.into_iter().map(FileInfoEntry::from).collect(),
            );
        }
    }

    Ok(Json(FileInfoResponse {
        files: file_entries,
        folders: folder_entries,
    }))
}

/// Download metadata for the whole project; an empty project is a
/// caller-visible error, not an empty listing.
pub async fn file_info_all(
    State(state): State<AppState>,
    Query(query): Query<ProjectQuery>,
    _user: AuthenticatedUser,
) -> AppResult<Json<BTreeMap<String, FileInfoEntry>>> {
    let mut conn = state.db()?;
    let project = load_project(&mut conn, &query.project)?;

    let rows = catalog::project_files(&mut conn, project.id)?;
    if rows.is_empty() {
        return Err(AppError::bad_request(format!(
            "the project {} is empty",
            project.public_id
        )));
    }

    let entries = rows
        .into_iter()
        .map(|file| (file.name.clone(), FileInfoEntry::from(file)))
        .collect();
    Ok(Json(entries))
}

/// Stamps the latest download time on a named file.
pub async fn update_file(
    State(state): State<AppState>,
    Query(query): Query<ProjectQuery>,
    _user: AuthenticatedUser,
    Json(payload): Json<UpdateFileRequest>,
) -> AppResult<Json<MessageResponse>> {
    if payload.name.trim().is_empty() {
        return Err(AppError::bad_request(
            "no file name specified, cannot update file",
        ));
    }

    let mut conn = state.db()?;
    let project = load_project(&mut conn, &query.project)?;

    let file = catalog::find_file(&mut conn, project.id, &payload.name)?
        .ok_or_else(AppError::not_found)?;
    catalog::mark_downloaded(&mut conn, &file)?;

    Ok(Json(MessageResponse {
        message: "File info updated.".to_string(),
    }))
}

/// Removes the named files from catalog and bucket, one commit per file.
pub async fn remove_files(
    State(state): State<AppState>,
    Query(query): Query<ProjectQuery>,
    user: AuthenticatedUser,
    Json(names): Json<Vec<String>>,
) -> AppResult<Json<RemovalReport>> {
    user.require_file_mutation()?;
    let storage = state.object_store().map_err(AppError::from)?;

    let mut conn = state.db()?;
    let project = load_project(&mut conn, &query.project)?;

    let outcome = deletion::delete_multiple(&mut conn, storage.as_ref(), &project, &names).await?;
    info!(
        project = %project.public_id,
        requested = names.len(),
        failed = outcome.not_removed.len(),
        missing = outcome.not_exists.len(),
        "processed file removal batch"
    );

    Ok(Json(RemovalReport::from(outcome)))
}

/// Removes the named folders: catalog rows (the folder plus one nested level)
/// and the bucket object behind each removed row, each folder its own
/// commit-or-rollback unit.
pub async fn remove_folders(
    State(state): State<AppState>,
    Query(query): Query<ProjectQuery>,
    user: AuthenticatedUser,
    Json(folders): Json<Vec<String>>,
) -> AppResult<Json<RemovalReport>> {
    user.require_file_mutation()?;
    let storage = state.object_store().map_err(AppError::from)?;

    let mut conn = state.db()?;
    let project = load_project(&mut conn, &query.project)?;

    let outcome = deletion::delete_folders(&mut conn, storage.as_ref(), &project, &folders).await?;
    info!(
        project = %project.public_id,
        requested = folders.len(),
        failed = outcome.not_removed.len(),
        missing = outcome.not_exists.len(),
        "processed folder removal batch"
    );

    Ok(Json(RemovalReport::from(outcome)))
}

fn last_segment(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

fn format_byte_size(num_bytes: i64) -> String {
    const UNITS: [&str; 6] = ["B", "KB", "MB", "GB", "TB", "PB"];
    let mut value = num_bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{num_bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}
