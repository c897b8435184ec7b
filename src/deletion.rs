//! Deletion coordinator: removes catalog rows and their backing bucket
//! objects as a logically atomic unit per target.
//!
//! Transactions are driven explicitly through diesel's transaction manager
//! rather than the closure API, because the commit decision for a target
//! depends on an object-store call that happens while the transaction is
//! open. Every exit path either commits or rolls back; a target is never left
//! with its row gone but its object present, or the reverse. Across a batch,
//! each successful target commits on its own, so an earlier success stays
//! committed when a later target fails.

use std::collections::BTreeMap;

use diesel::connection::{AnsiTransactionManager, TransactionManager};
use diesel::PgConnection;
use tracing::warn;

use crate::catalog::{self, CatalogError};
use crate::models::Project;
use crate::paths;
use crate::storage::ObjectStorage;

/// Outcome of removing a single named file from the catalog.
#[derive(Debug)]
pub struct FileRemoval {
    pub existed: bool,
    pub deleted: bool,
    pub name_in_bucket: Option<String>,
}

/// Outcome of removing a folder's rows. `keys` holds the bucket key of every
/// deleted row; each one still has a live object the caller must remove
/// before committing.
#[derive(Debug)]
pub struct FolderRemoval {
    pub existed: bool,
    pub deleted: bool,
    pub keys: Vec<String>,
}

/// Per-batch report. Failed targets map to a reason; absent targets are listed
/// separately so "did not exist" is never conflated with "could not remove".
#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub not_removed: BTreeMap<String, String>,
    pub not_exists: Vec<String>,
}

fn begin(conn: &mut PgConnection) -> Result<(), CatalogError> {
    AnsiTransactionManager::begin_transaction(conn).map_err(CatalogError::Query)
}

fn commit(conn: &mut PgConnection) -> Result<(), CatalogError> {
    AnsiTransactionManager::commit_transaction(conn).map_err(CatalogError::Query)
}

fn rollback(conn: &mut PgConnection) {
    if let Err(err) = AnsiTransactionManager::rollback_transaction(conn) {
        warn!(error = %err, "rollback failed; connection will be discarded");
    }
}

/// Deletes the row for `(project, name)` and shrinks the project size, inside
/// the transaction the caller holds open. Nothing is committed here; the
/// caller pairs this with the object-store removal and decides.
pub fn delete_one(
    conn: &mut PgConnection,
    project: &Project,
    name: &str,
) -> Result<FileRemoval, CatalogError> {
    let file = match catalog::find_file(conn, project.id, name)? {
        Some(file) => file,
        None => {
            return Ok(FileRemoval {
                existed: false,
                deleted: false,
                name_in_bucket: None,
            })
        }
    };

    let key = file.name_in_bucket.clone();
    catalog::remove_file_row(conn, &file)?;

    Ok(FileRemoval {
        existed: true,
        deleted: true,
        name_in_bucket: Some(key),
    })
}

/// Removes a set of named files, one transaction per target. For each name:
/// catalog delete (uncommitted) → object removal → commit. Any failure rolls
/// the target's catalog change back and records the reason; earlier commits
/// stand. Aborts before touching the catalog when the project has no bucket
/// to delete from.
pub async fn delete_multiple(
    conn: &mut PgConnection,
    storage: &dyn ObjectStorage,
    project: &Project,
    names: &[String],
) -> Result<BatchOutcome, CatalogError> {
    ensure_bucket(project)?;

    let mut outcome = BatchOutcome::default();

    for name in names {
        if let Err(err) = begin(conn) {
            outcome.not_removed.insert(name.clone(), err.to_string());
            continue;
        }

        let removal = match delete_one(conn, project, name) {
            Ok(removal) => removal,
            Err(err) => {
                rollback(conn);
                outcome.not_removed.insert(name.clone(), err.to_string());
                continue;
            }
        };

        if !removal.existed {
            rollback(conn);
            outcome.not_exists.push(name.clone());
            continue;
        }

        let key = match removal.name_in_bucket {
            Some(key) => key,
            None => {
                rollback(conn);
                outcome
                    .not_removed
                    .insert(name.clone(), "file has no bucket key".to_string());
                continue;
            }
        };

        if let Err(err) = storage.remove_object(&project.bucket, &key).await {
            rollback(conn);
            let reason = CatalogError::ObjectRemoval {
                key,
                reason: err.to_string(),
            };
            outcome.not_removed.insert(name.clone(), reason.to_string());
            continue;
        }

        if let Err(err) = commit(conn) {
            rollback(conn);
            outcome.not_removed.insert(name.clone(), err.to_string());
        }
    }

    Ok(outcome)
}

/// Deletes the rows directly in `folder` plus exactly one nested level, inside
/// the caller's open transaction. Deeper subtrees are left alone; the match
/// stops at one level. Object removal is the caller's responsibility: the
/// bucket keys are opaque and unrelated to display paths, so the caller must
/// remove each returned key before committing.
pub fn delete_folder(
    conn: &mut PgConnection,
    project: &Project,
    folder: &str,
) -> Result<FolderRemoval, CatalogError> {
    let rows: Vec<_> = catalog::project_files(conn, project.id)?
        .into_iter()
        .filter(|file| paths::matches_one_level(folder, &file.subpath))
        .collect();

    if rows.is_empty() {
        return Ok(FolderRemoval {
            existed: false,
            deleted: false,
            keys: Vec::new(),
        });
    }

    let mut keys = Vec::with_capacity(rows.len());
    for file in &rows {
        catalog::remove_file_row(conn, file)?;
        keys.push(file.name_in_bucket.clone());
    }

    Ok(FolderRemoval {
        existed: true,
        deleted: true,
        keys,
    })
}

/// Removes a set of folders: per folder, the catalog rows (one level) and the
/// object behind each removed row go in one commit-or-rollback unit.
pub async fn delete_folders(
    conn: &mut PgConnection,
    storage: &dyn ObjectStorage,
    project: &Project,
    folders: &[String],
) -> Result<BatchOutcome, CatalogError> {
    ensure_bucket(project)?;

    let mut outcome = BatchOutcome::default();

    for folder in folders {
        if let Err(err) = begin(conn) {
            outcome.not_removed.insert(folder.clone(), err.to_string());
            continue;
        }

        let removal = match delete_folder(conn, project, folder) {
            Ok(removal) => removal,
            Err(err) => {
                rollback(conn);
                outcome.not_removed.insert(folder.clone(), err.to_string());
                continue;
            }
        };

        if !removal.existed {
            rollback(conn);
            outcome.not_exists.push(folder.clone());
            continue;
        }

        let mut object_failure = None;
        for key in &removal.keys {
            if let Err(err) = storage.remove_object(&project.bucket, key).await {
                object_failure = Some(CatalogError::ObjectRemoval {
                    key: key.clone(),
                    reason: err.to_string(),
                });
                break;
            }
        }
        if let Some(reason) = object_failure {
            rollback(conn);
            outcome
                .not_removed
                .insert(folder.clone(), reason.to_string());
            continue;
        }

        if let Err(err) = commit(conn) {
            rollback(conn);
            outcome.not_removed.insert(folder.clone(), err.to_string());
        }
    }

    Ok(outcome)
}

/// Drops every file row of the project in one bulk statement, resets the size
/// aggregate to zero and commits. Zero matching rows is a caller-visible
/// failure, not a silent no-op.
pub fn delete_all(conn: &mut PgConnection, project: &Project) -> Result<(), CatalogError> {
    begin(conn)?;

    let removed = match catalog::remove_all_rows(conn, project.id) {
        Ok(removed) => removed,
        Err(err) => {
            rollback(conn);
            return Err(err);
        }
    };

    if removed == 0 {
        rollback(conn);
        return Err(CatalogError::Empty(project.public_id.clone()));
    }

    commit(conn)
}

fn ensure_bucket(project: &Project) -> Result<(), CatalogError> {
    if project.bucket.trim().is_empty() {
        return Err(CatalogError::ObjectStoreUnavailable(format!(
            "project {} has no bucket configured",
            project.public_id
        )));
    }
    Ok(())
}
