//! Relational catalog primitives for projects and files.
//!
//! Every mutation that adds or removes a file row goes through this module so
//! the project size aggregate is adjusted in the same transaction as the row
//! change. There is no reconciliation pass; the invariant
//! `project.size == SUM(files.size)` holds because no call site can bypass
//! these functions.

use chrono::Utc;
use diesel::prelude::*;
use diesel::PgConnection;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{File, NewFile, Project};
use crate::schema::{files, projects};

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("catalog query failed: {0}")]
    Query(#[from] diesel::result::Error),
    #[error("object store is not available: {0}")]
    ObjectStoreUnavailable(String),
    #[error("failed to remove object '{key}': {reason}")]
    ObjectRemoval { key: String, reason: String },
    #[error("there are no files within project {0}")]
    Empty(String),
}

pub fn find_project(
    conn: &mut PgConnection,
    public_id: &str,
) -> Result<Option<Project>, CatalogError> {
    let project = projects::table
        .filter(projects::public_id.eq(public_id))
        .first::<Project>(conn)
        .optional()?;
    Ok(project)
}

pub fn find_file(
    conn: &mut PgConnection,
    project_id: Uuid,
    name: &str,
) -> Result<Option<File>, CatalogError> {
    let file = files::table
        .filter(files::project_id.eq(project_id))
        .filter(files::name.eq(name))
        .first::<File>(conn)
        .optional()?;
    Ok(file)
}

pub fn project_files(
    conn: &mut PgConnection,
    project_id: Uuid,
) -> Result<Vec<File>, CatalogError> {
    let rows = files::table
        .filter(files::project_id.eq(project_id))
        .load::<File>(conn)?;
    Ok(rows)
}

pub fn distinct_subpaths(
    conn: &mut PgConnection,
    project_id: Uuid,
) -> Result<Vec<String>, CatalogError> {
    let subpaths = files::table
        .filter(files::project_id.eq(project_id))
        .select(files::subpath)
        .distinct()
        .load::<String>(conn)?;
    Ok(subpaths)
}

/// Inserts a new file row and grows the project aggregate by its size, in one
/// transaction.
pub fn register_file(
    conn: &mut PgConnection,
    project: &Project,
    new_file: NewFile,
) -> Result<File, CatalogError> {
    let file = conn.transaction::<File, diesel::result::Error, _>(|conn| {
        diesel::insert_into(files::table)
            .values(&new_file)
            .execute(conn)?;
        diesel::update(projects::table.find(project.id))
            .set(projects::size.eq(projects::size + new_file.size))
            .execute(conn)?;
        files::table.find(new_file.id).first(conn)
    })?;
    Ok(file)
}

pub struct VersionReplacement {
    pub name_in_bucket: String,
    pub size: i64,
    pub size_stored: i64,
    pub salt: String,
    pub public_key: String,
    pub checksum: String,
    pub compressed: bool,
}

/// Points an existing row at a freshly uploaded object and re-balances the
/// project aggregate by the size delta, in one transaction.
pub fn replace_version(
    conn: &mut PgConnection,
    project: &Project,
    file: &File,
    replacement: VersionReplacement,
) -> Result<File, CatalogError> {
    let delta = replacement.size - file.size;
    let updated = conn.transaction::<File, diesel::result::Error, _>(|conn| {
        diesel::update(files::table.find(file.id))
            .set((
                files::name_in_bucket.eq(&replacement.name_in_bucket),
                files::size.eq(replacement.size),
                files::size_stored.eq(replacement.size_stored),
                files::salt.eq(&replacement.salt),
                files::public_key.eq(&replacement.public_key),
                files::checksum.eq(&replacement.checksum),
                files::compressed.eq(replacement.compressed),
                files::updated_at.eq(Utc::now().naive_utc()),
            ))
            .execute(conn)?;
        diesel::update(projects::table.find(project.id))
            .set(projects::size.eq(projects::size + delta))
            .execute(conn)?;
        files::table.find(file.id).first(conn)
    })?;
    Ok(updated)
}

/// Deletes one row and shrinks the project aggregate by its size. Runs inside
/// whatever transaction the caller holds open; it never commits.
pub fn remove_file_row(conn: &mut PgConnection, file: &File) -> Result<(), CatalogError> {
    diesel::delete(files::table.find(file.id)).execute(conn)?;
    diesel::update(projects::table.find(file.project_id))
        .set(projects::size.eq(projects::size - file.size))
        .execute(conn)?;
    Ok(())
}

/// Bulk-deletes every row of a project and zeroes the aggregate. Caller owns
/// the transaction. Returns the number of rows removed.
pub fn remove_all_rows(conn: &mut PgConnection, project_id: Uuid) -> Result<usize, CatalogError> {
    let removed =
        diesel::delete(files::table.filter(files::project_id.eq(project_id))).execute(conn)?;
    diesel::update(projects::table.find(project_id))
        .set(projects::size.eq(0_i64))
        .execute(conn)?;
    Ok(removed)
}

pub fn mark_downloaded(conn: &mut PgConnection, file: &File) -> Result<(), CatalogError> {
    diesel::update(files::table.find(file.id))
        .set(files::time_latest_download.eq(Utc::now().naive_utc()))
        .execute(conn)?;
    Ok(())
}

/// Sum of live row sizes; the value `project.size` must always agree with.
pub fn live_size_sum(conn: &mut PgConnection, project_id: Uuid) -> Result<i64, CatalogError> {
    let sizes = files::table
        .filter(files::project_id.eq(project_id))
        .select(files::size)
        .load::<i64>(conn)?;
    Ok(sizes.into_iter().sum())
}
