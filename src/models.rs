use chrono::NaiveDateTime;
use diesel::prelude::*;
use uuid::Uuid;

use crate::schema::*;

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = users)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub password_hash: String,
    pub role: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = users)]
pub struct NewUser {
    pub id: Uuid,
    pub username: String,
    pub password_hash: String,
    pub role: String,
}

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = units)]
pub struct Unit {
    pub id: Uuid,
    pub public_id: String,
    pub name: String,
    pub external_ref: String,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = units)]
pub struct NewUnit {
    pub id: Uuid,
    pub public_id: String,
    pub name: String,
    pub external_ref: String,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = projects)]
#[diesel(belongs_to(Unit))]
pub struct Project {
    pub id: Uuid,
    pub public_id: String,
    pub title: String,
    pub bucket: String,
    pub unit_id: Uuid,
    pub size: i64,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = projects)]
pub struct NewProject {
    pub id: Uuid,
    pub public_id: String,
    pub title: String,
    pub bucket: String,
    pub unit_id: Uuid,
    pub size: i64,
}

/// A catalog row describing one uploaded object. `name` is the client-facing
/// display path, `name_in_bucket` the opaque object-store key; the two are
/// never interchangeable.
#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = files)]
#[diesel(belongs_to(Project))]
pub struct File {
    pub id: Uuid,
    pub project_id: Uuid,
    pub name: String,
    pub name_in_bucket: String,
    pub subpath: String,
    pub size: i64,
    pub size_stored: i64,
    pub salt: String,
    pub public_key: String,
    pub checksum: String,
    pub compressed: bool,
    pub time_latest_download: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = files)]
pub struct NewFile {
    pub id: Uuid,
    pub project_id: Uuid,
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
