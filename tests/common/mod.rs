// Shared by every integration binary; not all of them use every helper.
#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::env;
use std::sync::Arc;

use anyhow::{anyhow, ensure, Context, Result};
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use delivery_backend::auth::jwt::JwtService;
use delivery_backend::auth::password;
use delivery_backend::catalog;
use delivery_backend::config::AppConfig;
use delivery_backend::db::{self, PgPool};
use delivery_backend::models::{NewFile, NewProject, NewUnit, NewUser, Project};
use delivery_backend::routes;
use delivery_backend::state::AppState;
use delivery_backend::storage::ObjectStorage;
use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::PgConnection;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use http_body_util::BodyExt;
use once_cell::sync::Lazy;
use serde::Serialize;
use tokio::sync::Mutex;
use tower::util::ServiceExt;
use uuid::Uuid;

const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

static DB_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

/// In-memory stand-in for the S3 gateway. Objects are keyed by
/// (bucket, key); removals can be made to fail per key to exercise the
/// rollback paths of the deletion coordinator.
#[derive(Default)]
pub struct FakeStorage {
    objects: Mutex<HashMap<(String, String), ()>>,
    failing_keys: Mutex<HashSet<String>>,
}

impl FakeStorage {
    pub async fn seed(&self, bucket: &str, key: &str) {
        let mut guard = self.objects.lock().await;
        guard.insert((bucket.to_string(), key.to_string()), ());
    }

    pub async fn fail_removal_of(&self, key: &str) {
        let mut guard = self.failing_keys.lock().await;
        guard.insert(key.to_string());
    }

    pub async fn contains(&self, bucket: &str, key: &str) -> bool {
        let guard = self.objects.lock().await;
        guard.contains_key(&(bucket.to_string(), key.to_string()))
    }
}

#[async_trait]
impl ObjectStorage for FakeStorage {
    async fn remove_object(&self, bucket: &str, key: &str) -> Result<()> {
        let failing = self.failing_keys.lock().await;
        ensure!(!failing.contains(key), "simulated removal failure for {key}");
        drop(failing);

        let mut guard = self.objects.lock().await;
        guard.remove(&(bucket.to_string(), key.to_string()));
        Ok(())
    }

    async fn remove_prefix(&self, bucket: &str, prefix: &str) -> Result<()> {
        let failing = self.failing_keys.lock().await;
        let mut guard = self.objects.lock().await;
        let matching: Vec<(String, String)> = guard
            .keys()
            .filter(|(b, k)| b == bucket && k.starts_with(prefix))
            .cloned()
            .collect();
        for entry in &matching {
            ensure!(
                !failing.contains(&entry.1),
                "simulated removal failure for {}",
                entry.1
            );
        }
        for entry in matching {
            guard.remove(&entry);
        }
        Ok(())
    }
}

pub struct TestApp {
    pub state: AppState,
    router: Router,
    storage: Arc<FakeStorage>,
}

impl TestApp {
    /// Returns None when TEST_DATABASE_URL is not set, so the Postgres-backed
    /// flows are skipped instead of failing on machines without a database.
    pub async fn try_new() -> Result<Option<Self>> {
        let database_url = match env::var("TEST_DATABASE_URL") {
            Ok(url) => url,
            Err(_) => {
                eprintln!("TEST_DATABASE_URL not set; skipping integration test");
                return Ok(None);
            }
        };

        let config = AppConfig {
            database_url: database_url.clone(),
            database_max_pool_size: db::DEFAULT_MAX_POOL_SIZE,
            server_host: "127.0.0.1".to_string(),
            server_port: 0,
            jwt_secret: "test-secret".to_string(),
            jwt_issuer: "test-issuer".to_string(),
            jwt_audience: "test-audience".to_string(),
            jwt_expiry_minutes: 60,
            cors_allowed_origin: None,
            aws_endpoint_url: None,
            aws_access_key_id: None,
            aws_secret_access_key: None,
            aws_region: "us-east-1".to_string(),
        };

        let pool = db::init_pool_with_size(&config.database_url, config.database_max_pool_size)?;
        prepare_database(&pool).await?;

        let storage = Arc::new(FakeStorage::default());
        let storage_for_state: Arc<dyn ObjectStorage> = storage.clone();
        let jwt = JwtService::from_config(&config)?;
        let state = AppState::new(pool, config, Some(storage_for_state), jwt);
        let router = routes::create_router(state.clone());

        Ok(Some(Self {
            state,
            router,
            storage,
        }))
    }

    /// A router over the same database but with no object store configured,
    /// for exercising the abort-before-mutation path.
    pub fn router_without_object_store(&self) -> Router {
        let state = AppState::new(
            self.state.pool.clone(),
            (*self.state.config).clone(),
            None,
            self.state.jwt.clone(),
        );
        routes::create_router(state)
    }

    pub fn storage(&self) -> Arc<FakeStorage> {
        self.storage.clone()
    }

    pub async fn insert_user(&self, username: &str, pass: &str, role: &str) -> Result<Uuid> {
        let username = username.to_string();
        let pass = pass.to_string();
        let role = role.to_string();
        self.with_conn(move |conn| {
            let user = NewUser {
                id: Uuid::new_v4(),
                username,
                password_hash: password::hash_password(&pass)?,
                role,
            };
            diesel::insert_into(delivery_backend::schema::users::table)
                .values(&user)
                .execute(conn)
                .context("failed to insert user")?;
            Ok(user.id)
        })
        .await
    }

    pub async fn insert_project(&self, public_id: &str, bucket: &str) -> Result<Uuid> {
        let public_id = public_id.to_string();
        let bucket = bucket.to_string();
        self.with_conn(move |conn| {
            let unit = NewUnit {
                id: Uuid::new_v4(),
                public_id: format!("unit-{}", Uuid::new_v4()),
                name: "Test Unit".to_string(),
                external_ref: "cloud-test".to_string(),
            };
            diesel::insert_into(delivery_backend::schema::units::table)
                .values(&unit)
                .execute(conn)
                .context("failed to insert unit")?;

            let project = NewProject {
                id: Uuid::new_v4(),
                public_id: public_id.clone(),
                title: format!("Project {public_id}"),
                bucket,
                unit_id: unit.id,
                size: 0,
            };
            diesel::insert_into(delivery_backend::schema::projects::table)
                .values(&project)
                .execute(conn)
                .context("failed to insert project")?;
            Ok(project.id)
        })
        .await
    }

    /// Registers a catalog row through the same size-accounting path the
    /// routes use, and seeds the matching fake object.
    pub async fn insert_file(
        &self,
        project_public_id: &str,
        name: &str,
        subpath: &str,
        size: i64,
        name_in_bucket: &str,
    ) -> Result<()> {
        let public_id = project_public_id.to_string();
        let name = name.to_string();
        let subpath = subpath.to_string();
        let key = name_in_bucket.to_string();
        let key_for_storage = key.clone();

        let bucket = self
            .with_conn(move |conn| {
                let project = load_project(conn, &public_id)?;
                let new_file = NewFile {
                    id: Uuid::new_v4(),
                    project_id: project.id,
                    name,
                    name_in_bucket: key,
                    subpath,
                    size,
                    size_stored: size,
                    salt: "0011223344556677".to_string(),
                    public_key: "test-public-key".to_string(),
                    checksum: "test-checksum".to_string(),
                    compressed: false,
                };
                catalog::register_file(conn, &project, new_file)
                    .map_err(|err| anyhow!("failed to register file: {err}"))?;
                Ok(project.bucket)
            })
            .await?;

        self.storage.seed(&bucket, &key_for_storage).await;
        Ok(())
    }

    pub async fn project_size(&self, project_public_id: &str) -> Result<i64> {
        let public_id = project_public_id.to_string();
        self.with_conn(move |conn| {
            let project = load_project(conn, &public_id)?;
            Ok(project.size)
        })
        .await
    }

    pub async fn live_size_sum(&self, project_public_id: &str) -> Result<i64> {
        let public_id = project_public_id.to_string();
        self.with_conn(move |conn| {
            let project = load_project(conn, &public_id)?;
            catalog::live_size_sum(conn, project.id)
                .map_err(|err| anyhow!("failed to sum file sizes: {err}"))
        })
        .await
    }

    pub async fn file_exists(&self, project_public_id: &str, name: &str) -> Result<bool> {
        let public_id = project_public_id.to_string();
        let name = name.to_string();
        self.with_conn(move |conn| {
            let project = load_project(conn, &public_id)?;
            let file = catalog::find_file(conn, project.id, &name)
                .map_err(|err| anyhow!("lookup failed: {err}"))?;
            Ok(file.is_some())
        })
        .await
    }

    pub async fn login_token(&self, username: &str, pass: &str) -> Result<String> {
        #[derive(Serialize)]
        struct LoginPayload<'a> {
            username: &'a str,
            password: &'a str,
        }

        let response = self
            .post_json(
                "/api/v1/auth/login",
                &LoginPayload {
                    username,
                    password: pass,
                },
                None,
            )
            .await?;

        ensure!(
            response.status() == StatusCode::OK,
            "login failed with status {}",
            response.status()
        );

        let body = body_to_vec(response.into_body()).await?;
        #[derive(serde::Deserialize)]
        struct LoginResponse {
            access_token: String,
        }
        let parsed: LoginResponse = serde_json::from_slice(&body)?;
        Ok(parsed.access_token)
    }

    pub async fn post_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        payload: &T,
        token: Option<&str>,
    ) -> Result<hyper::Response<Body>> {
        self.request_json(Method::POST, path, payload, token, None)
            .await
    }

    pub async fn put_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        payload: &T,
        token: Option<&str>,
    ) -> Result<hyper::Response<Body>> {
        self.request_json(Method::PUT, path, payload, token, None)
            .await
    }

    pub async fn delete_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        payload: &T,
        token: Option<&str>,
    ) -> Result<hyper::Response<Body>> {
        self.request_json(Method::DELETE, path, payload, token, None)
            .await
    }

    pub async fn delete_json_on<T: Serialize + ?Sized>(
        &self,
        router: Router,
        path: &str,
        payload: &T,
        token: Option<&str>,
    ) -> Result<hyper::Response<Body>> {
        self.request_json(Method::DELETE, path, payload, token, Some(router))
            .await
    }

    pub async fn get(&self, path: &str, token: Option<&str>) -> Result<hyper::Response<Body>> {
        let mut builder = Request::builder().method(Method::GET).uri(path);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        let request = builder.body(Body::empty())?;
        Ok(self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("infallible response"))
    }

    async fn request_json<T: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        payload: &T,
        token: Option<&str>,
        router: Option<Router>,
    ) -> Result<hyper::Response<Body>> {
        let body = serde_json::to_vec(payload)?;
        let mut builder = Request::builder()
            .method(method)
            .uri(path)
            .header("content-type", "application/json");
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        let request = builder.body(Body::from(body))?;
        let router = router.unwrap_or_else(|| self.router.clone());
        Ok(router
            .oneshot(request)
            .await
            .expect("infallible response"))
    }

    async fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut PgConnection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.state.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool
                .get()
                .map_err(|err| anyhow!("failed to get database connection: {err}"))?;
            f(&mut conn)
        })
        .await
        .context("connection task panicked")?
    }
}

fn load_project(conn: &mut PgConnection, public_id: &str) -> Result<Project> {
    catalog::find_project(conn, public_id)
        .map_err(|err| anyhow!("project lookup failed: {err}"))?
        .ok_or_else(|| anyhow!("project {public_id} missing"))
}

pub async fn acquire_db_lock() -> tokio::sync::MutexGuard<'static, ()> {
    DB_LOCK.lock().await
}

pub async fn body_to_vec(body: Body) -> Result<Vec<u8>> {
    let collected = body
        .collect()
        .await
        .map_err(|err| anyhow!("failed to read response body: {err}"))?;
    Ok(collected.to_bytes().to_vec())
}

async fn prepare_database(pool: &PgPool) -> Result<()> {
    let pool = pool.clone();
    tokio::task::spawn_blocking(move || -> Result<()> {
        let mut conn = pool
            .get()
            .map_err(|err| anyhow!("failed to acquire connection: {err}"))?;
        conn.run_pending_migrations(MIGRATIONS)
            .map_err(|err| anyhow!("failed to run migrations: {err}"))?;
        truncate_all(&mut conn)?;
        Ok(())
    })
    .await
    .context("migration task panicked")?
}

fn truncate_all(conn: &mut PgConnection) -> Result<()> {
    conn.batch_execute("TRUNCATE TABLE files, projects, units, users RESTART IDENTITY CASCADE;")
        .context("failed to truncate tables")?;
    Ok(())
}
