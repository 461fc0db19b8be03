//! Database Connection Pool Module
//!
//! PostgreSQL connection pooling via deadpool-postgres. The DbClient owns all
//! SQL; routes and services never touch connections directly. Every query is
//! parameterized and scoped by `org_id`, the tenant boundary.

use crate::error::{ApiError, ApiResult};
use crate::types::*;
use chrono::Utc;
use deadpool_postgres::{Config, ManagerConfig, Pool, RecyclingMethod, Runtime};
use incentedge_core::{
    new_entity_id, Application, ApplicationId, ApplicationStatus, Comment, CommentId, EntityId,
    OrgId, Program, ProgramId, StatusHistoryRecord, Task, TaskId, TaskStatus, Timestamp, UserId,
};
use serde_json::Value as JsonValue;
use std::time::Duration;
use tokio_postgres::types::ToSql;
use tokio_postgres::{NoTls, Row};

// ============================================================================
// CONNECTION POOL CONFIGURATION
// ============================================================================

/// Database connection pool configuration.
#[derive(Debug, Clone)]
pub struct DbConfig {
    pub host: String,
    pub port: u16,
    pub dbname: String,
    pub user: String,
    pub password: String,
    pub max_size: usize,
    pub timeout: Duration,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            dbname: "incentedge".to_string(),
            user: "postgres".to_string(),
            password: "".to_string(),
            max_size: 16,
            timeout: Duration::from_secs(30),
        }
    }
}

impl DbConfig {
    /// Create a new database configuration from environment variables.
    pub fn from_env() -> Self {
        Self {
            host: std::env::var("INCENTEDGE_DB_HOST").unwrap_or_else(|_| "localhost".to_string()),
            port: std::env::var("INCENTEDGE_DB_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(5432),
            dbname: std::env::var("INCENTEDGE_DB_NAME")
                .unwrap_or_else(|_| "incentedge".to_string()),
            user: std::env::var("INCENTEDGE_DB_USER").unwrap_or_else(|_| "postgres".to_string()),
            password: std::env::var("INCENTEDGE_DB_PASSWORD").unwrap_or_default(),
            max_size: std::env::var("INCENTEDGE_DB_POOL_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(16),
            timeout: Duration::from_secs(
                std::env::var("INCENTEDGE_DB_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            ),
        }
    }

    /// Create a connection pool from this configuration.
    pub fn create_pool(&self) -> ApiResult<Pool> {
        let mut cfg = Config::new();
        cfg.host = Some(self.host.clone());
        cfg.port = Some(self.port);
        cfg.dbname = Some(self.dbname.clone());
        cfg.user = Some(self.user.clone());
        cfg.password = Some(self.password.clone());

        cfg.manager = Some(ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        });

        let pool = cfg
            .create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(|e| ApiError::database_error(format!("Failed to create pool: {}", e)))?;

        Ok(pool)
    }
}

// ============================================================================
// ROW MAPPING
// ============================================================================

const APPLICATION_COLS: &str = "id, org_id, project_id, program_id, created_by, status, \
     amount_requested, amount_approved, deadline, submission_date, decision_date, \
     decision_notes, review_notes, created_at, updated_at";

const TASK_COLS: &str = "id, application_id, org_id, title, description, category, priority, \
     status, assignee, due_date, completed_at, created_at, updated_at";

const COMMENT_COLS: &str = "id, application_id, org_id, author, parent_comment_id, body, \
     reactions, is_system, deleted_at, created_at, updated_at";

const HISTORY_COLS: &str =
    "id, application_id, org_id, from_status, to_status, reason, actor, forced, created_at";

const PROGRAM_COLS: &str = "id, name, provider, program_type, funding_amount, deadline, \
     default_window_days, eligibility, source_url, active, created_at, updated_at";

/// Parse a stored enum token, reporting corrupt rows as database errors.
fn parse_enum<T>(column: &str, value: &str) -> ApiResult<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .parse()
        .map_err(|e| ApiError::database_error(format!("corrupt {} value: {}", column, e)))
}

fn application_from_row(row: &Row) -> ApiResult<Application> {
    let status: String = row.get("status");
    Ok(Application {
        id: row.get("id"),
        org_id: row.get("org_id"),
        project_id: row.get("project_id"),
        program_id: row.get("program_id"),
        created_by: row.get("created_by"),
        status: parse_enum("status", &status)?,
        amount_requested: row.get("amount_requested"),
        amount_approved: row.get("amount_approved"),
        deadline: row.get("deadline"),
        submission_date: row.get("submission_date"),
        decision_date: row.get("decision_date"),
        decision_notes: row.get("decision_notes"),
        review_notes: row.get("review_notes"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

fn task_from_row(row: &Row) -> ApiResult<Task> {
    let category: String = row.get("category");
    let priority: String = row.get("priority");
    let status: String = row.get("status");
    Ok(Task {
        id: row.get("id"),
        application_id: row.get("application_id"),
        org_id: row.get("org_id"),
        title: row.get("title"),
        description: row.get("description"),
        category: parse_enum("category", &category)?,
        priority: parse_enum("priority", &priority)?,
        status: parse_enum("status", &status)?,
        assignee: row.get("assignee"),
        due_date: row.get("due_date"),
        completed_at: row.get("completed_at"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

fn comment_from_row(row: &Row) -> Comment {
    Comment {
        id: row.get("id"),
        application_id: row.get("application_id"),
        org_id: row.get("org_id"),
        author: row.get("author"),
        parent_comment_id: row.get("parent_comment_id"),
        body: row.get("body"),
        reactions: row.get("reactions"),
        is_system: row.get("is_system"),
        deleted_at: row.get("deleted_at"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn history_from_row(row: &Row) -> ApiResult<StatusHistoryRecord> {
    let from_status: Option<String> = row.get("from_status");
    let to_status: String = row.get("to_status");
    Ok(StatusHistoryRecord {
        id: row.get("id"),
        application_id: row.get("application_id"),
        org_id: row.get("org_id"),
        from_status: from_status
            .as_deref()
            .map(|s| parse_enum("from_status", s))
            .transpose()?,
        to_status: parse_enum("to_status", &to_status)?,
        reason: row.get("reason"),
        actor: row.get("actor"),
        forced: row.get("forced"),
        created_at: row.get("created_at"),
    })
}

fn program_from_row(row: &Row) -> ApiResult<Program> {
    let program_type: String = row.get("program_type");
    Ok(Program {
        id: row.get("id"),
        name: row.get("name"),
        provider: row.get("provider"),
        program_type: parse_enum("program_type", &program_type)?,
        funding_amount: row.get("funding_amount"),
        deadline: row.get("deadline"),
        default_window_days: row.get("default_window_days"),
        eligibility: row.get("eligibility"),
        source_url: row.get("source_url"),
        active: row.get("active"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

// ============================================================================
// DATABASE CLIENT WRAPPER
// ============================================================================

/// Field updates applied alongside a status change, in the same UPDATE.
#[derive(Debug, Clone, Default)]
pub struct StatusFieldUpdates {
    pub submission_date: Option<Timestamp>,
    pub decision_date: Option<Timestamp>,
    pub amount_approved: Option<i64>,
    pub decision_notes: Option<String>,
}

/// Database client wrapping the connection pool with org-scoped operations.
#[derive(Clone)]
pub struct DbClient {
    pool: Pool,
}

impl DbClient {
    /// Create a new database client with the given pool.
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    /// Create a new database client from configuration.
    pub fn from_config(config: &DbConfig) -> ApiResult<Self> {
        let pool = config.create_pool()?;
        Ok(Self::new(pool))
    }

    /// Get the current pool size for observability.
    pub fn pool_size(&self) -> usize {
        self.pool.status().size
    }

    /// Get a connection from the pool.
    async fn get_conn(&self) -> ApiResult<deadpool_postgres::Object> {
        self.pool.get().await.map_err(ApiError::from)
    }

    /// Readiness probe: round-trip a trivial query.
    pub async fn health_check(&self) -> ApiResult<()> {
        let conn = self.get_conn().await?;
        conn.query_one("SELECT 1", &[]).await?;
        Ok(())
    }

    // ========================================================================
    // APPLICATION OPERATIONS
    // ========================================================================

    /// Insert a new application in draft status.
    pub async fn application_create(
        &self,
        org_id: OrgId,
        created_by: UserId,
        req: &CreateApplicationRequest,
        deadline: Option<chrono::NaiveDate>,
    ) -> ApiResult<Application> {
        let conn = self.get_conn().await?;
        let now = Utc::now();

        let row = conn
            .query_one(
                &format!(
                    "INSERT INTO applications \
                     (id, org_id, project_id, program_id, created_by, status, \
                      amount_requested, deadline, review_notes, created_at, updated_at) \
                     VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $10) \
                     RETURNING {APPLICATION_COLS}"
                ),
                &[
                    &new_entity_id(),
                    &org_id,
                    &req.project_id,
                    &req.program_id,
                    &created_by,
                    &ApplicationStatus::Draft.as_db_str(),
                    &req.amount_requested,
                    &deadline,
                    &req.review_notes,
                    &now,
                ],
            )
            .await?;

        application_from_row(&row)
    }

    /// Fetch one application within the caller's org.
    pub async fn application_get(
        &self,
        id: ApplicationId,
        org_id: OrgId,
    ) -> ApiResult<Option<Application>> {
        let conn = self.get_conn().await?;

        let row = conn
            .query_opt(
                &format!("SELECT {APPLICATION_COLS} FROM applications WHERE id = $1 AND org_id = $2"),
                &[&id, &org_id],
            )
            .await?;

        row.as_ref().map(application_from_row).transpose()
    }

    /// List applications with filters, sort, and pagination.
    pub async fn application_list(
        &self,
        org_id: OrgId,
        query: &ApplicationListQuery,
    ) -> ApiResult<(Vec<Application>, i64)> {
        let conn = self.get_conn().await?;

        let status_token = query.status.map(|s| s.as_db_str().to_string());
        let search_pattern = query.search.as_ref().map(|s| format!("%{}%", s));
        let limit = query.limit();
        let offset = query.offset();

        let mut clauses = vec!["org_id = $1".to_string()];
        let mut params: Vec<&(dyn ToSql + Sync)> = vec![&org_id];

        if let Some(token) = &status_token {
            params.push(token);
            clauses.push(format!("status = ${}", params.len()));
        }
        if let Some(project_id) = &query.project_id {
            params.push(project_id);
            clauses.push(format!("project_id = ${}", params.len()));
        }
        if let Some(program_id) = &query.program_id {
            params.push(program_id);
            clauses.push(format!("program_id = ${}", params.len()));
        }
        if let Some(pattern) = &search_pattern {
            params.push(pattern);
            clauses.push(format!("review_notes ILIKE ${}", params.len()));
        }

        let where_clause = clauses.join(" AND ");

        let total: i64 = conn
            .query_one(
                &format!("SELECT COUNT(*) FROM applications WHERE {where_clause}"),
                &params,
            )
            .await?
            .get(0);

        // Sort column comes from a fixed whitelist, never from user input
        let sort_column = query.sort_column();
        params.push(&limit);
        let limit_pos = params.len();
        params.push(&offset);
        let offset_pos = params.len();

        let rows = conn
            .query(
                &format!(
                    "SELECT {APPLICATION_COLS} FROM applications WHERE {where_clause} \
                     ORDER BY {sort_column} DESC LIMIT ${limit_pos} OFFSET ${offset_pos}"
                ),
                &params,
            )
            .await?;

        let applications = rows
            .iter()
            .map(application_from_row)
            .collect::<ApiResult<Vec<_>>>()?;

        Ok((applications, total))
    }

    /// Update mutable application fields (not status).
    pub async fn application_update_fields(
        &self,
        id: ApplicationId,
        org_id: OrgId,
        req: &UpdateApplicationRequest,
    ) -> ApiResult<Option<Application>> {
        let conn = self.get_conn().await?;
        let now = Utc::now();

        let row = conn
            .query_opt(
                &format!(
                    "UPDATE applications SET \
                     amount_requested = COALESCE($3, amount_requested), \
                     deadline = COALESCE($4, deadline), \
                     review_notes = COALESCE($5, review_notes), \
                     updated_at = $6 \
                     WHERE id = $1 AND org_id = $2 \
                     RETURNING {APPLICATION_COLS}"
                ),
                &[
                    &id,
                    &org_id,
                    &req.amount_requested,
                    &req.deadline,
                    &req.review_notes,
                    &now,
                ],
            )
            .await?;

        row.as_ref().map(application_from_row).transpose()
    }

    /// Apply a status change plus its status-specific field updates in one
    /// UPDATE, so there is no partially-transitioned row.
    pub async fn application_apply_transition(
        &self,
        id: ApplicationId,
        org_id: OrgId,
        to_status: ApplicationStatus,
        updates: &StatusFieldUpdates,
    ) -> ApiResult<Option<Application>> {
        let conn = self.get_conn().await?;
        let now = Utc::now();

        let row = conn
            .query_opt(
                &format!(
                    "UPDATE applications SET \
                     status = $3, \
                     submission_date = COALESCE($4, submission_date), \
                     decision_date = COALESCE($5, decision_date), \
                     amount_approved = COALESCE($6, amount_approved), \
                     decision_notes = COALESCE($7, decision_notes), \
                     updated_at = $8 \
                     WHERE id = $1 AND org_id = $2 \
                     RETURNING {APPLICATION_COLS}"
                ),
                &[
                    &id,
                    &org_id,
                    &to_status.as_db_str(),
                    &updates.submission_date,
                    &updates.decision_date,
                    &updates.amount_approved,
                    &updates.decision_notes,
                    &now,
                ],
            )
            .await?;

        row.as_ref().map(application_from_row).transpose()
    }

    /// Delete an application. Tasks, comments, and history cascade.
    pub async fn application_delete(&self, id: ApplicationId, org_id: OrgId) -> ApiResult<bool> {
        let conn = self.get_conn().await?;

        let deleted = conn
            .execute(
                "DELETE FROM applications WHERE id = $1 AND org_id = $2",
                &[&id, &org_id],
            )
            .await?;

        Ok(deleted > 0)
    }

    // ========================================================================
    // STATUS HISTORY OPERATIONS
    // ========================================================================

    /// Append one audit row. History is append-only; there is no update path.
    #[allow(clippy::too_many_arguments)]
    pub async fn status_history_append(
        &self,
        application_id: ApplicationId,
        org_id: OrgId,
        from_status: Option<ApplicationStatus>,
        to_status: ApplicationStatus,
        reason: Option<&str>,
        actor: UserId,
        forced: bool,
    ) -> ApiResult<StatusHistoryRecord> {
        let conn = self.get_conn().await?;
        let from_token = from_status.map(|s| s.as_db_str());

        let row = conn
            .query_one(
                &format!(
                    "INSERT INTO status_history \
                     (id, application_id, org_id, from_status, to_status, reason, actor, forced, created_at) \
                     VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
                     RETURNING {HISTORY_COLS}"
                ),
                &[
                    &new_entity_id(),
                    &application_id,
                    &org_id,
                    &from_token,
                    &to_status.as_db_str(),
                    &reason,
                    &actor,
                    &forced,
                    &Utc::now(),
                ],
            )
            .await?;

        history_from_row(&row)
    }

    /// Full history for an application, oldest first.
    pub async fn status_history_list(
        &self,
        application_id: ApplicationId,
        org_id: OrgId,
    ) -> ApiResult<Vec<StatusHistoryRecord>> {
        let conn = self.get_conn().await?;

        let rows = conn
            .query(
                &format!(
                    "SELECT {HISTORY_COLS} FROM status_history \
                     WHERE application_id = $1 AND org_id = $2 ORDER BY created_at ASC"
                ),
                &[&application_id, &org_id],
            )
            .await?;

        rows.iter().map(history_from_row).collect()
    }

    // ========================================================================
    // TASK OPERATIONS
    // ========================================================================

    pub async fn task_create(
        &self,
        application_id: ApplicationId,
        org_id: OrgId,
        req: &CreateTaskRequest,
    ) -> ApiResult<Task> {
        let conn = self.get_conn().await?;
        let now = Utc::now();

        let row = conn
            .query_one(
                &format!(
                    "INSERT INTO tasks \
                     (id, application_id, org_id, title, description, category, priority, \
                      status, assignee, due_date, created_at, updated_at) \
                     VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $11) \
                     RETURNING {TASK_COLS}"
                ),
                &[
                    &new_entity_id(),
                    &application_id,
                    &org_id,
                    &req.title,
                    &req.description,
                    &req.category.to_string(),
                    &req.priority.to_string(),
                    &TaskStatus::Pending.to_string(),
                    &req.assignee,
                    &req.due_date,
                    &now,
                ],
            )
            .await?;

        task_from_row(&row)
    }

    pub async fn task_get(
        &self,
        task_id: TaskId,
        application_id: ApplicationId,
        org_id: OrgId,
    ) -> ApiResult<Option<Task>> {
        let conn = self.get_conn().await?;

        let row = conn
            .query_opt(
                &format!(
                    "SELECT {TASK_COLS} FROM tasks \
                     WHERE id = $1 AND application_id = $2 AND org_id = $3"
                ),
                &[&task_id, &application_id, &org_id],
            )
            .await?;

        row.as_ref().map(task_from_row).transpose()
    }

    pub async fn task_list(
        &self,
        application_id: ApplicationId,
        org_id: OrgId,
    ) -> ApiResult<Vec<Task>> {
        let conn = self.get_conn().await?;

        let rows = conn
            .query(
                &format!(
                    "SELECT {TASK_COLS} FROM tasks \
                     WHERE application_id = $1 AND org_id = $2 ORDER BY created_at ASC"
                ),
                &[&application_id, &org_id],
            )
            .await?;

        rows.iter().map(task_from_row).collect()
    }

    /// Update task fields. `completed_at` is stamped when the status moves to
    /// completed and cleared when it moves away.
    pub async fn task_update(
        &self,
        task_id: TaskId,
        application_id: ApplicationId,
        org_id: OrgId,
        req: &UpdateTaskRequest,
    ) -> ApiResult<Option<Task>> {
        let conn = self.get_conn().await?;
        let now = Utc::now();

        let status_token = req.status.map(|s| s.to_string());
        let category_token = req.category.map(|c| c.to_string());
        let priority_token = req.priority.map(|p| p.to_string());
        let completed_at = match req.status {
            Some(TaskStatus::Completed) => Some(now),
            _ => None,
        };
        let clear_completed = matches!(
            req.status,
            Some(s) if s != TaskStatus::Completed
        );

        let row = conn
            .query_opt(
                &format!(
                    "UPDATE tasks SET \
                     title = COALESCE($4, title), \
                     description = COALESCE($5, description), \
                     category = COALESCE($6, category), \
                     priority = COALESCE($7, priority), \
                     status = COALESCE($8, status), \
                     assignee = COALESCE($9, assignee), \
                     due_date = COALESCE($10, due_date), \
                     completed_at = CASE WHEN $11 THEN NULL ELSE COALESCE($12, completed_at) END, \
                     updated_at = $13 \
                     WHERE id = $1 AND application_id = $2 AND org_id = $3 \
                     RETURNING {TASK_COLS}"
                ),
                &[
                    &task_id,
                    &application_id,
                    &org_id,
                    &req.title,
                    &req.description,
                    &category_token,
                    &priority_token,
                    &status_token,
                    &req.assignee,
                    &req.due_date,
                    &clear_completed,
                    &completed_at,
                    &now,
                ],
            )
            .await?;

        row.as_ref().map(task_from_row).transpose()
    }

    /// Apply one bulk action to a set of tasks. Returns the updated rows;
    /// ids outside the application/org are silently skipped. `completed_at`
    /// follows the same stamp-or-clear rule as `task_update`.
    pub async fn task_bulk_update(
        &self,
        application_id: ApplicationId,
        org_id: OrgId,
        task_ids: &[TaskId],
        new_status: Option<TaskStatus>,
        assignee: Option<UserId>,
        priority: Option<incentedge_core::TaskPriority>,
    ) -> ApiResult<Vec<Task>> {
        let conn = self.get_conn().await?;
        let now = Utc::now();

        let ids: Vec<EntityId> = task_ids.to_vec();
        let status_token = new_status.map(|s| s.to_string());
        let priority_token = priority.map(|p| p.to_string());
        let completed_at = match new_status {
            Some(TaskStatus::Completed) => Some(now),
            _ => None,
        };
        let clear_completed = matches!(
            new_status,
            Some(s) if s != TaskStatus::Completed
        );

        let rows = conn
            .query(
                &format!(
                    "UPDATE tasks SET \
                     status = COALESCE($4, status), \
                     assignee = COALESCE($5, assignee), \
                     priority = COALESCE($6, priority), \
                     completed_at = CASE WHEN $7 THEN NULL ELSE COALESCE($8, completed_at) END, \
                     updated_at = $9 \
                     WHERE id = ANY($1) AND application_id = $2 AND org_id = $3 \
                     RETURNING {TASK_COLS}"
                ),
                &[
                    &ids,
                    &application_id,
                    &org_id,
                    &status_token,
                    &assignee,
                    &priority_token,
                    &clear_completed,
                    &completed_at,
                    &now,
                ],
            )
            .await?;

        rows.iter().map(task_from_row).collect()
    }

    pub async fn task_delete(
        &self,
        task_id: TaskId,
        application_id: ApplicationId,
        org_id: OrgId,
    ) -> ApiResult<bool> {
        let conn = self.get_conn().await?;

        let deleted = conn
            .execute(
                "DELETE FROM tasks WHERE id = $1 AND application_id = $2 AND org_id = $3",
                &[&task_id, &application_id, &org_id],
            )
            .await?;

        Ok(deleted > 0)
    }

    // ========================================================================
    // COMMENT OPERATIONS
    // ========================================================================

    /// Insert a comment. `author = None` marks a system comment.
    pub async fn comment_create(
        &self,
        application_id: ApplicationId,
        org_id: OrgId,
        author: Option<UserId>,
        parent_comment_id: Option<CommentId>,
        body: &str,
    ) -> ApiResult<Comment> {
        let conn = self.get_conn().await?;
        let now = Utc::now();
        let is_system = author.is_none();

        let row = conn
            .query_one(
                &format!(
                    "INSERT INTO comments \
                     (id, application_id, org_id, author, parent_comment_id, body, \
                      reactions, is_system, created_at, updated_at) \
                     VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $9) \
                     RETURNING {COMMENT_COLS}"
                ),
                &[
                    &new_entity_id(),
                    &application_id,
                    &org_id,
                    &author,
                    &parent_comment_id,
                    &body,
                    &JsonValue::Object(serde_json::Map::new()),
                    &is_system,
                    &now,
                ],
            )
            .await?;

        Ok(comment_from_row(&row))
    }

    pub async fn comment_get(
        &self,
        comment_id: CommentId,
        application_id: ApplicationId,
        org_id: OrgId,
    ) -> ApiResult<Option<Comment>> {
        let conn = self.get_conn().await?;

        let row = conn
            .query_opt(
                &format!(
                    "SELECT {COMMENT_COLS} FROM comments \
                     WHERE id = $1 AND application_id = $2 AND org_id = $3"
                ),
                &[&comment_id, &application_id, &org_id],
            )
            .await?;

        Ok(row.as_ref().map(comment_from_row))
    }

    /// All comments for an application, oldest first. Soft-deleted comments
    /// are included (with their deleted_at set) so threads keep their shape.
    pub async fn comment_list(
        &self,
        application_id: ApplicationId,
        org_id: OrgId,
    ) -> ApiResult<Vec<Comment>> {
        let conn = self.get_conn().await?;

        let rows = conn
            .query(
                &format!(
                    "SELECT {COMMENT_COLS} FROM comments \
                     WHERE application_id = $1 AND org_id = $2 ORDER BY created_at ASC"
                ),
                &[&application_id, &org_id],
            )
            .await?;

        Ok(rows.iter().map(comment_from_row).collect())
    }

    pub async fn comment_update_body(
        &self,
        comment_id: CommentId,
        application_id: ApplicationId,
        org_id: OrgId,
        body: &str,
    ) -> ApiResult<Option<Comment>> {
        let conn = self.get_conn().await?;

        let row = conn
            .query_opt(
                &format!(
                    "UPDATE comments SET body = $4, updated_at = $5 \
                     WHERE id = $1 AND application_id = $2 AND org_id = $3 AND deleted_at IS NULL \
                     RETURNING {COMMENT_COLS}"
                ),
                &[&comment_id, &application_id, &org_id, &body, &Utc::now()],
            )
            .await?;

        Ok(row.as_ref().map(comment_from_row))
    }

    /// Soft delete: stamp deleted_at, never remove the row.
    pub async fn comment_soft_delete(
        &self,
        comment_id: CommentId,
        application_id: ApplicationId,
        org_id: OrgId,
    ) -> ApiResult<bool> {
        let conn = self.get_conn().await?;
        let now = Utc::now();

        let updated = conn
            .execute(
                "UPDATE comments SET deleted_at = $4, updated_at = $4 \
                 WHERE id = $1 AND application_id = $2 AND org_id = $3 AND deleted_at IS NULL",
                &[&comment_id, &application_id, &org_id, &now],
            )
            .await?;

        Ok(updated > 0)
    }

    /// Replace the reactions map wholesale; toggling happens in the route.
    pub async fn comment_set_reactions(
        &self,
        comment_id: CommentId,
        application_id: ApplicationId,
        org_id: OrgId,
        reactions: &JsonValue,
    ) -> ApiResult<Option<Comment>> {
        let conn = self.get_conn().await?;

        let row = conn
            .query_opt(
                &format!(
                    "UPDATE comments SET reactions = $4, updated_at = $5 \
                     WHERE id = $1 AND application_id = $2 AND org_id = $3 AND deleted_at IS NULL \
                     RETURNING {COMMENT_COLS}"
                ),
                &[
                    &comment_id,
                    &application_id,
                    &org_id,
                    reactions,
                    &Utc::now(),
                ],
            )
            .await?;

        Ok(row.as_ref().map(comment_from_row))
    }

    // ========================================================================
    // PROGRAM OPERATIONS
    // ========================================================================

    /// Insert a program into the shared catalog (not org-scoped).
    pub async fn program_create(&self, req: &CreateProgramRequest) -> ApiResult<Program> {
        let conn = self.get_conn().await?;
        let now = Utc::now();

        let row = conn
            .query_one(
                &format!(
                    "INSERT INTO programs \
                     (id, name, provider, program_type, funding_amount, deadline, \
                      default_window_days, eligibility, source_url, active, created_at, updated_at) \
                     VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $11) \
                     RETURNING {PROGRAM_COLS}"
                ),
                &[
                    &new_entity_id(),
                    &req.name,
                    &req.provider,
                    &req.program_type.to_string(),
                    &req.funding_amount,
                    &req.deadline,
                    &req.default_window_days,
                    &req.eligibility,
                    &req.source_url,
                    &req.active,
                    &now,
                ],
            )
            .await?;

        program_from_row(&row)
    }

    pub async fn program_get(&self, id: ProgramId) -> ApiResult<Option<Program>> {
        let conn = self.get_conn().await?;

        let row = conn
            .query_opt(
                &format!("SELECT {PROGRAM_COLS} FROM programs WHERE id = $1"),
                &[&id],
            )
            .await?;

        row.as_ref().map(program_from_row).transpose()
    }

    pub async fn program_list(&self, query: &ProgramListQuery) -> ApiResult<(Vec<Program>, i64)> {
        let conn = self.get_conn().await?;

        let type_token = query.program_type.map(|t| t.to_string());
        let search_pattern = query.search.as_ref().map(|s| format!("%{}%", s));
        let limit = query.limit();
        let offset = query.offset();

        let mut clauses = vec!["TRUE".to_string()];
        let mut params: Vec<&(dyn ToSql + Sync)> = Vec::new();

        if let Some(token) = &type_token {
            params.push(token);
            clauses.push(format!("program_type = ${}", params.len()));
        }
        if let Some(active) = &query.active {
            params.push(active);
            clauses.push(format!("active = ${}", params.len()));
        }
        if let Some(pattern) = &search_pattern {
            params.push(pattern);
            clauses.push(format!(
                "(name ILIKE ${n} OR provider ILIKE ${n})",
                n = params.len()
            ));
        }

        let where_clause = clauses.join(" AND ");

        let total: i64 = conn
            .query_one(
                &format!("SELECT COUNT(*) FROM programs WHERE {where_clause}"),
                &params,
            )
            .await?
            .get(0);

        params.push(&limit);
        let limit_pos = params.len();
        params.push(&offset);
        let offset_pos = params.len();

        let rows = conn
            .query(
                &format!(
                    "SELECT {PROGRAM_COLS} FROM programs WHERE {where_clause} \
                     ORDER BY name ASC LIMIT ${limit_pos} OFFSET ${offset_pos}"
                ),
                &params,
            )
            .await?;

        let programs = rows
            .iter()
            .map(program_from_row)
            .collect::<ApiResult<Vec<_>>>()?;

        Ok((programs, total))
    }

    // ========================================================================
    // NOTIFICATIONS & ACTIVITY LOG
    // ========================================================================

    /// Insert a user notification. Callers treat failures as log-and-continue.
    pub async fn notification_insert(
        &self,
        org_id: OrgId,
        user_id: UserId,
        application_id: ApplicationId,
        message: &str,
    ) -> ApiResult<()> {
        let conn = self.get_conn().await?;

        conn.execute(
            "INSERT INTO notifications (id, org_id, user_id, application_id, message, read, created_at) \
             VALUES ($1, $2, $3, $4, $5, FALSE, $6)",
            &[
                &new_entity_id(),
                &org_id,
                &user_id,
                &application_id,
                &message,
                &Utc::now(),
            ],
        )
        .await?;

        Ok(())
    }

    /// Append an activity-log row. Same log-and-continue contract.
    pub async fn activity_log_insert(
        &self,
        org_id: OrgId,
        actor: UserId,
        application_id: ApplicationId,
        action: &str,
        detail: &JsonValue,
    ) -> ApiResult<()> {
        let conn = self.get_conn().await?;

        conn.execute(
            "INSERT INTO activity_log (id, org_id, actor, application_id, action, detail, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
            &[
                &new_entity_id(),
                &org_id,
                &actor,
                &application_id,
                &action,
                detail,
                &Utc::now(),
            ],
        )
        .await?;

        Ok(())
    }
}
