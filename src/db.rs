use chrono::{NaiveDate, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::warn;

use crate::error::{Result, StoreError};
use crate::models::{
    format_date, parse_calendar_date, parse_timestamp, validate_priority, ActionType,
    ActivityEntry, CalendarTask, NewProject, NewTask, ObjectType, Project, Task, TaskStatus,
};

const SCHEMA_VERSION: i32 = 1;

/// Newest entries returned by `list_activity`, matching the server's window.
pub const ACTIVITY_WINDOW: usize = 100;

/// Single-user local Entity Store; every mutation is logged as user 1.
const LOCAL_USER_ID: i64 = 1;

const TASK_COLUMNS: &str = "id, project_id, title, description, assigned_to, status, priority, due_date, parent_task_id, depends_on_task_id";

pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        let db = Database { conn };
        db.init_schema()?;
        Ok(db)
    }

    fn init_schema(&self) -> Result<()> {
        let version: i32 = self
            .conn
            .query_row("PRAGMA user_version", [], |row| row.get(0))
            .unwrap_or(0);

        if version < SCHEMA_VERSION {
            self.conn.execute_batch(
                r#"
                CREATE TABLE IF NOT EXISTS projects (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    name TEXT NOT NULL,
                    description TEXT,
                    start_date TEXT,
                    end_date TEXT,
                    status TEXT NOT NULL DEFAULT 'active',
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );

                -- parent_task_id forms the subtask tree, depends_on_task_id the blocking chain
                CREATE TABLE IF NOT EXISTS tasks (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    project_id INTEGER NOT NULL,
                    title TEXT NOT NULL,
                    description TEXT,
                    assigned_to TEXT,
                    status TEXT NOT NULL DEFAULT 'todo',
                    priority INTEGER NOT NULL DEFAULT 3,
                    due_date TEXT,
                    parent_task_id INTEGER,
                    depends_on_task_id INTEGER,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL,
                    FOREIGN KEY (project_id) REFERENCES projects(id) ON DELETE CASCADE,
                    FOREIGN KEY (parent_task_id) REFERENCES tasks(id) ON DELETE CASCADE,
                    FOREIGN KEY (depends_on_task_id) REFERENCES tasks(id) ON DELETE SET NULL
                );

                -- Append-only audit trail
                CREATE TABLE IF NOT EXISTS activity_log (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    user_id INTEGER NOT NULL,
                    action_type TEXT NOT NULL,
                    object_type TEXT NOT NULL,
                    object_id INTEGER NOT NULL,
                    timestamp TEXT NOT NULL
                );

                CREATE INDEX IF NOT EXISTS idx_tasks_project ON tasks(project_id);
                CREATE INDEX IF NOT EXISTS idx_tasks_parent ON tasks(parent_task_id);
                CREATE INDEX IF NOT EXISTS idx_tasks_depends ON tasks(depends_on_task_id);
                CREATE INDEX IF NOT EXISTS idx_tasks_due ON tasks(due_date);
                CREATE INDEX IF NOT EXISTS idx_activity_timestamp ON activity_log(timestamp);
                "#,
            )?;

            self.conn
                .execute_batch(&format!("PRAGMA user_version = {}", SCHEMA_VERSION))?;
        }

        self.conn.execute("PRAGMA foreign_keys = ON", [])?;

        Ok(())
    }

    // Projects
    pub fn create_project(&self, project: &NewProject) -> Result<Project> {
        if project.name.trim().is_empty() {
            return Err(StoreError::InvalidInput("project name must not be empty".into()));
        }
        let now = now_stamp();
        self.conn.execute(
            "INSERT INTO projects (name, description, start_date, end_date, status, created_at, updated_at) VALUES (?1, ?2, ?3, ?4, 'active', ?5, ?5)",
            params![
                project.name,
                project.description,
                project.start_date.map(format_date),
                project.end_date.map(format_date),
                now
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        self.log_activity(ActionType::Created, ObjectType::Project, id);
        self.get_project(id)?
            .ok_or(StoreError::NotFound { entity: "project", id })
    }

    pub fn get_project(&self, id: i64) -> Result<Option<Project>> {
        let project = self
            .conn
            .query_row(
                "SELECT id, name, description, start_date, end_date, status FROM projects WHERE id = ?1",
                [id],
                project_from_row,
            )
            .optional()?;
        Ok(project)
    }

    pub fn list_projects(&self) -> Result<Vec<Project>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, description, start_date, end_date, status FROM projects ORDER BY id",
        )?;
        let projects = stmt
            .query_map([], project_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(projects)
    }

    pub fn update_project(&self, project: &Project) -> Result<bool> {
        let rows = self.conn.execute(
            "UPDATE projects SET name = ?1, description = ?2, start_date = ?3, end_date = ?4, status = ?5, updated_at = ?6 WHERE id = ?7",
            params![
                project.name,
                project.description,
                project.start_date.map(format_date),
                project.end_date.map(format_date),
                project.status,
                now_stamp(),
                project.id
            ],
        )?;
        if rows > 0 {
            self.log_activity(ActionType::Updated, ObjectType::Project, project.id);
        }
        Ok(rows > 0)
    }

    /// Deleting a project removes its tasks with it.
    pub fn delete_project(&self, id: i64) -> Result<bool> {
        let rows = self.conn.execute("DELETE FROM projects WHERE id = ?1", [id])?;
        if rows > 0 {
            self.log_activity(ActionType::Deleted, ObjectType::Project, id);
        }
        Ok(rows > 0)
    }

    // Tasks
    pub fn create_task(&self, task: &NewTask) -> Result<Task> {
        if task.title.trim().is_empty() {
            return Err(StoreError::InvalidInput("task title must not be empty".into()));
        }
        if !validate_priority(task.priority) {
            return Err(StoreError::InvalidInput(format!(
                "invalid priority {}; must be between 1 and 5",
                task.priority
            )));
        }
        if self.get_project(task.project_id)?.is_none() {
            return Err(StoreError::NotFound { entity: "project", id: task.project_id });
        }
        for related in [task.parent_task_id, task.depends_on_task_id].into_iter().flatten() {
            if !self.task_exists(related)? {
                return Err(StoreError::NotFound { entity: "task", id: related });
            }
        }

        let now = now_stamp();
        self.conn.execute(
            "INSERT INTO tasks (project_id, title, description, assigned_to, status, priority, due_date, parent_task_id, depends_on_task_id, created_at, updated_at) VALUES (?1, ?2, ?3, ?4, 'todo', ?5, ?6, ?7, ?8, ?9, ?9)",
            params![
                task.project_id,
                task.title,
                task.description,
                task.assigned_to,
                task.priority,
                task.due_date.map(format_date),
                task.parent_task_id,
                task.depends_on_task_id,
                now
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        self.log_activity(ActionType::Created, ObjectType::Task, id);
        self.get_task(id)?.ok_or(StoreError::NotFound { entity: "task", id })
    }

    /// Creates a task under `parent_id`, inheriting the parent's project.
    pub fn create_subtask(&self, parent_id: i64, task: &NewTask) -> Result<Task> {
        let parent = self
            .get_task(parent_id)?
            .ok_or(StoreError::NotFound { entity: "task", id: parent_id })?;
        let subtask = NewTask {
            project_id: parent.project_id,
            parent_task_id: Some(parent_id),
            ..task.clone()
        };
        self.create_task(&subtask)
    }

    fn task_exists(&self, id: i64) -> Result<bool> {
        let found: Option<i64> = self
            .conn
            .query_row("SELECT id FROM tasks WHERE id = ?1", [id], |row| row.get(0))
            .optional()?;
        Ok(found.is_some())
    }

    pub fn get_task(&self, id: i64) -> Result<Option<Task>> {
        let task = self
            .conn
            .query_row(
                &format!("SELECT {} FROM tasks WHERE id = ?1", TASK_COLUMNS),
                [id],
                task_from_row,
            )
            .optional()?;
        Ok(task)
    }

    pub fn list_tasks(&self) -> Result<Vec<Task>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {} FROM tasks ORDER BY id", TASK_COLUMNS))?;
        let tasks = stmt
            .query_map([], task_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(tasks)
    }

    pub fn get_subtasks(&self, parent_id: i64) -> Result<Vec<Task>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM tasks WHERE parent_task_id = ?1 ORDER BY id",
            TASK_COLUMNS
        ))?;
        let tasks = stmt
            .query_map([parent_id], task_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(tasks)
    }

    /// Full-record replace. A written status of `overdue` keeps the stored
    /// status, since overdue is derived rather than stored.
    pub fn update_task(&self, task: &Task) -> Result<bool> {
        if !validate_priority(task.priority) {
            return Err(StoreError::InvalidInput(format!(
                "invalid priority {}; must be between 1 and 5",
                task.priority
            )));
        }
        let rows = self.conn.execute(
            r#"
            UPDATE tasks SET
                project_id = ?1,
                title = ?2,
                description = ?3,
                assigned_to = ?4,
                status = CASE WHEN ?5 = 'overdue' THEN status ELSE ?5 END,
                priority = ?6,
                due_date = ?7,
                parent_task_id = ?8,
                depends_on_task_id = ?9,
                updated_at = ?10
            WHERE id = ?11
            "#,
            params![
                task.project_id,
                task.title,
                task.description,
                task.assigned_to,
                task.status.as_str(),
                task.priority,
                task.due_date.map(format_date),
                task.parent_task_id,
                task.depends_on_task_id,
                now_stamp(),
                task.id
            ],
        )?;
        if rows > 0 {
            self.log_activity(ActionType::Updated, ObjectType::Task, task.id);
        }
        Ok(rows > 0)
    }

    pub fn delete_task(&self, id: i64) -> Result<bool> {
        let rows = self.conn.execute("DELETE FROM tasks WHERE id = ?1", [id])?;
        if rows > 0 {
            self.log_activity(ActionType::Deleted, ObjectType::Task, id);
        }
        Ok(rows > 0)
    }

    /// Tasks with a due date, optionally within `[from, to]`, with overdue
    /// derived against `today`.
    pub fn calendar_tasks(
        &self,
        range: Option<(NaiveDate, NaiveDate)>,
        today: NaiveDate,
    ) -> Result<Vec<CalendarTask>> {
        let map_row = |row: &Row<'_>| -> rusqlite::Result<(i64, String, Option<String>, String, String)> {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
        };
        let rows = match range {
            Some((from, to)) => {
                let mut stmt = self.conn.prepare(
                    "SELECT id, title, assigned_to, status, due_date FROM tasks WHERE due_date BETWEEN ?1 AND ?2 ORDER BY due_date, id",
                )?;
                let rows = stmt
                    .query_map(params![format_date(from), format_date(to)], map_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                rows
            }
            None => {
                let mut stmt = self.conn.prepare(
                    "SELECT id, title, assigned_to, status, due_date FROM tasks WHERE due_date IS NOT NULL ORDER BY due_date, id",
                )?;
                let rows = stmt
                    .query_map([], map_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                rows
            }
        };

        Ok(rows
            .into_iter()
            .filter_map(|(id, title, assigned_to, status, due)| {
                let due_date = parse_calendar_date(&due)?;
                Some(CalendarTask {
                    id,
                    title,
                    assigned_to,
                    status: TaskStatus::parse_lenient(&status).derive(Some(due_date), today),
                    due_date,
                })
            })
            .collect())
    }

    // Activity log

    /// Logging never fails the mutation that triggered it.
    fn log_activity(&self, action: ActionType, object: ObjectType, object_id: i64) {
        if let Err(e) = self.conn.execute(
            "INSERT INTO activity_log (user_id, action_type, object_type, object_id, timestamp) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![LOCAL_USER_ID, action.as_str(), object.as_str(), object_id, now_stamp()],
        ) {
            warn!(action = %action, object = %object, object_id, "failed to log activity: {}", e);
        }
    }

    /// Newest-first window of the log, joined with the current state of the
    /// referenced project or task.
    pub fn list_activity(&self, limit: usize) -> Result<Vec<ActivityEntry>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT
                a.id, a.action_type, a.object_type, a.object_id, a.timestamp, a.user_id,
                p.name, p.description, p.status,
                t.title, t.description, t.status, t.priority,
                tp.name
            FROM activity_log a
            LEFT JOIN projects p ON a.object_type = 'project' AND a.object_id = p.id
            LEFT JOIN tasks t ON a.object_type = 'task' AND a.object_id = t.id
            LEFT JOIN projects tp ON t.project_id = tp.id
            ORDER BY a.timestamp DESC, a.id DESC
            LIMIT ?1
            "#,
        )?;

        let rows = stmt
            .query_map([limit as i64], |row| {
                Ok(ActivityRow {
                    id: row.get(0)?,
                    action_type: row.get(1)?,
                    object_type: row.get(2)?,
                    object_id: row.get(3)?,
                    timestamp: row.get(4)?,
                    user_id: row.get(5)?,
                    project_name: row.get(6)?,
                    project_description: row.get(7)?,
                    project_status: row.get(8)?,
                    task_title: row.get(9)?,
                    task_description: row.get(10)?,
                    task_status: row.get(11)?,
                    task_priority: row.get(12)?,
                    task_project_name: row.get(13)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(rows.into_iter().filter_map(ActivityRow::into_entry).collect())
    }

    /// Truncates the log and returns how many entries were removed.
    pub fn clear_activity(&mut self) -> Result<u64> {
        let tx = self.conn.transaction()?;
        let count: i64 = tx.query_row("SELECT COUNT(*) FROM activity_log", [], |row| row.get(0))?;
        tx.execute("DELETE FROM activity_log", [])?;
        tx.commit()?;
        Ok(count.max(0) as u64)
    }
}

struct ActivityRow {
    id: i64,
    action_type: String,
    object_type: String,
    object_id: i64,
    timestamp: String,
    user_id: i64,
    project_name: Option<String>,
    project_description: Option<String>,
    project_status: Option<String>,
    task_title: Option<String>,
    task_description: Option<String>,
    task_status: Option<String>,
    task_priority: Option<i64>,
    task_project_name: Option<String>,
}

impl ActivityRow {
    fn into_entry(self) -> Option<ActivityEntry> {
        let (Ok(action_type), Ok(object_type), Some(timestamp)) = (
            self.action_type.parse::<ActionType>(),
            self.object_type.parse::<ObjectType>(),
            parse_timestamp(&self.timestamp),
        ) else {
            warn!(id = self.id, "skipping unreadable activity row");
            return None;
        };

        let mut entry = ActivityEntry {
            id: self.id,
            action_type,
            object_type,
            object_id: self.object_id,
            timestamp,
            user_id: Some(self.user_id),
            description: None,
            status: None,
            priority: None,
            project_name: None,
            user_name: None,
        };

        match object_type {
            ObjectType::Project => {
                entry.description = non_empty(self.project_description);
                entry.status = self.project_status;
                entry.project_name = self.project_name;
            }
            ObjectType::Task => {
                entry.description = non_empty(self.task_description).or(self.task_title);
                entry.status = self.task_status;
                entry.priority = self.task_priority;
                entry.project_name = self.task_project_name;
            }
            ObjectType::Attachment | ObjectType::Chat | ObjectType::System => {}
        }

        Some(entry)
    }
}

fn project_from_row(row: &Row<'_>) -> rusqlite::Result<Project> {
    Ok(Project {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        start_date: row.get::<_, Option<String>>(3)?.as_deref().and_then(parse_calendar_date),
        end_date: row.get::<_, Option<String>>(4)?.as_deref().and_then(parse_calendar_date),
        status: row.get(5)?,
        extra: BTreeMap::new(),
    })
}

fn task_from_row(row: &Row<'_>) -> rusqlite::Result<Task> {
    Ok(Task {
        id: row.get(0)?,
        project_id: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        assigned_to: row.get(4)?,
        status: TaskStatus::parse_lenient(&row.get::<_, String>(5)?),
        priority: row.get(6)?,
        due_date: row.get::<_, Option<String>>(7)?.as_deref().and_then(parse_calendar_date),
        parent_task_id: row.get(8)?,
        depends_on_task_id: row.get(9)?,
        extra: BTreeMap::new(),
    })
}

fn non_empty(s: Option<String>) -> Option<String> {
    s.filter(|s| !s.trim().is_empty())
}

/// Fixed-width UTC timestamps so that text ordering matches time ordering.
fn now_stamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use tempfile::tempdir;

    fn setup_test_db() -> (Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let db = Database::open(&db_path).unwrap();
        (db, dir)
    }

    fn new_project(db: &Database, name: &str) -> Project {
        db.create_project(&NewProject {
            name: name.to_string(),
            ..Default::default()
        })
        .unwrap()
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    // ==================== Unit Tests ====================

    #[test]
    fn test_create_and_get_project() {
        let (db, _dir) = setup_test_db();
        let project = new_project(&db, "Launch");
        assert_eq!(project.name, "Launch");
        assert_eq!(project.status, "active");
        assert_eq!(db.get_project(project.id).unwrap(), Some(project));
    }

    #[test]
    fn test_create_project_empty_name_rejected() {
        let (db, _dir) = setup_test_db();
        let result = db.create_project(&NewProject::default());
        assert!(matches!(result, Err(StoreError::InvalidInput(_))));
    }

    #[test]
    fn test_create_task_requires_project() {
        let (db, _dir) = setup_test_db();
        let result = db.create_task(&NewTask::new(99, "Orphan"));
        assert!(matches!(
            result,
            Err(StoreError::NotFound { entity: "project", id: 99 })
        ));
    }

    #[test]
    fn test_create_task_invalid_priority() {
        let (db, _dir) = setup_test_db();
        let project = new_project(&db, "Launch");
        let mut task = NewTask::new(project.id, "Too urgent");
        task.priority = 0;
        assert!(matches!(db.create_task(&task), Err(StoreError::InvalidInput(_))));
    }

    #[test]
    fn test_create_task_with_relations() {
        let (db, _dir) = setup_test_db();
        let project = new_project(&db, "Launch");
        let blocker = db.create_task(&NewTask::new(project.id, "Blocker")).unwrap();
        let parent = db.create_task(&NewTask::new(project.id, "Parent")).unwrap();

        let mut task = NewTask::new(project.id, "Both");
        task.parent_task_id = Some(parent.id);
        task.depends_on_task_id = Some(blocker.id);
        let task = db.create_task(&task).unwrap();

        assert_eq!(task.parent_task_id, Some(parent.id));
        assert_eq!(task.depends_on_task_id, Some(blocker.id));
        assert_eq!(task.status, TaskStatus::Todo);
    }

    #[test]
    fn test_create_task_missing_dependency() {
        let (db, _dir) = setup_test_db();
        let project = new_project(&db, "Launch");
        let mut task = NewTask::new(project.id, "Dangling");
        task.depends_on_task_id = Some(77);
        assert!(matches!(
            db.create_task(&task),
            Err(StoreError::NotFound { entity: "task", id: 77 })
        ));
    }

    #[test]
    fn test_create_subtask_inherits_project() {
        let (db, _dir) = setup_test_db();
        let project = new_project(&db, "Launch");
        let other = new_project(&db, "Other");
        let parent = db.create_task(&NewTask::new(project.id, "Parent")).unwrap();

        let child = db
            .create_subtask(parent.id, &NewTask::new(other.id, "Child"))
            .unwrap();
        assert_eq!(child.project_id, project.id);
        assert_eq!(child.parent_task_id, Some(parent.id));
        assert_eq!(db.get_subtasks(parent.id).unwrap(), vec![child]);
    }

    #[test]
    fn test_update_task_full_replace() {
        let (db, _dir) = setup_test_db();
        let project = new_project(&db, "Launch");
        let mut task = db.create_task(&NewTask::new(project.id, "Draft")).unwrap();

        task.title = "Final".to_string();
        task.status = TaskStatus::InProgress;
        task.due_date = Some(date("2025-12-01"));
        assert!(db.update_task(&task).unwrap());

        assert_eq!(db.get_task(task.id).unwrap(), Some(task));
    }

    #[test]
    fn test_update_task_overdue_not_persisted() {
        let (db, _dir) = setup_test_db();
        let project = new_project(&db, "Launch");
        let mut task = db.create_task(&NewTask::new(project.id, "Late")).unwrap();
        task.status = TaskStatus::InProgress;
        db.update_task(&task).unwrap();

        task.status = TaskStatus::Overdue;
        db.update_task(&task).unwrap();

        let stored = db.get_task(task.id).unwrap().unwrap();
        assert_eq!(stored.status, TaskStatus::InProgress);
    }

    #[test]
    fn test_update_nonexistent_task() {
        let (db, _dir) = setup_test_db();
        let project = new_project(&db, "Launch");
        let mut task = db.create_task(&NewTask::new(project.id, "Temp")).unwrap();
        task.id = 9999;
        assert!(!db.update_task(&task).unwrap());
    }

    #[test]
    fn test_delete_project_cascades_tasks() {
        let (db, _dir) = setup_test_db();
        let project = new_project(&db, "Launch");
        let task = db.create_task(&NewTask::new(project.id, "Gone")).unwrap();

        assert!(db.delete_project(project.id).unwrap());
        assert!(db.get_task(task.id).unwrap().is_none());
    }

    #[test]
    fn test_delete_blocker_clears_dependency() {
        let (db, _dir) = setup_test_db();
        let project = new_project(&db, "Launch");
        let blocker = db.create_task(&NewTask::new(project.id, "Blocker")).unwrap();
        let mut blocked = NewTask::new(project.id, "Blocked");
        blocked.depends_on_task_id = Some(blocker.id);
        let blocked = db.create_task(&blocked).unwrap();

        db.delete_task(blocker.id).unwrap();
        let blocked = db.get_task(blocked.id).unwrap().unwrap();
        assert_eq!(blocked.depends_on_task_id, None);
    }

    #[test]
    fn test_mutations_are_logged_newest_first() {
        let (db, _dir) = setup_test_db();
        let project = new_project(&db, "Launch");
        let mut task = db.create_task(&NewTask::new(project.id, "Write copy")).unwrap();
        task.priority = 1;
        db.update_task(&task).unwrap();

        let log = db.list_activity(ACTIVITY_WINDOW).unwrap();
        assert_eq!(log.len(), 3);
        assert_eq!(log[0].action_type, ActionType::Updated);
        assert_eq!(log[0].object_type, ObjectType::Task);
        assert_eq!(log[0].project_name.as_deref(), Some("Launch"));
        assert_eq!(log[0].priority, Some(1));
        assert_eq!(log[0].description.as_deref(), Some("Write copy"));
        assert_eq!(log[2].object_type, ObjectType::Project);
    }

    #[test]
    fn test_list_activity_respects_limit() {
        let (db, _dir) = setup_test_db();
        for i in 0..5 {
            new_project(&db, &format!("P{}", i));
        }
        assert_eq!(db.list_activity(3).unwrap().len(), 3);
    }

    #[test]
    fn test_clear_activity_returns_count() {
        let (mut db, _dir) = setup_test_db();
        new_project(&db, "A");
        new_project(&db, "B");

        assert_eq!(db.clear_activity().unwrap(), 2);
        assert!(db.list_activity(ACTIVITY_WINDOW).unwrap().is_empty());
        assert_eq!(db.clear_activity().unwrap(), 0);
    }

    #[test]
    fn test_calendar_tasks_marks_overdue() {
        let (db, _dir) = setup_test_db();
        let project = new_project(&db, "Launch");
        let mut late = NewTask::new(project.id, "Late");
        late.due_date = Some(date("2025-10-01"));
        let late = db.create_task(&late).unwrap();
        let mut soon = NewTask::new(project.id, "Soon");
        soon.due_date = Some(date("2025-11-20"));
        db.create_task(&soon).unwrap();
        db.create_task(&NewTask::new(project.id, "Undated")).unwrap();

        let today = date("2025-11-01");
        let all = db.calendar_tasks(None, today).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id, late.id);
        assert_eq!(all[0].status, TaskStatus::Overdue);
        assert_eq!(all[1].status, TaskStatus::Todo);

        let ranged = db
            .calendar_tasks(Some((date("2025-11-01"), date("2025-11-30"))), today)
            .unwrap();
        assert_eq!(ranged.len(), 1);
        assert_eq!(ranged[0].title, "Soon");
    }

    #[test]
    fn test_update_sql_injection() {
        let (db, _dir) = setup_test_db();
        let project = new_project(&db, "Launch");
        let mut task = db.create_task(&NewTask::new(project.id, "Original")).unwrap();

        let malicious = "'; DROP TABLE tasks; --";
        task.title = malicious.to_string();
        db.update_task(&task).unwrap();

        assert_eq!(db.get_task(task.id).unwrap().unwrap().title, malicious);
        assert_eq!(db.list_tasks().unwrap().len(), 1);
    }

    // ==================== Property-Based Tests ====================

    proptest! {
        #[test]
        fn prop_task_title_roundtrip(title in "[\\p{L}\\p{N} ]{1,60}") {
            prop_assume!(!title.trim().is_empty());
            let (db, _dir) = setup_test_db();
            let project = new_project(&db, "P");
            let task = db.create_task(&NewTask::new(project.id, title.clone())).unwrap();
            prop_assert_eq!(db.get_task(task.id).unwrap().unwrap().title, title);
        }

        #[test]
        fn prop_every_create_is_logged(count in 1usize..6) {
            let (db, _dir) = setup_test_db();
            let project = new_project(&db, "P");
            for i in 0..count {
                db.create_task(&NewTask::new(project.id, format!("Task {}", i))).unwrap();
            }
            prop_assert_eq!(db.list_activity(ACTIVITY_WINDOW).unwrap().len(), count + 1);
        }
    }
}
