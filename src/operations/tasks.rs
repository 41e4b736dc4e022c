//! Core task operations shared between the CLI and anything else that
//! wants to drive the task list.
//!
//! `TaskManager` keeps the whole list in memory and writes it back through
//! its `TaskStorage` after every mutation. Reads never touch storage.
//!
//! ```text
//! cli::task ──> operations::tasks (this module) ──> storage::{tasks, sqlite}
//! ```

use std::str::FromStr;

use chrono::{NaiveDate, Utc};

use crate::error::{Result, TrellisError};
use crate::storage::config::TasksConfig;
use crate::storage::tasks::{Task, TaskPriority, TaskStatus, TaskStorage};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Length limits applied on every write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskLimits {
    pub max_title_length: usize,
    pub max_description_length: usize,
}

impl Default for TaskLimits {
    fn default() -> Self {
        Self {
            max_title_length: 200,
            max_description_length: 1000,
        }
    }
}

impl From<&TasksConfig> for TaskLimits {
    fn from(config: &TasksConfig) -> Self {
        Self {
            max_title_length: config.max_title_length,
            max_description_length: config.max_description_length,
        }
    }
}

/// Input for `TaskManager::add_task`
#[derive(Debug, Clone, Default)]
pub struct NewTask {
    pub title: String,
    pub description: String,
    pub priority: TaskPriority,
    pub status: TaskStatus,
    pub due_date: Option<NaiveDate>,
}

impl NewTask {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn priority(mut self, priority: TaskPriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn status(mut self, status: TaskStatus) -> Self {
        self.status = status;
        self
    }

    pub fn due_date(mut self, due_date: NaiveDate) -> Self {
        self.due_date = Some(due_date);
        self
    }
}

/// Partial update. `due_date: Some(None)` clears the due date.
#[derive(Debug, Clone, Default)]
pub struct TaskUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub due_date: Option<Option<NaiveDate>>,
}

/// Sort order for `list_tasks`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortBy {
    /// Newest first
    #[default]
    CreatedAt,
    /// Most recently updated first
    UpdatedAt,
    /// High → low
    Priority,
    /// Earliest first, undated last
    DueDate,
}

impl FromStr for SortBy {
    type Err = TrellisError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "created_at" | "created" => Ok(SortBy::CreatedAt),
            "updated_at" | "updated" => Ok(SortBy::UpdatedAt),
            "priority" => Ok(SortBy::Priority),
            "due_date" | "due" => Ok(SortBy::DueDate),
            _ => Err(TrellisError::invalid_data(format!(
                "'{}' is not a valid sort field (created_at, updated_at, priority, due_date)",
                s
            ))),
        }
    }
}

/// Filter + sort options for `list_tasks`
#[derive(Debug, Clone, Copy, Default)]
pub struct TaskFilter {
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub sort_by: SortBy,
}

/// Aggregate counts over the whole task list
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct TaskStatistics {
    pub total: usize,
    pub completed: usize,
    pub pending: usize,
    pub in_progress: usize,
    pub high_priority: usize,
    pub overdue: usize,
    /// Percent, 0.0 when there are no tasks
    pub completion_rate: f64,
}

/// Task CRUD over a storage backend
pub struct TaskManager<S: TaskStorage> {
    storage: S,
    tasks: Vec<Task>,
    limits: TaskLimits,
}

impl<S: TaskStorage> TaskManager<S> {
    /// Load all tasks from `storage`
    pub fn new(storage: S) -> Result<Self> {
        Self::with_limits(storage, TaskLimits::default())
    }

    pub fn with_limits(storage: S, limits: TaskLimits) -> Result<Self> {
        let tasks = storage.load_tasks()?;
        tracing::debug!(count = tasks.len(), "loaded tasks");
        Ok(Self {
            storage,
            tasks,
            limits,
        })
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn add_task(&mut self, input: NewTask) -> Result<Task> {
        let title = input.title.trim().to_string();
        self.validate_title(&title)?;
        self.validate_description(&input.description)?;

        let task = Task::new(title)
            .with_description(input.description)
            .with_priority(input.priority)
            .with_status(input.status)
            .with_due_date(input.due_date);

        self.tasks.push(task.clone());
        if let Err(e) = self.storage.save_tasks(&self.tasks) {
            self.tasks.pop();
            return Err(e);
        }
        tracing::info!(id = %task.id, "task added");
        Ok(task)
    }

    pub fn get_task(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    /// Exact id, else a unique id prefix
    pub fn resolve_id(&self, id_or_prefix: &str) -> Result<String> {
        let needle = id_or_prefix.trim();
        if needle.is_empty() {
            return Err(TrellisError::invalid_data("task id is empty"));
        }
        if let Some(task) = self.get_task(needle) {
            return Ok(task.id.clone());
        }

        let mut matches = self.tasks.iter().filter(|t| t.id.starts_with(needle));
        match (matches.next(), matches.next()) {
            (Some(task), None) => Ok(task.id.clone()),
            (Some(_), Some(_)) => Err(TrellisError::invalid_data(format!(
                "task id '{}' is ambiguous",
                needle
            ))),
            (None, _) => Err(TrellisError::not_found(format!("task {}", needle))),
        }
    }

    /// Returns `Ok(None)` when no task has `id`
    pub fn update_task(&mut self, id: &str, update: TaskUpdate) -> Result<Option<Task>> {
        let limits = self.limits;
        let Some(pos) = self.tasks.iter().position(|t| t.id == id) else {
            return Ok(None);
        };
        let original = self.tasks[pos].clone();
        let task = &mut self.tasks[pos];

        // 先校验全部字段，避免部分更新
        let title = match update.title {
            Some(t) => {
                let t = t.trim().to_string();
                check_title(&t, limits)?;
                Some(t)
            }
            None => None,
        };
        if let Some(d) = &update.description {
            check_description(d, limits)?;
        }

        if let Some(t) = title {
            task.title = t;
        }
        if let Some(d) = update.description {
            task.description = d;
        }
        if let Some(s) = update.status {
            task.status = s;
        }
        if let Some(p) = update.priority {
            task.priority = p;
        }
        if let Some(d) = update.due_date {
            task.due_date = d;
        }
        task.updated_at = Utc::now();

        let updated = task.clone();
        if let Err(e) = self.storage.save_tasks(&self.tasks) {
            self.tasks[pos] = original;
            return Err(e);
        }
        tracing::info!(id = %updated.id, "task updated");
        Ok(Some(updated))
    }

    pub fn delete_task(&mut self, id: &str) -> Result<bool> {
        let Some(pos) = self.tasks.iter().position(|t| t.id == id) else {
            return Ok(false);
        };
        let removed = self.tasks.remove(pos);
        if let Err(e) = self.storage.save_tasks(&self.tasks) {
            self.tasks.insert(pos, removed);
            return Err(e);
        }
        tracing::info!(id, "task deleted");
        Ok(true)
    }

    /// 删除全部任务，返回删除数量
    pub fn clear_all(&mut self) -> Result<usize> {
        let count = self.tasks.len();
        self.storage.clear()?;
        self.tasks.clear();
        tracing::info!(count, "tasks cleared");
        Ok(count)
    }

    pub fn list_tasks(&self, filter: &TaskFilter) -> Vec<Task> {
        let mut tasks: Vec<Task> = self
            .tasks
            .iter()
            .filter(|t| filter.status.map_or(true, |s| t.status == s))
            .filter(|t| filter.priority.map_or(true, |p| t.priority == p))
            .cloned()
            .collect();

        match filter.sort_by {
            SortBy::CreatedAt => tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
            SortBy::UpdatedAt => tasks.sort_by(|a, b| b.updated_at.cmp(&a.updated_at)),
            SortBy::Priority => tasks.sort_by(|a, b| b.priority.cmp(&a.priority)),
            SortBy::DueDate => tasks.sort_by_key(|t| t.due_date.unwrap_or(NaiveDate::MAX)),
        }
        tasks
    }

    pub fn statistics(&self) -> TaskStatistics {
        let total = self.tasks.len();
        let completed = self.count_where(|t| t.status == TaskStatus::Completed);
        TaskStatistics {
            total,
            completed,
            pending: self.count_where(|t| t.status == TaskStatus::Pending),
            in_progress: self.count_where(|t| t.status == TaskStatus::InProgress),
            high_priority: self.count_where(|t| t.priority == TaskPriority::High),
            overdue: self.count_where(Task::is_overdue),
            completion_rate: if total > 0 {
                completed as f64 / total as f64 * 100.0
            } else {
                0.0
            },
        }
    }

    fn count_where(&self, pred: impl Fn(&Task) -> bool) -> usize {
        self.tasks.iter().filter(|t| pred(t)).count()
    }

    fn validate_title(&self, title: &str) -> Result<()> {
        check_title(title, self.limits)
    }

    fn validate_description(&self, description: &str) -> Result<()> {
        check_description(description, self.limits)
    }
}

fn check_title(title: &str, limits: TaskLimits) -> Result<()> {
    if title.is_empty() {
        return Err(TrellisError::invalid_data("title must not be empty"));
    }
    let len = title.chars().count();
    if len > limits.max_title_length {
        return Err(TrellisError::invalid_data(format!(
            "title is {} characters, maximum is {}",
            len, limits.max_title_length
        )));
    }
    Ok(())
}

fn check_description(description: &str, limits: TaskLimits) -> Result<()> {
    let len = description.chars().count();
    if len > limits.max_description_length {
        return Err(TrellisError::invalid_data(format!(
            "description is {} characters, maximum is {}",
            len, limits.max_description_length
        )));
    }
    Ok(())
}

// ============================================================================
// Helpers
// ============================================================================

/// Parse a `YYYY-MM-DD` date
pub fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), DATE_FORMAT).map_err(|_| {
        TrellisError::invalid_data(format!(
            "'{}' is not a valid date, expected YYYY-MM-DD",
            s
        ))
    })
}

/// Whether `s` is a valid `YYYY-MM-DD` date
pub fn validate_date(s: &str) -> bool {
    parse_date(s).is_ok()
}

/// "2026-01-05" → "January 05, 2026"; `None` → "N/A"; invalid input unchanged
pub fn format_date(s: Option<&str>) -> String {
    match s {
        None | Some("") => "N/A".to_string(),
        Some(raw) => match NaiveDate::parse_from_str(raw, DATE_FORMAT) {
            Ok(date) => date.format("%B %d, %Y").to_string(),
            Err(_) => raw.to_string(),
        },
    }
}

/// Truncate to at most `max_length` chars, ending in "..." when cut
pub fn truncate_text(text: &str, max_length: usize) -> String {
    if text.chars().count() <= max_length {
        return text.to_string();
    }
    let keep = max_length.saturating_sub(3);
    let mut out: String = text.chars().take(keep).collect();
    out.push_str("...");
    out
}

/// Case-insensitive priority parse
pub fn parse_priority(s: &str) -> Option<TaskPriority> {
    s.parse().ok()
}
