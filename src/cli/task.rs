//! 任务管理 REPL
//!
//! `trellis task` runs the loop on stdin/stdout; `trellis task <cmd> ...`
//! runs exactly one command. The loop itself works over any reader/writer
//! pair so it can be driven from tests.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use chrono::Local;

use crate::error::{Result, TrellisError};
use crate::operations::tasks::{
    format_date, parse_date, parse_priority, truncate_text, validate_date, NewTask, TaskFilter,
    TaskLimits, TaskManager, TaskUpdate,
};
use crate::storage::config::{StorageBackend, TasksConfig};
use crate::storage::sqlite::SqliteStorage;
use crate::storage::tasks::{FileStorage, Task, TaskStorage};

const RULE_WIDTH: usize = 60;
const DESCRIPTION_PREVIEW: usize = 50;

const ADD_USAGE: &str = "Usage: add <title> [description] [priority] [due_date]";
const UPDATE_USAGE: &str = "Usage: update <id> [field=value ...]";
const DELETE_USAGE: &str = "Usage: delete <id>";
const SHOW_USAGE: &str = "Usage: show <id>";

const HELP: &str = "
Available Commands:
  add <title> [description] [priority] [due_date]
     - Add a new task
     - Priority: low, medium, high
     - Due date format: YYYY-MM-DD

  list [status=<status>] [priority=<priority>] [sort=<field>]
     - List tasks with optional filters
     - Status: pending, in_progress, completed, cancelled
     - Sort: created_at, updated_at, priority, due_date

  update <id> [field=value ...]
     - Update task fields (title, description, status, priority, due_date)
     - due_date= with no value clears the due date

  delete <id>
     - Delete a task

  show <id>
     - Show detailed task information

  stats
     - Show task statistics

  clear
     - Delete every task

  exit
     - Leave the task manager
";

/// Entry point for `trellis task`
pub fn execute(
    config: &TasksConfig,
    file: Option<PathBuf>,
    backend: Option<StorageBackend>,
    args: Vec<String>,
) -> Result<()> {
    let backend = backend.unwrap_or(config.storage);
    let path = file.unwrap_or_else(|| config.storage_path(backend));
    let limits = TaskLimits::from(config);
    tracing::debug!(path = %path.display(), ?backend, "opening task storage");

    match backend {
        StorageBackend::Json => run_with(FileStorage::open(path)?, limits, args),
        StorageBackend::Sqlite => run_with(SqliteStorage::open(path)?, limits, args),
    }
}

fn run_with<S: TaskStorage>(storage: S, limits: TaskLimits, args: Vec<String>) -> Result<()> {
    let mut cli = TaskCli::new(TaskManager::with_limits(storage, limits)?);
    let stdout = io::stdout();
    let mut out = stdout.lock();
    if args.is_empty() {
        cli.run(io::stdin().lock(), &mut out)?;
    } else {
        // one-shot: a failed command is the process error
        cli.run_command(&args, &mut out)??;
    }
    Ok(())
}

/// Interactive task shell
pub struct TaskCli<S: TaskStorage> {
    manager: TaskManager<S>,
}

impl<S: TaskStorage> TaskCli<S> {
    pub fn new(manager: TaskManager<S>) -> Self {
        Self { manager }
    }

    #[cfg(test)]
    pub fn manager(&self) -> &TaskManager<S> {
        &self.manager
    }

    /// Read-eval-print until `exit` or end of input
    pub fn run<R: BufRead, W: Write>(&mut self, input: R, out: &mut W) -> io::Result<()> {
        self.print_banner(out)?;

        let mut lines = input.lines();
        loop {
            write!(out, "task> ")?;
            out.flush()?;

            let Some(line) = lines.next().transpose()? else {
                writeln!(out)?;
                writeln!(out, "Goodbye!")?;
                return Ok(());
            };
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if matches!(line.to_lowercase().as_str(), "exit" | "quit" | "q") {
                writeln!(out, "Goodbye!")?;
                return Ok(());
            }

            match shell_words::split(line) {
                Ok(args) => self.handle_command(&args, out)?,
                Err(e) => writeln!(out, "Error: {}", e)?,
            }
        }
    }

    fn print_banner<W: Write>(&self, out: &mut W) -> io::Result<()> {
        writeln!(out, "{}", "=".repeat(RULE_WIDTH))?;
        writeln!(out, "Welcome to Task Manager CLI!")?;
        writeln!(out, "{}", "=".repeat(RULE_WIDTH))?;
        writeln!(
            out,
            "Tasks stored in: {}",
            self.manager.storage().location().display()
        )?;
        writeln!(out)?;
        writeln!(out, "Available commands:")?;
        writeln!(out, "  add <title> [description] [priority] [due_date]")?;
        writeln!(out, "  list [status] [priority] [sort_by]")?;
        writeln!(out, "  update <id> [field=value ...]")?;
        writeln!(out, "  delete <id>")?;
        writeln!(out, "  show <id>")?;
        writeln!(out, "  stats")?;
        writeln!(out, "  clear")?;
        writeln!(out, "  help")?;
        writeln!(out, "  exit")?;
        writeln!(out)
    }

    /// Run one tokenized command; command errors are printed, not returned
    pub fn handle_command<W: Write>(&mut self, args: &[String], out: &mut W) -> io::Result<()> {
        if let Err(e) = self.run_command(args, out)? {
            writeln!(out, "Error: {}", e)?;
        }
        Ok(())
    }

    /// Run one tokenized command.
    ///
    /// The outer error is a failed write to `out`; the inner one is the
    /// command's own failure (bad input, storage errors).
    pub fn run_command<W: Write>(
        &mut self,
        args: &[String],
        out: &mut W,
    ) -> io::Result<Result<()>> {
        let Some((command, rest)) = args.split_first() else {
            return Ok(Ok(()));
        };

        // 处理函数写入内存缓冲，返回的 Io 错误只可能来自存储
        let mut buf = Vec::new();
        let result = match command.to_lowercase().as_str() {
            "add" => self.handle_add(rest, &mut buf),
            "list" => self.handle_list(rest, &mut buf),
            "update" => self.handle_update(rest, &mut buf),
            "delete" => self.handle_delete(rest, &mut buf),
            "show" => self.handle_show(rest, &mut buf),
            "stats" => self.handle_stats(&mut buf),
            "clear" => self.handle_clear(&mut buf),
            "help" => write!(buf, "{}", HELP).map_err(TrellisError::from),
            other => writeln!(
                buf,
                "Unknown command: {}. Type 'help' for available commands.",
                other
            )
            .map_err(TrellisError::from),
        };

        out.write_all(&buf)?;
        Ok(result)
    }

    fn handle_add<W: Write>(&mut self, args: &[String], out: &mut W) -> Result<()> {
        let Some(title) = args.first() else {
            writeln!(out, "{}", ADD_USAGE)?;
            return Ok(());
        };

        let mut input = NewTask::new(title.as_str());
        if let Some(description) = args.get(1) {
            input = input.description(description.as_str());
        }
        if let Some(raw) = args.get(2) {
            let priority = parse_priority(raw).ok_or_else(|| {
                TrellisError::invalid_data(format!(
                    "'{}' is not a valid priority (low, medium, high)",
                    raw
                ))
            })?;
            input = input.priority(priority);
        }
        if let Some(raw) = args.get(3) {
            if !validate_date(raw) {
                return Err(TrellisError::invalid_data(format!(
                    "'{}' is not a valid due date, expected YYYY-MM-DD",
                    raw
                )));
            }
            input = input.due_date(parse_date(raw)?);
        }

        let task = self.manager.add_task(input)?;
        writeln!(out, "✅ Task added: {}", task)?;
        Ok(())
    }

    fn handle_list<W: Write>(&mut self, args: &[String], out: &mut W) -> Result<()> {
        let mut filter = TaskFilter::default();
        for arg in args {
            match arg.split_once('=') {
                Some(("status", value)) => filter.status = Some(value.parse()?),
                Some(("priority", value)) => filter.priority = Some(value.parse()?),
                Some(("sort", value)) => filter.sort_by = value.parse()?,
                _ => {
                    return Err(TrellisError::invalid_data(format!(
                        "unknown list option '{}' (use status=, priority=, sort=)",
                        arg
                    )))
                }
            }
        }

        let tasks = self.manager.list_tasks(&filter);
        if tasks.is_empty() {
            writeln!(out, "No tasks found.")?;
            return Ok(());
        }

        writeln!(out)?;
        writeln!(out, "📋 Tasks ({}):", tasks.len())?;
        writeln!(out, "{}", "-".repeat(RULE_WIDTH))?;
        for task in &tasks {
            writeln!(out, "  {}", task)?;
            if !task.description.is_empty() {
                writeln!(
                    out,
                    "    └─ {}",
                    truncate_text(&task.description, DESCRIPTION_PREVIEW)
                )?;
            }
        }
        writeln!(out)?;
        Ok(())
    }

    fn handle_update<W: Write>(&mut self, args: &[String], out: &mut W) -> Result<()> {
        let Some((raw_id, fields)) = args.split_first() else {
            writeln!(out, "{}", UPDATE_USAGE)?;
            return Ok(());
        };

        let mut update = TaskUpdate::default();
        for field in fields {
            let Some((key, value)) = field.split_once('=') else {
                return Err(TrellisError::invalid_data(format!(
                    "expected field=value, got '{}'",
                    field
                )));
            };
            match key {
                "title" => update.title = Some(value.to_string()),
                "description" => update.description = Some(value.to_string()),
                "status" => update.status = Some(value.parse()?),
                "priority" => update.priority = Some(value.parse()?),
                "due_date" if value.is_empty() => update.due_date = Some(None),
                "due_date" => update.due_date = Some(Some(parse_date(value)?)),
                other => {
                    return Err(TrellisError::invalid_data(format!(
                        "unknown field '{}' (title, description, status, priority, due_date)",
                        other
                    )))
                }
            }
        }

        let Some(id) = self.lookup(raw_id, out)? else {
            return Ok(());
        };
        match self.manager.update_task(&id, update)? {
            Some(task) => writeln!(out, "✅ Task updated: {}", task)?,
            None => writeln!(out, "❌ Task not found: {}", raw_id)?,
        }
        Ok(())
    }

    fn handle_delete<W: Write>(&mut self, args: &[String], out: &mut W) -> Result<()> {
        let Some(raw_id) = args.first() else {
            writeln!(out, "{}", DELETE_USAGE)?;
            return Ok(());
        };
        let Some(id) = self.lookup(raw_id, out)? else {
            return Ok(());
        };
        if self.manager.delete_task(&id)? {
            writeln!(out, "✅ Task deleted: {}", id)?;
        } else {
            writeln!(out, "❌ Task not found: {}", raw_id)?;
        }
        Ok(())
    }

    fn handle_show<W: Write>(&mut self, args: &[String], out: &mut W) -> Result<()> {
        let Some(raw_id) = args.first() else {
            writeln!(out, "{}", SHOW_USAGE)?;
            return Ok(());
        };
        let Some(id) = self.lookup(raw_id, out)? else {
            return Ok(());
        };
        let Some(task) = self.manager.get_task(&id) else {
            writeln!(out, "❌ Task not found: {}", raw_id)?;
            return Ok(());
        };
        write_details(task, out)?;
        Ok(())
    }

    fn handle_stats<W: Write>(&mut self, out: &mut W) -> Result<()> {
        let stats = self.manager.statistics();
        writeln!(out)?;
        writeln!(out, "📊 Task Statistics:")?;
        writeln!(out, "  Total Tasks: {}", stats.total)?;
        writeln!(out, "  ✅ Completed: {}", stats.completed)?;
        writeln!(out, "  ⏳ Pending: {}", stats.pending)?;
        writeln!(out, "  🔄 In Progress: {}", stats.in_progress)?;
        writeln!(out, "  ⬆️  High Priority: {}", stats.high_priority)?;
        writeln!(out, "  ⚠️  Overdue: {}", stats.overdue)?;
        writeln!(out, "  📈 Completion Rate: {:.1}%", stats.completion_rate)?;
        writeln!(out)?;
        Ok(())
    }

    fn handle_clear<W: Write>(&mut self, out: &mut W) -> Result<()> {
        let count = self.manager.clear_all()?;
        writeln!(out, "✅ Cleared {} task(s)", count)?;
        Ok(())
    }

    /// Resolve an id prefix; a miss prints "not found" and yields `None`
    fn lookup<W: Write>(&self, raw_id: &str, out: &mut W) -> Result<Option<String>> {
        match self.manager.resolve_id(raw_id) {
            Ok(id) => Ok(Some(id)),
            Err(TrellisError::NotFound(_)) => {
                writeln!(out, "❌ Task not found: {}", raw_id)?;
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}

fn write_details<W: Write>(task: &Task, out: &mut W) -> io::Result<()> {
    let description = if task.description.is_empty() {
        "(none)"
    } else {
        task.description.as_str()
    };
    let due = task.due_date.map(|d| d.format("%Y-%m-%d").to_string());
    let timestamp = "%Y-%m-%d %H:%M:%S";

    writeln!(out)?;
    writeln!(out, "📝 Task Details:")?;
    writeln!(out, "  ID: {}", task.id)?;
    writeln!(out, "  Title: {}", task.title)?;
    writeln!(out, "  Description: {}", description)?;
    writeln!(out, "  Status: {}", task.status)?;
    writeln!(out, "  Priority: {}", task.priority)?;
    writeln!(out, "  Due Date: {}", format_date(due.as_deref()))?;
    writeln!(
        out,
        "  Created: {}",
        task.created_at.with_timezone(&Local).format(timestamp)
    )?;
    writeln!(
        out,
        "  Updated: {}",
        task.updated_at.with_timezone(&Local).format(timestamp)
    )?;
    if task.is_overdue() {
        writeln!(out, "  ⚠️  OVERDUE")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::tasks::{TaskPriority, TaskStatus};
    use tempfile::TempDir;

    fn cli() -> (TempDir, TaskCli<FileStorage>) {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::open(dir.path().join("tasks.json")).unwrap();
        (dir, TaskCli::new(TaskManager::new(storage).unwrap()))
    }

    /// Feed a whole session through `run`, return everything printed
    fn session(cli: &mut TaskCli<FileStorage>, input: &str) -> String {
        let mut out = Vec::new();
        cli.run(input.as_bytes(), &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    fn command(cli: &mut TaskCli<FileStorage>, line: &str) -> String {
        let args = shell_words::split(line).unwrap();
        let mut out = Vec::new();
        cli.handle_command(&args, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_banner_and_exit() {
        let (_dir, mut cli) = cli();
        let out = session(&mut cli, "\n\nQUIT\nadd never\n");
        assert!(out.starts_with(&"=".repeat(60)));
        assert!(out.contains("Welcome to Task Manager CLI!"));
        assert!(out.contains("Tasks stored in: "));
        assert!(out.trim_end().ends_with("Goodbye!"));
        assert!(cli.manager().tasks().is_empty());
    }

    #[test]
    fn test_eof_says_goodbye() {
        let (_dir, mut cli) = cli();
        let out = session(&mut cli, "stats");
        assert!(out.contains("Total Tasks: 0"));
        assert!(out.trim_end().ends_with("Goodbye!"));
    }

    #[test]
    fn test_add_with_quoted_args() {
        let (_dir, mut cli) = cli();
        let out = command(
            &mut cli,
            r#"add "Buy milk" "two litres, semi-skimmed" high 2099-01-02"#,
        );
        assert!(out.starts_with("✅ Task added: ⏳ ["), "{}", out);
        assert!(out.contains("Buy milk ⬆️"));

        let task = &cli.manager().tasks()[0];
        assert_eq!(task.title, "Buy milk");
        assert_eq!(task.description, "two litres, semi-skimmed");
        assert_eq!(task.priority, TaskPriority::High);
        assert_eq!(task.due_date.unwrap().to_string(), "2099-01-02");
    }

    #[test]
    fn test_add_errors() {
        let (_dir, mut cli) = cli();
        assert_eq!(command(&mut cli, "add"), format!("{}\n", ADD_USAGE));
        assert!(command(&mut cli, "add x y urgent").starts_with("Error: Invalid data:"));
        assert!(command(&mut cli, "add x y low 01/02/2026").contains("not a valid due date"));
        assert!(command(&mut cli, "add '   '").contains("title must not be empty"));
        assert!(cli.manager().tasks().is_empty());
    }

    #[test]
    fn test_list_filters_and_preview() {
        let (_dir, mut cli) = cli();
        command(&mut cli, "add first");
        command(&mut cli, &format!("add second '{}' high", "d".repeat(80)));
        let id = cli.manager().tasks()[0].id.clone();
        command(&mut cli, &format!("update {} status=completed", id));

        let out = command(&mut cli, "list");
        assert!(out.contains("📋 Tasks (2):"));
        assert!(out.contains(&format!("    └─ {}...", "d".repeat(47))));

        let out = command(&mut cli, "list status=completed");
        assert!(out.contains("📋 Tasks (1):"));
        assert!(out.contains("first"));

        let out = command(&mut cli, "list priority=low");
        assert_eq!(out, "No tasks found.\n");

        assert!(command(&mut cli, "list sort=title").starts_with("Error:"));
        assert!(command(&mut cli, "list bogus").starts_with("Error:"));
    }

    #[test]
    fn test_update_by_prefix() {
        let (_dir, mut cli) = cli();
        command(&mut cli, "add report '' medium 2099-05-01");
        let task = cli.manager().tasks()[0].clone();

        let out = command(
            &mut cli,
            &format!("update {} title='Final report' priority=HIGH due_date=", task.short_id()),
        );
        assert!(out.starts_with("✅ Task updated:"), "{}", out);
        let updated = &cli.manager().tasks()[0];
        assert_eq!(updated.title, "Final report");
        assert_eq!(updated.priority, TaskPriority::High);
        assert_eq!(updated.due_date, None);

        let out = command(&mut cli, &format!("update {} owner=me", task.id));
        assert!(out.contains("unknown field 'owner'"));
        let out = command(&mut cli, "update nope status=completed");
        assert_eq!(out, "❌ Task not found: nope\n");
        assert_eq!(command(&mut cli, "update"), format!("{}\n", UPDATE_USAGE));
    }

    #[test]
    fn test_delete() {
        let (_dir, mut cli) = cli();
        command(&mut cli, "add doomed");
        let id = cli.manager().tasks()[0].id.clone();
        assert_eq!(
            command(&mut cli, &format!("delete {}", &id[..6])),
            format!("✅ Task deleted: {}\n", id)
        );
        assert_eq!(
            command(&mut cli, &format!("delete {}", id)),
            format!("❌ Task not found: {}\n", id)
        );
    }

    #[test]
    fn test_show() {
        let (_dir, mut cli) = cli();
        command(&mut cli, "add late 'was due' low 2000-01-01");
        let id = cli.manager().tasks()[0].id.clone();
        let out = command(&mut cli, &format!("show {}", id));
        assert!(out.contains("📝 Task Details:"));
        assert!(out.contains(&format!("  ID: {}", id)));
        assert!(out.contains("  Status: pending"));
        assert!(out.contains("  Priority: low"));
        assert!(out.contains("  Due Date: January 01, 2000"));
        assert!(out.contains("  ⚠️  OVERDUE"));

        command(&mut cli, "add plain");
        let plain = cli
            .manager()
            .tasks()
            .iter()
            .find(|t| t.title == "plain")
            .unwrap()
            .id
            .clone();
        let out = command(&mut cli, &format!("show {}", plain));
        assert!(out.contains("  Description: (none)"));
        assert!(out.contains("  Due Date: N/A"));
        assert!(!out.contains("OVERDUE"));
    }

    #[test]
    fn test_stats() {
        let (_dir, mut cli) = cli();
        command(&mut cli, "add a '' high");
        command(&mut cli, "add b");
        command(&mut cli, "add c");
        let id = cli.manager().tasks()[0].id.clone();
        command(&mut cli, &format!("update {} status=completed", id));

        let out = command(&mut cli, "stats");
        assert!(out.contains("  Total Tasks: 3"));
        assert!(out.contains("  ✅ Completed: 1"));
        assert!(out.contains("  ⏳ Pending: 2"));
        assert!(out.contains("  ⬆️  High Priority: 1"));
        assert!(out.contains("  📈 Completion Rate: 33.3%"));
        assert_eq!(
            cli.manager().tasks()[0].status,
            TaskStatus::Completed
        );
    }

    #[test]
    fn test_clear() {
        let (_dir, mut cli) = cli();
        command(&mut cli, "add one");
        command(&mut cli, "add two");
        let out = command(&mut cli, "clear");
        assert_eq!(out, "✅ Cleared 2 task(s)\n");
        assert!(command(&mut cli, "list").contains("No tasks found."));
    }

    #[test]
    fn test_unknown_command_and_help() {
        let (_dir, mut cli) = cli();
        assert_eq!(
            command(&mut cli, "Frobnicate now"),
            "Unknown command: frobnicate. Type 'help' for available commands.\n"
        );
        assert!(command(&mut cli, "HELP").contains("Available Commands:"));
    }

    #[test]
    fn test_unbalanced_quote_in_session() {
        let (_dir, mut cli) = cli();
        let out = session(&mut cli, "add \"oops\nexit\n");
        assert!(out.contains("Error:"));
        assert!(cli.manager().tasks().is_empty());
    }

    #[test]
    fn test_storage_error_keeps_session_going() {
        let (dir, mut cli) = cli();
        std::fs::create_dir(dir.path().join("tasks.json.tmp")).unwrap();

        let out = session(&mut cli, "add first\nlist\nexit\n");
        assert!(out.contains("Error: I/O error:"), "{}", out);
        assert!(out.contains("No tasks found."));
        assert!(out.trim_end().ends_with("Goodbye!"));
        assert!(cli.manager().tasks().is_empty());
    }

    #[test]
    fn test_run_command_returns_command_error() {
        let (_dir, mut cli) = cli();
        let mut out = Vec::new();
        let result = cli.run_command(&["add".to_string(), "   ".to_string()], &mut out);
        assert!(matches!(result, Ok(Err(TrellisError::InvalidData(_)))));
        assert!(out.is_empty());

        let result = cli.run_command(&["add".to_string(), "ok".to_string()], &mut out);
        assert!(matches!(result, Ok(Ok(()))));
        assert!(String::from_utf8(out).unwrap().starts_with("✅ Task added:"));
    }

    #[test]
    fn test_execute_one_shot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.json");
        let config = TasksConfig::default();

        let result = execute(
            &config,
            Some(path.clone()),
            None,
            vec!["add".to_string(), "   ".to_string()],
        );
        assert!(matches!(result, Err(TrellisError::InvalidData(_))));

        execute(
            &config,
            Some(path.clone()),
            Some(StorageBackend::Json),
            vec!["add".to_string(), "one shot".to_string()],
        )
        .unwrap();
        let storage = FileStorage::open(&path).unwrap();
        assert_eq!(storage.load_tasks().unwrap()[0].title, "one shot");
    }

    #[test]
    fn test_tasks_persist_between_sessions() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tasks.json");
        {
            let storage = FileStorage::open(&path).unwrap();
            let mut cli = TaskCli::new(TaskManager::new(storage).unwrap());
            session(&mut cli, "add keep\nexit\n");
        }
        let storage = FileStorage::open(&path).unwrap();
        let cli = TaskCli::new(TaskManager::new(storage).unwrap());
        assert_eq!(cli.manager().tasks()[0].title, "keep");
    }
}
