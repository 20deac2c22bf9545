//! Hierarchical task tracking with dotted ids.
//!
//! Tasks live in an arena; index 0 is the user's overall goal with id `""`.
//! A child may only be created under the current task, and only the current
//! task may be finished, so work descends and ascends strictly.

use std::fmt;
use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

const ROOT: usize = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    InProgress,
    Decompose,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Decompose => "decompose",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // `pad` so callers can align with width specifiers.
        f.pad(self.as_str())
    }
}

/// Terminal states accepted by `finish_task`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishStatus {
    Completed,
    Failed,
}

impl From<FinishStatus> for TaskStatus {
    fn from(status: FinishStatus) -> Self {
        match status {
            FinishStatus::Completed => TaskStatus::Completed,
            FinishStatus::Failed => TaskStatus::Failed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Task {
    pub id: String,
    pub content: String,
    pub status: TaskStatus,
    #[serde(skip)]
    parent: Option<usize>,
    #[serde(skip)]
    child_count: u32,
}

impl Task {
    fn label(&self) -> String {
        if self.id.is_empty() {
            "(overall goal)".to_string()
        } else {
            format!("Task {}", self.id)
        }
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:<11}) Task {}: {}", self.status, self.id, self.content)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConclusionKind {
    Analyze,
    Build,
    #[serde(rename = "Plain Text")]
    PlainText,
}

impl fmt::Display for ConclusionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ConclusionKind::Analyze => "Analyze",
            ConclusionKind::Build => "Build",
            ConclusionKind::PlainText => "Plain Text",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conclusion {
    pub kind: ConclusionKind,
    pub statement: String,
    pub references: Vec<String>,
}

impl fmt::Display for Conclusion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Type: {}, Statement: {}, References: [{}]",
            self.kind,
            self.statement,
            self.references.join(", ")
        )
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TaskHierarchy {
    tasks: Vec<Task>,
    #[serde(skip)]
    current: Option<usize>,
    conclusions: Vec<Conclusion>,
    /// Put a `decompose` parent back to `in_progress` when its child finishes.
    #[serde(skip)]
    resume_parent_on_finish: bool,
}

impl TaskHierarchy {
    pub fn new(goal: &str) -> Self {
        Self {
            tasks: vec![Task {
                id: String::new(),
                content: goal.trim().to_string(),
                status: TaskStatus::InProgress,
                parent: None,
                child_count: 0,
            }],
            current: Some(ROOT),
            conclusions: Vec::new(),
            resume_parent_on_finish: false,
        }
    }

    pub fn with_resume_parent(mut self, resume: bool) -> Self {
        self.resume_parent_on_finish = resume;
        self
    }

    pub fn goal(&self) -> &str {
        &self.tasks[ROOT].content
    }

    /// Created tasks in creation order, without the overall goal.
    pub fn tasks(&self) -> &[Task] {
        &self.tasks[1..]
    }

    pub fn current(&self) -> Option<&Task> {
        self.current.map(|index| &self.tasks[index])
    }

    pub fn conclusions(&self) -> &[Conclusion] {
        &self.conclusions
    }

    pub fn find(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|task| task.id == id)
    }

    /// Create a child of the current task. Returns the new dotted id.
    pub fn create_task(&mut self, content: &str, parent_id: &str) -> Result<String, String> {
        let parent_id = parent_id.trim();
        let Some(current) = self.current else {
            return Err(format!(
                "create new task {} under parent task {} failed: every task is finished",
                content, parent_id
            ));
        };
        if self.tasks[current].id != parent_id {
            return Err(format!(
                "create new task {} under parent task {} failed: previous task not finished, currently working on {}",
                content,
                parent_id,
                self.tasks[current].label()
            ));
        }

        let parent = &mut self.tasks[current];
        parent.child_count += 1;
        parent.status = TaskStatus::Decompose;
        let id = if parent.id.is_empty() {
            parent.child_count.to_string()
        } else {
            format!("{}.{}", parent.id, parent.child_count)
        };
        self.tasks.push(Task {
            id: id.clone(),
            content: content.trim().to_string(),
            status: TaskStatus::InProgress,
            parent: Some(current),
            child_count: 0,
        });
        self.current = Some(self.tasks.len() - 1);
        Ok(id)
    }

    /// Finish the current task and move up to its parent.
    pub fn finish_task(&mut self, id: &str, status: FinishStatus) -> Result<(), String> {
        let id = id.trim();
        let Some(current) = self.current else {
            return Err(format!("finish Task {} failed: every task is finished", id));
        };
        if self.tasks[current].id != id {
            return Err(format!(
                "finish Task {} failed: currently working on {}",
                id,
                self.tasks[current].label()
            ));
        }
        let task = &mut self.tasks[current];
        task.status = status.into();
        self.current = task.parent;
        if self.resume_parent_on_finish
            && let Some(parent) = self.current
            && self.tasks[parent].status == TaskStatus::Decompose
        {
            self.tasks[parent].status = TaskStatus::InProgress;
        }
        Ok(())
    }

    pub fn record_conclusion(&mut self, kind: ConclusionKind, statement: &str, references: Vec<String>) {
        self.conclusions.push(Conclusion {
            kind,
            statement: statement.trim().to_string(),
            references,
        });
    }

    pub fn in_progress_count(&self) -> usize {
        self.tasks
            .iter()
            .filter(|task| task.status == TaskStatus::InProgress)
            .count()
    }

    pub fn render_conclusions(&self) -> String {
        if self.conclusions.is_empty() {
            return "NO conclusions\n".to_string();
        }
        let mut out = String::new();
        for conclusion in &self.conclusions {
            let _ = writeln!(out, "{}", conclusion);
        }
        out
    }

    pub fn render_task_list(&self) -> String {
        if self.tasks().is_empty() {
            return "NO tasks\n".to_string();
        }
        let mut out = String::new();
        for task in self.tasks() {
            let _ = writeln!(out, "{}", task);
        }
        out
    }

    pub fn render_current(&self) -> String {
        match self.current() {
            Some(task) if task.id.is_empty() => {
                format!("Current Working on: the overall goal: {}\n", task.content)
            }
            Some(task) => format!("Current Working on: Task {}: {}\n", task.id, task.content),
            None => "Every task is finished\n".to_string(),
        }
    }
}
