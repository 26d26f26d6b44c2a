//! Sections, lessons, tasks and the small value types they carry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Kind of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    /// Task checked by tests.
    Edu,
    /// Task checked by comparing program output.
    Output,
    /// Theory step without a check.
    Theory,
    /// Multiple-choice quiz.
    Choice,
    /// Code challenge checked on the platform.
    Code,
    /// Free-form task opened in the IDE.
    Ide,
}

impl TaskKind {
    /// Name used in course files and configuration.
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::Edu => "edu",
            TaskKind::Output => "output",
            TaskKind::Theory => "theory",
            TaskKind::Choice => "choice",
            TaskKind::Code => "code",
            TaskKind::Ide => "ide",
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What changed locally since the last successful push.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeStatus {
    /// Nothing to push.
    #[default]
    UpToDate,
    /// Item metadata (name, position) changed.
    Info,
    /// Item content changed.
    Content,
    /// Both metadata and content changed.
    InfoAndContent,
}

/// A course author as known to the remote platform.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Author {
    /// Remote user id (0 when unknown).
    #[serde(default)]
    pub id: u64,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
}

impl Author {
    pub fn new(first_name: impl Into<String>, last_name: impl Into<String>) -> Self {
        Self {
            id: 0,
            first_name: first_name.into(),
            last_name: last_name.into(),
        }
    }
}

/// A file attached to a task, or an additional course-level file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskFile {
    pub name: String,
    #[serde(default)]
    pub text: String,
    #[serde(default = "default_visible")]
    pub visible: bool,
}

fn default_visible() -> bool {
    true
}

impl TaskFile {
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            text: text.into(),
            visible: true,
        }
    }
}

/// Leaf of the course tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Remote step id, `0` if never pushed.
    #[serde(default)]
    pub id: u64,
    pub name: String,
    pub kind: TaskKind,
    #[serde(default)]
    pub description_text: String,
    #[serde(default)]
    pub files: Vec<TaskFile>,
    #[serde(default)]
    pub update_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub status: ChangeStatus,
}

impl Task {
    /// Create an unpushed task.
    pub fn new(name: impl Into<String>, kind: TaskKind) -> Self {
        Self {
            id: 0,
            name: name.into(),
            kind,
            description_text: String::new(),
            files: Vec::new(),
            update_date: None,
            status: ChangeStatus::UpToDate,
        }
    }

    /// Set the remote id (builder style).
    pub fn with_id(mut self, id: u64) -> Self {
        self.id = id;
        self
    }

    /// Add a file (builder style).
    pub fn with_file(mut self, file: TaskFile) -> Self {
        self.files.push(file);
        self
    }

    /// Check whether the task exists remotely.
    pub fn is_pushed(&self) -> bool {
        self.id > 0
    }
}

/// Ordered container of tasks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lesson {
    /// Remote lesson id, `0` if never pushed.
    #[serde(default)]
    pub id: u64,
    pub name: String,
    /// 1-based position within the parent.
    #[serde(default)]
    pub index: u32,
    /// Remote unit linking this lesson to its section.
    #[serde(default)]
    pub unit_id: u64,
    #[serde(default)]
    pub tasks: Vec<Task>,
    #[serde(default)]
    pub update_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub status: ChangeStatus,
}

impl Lesson {
    /// Create an unpushed, empty lesson.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: 0,
            name: name.into(),
            index: 0,
            unit_id: 0,
            tasks: Vec::new(),
            update_date: None,
            status: ChangeStatus::UpToDate,
        }
    }

    /// Set the remote id (builder style).
    pub fn with_id(mut self, id: u64) -> Self {
        self.id = id;
        self
    }

    /// Append a task (builder style).
    pub fn with_task(mut self, task: Task) -> Self {
        self.tasks.push(task);
        self
    }

    /// Check whether the lesson exists remotely.
    pub fn is_pushed(&self) -> bool {
        self.id > 0
    }

    /// Remote ids of the local tasks that were already pushed.
    pub fn local_task_ids(&self) -> BTreeSet<u64> {
        self.tasks.iter().map(|t| t.id).filter(|id| *id > 0).collect()
    }
}

/// Ordered container of lessons.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    /// Remote section id, `0` if never pushed.
    #[serde(default)]
    pub id: u64,
    pub name: String,
    /// 1-based position within the course.
    #[serde(default)]
    pub position: u32,
    /// Remote id of the owning course.
    #[serde(default)]
    pub course_id: u64,
    /// Remote unit ids last reported for this section.
    #[serde(default)]
    pub units: Vec<u64>,
    #[serde(default)]
    pub lessons: Vec<Lesson>,
    #[serde(default)]
    pub update_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub status: ChangeStatus,
}

impl Section {
    /// Create an unpushed, empty section.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: 0,
            name: name.into(),
            position: 0,
            course_id: 0,
            units: Vec::new(),
            lessons: Vec::new(),
            update_date: None,
            status: ChangeStatus::UpToDate,
        }
    }

    /// Set the remote id (builder style).
    pub fn with_id(mut self, id: u64) -> Self {
        self.id = id;
        self
    }

    /// Append a lesson (builder style).
    pub fn with_lesson(mut self, lesson: Lesson) -> Self {
        self.lessons.push(lesson);
        self
    }

    /// Check whether the section exists remotely.
    pub fn is_pushed(&self) -> bool {
        self.id > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_kind_serialization() {
        let json = serde_json::to_string(&TaskKind::Choice).unwrap();
        assert_eq!(json, "\"choice\"");

        let kind: TaskKind = serde_json::from_str("\"output\"").unwrap();
        assert_eq!(kind, TaskKind::Output);
        assert_eq!(kind.to_string(), "output");
    }

    #[test]
    fn test_local_task_ids_skip_unpushed() {
        let lesson = Lesson::new("Basics")
            .with_task(Task::new("a", TaskKind::Edu).with_id(11))
            .with_task(Task::new("b", TaskKind::Edu))
            .with_task(Task::new("c", TaskKind::Theory).with_id(12));

        let ids: Vec<u64> = lesson.local_task_ids().into_iter().collect();
        assert_eq!(ids, vec![11, 12]);
    }

    #[test]
    fn test_missing_ids_default_to_zero() {
        let json = r#"{
            "name": "Intro",
            "lessons": [{"name": "L1", "tasks": [{"name": "t", "kind": "edu"}]}]
        }"#;
        let section: Section = serde_json::from_str(json).unwrap();

        assert!(!section.is_pushed());
        assert!(!section.lessons[0].is_pushed());
        assert!(!section.lessons[0].tasks[0].is_pushed());
        assert_eq!(section.status, ChangeStatus::UpToDate);
    }

    #[test]
    fn test_task_file_visible_by_default() {
        let file: TaskFile = serde_json::from_str(r#"{"name": "main.py"}"#).unwrap();
        assert!(file.visible);
        assert!(file.text.is_empty());
    }
}
