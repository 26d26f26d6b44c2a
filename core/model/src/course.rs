//! Course root and its top-level items.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

use coursesync_common::{Error, Result};

use crate::item::{Author, ChangeStatus, Lesson, Section, TaskFile};

/// Course mode stamped on courses published by an author.
pub const COURSE_MODE: &str = "Course Creator";

/// A top-level entry of a course.
///
/// Locally a course may mix sections and lessons at the top level. Once
/// synchronized it holds only one of the two kinds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StudyItem {
    Section(Section),
    Lesson(Lesson),
}

impl StudyItem {
    /// Item name.
    pub fn name(&self) -> &str {
        match self {
            StudyItem::Section(section) => &section.name,
            StudyItem::Lesson(lesson) => &lesson.name,
        }
    }

    /// Remote id of the item, `0` if never pushed.
    pub fn id(&self) -> u64 {
        match self {
            StudyItem::Section(section) => section.id,
            StudyItem::Lesson(lesson) => lesson.id,
        }
    }
}

/// Root of the local course tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Course {
    /// Remote course id, `0` if never pushed.
    #[serde(default)]
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Programming language of the course.
    #[serde(default)]
    pub language: String,
    #[serde(default)]
    pub course_mode: String,
    /// Only the remote side may change this flag.
    #[serde(default)]
    pub is_public: bool,
    /// Only the remote side may change this flag.
    #[serde(default = "default_compatible")]
    pub is_compatible: bool,
    #[serde(default)]
    pub items: Vec<StudyItem>,
    #[serde(default)]
    pub authors: Vec<Author>,
    /// Remote section created to hold top-level lessons, if any.
    #[serde(default)]
    pub section_ids: Vec<u64>,
    /// Remote group holding the course administrators.
    #[serde(default)]
    pub admins_group: Option<String>,
    #[serde(default)]
    pub update_date: Option<DateTime<Utc>>,
    /// Course-level files that belong to no task.
    #[serde(default)]
    pub additional_files: Vec<TaskFile>,
    #[serde(default)]
    pub status: ChangeStatus,
}

fn default_compatible() -> bool {
    true
}

impl Course {
    /// Create an unpushed, empty course.
    pub fn new(name: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            id: 0,
            name: name.into(),
            description: String::new(),
            language: language.into(),
            course_mode: String::new(),
            is_public: false,
            is_compatible: true,
            items: Vec::new(),
            authors: Vec::new(),
            section_ids: Vec::new(),
            admins_group: None,
            update_date: None,
            additional_files: Vec::new(),
            status: ChangeStatus::UpToDate,
        }
    }

    /// Set the remote id (builder style).
    pub fn with_id(mut self, id: u64) -> Self {
        self.id = id;
        self
    }

    /// Append a top-level section (builder style).
    pub fn with_section(mut self, section: Section) -> Self {
        self.items.push(StudyItem::Section(section));
        self
    }

    /// Append a top-level lesson (builder style).
    pub fn with_lesson(mut self, lesson: Lesson) -> Self {
        self.items.push(StudyItem::Lesson(lesson));
        self
    }

    /// Check whether the course exists remotely.
    pub fn is_pushed(&self) -> bool {
        self.id > 0
    }

    /// Top-level sections in order.
    pub fn sections(&self) -> impl Iterator<Item = &Section> {
        self.items.iter().filter_map(|item| match item {
            StudyItem::Section(section) => Some(section),
            StudyItem::Lesson(_) => None,
        })
    }

    /// Top-level sections in order, mutably.
    pub fn sections_mut(&mut self) -> impl Iterator<Item = &mut Section> {
        self.items.iter_mut().filter_map(|item| match item {
            StudyItem::Section(section) => Some(section),
            StudyItem::Lesson(_) => None,
        })
    }

    /// Top-level lessons in order.
    pub fn lessons(&self) -> impl Iterator<Item = &Lesson> {
        self.items.iter().filter_map(|item| match item {
            StudyItem::Lesson(lesson) => Some(lesson),
            StudyItem::Section(_) => None,
        })
    }

    /// Top-level lessons in order, mutably.
    pub fn lessons_mut(&mut self) -> impl Iterator<Item = &mut Lesson> {
        self.items.iter_mut().filter_map(|item| match item {
            StudyItem::Lesson(lesson) => Some(lesson),
            StudyItem::Section(_) => None,
        })
    }

    pub fn has_sections(&self) -> bool {
        self.sections().next().is_some()
    }

    pub fn has_top_level_lessons(&self) -> bool {
        self.lessons().next().is_some()
    }

    /// Whether sections and top-level lessons coexist.
    pub fn has_mixed_top_level(&self) -> bool {
        self.has_sections() && self.has_top_level_lessons()
    }

    /// Whether any top-level lesson was never pushed.
    pub fn has_unpushed_top_level_lessons(&self) -> bool {
        self.lessons().any(|lesson| !lesson.is_pushed())
    }

    /// Wrap every unpushed top-level lesson into its own new section.
    ///
    /// The new section takes the lesson's name and its place in the item
    /// list. Lessons that already exist remotely are left where they are.
    ///
    /// # Returns
    /// Number of lessons that were wrapped.
    pub fn wrap_unpushed_lessons_into_sections(&mut self) -> usize {
        let mut wrapped = 0;
        let items = std::mem::take(&mut self.items);

        self.items = items
            .into_iter()
            .map(|item| match item {
                StudyItem::Lesson(mut lesson) if !lesson.is_pushed() => {
                    wrapped += 1;
                    lesson.index = 1;
                    let section = Section::new(lesson.name.clone()).with_lesson(lesson);
                    StudyItem::Section(section)
                }
                other => other,
            })
            .collect();

        debug!("Wrapped {} top-level lessons into sections", wrapped);
        wrapped
    }

    /// Drop every remote identity so the course can be published as new.
    pub fn convert_to_local(&mut self) {
        self.id = 0;
        self.section_ids.clear();
        self.admins_group = None;
        self.update_date = None;

        for item in &mut self.items {
            match item {
                StudyItem::Section(section) => {
                    section.id = 0;
                    section.course_id = 0;
                    section.units.clear();
                    section.update_date = None;
                    for lesson in &mut section.lessons {
                        reset_lesson(lesson);
                    }
                }
                StudyItem::Lesson(lesson) => reset_lesson(lesson),
            }
        }
    }

    /// Set the change status of the course and every node below it.
    pub fn set_status_recursively(&mut self, status: ChangeStatus) {
        self.status = status;
        for item in &mut self.items {
            match item {
                StudyItem::Section(section) => {
                    section.status = status;
                    for lesson in &mut section.lessons {
                        set_lesson_status(lesson, status);
                    }
                }
                StudyItem::Lesson(lesson) => set_lesson_status(lesson, status),
            }
        }
    }

    /// Total number of lessons, including those inside sections.
    pub fn lesson_count(&self) -> usize {
        self.items
            .iter()
            .map(|item| match item {
                StudyItem::Section(section) => section.lessons.len(),
                StudyItem::Lesson(_) => 1,
            })
            .sum()
    }

    /// Load a course from a JSON file.
    ///
    /// # Errors
    /// - File cannot be read
    /// - Content is not a valid course
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = tokio::fs::read(path).await?;
        serde_json::from_slice(&data).map_err(|e| {
            Error::Serialization(format!("Invalid course file {}: {}", path.display(), e))
        })
    }

    /// Save the course as pretty-printed JSON.
    pub async fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_vec_pretty(self)?;
        tokio::fs::write(path, json).await?;
        Ok(())
    }
}

fn reset_lesson(lesson: &mut Lesson) {
    lesson.id = 0;
    lesson.unit_id = 0;
    lesson.update_date = None;
    for task in &mut lesson.tasks {
        task.id = 0;
        task.update_date = None;
    }
}

fn set_lesson_status(lesson: &mut Lesson, status: ChangeStatus) {
    lesson.status = status;
    for task in &mut lesson.tasks {
        task.status = status;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::{Task, TaskKind};

    fn mixed_course() -> Course {
        Course::new("Rust 101", "rust")
            .with_section(Section::new("Ownership").with_lesson(Lesson::new("Moves")))
            .with_lesson(Lesson::new("Old lesson").with_id(7))
            .with_lesson(Lesson::new("New lesson"))
    }

    #[test]
    fn test_top_level_queries() {
        let course = mixed_course();

        assert!(course.has_sections());
        assert!(course.has_top_level_lessons());
        assert!(course.has_mixed_top_level());
        assert!(course.has_unpushed_top_level_lessons());
        assert_eq!(course.lesson_count(), 3);
    }

    #[test]
    fn test_wrap_unpushed_lessons() {
        let mut course = mixed_course();
        let wrapped = course.wrap_unpushed_lessons_into_sections();

        assert_eq!(wrapped, 1);
        let names: Vec<&str> = course.items.iter().map(|i| i.name()).collect();
        assert_eq!(names, vec!["Ownership", "Old lesson", "New lesson"]);
        assert!(matches!(course.items[1], StudyItem::Lesson(_)));

        match &course.items[2] {
            StudyItem::Section(section) => {
                assert_eq!(section.lessons.len(), 1);
                assert_eq!(section.lessons[0].name, "New lesson");
            }
            StudyItem::Lesson(_) => panic!("expected a wrapping section"),
        }
        assert!(!course.has_unpushed_top_level_lessons());
    }

    #[test]
    fn test_convert_to_local() {
        let mut course = Course::new("Rust 101", "rust")
            .with_id(42)
            .with_section(
                Section::new("S").with_id(3).with_lesson(
                    Lesson::new("L")
                        .with_id(5)
                        .with_task(Task::new("t", TaskKind::Edu).with_id(9)),
                ),
            );
        course.section_ids = vec![3];
        course.admins_group = Some("100".to_string());

        course.convert_to_local();

        assert!(!course.is_pushed());
        assert!(course.section_ids.is_empty());
        assert!(course.admins_group.is_none());
        let section = course.sections().next().unwrap();
        assert!(!section.is_pushed());
        assert!(!section.lessons[0].is_pushed());
        assert!(!section.lessons[0].tasks[0].is_pushed());
    }

    #[test]
    fn test_set_status_recursively() {
        let mut course = mixed_course();
        course.set_status_recursively(ChangeStatus::Content);
        assert_eq!(course.sections().next().unwrap().lessons[0].status, ChangeStatus::Content);

        course.set_status_recursively(ChangeStatus::UpToDate);
        assert!(course.lessons().all(|l| l.status == ChangeStatus::UpToDate));
    }

    #[test]
    fn test_item_tagging() {
        let course = Course::new("C", "python").with_lesson(Lesson::new("L"));
        let json = serde_json::to_value(&course).unwrap();
        assert_eq!(json["items"][0]["type"], "lesson");
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("course.json");

        let course = mixed_course();
        course.save(&path).await.unwrap();
        let loaded = Course::load(&path).await.unwrap();

        assert_eq!(loaded, course);
    }

    #[tokio::test]
    async fn test_load_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("course.json");
        tokio::fs::write(&path, b"{\"items\": 3}").await.unwrap();

        let result = Course::load(&path).await;
        assert!(matches!(result, Err(Error::Serialization(_))));
    }
}
