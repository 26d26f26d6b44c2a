//! Remote gateway trait definition.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use coursesync_common::Result;
use coursesync_model::{Author, Course, Lesson, Section, Task, TaskFile};

/// Course as reported by the remote platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteCourse {
    /// Remote course id.
    pub id: u64,
    /// Last remote modification time.
    pub update_date: Option<DateTime<Utc>>,
    /// Visibility, editable on the remote site only.
    pub is_public: bool,
    /// Compatibility flag, editable on the remote site only.
    pub is_compatible: bool,
    /// Group holding the course administrators.
    pub admins_group: Option<String>,
    /// Ids of the sections the platform lists for the course.
    pub section_ids: Vec<u64>,
}

/// Section as reported by the remote platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteSection {
    pub id: u64,
    pub update_date: Option<DateTime<Utc>>,
    /// Units currently placed in the section.
    pub units: Vec<u64>,
}

/// Lesson as reported by the remote platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteLesson {
    pub id: u64,
    pub update_date: Option<DateTime<Utc>>,
    /// Ids of the tasks (steps) the platform holds for this lesson.
    pub steps: Vec<u64>,
}

/// Unit linking a lesson to a position inside a section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteUnit {
    pub id: u64,
    pub lesson_id: u64,
    pub section_id: u64,
    pub position: u32,
}

/// Task as reported by the remote platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteTask {
    pub id: u64,
    pub update_date: Option<DateTime<Utc>>,
    pub position: u32,
}

/// Where a lesson sits on the remote side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnitPlacement {
    pub lesson_id: u64,
    pub section_id: u64,
    /// 1-based position within the section.
    pub position: u32,
}

/// Answers whether a user session is currently available.
///
/// Consulted before every remote-mutating call. How the session was
/// obtained is not this trait's concern.
pub trait AuthOracle: Send + Sync {
    /// Check if a user is logged in.
    fn is_logged_in(&self) -> bool;
}

/// Contract of the remote learning platform.
///
/// Every operation is one request/response. Creations and updates return
/// the remote representation with the identity and update time the
/// platform assigned; the caller decides how to merge it locally.
///
/// # Errors
/// Implementations report failures with these variants, which callers
/// branch on:
/// - `Error::NotFound`: the referenced remote object does not exist
/// - `Error::Forbidden`: the user may not edit the object
/// - `Error::Unauthenticated`: the session was rejected
/// - `Error::Network`: any other non-2xx response or transport failure
#[async_trait]
pub trait RemoteGateway: Send + Sync {
    /// Get the gateway name (e.g., "stepik", "memory").
    fn name(&self) -> &str;

    /// Identity of the logged-in user, if the platform knows one.
    async fn current_user(&self) -> Result<Option<Author>>;

    /// Create a course.
    ///
    /// # Postconditions
    /// - Returns the new remote id and the course's admins group
    async fn create_course(&self, course: &Course) -> Result<RemoteCourse>;

    /// Fetch the current remote state of a course.
    async fn get_course_info(&self, course_id: u64) -> Result<RemoteCourse>;

    /// Update course metadata. `course.id` must be set.
    async fn update_course(&self, course: &Course) -> Result<RemoteCourse>;

    /// Create a section in `section.course_id` at `section.position`.
    async fn create_section(&self, section: &Section) -> Result<RemoteSection>;

    /// Update section metadata. `section.id` must be set.
    async fn update_section(&self, section: &Section) -> Result<RemoteSection>;

    /// Delete a section.
    async fn delete_section(&self, section_id: u64) -> Result<()>;

    /// Create a lesson. The lesson is not placed anywhere until a unit is
    /// created for it.
    async fn create_lesson(&self, lesson: &Lesson) -> Result<RemoteLesson>;

    /// Update lesson metadata.
    ///
    /// # Returns
    /// The remote lesson including the task ids the platform holds for it.
    async fn update_lesson(&self, lesson: &Lesson) -> Result<RemoteLesson>;

    /// Delete a lesson.
    async fn delete_lesson(&self, lesson_id: u64) -> Result<()>;

    /// Place a lesson into a section.
    async fn create_unit(&self, placement: UnitPlacement) -> Result<RemoteUnit>;

    /// Move an existing unit.
    async fn update_unit(&self, unit_id: u64, placement: UnitPlacement) -> Result<RemoteUnit>;

    /// Create a task in a lesson at a 1-based position.
    async fn create_task(&self, task: &Task, lesson_id: u64, position: u32) -> Result<RemoteTask>;

    /// Update a task. `task.id` must be set.
    async fn update_task(&self, task: &Task, lesson_id: u64, position: u32) -> Result<RemoteTask>;

    /// Delete a task.
    async fn delete_task(&self, task_id: u64) -> Result<()>;

    /// Fetch the current remote state of a task.
    async fn get_task_info(&self, task_id: u64) -> Result<RemoteTask>;

    /// Attach the course's additional files.
    async fn create_attachment(&self, files: &[TaskFile], course_id: u64) -> Result<()>;

    /// Replace the course's additional files.
    async fn update_attachment(&self, files: &[TaskFile], course_id: u64) -> Result<()>;

    /// Add a user to a group (used to grant the administrator role).
    async fn add_group_member(&self, user_id: &str, group_id: &str) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_course_serialization() {
        let course = RemoteCourse {
            id: 42,
            update_date: Some(Utc::now()),
            is_public: true,
            is_compatible: false,
            admins_group: Some("900".to_string()),
            section_ids: vec![1, 2],
        };

        let json = serde_json::to_string(&course).unwrap();
        let deserialized: RemoteCourse = serde_json::from_str(&json).unwrap();

        assert_eq!(deserialized, course);
    }
}
