//! In-memory remote platform for testing.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use coursesync_common::{Error, Result};
use coursesync_model::{Author, Course, Lesson, Section, Task, TaskFile};

use crate::gateway::{
    AuthOracle, RemoteCourse, RemoteGateway, RemoteLesson, RemoteSection, RemoteTask, RemoteUnit,
    UnitPlacement,
};

/// Gateway operation, as recorded in the call log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    CurrentUser,
    CreateCourse,
    GetCourseInfo,
    UpdateCourse,
    CreateSection,
    UpdateSection,
    DeleteSection,
    CreateLesson,
    UpdateLesson,
    DeleteLesson,
    CreateUnit,
    UpdateUnit,
    CreateTask,
    UpdateTask,
    DeleteTask,
    GetTaskInfo,
    CreateAttachment,
    UpdateAttachment,
    AddGroupMember,
}

impl Op {
    /// Whether the operation creates a remote object.
    pub fn is_create(&self) -> bool {
        matches!(
            self,
            Op::CreateCourse
                | Op::CreateSection
                | Op::CreateLesson
                | Op::CreateUnit
                | Op::CreateTask
                | Op::CreateAttachment
        )
    }

    /// Whether the operation updates an existing remote object.
    pub fn is_update(&self) -> bool {
        matches!(
            self,
            Op::UpdateCourse
                | Op::UpdateSection
                | Op::UpdateLesson
                | Op::UpdateUnit
                | Op::UpdateTask
                | Op::UpdateAttachment
        )
    }

    /// Whether the operation changes remote state.
    pub fn is_mutating(&self) -> bool {
        self.is_create()
            || self.is_update()
            || matches!(
                self,
                Op::DeleteSection | Op::DeleteLesson | Op::DeleteTask | Op::AddGroupMember
            )
    }
}

/// One recorded gateway call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayCall {
    pub op: Op,
    /// Object id for get/update/delete; parent id for creations
    /// (course for sections, lesson for tasks and units, 0 otherwise).
    pub target: u64,
    /// Name of the created or updated item, when it has one.
    pub name: Option<String>,
    /// Requested position, when the operation carries one.
    pub position: Option<u32>,
}

/// Failure to inject into the next matching call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    NotFound,
    Forbidden,
    Network,
}

impl Failure {
    fn into_error(self, op: Op, target: u64) -> Error {
        let what = format!("{:?} {}", op, target);
        match self {
            Failure::NotFound => Error::NotFound(what),
            Failure::Forbidden => Error::Forbidden(what),
            Failure::Network => Error::Network(format!("injected failure: {}", what)),
        }
    }
}

#[derive(Debug, Clone)]
struct InjectedFailure {
    op: Op,
    target: Option<u64>,
    failure: Failure,
}

#[derive(Debug, Clone)]
struct CourseRecord {
    is_public: bool,
    is_compatible: bool,
    admins_group: String,
    section_ids: Vec<u64>,
    update_date: DateTime<Utc>,
    attachments: Vec<TaskFile>,
}

#[derive(Debug, Clone)]
struct SectionRecord {
    course_id: u64,
    units: Vec<u64>,
    update_date: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct LessonRecord {
    steps: Vec<u64>,
    update_date: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct TaskRecord {
    lesson_id: u64,
    position: u32,
    update_date: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct State {
    next_id: u64,
    courses: BTreeMap<u64, CourseRecord>,
    sections: BTreeMap<u64, SectionRecord>,
    lessons: BTreeMap<u64, LessonRecord>,
    units: BTreeMap<u64, RemoteUnit>,
    tasks: BTreeMap<u64, TaskRecord>,
    groups: BTreeMap<String, Vec<String>>,
    calls: Vec<GatewayCall>,
    failures: Vec<InjectedFailure>,
    user: Option<Author>,
}

impl State {
    fn allocate_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    /// Log the call and consume a matching injected failure, if any.
    fn record(&mut self, call: GatewayCall) -> Result<()> {
        let (op, target) = (call.op, call.target);
        self.calls.push(call);

        let matching = self
            .failures
            .iter()
            .position(|f| f.op == op && f.target.map_or(true, |t| t == target));

        match matching {
            Some(index) => Err(self.failures.remove(index).failure.into_error(op, target)),
            None => Ok(()),
        }
    }

    fn course_view(&self, id: u64) -> Option<RemoteCourse> {
        self.courses.get(&id).map(|c| RemoteCourse {
            id,
            update_date: Some(c.update_date),
            is_public: c.is_public,
            is_compatible: c.is_compatible,
            admins_group: Some(c.admins_group.clone()),
            section_ids: c.section_ids.clone(),
        })
    }

    fn section_view(&self, id: u64) -> Option<RemoteSection> {
        self.sections.get(&id).map(|s| RemoteSection {
            id,
            update_date: Some(s.update_date),
            units: s.units.clone(),
        })
    }

    fn lesson_view(&self, id: u64) -> Option<RemoteLesson> {
        self.lessons.get(&id).map(|l| RemoteLesson {
            id,
            update_date: Some(l.update_date),
            steps: l.steps.clone(),
        })
    }

    fn task_view(&self, id: u64) -> Option<RemoteTask> {
        self.tasks.get(&id).map(|t| RemoteTask {
            id,
            update_date: Some(t.update_date),
            position: t.position,
        })
    }

    fn remove_unit(&mut self, unit_id: u64) {
        if let Some(unit) = self.units.remove(&unit_id) {
            if let Some(section) = self.sections.get_mut(&unit.section_id) {
                section.units.retain(|u| *u != unit_id);
            }
        }
    }
}

fn call(op: Op, target: u64) -> GatewayCall {
    GatewayCall {
        op,
        target,
        name: None,
        position: None,
    }
}

fn not_found(what: &str, id: u64) -> Error {
    Error::NotFound(format!("{} {} not found", what, id))
}

/// In-memory remote platform.
///
/// Assigns sequential ids, keeps the course/section/lesson/unit/task
/// relations the real platform keeps, and records every call in order so
/// tests can assert on the exact sequence. Failures can be injected for
/// the next call of a given operation.
pub struct MemoryGateway {
    state: Mutex<State>,
    logged_in: AtomicBool,
}

impl MemoryGateway {
    /// Create an empty platform with a logged-in user.
    pub fn new() -> Self {
        let state = State {
            user: Some(Author {
                id: 1,
                first_name: "Memory".to_string(),
                last_name: "User".to_string(),
            }),
            ..State::default()
        };

        Self {
            state: Mutex::new(state),
            logged_in: AtomicBool::new(true),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Toggle the user session.
    pub fn set_logged_in(&self, logged_in: bool) {
        self.logged_in.store(logged_in, Ordering::SeqCst);
    }

    /// Replace the identity returned by `current_user`.
    pub fn set_current_user(&self, user: Option<Author>) {
        self.state().user = user;
    }

    /// Make the next call of `op` fail. With `target` set, only a call on
    /// that id (or parent id for creations) matches.
    pub fn fail_next(&self, op: Op, target: Option<u64>, failure: Failure) {
        self.state().failures.push(InjectedFailure { op, target, failure });
    }

    /// All calls so far, in order.
    pub fn calls(&self) -> Vec<GatewayCall> {
        self.state().calls.clone()
    }

    /// Calls of one operation, in order.
    pub fn calls_of(&self, op: Op) -> Vec<GatewayCall> {
        self.state().calls.iter().filter(|c| c.op == op).cloned().collect()
    }

    /// Forget the call log.
    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }

    pub fn course(&self, id: u64) -> Option<RemoteCourse> {
        self.state().course_view(id)
    }

    pub fn section(&self, id: u64) -> Option<RemoteSection> {
        self.state().section_view(id)
    }

    pub fn lesson(&self, id: u64) -> Option<RemoteLesson> {
        self.state().lesson_view(id)
    }

    pub fn unit(&self, id: u64) -> Option<RemoteUnit> {
        self.state().units.get(&id).cloned()
    }

    pub fn task(&self, id: u64) -> Option<RemoteTask> {
        self.state().task_view(id)
    }

    /// Number of sections, lessons and tasks held remotely.
    pub fn object_counts(&self) -> (usize, usize, usize) {
        let state = self.state();
        (state.sections.len(), state.lessons.len(), state.tasks.len())
    }

    /// Additional files attached to a course.
    pub fn attachments(&self, course_id: u64) -> Vec<TaskFile> {
        self.state()
            .courses
            .get(&course_id)
            .map(|c| c.attachments.clone())
            .unwrap_or_default()
    }

    /// Members of a group.
    pub fn group_members(&self, group_id: &str) -> Vec<String> {
        self.state().groups.get(group_id).cloned().unwrap_or_default()
    }

    /// Remove a course behind the client's back, as a site admin would.
    pub fn remove_course(&self, id: u64) {
        self.state().courses.remove(&id);
    }

    /// Change flags the way the remote site's settings page would.
    pub fn set_course_flags(&self, id: u64, is_public: bool, is_compatible: bool) {
        if let Some(course) = self.state().courses.get_mut(&id) {
            course.is_public = is_public;
            course.is_compatible = is_compatible;
        }
    }
}

impl Default for MemoryGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthOracle for MemoryGateway {
    fn is_logged_in(&self) -> bool {
        self.logged_in.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RemoteGateway for MemoryGateway {
    fn name(&self) -> &str {
        "memory"
    }

    async fn current_user(&self) -> Result<Option<Author>> {
        let mut state = self.state();
        state.record(call(Op::CurrentUser, 0))?;
        Ok(state.user.clone())
    }

    async fn create_course(&self, course: &Course) -> Result<RemoteCourse> {
        let mut state = self.state();
        state.record(GatewayCall {
            name: Some(course.name.clone()),
            ..call(Op::CreateCourse, 0)
        })?;

        let id = state.allocate_id();
        let group = state.allocate_id().to_string();
        state.courses.insert(
            id,
            CourseRecord {
                is_public: course.is_public,
                is_compatible: course.is_compatible,
                admins_group: group.clone(),
                section_ids: Vec::new(),
                update_date: Utc::now(),
                attachments: Vec::new(),
            },
        );
        state.groups.insert(group, Vec::new());

        state.course_view(id).ok_or_else(|| not_found("course", id))
    }

    async fn get_course_info(&self, course_id: u64) -> Result<RemoteCourse> {
        let mut state = self.state();
        state.record(call(Op::GetCourseInfo, course_id))?;
        state.course_view(course_id).ok_or_else(|| not_found("course", course_id))
    }

    async fn update_course(&self, course: &Course) -> Result<RemoteCourse> {
        let mut state = self.state();
        state.record(GatewayCall {
            name: Some(course.name.clone()),
            ..call(Op::UpdateCourse, course.id)
        })?;

        let record = state
            .courses
            .get_mut(&course.id)
            .ok_or_else(|| not_found("course", course.id))?;
        record.update_date = Utc::now();

        state.course_view(course.id).ok_or_else(|| not_found("course", course.id))
    }

    async fn create_section(&self, section: &Section) -> Result<RemoteSection> {
        let mut state = self.state();
        state.record(GatewayCall {
            name: Some(section.name.clone()),
            position: Some(section.position),
            ..call(Op::CreateSection, section.course_id)
        })?;

        if !state.courses.contains_key(&section.course_id) {
            return Err(not_found("course", section.course_id));
        }

        let id = state.allocate_id();
        state.sections.insert(
            id,
            SectionRecord {
                course_id: section.course_id,
                units: Vec::new(),
                update_date: Utc::now(),
            },
        );
        if let Some(course) = state.courses.get_mut(&section.course_id) {
            course.section_ids.push(id);
        }

        state.section_view(id).ok_or_else(|| not_found("section", id))
    }

    async fn update_section(&self, section: &Section) -> Result<RemoteSection> {
        let mut state = self.state();
        state.record(GatewayCall {
            name: Some(section.name.clone()),
            position: Some(section.position),
            ..call(Op::UpdateSection, section.id)
        })?;

        let record = state
            .sections
            .get_mut(&section.id)
            .ok_or_else(|| not_found("section", section.id))?;
        record.update_date = Utc::now();

        state.section_view(section.id).ok_or_else(|| not_found("section", section.id))
    }

    async fn delete_section(&self, section_id: u64) -> Result<()> {
        let mut state = self.state();
        state.record(call(Op::DeleteSection, section_id))?;

        let record = state
            .sections
            .remove(&section_id)
            .ok_or_else(|| not_found("section", section_id))?;
        for unit_id in record.units {
            state.units.remove(&unit_id);
        }
        if let Some(course) = state.courses.get_mut(&record.course_id) {
            course.section_ids.retain(|id| *id != section_id);
        }
        Ok(())
    }

    async fn create_lesson(&self, lesson: &Lesson) -> Result<RemoteLesson> {
        let mut state = self.state();
        state.record(GatewayCall {
            name: Some(lesson.name.clone()),
            ..call(Op::CreateLesson, 0)
        })?;

        let id = state.allocate_id();
        state.lessons.insert(
            id,
            LessonRecord {
                steps: Vec::new(),
                update_date: Utc::now(),
            },
        );

        state.lesson_view(id).ok_or_else(|| not_found("lesson", id))
    }

    async fn update_lesson(&self, lesson: &Lesson) -> Result<RemoteLesson> {
        let mut state = self.state();
        state.record(GatewayCall {
            name: Some(lesson.name.clone()),
            ..call(Op::UpdateLesson, lesson.id)
        })?;

        let record = state
            .lessons
            .get_mut(&lesson.id)
            .ok_or_else(|| not_found("lesson", lesson.id))?;
        record.update_date = Utc::now();

        state.lesson_view(lesson.id).ok_or_else(|| not_found("lesson", lesson.id))
    }

    async fn delete_lesson(&self, lesson_id: u64) -> Result<()> {
        let mut state = self.state();
        state.record(call(Op::DeleteLesson, lesson_id))?;

        let record = state
            .lessons
            .remove(&lesson_id)
            .ok_or_else(|| not_found("lesson", lesson_id))?;
        for step in record.steps {
            state.tasks.remove(&step);
        }
        let units: Vec<u64> = state
            .units
            .values()
            .filter(|u| u.lesson_id == lesson_id)
            .map(|u| u.id)
            .collect();
        for unit_id in units {
            state.remove_unit(unit_id);
        }
        Ok(())
    }

    async fn create_unit(&self, placement: UnitPlacement) -> Result<RemoteUnit> {
        let mut state = self.state();
        state.record(GatewayCall {
            position: Some(placement.position),
            ..call(Op::CreateUnit, placement.lesson_id)
        })?;

        if !state.lessons.contains_key(&placement.lesson_id) {
            return Err(not_found("lesson", placement.lesson_id));
        }
        if !state.sections.contains_key(&placement.section_id) {
            return Err(not_found("section", placement.section_id));
        }

        let id = state.allocate_id();
        let unit = RemoteUnit {
            id,
            lesson_id: placement.lesson_id,
            section_id: placement.section_id,
            position: placement.position,
        };
        state.units.insert(id, unit.clone());
        if let Some(section) = state.sections.get_mut(&placement.section_id) {
            section.units.push(id);
        }
        Ok(unit)
    }

    async fn update_unit(&self, unit_id: u64, placement: UnitPlacement) -> Result<RemoteUnit> {
        let mut state = self.state();
        state.record(GatewayCall {
            position: Some(placement.position),
            ..call(Op::UpdateUnit, unit_id)
        })?;

        if !state.units.contains_key(&unit_id) {
            return Err(not_found("unit", unit_id));
        }
        if !state.sections.contains_key(&placement.section_id) {
            return Err(not_found("section", placement.section_id));
        }

        state.remove_unit(unit_id);
        let unit = RemoteUnit {
            id: unit_id,
            lesson_id: placement.lesson_id,
            section_id: placement.section_id,
            position: placement.position,
        };
        state.units.insert(unit_id, unit.clone());
        if let Some(section) = state.sections.get_mut(&placement.section_id) {
            section.units.push(unit_id);
        }
        Ok(unit)
    }

    async fn create_task(&self, task: &Task, lesson_id: u64, position: u32) -> Result<RemoteTask> {
        let mut state = self.state();
        state.record(GatewayCall {
            name: Some(task.name.clone()),
            position: Some(position),
            ..call(Op::CreateTask, lesson_id)
        })?;

        if !state.lessons.contains_key(&lesson_id) {
            return Err(not_found("lesson", lesson_id));
        }

        let id = state.allocate_id();
        state.tasks.insert(
            id,
            TaskRecord {
                lesson_id,
                position,
                update_date: Utc::now(),
            },
        );
        if let Some(lesson) = state.lessons.get_mut(&lesson_id) {
            lesson.steps.push(id);
        }

        state.task_view(id).ok_or_else(|| not_found("task", id))
    }

    async fn update_task(&self, task: &Task, lesson_id: u64, position: u32) -> Result<RemoteTask> {
        let mut state = self.state();
        state.record(GatewayCall {
            name: Some(task.name.clone()),
            position: Some(position),
            ..call(Op::UpdateTask, task.id)
        })?;

        let record = state
            .tasks
            .get_mut(&task.id)
            .ok_or_else(|| not_found("task", task.id))?;
        if record.lesson_id != lesson_id {
            return Err(not_found("task", task.id));
        }
        record.position = position;
        record.update_date = Utc::now();

        state.task_view(task.id).ok_or_else(|| not_found("task", task.id))
    }

    async fn delete_task(&self, task_id: u64) -> Result<()> {
        let mut state = self.state();
        state.record(call(Op::DeleteTask, task_id))?;

        let record = state
            .tasks
            .remove(&task_id)
            .ok_or_else(|| not_found("task", task_id))?;
        if let Some(lesson) = state.lessons.get_mut(&record.lesson_id) {
            lesson.steps.retain(|id| *id != task_id);
        }
        Ok(())
    }

    async fn get_task_info(&self, task_id: u64) -> Result<RemoteTask> {
        let mut state = self.state();
        state.record(call(Op::GetTaskInfo, task_id))?;
        state.task_view(task_id).ok_or_else(|| not_found("task", task_id))
    }

    async fn create_attachment(&self, files: &[TaskFile], course_id: u64) -> Result<()> {
        let mut state = self.state();
        state.record(call(Op::CreateAttachment, course_id))?;

        let course = state
            .courses
            .get_mut(&course_id)
            .ok_or_else(|| not_found("course", course_id))?;
        course.attachments.extend_from_slice(files);
        Ok(())
    }

    async fn update_attachment(&self, files: &[TaskFile], course_id: u64) -> Result<()> {
        let mut state = self.state();
        state.record(call(Op::UpdateAttachment, course_id))?;

        let course = state
            .courses
            .get_mut(&course_id)
            .ok_or_else(|| not_found("course", course_id))?;
        course.attachments = files.to_vec();
        Ok(())
    }

    async fn add_group_member(&self, user_id: &str, group_id: &str) -> Result<()> {
        let mut state = self.state();
        state.record(GatewayCall {
            name: Some(user_id.to_string()),
            ..call(Op::AddGroupMember, group_id.parse().unwrap_or(0))
        })?;

        let members = state
            .groups
            .get_mut(group_id)
            .ok_or_else(|| Error::NotFound(format!("group {} not found", group_id)))?;
        members.push(user_id.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coursesync_model::TaskKind;

    #[tokio::test]
    async fn test_create_hierarchy() {
        let gateway = MemoryGateway::new();

        let course = gateway.create_course(&Course::new("C", "rust")).await.unwrap();
        let mut section = Section::new("S");
        section.course_id = course.id;
        section.position = 1;
        let section = gateway.create_section(&section).await.unwrap();
        let lesson = gateway.create_lesson(&Lesson::new("L")).await.unwrap();
        let unit = gateway
            .create_unit(UnitPlacement {
                lesson_id: lesson.id,
                section_id: section.id,
                position: 1,
            })
            .await
            .unwrap();
        let task = gateway
            .create_task(&Task::new("t", TaskKind::Edu), lesson.id, 1)
            .await
            .unwrap();

        assert_eq!(gateway.course(course.id).unwrap().section_ids, vec![section.id]);
        assert_eq!(gateway.section(section.id).unwrap().units, vec![unit.id]);
        assert_eq!(gateway.lesson(lesson.id).unwrap().steps, vec![task.id]);
        assert_eq!(gateway.object_counts(), (1, 1, 1));
    }

    #[tokio::test]
    async fn test_missing_objects_are_not_found() {
        let gateway = MemoryGateway::new();

        assert!(gateway.get_course_info(99).await.unwrap_err().is_not_found());
        assert!(gateway
            .update_lesson(&Lesson::new("L").with_id(5))
            .await
            .unwrap_err()
            .is_not_found());
        assert!(gateway.delete_task(3).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_injected_failure_is_consumed_once() {
        let gateway = MemoryGateway::new();
        let course = gateway.create_course(&Course::new("C", "rust")).await.unwrap();
        gateway.fail_next(Op::GetCourseInfo, Some(course.id), Failure::Forbidden);

        let first = gateway.get_course_info(course.id).await;
        assert!(first.unwrap_err().is_forbidden());

        let second = gateway.get_course_info(course.id).await;
        assert!(second.is_ok());
        assert_eq!(gateway.calls_of(Op::GetCourseInfo).len(), 2);
    }

    #[tokio::test]
    async fn test_injected_failure_respects_target() {
        let gateway = MemoryGateway::new();
        let course = gateway.create_course(&Course::new("C", "rust")).await.unwrap();
        gateway.fail_next(Op::GetCourseInfo, Some(course.id + 100), Failure::Network);

        assert!(gateway.get_course_info(course.id).await.is_ok());
    }

    #[tokio::test]
    async fn test_delete_task_updates_steps() {
        let gateway = MemoryGateway::new();
        let lesson = gateway.create_lesson(&Lesson::new("L")).await.unwrap();
        let a = gateway.create_task(&Task::new("a", TaskKind::Edu), lesson.id, 1).await.unwrap();
        let b = gateway.create_task(&Task::new("b", TaskKind::Edu), lesson.id, 2).await.unwrap();

        gateway.delete_task(a.id).await.unwrap();

        assert_eq!(gateway.lesson(lesson.id).unwrap().steps, vec![b.id]);
    }

    #[tokio::test]
    async fn test_group_membership() {
        let gateway = MemoryGateway::new();
        let course = gateway.create_course(&Course::new("C", "rust")).await.unwrap();
        let group = course.admins_group.unwrap();

        gateway.add_group_member("17813950", &group).await.unwrap();

        assert_eq!(gateway.group_members(&group), vec!["17813950".to_string()]);
        assert!(gateway.add_group_member("1", "no-such-group").await.is_err());
    }

    #[test]
    fn test_op_classification() {
        assert!(Op::CreateTask.is_create());
        assert!(Op::UpdateUnit.is_update());
        assert!(Op::DeleteTask.is_mutating());
        assert!(!Op::GetCourseInfo.is_mutating());
        assert!(!Op::CurrentUser.is_mutating());
    }

    #[test]
    fn test_auth_toggle() {
        let gateway = MemoryGateway::new();
        assert!(gateway.is_logged_in());
        gateway.set_logged_in(false);
        assert!(!gateway.is_logged_in());
    }
}
