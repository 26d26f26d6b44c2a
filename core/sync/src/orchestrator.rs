//! Course push orchestration.

use chrono::Utc;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

use coursesync_common::{Error, Result};
use coursesync_model::{Author, ChangeStatus, Course, Lesson, Section, StudyItem, Task};
use coursesync_remote::{AuthOracle, RemoteCourse, RemoteGateway, UnitPlacement};

use crate::callbacks::{
    ConfirmationOracle, FixedAnswer, FollowUp, LogNotifier, Notification, NotificationSink,
    ProgressSink, SilentProgress, WrapPrompt,
};
use crate::config::SyncConfig;
use crate::decision::{decide, decide_task, stale_remote_tasks, NodeAction};
use crate::report::{NodeFailure, NodeKind, SyncReport};

/// Pushes a local course tree to the remote platform.
///
/// A course without a remote id is published (create path); a course with
/// one is reconciled against its remote copy (update path). The walk is
/// sequential: every gateway call is awaited before the next one is issued.
///
/// Failures of single sections, lessons and tasks are notified, recorded
/// in the [`SyncReport`] and do not stop their siblings. Only course-level
/// preconditions end a push with an error.
pub struct CoursePusher<G: RemoteGateway + ?Sized> {
    gateway: Arc<G>,
    auth: Arc<dyn AuthOracle>,
    confirm: Arc<dyn ConfirmationOracle>,
    progress: Arc<dyn ProgressSink>,
    notify: Arc<dyn NotificationSink>,
    config: SyncConfig,
}

impl<G: RemoteGateway + ?Sized> CoursePusher<G> {
    /// Create a pusher that declines every prompt, reports no progress and
    /// logs notifications.
    pub fn new(gateway: Arc<G>, auth: Arc<dyn AuthOracle>, config: SyncConfig) -> Self {
        Self {
            gateway,
            auth,
            confirm: Arc::new(FixedAnswer(false)),
            progress: Arc::new(SilentProgress::default()),
            notify: Arc::new(LogNotifier),
            config,
        }
    }

    /// Set the confirmation oracle (builder style).
    pub fn with_confirmation(mut self, confirm: Arc<dyn ConfirmationOracle>) -> Self {
        self.confirm = confirm;
        self
    }

    /// Set the progress sink (builder style).
    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    /// Set the notification sink (builder style).
    pub fn with_notifications(mut self, notify: Arc<dyn NotificationSink>) -> Self {
        self.notify = notify;
        self
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Push a course.
    ///
    /// # Postconditions
    /// - Every node pushed successfully carries its remote id, unit id,
    ///   position and update date
    /// - A fully successful push leaves the tree marked up to date
    ///
    /// # Errors
    /// - `Unauthenticated`: no user session
    /// - `UserDeclined`: wrapping top-level lessons of a mixed course was
    ///   declined
    /// - `NotFound`: the published course no longer exists remotely
    /// - `Forbidden`: the user may not edit the published course
    /// - Any failure creating or updating the course itself
    ///
    /// Cancellation is not an error: the report comes back with
    /// [`SyncStatus::Cancelled`](crate::SyncStatus::Cancelled).
    pub async fn sync(&self, course: &mut Course) -> Result<SyncReport> {
        let started = Instant::now();
        let mut report = SyncReport::new();

        let outcome = match decide(course.id) {
            NodeAction::Create => self.publish(course, &mut report).await,
            NodeAction::Update | NodeAction::Skip => self.update(course, &mut report).await,
        };

        self.finish(course, report, outcome, started)
    }

    /// Forget every remote identity of the course and publish it again.
    pub async fn republish_as_new(&self, course: &mut Course) -> Result<SyncReport> {
        info!(
            "Publishing '{}' (previously course {}) as a new course",
            course.name, course.id
        );
        course.convert_to_local();
        self.sync(course).await
    }

    /// Re-upload only the course's additional files.
    ///
    /// # Preconditions
    /// - The course is published
    ///
    /// # Errors
    /// - `InvalidInput` if the course was never published
    /// - `Unauthenticated` or any failure of the upload
    pub async fn update_additional_materials(&self, course: &mut Course) -> Result<SyncReport> {
        let started = Instant::now();
        let action = "update additional materials";
        let title = "Failed to update additional materials";

        if !course.is_pushed() {
            return Err(Error::InvalidInput(format!(
                "Course '{}' is not published",
                course.name
            )));
        }
        if let Err(e) = self.ensure_logged_in(action) {
            self.notify_error(title, action, &e);
            return Err(e);
        }

        self.progress.set_text("Updating additional materials");
        let mut report = SyncReport::new();
        let result = self
            .gateway
            .update_attachment(&course.additional_files, course.id)
            .await;
        if let Err(e) = result {
            self.notify_error(title, action, &e);
            return Err(e);
        }
        report.updated += 1;

        let url = self.config.course_url(course.id);
        self.notify.notify(
            Notification::info(
                "Additional materials updated",
                format!("{} additional files uploaded", course.additional_files.len()),
            )
            .with_action(FollowUp::OpenOnRemote(url)),
        );

        self.finish(course, report, Ok(()), started)
    }

    /// Push a single top-level item of a published course.
    ///
    /// A section is pushed with all its lessons; a top-level lesson goes
    /// into the course's lesson section, which is created if needed. A new
    /// lesson of a course with sections is wrapped into its own section
    /// first, after confirmation.
    ///
    /// # Errors
    /// - `InvalidInput` if the course is not published or has no item at
    ///   `index`
    /// - `UserDeclined` if wrapping a new lesson was declined
    /// - `Unauthenticated` if no user session is available
    pub async fn push_item(&self, course: &mut Course, index: usize) -> Result<SyncReport> {
        let started = Instant::now();

        if !course.is_pushed() {
            return Err(Error::InvalidInput(format!(
                "Course '{}' must be published before single items",
                course.name
            )));
        }
        let (is_lesson, needs_wrap) = match course.items.get(index) {
            Some(StudyItem::Lesson(lesson)) => (true, course.has_sections() && !lesson.is_pushed()),
            Some(StudyItem::Section(_)) => (false, false),
            None => {
                return Err(Error::InvalidInput(format!(
                    "Course '{}' has no item {}",
                    course.name, index
                )))
            }
        };
        // A new lesson next to sections becomes a section in its own place.
        if needs_wrap {
            if !self.confirm.confirm(WrapPrompt::BeforeUpdate) {
                info!("Push of item {} of '{}' declined", index, course.name);
                return Err(Error::UserDeclined(
                    "wrap the lesson into a section".to_string(),
                ));
            }
            course.wrap_unpushed_lessons_into_sections();
        }
        let is_lesson = is_lesson && !needs_wrap;
        if let Err(e) = self.ensure_logged_in("push item") {
            self.notify_error("Failed to push item", "push item", &e);
            return Err(e);
        }

        let mut report = SyncReport::new();
        let outcome = if is_lesson {
            self.push_single_lesson(course, index, &mut report).await
        } else {
            self.push_single_section(course, index, &mut report).await
        };

        self.finish(course, report, outcome, started)
    }

    fn finish(
        &self,
        course: &Course,
        mut report: SyncReport,
        outcome: Result<()>,
        started: Instant,
    ) -> Result<SyncReport> {
        report.course_id = course.id;
        report.duration = started.elapsed();

        match outcome {
            Ok(()) => {
                info!(
                    "Pushed '{}' in {:?}: {} created, {} updated, {} deleted, {} failed",
                    course.name,
                    report.duration,
                    report.created,
                    report.updated,
                    report.deleted,
                    report.failures.len()
                );
                Ok(report)
            }
            Err(Error::Cancelled) => {
                warn!("Push of '{}' cancelled", course.name);
                report.cancelled = true;
                Ok(report)
            }
            Err(e) => Err(e),
        }
    }

    async fn publish(&self, course: &mut Course, report: &mut SyncReport) -> Result<()> {
        let title = "Failed to publish course";

        if course.has_mixed_top_level() {
            if !self.confirm.confirm(WrapPrompt::BeforePublish) {
                info!("Publication of '{}' declined", course.name);
                return Err(Error::UserDeclined(
                    "wrap top-level lessons into sections".to_string(),
                ));
            }
            course.wrap_unpushed_lessons_into_sections();
        }

        if let Err(e) = self.ensure_logged_in("post course") {
            self.notify_error(title, "post course", &e);
            return Err(e);
        }

        self.progress.set_text(&format!("Publishing course '{}'", course.name));

        let user = match self.gateway.current_user().await {
            Ok(user) => user,
            Err(e) => {
                warn!("Could not fetch the current user: {}", e);
                None
            }
        };
        if let Some(user) = &user {
            course.authors = vec![merge_author(user, &course.authors)];
        }
        course.course_mode = self.config.course_mode.clone();

        let created = self.guarded("post course", self.gateway.create_course(course)).await;
        let remote = match created {
            Ok(remote) => remote,
            Err(e) => {
                self.notify_error(title, "post course", &e);
                return Err(e);
            }
        };
        info!("Created course '{}' with id {}", course.name, remote.id);
        course.id = remote.id;
        course.update_date = remote.update_date;
        course.admins_group = remote.admins_group.clone();
        course.section_ids.clear();
        report.created += 1;

        self.grant_admin(&remote, user.as_ref().map_or(0, |u| u.id)).await;

        self.push_structure(course, report).await?;
        self.push_attachment(course, report, false).await;

        if report.failures.is_empty() {
            course.set_status_recursively(ChangeStatus::UpToDate);
        }
        self.notify_done(course, report, "Course published");
        Ok(())
    }

    async fn update(&self, course: &mut Course, report: &mut SyncReport) -> Result<()> {
        let title = "Failed to update course";

        if course.has_mixed_top_level() && course.has_unpushed_top_level_lessons() {
            if !self.confirm.confirm(WrapPrompt::BeforeUpdate) {
                info!("Update of '{}' declined", course.name);
                return Err(Error::UserDeclined(
                    "wrap new top-level lessons into sections".to_string(),
                ));
            }
            course.wrap_unpushed_lessons_into_sections();
        }

        if let Err(e) = self.ensure_logged_in("update course") {
            self.notify_error(title, "update course", &e);
            return Err(e);
        }

        self.progress.set_text(&format!("Updating course '{}'", course.name));

        let fetched = self.gateway.get_course_info(course.id).await;
        let info = match fetched {
            Ok(info) => info,
            Err(e) if e.is_not_found() => {
                self.notify.notify(
                    Notification::error(
                        title,
                        format!(
                            "Course {} no longer exists on {}",
                            course.id,
                            self.gateway.name()
                        ),
                    )
                    .with_action(FollowUp::RepublishAsNew),
                );
                return Err(e);
            }
            Err(e) => {
                self.notify_error(title, "fetch course", &e);
                return Err(e);
            }
        };

        course.is_public = info.is_public;
        course.is_compatible = info.is_compatible;
        if course.admins_group.is_none() {
            course.admins_group = info.admins_group;
        }

        let updated = self.guarded("update course", self.gateway.update_course(course)).await;
        if let Err(e) = updated {
            self.notify_error(title, "update course", &e);
            return Err(e);
        }
        report.updated += 1;

        self.delete_orphaned_section(course, report).await;
        self.push_structure(course, report).await?;
        self.push_attachment(course, report, true).await;

        if report.failures.is_empty() {
            course.set_status_recursively(ChangeStatus::UpToDate);
        }
        course.update_date = Some(Utc::now());
        self.notify_done(course, report, "Course updated");
        Ok(())
    }

    async fn grant_admin(&self, remote: &RemoteCourse, user_id: u64) {
        let Some(admin) = self.config.admin_account_id.as_deref() else {
            return;
        };
        if !self.config.grants_admin_for(user_id) {
            debug!("Not granting the admin role for user {}", user_id);
            return;
        }
        let Some(group) = remote.admins_group.as_deref() else {
            warn!("Course {} has no admins group", remote.id);
            return;
        };

        let result = self
            .guarded("add course admin", self.gateway.add_group_member(admin, group))
            .await;
        if let Err(e) = result {
            warn!("Failed to add {} to admins group {}: {}", admin, group, e);
        }
    }

    /// Delete the lesson section once the course holds sections only.
    async fn delete_orphaned_section(&self, course: &mut Course, report: &mut SyncReport) {
        if course.has_top_level_lessons() {
            return;
        }
        let Some(&orphan) = course.section_ids.first() else {
            return;
        };

        info!("Deleting section {} that held top-level lessons", orphan);
        let result = self
            .guarded("delete section", self.gateway.delete_section(orphan))
            .await;
        match result {
            Ok(()) => {
                report.deleted += 1;
                course.section_ids.clear();
            }
            Err(e) if e.is_not_found() => course.section_ids.clear(),
            Err(e) => {
                self.fail_node(report, NodeKind::Section, &orphan.to_string(), "delete section", &e)
            }
        }
    }

    /// Push every section, then every top-level lesson.
    async fn push_structure(&self, course: &mut Course, report: &mut SyncReport) -> Result<()> {
        let course_id = course.id;
        let mut position = u32::from(course.has_top_level_lessons());

        for section in course.sections_mut() {
            self.check_cancelled()?;
            position += 1;
            section.course_id = course_id;
            section.position = position;

            match decide(section.id) {
                NodeAction::Create => self.create_section(section, report).await?,
                NodeAction::Update | NodeAction::Skip => {
                    self.update_section(section, report).await?
                }
            }
        }

        if course.has_top_level_lessons() {
            let Some(section_id) = self.ensure_lesson_section(course, report).await? else {
                return Ok(());
            };
            let lessons: Vec<&mut Lesson> = course.lessons_mut().collect();
            self.push_lessons(lessons, section_id, report).await?;
        }
        Ok(())
    }

    /// Remote section holding the top-level lessons, created on demand.
    async fn ensure_lesson_section(
        &self,
        course: &mut Course,
        report: &mut SyncReport,
    ) -> Result<Option<u64>> {
        if let Some(&id) = course.section_ids.first() {
            return Ok(Some(id));
        }
        self.check_cancelled()?;

        let mut section = Section::new(course.name.clone());
        section.course_id = course.id;
        section.position = 1;

        let created = self
            .guarded("post section", self.gateway.create_section(&section))
            .await;
        match created {
            Ok(remote) => {
                debug!("Created section {} for top-level lessons", remote.id);
                course.section_ids = vec![remote.id];
                report.created += 1;
                Ok(Some(remote.id))
            }
            Err(e) => {
                self.fail_node(report, NodeKind::Section, &section.name, "post section", &e);
                Ok(None)
            }
        }
    }

    async fn push_single_section(
        &self,
        course: &mut Course,
        index: usize,
        report: &mut SyncReport,
    ) -> Result<()> {
        let course_id = course.id;
        let offset = u32::from(course.has_top_level_lessons());
        let preceding = count_sections(course.items.iter().take(index));

        let Some(StudyItem::Section(section)) = course.items.get_mut(index) else {
            return Err(Error::InvalidInput(format!("Item {} is not a section", index)));
        };
        section.course_id = course_id;
        section.position = offset + preceding + 1;

        self.check_cancelled()?;
        match decide(section.id) {
            NodeAction::Create => self.create_section(section, report).await,
            NodeAction::Update | NodeAction::Skip => self.update_section(section, report).await,
        }
    }

    async fn push_single_lesson(
        &self,
        course: &mut Course,
        index: usize,
        report: &mut SyncReport,
    ) -> Result<()> {
        let Some(section_id) = self.ensure_lesson_section(course, report).await? else {
            return Ok(());
        };
        let preceding = course
            .items
            .iter()
            .take(index)
            .filter(|item| matches!(item, StudyItem::Lesson(_)))
            .count() as u32;

        let Some(StudyItem::Lesson(lesson)) = course.items.get_mut(index) else {
            return Err(Error::InvalidInput(format!("Item {} is not a lesson", index)));
        };
        self.push_lesson(lesson, section_id, preceding + 1, report).await
    }

    async fn create_section(&self, section: &mut Section, report: &mut SyncReport) -> Result<()> {
        self.progress.set_text(&format!("Publishing section '{}'", section.name));

        let created = self
            .guarded("post section", self.gateway.create_section(section))
            .await;
        match created {
            Ok(remote) => {
                section.id = remote.id;
                section.update_date = remote.update_date;
                section.units = remote.units;
                report.created += 1;
            }
            Err(e) => {
                self.fail_node(report, NodeKind::Section, &section.name, "post section", &e);
                return Ok(());
            }
        }

        let section_id = section.id;
        self.push_lessons(section.lessons.iter_mut().collect(), section_id, report)
            .await
    }

    async fn update_section(&self, section: &mut Section, report: &mut SyncReport) -> Result<()> {
        self.progress.set_text(&format!("Updating section '{}'", section.name));
        section.units.clear();

        let updated = self
            .guarded("update section", self.gateway.update_section(section))
            .await;
        match updated {
            Ok(remote) => {
                section.update_date = remote.update_date;
                report.updated += 1;
            }
            Err(e) if e.is_not_found() => {
                info!("Section '{}' no longer exists remotely, creating it", section.name);
                section.id = 0;
                return self.create_section(section, report).await;
            }
            Err(e) => {
                self.fail_node(report, NodeKind::Section, &section.name, "update section", &e);
                return Ok(());
            }
        }

        let section_id = section.id;
        self.push_lessons(section.lessons.iter_mut().collect(), section_id, report)
            .await
    }

    /// Push lessons in order, reporting the fraction done after each.
    async fn push_lessons(
        &self,
        lessons: Vec<&mut Lesson>,
        section_id: u64,
        report: &mut SyncReport,
    ) -> Result<()> {
        let total = lessons.len();

        for (i, lesson) in lessons.into_iter().enumerate() {
            self.push_lesson(lesson, section_id, i as u32 + 1, report).await?;
            self.progress.set_fraction((i + 1) as f64 / total as f64);
        }
        Ok(())
    }

    async fn push_lesson(
        &self,
        lesson: &mut Lesson,
        section_id: u64,
        position: u32,
        report: &mut SyncReport,
    ) -> Result<()> {
        self.check_cancelled()?;
        lesson.index = position;

        match decide(lesson.id) {
            NodeAction::Create => self.create_lesson(lesson, section_id, report).await,
            NodeAction::Update | NodeAction::Skip => {
                self.update_lesson(lesson, section_id, report).await
            }
        }
    }

    /// Create a lesson, place it, then create all of its tasks.
    async fn create_lesson(
        &self,
        lesson: &mut Lesson,
        section_id: u64,
        report: &mut SyncReport,
    ) -> Result<()> {
        self.progress.set_text(&format!("Publishing lesson '{}'", lesson.name));

        let created = self
            .guarded("post lesson", self.gateway.create_lesson(lesson))
            .await;
        let remote = match created {
            Ok(remote) => remote,
            Err(e) => {
                self.fail_node(report, NodeKind::Lesson, &lesson.name, "post lesson", &e);
                return Ok(());
            }
        };
        lesson.id = remote.id;
        lesson.update_date = remote.update_date;
        report.created += 1;

        self.create_unit(lesson, section_id, report).await;

        // Remote tasks of a lesson that no longer exists are gone with it.
        for task in &mut lesson.tasks {
            task.id = 0;
        }
        self.push_tasks(lesson, report).await
    }

    /// Update a lesson, its placement and its task list.
    async fn update_lesson(
        &self,
        lesson: &mut Lesson,
        section_id: u64,
        report: &mut SyncReport,
    ) -> Result<()> {
        self.progress.set_text(&format!("Updating lesson '{}'", lesson.name));

        let updated = self
            .guarded("update lesson", self.gateway.update_lesson(lesson))
            .await;
        let remote = match updated {
            Ok(remote) => remote,
            Err(e) if e.is_not_found() => {
                info!("Lesson '{}' no longer exists remotely, creating it", lesson.name);
                lesson.id = 0;
                lesson.unit_id = 0;
                return self.create_lesson(lesson, section_id, report).await;
            }
            Err(e) => {
                self.fail_node(report, NodeKind::Lesson, &lesson.name, "update lesson", &e);
                return Ok(());
            }
        };
        lesson.update_date = remote.update_date;
        report.updated += 1;

        self.place_lesson(lesson, section_id, report).await;

        let local = lesson.local_task_ids();
        for task_id in stale_remote_tasks(&remote.steps, &local) {
            self.check_cancelled()?;
            let deleted = self
                .guarded("delete task", self.gateway.delete_task(task_id))
                .await;
            match deleted {
                Ok(()) => {
                    debug!("Deleted task {} of lesson '{}'", task_id, lesson.name);
                    report.deleted += 1;
                }
                Err(e) if e.is_not_found() => debug!("Task {} is already gone", task_id),
                Err(e) => self.fail_node(
                    report,
                    NodeKind::Task,
                    &format!("#{}", task_id),
                    "delete task",
                    &e,
                ),
            }
        }

        self.push_tasks(lesson, report).await
    }

    async fn create_unit(&self, lesson: &mut Lesson, section_id: u64, report: &mut SyncReport) {
        let placement = UnitPlacement {
            lesson_id: lesson.id,
            section_id,
            position: lesson.index,
        };

        let created = self
            .guarded("post unit", self.gateway.create_unit(placement))
            .await;
        match created {
            Ok(unit) => {
                lesson.unit_id = unit.id;
                report.created += 1;
            }
            Err(e) => self.fail_node(report, NodeKind::Lesson, &lesson.name, "post unit", &e),
        }
    }

    /// Move an existing lesson's unit, recreating it if it was lost.
    async fn place_lesson(&self, lesson: &mut Lesson, section_id: u64, report: &mut SyncReport) {
        if lesson.unit_id == 0 {
            self.create_unit(lesson, section_id, report).await;
            return;
        }

        let placement = UnitPlacement {
            lesson_id: lesson.id,
            section_id,
            position: lesson.index,
        };
        let updated = self
            .guarded("update unit", self.gateway.update_unit(lesson.unit_id, placement))
            .await;
        match updated {
            Ok(_) => report.updated += 1,
            Err(e) if e.is_not_found() => {
                debug!("Unit {} is gone, placing lesson '{}' again", lesson.unit_id, lesson.name);
                lesson.unit_id = 0;
                self.create_unit(lesson, section_id, report).await;
            }
            Err(e) => self.fail_node(report, NodeKind::Lesson, &lesson.name, "update unit", &e),
        }
    }

    async fn push_tasks(&self, lesson: &mut Lesson, report: &mut SyncReport) -> Result<()> {
        let lesson_id = lesson.id;

        for (i, task) in lesson.tasks.iter_mut().enumerate() {
            self.check_cancelled()?;
            let position = i as u32 + 1;

            match decide_task(task, &self.config.excluded_task_kinds) {
                NodeAction::Skip => debug!("Skipping {} task '{}'", task.kind, task.name),
                NodeAction::Create => self.create_task(task, lesson_id, position, report).await,
                NodeAction::Update => self.update_task(task, lesson_id, position, report).await,
            }
        }
        Ok(())
    }

    async fn create_task(
        &self,
        task: &mut Task,
        lesson_id: u64,
        position: u32,
        report: &mut SyncReport,
    ) {
        let created = self
            .guarded("post task", self.gateway.create_task(task, lesson_id, position))
            .await;
        match created {
            Ok(remote) => {
                task.id = remote.id;
                task.update_date = remote.update_date;
                report.created += 1;
            }
            Err(e) => self.fail_node(report, NodeKind::Task, &task.name, "post task", &e),
        }
    }

    async fn update_task(
        &self,
        task: &mut Task,
        lesson_id: u64,
        position: u32,
        report: &mut SyncReport,
    ) {
        let updated = self
            .guarded("update task", self.gateway.update_task(task, lesson_id, position))
            .await;
        match updated {
            Ok(_) => {
                report.updated += 1;
                match self.gateway.get_task_info(task.id).await {
                    Ok(info) => task.update_date = info.update_date,
                    Err(e) => warn!("Could not refresh task '{}': {}", task.name, e),
                }
            }
            Err(e) if e.is_not_found() => {
                info!("Task '{}' no longer exists remotely, creating it", task.name);
                task.id = 0;
                self.create_task(task, lesson_id, position, report).await;
            }
            Err(e) => self.fail_node(report, NodeKind::Task, &task.name, "update task", &e),
        }
    }

    async fn push_attachment(&self, course: &Course, report: &mut SyncReport, replace: bool) {
        let (action, result) = if replace {
            let action = "update additional files";
            let call = self
                .gateway
                .update_attachment(&course.additional_files, course.id);
            (action, self.guarded(action, call).await)
        } else {
            let action = "post additional files";
            let call = self
                .gateway
                .create_attachment(&course.additional_files, course.id);
            (action, self.guarded(action, call).await)
        };

        match result {
            Ok(()) if replace => report.updated += 1,
            Ok(()) => report.created += 1,
            Err(e) => self.fail_node(report, NodeKind::Attachment, &course.name, action, &e),
        }
    }

    /// Run a mutating call only if a user session is available.
    async fn guarded<T>(
        &self,
        action: &str,
        call: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        self.ensure_logged_in(action)?;
        call.await
    }

    fn ensure_logged_in(&self, action: &str) -> Result<()> {
        if self.auth.is_logged_in() {
            Ok(())
        } else {
            Err(Error::Unauthenticated(action.to_string()))
        }
    }

    fn check_cancelled(&self) -> Result<()> {
        if self.progress.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }

    fn notify_error(&self, title: &str, action: &str, error: &Error) {
        let notification = match error {
            Error::Unauthenticated(_) => Notification::error(
                title,
                format!("Log in to {} to {}", self.gateway.name(), action),
            )
            .with_action(FollowUp::LogIn),
            Error::Forbidden(_) => Notification::error(
                title,
                format!("You are not allowed to {}. Publish the course as new instead.", action),
            )
            .with_action(FollowUp::RepublishAsNew),
            other => Notification::error(title, format!("Could not {}: {}", action, other)),
        };
        self.notify.notify(notification);
    }

    fn fail_node(
        &self,
        report: &mut SyncReport,
        kind: NodeKind,
        name: &str,
        action: &str,
        error: &Error,
    ) {
        error!("Failed to {} for {} '{}': {}", action, kind, name, error);
        self.notify_error(&format!("Failed to push {} '{}'", kind, name), action, error);
        report.record_failure(NodeFailure::new(kind, name, error));
    }

    fn notify_done(&self, course: &Course, report: &SyncReport, title: &str) {
        let url = self.config.course_url(course.id);
        let message = if report.failures.is_empty() {
            format!("'{}' is available at {}", course.name, url)
        } else {
            format!(
                "'{}' is available at {}, {} items failed to push",
                course.name,
                url,
                report.failures.len()
            )
        };
        self.notify
            .notify(Notification::info(title, message).with_action(FollowUp::OpenOnRemote(url)));
    }
}

/// The publishing user, named after the last declared author if any.
fn merge_author(user: &Author, declared: &[Author]) -> Author {
    let mut author = user.clone();
    if let Some(last) = declared.last() {
        if !last.first_name.is_empty() {
            author.first_name = last.first_name.clone();
        }
        if !last.last_name.is_empty() {
            author.last_name = last.last_name.clone();
        }
    }
    author
}

fn count_sections<'a>(items: impl Iterator<Item = &'a StudyItem>) -> u32 {
    items
        .filter(|item| matches!(item, StudyItem::Section(_)))
        .count() as u32
}
