//! Stepik gateway implementation.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};

use coursesync_common::{Error, Result};
use coursesync_model::{Author, Course, Lesson, Section, Task, TaskFile, TaskKind};

use crate::gateway::{
    AuthOracle, RemoteCourse, RemoteGateway, RemoteLesson, RemoteSection, RemoteTask, RemoteUnit,
    UnitPlacement,
};

use super::client::{
    CourseData, LessonData, MemberData, SectionData, StepBlock, StepSourceData, StepikClient,
    UnitData, ADDITIONAL_FILES_NAME, ATTACHMENTS, COURSES, LESSONS, MEMBERS, SECTIONS,
    STEPIK_API_URL, STEP_SOURCES, UNITS,
};

/// Stepik gateway configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepikConfig {
    /// API root, `https://stepik.org/api` by default.
    #[serde(default = "default_api_url")]
    pub api_url: String,
    /// OAuth access token of the logged-in user.
    #[serde(default)]
    pub token: Option<String>,
}

fn default_api_url() -> String {
    STEPIK_API_URL.to_string()
}

impl Default for StepikConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            token: None,
        }
    }
}

/// Gateway talking to a Stepik-compatible REST API.
///
/// A session is considered available when an access token is configured;
/// the platform still has the last word and answers 401 for a stale one.
pub struct StepikGateway {
    client: StepikClient,
}

impl StepikGateway {
    /// Create a new gateway.
    ///
    /// # Errors
    /// - Invalid API URL
    pub fn new(config: StepikConfig) -> Result<Self> {
        let client = StepikClient::new(&config.api_url, config.token)?;
        Ok(Self { client })
    }
}

/// Create a Stepik gateway from JSON configuration.
pub fn create_stepik_gateway(config: Value) -> Result<Arc<StepikGateway>> {
    let stepik_config: StepikConfig = if config.is_null() {
        StepikConfig::default()
    } else {
        serde_json::from_value(config)
            .map_err(|e| Error::InvalidInput(format!("Invalid Stepik config: {}", e)))?
    };

    Ok(Arc::new(StepikGateway::new(stepik_config)?))
}

/// Step block type the platform expects for a task kind.
fn block_name(kind: TaskKind) -> &'static str {
    match kind {
        TaskKind::Theory => "text",
        TaskKind::Choice => "choice",
        TaskKind::Code => "code",
        TaskKind::Edu | TaskKind::Output | TaskKind::Ide => "pycharm",
    }
}

fn course_data(course: &Course) -> CourseData {
    CourseData {
        id: course.is_pushed().then_some(course.id),
        title: course.name.clone(),
        summary: course.description.clone(),
        language: course.language.clone(),
        course_format: course.course_mode.clone(),
        ..CourseData::default()
    }
}

fn step_source(task: &Task, lesson_id: u64, position: u32) -> Result<StepSourceData> {
    Ok(StepSourceData {
        id: task.is_pushed().then_some(task.id),
        lesson: lesson_id,
        position,
        block: StepBlock {
            name: block_name(task.kind).to_string(),
            text: task.description_text.clone(),
            options: serde_json::to_value(task)?,
        },
        update_date: None,
    })
}

fn into_remote_course(data: CourseData) -> Result<RemoteCourse> {
    Ok(RemoteCourse {
        id: require_id(data.id, "course")?,
        update_date: data.update_date,
        is_public: data.is_public,
        is_compatible: data.is_idea_compatible,
        admins_group: data.admins_group,
        section_ids: data.sections,
    })
}

fn into_remote_section(data: SectionData) -> Result<RemoteSection> {
    Ok(RemoteSection {
        id: require_id(data.id, "section")?,
        update_date: data.update_date,
        units: data.units,
    })
}

fn into_remote_lesson(data: LessonData) -> Result<RemoteLesson> {
    Ok(RemoteLesson {
        id: require_id(data.id, "lesson")?,
        update_date: data.update_date,
        steps: data.steps,
    })
}

fn into_remote_unit(data: UnitData) -> Result<RemoteUnit> {
    Ok(RemoteUnit {
        id: require_id(data.id, "unit")?,
        lesson_id: data.lesson,
        section_id: data.section,
        position: data.position,
    })
}

fn into_remote_task(data: StepSourceData) -> Result<RemoteTask> {
    Ok(RemoteTask {
        id: require_id(data.id, "step source")?,
        update_date: data.update_date,
        position: data.position,
    })
}

fn require_id(id: Option<u64>, what: &str) -> Result<u64> {
    id.filter(|id| *id > 0)
        .ok_or_else(|| Error::Serialization(format!("Platform returned a {} without id", what)))
}

fn additional_files_json(files: &[TaskFile]) -> Result<String> {
    serde_json::to_string(files).map_err(Error::from)
}

impl AuthOracle for StepikGateway {
    fn is_logged_in(&self) -> bool {
        self.client.has_token()
    }
}

#[async_trait]
impl RemoteGateway for StepikGateway {
    fn name(&self) -> &str {
        "stepik"
    }

    async fn current_user(&self) -> Result<Option<Author>> {
        let user = self.client.current_user().await?;
        Ok(user.map(|u| Author {
            id: u.id,
            first_name: u.first_name,
            last_name: u.last_name,
        }))
    }

    async fn create_course(&self, course: &Course) -> Result<RemoteCourse> {
        let data: CourseData = self.client.create(COURSES, &course_data(course)).await?;
        let remote = into_remote_course(data)?;
        info!("Created course {} on Stepik", remote.id);
        Ok(remote)
    }

    async fn get_course_info(&self, course_id: u64) -> Result<RemoteCourse> {
        let data: CourseData = self.client.fetch(COURSES, course_id).await?;
        into_remote_course(data)
    }

    async fn update_course(&self, course: &Course) -> Result<RemoteCourse> {
        let data: CourseData = self
            .client
            .update(COURSES, course.id, &course_data(course))
            .await?;
        into_remote_course(data)
    }

    async fn create_section(&self, section: &Section) -> Result<RemoteSection> {
        let body = SectionData {
            title: section.name.clone(),
            course: section.course_id,
            position: section.position,
            ..SectionData::default()
        };
        let data: SectionData = self.client.create(SECTIONS, &body).await?;
        into_remote_section(data)
    }

    async fn update_section(&self, section: &Section) -> Result<RemoteSection> {
        let body = SectionData {
            id: Some(section.id),
            title: section.name.clone(),
            course: section.course_id,
            position: section.position,
            ..SectionData::default()
        };
        let data: SectionData = self.client.update(SECTIONS, section.id, &body).await?;
        into_remote_section(data)
    }

    async fn delete_section(&self, section_id: u64) -> Result<()> {
        self.client.delete(SECTIONS, section_id).await
    }

    async fn create_lesson(&self, lesson: &Lesson) -> Result<RemoteLesson> {
        let body = LessonData {
            title: lesson.name.clone(),
            ..LessonData::default()
        };
        let data: LessonData = self.client.create(LESSONS, &body).await?;
        into_remote_lesson(data)
    }

    async fn update_lesson(&self, lesson: &Lesson) -> Result<RemoteLesson> {
        let body = LessonData {
            id: Some(lesson.id),
            title: lesson.name.clone(),
            ..LessonData::default()
        };
        let data: LessonData = self.client.update(LESSONS, lesson.id, &body).await?;
        into_remote_lesson(data)
    }

    async fn delete_lesson(&self, lesson_id: u64) -> Result<()> {
        self.client.delete(LESSONS, lesson_id).await
    }

    async fn create_unit(&self, placement: UnitPlacement) -> Result<RemoteUnit> {
        let body = UnitData {
            id: None,
            lesson: placement.lesson_id,
            section: placement.section_id,
            position: placement.position,
        };
        let data: UnitData = self.client.create(UNITS, &body).await?;
        into_remote_unit(data)
    }

    async fn update_unit(&self, unit_id: u64, placement: UnitPlacement) -> Result<RemoteUnit> {
        let body = UnitData {
            id: Some(unit_id),
            lesson: placement.lesson_id,
            section: placement.section_id,
            position: placement.position,
        };
        let data: UnitData = self.client.update(UNITS, unit_id, &body).await?;
        into_remote_unit(data)
    }

    async fn create_task(&self, task: &Task, lesson_id: u64, position: u32) -> Result<RemoteTask> {
        let mut body = step_source(task, lesson_id, position)?;
        body.id = None;
        let data: StepSourceData = self.client.create(STEP_SOURCES, &body).await?;
        into_remote_task(data)
    }

    async fn update_task(&self, task: &Task, lesson_id: u64, position: u32) -> Result<RemoteTask> {
        let body = step_source(task, lesson_id, position)?;
        let data: StepSourceData = self.client.update(STEP_SOURCES, task.id, &body).await?;
        into_remote_task(data)
    }

    async fn delete_task(&self, task_id: u64) -> Result<()> {
        self.client.delete(STEP_SOURCES, task_id).await
    }

    async fn get_task_info(&self, task_id: u64) -> Result<RemoteTask> {
        let data: StepSourceData = self.client.fetch(STEP_SOURCES, task_id).await?;
        into_remote_task(data)
    }

    async fn create_attachment(&self, files: &[TaskFile], course_id: u64) -> Result<()> {
        let content = additional_files_json(files)?;
        self.client
            .upload_attachment(course_id, ADDITIONAL_FILES_NAME, content)
            .await
    }

    async fn update_attachment(&self, files: &[TaskFile], course_id: u64) -> Result<()> {
        let existing = self.client.list_attachments(course_id).await?;
        for attachment in existing.iter().filter(|a| a.name == ADDITIONAL_FILES_NAME) {
            debug!("Removing stale attachment {}", attachment.id);
            self.client
                .delete(ATTACHMENTS, attachment.id)
                .await?;
        }

        self.create_attachment(files, course_id).await
    }

    async fn add_group_member(&self, user_id: &str, group_id: &str) -> Result<()> {
        let body = MemberData {
            group: group_id.to_string(),
            user: user_id.to_string(),
        };
        let _: Value = self.client.create(MEMBERS, &body).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn gateway_for(server: &MockServer) -> StepikGateway {
        StepikGateway::new(StepikConfig {
            api_url: server.uri(),
            token: Some("secret".to_string()),
        })
        .unwrap()
    }

    #[test]
    fn test_config_defaults() {
        let config: StepikConfig = serde_json::from_value(json!({})).unwrap();
        assert_eq!(config.api_url, STEPIK_API_URL);
        assert!(config.token.is_none());
    }

    #[test]
    fn test_logged_in_follows_token() {
        let anonymous = StepikGateway::new(StepikConfig::default()).unwrap();
        assert!(!anonymous.is_logged_in());

        let gateway = create_stepik_gateway(json!({"token": "t"})).unwrap();
        assert!(gateway.is_logged_in());
    }

    #[test]
    fn test_block_names() {
        assert_eq!(block_name(TaskKind::Edu), "pycharm");
        assert_eq!(block_name(TaskKind::Theory), "text");
        assert_eq!(block_name(TaskKind::Choice), "choice");
    }

    #[tokio::test]
    async fn test_create_task_posts_step_source() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/step-sources"))
            .and(body_partial_json(json!({
                "stepSource": {"lesson": 7, "position": 2, "block": {"name": "pycharm"}}
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "step-sources": [{"id": 70, "lesson": 7, "position": 2}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let gateway = gateway_for(&server);
        let task = Task::new("hello", TaskKind::Edu);
        let remote = gateway.create_task(&task, 7, 2).await.unwrap();

        assert_eq!(remote.id, 70);
        assert_eq!(remote.position, 2);
    }

    #[tokio::test]
    async fn test_update_lesson_reports_steps() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/lessons/5"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "lessons": [{"id": 5, "title": "L", "steps": [1, 2, 3]}]
            })))
            .mount(&server)
            .await;

        let gateway = gateway_for(&server);
        let remote = gateway.update_lesson(&Lesson::new("L").with_id(5)).await.unwrap();

        assert_eq!(remote.steps, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_get_course_info_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/courses/404"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let gateway = gateway_for(&server);
        let err = gateway.get_course_info(404).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_update_attachment_replaces_existing() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/attachments"))
            .and(query_param("course", "3"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "attachments": [
                    {"id": 11, "name": "additional_files.json"},
                    {"id": 12, "name": "slides.pdf"}
                ]
            })))
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/attachments/11"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/attachments/12"))
            .respond_with(ResponseTemplate::new(204))
            .expect(0)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/attachments"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"attachments": []})))
            .expect(1)
            .mount(&server)
            .await;

        let gateway = gateway_for(&server);
        let files = vec![TaskFile::new("notes.md", "# Notes")];
        gateway.update_attachment(&files, 3).await.unwrap();
    }

    #[tokio::test]
    async fn test_add_group_member() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/members"))
            .and(body_partial_json(json!({"member": {"group": "900", "user": "17813950"}})))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"members": [{"id": 1}]})))
            .expect(1)
            .mount(&server)
            .await;

        let gateway = gateway_for(&server);
        gateway.add_group_member("17813950", "900").await.unwrap();
    }
}
