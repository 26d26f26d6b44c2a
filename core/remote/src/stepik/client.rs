//! Stepik REST API client.

use chrono::{DateTime, Utc};
use reqwest::{header, multipart, Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::debug;
use url::Url;

use coursesync_common::{Error, Result};

/// Default API root of the public platform.
pub const STEPIK_API_URL: &str = "https://stepik.org/api";

/// Name of the course attachment holding additional files.
pub const ADDITIONAL_FILES_NAME: &str = "additional_files.json";

/// A REST collection: path segment plus the wrapper key used in bodies.
#[derive(Debug, Clone, Copy)]
pub struct Collection {
    /// Path segment and response key, e.g. `courses`.
    pub plural: &'static str,
    /// Request wrapper key, e.g. `course`.
    pub singular: &'static str,
}

pub const COURSES: Collection = Collection {
    plural: "courses",
    singular: "course",
};
pub const SECTIONS: Collection = Collection {
    plural: "sections",
    singular: "section",
};
pub const LESSONS: Collection = Collection {
    plural: "lessons",
    singular: "lesson",
};
pub const UNITS: Collection = Collection {
    plural: "units",
    singular: "unit",
};
pub const STEP_SOURCES: Collection = Collection {
    plural: "step-sources",
    singular: "stepSource",
};
pub const MEMBERS: Collection = Collection {
    plural: "members",
    singular: "member",
};
pub const ATTACHMENTS: Collection = Collection {
    plural: "attachments",
    singular: "attachment",
};

/// Course as sent to and returned by the platform.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CourseData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub language: String,
    #[serde(default)]
    pub course_format: String,
    #[serde(default, skip_serializing)]
    pub is_public: bool,
    #[serde(default = "default_true", skip_serializing)]
    pub is_idea_compatible: bool,
    #[serde(default, deserialize_with = "string_or_number", skip_serializing)]
    pub admins_group: Option<String>,
    #[serde(default, skip_serializing)]
    pub sections: Vec<u64>,
    #[serde(default, skip_serializing)]
    pub update_date: Option<DateTime<Utc>>,
}

/// Section as sent to and returned by the platform.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SectionData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub course: u64,
    #[serde(default)]
    pub position: u32,
    #[serde(default, skip_serializing)]
    pub units: Vec<u64>,
    #[serde(default, skip_serializing)]
    pub update_date: Option<DateTime<Utc>>,
}

/// Lesson as sent to and returned by the platform.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LessonData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing)]
    pub steps: Vec<u64>,
    #[serde(default, skip_serializing)]
    pub update_date: Option<DateTime<Utc>>,
}

/// Unit as sent to and returned by the platform.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UnitData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    pub lesson: u64,
    pub section: u64,
    pub position: u32,
}

/// Task payload inside a step source.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StepBlock {
    /// Block type, the task kind for platform-native steps.
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub text: String,
    /// Full task description in the course file format.
    #[serde(default)]
    pub options: Value,
}

/// Step source (a task) as sent to and returned by the platform.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StepSourceData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    #[serde(default)]
    pub lesson: u64,
    #[serde(default)]
    pub position: u32,
    #[serde(default)]
    pub block: StepBlock,
    #[serde(default, skip_serializing)]
    pub update_date: Option<DateTime<Utc>>,
}

/// Group membership request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberData {
    pub group: String,
    pub user: String,
}

/// Platform user.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserData {
    pub id: u64,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
}

#[derive(Debug, Deserialize)]
struct StepicsResponse {
    #[serde(default)]
    users: Vec<UserData>,
}

/// Course attachment listing entry.
#[derive(Debug, Clone, Deserialize)]
pub struct AttachmentData {
    pub id: u64,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Deserialize)]
struct AttachmentsResponse {
    #[serde(default)]
    attachments: Vec<AttachmentData>,
}

fn default_true() -> bool {
    true
}

/// Group ids arrive as numbers from some endpoints and strings from others.
fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// Stepik REST API client.
///
/// Every request body wraps the object under its singular name
/// (`{"lesson": {...}}`) and every response lists objects under the
/// plural name (`{"lessons": [...]}`).
pub struct StepikClient {
    http: Client,
    api_url: String,
    token: Option<String>,
}

impl StepikClient {
    /// Create a new client.
    ///
    /// # Errors
    /// - `api_url` is not a valid URL
    /// - HTTP client cannot be built
    pub fn new(api_url: &str, token: Option<String>) -> Result<Self> {
        Url::parse(api_url)
            .map_err(|e| Error::InvalidInput(format!("Invalid API URL '{}': {}", api_url, e)))?;

        let http = Client::builder()
            .user_agent("CourseSync/0.1")
            .build()
            .map_err(|e| Error::Network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http,
            api_url: api_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    /// Whether the client carries an access token.
    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.api_url, path)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.header(header::AUTHORIZATION, format!("Bearer {}", token)),
            None => request,
        }
    }

    /// Fetch one object by id.
    pub async fn fetch<R: DeserializeOwned>(&self, collection: Collection, id: u64) -> Result<R> {
        let url = self.url(&format!("{}/{}", collection.plural, id));
        debug!("GET {}", url);

        let response = self
            .authorize(self.http.get(&url))
            .send()
            .await
            .map_err(|e| Error::Network(format!("Failed to get {}: {}", collection.singular, e)))?;

        let body: Value = handle_response(response).await?;
        first_of(body, collection)
    }

    /// Create an object.
    pub async fn create<T: Serialize, R: DeserializeOwned>(
        &self,
        collection: Collection,
        object: &T,
    ) -> Result<R> {
        let url = self.url(collection.plural);
        debug!("POST {}", url);

        let response = self
            .authorize(self.http.post(&url))
            .json(&wrap(collection, object)?)
            .send()
            .await
            .map_err(|e| {
                Error::Network(format!("Failed to create {}: {}", collection.singular, e))
            })?;

        let body: Value = handle_response(response).await?;
        first_of(body, collection)
    }

    /// Replace an object.
    pub async fn update<T: Serialize, R: DeserializeOwned>(
        &self,
        collection: Collection,
        id: u64,
        object: &T,
    ) -> Result<R> {
        let url = self.url(&format!("{}/{}", collection.plural, id));
        debug!("PUT {}", url);

        let response = self
            .authorize(self.http.put(&url))
            .json(&wrap(collection, object)?)
            .send()
            .await
            .map_err(|e| {
                Error::Network(format!("Failed to update {}: {}", collection.singular, e))
            })?;

        let body: Value = handle_response(response).await?;
        first_of(body, collection)
    }

    /// Delete an object.
    pub async fn delete(&self, collection: Collection, id: u64) -> Result<()> {
        let url = self.url(&format!("{}/{}", collection.plural, id));
        debug!("DELETE {}", url);

        let response = self
            .authorize(self.http.delete(&url))
            .send()
            .await
            .map_err(|e| {
                Error::Network(format!("Failed to delete {}: {}", collection.singular, e))
            })?;

        check_status(response).await.map(|_| ())
    }

    /// The logged-in user, if the platform reports one.
    pub async fn current_user(&self) -> Result<Option<UserData>> {
        let url = self.url("stepics/1");

        let response = self
            .authorize(self.http.get(&url))
            .send()
            .await
            .map_err(|e| Error::Network(format!("Failed to get current user: {}", e)))?;

        let body: StepicsResponse = handle_response(response).await?;
        Ok(body.users.into_iter().next())
    }

    /// Attachments of a course.
    pub async fn list_attachments(&self, course_id: u64) -> Result<Vec<AttachmentData>> {
        let url = self.url(ATTACHMENTS.plural);

        let response = self
            .authorize(self.http.get(&url))
            .query(&[("course", course_id.to_string())])
            .send()
            .await
            .map_err(|e| Error::Network(format!("Failed to list attachments: {}", e)))?;

        let body: AttachmentsResponse = handle_response(response).await?;
        Ok(body.attachments)
    }

    /// Upload a file as a course attachment.
    pub async fn upload_attachment(
        &self,
        course_id: u64,
        name: &str,
        content: String,
    ) -> Result<()> {
        let url = self.url(ATTACHMENTS.plural);
        debug!("Uploading attachment {} for course {}", name, course_id);

        let part = multipart::Part::text(content)
            .file_name(name.to_string())
            .mime_str("application/json")
            .map_err(|e| Error::InvalidInput(format!("Invalid attachment type: {}", e)))?;
        let form = multipart::Form::new()
            .text("course", course_id.to_string())
            .part("file", part);

        let response = self
            .authorize(self.http.post(&url))
            .multipart(form)
            .send()
            .await
            .map_err(|e| Error::Network(format!("Failed to upload attachment: {}", e)))?;

        check_status(response).await.map(|_| ())
    }
}

fn wrap<T: Serialize>(collection: Collection, object: &T) -> Result<Value> {
    let mut body = serde_json::Map::new();
    body.insert(collection.singular.to_string(), serde_json::to_value(object)?);
    Ok(Value::Object(body))
}

/// Take the first object listed under the collection's plural key.
fn first_of<R: DeserializeOwned>(mut body: Value, collection: Collection) -> Result<R> {
    let first = body
        .get_mut(collection.plural)
        .and_then(|list| list.as_array_mut())
        .filter(|list| !list.is_empty())
        .map(|list| list.swap_remove(0))
        .ok_or_else(|| {
            Error::NotFound(format!("Response lists no {}", collection.plural))
        })?;

    serde_json::from_value(first).map_err(|e| {
        Error::Serialization(format!("Invalid {} in response: {}", collection.singular, e))
    })
}

/// Map a non-2xx status to the error callers branch on.
async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();

    if status.is_success() {
        Ok(response)
    } else if status == StatusCode::NOT_FOUND {
        Err(Error::NotFound("Resource not found".to_string()))
    } else if status == StatusCode::UNAUTHORIZED {
        Err(Error::Unauthenticated("Invalid or expired token".to_string()))
    } else if status == StatusCode::FORBIDDEN {
        Err(Error::Forbidden("Access denied".to_string()))
    } else {
        let body = response.text().await.unwrap_or_default();
        Err(Error::Network(format!("API error: {} - {}", status, body)))
    }
}

async fn handle_response<T: DeserializeOwned>(response: Response) -> Result<T> {
    check_status(response)
        .await?
        .json()
        .await
        .map_err(|e| Error::Network(format!("Failed to parse response: {}", e)))
}
