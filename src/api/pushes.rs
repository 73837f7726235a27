use serde::{Deserialize, Serialize};

use super::models::{Page, Push};
use super::{collect_pages, resource_path, ApiClient, ApiError};

/// Where a push is delivered. No target means every device on the account.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PushTarget {
    #[serde(rename = "device_iden")]
    Device(String),
    #[serde(rename = "email")]
    Email(String),
    #[serde(rename = "channel_tag")]
    Channel(String),
    #[serde(rename = "client_iden")]
    Client(String),
}

/// Loose target fields as a caller collects them (e.g. from CLI flags).
///
/// [`Targets::resolve`] enforces that at most one is set.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Targets {
    pub device_iden: Option<String>,
    pub email: Option<String>,
    pub channel_tag: Option<String>,
    pub client_iden: Option<String>,
}

impl Targets {
    pub fn resolve(&self) -> Result<Option<PushTarget>, ApiError> {
        let mut set = Vec::new();
        if let Some(value) = &self.device_iden {
            set.push(("device_iden", PushTarget::Device(value.trim().to_string())));
        }
        if let Some(value) = &self.email {
            set.push(("email", PushTarget::Email(value.trim().to_string())));
        }
        if let Some(value) = &self.channel_tag {
            set.push(("channel_tag", PushTarget::Channel(value.trim().to_string())));
        }
        if let Some(value) = &self.client_iden {
            set.push(("client_iden", PushTarget::Client(value.trim().to_string())));
        }

        if set.len() > 1 {
            let fields: Vec<&str> = set.iter().map(|(field, _)| *field).collect();
            return Err(ApiError::validation(format!(
                "at most one push target may be set, got {}",
                fields.join(", ")
            )));
        }

        match set.pop() {
            None => Ok(None),
            Some((field, target)) if target.value().is_empty() => {
                Err(ApiError::validation(format!("{field} must not be empty")))
            }
            Some((_, target)) => Ok(Some(target)),
        }
    }
}

impl PushTarget {
    pub fn value(&self) -> &str {
        match self {
            Self::Device(value)
            | Self::Email(value)
            | Self::Channel(value)
            | Self::Client(value) => value,
        }
    }
}

/// Type-specific push payload.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PushContent {
    Note {
        #[serde(skip_serializing_if = "Option::is_none")]
        title: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        body: Option<String>,
    },
    Link {
        #[serde(skip_serializing_if = "Option::is_none")]
        title: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        body: Option<String>,
        url: String,
    },
    List {
        title: String,
        items: Vec<String>,
    },
    Address {
        #[serde(skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        address: String,
    },
    File {
        file_name: String,
        file_type: String,
        file_url: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        body: Option<String>,
    },
}

impl PushContent {
    fn validate(&self) -> Result<(), ApiError> {
        match self {
            Self::Note { title, body } => {
                if is_blank(title) && is_blank(body) {
                    return Err(ApiError::validation("a note needs a title or a body"));
                }
            }
            Self::Link { url, .. } => require("url", url)?,
            Self::List { title, .. } => require("list title", title)?,
            Self::Address { address, .. } => require("address", address)?,
            Self::File {
                file_name,
                file_type,
                file_url,
                ..
            } => {
                require("file_name", file_name)?;
                require("file_type", file_type)?;
                require("file_url", file_url)?;
            }
        }
        Ok(())
    }
}

/// A validated push ready to be created.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct NewPush {
    #[serde(flatten)]
    content: PushContent,
    #[serde(flatten)]
    target: Option<PushTarget>,
    #[serde(skip_serializing_if = "Option::is_none")]
    source_device_iden: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    guid: Option<String>,
}

impl NewPush {
    pub fn new(content: PushContent, target: Option<PushTarget>) -> Result<Self, ApiError> {
        let push = Self {
            content,
            target,
            source_device_iden: None,
            guid: None,
        };
        push.validate()?;
        Ok(push)
    }

    pub fn content(&self) -> &PushContent {
        &self.content
    }

    pub fn target(&self) -> Option<&PushTarget> {
        self.target.as_ref()
    }

    fn validate(&self) -> Result<(), ApiError> {
        self.content.validate()?;
        if let Some(target) = &self.target {
            if target.value().trim().is_empty() {
                return Err(ApiError::validation("push target must not be empty"));
            }
        }
        Ok(())
    }
}

/// Fluent construction of a [`NewPush`].
#[derive(Clone, Debug)]
pub struct PushBuilder {
    content: PushContent,
    targets: Targets,
    source_device_iden: Option<String>,
    guid: Option<String>,
}

impl PushBuilder {
    pub fn note(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self::from_content(PushContent::Note {
            title: non_empty(title.into()),
            body: non_empty(body.into()),
        })
    }

    pub fn link(title: impl Into<String>, url: impl Into<String>) -> Self {
        Self::from_content(PushContent::Link {
            title: non_empty(title.into()),
            body: None,
            url: url.into(),
        })
    }

    pub fn list<I, S>(title: impl Into<String>, items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::from_content(PushContent::List {
            title: title.into(),
            items: items.into_iter().map(Into::into).collect(),
        })
    }

    pub fn address(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self::from_content(PushContent::Address {
            name: non_empty(name.into()),
            address: address.into(),
        })
    }

    pub fn from_content(content: PushContent) -> Self {
        Self {
            content,
            targets: Targets::default(),
            source_device_iden: None,
            guid: None,
        }
    }

    /// Sets the message body on notes, links, and files; ignored otherwise.
    pub fn body(mut self, text: impl Into<String>) -> Self {
        let text = non_empty(text.into());
        match &mut self.content {
            PushContent::Note { body, .. }
            | PushContent::Link { body, .. }
            | PushContent::File { body, .. } => *body = text,
            PushContent::List { .. } | PushContent::Address { .. } => {}
        }
        self
    }

    pub fn device(mut self, iden: impl Into<String>) -> Self {
        self.targets.device_iden = Some(iden.into());
        self
    }

    pub fn email(mut self, email: impl Into<String>) -> Self {
        self.targets.email = Some(email.into());
        self
    }

    pub fn channel(mut self, tag: impl Into<String>) -> Self {
        self.targets.channel_tag = Some(tag.into());
        self
    }

    pub fn client(mut self, iden: impl Into<String>) -> Self {
        self.targets.client_iden = Some(iden.into());
        self
    }

    pub fn targets(mut self, targets: Targets) -> Self {
        self.targets = targets;
        self
    }

    pub fn source_device(mut self, iden: impl Into<String>) -> Self {
        self.source_device_iden = Some(iden.into());
        self
    }

    /// Client-chosen unique id the server echoes back, for de-duplication.
    pub fn guid(mut self, guid: impl Into<String>) -> Self {
        self.guid = Some(guid.into());
        self
    }

    pub fn build(self) -> Result<NewPush, ApiError> {
        let target = self.targets.resolve()?;
        let mut push = NewPush::new(self.content, target)?;
        push.source_device_iden = self.source_device_iden;
        push.guid = self.guid;
        Ok(push)
    }
}

/// Filters and paging for history listings.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PushQuery {
    /// Only pushes with `modified` strictly greater than this.
    pub modified_after: Option<f64>,
    pub active: Option<bool>,
    /// Resume from an opaque cursor returned by an earlier page.
    pub cursor: Option<String>,
    /// Items requested per page.
    pub page_size: Option<usize>,
    /// Total cap across pages for [`ApiClient::list_pushes`].
    pub limit: Option<usize>,
}

impl PushQuery {
    pub fn modified_after(modified_after: f64) -> Self {
        Self {
            modified_after: Some(modified_after),
            ..Self::default()
        }
    }

    fn params(
        &self,
        cursor: Option<&str>,
        page_size: Option<usize>,
    ) -> Vec<(&'static str, String)> {
        let mut params = Vec::new();
        if let Some(modified_after) = self.modified_after {
            params.push(("modified_after", modified_after.to_string()));
        }
        if let Some(active) = self.active {
            params.push(("active", active.to_string()));
        }
        if let Some(cursor) = cursor {
            params.push(("cursor", cursor.to_string()));
        }
        if let Some(page_size) = page_size {
            params.push(("limit", page_size.to_string()));
        }
        params
    }
}

/// The only writable push field.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dismissed: Option<bool>,
}

impl PushUpdate {
    pub fn is_empty(&self) -> bool {
        self.dismissed.is_none()
    }
}

#[derive(Debug, Deserialize)]
struct PushesResponse {
    #[serde(default)]
    pushes: Vec<Push>,
    #[serde(default)]
    cursor: Option<String>,
}

impl ApiClient {
    pub async fn create_push(&self, push: &NewPush) -> Result<Push, ApiError> {
        push.validate()?;
        self.post("/pushes", push).await
    }

    pub async fn get_push(&self, iden: &str) -> Result<Push, ApiError> {
        self.get(&resource_path("pushes", iden)?, &[]).await
    }

    /// Fetches exactly one page, honouring `query.cursor` and `query.page_size`.
    pub async fn list_pushes_page(&self, query: &PushQuery) -> Result<Page<Push>, ApiError> {
        let params = query.params(query.cursor.as_deref(), query.page_size);
        let response: PushesResponse = self.get("/pushes", &params).await?;
        Ok(Page {
            items: response.pushes,
            cursor: response.cursor.filter(|cursor| !cursor.is_empty()),
        })
    }

    /// Follows cursors until exhausted or `query.limit` pushes are collected.
    ///
    /// Items keep the server's order (newest `modified` first).
    pub async fn list_pushes(&self, query: &PushQuery) -> Result<Vec<Push>, ApiError> {
        collect_pages(query.limit, query.cursor.clone(), |cursor, remaining| {
            let page_size = match (query.page_size, remaining) {
                (Some(size), Some(left)) => Some(size.min(left)),
                (size, left) => size.or(left),
            };
            let page_query = PushQuery {
                cursor,
                page_size,
                ..query.clone()
            };
            async move { self.list_pushes_page(&page_query).await }
        })
        .await
    }

    /// Most recently modified push, if the account has any.
    pub async fn latest_push(&self) -> Result<Option<Push>, ApiError> {
        let query = PushQuery {
            limit: Some(1),
            ..PushQuery::default()
        };
        Ok(self.list_pushes(&query).await?.into_iter().next())
    }

    pub async fn update_push(&self, iden: &str, update: &PushUpdate) -> Result<Push, ApiError> {
        let path = resource_path("pushes", iden)?;
        if update.is_empty() {
            return Err(ApiError::validation("push update has no fields set"));
        }
        self.post(&path, update).await
    }

    pub async fn dismiss_push(&self, iden: &str) -> Result<Push, ApiError> {
        self.update_push(
            iden,
            &PushUpdate {
                dismissed: Some(true),
            },
        )
        .await
    }

    pub async fn delete_push(&self, iden: &str) -> Result<(), ApiError> {
        self.delete(&resource_path("pushes", iden)?).await
    }
}

fn non_empty(value: String) -> Option<String> {
    (!value.trim().is_empty()).then_some(value)
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map_or(true, |value| value.trim().is_empty())
}

fn require(field: &str, value: &str) -> Result<(), ApiError> {
    if value.trim().is_empty() {
        return Err(ApiError::validation(format!("{field} must not be empty")));
    }
    Ok(())
}
