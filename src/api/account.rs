use serde::Deserialize;

use super::models::{Contact, Page, User};
use super::{collect_pages, resource_path, ApiClient, ApiError};

#[derive(Debug, Deserialize)]
struct ContactsResponse {
    #[serde(default)]
    contacts: Vec<Contact>,
    #[serde(default)]
    cursor: Option<String>,
}

impl ApiClient {
    /// The account that owns the API key.
    pub async fn current_user(&self) -> Result<User, ApiError> {
        self.get("/users/me", &[]).await
    }

    pub async fn list_contacts(&self) -> Result<Vec<Contact>, ApiError> {
        collect_pages(None, None, |cursor, _| async move {
            let params: Vec<(&str, String)> = cursor.into_iter().map(|c| ("cursor", c)).collect();
            let response: ContactsResponse = self.get("/contacts", &params).await?;
            Ok(Page {
                items: response.contacts,
                cursor: response.cursor.filter(|cursor| !cursor.is_empty()),
            })
        })
        .await
    }

    pub async fn delete_contact(&self, iden: &str) -> Result<(), ApiError> {
        self.delete(&resource_path("contacts", iden)?).await
    }
}
