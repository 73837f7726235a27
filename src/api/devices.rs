use serde::Deserialize;

use super::models::{Device, DeviceUpdate, NewDevice, Page};
use super::{collect_pages, resource_path, ApiClient, ApiError};

#[derive(Debug, Deserialize)]
struct DevicesResponse {
    #[serde(default)]
    devices: Vec<Device>,
    #[serde(default)]
    cursor: Option<String>,
}

impl ApiClient {
    pub async fn create_device(&self, device: &NewDevice) -> Result<Device, ApiError> {
        if device.nickname.trim().is_empty() {
            return Err(ApiError::validation("device nickname must not be empty"));
        }
        self.post("/devices", device).await
    }

    pub async fn get_device(&self, iden: &str) -> Result<Device, ApiError> {
        self.get(&resource_path("devices", iden)?, &[]).await
    }

    /// Lists every device on the account, following cursors.
    pub async fn list_devices(&self) -> Result<Vec<Device>, ApiError> {
        collect_pages(None, None, |cursor, _| async move {
            let params: Vec<(&str, String)> = cursor.into_iter().map(|c| ("cursor", c)).collect();
            let response: DevicesResponse = self.get("/devices", &params).await?;
            Ok(Page {
                items: response.devices,
                cursor: response.cursor.filter(|cursor| !cursor.is_empty()),
            })
        })
        .await
    }

    /// Sends only the fields set on `update`.
    pub async fn update_device(
        &self,
        iden: &str,
        update: &DeviceUpdate,
    ) -> Result<Device, ApiError> {
        let path = resource_path("devices", iden)?;
        if update.is_empty() {
            return Err(ApiError::validation("device update has no fields set"));
        }
        if update
            .nickname
            .as_deref()
            .is_some_and(|nickname| nickname.trim().is_empty())
        {
            return Err(ApiError::validation("device nickname must not be empty"));
        }
        self.post(&path, update).await
    }

    pub async fn delete_device(&self, iden: &str) -> Result<(), ApiError> {
        self.delete(&resource_path("devices", iden)?).await
    }
}
