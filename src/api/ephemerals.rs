use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use super::models::Ephemeral;
use super::{ApiClient, ApiError};

/// Envelope the ephemerals endpoint expects around every payload.
#[derive(Debug, Serialize)]
struct EphemeralEnvelope<'a, T: Serialize> {
    #[serde(rename = "type")]
    kind: &'static str,
    push: &'a T,
}

impl ApiClient {
    /// Posts a transient payload; nothing is persisted server-side.
    pub async fn send_ephemeral<T: Serialize>(&self, push: &T) -> Result<(), ApiError> {
        let envelope = EphemeralEnvelope { kind: "push", push };
        let _: Value = self.post("/ephemerals", &envelope).await?;
        Ok(())
    }

    /// Clears a mirrored notification on the account's other devices.
    pub async fn dismiss_ephemeral(&self, mirror: &Ephemeral) -> Result<(), ApiError> {
        if mirror.package_name.is_none() || mirror.notification_id.is_none() {
            return Err(ApiError::validation(
                "dismissal needs the mirror's package_name and notification_id",
            ));
        }
        debug!(
            event = "ephemeral_dismiss",
            package_name = mirror.package_name.as_deref().unwrap_or_default(),
            notification_id = mirror.notification_id.as_deref().unwrap_or_default()
        );
        self.send_ephemeral(&mirror.dismissal()).await
    }
}
