//! Wire types for devices, pushes, ephemerals, and account resources.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A device registered on the account.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct Device {
    pub iden: String,
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub created: f64,
    #[serde(default)]
    pub modified: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manufacturer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub push_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_version: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default)]
    pub has_sms: bool,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default)]
    pub pushable: bool,
}

impl Device {
    /// Human label: the nickname, else "manufacturer model".
    pub fn display_name(&self) -> String {
        if let Some(nickname) = self.nickname.as_deref().filter(|n| !n.is_empty()) {
            return nickname.to_string();
        }
        [self.manufacturer.as_deref(), self.model.as_deref()]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Attributes for a device being registered.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct NewDevice {
    pub nickname: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manufacturer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub push_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_version: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub has_sms: Option<bool>,
}

impl NewDevice {
    pub fn named(nickname: impl Into<String>) -> Self {
        Self {
            nickname: nickname.into(),
            ..Self::default()
        }
    }
}

/// Partial device update.
///
/// Only fields set to `Some` are sent; those are the only writable fields.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct DeviceUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manufacturer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub push_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_version: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub has_sms: Option<bool>,
}

impl DeviceUpdate {
    pub fn is_empty(&self) -> bool {
        self.nickname.is_none()
            && self.model.is_none()
            && self.manufacturer.is_none()
            && self.push_token.is_none()
            && self.app_version.is_none()
            && self.icon.is_none()
            && self.has_sms.is_none()
    }
}

/// Push type. Types this crate does not model are kept verbatim.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PushKind {
    Note,
    Link,
    List,
    Address,
    File,
    Other(String),
}

impl PushKind {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Note => "note",
            Self::Link => "link",
            Self::List => "list",
            Self::Address => "address",
            Self::File => "file",
            Self::Other(kind) => kind,
        }
    }
}

impl From<String> for PushKind {
    fn from(value: String) -> Self {
        match value.as_str() {
            "note" => Self::Note,
            "link" => Self::Link,
            "list" => Self::List,
            "address" => Self::Address,
            "file" => Self::File,
            _ => Self::Other(value),
        }
    }
}

impl From<PushKind> for String {
    fn from(value: PushKind) -> Self {
        match value {
            PushKind::Other(kind) => kind,
            known => known.as_str().to_string(),
        }
    }
}

impl Default for PushKind {
    fn default() -> Self {
        Self::Note
    }
}

/// Entry of a list push. Freshly created lists echo plain strings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ListItem {
    Entry {
        text: String,
        #[serde(default)]
        checked: bool,
    },
    Plain(String),
}

impl ListItem {
    pub fn text(&self) -> &str {
        match self {
            Self::Entry { text, .. } | Self::Plain(text) => text,
        }
    }
}

/// A durable push from the account's history or the realtime stream.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct Push {
    #[serde(default)]
    pub iden: String,
    #[serde(default, rename = "type")]
    pub kind: PushKind,
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub dismissed: bool,
    /// Creation time; present on objects the server has persisted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<f64>,
    #[serde(default)]
    pub modified: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<ListItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_device_iden: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_device_iden: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_iden: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receiver_email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_iden: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_iden: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guid: Option<String>,
    /// Server fields not modelled above.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Push {
    /// Whether the server acknowledged this object as persisted.
    pub fn is_created(&self) -> bool {
        self.created.is_some()
    }
}

/// A transient notification mirror or dismissal.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct Ephemeral {
    #[serde(default, rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_user_iden: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_device_iden: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notification_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notification_tag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub application_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default)]
    pub dismissible: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Ephemeral {
    pub const MIRROR: &'static str = "mirror";
    pub const DISMISSAL: &'static str = "dismissal";

    pub fn is_mirror(&self) -> bool {
        self.kind == Self::MIRROR
    }

    /// Builds the dismissal record that clears this notification elsewhere.
    pub fn dismissal(&self) -> Ephemeral {
        Ephemeral {
            kind: Self::DISMISSAL.to_string(),
            package_name: self.package_name.clone(),
            source_user_iden: self.source_user_iden.clone(),
            notification_id: self.notification_id.clone(),
            notification_tag: self.notification_tag.clone(),
            ..Ephemeral::default()
        }
    }
}

/// Descriptor returned by the upload-request endpoint.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct UploadRequest {
    pub upload_url: String,
    pub file_url: String,
    #[serde(default)]
    pub file_name: String,
    #[serde(default)]
    pub file_type: String,
    /// Form fields the upload target expects alongside the file.
    #[serde(default)]
    pub data: BTreeMap<String, String>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct Contact {
    pub iden: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub email_normalized: String,
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub created: f64,
    #[serde(default)]
    pub modified: f64,
}

/// The authenticated account.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub iden: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub email_normalized: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default)]
    pub created: f64,
    #[serde(default)]
    pub modified: f64,
}

/// One page of a cursor-paginated listing.
#[derive(Clone, Debug, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Opaque cursor for the next page; `None` once exhausted.
    pub cursor: Option<String>,
}
