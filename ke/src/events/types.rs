//! Event payload types for KGSM instance lifecycle events
//!
//! Every event names the instance it concerns. Most events are markers that
//! carry nothing else; a handful add blueprint, version, backup or lifecycle
//! details. The family is closed: [`EventKind`] has exactly one member per wire
//! tag and [`EventPayload`] one variant per kind.

use std::fmt;

use serde::de::{self, DeserializeOwned, Deserializer, Unexpected, Visitor};
use serde::{Deserialize, Serialize, Serializer};

/// How an instance's server process is supervised
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleManager {
    /// Process started directly by KGSM
    Standalone,
    /// Process managed by a systemd unit
    Systemd,
}

impl LifecycleManager {
    /// Wire names, in ordinal order
    pub const NAMES: &'static [&'static str] = &["standalone", "systemd"];

    /// Lowercase wire name
    pub fn as_str(self) -> &'static str {
        match self {
            LifecycleManager::Standalone => "standalone",
            LifecycleManager::Systemd => "systemd",
        }
    }

    /// Parse a member name, ignoring case and surrounding whitespace
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        if name.eq_ignore_ascii_case("standalone") {
            Some(LifecycleManager::Standalone)
        } else if name.eq_ignore_ascii_case("systemd") {
            Some(LifecycleManager::Systemd)
        } else {
            None
        }
    }

    /// Map a numeric ordinal (0 = standalone, 1 = systemd)
    pub fn from_ordinal(ordinal: u64) -> Option<Self> {
        match ordinal {
            0 => Some(LifecycleManager::Standalone),
            1 => Some(LifecycleManager::Systemd),
            _ => None,
        }
    }
}

impl fmt::Display for LifecycleManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for LifecycleManager {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for LifecycleManager {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct LifecycleManagerVisitor;

        impl Visitor<'_> for LifecycleManagerVisitor {
            type Value = LifecycleManager;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a lifecycle manager name (standalone, systemd) or its ordinal")
            }

            fn visit_str<E: de::Error>(self, value: &str) -> Result<Self::Value, E> {
                LifecycleManager::from_name(value).ok_or_else(|| E::unknown_variant(value, LifecycleManager::NAMES))
            }

            fn visit_u64<E: de::Error>(self, value: u64) -> Result<Self::Value, E> {
                LifecycleManager::from_ordinal(value).ok_or_else(|| E::invalid_value(Unexpected::Unsigned(value), &self))
            }

            fn visit_i64<E: de::Error>(self, value: i64) -> Result<Self::Value, E> {
                u64::try_from(value)
                    .ok()
                    .and_then(LifecycleManager::from_ordinal)
                    .ok_or_else(|| E::invalid_value(Unexpected::Signed(value), &self))
            }
        }

        deserializer.deserialize_any(LifecycleManagerVisitor)
    }
}

/// A typed event payload that handlers can be registered for
///
/// Implemented for every payload struct in this module; the association with
/// [`EventKind`] is what the dispatcher routes on.
pub trait Event: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// The kind (and therefore wire tag) this payload belongs to
    const KIND: EventKind;

    /// Unwrap the erased payload if it is this variant
    fn from_payload(payload: EventPayload) -> Option<Self>;

    /// Wrap into the erased payload
    fn into_payload(self) -> EventPayload;

    /// Name of the instance the event concerns
    fn instance_name(&self) -> &str;
}

macro_rules! marker_events {
    ($($(#[$meta:meta])* $name:ident),* $(,)?) => {
        $(
            $(#[$meta])*
            #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
            pub struct $name {
                pub instance_name: String,
            }
        )*
    };
}

marker_events! {
    /// Instance directories were created
    InstanceDirectoriesCreated,
    /// Instance files were created
    InstanceFilesCreated,
    /// Server download started
    InstanceDownloadStarted,
    /// Server download finished
    InstanceDownloadFinished,
    /// Server files are downloaded
    InstanceDownloaded,
    /// Deployment started
    InstanceDeployStarted,
    /// Deployment finished
    InstanceDeployFinished,
    /// Instance is deployed
    InstanceDeployed,
    /// Update started
    InstanceUpdateStarted,
    /// Update finished
    InstanceUpdateFinished,
    /// Instance is updated
    InstanceUpdated,
    /// Instance files were removed
    InstanceFilesRemoved,
    /// Instance directories were removed
    InstanceDirectoriesRemoved,
    /// Instance was removed
    InstanceRemoved,
    /// Uninstall started
    InstanceUninstallStarted,
    /// Uninstall finished
    InstanceUninstallFinished,
    /// Instance is uninstalled
    InstanceUninstalled,
}

/// An instance was created from a blueprint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceCreated {
    pub instance_name: String,
    #[serde(default)]
    pub blueprint: String,
}

/// The installed server version changed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceVersionUpdated {
    pub instance_name: String,
    #[serde(default)]
    pub old_version: String,
    #[serde(default)]
    pub new_version: String,
}

/// Installation from a blueprint started
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceInstallationStarted {
    pub instance_name: String,
    #[serde(default)]
    pub blueprint: String,
}

/// Installation from a blueprint finished
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceInstallationFinished {
    pub instance_name: String,
    #[serde(default)]
    pub blueprint: String,
}

/// Instance is installed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceInstalled {
    pub instance_name: String,
    #[serde(default)]
    pub blueprint: String,
}

/// Server process started
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceStarted {
    pub instance_name: String,
    pub lifecycle_manager: LifecycleManager,
}

/// Server process stopped
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceStopped {
    pub instance_name: String,
    pub lifecycle_manager: LifecycleManager,
}

/// A backup was taken
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceBackupCreated {
    pub instance_name: String,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub version: String,
}

/// A backup was restored
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceBackupRestored {
    pub instance_name: String,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub version: String,
}

macro_rules! event_catalogue {
    ($($variant:ident => $tag:literal),* $(,)?) => {
        /// Discriminant of the closed event family, one per wire tag
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum EventKind {
            $($variant),*
        }

        impl EventKind {
            /// Every kind, in wire-table order
            pub const ALL: &'static [EventKind] = &[$(EventKind::$variant),*];

            /// Wire tag carried in the envelope's `event_type`
            pub fn tag(self) -> &'static str {
                match self {
                    $(EventKind::$variant => $tag),*
                }
            }

            /// Payload type name, for logs
            pub fn name(self) -> &'static str {
                match self {
                    $(EventKind::$variant => stringify!($variant)),*
                }
            }
        }

        /// A decoded event of any kind
        #[derive(Debug, Clone, PartialEq, Eq)]
        pub enum EventPayload {
            $($variant($variant)),*
        }

        impl EventPayload {
            /// Kind of the wrapped payload
            pub fn kind(&self) -> EventKind {
                match self {
                    $(EventPayload::$variant(_) => EventKind::$variant),*
                }
            }

            /// Name of the instance the event concerns
            pub fn instance_name(&self) -> &str {
                match self {
                    $(EventPayload::$variant(event) => &event.instance_name),*
                }
            }

            pub(crate) fn from_value(kind: EventKind, data: serde_json::Value) -> Result<Self, serde_json::Error> {
                match kind {
                    $(EventKind::$variant => serde_json::from_value::<$variant>(data).map(EventPayload::$variant)),*
                }
            }

            /// Serialize the payload's fields as a JSON object
            pub fn to_value(&self) -> Result<serde_json::Value, serde_json::Error> {
                match self {
                    $(EventPayload::$variant(event) => serde_json::to_value(event)),*
                }
            }
        }

        $(
            impl Event for $variant {
                const KIND: EventKind = EventKind::$variant;

                fn from_payload(payload: EventPayload) -> Option<Self> {
                    match payload {
                        EventPayload::$variant(event) => Some(event),
                        _ => None,
                    }
                }

                fn into_payload(self) -> EventPayload {
                    EventPayload::$variant(self)
                }

                fn instance_name(&self) -> &str {
                    &self.instance_name
                }
            }

            impl From<$variant> for EventPayload {
                fn from(event: $variant) -> Self {
                    EventPayload::$variant(event)
                }
            }
        )*
    };
}

event_catalogue! {
    InstanceCreated => "instance_created",

    InstanceDirectoriesCreated => "instance_directories_created",
    InstanceFilesCreated => "instance_files_created",

    InstanceDownloadStarted => "instance_download_started",
    InstanceDownloadFinished => "instance_download_finished",
    InstanceDownloaded => "instance_downloaded",

    InstanceDeployStarted => "instance_deploy_started",
    InstanceDeployFinished => "instance_deploy_finished",
    InstanceDeployed => "instance_deployed",

    InstanceUpdateStarted => "instance_update_started",
    InstanceUpdateFinished => "instance_update_finished",
    InstanceUpdated => "instance_updated",

    InstanceVersionUpdated => "instance_version_updated",

    InstanceInstallationStarted => "instance_installation_started",
    InstanceInstallationFinished => "instance_installation_finished",
    InstanceInstalled => "instance_installed",

    InstanceStarted => "instance_started",
    InstanceStopped => "instance_stopped",

    InstanceBackupCreated => "instance_backup_created",
    InstanceBackupRestored => "instance_backup_restored",

    InstanceFilesRemoved => "instance_files_removed",
    InstanceDirectoriesRemoved => "instance_directories_removed",

    InstanceRemoved => "instance_removed",

    InstanceUninstallStarted => "instance_uninstall_started",
    InstanceUninstallFinished => "instance_uninstall_finished",
    InstanceUninstalled => "instance_uninstalled",
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}
