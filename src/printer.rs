//! The slice of printer state the lighting controllers react to.
//!
//! The printer process publishes `(property, value)` change notifications.
//! Each zone keeps a [`PrinterSnapshot`] and folds those events into it.

use serde::{Deserialize, Serialize};

pub const PROPERTY_STATE: &str = "state";
pub const PROPERTY_JOB_STATE: &str = "job_state";
pub const PROPERTY_INTERACTION_REQUIRED: &str = "interaction_required";

#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub enum PrinterState {
    #[default]
    Booting,
    Idle,
    Printing,
    Paused,
    Error,
    Maintenance,
    Other(String),
}

impl From<&str> for PrinterState {
    fn from(s: &str) -> Self {
        match s {
            "booting" => Self::Booting,
            "idle" => Self::Idle,
            "printing" => Self::Printing,
            "paused" => Self::Paused,
            "error" => Self::Error,
            "maintenance" => Self::Maintenance,
            other => Self::Other(other.to_string()),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub enum JobState {
    #[default]
    None,
    Printing,
    Paused,
    WaitCleanup,
    Other(String),
}

impl From<&str> for JobState {
    fn from(s: &str) -> Self {
        match s {
            "none" | "" => Self::None,
            "printing" => Self::Printing,
            "paused" => Self::Paused,
            "wait_cleanup" => Self::WaitCleanup,
            other => Self::Other(other.to_string()),
        }
    }
}

/// Value carried by a property change notification.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl PropertyValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Booleans as-is, numbers by non-zero, text by `"true"`.
    pub fn truthy(&self) -> bool {
        match self {
            Self::Bool(b) => *b,
            Self::Number(n) => *n != 0.0,
            Self::Text(s) => s == "true",
        }
    }
}

/// A change notification from the printer process.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PrinterEvent {
    pub property: String,
    pub value: PropertyValue,
}

impl PrinterEvent {
    pub fn new(property: &str, value: impl Into<PropertyValue>) -> Self {
        Self {
            property: property.to_string(),
            value: value.into(),
        }
    }
}

impl From<&str> for PropertyValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<bool> for PropertyValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

#[derive(Clone, Debug, PartialEq, Default)]
pub struct PrinterSnapshot {
    pub state: PrinterState,
    pub job_state: JobState,
    pub interaction_required: bool,
}

impl PrinterSnapshot {
    /// Fold one event into the snapshot. Returns true if a monitored
    /// property was updated; everything else is ignored.
    pub fn apply(&mut self, event: &PrinterEvent) -> bool {
        match event.property.as_str() {
            PROPERTY_STATE => match event.value.as_str() {
                Some(s) => {
                    self.state = s.into();
                    true
                }
                None => false,
            },
            PROPERTY_JOB_STATE => match event.value.as_str() {
                Some(s) => {
                    self.job_state = s.into();
                    true
                }
                None => false,
            },
            PROPERTY_INTERACTION_REQUIRED => {
                self.interaction_required = event.value.truthy();
                true
            }
            _ => false,
        }
    }

    pub fn is_printing(&self) -> bool {
        self.state == PrinterState::Printing
    }

    pub fn is_error(&self) -> bool {
        self.state == PrinterState::Error
    }
}
