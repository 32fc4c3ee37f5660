//! Client → Relay Control Messages

use serde::{Deserialize, Serialize};

/// Signal-processor stage toggles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterSettings {
    /// High-pass
    pub hp: bool,
    /// Notch
    pub no: bool,
    /// Low-pass
    pub tp: bool,
    /// Adaptive mean
    pub am: bool,
}

impl Default for FilterSettings {
    fn default() -> Self {
        Self {
            hp: true,
            no: true,
            tp: true,
            am: true,
        }
    }
}

impl FilterSettings {
    /// Apply a partial update, leaving absent toggles unchanged
    pub fn apply(&mut self, update: &FilterUpdate) {
        if let Some(hp) = update.hp {
            self.hp = hp;
        }
        if let Some(no) = update.no {
            self.no = no;
        }
        if let Some(tp) = update.tp {
            self.tp = tp;
        }
        if let Some(am) = update.am {
            self.am = am;
        }
    }
}

/// Partial filter toggle update
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterUpdate {
    #[serde(default)]
    pub hp: Option<bool>,
    #[serde(default)]
    pub no: Option<bool>,
    #[serde(default)]
    pub tp: Option<bool>,
    #[serde(default)]
    pub am: Option<bool>,
}

/// Requests a client may send to the relay
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ControlRequest {
    #[serde(rename = "set_filters")]
    SetFilters(FilterUpdate),
    #[serde(rename = "clear_buffer")]
    ClearBuffer,
    #[serde(rename = "request_status")]
    RequestStatus,
}

/// Relay status with its current buffer contents
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusReply {
    pub status: String,
    pub filters: FilterSettings,
    /// Samples held by the relay, published or not
    #[serde(default)]
    pub buffered: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<crate::SnapshotPayload>,
}

/// Replies to a [`ControlRequest`], sent only to the requesting client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ControlReply {
    #[serde(rename = "filters")]
    Filters(FilterSettings),
    #[serde(rename = "cleared")]
    Cleared,
    #[serde(rename = "ecg_status")]
    Status(StatusReply),
}
