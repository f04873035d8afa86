use serde::{Deserialize, Serialize};

use crate::records::{Role, UserRecord};

/// Which surface a connection wants after identifying.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum View {
    #[default]
    Viewer,
    Admin,
}

/// Commands sent FROM client TO server over the gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayCommand {
    /// Must be the first command on a connection.
    Identify {
        username: String,
        #[serde(default)]
        view: View,
    },

    /// Submit a video URL in the viewer.
    OpenVideo { url: String },

    /// Request elevated access with the shared secret key.
    Elevate { key: String },
}

/// Events sent FROM server TO client over the gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayEvent {
    /// Identify accepted.
    Ready { username: String, role: Role },

    /// A watch-time record changed. Viewers receive their own record;
    /// admin connections receive every record.
    RecordUpdate { record: UserRecord },

    /// Initial snapshot of all records for an admin connection.
    AllRecords { records: Vec<UserRecord> },

    /// A submitted URL resolved to a video; playback may start.
    VideoOpened { video_id: String, embed_url: String },

    /// The daily limit has been reached. Terminal for this session:
    /// no further accrual ticks are issued.
    LimitReached {},

    /// Elevated access granted for a limited time.
    Elevated { expires_in_secs: u64 },

    /// The elevated grant expired; the connection closes and the user
    /// must re-authenticate.
    ElevationExpired {},

    /// Admin view requested without authorization.
    AccessDenied { message: String },

    /// A user-facing failure. Shared state is unchanged.
    Error { message: String },
}
