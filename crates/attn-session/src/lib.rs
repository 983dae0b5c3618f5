//! Replay session for classified attention data.
//!
//! Every subject replays its window sequence on a fixed cadence
//! (`SubjectTimeline`), publishing each label to all connected clients
//! (`Broadcaster`). A client may switch into the profile view of one subject:
//! dashboard updates of every other subject are then suppressed and the
//! client receives that subject's history frame by frame (`ProfileStreamer`).
//! Leaving the profile view resynchronizes the suppressed subjects' cursors.
//!
//! `Session` is the entry point for the connection layer.

pub mod broadcast;
pub mod clients;
pub mod config;
pub mod error;
pub mod profile;
pub mod session;
pub mod state;
pub mod timeline;

pub use broadcast::{Broadcaster, PublishReport};
pub use clients::{ClientMode, ClientRegistry};
pub use config::{ProfileCursorMode, SessionConfig};
pub use error::{SessionError, SessionResult};
pub use profile::{ProfileStreamer, ProfileTasks, StreamExit};
pub use session::Session;
pub use state::{
    ResyncReport, SessionSnapshot, SessionState, SubjectSnapshot, TickOutcome, ViewMode,
};
pub use timeline::{SubjectTimeline, TimelineExit};
