//! Session state and view-mode control.
//!
//! All shared mutable session data lives behind one lock:
//! - per-subject replay cursor, current label and `last_delivered` index
//! - the global suppression set and the active profile subject
//! - per-client profile cursors (only in `ProfileCursorMode::PerClient`)
//!
//! Every operation here is synchronous and completes inside a single critical
//! section, so a tick's broadcast decision is always consistent with the view
//! mode at the moment the tick is taken. The lock is never held across an
//! `.await`.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use attn_core::{AttentionLevel, ClientId, SubjectId, WindowSequence};
use parking_lot::Mutex;
use serde::Serialize;

use crate::config::ProfileCursorMode;
use crate::error::{SessionError, SessionResult};

/// Replay state of one subject.
#[derive(Debug)]
struct SubjectEntry {
    windows: WindowSequence,
    /// Next window to tick. `0 <= cursor`; may exceed `windows.len()` only
    /// after an unclamped resynchronization.
    cursor: usize,
    current_label: AttentionLevel,
    /// Highest window index handed out (by a tick or a profile frame).
    last_delivered: Option<usize>,
}

impl SubjectEntry {
    fn new(windows: WindowSequence) -> Self {
        Self {
            windows,
            cursor: 0,
            current_label: AttentionLevel::default(),
            last_delivered: None,
        }
    }
}

#[derive(Debug)]
struct SessionInner {
    subjects: BTreeMap<SubjectId, SubjectEntry>,
    suppressed: BTreeSet<SubjectId>,
    active_profile: Option<SubjectId>,
    client_cursors: HashMap<(SubjectId, ClientId), usize>,
}

impl SessionInner {
    fn entry(&self, subject: SubjectId) -> SessionResult<&SubjectEntry> {
        self.subjects
            .get(&subject)
            .ok_or(SessionError::UnknownSubject(subject))
    }

    fn broadcast_allowed(&self, subject: SubjectId) -> bool {
        !self.suppressed.contains(&subject) && self.active_profile != Some(subject)
    }
}

/// Global view mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", content = "subject", rename_all = "snake_case")]
pub enum ViewMode {
    /// No profile view active.
    AllDashboard,
    /// Exactly one subject is being profiled.
    OneProfileActive(SubjectId),
}

/// Result of one completed tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickOutcome {
    pub subject: SubjectId,
    /// 0-based window index that was just computed.
    pub index: usize,
    pub label: AttentionLevel,
    /// Whether the update should be published to dashboards.
    pub broadcast: bool,
}

/// Cursor resynchronization performed when a profile view ends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResyncReport {
    /// The subject whose profile view ended.
    pub profile_subject: SubjectId,
    /// Its cursor at the moment of the stop.
    pub target_cursor: usize,
    /// `(subject, old cursor, new cursor)` for every resynchronized subject.
    pub resynced: Vec<(SubjectId, usize, usize)>,
}

/// Point-in-time view of one subject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubjectSnapshot {
    pub id: SubjectId,
    pub cursor: usize,
    pub total_windows: usize,
    pub attention_level: AttentionLevel,
    pub last_delivered: Option<usize>,
    pub suppressed: bool,
}

/// Point-in-time view of the whole session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSnapshot {
    pub mode: ViewMode,
    pub active_profile: Option<SubjectId>,
    pub subjects: Vec<SubjectSnapshot>,
}

/// Shared handle to the session state.
#[derive(Clone)]
pub struct SessionState {
    inner: Arc<Mutex<SessionInner>>,
    resync_clamp: bool,
    profile_cursor: ProfileCursorMode,
}

impl SessionState {
    /// Create the session over a fixed set of subjects.
    pub fn new(
        subjects: impl IntoIterator<Item = (SubjectId, WindowSequence)>,
        resync_clamp: bool,
        profile_cursor: ProfileCursorMode,
    ) -> Self {
        let subjects = subjects
            .into_iter()
            .map(|(id, windows)| (id, SubjectEntry::new(windows)))
            .collect();
        Self {
            inner: Arc::new(Mutex::new(SessionInner {
                subjects,
                suppressed: BTreeSet::new(),
                active_profile: None,
                client_cursors: HashMap::new(),
            })),
            resync_clamp,
            profile_cursor,
        }
    }

    /// Subject ids in ascending order.
    pub fn subject_ids(&self) -> Vec<SubjectId> {
        self.inner.lock().subjects.keys().copied().collect()
    }

    pub fn contains(&self, subject: SubjectId) -> bool {
        self.inner.lock().subjects.contains_key(&subject)
    }

    /// The subject's label sequence.
    pub fn windows(&self, subject: SubjectId) -> SessionResult<WindowSequence> {
        Ok(self.inner.lock().entry(subject)?.windows.clone())
    }

    pub fn cursor(&self, subject: SubjectId) -> SessionResult<usize> {
        Ok(self.inner.lock().entry(subject)?.cursor)
    }

    pub fn current_label(&self, subject: SubjectId) -> SessionResult<AttentionLevel> {
        Ok(self.inner.lock().entry(subject)?.current_label)
    }

    pub fn last_delivered(&self, subject: SubjectId) -> SessionResult<Option<usize>> {
        Ok(self.inner.lock().entry(subject)?.last_delivered)
    }

    pub fn view_mode(&self) -> ViewMode {
        match self.inner.lock().active_profile {
            Some(subject) => ViewMode::OneProfileActive(subject),
            None => ViewMode::AllDashboard,
        }
    }

    pub fn suppressed(&self) -> BTreeSet<SubjectId> {
        self.inner.lock().suppressed.clone()
    }

    pub fn is_broadcast_allowed(&self, subject: SubjectId) -> bool {
        self.inner.lock().broadcast_allowed(subject)
    }

    /// Advance `subject` by one window.
    ///
    /// Returns `Ok(None)` once the cursor has reached the end of the sequence.
    pub fn tick(&self, subject: SubjectId) -> SessionResult<Option<TickOutcome>> {
        let mut inner = self.inner.lock();
        let broadcast = inner.broadcast_allowed(subject);
        let entry = inner
            .subjects
            .get_mut(&subject)
            .ok_or(SessionError::UnknownSubject(subject))?;

        let index = entry.cursor;
        let Some(label) = entry.windows.get(index) else {
            return Ok(None);
        };
        entry.current_label = label;
        entry.last_delivered = Some(index);
        entry.cursor += 1;

        Ok(Some(TickOutcome {
            subject,
            index,
            label,
            broadcast,
        }))
    }

    /// Current label of every subject, for a dashboard catch-up.
    pub fn dashboard_labels(&self) -> Vec<(SubjectId, AttentionLevel)> {
        self.inner
            .lock()
            .subjects
            .iter()
            .map(|(id, entry)| (*id, entry.current_label))
            .collect()
    }

    /// Drop the suppression set. The active profile subject, if any, stays.
    pub fn clear_suppression(&self) {
        self.inner.lock().suppressed.clear();
    }

    /// Make `subject` the active profile subject and suppress all others.
    ///
    /// Returns the previously active subject. Unknown subjects leave the state
    /// untouched.
    pub fn start_profile(&self, subject: SubjectId) -> SessionResult<Option<SubjectId>> {
        let mut inner = self.inner.lock();
        inner.entry(subject)?;

        let previous = inner.active_profile.replace(subject);
        let suppressed = inner
            .subjects
            .keys()
            .copied()
            .filter(|id| *id != subject)
            .collect();
        inner.suppressed = suppressed;
        Ok(previous)
    }

    /// End the profile view.
    ///
    /// Every suppressed subject's cursor is overwritten with the profile
    /// subject's cursor (clamped to its own length when `resync_clamp` is
    /// set), then suppression and the active subject are cleared. Returns
    /// `None` when no profile view was active.
    pub fn stop_profile(&self) -> Option<ResyncReport> {
        let mut inner = self.inner.lock();
        let profile_subject = inner.active_profile.take()?;
        let suppressed = std::mem::take(&mut inner.suppressed);
        let target_cursor = inner
            .subjects
            .get(&profile_subject)
            .map(|entry| entry.cursor)
            .unwrap_or(0);

        let mut resynced = Vec::with_capacity(suppressed.len());
        for id in suppressed {
            if let Some(entry) = inner.subjects.get_mut(&id) {
                let old = entry.cursor;
                entry.cursor = if self.resync_clamp {
                    target_cursor.min(entry.windows.len())
                } else {
                    target_cursor
                };
                resynced.push((id, old, entry.cursor));
            }
        }

        Some(ResyncReport {
            profile_subject,
            target_cursor,
            resynced,
        })
    }

    /// First window a new profile stream of `subject` for `client` delivers.
    pub fn profile_start_index(&self, subject: SubjectId, client: ClientId) -> SessionResult<usize> {
        let inner = self.inner.lock();
        let shared_next = inner.entry(subject)?.last_delivered.map_or(0, |i| i + 1);
        match self.profile_cursor {
            ProfileCursorMode::Shared => Ok(shared_next),
            ProfileCursorMode::PerClient => Ok(inner
                .client_cursors
                .get(&(subject, client))
                .map_or(shared_next, |i| i + 1)),
        }
    }

    /// Record that window `index` of `subject` reached `client`.
    pub fn record_profile_delivery(
        &self,
        subject: SubjectId,
        client: ClientId,
        index: usize,
    ) -> SessionResult<()> {
        let mut inner = self.inner.lock();
        match self.profile_cursor {
            ProfileCursorMode::Shared => {
                let entry = inner
                    .subjects
                    .get_mut(&subject)
                    .ok_or(SessionError::UnknownSubject(subject))?;
                entry.last_delivered = Some(index);
            }
            ProfileCursorMode::PerClient => {
                inner.entry(subject)?;
                inner.client_cursors.insert((subject, client), index);
            }
        }
        Ok(())
    }

    /// Drop every per-client cursor owned by `client`.
    pub fn forget_client(&self, client: ClientId) {
        self.inner
            .lock()
            .client_cursors
            .retain(|(_, owner), _| *owner != client);
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let inner = self.inner.lock();
        let subjects = inner
            .subjects
            .iter()
            .map(|(id, entry)| SubjectSnapshot {
                id: *id,
                cursor: entry.cursor,
                total_windows: entry.windows.len(),
                attention_level: entry.current_label,
                last_delivered: entry.last_delivered,
                suppressed: inner.suppressed.contains(id),
            })
            .collect();
        SessionSnapshot {
            mode: match inner.active_profile {
                Some(subject) => ViewMode::OneProfileActive(subject),
                None => ViewMode::AllDashboard,
            },
            active_profile: inner.active_profile,
            subjects,
        }
    }
}

impl std::fmt::Debug for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("SessionState")
            .field("subjects", &inner.subjects.len())
            .field("active_profile", &inner.active_profile)
            .field("suppressed", &inner.suppressed.len())
            .finish()
    }
}
