//! Session tracker: a pure reducer over the browser event stream.
//!
//! The tracker owns the single currently-open observation window. Browser
//! signals (navigation, tab activation, idle transitions) and the periodic
//! sample tick all funnel through [`Tracker::apply`], which closes the
//! current window on a boundary and returns zero or one durable [`Session`]
//! per event. URL equality is both the boundary test and the coalescing
//! mechanism: replaying the same foreground tab never double-closes.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::civil;
use crate::classify::{classify, Category};

/// Observation windows shorter than this are discarded (anti-flicker).
pub const MIN_SESSION_SECS: i64 = 5;

/// Default period of the foreground re-sample tick, in seconds.
pub const SAMPLE_INTERVAL_SECS: u64 = 10;

/// Foreground tab as reported by the browser side of the bridge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TabSnapshot {
    pub url: String,
    pub title: String,
}

impl TabSnapshot {
    /// Hostname portion of the URL: scheme and path stripped, no port.
    pub fn hostname(&self) -> String {
        hostname_of(&self.url)
    }
}

/// System idle state as reported by the browser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdleState {
    Active,
    Idle,
    Locked,
}

/// Typed event stream consumed by the tracker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackerEvent {
    /// Navigation completed in the active tab.
    Navigated(TabSnapshot),
    /// A different tab became active.
    Activated(TabSnapshot),
    /// System idle state changed.
    IdleChanged(IdleState),
    /// Periodic sample tick: re-observe the last known foreground tab.
    TimerFired,
}

/// A closed, immutable record of one observation window.
///
/// `date` and `hour` are bucketed once, at close time, in the fixed civil
/// offset. A window crossing a day boundary is attributed entirely to the
/// closing day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub url: String,
    pub hostname: String,
    pub title: String,
    pub category: Category,
    pub duration_seconds: i64,
    pub timestamp_ms: i64,
    pub date: NaiveDate,
    pub hour: u8,
}

/// The currently-open, not-yet-durable activity window.
#[derive(Debug, Clone)]
struct Observation {
    url: String,
    hostname: String,
    title: String,
    category: Category,
    start_ms: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Idle,
    Tracking,
}

/// Explicit tracker context: one instance owns the open observation and the
/// last known foreground tab. Created at process start, torn down at
/// shutdown via a final [`TrackerEvent::IdleChanged`].
#[derive(Debug)]
pub struct Tracker {
    state: State,
    current: Option<Observation>,
    last_tab: Option<TabSnapshot>,
}

impl Default for Tracker {
    fn default() -> Self {
        Self::new()
    }
}

impl Tracker {
    pub fn new() -> Self {
        Self {
            state: State::Tracking,
            current: None,
            last_tab: None,
        }
    }

    pub fn is_tracking(&self) -> bool {
        self.state == State::Tracking
    }

    /// Advance the state machine by one event at wall-clock `now_ms`.
    ///
    /// Returns a closed [`Session`] when the event ends an observation
    /// window that lasted at least [`MIN_SESSION_SECS`].
    pub fn apply(&mut self, event: TrackerEvent, now_ms: i64) -> Option<Session> {
        match event {
            TrackerEvent::Navigated(tab) | TrackerEvent::Activated(tab) => {
                self.last_tab = Some(tab.clone());
                if self.state == State::Tracking {
                    self.observe(tab, now_ms)
                } else {
                    None
                }
            }
            TrackerEvent::TimerFired => {
                if self.state == State::Tracking {
                    self.last_tab
                        .clone()
                        .and_then(|tab| self.observe(tab, now_ms))
                } else {
                    None
                }
            }
            TrackerEvent::IdleChanged(IdleState::Active) => {
                let was_idle = self.state == State::Idle;
                self.state = State::Tracking;
                if was_idle {
                    // Resume and immediately re-sample.
                    self.last_tab
                        .clone()
                        .and_then(|tab| self.observe(tab, now_ms))
                } else {
                    None
                }
            }
            TrackerEvent::IdleChanged(IdleState::Idle | IdleState::Locked) => {
                self.state = State::Idle;
                self.close_current(now_ms)
            }
        }
    }

    /// Observe the foreground tab: on a URL boundary, close the current
    /// window and open a new one. Privileged URLs are skipped entirely.
    fn observe(&mut self, tab: TabSnapshot, now_ms: i64) -> Option<Session> {
        if tab.url.is_empty() || is_privileged_url(&tab.url) {
            return None;
        }

        if let Some(ref cur) = self.current {
            if cur.url == tab.url {
                return None;
            }
        }

        let closed = self.close_current(now_ms);

        let hostname = tab.hostname();
        let category = classify(&hostname, &tab.title);
        self.current = Some(Observation {
            url: tab.url,
            hostname,
            title: tab.title,
            category,
            start_ms: now_ms,
        });

        closed
    }

    fn close_current(&mut self, now_ms: i64) -> Option<Session> {
        let obs = self.current.take()?;
        let duration_seconds = (now_ms - obs.start_ms) / 1000;
        if duration_seconds < MIN_SESSION_SECS {
            return None;
        }

        let (date, hour) = civil::civil_date_hour(now_ms);
        Some(Session {
            url: obs.url,
            hostname: obs.hostname,
            title: obs.title,
            category: obs.category,
            duration_seconds,
            timestamp_ms: obs.start_ms,
            date,
            hour,
        })
    }
}

/// Browser-internal and extension pages never create observations.
pub fn is_privileged_url(url: &str) -> bool {
    url.starts_with("chrome://")
        || url.starts_with("chrome-extension://")
        || url.starts_with("about:")
        || url.starts_with("edge://")
}

/// Extract the hostname from a URL without a full parser: strip the scheme,
/// userinfo, port, path, query, and fragment.
fn hostname_of(url: &str) -> String {
    let rest = match url.find("://") {
        Some(i) => &url[i + 3..],
        None => url,
    };
    let authority = rest
        .split(['/', '?', '#'])
        .next()
        .unwrap_or("");
    let host = match authority.rfind('@') {
        Some(i) => &authority[i + 1..],
        None => authority,
    };
    match host.find(':') {
        Some(i) => host[..i].to_string(),
        None => host.to_string(),
    }
}
