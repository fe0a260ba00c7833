//! Status snapshots and the board that holds the latest one per domain.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

/// What a snapshot describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StatusDomain {
    Service,
    Resources,
    Tasks,
}

impl StatusDomain {
    pub const ALL: [StatusDomain; 3] = [Self::Service, Self::Resources, Self::Tasks];

    pub fn name(self) -> &'static str {
        match self {
            Self::Service => "service",
            Self::Resources => "resources",
            Self::Tasks => "tasks",
        }
    }

    fn index(self) -> usize {
        match self {
            Self::Service => 0,
            Self::Resources => 1,
            Self::Tasks => 2,
        }
    }
}

impl fmt::Display for StatusDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How recently the service wrote to its log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Heartbeat {
    JustNow,
    MinutesAgo(u64),
    Stale,
    Unknown,
}

impl Heartbeat {
    /// Classify a log age: under a minute is "just now", anything at or past
    /// `stale_after` is stale.
    pub fn from_age(age: Duration, stale_after: Duration) -> Self {
        if age >= stale_after {
            Self::Stale
        } else if age < Duration::from_secs(60) {
            Self::JustNow
        } else {
            Self::MinutesAgo(age.as_secs() / 60)
        }
    }

    pub fn label(self) -> String {
        match self {
            Self::JustNow => "just now".to_string(),
            Self::MinutesAgo(m) => format!("{m}m ago"),
            Self::Stale => "stale".to_string(),
            Self::Unknown => "unknown".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServiceHealth {
    pub running: bool,
    pub pid: Option<u32>,
    pub heartbeat: Heartbeat,
    pub model: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResourceMetrics {
    pub cpu_percent: Option<f32>,
    pub mem_used_mib: u64,
    pub mem_total_mib: u64,
    /// Degrees Celsius.
    pub temperature: Option<f32>,
}

impl ResourceMetrics {
    pub fn mem_percent(&self) -> f32 {
        if self.mem_total_mib == 0 {
            0.0
        } else {
            self.mem_used_mib as f32 * 100.0 / self.mem_total_mib as f32
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskItem {
    pub id: String,
    pub content: String,
    /// 1 (normal) to 4 (urgent).
    pub priority: u8,
    /// Due date as `YYYY-MM-DD`.
    pub due: Option<String>,
    pub overdue: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskList {
    pub items: Vec<TaskItem>,
    /// Open tasks before truncation.
    pub total: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StatusPayload {
    Service(ServiceHealth),
    Resources(ResourceMetrics),
    Tasks(TaskList),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Ok(StatusPayload),
    Error(String),
}

/// One captured value for one domain. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusSnapshot {
    pub domain: StatusDomain,
    pub captured_at: SystemTime,
    pub outcome: Outcome,
}

impl StatusSnapshot {
    pub fn ok(domain: StatusDomain, payload: StatusPayload) -> Self {
        Self {
            domain,
            captured_at: SystemTime::now(),
            outcome: Outcome::Ok(payload),
        }
    }

    pub fn error(domain: StatusDomain, message: impl Into<String>) -> Self {
        Self {
            domain,
            captured_at: SystemTime::now(),
            outcome: Outcome::Error(message.into()),
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self.outcome, Outcome::Ok(_))
    }

    pub fn error_message(&self) -> Option<&str> {
        match &self.outcome {
            Outcome::Error(msg) => Some(msg),
            Outcome::Ok(_) => None,
        }
    }

    /// Time since capture; zero if the clock went backwards.
    pub fn age(&self, now: SystemTime) -> Duration {
        now.duration_since(self.captured_at).unwrap_or_default()
    }
}

/// Latest snapshot per domain.
#[derive(Debug, Clone, Default)]
pub struct StatusBoard {
    slots: [Option<Arc<StatusSnapshot>>; 3],
}

impl StatusBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `snapshot` unless the domain already holds one captured later.
    /// Returns whether it was stored.
    pub fn merge(&mut self, snapshot: Arc<StatusSnapshot>) -> bool {
        let slot = &mut self.slots[snapshot.domain.index()];
        if slot
            .as_ref()
            .is_some_and(|current| current.captured_at > snapshot.captured_at)
        {
            tracing::debug!(domain = %snapshot.domain, "stale snapshot ignored");
            return false;
        }
        *slot = Some(snapshot);
        true
    }

    pub fn get(&self, domain: StatusDomain) -> Option<&Arc<StatusSnapshot>> {
        self.slots[domain.index()].as_ref()
    }

    pub fn service(&self) -> Option<&ServiceHealth> {
        match self.get(StatusDomain::Service).map(|s| &s.outcome) {
            Some(Outcome::Ok(StatusPayload::Service(health))) => Some(health),
            _ => None,
        }
    }

    pub fn resources(&self) -> Option<&ResourceMetrics> {
        match self.get(StatusDomain::Resources).map(|s| &s.outcome) {
            Some(Outcome::Ok(StatusPayload::Resources(metrics))) => Some(metrics),
            _ => None,
        }
    }

    pub fn tasks(&self) -> Option<&TaskList> {
        match self.get(StatusDomain::Tasks).map(|s| &s.outcome) {
            Some(Outcome::Ok(StatusPayload::Tasks(list))) => Some(list),
            _ => None,
        }
    }
}

/// Compact age label: `12s`, `4m`, `2h`.
pub fn format_age(age: Duration) -> String {
    let secs = age.as_secs();
    if secs < 60 {
        format!("{secs}s")
    } else if secs < 3600 {
        format!("{}m", secs / 60)
    } else {
        format!("{}h", secs / 3600)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heartbeat_buckets() {
        let stale = Duration::from_secs(300);
        assert_eq!(Heartbeat::from_age(Duration::from_secs(5), stale), Heartbeat::JustNow);
        assert_eq!(
            Heartbeat::from_age(Duration::from_secs(130), stale),
            Heartbeat::MinutesAgo(2)
        );
        assert_eq!(Heartbeat::from_age(Duration::from_secs(300), stale), Heartbeat::Stale);
        assert_eq!(Heartbeat::MinutesAgo(3).label(), "3m ago");
    }

    #[test]
    fn merge_replaces_per_domain() {
        let mut board = StatusBoard::new();
        let first = Arc::new(StatusSnapshot::error(StatusDomain::Tasks, "down"));
        assert!(board.merge(first));
        let second = Arc::new(StatusSnapshot::ok(
            StatusDomain::Tasks,
            StatusPayload::Tasks(TaskList::default()),
        ));
        assert!(board.merge(second));
        assert!(board.tasks().is_some());
        assert!(board.get(StatusDomain::Service).is_none());
    }

    #[test]
    fn older_snapshot_does_not_overwrite_newer() {
        let mut board = StatusBoard::new();
        let newer = StatusSnapshot::error(StatusDomain::Resources, "sensor gone");
        let mut older = StatusSnapshot::error(StatusDomain::Resources, "old news");
        older.captured_at = newer.captured_at - Duration::from_secs(5);

        assert!(board.merge(Arc::new(newer)));
        assert!(!board.merge(Arc::new(older)));
        assert_eq!(
            board
                .get(StatusDomain::Resources)
                .and_then(|s| s.error_message()),
            Some("sensor gone")
        );
    }

    #[test]
    fn error_snapshot_exposes_message() {
        let snap = StatusSnapshot::error(StatusDomain::Service, "pgrep timed out");
        assert!(!snap.is_ok());
        assert_eq!(snap.error_message(), Some("pgrep timed out"));
    }

    #[test]
    fn age_labels() {
        assert_eq!(format_age(Duration::from_secs(9)), "9s");
        assert_eq!(format_age(Duration::from_secs(125)), "2m");
        assert_eq!(format_age(Duration::from_secs(7300)), "2h");
    }
}
