//! Open tasks from a Todoist-style REST API.

use std::cmp::Ordering;
use std::env;
use std::time::Duration;

use serde::Deserialize;
use time::macros::format_description;
use time::{Date, OffsetDateTime, UtcOffset};

use crate::config::TasksConfig;
use crate::error::RefreshError;
use crate::scheduler::Producer;
use crate::status::{StatusPayload, TaskItem, TaskList};

#[derive(Debug, Deserialize)]
struct ApiTask {
    id: serde_json::Value,
    content: String,
    #[serde(default = "default_priority")]
    priority: u8,
    #[serde(default)]
    due: Option<ApiDue>,
}

#[derive(Debug, Deserialize)]
struct ApiDue {
    date: String,
}

fn default_priority() -> u8 {
    1
}

pub struct TaskProducer {
    agent: ureq::Agent,
    url: String,
    token_env: String,
    limit: usize,
    offset: UtcOffset,
}

impl std::fmt::Debug for TaskProducer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskProducer")
            .field("url", &self.url)
            .field("token_env", &self.token_env)
            .field("limit", &self.limit)
            .finish_non_exhaustive()
    }
}

impl TaskProducer {
    /// `offset` decides what "today" is for the overdue flag.
    pub fn from_config(cfg: &TasksConfig, offset: UtcOffset) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build();
        Self {
            agent,
            url: cfg.api_url.clone(),
            token_env: cfg.token_env.clone(),
            limit: cfg.limit,
            offset,
        }
    }

    fn fetch(&self, token: &str) -> Result<String, RefreshError> {
        let response = self
            .agent
            .get(&self.url)
            .set("Authorization", &format!("Bearer {token}"))
            .set("Accept", "application/json")
            .call()
            .map_err(|e| match e {
                ureq::Error::Status(code, resp) => {
                    RefreshError::Http(format!("{code} {}", resp.status_text()))
                }
                ureq::Error::Transport(t) => RefreshError::Http(t.to_string()),
            })?;
        response
            .into_string()
            .map_err(|e| RefreshError::Http(format!("reading body: {e}")))
    }

    /// Fetch and build the list with an explicit token.
    pub fn fetch_tasks(&self, token: &str) -> Result<TaskList, RefreshError> {
        let body = self.fetch(token)?;
        let today = OffsetDateTime::now_utc().to_offset(self.offset).date();
        build_task_list(&body, today, self.limit)
    }
}

impl Producer for TaskProducer {
    fn produce(&self) -> Result<StatusPayload, RefreshError> {
        let token = env::var(&self.token_env)
            .ok()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| RefreshError::Unavailable(format!("{} not set", self.token_env)))?;
        self.fetch_tasks(token.trim()).map(StatusPayload::Tasks)
    }
}

/// Parse an API response into the displayed list: highest priority first,
/// then earliest due date (undated last), truncated to `limit`.
pub fn build_task_list(body: &str, today: Date, limit: usize) -> Result<TaskList, RefreshError> {
    let raw: Vec<ApiTask> =
        serde_json::from_str(body).map_err(|e| RefreshError::Parse(e.to_string()))?;
    let total = raw.len();

    let mut items: Vec<(TaskItem, Option<Date>)> = raw
        .into_iter()
        .map(|t| {
            let due_date = t.due.as_ref().and_then(|d| parse_date(&d.date));
            let item = TaskItem {
                id: match t.id {
                    serde_json::Value::String(s) => s,
                    other => other.to_string(),
                },
                content: t.content,
                priority: t.priority.clamp(1, 4),
                due: t.due.map(|d| d.date.chars().take(10).collect()),
                overdue: due_date.is_some_and(|d| d < today),
            };
            (item, due_date)
        })
        .collect();

    items.sort_by(|(a, a_due), (b, b_due)| {
        b.priority
            .cmp(&a.priority)
            .then_with(|| match (a_due, b_due) {
                (Some(x), Some(y)) => x.cmp(y),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            })
            .then_with(|| a.content.cmp(&b.content))
    });

    Ok(TaskList {
        items: items.into_iter().take(limit).map(|(item, _)| item).collect(),
        total,
    })
}

/// `YYYY-MM-DD`, ignoring any trailing time part.
fn parse_date(s: &str) -> Option<Date> {
    Date::parse(s.get(..10)?, format_description!("[year]-[month]-[day]")).ok()
}
