//! # Activity Audit Log
//!
//! Append-only record of administrative actions.
//!
//! The acting user is always passed in explicitly; nothing here reads an
//! ambient "current user". The affected record is a tagged [`Subject`]
//! rather than an untyped reference.

use crate::primitives::{DEFAULT_LOG_PAGE_SIZE, MAX_PAGE_SIZE};
use crate::{DinasId, LogId, Role, SlhdError, UserId, Year};
use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// =============================================================================
// ACTORS & SUBJECTS
// =============================================================================

/// Who performed an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: UserId,
    /// Role at the time of the action.
    pub role: Role,
}

/// What an action was performed on.
///
/// Externally tagged so it survives postcard; the HTTP layer renders it
/// as `{kind, id}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Subject {
    User(UserId),
    Agency(DinasId),
    #[default]
    None,
}

impl Subject {
    /// `(kind, id)` pair.
    #[must_use]
    pub fn parts(&self) -> (&'static str, Option<u64>) {
        match self {
            Subject::User(id) => ("user", Some(id.0)),
            Subject::Agency(id) => ("agency", Some(id.0)),
            Subject::None => ("none", None),
        }
    }
}

/// Audience a log entry belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogContext {
    Admin,
    Pusdatin,
    Dinas,
    System,
}

impl LogContext {
    /// Context implied by the acting user.
    #[must_use]
    pub fn for_actor(actor: Option<&Actor>) -> Self {
        match actor.map(|a| a.role) {
            Some(Role::Admin) => LogContext::Admin,
            Some(Role::Pusdatin) => LogContext::Pusdatin,
            Some(Role::Provinsi | Role::KabupatenKota) => LogContext::Dinas,
            None => LogContext::System,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            LogContext::Admin => "admin",
            LogContext::Pusdatin => "pusdatin",
            LogContext::Dinas => "dinas",
            LogContext::System => "system",
        }
    }
}

/// Transport details of the request that caused an action.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RequestMeta {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

// =============================================================================
// LOG ENTRIES
// =============================================================================

/// A stored activity log entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityLog {
    pub id: LogId,
    pub actor: Option<Actor>,
    pub action: String,
    pub description: String,
    pub subject: Subject,
    pub context: LogContext,
    pub year: Option<Year>,
    pub stage: Option<String>,
    pub document_type: Option<String>,
    pub properties: BTreeMap<String, String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// An action about to be recorded.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ActivityDraft {
    pub actor: Option<Actor>,
    pub action: String,
    pub description: String,
    pub subject: Subject,
    pub properties: BTreeMap<String, String>,
    pub meta: RequestMeta,
}

impl ActivityDraft {
    pub fn new(
        actor: Option<Actor>,
        action: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            actor,
            action: action.into(),
            description: description.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn subject(mut self, subject: Subject) -> Self {
        self.subject = subject;
        self
    }

    #[must_use]
    pub fn property(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.properties.insert(key.into(), value.to_string());
        self
    }

    #[must_use]
    pub fn meta(mut self, meta: RequestMeta) -> Self {
        self.meta = meta;
        self
    }

    /// Finalise into a stored entry.
    ///
    /// `year` comes from the `year` property when it parses, else from `now`.
    #[must_use]
    pub fn into_log(self, id: LogId, now: DateTime<Utc>) -> ActivityLog {
        let year = self
            .properties
            .get("year")
            .and_then(|y| y.parse::<Year>().ok())
            .unwrap_or_else(|| now.year());
        ActivityLog {
            id,
            context: LogContext::for_actor(self.actor.as_ref()),
            actor: self.actor,
            action: self.action,
            description: self.description,
            subject: self.subject,
            year: Some(year),
            stage: self.properties.get("stage").cloned(),
            document_type: self.properties.get("document_type").cloned(),
            properties: self.properties,
            ip_address: self.meta.ip_address,
            user_agent: self.meta.user_agent,
            created_at: now,
        }
    }
}

/// Storage for activity logs.
pub trait ActivityLogStore {
    /// Assign an id and persist the entry.
    fn append_log(
        &mut self,
        draft: ActivityDraft,
        now: DateTime<Utc>,
    ) -> Result<ActivityLog, SlhdError>;

    /// All entries, in insertion order.
    fn activity_logs(&self) -> Result<Vec<ActivityLog>, SlhdError>;
}

/// Record an action without letting a logging failure escape.
pub fn record<S: ActivityLogStore + ?Sized>(
    store: &mut S,
    draft: ActivityDraft,
    now: DateTime<Utc>,
) -> Option<ActivityLog> {
    let action = draft.action.clone();
    match store.append_log(draft, now) {
        Ok(entry) => Some(entry),
        Err(e) => {
            tracing::error!(event = "activity_log_error", action = %action, "{}", e);
            None
        }
    }
}

// =============================================================================
// QUERIES
// =============================================================================

/// Log listing filter.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LogFilter {
    /// `None` or `"all"` disables the role filter.
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub year: Option<Year>,
    #[serde(default)]
    pub page: Option<usize>,
    #[serde(default)]
    pub limit: Option<usize>,
}

impl LogFilter {
    /// Filter for one role.
    #[must_use]
    pub fn for_role(role: impl Into<String>) -> Self {
        Self {
            role: Some(role.into()),
            ..Self::default()
        }
    }

    fn matches(&self, log: &ActivityLog) -> bool {
        let role_ok = match self.role.as_deref() {
            None | Some("") | Some("all") => true,
            Some(role) => {
                log.context.as_str() == role || log.actor.is_some_and(|a| a.role.as_str() == role)
            }
        };
        let year_ok = self.year.is_none_or(|y| log.year == Some(y));
        role_ok && year_ok
    }
}

/// One page of a listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub current_page: usize,
    pub per_page: usize,
    pub total: usize,
    pub last_page: usize,
}

impl<T> Page<T> {
    /// Slice an already ordered list into a page.
    ///
    /// `page` starts at 1; `per_page` is clamped to 1..=MAX_PAGE_SIZE.
    #[must_use]
    pub fn paginate(items: Vec<T>, page: usize, per_page: usize) -> Self {
        let per_page = per_page.clamp(1, MAX_PAGE_SIZE);
        let current_page = page.max(1);
        let total = items.len();
        let last_page = total.div_ceil(per_page).max(1);
        let data = items
            .into_iter()
            .skip((current_page - 1).saturating_mul(per_page))
            .take(per_page)
            .collect();
        Self {
            data,
            current_page,
            per_page,
            total,
            last_page,
        }
    }
}

/// Filter, order newest first, and paginate.
pub fn query_logs<S: ActivityLogStore + ?Sized>(
    store: &S,
    filter: &LogFilter,
) -> Result<Page<ActivityLog>, SlhdError> {
    let mut logs: Vec<ActivityLog> = store
        .activity_logs()?
        .into_iter()
        .filter(|log| filter.matches(log))
        .collect();
    logs.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
    Ok(Page::paginate(
        logs,
        filter.page.unwrap_or(1),
        filter.limit.unwrap_or(DEFAULT_LOG_PAGE_SIZE),
    ))
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[derive(Default)]
    struct VecLog(Vec<ActivityLog>);

    impl ActivityLogStore for VecLog {
        fn append_log(
            &mut self,
            draft: ActivityDraft,
            now: DateTime<Utc>,
        ) -> Result<ActivityLog, SlhdError> {
            let entry = draft.into_log(LogId(self.0.len() as u64 + 1), now);
            self.0.push(entry.clone());
            Ok(entry)
        }

        fn activity_logs(&self) -> Result<Vec<ActivityLog>, SlhdError> {
            Ok(self.0.clone())
        }
    }

    struct BrokenLog;

    impl ActivityLogStore for BrokenLog {
        fn append_log(
            &mut self,
            _draft: ActivityDraft,
            _now: DateTime<Utc>,
        ) -> Result<ActivityLog, SlhdError> {
            Err(SlhdError::StorageUnavailable("read-only".into()))
        }

        fn activity_logs(&self) -> Result<Vec<ActivityLog>, SlhdError> {
            Ok(Vec::new())
        }
    }

    fn day(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, d, 9, 0, 0).single().expect("valid date")
    }

    fn admin() -> Actor {
        Actor {
            user_id: UserId(1),
            role: Role::Admin,
        }
    }

    fn pusdatin() -> Actor {
        Actor {
            user_id: UserId(2),
            role: Role::Pusdatin,
        }
    }

    #[test]
    fn context_follows_actor_role() {
        assert_eq!(LogContext::for_actor(Some(&admin())), LogContext::Admin);
        assert_eq!(LogContext::for_actor(None), LogContext::System);
        let dinas = Actor {
            user_id: UserId(5),
            role: Role::KabupatenKota,
        };
        assert_eq!(LogContext::for_actor(Some(&dinas)), LogContext::Dinas);
    }

    #[test]
    fn year_comes_from_properties_then_clock() {
        let with_year = ActivityDraft::new(None, "update_deadline", "x")
            .property("year", 2031)
            .into_log(LogId(1), day(1));
        assert_eq!(with_year.year, Some(2031));

        let without = ActivityDraft::new(None, "noop", "x").into_log(LogId(2), day(1));
        assert_eq!(without.year, Some(2026));
    }

    #[test]
    fn stage_and_document_type_lift_from_properties() {
        let log = ActivityDraft::new(Some(pusdatin()), "review_document", "x")
            .property("stage", "validation_1")
            .property("document_type", "laporan_utama")
            .subject(Subject::Agency(DinasId(7)))
            .into_log(LogId(1), day(1));
        assert_eq!(log.stage.as_deref(), Some("validation_1"));
        assert_eq!(log.document_type.as_deref(), Some("laporan_utama"));
        assert_eq!(log.subject, Subject::Agency(DinasId(7)));
    }

    #[test]
    fn record_swallows_store_failures() {
        let draft = ActivityDraft::new(Some(admin()), "update_deadline", "x");
        assert!(record(&mut BrokenLog, draft, day(1)).is_none());
    }

    #[test]
    fn role_filter_matches_context_or_actor() {
        let mut store = VecLog::default();
        record(&mut store, ActivityDraft::new(Some(admin()), "a", "1"), day(1));
        record(&mut store, ActivityDraft::new(Some(pusdatin()), "b", "2"), day(2));
        record(&mut store, ActivityDraft::new(None, "c", "3"), day(3));

        let page = query_logs(&store, &LogFilter::for_role("admin")).expect("query");
        assert_eq!(page.total, 1);
        assert_eq!(page.data[0].action, "a");

        let all = query_logs(&store, &LogFilter::for_role("all")).expect("query");
        assert_eq!(all.total, 3);
        // Newest first.
        assert_eq!(all.data[0].action, "c");
    }

    #[test]
    fn year_filter_excludes_other_years() {
        let mut store = VecLog::default();
        record(
            &mut store,
            ActivityDraft::new(None, "a", "1").property("year", 2025),
            day(1),
        );
        record(&mut store, ActivityDraft::new(None, "b", "2"), day(2));
        let filter = LogFilter {
            year: Some(2025),
            ..LogFilter::default()
        };
        let page = query_logs(&store, &filter).expect("query");
        assert_eq!(page.total, 1);
        assert_eq!(page.data[0].action, "a");
    }

    #[test]
    fn pagination_reports_bounds() {
        let page = Page::paginate((1..=30).collect::<Vec<_>>(), 2, 25);
        assert_eq!(page.data, vec![26, 27, 28, 29, 30]);
        assert_eq!(page.last_page, 2);
        assert_eq!(page.total, 30);

        let empty: Page<u8> = Page::paginate(Vec::new(), 0, 0);
        assert_eq!(empty.current_page, 1);
        assert_eq!(empty.per_page, 1);
        assert_eq!(empty.last_page, 1);
    }

    #[test]
    fn entry_round_trips_through_postcard() {
        let log = ActivityDraft::new(None, "approve_user", "x")
            .subject(Subject::User(UserId(3)))
            .into_log(LogId(1), day(1));
        let bytes = postcard::to_allocvec(&log).expect("encode");
        let back: ActivityLog = postcard::from_bytes(&bytes).expect("decode");
        assert_eq!(back.subject, Subject::User(UserId(3)));
    }
}
