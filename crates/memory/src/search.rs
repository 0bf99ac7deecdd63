//! Keyword search with time-phrase scoping and relevance ranking.
//!
//! A free-text query like `"deploy errors from yesterday"` is split into a
//! [`QueryPlan`]: a time bound (`yesterday` → 00:00 UTC yesterday) and the
//! remaining content terms (`deploy`, `errors`). Candidates come from the
//! `search_index` table and are ranked in memory by [`relevance`].

use crate::sqlite::{SqliteContextStore, fetch_entries, like_contains, push_filter, row_to_entry};
use ccom_core::{ContextEntry, EntryFilter, MemoryError, ScoredEntry};
use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeDelta, Utc};
use futures::TryStreamExt;
use regex_lite::Regex;
use sqlx::{QueryBuilder, Sqlite};
use std::cmp::Ordering;
use tracing::debug;

/// At most this many leading tokens become search terms.
const MAX_TERMS: usize = 5;

/// Relevance given to every hit of a query with no content terms.
const FLAT_RELEVANCE: f64 = 0.5;

const STOP_WORDS: &[&str] = &[
    "a", "an", "the", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by",
    "from", "about", "is", "are", "was", "were", "be", "been", "what", "when", "where", "how",
    "why", "which", "who", "did", "do", "does", "i", "we", "you", "it", "this", "that", "these",
    "those", "show", "find", "me", "my", "all", "any", "some", "search", "get",
];

/// Where a recognized time phrase puts its lower bound.
#[derive(Debug, Clone, Copy)]
enum Anchor {
    HoursAgo(i64),
    DaysAgo(i64),
    /// `last|past N day|hour|week`, read from the capture groups.
    Counted,
    Today,
    Yesterday,
    ThisWeek,
    ThisMonth,
}

/// Time phrases in precedence order: the first one present sets the bound.
const TIME_PHRASES: &[(&str, Anchor)] = &[
    (r"\blast\s+24\s+hours?\b", Anchor::HoursAgo(24)),
    (r"\blast\s+hour\b", Anchor::HoursAgo(1)),
    (r"\b(?:last|past)\s+(\d+)\s+(day|hour|week)s?\b", Anchor::Counted),
    (r"\byesterday\b", Anchor::Yesterday),
    (r"\btoday\b", Anchor::Today),
    (r"\bthis\s+week\b", Anchor::ThisWeek),
    (r"\blast\s+week\b", Anchor::DaysAgo(7)),
    (r"\bthis\s+month\b", Anchor::ThisMonth),
    (r"\blast\s+month\b", Anchor::DaysAgo(30)),
    (r"\brecent\b", Anchor::DaysAgo(3)),
];

/// The time bound taken from a query.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeScope {
    /// The phrase as it appeared in the lowercased query.
    pub phrase: String,
    pub since: DateTime<Utc>,
}

/// A parsed search query.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryPlan {
    pub scope: Option<TimeScope>,
    /// Up to five content terms, in query order.
    pub terms: Vec<String>,
    /// Every non-stop-word token, space-joined.
    pub phrase: String,
}

/// Split `query` into a time scope and content terms, relative to `now`.
pub fn plan_query(query: &str, now: DateTime<Utc>) -> QueryPlan {
    let lower = query.to_lowercase();
    let scope = parse_time_scope(&lower, now);

    let mut stripped = lower;
    for (pattern, _) in TIME_PHRASES {
        if let Ok(re) = Regex::new(pattern) {
            stripped = re.replace_all(&stripped, " ").into_owned();
        }
    }

    let tokens = tokenize(&stripped);
    let terms = tokens.iter().take(MAX_TERMS).cloned().collect();
    QueryPlan {
        scope,
        terms,
        phrase: tokens.join(" "),
    }
}

/// The first time phrase in `query` (precedence order) and its instant.
pub fn parse_time_scope(query: &str, now: DateTime<Utc>) -> Option<TimeScope> {
    let lower = query.to_lowercase();
    for (pattern, anchor) in TIME_PHRASES {
        let Ok(re) = Regex::new(pattern) else {
            continue;
        };
        let Some(caps) = re.captures(&lower) else {
            continue;
        };

        let since = match anchor {
            Anchor::HoursAgo(h) => now.checked_sub_signed(Duration::hours(*h)),
            Anchor::DaysAgo(d) => now.checked_sub_signed(Duration::days(*d)),
            Anchor::Counted => {
                let count = caps.get(1).and_then(|m| m.as_str().parse::<i64>().ok());
                let unit = caps.get(2).map(|m| m.as_str());
                count
                    .and_then(|n| match unit {
                        Some("hour") => TimeDelta::try_hours(n),
                        Some("week") => TimeDelta::try_weeks(n),
                        _ => TimeDelta::try_days(n),
                    })
                    .and_then(|delta| now.checked_sub_signed(delta))
            }
            Anchor::Today => midnight(now.date_naive()),
            Anchor::Yesterday => now.date_naive().pred_opt().and_then(midnight),
            Anchor::ThisWeek => {
                let back = i64::from(now.weekday().num_days_from_monday());
                now.date_naive()
                    .checked_sub_signed(Duration::days(back))
                    .and_then(midnight)
            }
            Anchor::ThisMonth => now.date_naive().with_day(1).and_then(midnight),
        };

        let phrase = caps.get(0).map(|m| m.as_str().to_string()).unwrap_or_default();
        match since {
            Some(since) => return Some(TimeScope { phrase, since }),
            None => debug!("Time phrase '{phrase}' is out of range, ignoring"),
        }
    }
    None
}

fn midnight(date: NaiveDate) -> Option<DateTime<Utc>> {
    date.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc())
}

/// Lowercase, split on anything but alphanumerics, `_` and `-`, and drop
/// stop words and single characters.
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !(c.is_alphanumeric() || c == '_' || c == '-'))
        .filter(|t| t.chars().count() >= 2 && !STOP_WORDS.contains(t))
        .map(String::from)
        .collect()
}

/// Score `content` against a plan. Higher is better.
pub fn relevance(content: &str, plan: &QueryPlan) -> f64 {
    if plan.terms.is_empty() {
        return FLAT_RELEVANCE;
    }

    let lower = content.to_lowercase();
    let mut score = 0.0;

    if !plan.phrase.is_empty() && lower.contains(&plan.phrase) {
        score += 5.0;
    }

    for term in &plan.terms {
        let occurrences = lower.matches(term.as_str()).count().min(3);
        score += occurrences as f64;
        if let Some(idx) = lower.find(term.as_str()) {
            if lower[..idx].chars().count() < 100 {
                score += 0.5;
            }
        }
    }

    let len = content.chars().count();
    if (50..=1000).contains(&len) {
        score += 0.5;
    } else if len < 20 {
        score -= 1.0;
    }

    score
}

fn by_relevance_then_recency(a: &ScoredEntry, b: &ScoredEntry) -> Ordering {
    b.relevance
        .partial_cmp(&a.relevance)
        .unwrap_or(Ordering::Equal)
        .then_with(|| b.entry.timestamp.cmp(&a.entry.timestamp))
        .then_with(|| b.entry.id.cmp(&a.entry.id))
}

/// Insert `hit` into the ranked `best` list, holding at most `limit` hits.
fn keep_best(best: &mut Vec<ScoredEntry>, hit: ScoredEntry, limit: usize) {
    if limit == 0 {
        return;
    }
    if best.len() == limit
        && best
            .last()
            .is_some_and(|worst| by_relevance_then_recency(worst, &hit) != Ordering::Greater)
    {
        return;
    }
    let pos = best.partition_point(|h| by_relevance_then_recency(h, &hit) != Ordering::Greater);
    best.insert(pos, hit);
    best.truncate(limit);
}

/// Normalize a tag the way it is stored.
fn clean_tag(tag: &str) -> String {
    tag.replace(',', "").trim().to_string()
}

/// `(',' || e.tags || ',') LIKE '%,tag,%'`
fn push_tag_match(qb: &mut QueryBuilder<'_, Sqlite>, tag: &str) {
    qb.push("(',' || e.tags || ',') LIKE ")
        .push_bind(like_contains(&format!(",{tag},")))
        .push(" ESCAPE '\\'");
}

impl SqliteContextStore {
    /// Ranked keyword search. Time phrases in `query` narrow the window.
    pub async fn search(
        &self,
        query: &str,
        filter: &EntryFilter,
        limit: usize,
    ) -> Result<Vec<ScoredEntry>, MemoryError> {
        self.search_at(query, filter, limit, Utc::now()).await
    }

    /// [`search`](Self::search) with an explicit clock.
    pub async fn search_at(
        &self,
        query: &str,
        filter: &EntryFilter,
        limit: usize,
        now: DateTime<Utc>,
    ) -> Result<Vec<ScoredEntry>, MemoryError> {
        let plan = plan_query(query, now);
        let mut filter = filter.clone();
        if let Some(scope) = &plan.scope {
            filter.since = Some(match filter.since {
                Some(existing) => existing.max(scope.since),
                None => scope.since,
            });
        }
        debug!(terms = ?plan.terms, since = ?filter.since, "Planned search");

        let mut conn = self.connect().await?;

        if plan.terms.is_empty() {
            let entries = fetch_entries(&mut conn, &filter, Some(limit)).await?;
            return Ok(entries
                .into_iter()
                .map(|entry| ScoredEntry {
                    entry: entry.preview(self.preview_chars()),
                    relevance: FLAT_RELEVANCE,
                })
                .collect());
        }

        let mut qb = QueryBuilder::<Sqlite>::new(
            "SELECT e.* FROM context_entries e \
             JOIN search_index si ON si.entry_id = e.id WHERE 1 = 1",
        );
        push_filter(&mut qb, &filter);
        qb.push(" AND (");
        for (i, term) in plan.terms.iter().enumerate() {
            if i > 0 {
                qb.push(" OR ");
            }
            qb.push("si.words LIKE ")
                .push_bind(like_contains(term))
                .push(" ESCAPE '\\'");
        }
        qb.push(")");

        // Every matching row is scored; only the best `limit` are held.
        let mut scored: Vec<ScoredEntry> = Vec::new();
        let mut rows = qb.build().fetch(&mut conn);
        while let Some(row) = rows
            .try_next()
            .await
            .map_err(|e| MemoryError::QueryFailed(format!("search candidates: {e}")))?
        {
            let entry = row_to_entry(&row)?;
            let hit = ScoredEntry {
                relevance: relevance(&entry.content, &plan),
                entry,
            };
            keep_best(&mut scored, hit, limit);
        }
        drop(rows);

        for hit in &mut scored {
            hit.entry = hit.entry.preview(self.preview_chars());
        }

        debug!("Search '{query}' returned {} results", scored.len());
        Ok(scored)
    }

    /// Entries carrying any (or, with `match_all`, every) of `tags`, newest first.
    pub async fn search_by_tags(
        &self,
        tags: &[String],
        match_all: bool,
        limit: usize,
    ) -> Result<Vec<ContextEntry>, MemoryError> {
        let tags: Vec<String> = tags
            .iter()
            .map(|t| clean_tag(t))
            .filter(|t| !t.is_empty())
            .collect();
        if tags.is_empty() {
            return Ok(Vec::new());
        }

        let joiner = if match_all { " AND " } else { " OR " };
        let mut qb = QueryBuilder::<Sqlite>::new("SELECT e.* FROM context_entries e WHERE (");
        for (i, tag) in tags.iter().enumerate() {
            if i > 0 {
                qb.push(joiner);
            }
            push_tag_match(&mut qb, tag);
        }
        qb.push(") ORDER BY e.timestamp DESC, e.id DESC LIMIT ")
            .push_bind(limit as i64);

        let mut conn = self.connect().await?;
        let rows = qb
            .build()
            .fetch_all(&mut conn)
            .await
            .map_err(|e| MemoryError::QueryFailed(format!("tag search: {e}")))?;

        rows.iter()
            .map(|row| row_to_entry(row).map(|e| e.preview(self.preview_chars())))
            .collect()
    }

    /// Entries resembling `reference_id`: same content type, sharing a
    /// leading tag. Same priority and same channel rank first.
    pub async fn search_similar(
        &self,
        reference_id: i64,
        limit: usize,
    ) -> Result<Vec<ContextEntry>, MemoryError> {
        let Some(reference) = self.get(reference_id).await? else {
            debug!("Similar search: entry {reference_id} not found");
            return Ok(Vec::new());
        };

        let mut qb = QueryBuilder::<Sqlite>::new("SELECT e.* FROM context_entries e WHERE e.id != ");
        qb.push_bind(reference.id)
            .push(" AND e.content_type = ")
            .push_bind(reference.content_type.clone());

        if !reference.tags.is_empty() {
            qb.push(" AND (");
            for (i, tag) in reference.tags.iter().take(3).enumerate() {
                if i > 0 {
                    qb.push(" OR ");
                }
                push_tag_match(&mut qb, tag);
            }
            qb.push(")");
        }

        qb.push(" ORDER BY (e.priority = ")
            .push_bind(reference.priority.as_str())
            .push(") DESC, (e.channel = ")
            .push_bind(reference.channel.clone())
            .push(") DESC, e.timestamp DESC, e.id DESC LIMIT ")
            .push_bind(limit as i64);

        let mut conn = self.connect().await?;
        let rows = qb
            .build()
            .fetch_all(&mut conn)
            .await
            .map_err(|e| MemoryError::QueryFailed(format!("similar search: {e}")))?;

        rows.iter()
            .map(|row| row_to_entry(row).map(|e| e.preview(self.preview_chars())))
            .collect()
    }
}
