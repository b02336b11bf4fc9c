//! Search Request Splitter
//!
//! Cuts one search over an auto-index into time-bounded sub-requests:
//! ranges already copied into the index go to the index, everything else
//! goes to the raw source.
//!
//! ```text
//! query     [1000 ........................................ 2000)
//! tracked                    [1400 ... 1600)     [1800 ........)
//! raw       [1000 ... 1400)                 [1600 .. 1800)
//! index                      [1400 ... 1600)     [1800 ... 2000)
//! ```
//!
//! Each sub-request is `AND(original expression, time term)`, keeps the
//! original result requests, and differs only in data source and time term.

use super::error::{SearchError, SearchResult};
use crate::docref::AutoIndexDocRef;
use crate::query::{Condition, DocRef, ExpressionOperator, ExpressionTerm, Query, SearchRequest};
use crate::tracking::{TimelineTracker, Window};
use std::collections::BTreeMap;

/// Lowest time value, stands for "no lower bound"
pub const UNBOUNDED_FROM: i64 = i64::MIN;

/// Highest time value, stands for "no upper bound"
pub const UNBOUNDED_TO: i64 = i64::MAX;

/// One time-bounded piece of the original request
#[derive(Debug, Clone, PartialEq)]
pub struct SubRequest {
    /// Time range covered, open ends use the unbounded sentinels
    pub window: Window<i64>,
    pub request: SearchRequest,
}

/// Sub-requests grouped by the data source they are addressed to
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SplitSearchRequest {
    requests: BTreeMap<DocRef, Vec<SubRequest>>,
}

impl SplitSearchRequest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a sub-request, keeping each target's list in time order
    pub fn add(&mut self, target: DocRef, sub_request: SubRequest) {
        let list = self.requests.entry(target).or_default();
        let at = list.partition_point(|s| s.window < sub_request.window);
        list.insert(at, sub_request);
    }

    /// Sub-requests for one target, in time order
    pub fn get(&self, target: &DocRef) -> &[SubRequest] {
        self.requests.get(target).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn targets(&self) -> impl Iterator<Item = &DocRef> {
        self.requests.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&DocRef, &[SubRequest])> {
        self.requests.iter().map(|(k, v)| (k, v.as_slice()))
    }

    /// Total sub-requests across all targets
    pub fn len(&self) -> usize {
        self.requests.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl IntoIterator for SplitSearchRequest {
    type Item = (DocRef, Vec<SubRequest>);
    type IntoIter = std::collections::btree_map::IntoIter<DocRef, Vec<SubRequest>>;

    fn into_iter(self) -> Self::IntoIter {
        self.requests.into_iter()
    }
}

/// Split `request` against what `tracker` says is already indexed
///
/// Query ends left open are closed with the tracker bounds when known.
pub fn split(
    request: &SearchRequest,
    auto_index: &AutoIndexDocRef,
    tracker: &TimelineTracker,
) -> SearchResult<SplitSearchRequest> {
    let time_field = auto_index.time_field_name.trim();
    if time_field.is_empty() {
        return Err(SearchError::MissingTimeField(auto_index.uuid.clone()));
    }

    let mut split = SplitSearchRequest::new();

    let Some(query_range) = time_range(&request.query.expression, time_field)? else {
        return Ok(split);
    };

    let from = match (query_range.from, tracker.bounds) {
        (UNBOUNDED_FROM, Some(bounds)) => bounds.from,
        (from, _) => from,
    };
    let to = match (query_range.to, tracker.bounds) {
        (UNBOUNDED_TO, Some(bounds)) => bounds.to,
        (to, _) => to,
    };
    let Some(effective) = Window::try_new(from, to).filter(|w| !w.is_empty()) else {
        return Ok(split);
    };

    let mut ordinal = 0usize;
    let mut push = |target: &DocRef, window: Window<i64>| {
        ordinal += 1;
        let piece = SubRequest {
            window,
            request: sub_request(request, target, time_field, window, ordinal),
        };
        split.add(target.clone(), piece);
    };

    for window in tracker.covered_within(effective) {
        push(&auto_index.index, window);
    }
    for window in tracker.gaps_within(effective) {
        push(&auto_index.raw, window);
    }

    tracing::debug!(
        auto_index = %auto_index.uuid,
        range = %effective,
        sub_requests = split.len(),
        "Split search request"
    );

    Ok(split)
}

/// `[from, to)` every matching row must fall in, None if nothing can match
///
/// Only terms reachable through AND nodes constrain the range. Missing
/// bounds come back as the unbounded sentinels.
pub fn time_range(
    expression: &ExpressionOperator,
    time_field: &str,
) -> SearchResult<Option<Window<i64>>> {
    let mut from = UNBOUNDED_FROM;
    let mut to = UNBOUNDED_TO;

    for term in expression.conjunctive_terms() {
        if term.field != time_field {
            continue;
        }

        match term.condition {
            Condition::Between => {
                let (lower, upper) = term
                    .value
                    .split_once(',')
                    .ok_or_else(|| invalid(term))?;
                from = from.max(parse_time(term, lower)?);
                to = to.min(parse_time(term, upper)?);
            }
            Condition::GreaterThan => from = from.max(parse_time(term, &term.value)?.saturating_add(1)),
            Condition::GreaterThanOrEqualTo => from = from.max(parse_time(term, &term.value)?),
            Condition::LessThan => to = to.min(parse_time(term, &term.value)?),
            Condition::LessThanOrEqualTo => to = to.min(parse_time(term, &term.value)?.saturating_add(1)),
            Condition::Equals => {
                let value = parse_time(term, &term.value)?;
                from = from.max(value);
                to = to.min(value.saturating_add(1));
            }
            Condition::Contains | Condition::In => {}
        }
    }

    Ok(Window::try_new(from, to).filter(|w| !w.is_empty()))
}

fn parse_time(term: &ExpressionTerm, value: &str) -> SearchResult<i64> {
    value.trim().parse().map_err(|_| invalid(term))
}

fn invalid(term: &ExpressionTerm) -> SearchError {
    SearchError::InvalidTimeTerm {
        field: term.field.clone(),
        value: term.value.clone(),
    }
}

/// Term restricting `time_field` to `window`, None when fully open
fn window_term(time_field: &str, window: Window<i64>) -> Option<ExpressionTerm> {
    match (window.from == UNBOUNDED_FROM, window.to == UNBOUNDED_TO) {
        (false, false) => Some(ExpressionTerm::new(
            time_field,
            Condition::Between,
            format!("{},{}", window.from, window.to),
        )),
        (false, true) => Some(ExpressionTerm::new(
            time_field,
            Condition::GreaterThanOrEqualTo,
            window.from.to_string(),
        )),
        (true, false) => Some(ExpressionTerm::new(
            time_field,
            Condition::LessThan,
            window.to.to_string(),
        )),
        (true, true) => None,
    }
}

fn sub_request(
    original: &SearchRequest,
    target: &DocRef,
    time_field: &str,
    window: Window<i64>,
    ordinal: usize,
) -> SearchRequest {
    let mut expression = ExpressionOperator::and().operator(original.query.expression.clone());
    if let Some(term) = window_term(time_field, window) {
        expression = expression.term(term.field, term.condition, term.value);
    }

    SearchRequest {
        key: format!("{}/{}/{}", original.key, target.doc_type, ordinal),
        query: Query {
            data_source: target.clone(),
            expression,
            params: original.query.params.clone(),
        },
        result_requests: original.result_requests.clone(),
        date_time_locale: original.date_time_locale.clone(),
        incremental: original.incremental,
        timeout_ms: original.timeout_ms,
    }
}
