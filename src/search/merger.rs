//! Search Response Merger
//!
//! Folds the partial responses of one federated search into a single
//! response. Rows are grouped by result component; within a component
//! their order follows the order responses arrived in.

use crate::query::{ResultRequest, SearchResponse, TableResult};
use std::collections::HashMap;

/// Accumulator for partial responses
#[derive(Debug, Default)]
pub struct SearchResponseMerger {
    tables: Vec<TableResult>,
    positions: HashMap<String, usize>,
    page_lengths: HashMap<String, u64>,
    highlights: Vec<String>,
    errors: Vec<String>,
    complete: bool,
    responses: usize,
}

impl SearchResponseMerger {
    /// Begin a merge
    pub fn start() -> Self {
        Self {
            complete: true,
            ..Default::default()
        }
    }

    /// Builder method: lay out tables in the order the caller asked for
    ///
    /// Requested components always appear in the merged response, empty if
    /// no partial response had rows for them. A requested page length caps
    /// the merged row count.
    pub fn expect_components(mut self, requests: &[ResultRequest]) -> Self {
        for request in requests {
            self.table_mut(&request.component_id);
            if let Some(range) = request.requested_range {
                self.page_lengths
                    .insert(request.component_id.clone(), range.length);
            }
        }
        self
    }

    fn table_mut(&mut self, component_id: &str) -> &mut TableResult {
        let index = match self.positions.get(component_id) {
            Some(&index) => index,
            None => {
                self.tables.push(TableResult::new(component_id, Vec::new()));
                self.positions
                    .insert(component_id.to_string(), self.tables.len() - 1);
                self.tables.len() - 1
            }
        };
        &mut self.tables[index]
    }

    /// Add one partial response
    pub fn response(&mut self, partial: SearchResponse) -> &mut Self {
        self.responses += 1;
        self.complete &= partial.complete;

        for result in partial.results {
            let table = self.table_mut(&result.component_id);
            table.total_results += result.total_results;
            table.rows.extend(result.rows);
            if let Some(error) = result.error {
                table.error = Some(match table.error.take() {
                    Some(existing) => format!("{}; {}", existing, error),
                    None => error,
                });
            }
        }

        for highlight in partial.highlights {
            if !self.highlights.contains(&highlight) {
                self.highlights.push(highlight);
            }
        }
        self.errors.extend(partial.errors);
        self
    }

    /// Number of partial responses added so far
    pub fn response_count(&self) -> usize {
        self.responses
    }

    /// Final response, None if no partial response was ever added
    pub fn merge(self) -> Option<SearchResponse> {
        if self.responses == 0 {
            return None;
        }

        let page_lengths = self.page_lengths;
        let results = self
            .tables
            .into_iter()
            .map(|mut table| {
                if let Some(&length) = page_lengths.get(&table.component_id) {
                    table.rows.truncate(usize::try_from(length).unwrap_or(usize::MAX));
                }
                table
            })
            .collect();

        Some(SearchResponse {
            results,
            highlights: self.highlights,
            errors: self.errors,
            complete: self.complete,
        })
    }
}
