//! Row collection: summarization, sorting, and result windowing.
//!
//! The [`Collector`] receives fully evaluated field rows one at a time and
//! produces the final row set. When neither sorting nor summarization is in
//! play, the limit window cuts off collection early; otherwise every row is
//! collected and the window applies at the end, after sorting.

use std::collections::HashMap;

use crate::ast::{AggregateKind, SortDirection};
use crate::binder::{Summarization, WhatPlan};
use crate::error::{RuntimeError, RuntimeResult};
use crate::types::Value;

pub(crate) struct Collector {
    summarization: Summarization,
    sorting: Vec<(usize, SortDirection)>,
    limit: Option<usize>,
    offset: usize,
    /// Whether the limit window applies during collection.
    early: bool,
    skipped: usize,
    rows: Vec<Vec<Value>>,
    /// Group key to row index, for first-seen group ordering.
    group_index: HashMap<Vec<Value>, usize>,
    group_keys: Vec<usize>,
    aggregates: Vec<(usize, AggregateKind)>,
    /// The single aggregate row over zero input rows.
    empty_row: Option<Vec<Value>>,
    max_rows: usize,
}

impl Collector {
    pub(crate) fn new(
        what: &WhatPlan,
        limit: Option<usize>,
        offset: Option<usize>,
        max_rows: usize,
    ) -> Self {
        let early = what.sorting.is_empty() && what.summarization == Summarization::None;
        let group_keys = what
            .fields
            .iter()
            .enumerate()
            .filter(|(_, f)| f.group)
            .map(|(i, _)| i)
            .collect();
        let aggregates = what
            .fields
            .iter()
            .enumerate()
            .filter_map(|(i, f)| f.aggregate.map(|k| (i, k)))
            .collect();
        let empty_row = (what.summarization == Summarization::All).then(|| {
            what.fields
                .iter()
                .map(|f| match f.aggregate {
                    Some(AggregateKind::Sum) => f.ty.sum_zero().unwrap_or(Value::Null),
                    _ => Value::Null,
                })
                .collect()
        });
        Collector {
            summarization: what.summarization,
            sorting: what.sorting.clone(),
            limit,
            offset: offset.unwrap_or(0),
            early,
            skipped: 0,
            rows: Vec::new(),
            group_index: HashMap::new(),
            group_keys,
            aggregates,
            empty_row,
            max_rows,
        }
    }

    /// Returns whether another row could still change the result.
    pub(crate) fn wants_more(&self) -> bool {
        match self.limit {
            Some(limit) if self.early => self.rows.len() < limit,
            _ => true,
        }
    }

    /// Consumes one offset slot; returns whether the row should be
    /// evaluated and collected.
    pub(crate) fn pass_offset(&mut self) -> bool {
        if self.early && self.skipped < self.offset {
            self.skipped += 1;
            false
        } else {
            true
        }
    }

    /// Collects one evaluated field row.
    pub(crate) fn add_row(&mut self, row: Vec<Value>) -> RuntimeResult<()> {
        match self.summarization {
            Summarization::None => self.push(row)?,
            Summarization::All => {
                if self.rows.is_empty() {
                    self.rows.push(row);
                } else {
                    self.fold(0, &row)?;
                }
            }
            Summarization::Group => {
                let key: Vec<Value> = self.group_keys.iter().map(|&i| row[i].clone()).collect();
                if let Some(&index) = self.group_index.get(&key) {
                    self.fold(index, &row)?;
                } else {
                    let index = self.rows.len();
                    self.push(row)?;
                    self.group_index.insert(key, index);
                }
            }
        }
        Ok(())
    }

    fn push(&mut self, row: Vec<Value>) -> RuntimeResult<()> {
        if self.rows.len() >= self.max_rows {
            return Err(RuntimeError::RowLimitExceeded {
                limit: self.max_rows,
            });
        }
        self.rows.push(row);
        Ok(())
    }

    fn fold(&mut self, index: usize, row: &[Value]) -> RuntimeResult<()> {
        for &(field, kind) in &self.aggregates {
            let current = &self.rows[index][field];
            let incoming = &row[field];
            let next = match kind {
                AggregateKind::Sum => current.add(incoming)?,
                AggregateKind::Min => {
                    if incoming.compare(current) == std::cmp::Ordering::Less {
                        incoming.clone()
                    } else {
                        current.clone()
                    }
                }
                AggregateKind::Max => {
                    if incoming.compare(current) == std::cmp::Ordering::Greater {
                        incoming.clone()
                    } else {
                        current.clone()
                    }
                }
            };
            self.rows[index][field] = next;
        }
        Ok(())
    }

    /// Finishes collection: the empty-set aggregate row, sorting, and the
    /// late limit window.
    pub(crate) fn finish(mut self) -> Vec<Vec<Value>> {
        if self.rows.is_empty() {
            if let Some(row) = self.empty_row.take() {
                self.rows.push(row);
            }
        }

        if !self.sorting.is_empty() {
            let sorting = self.sorting;
            // Stable sort preserves first-seen group order between equal keys.
            self.rows.sort_by(|a, b| {
                for &(index, direction) in &sorting {
                    let ord = match direction {
                        SortDirection::Asc => a[index].compare(&b[index]),
                        SortDirection::Desc => b[index].compare(&a[index]),
                    };
                    if ord != std::cmp::Ordering::Equal {
                        return ord;
                    }
                }
                std::cmp::Ordering::Equal
            });
        }

        if self.early {
            // Offset and limit were already applied during collection.
            return self.rows;
        }
        let mut rows = self.rows;
        if self.offset > 0 {
            rows.drain(..self.offset.min(rows.len()));
        }
        if let Some(limit) = self.limit {
            rows.truncate(limit);
        }
        rows
    }
}
