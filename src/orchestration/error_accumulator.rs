//! # Error Accumulator
//!
//! Bounded recording of element-level failures into a task's error log. Once
//! `max_retained` entries are held, later failures still increase
//! `total_failures` and `overflow_count` but their detail is dropped, so a task
//! whose actions fail systematically cannot grow its record without limit.

use crate::constants::DEFAULT_MAX_RETAINED_ERRORS;
use crate::models::{ElementError, TaskErrors};
use chrono::Utc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorAccumulator {
    max_retained: usize,
}

impl Default for ErrorAccumulator {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_RETAINED_ERRORS)
    }
}

impl ErrorAccumulator {
    pub fn new(max_retained: usize) -> Self {
        Self { max_retained }
    }

    pub fn max_retained(&self) -> usize {
        self.max_retained
    }

    /// Record one failure; returns whether its detail was retained.
    pub fn record(
        &self,
        errors: &mut TaskErrors,
        entity_id: impl Into<String>,
        message: impl Into<String>,
    ) -> bool {
        errors.total_failures += 1;
        if errors.entries.len() >= self.max_retained {
            errors.overflow_count += 1;
            return false;
        }
        errors.entries.push(ElementError {
            entity_id: entity_id.into(),
            message: message.into(),
            recorded_at: Utc::now(),
        });
        true
    }
}
