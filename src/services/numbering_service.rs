//! Sequential document numbers per (company, series).
//!
//! The counter is read, incremented and written under one row lock in one
//! transaction. Nothing else touches it, and no external call happens while
//! the lock is held.

use std::sync::Arc;

use uuid::Uuid;

use crate::{
    constants::{MAX_DOCUMENT_NUMBER, MAX_SERIES},
    error::{ServiceError, ServiceResult},
    repository::SequenceStore,
    utils::clock::Clock,
};

#[derive(Clone)]
pub struct NumberingAllocator {
    store: Arc<dyn SequenceStore>,
    clock: Arc<dyn Clock>,
}

impl NumberingAllocator {
    pub fn new(store: Arc<dyn SequenceStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Reserves the next number. Numbers only grow; gaps are allowed, repeats are not.
    pub fn allocate(&self, company_id: Uuid, series: i32) -> ServiceResult<i32> {
        if !(0..=MAX_SERIES).contains(&series) {
            return Err(ServiceError::bad_request(format!("Series must be between 0 and {}", MAX_SERIES))
                .with_context(|ctx| ctx.with_tag("numbering").with_metadata("series", series.to_string())));
        }

        let number = self
            .store
            .next_number(company_id, series, self.clock.now())
            .map_err(|e| e.with_tag("numbering"))?;

        if number > MAX_DOCUMENT_NUMBER {
            return Err(ServiceError::limit_exceeded(format!(
                "Series {} has no numbers left (max {})",
                series, MAX_DOCUMENT_NUMBER
            ))
            .with_context(|ctx| {
                ctx.with_tag("numbering")
                    .with_metadata("company_id", company_id.to_string())
                    .with_metadata("series", series.to_string())
            }));
        }

        log::debug!("Allocated number {} for company {} series {}", number, company_id, series);
        Ok(number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{repository::InMemoryStore, utils::clock::SystemClock};

    fn allocator() -> NumberingAllocator {
        NumberingAllocator::new(Arc::new(InMemoryStore::new()), Arc::new(SystemClock))
    }

    #[test]
    fn numbers_start_at_one_and_increase() {
        let allocator = allocator();
        let company = Uuid::new_v4();
        let numbers: Vec<i32> = (0..5).map(|_| allocator.allocate(company, 1).unwrap()).collect();
        assert_eq!(numbers, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn out_of_range_series_is_rejected_before_touching_the_counter() {
        let allocator = allocator();
        let company = Uuid::new_v4();
        assert!(allocator.allocate(company, 1000).is_err());
        assert!(allocator.allocate(company, -1).is_err());
        assert_eq!(allocator.allocate(company, 999).unwrap(), 1);
    }
}
