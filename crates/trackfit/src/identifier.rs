use crate::category::Category;
use crate::counter::{CounterStore, StoreError, parse_counter};

/// Attempts before `commit_identifier` gives up on a contended counter.
pub const MAX_COMMIT_ATTEMPTS: usize = 8;

/// Result of an identifier lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentifierLease {
    /// `prefix + pad4(counter)`, e.g. `RC0007`.
    pub identifier: String,
    /// Value to persist once the identifier is actually used.
    pub next_counter: u64,
    pub storage_key: String,
    /// Raw stored value the lease was computed from.
    pub observed: Option<String>,
}

/// Zero-pads to four digits. Wider counters are kept as-is.
pub fn format_identifier(category: Category, counter: u64) -> String {
    format!("{}{:04}", category.prefix(), counter)
}

/// Reads the counter for `category` and formats the identifier it would get.
/// Pure read: the store is never written.
///
/// Fails with [`StoreError::Exhausted`] when the stored counter has no
/// successor in `u64`, instead of wrapping back to 1.
pub fn next_identifier(
    store: &dyn CounterStore,
    category: Category,
) -> Result<IdentifierLease, StoreError> {
    let storage_key = category.storage_key();
    let observed = store.read(&storage_key)?;
    let Some(next_counter) =
        parse_counter(observed.as_deref()).and_then(|counter| counter.checked_add(1))
    else {
        return Err(StoreError::Exhausted { key: storage_key });
    };
    let counter = next_counter - 1;

    Ok(IdentifierLease {
        identifier: format_identifier(category, counter),
        next_counter,
        storage_key,
        observed,
    })
}

/// Takes the next identifier for `category` and persists the incremented
/// counter, retrying when another writer moved the counter in between.
pub fn commit_identifier(
    store: &dyn CounterStore,
    category: Category,
) -> Result<IdentifierLease, StoreError> {
    for attempt in 1..=MAX_COMMIT_ATTEMPTS {
        let lease = next_identifier(store, category)?;
        if store.compare_and_swap(
            &lease.storage_key,
            lease.observed.as_deref(),
            lease.next_counter,
        )? {
            tracing::debug!(
                identifier = %lease.identifier,
                next = lease.next_counter,
                attempt,
                "identifier committed"
            );
            return Ok(lease);
        }
        tracing::warn!(
            key = %lease.storage_key,
            attempt,
            "counter changed concurrently, retrying"
        );
    }

    Err(StoreError::Contended {
        key: category.storage_key(),
    })
}
