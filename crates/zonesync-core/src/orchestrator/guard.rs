//! Scoped re-entrancy guard for record transitions

use crate::model::Record;
use std::ops::{Deref, DerefMut};

/// Holds a record's `syncing` flag for the duration of one transition
///
/// Acquiring sets `syncing = true`; dropping the guard clears it, on every
/// exit path including `?` and panics.
#[derive(Debug)]
pub struct SyncGuard<'a> {
    record: &'a mut Record,
}

impl<'a> SyncGuard<'a> {
    /// Mark `record` as syncing
    ///
    /// Returns `None` when a transition is already in flight for it.
    pub fn acquire(record: &'a mut Record) -> Option<Self> {
        if record.sync.syncing {
            return None;
        }
        record.sync.syncing = true;
        Some(Self { record })
    }
}

impl Deref for SyncGuard<'_> {
    type Target = Record;

    fn deref(&self) -> &Record {
        self.record
    }
}

impl DerefMut for SyncGuard<'_> {
    fn deref_mut(&mut self) -> &mut Record {
        self.record
    }
}

impl Drop for SyncGuard<'_> {
    fn drop(&mut self) {
        self.record.sync.syncing = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DomainId, RecordId, RecordType};

    fn record() -> Record {
        Record::new(RecordId(1), DomainId(1), RecordType::A, "www", "1.2.3.4")
    }

    #[test]
    fn guard_sets_and_clears_flag() {
        let mut r = record();
        {
            let guard = SyncGuard::acquire(&mut r).unwrap();
            assert!(guard.sync.syncing);
        }
        assert!(!r.sync.syncing);
    }

    #[test]
    fn nested_acquire_is_refused() {
        let mut r = record();
        r.sync.syncing = true;
        assert!(SyncGuard::acquire(&mut r).is_none());
        // A refused acquire leaves the outer owner's flag alone
        assert!(r.sync.syncing);
    }

    #[test]
    fn flag_cleared_on_early_return() {
        fn fails(record: &mut Record) -> Result<(), &'static str> {
            let _guard = SyncGuard::acquire(record).ok_or("busy")?;
            Err("remote down")
        }

        let mut r = record();
        assert_eq!(fails(&mut r), Err("remote down"));
        assert!(!r.sync.syncing);
    }
}
