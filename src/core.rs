//! Pluggable backend contract between the logging front-end and a core.

use crate::entry::Entry;
use crate::error::{Error, Result};
use crate::field::Field;
use crate::level::Level;

/// A logging backend.
///
/// The front-end asks [`Core::check`] whether an entry is wanted, and calls
/// [`CheckedEntry::write`] with the entry's fields if any core accepted it.
/// [`Core::with`] derives a new core carrying extra context fields without
/// touching the original.
pub trait Core: Send + Sync {
    fn enabled(&self, level: Level) -> bool;

    fn with(&self, fields: &[Field]) -> Result<Box<dyn Core>>;

    /// Register this core on `checked` if `entry.level` is enabled; otherwise
    /// return `checked` unchanged.
    fn check<'a>(&'a self, entry: &Entry, checked: Option<CheckedEntry<'a>>) -> Option<CheckedEntry<'a>>;

    fn write(&self, entry: &Entry, fields: &[Field]) -> Result<()>;

    /// Flush buffered output. Terminal for cores that own a transport.
    fn sync(&self) -> Result<()>;
}

/// An entry together with the cores that agreed to write it.
pub struct CheckedEntry<'a> {
    entry: Entry,
    cores: Vec<&'a dyn Core>,
}

impl<'a> CheckedEntry<'a> {
    /// Append `core`, creating the checked entry on first use.
    pub fn add_core(checked: Option<Self>, entry: &Entry, core: &'a dyn Core) -> Self {
        let mut checked = checked.unwrap_or_else(|| CheckedEntry {
            entry: entry.clone(),
            cores: Vec::with_capacity(1),
        });
        checked.cores.push(core);
        checked
    }

    pub fn entry(&self) -> &Entry {
        &self.entry
    }

    pub fn core_count(&self) -> usize {
        self.cores.len()
    }

    /// Write to every registered core; the first error is returned after all
    /// cores have been tried.
    pub fn write(self, fields: &[Field]) -> Result<()> {
        let mut first: Option<Error> = None;
        for core in &self.cores {
            if let Err(e) = core.write(&self.entry, fields) {
                first.get_or_insert(e);
            }
        }
        match first {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingCore {
        min: Level,
        writes: AtomicUsize,
        fail: bool,
    }

    impl CountingCore {
        fn new(min: Level, fail: bool) -> Self {
            CountingCore {
                min,
                writes: AtomicUsize::new(0),
                fail,
            }
        }
    }

    impl Core for CountingCore {
        fn enabled(&self, level: Level) -> bool {
            level >= self.min
        }

        fn with(&self, _fields: &[Field]) -> Result<Box<dyn Core>> {
            Ok(Box::new(CountingCore::new(self.min, self.fail)))
        }

        fn check<'a>(&'a self, entry: &Entry, checked: Option<CheckedEntry<'a>>) -> Option<CheckedEntry<'a>> {
            if self.enabled(entry.level) {
                Some(CheckedEntry::add_core(checked, entry, self))
            } else {
                checked
            }
        }

        fn write(&self, _entry: &Entry, _fields: &[Field]) -> Result<()> {
            self.writes.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(Error::encoding("k", "boom"))
            } else {
                Ok(())
            }
        }

        fn sync(&self) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn disabled_core_leaves_checked_entry_alone() {
        let core = CountingCore::new(Level::Error, false);
        let entry = Entry::new(Level::Info, "skip me");
        assert!(core.check(&entry, None).is_none());
    }

    #[test]
    fn every_core_is_written_even_after_failure() {
        let failing = CountingCore::new(Level::Debug, true);
        let ok = CountingCore::new(Level::Debug, false);
        let entry = Entry::new(Level::Warn, "both");

        let checked = failing.check(&entry, None);
        let checked = ok.check(&entry, checked).unwrap();
        assert_eq!(checked.core_count(), 2);
        assert_eq!(checked.entry().message, "both");

        assert!(checked.write(&[]).is_err());
        assert_eq!(failing.writes.load(Ordering::SeqCst), 1);
        assert_eq!(ok.writes.load(Ordering::SeqCst), 1);
    }
}
