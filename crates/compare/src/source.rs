//! Record source contract.
//!
//! A source is opened against a [`Descriptor`], yields flat records lazily and
//! is closed exactly once. Whether records come from a file or a store is the
//! implementation's business; the index code only sees this trait.

use crate::config::Descriptor;
use crate::error::SourceError;
use crate::value::Record;

pub trait RecordSource {
    /// Name of the resource this source reads for `descriptor`, for diagnostics.
    fn describe(&self, descriptor: &Descriptor) -> String;

    fn open(&self, descriptor: &Descriptor) -> Result<Box<dyn RecordHandle>, SourceError>;
}

impl<S: RecordSource + ?Sized> RecordSource for Box<S> {
    fn describe(&self, descriptor: &Descriptor) -> String {
        (**self).describe(descriptor)
    }

    fn open(&self, descriptor: &Descriptor) -> Result<Box<dyn RecordHandle>, SourceError> {
        (**self).open(descriptor)
    }
}

/// An open resource. Records are produced once, in order; there is no rewind.
pub trait RecordHandle {
    fn next_record(&mut self) -> Option<Result<Record, SourceError>>;

    /// Release the resource. Calling it again is a no-op.
    fn close(&mut self);
}

/// Owns an open handle and closes it exactly once, on [`ScopedHandle::close`]
/// or on drop, whichever comes first.
pub struct ScopedHandle {
    inner: Box<dyn RecordHandle>,
    closed: bool,
}

impl ScopedHandle {
    pub fn new(inner: Box<dyn RecordHandle>) -> Self {
        Self { inner, closed: false }
    }

    pub fn close(mut self) {
        self.close_inner();
    }

    fn close_inner(&mut self) {
        if !self.closed {
            self.closed = true;
            self.inner.close();
        }
    }
}

impl Iterator for ScopedHandle {
    type Item = Result<Record, SourceError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.closed {
            return None;
        }
        self.inner.next_record()
    }
}

impl Drop for ScopedHandle {
    fn drop(&mut self) {
        self.close_inner();
    }
}

// ---------------------------------------------------------------------------
// In-memory source (tests and the `test-util` feature)
// ---------------------------------------------------------------------------

#[cfg(any(test, feature = "test-util"))]
pub use memory::MemorySource;

#[cfg(any(test, feature = "test-util"))]
mod memory {
    use std::cell::{Cell, RefCell};
    use std::collections::VecDeque;
    use std::rc::Rc;

    use super::{RecordHandle, RecordSource};
    use crate::config::Descriptor;
    use crate::error::SourceError;
    use crate::value::Record;

    /// A source over records held in memory. Counts opens and closes so callers
    /// can check the acquisition lifecycle.
    #[derive(Debug, Clone)]
    pub struct MemorySource {
        name: String,
        items: Option<Vec<Result<Record, SourceError>>>,
        opens: Rc<Cell<usize>>,
        closes: Rc<Cell<usize>>,
        last_descriptor: Rc<RefCell<Option<Descriptor>>>,
    }

    impl MemorySource {
        pub fn new(name: impl Into<String>, records: Vec<Record>) -> Self {
            Self::with_items(name, records.into_iter().map(Ok).collect())
        }

        /// Records interleaved with read errors.
        pub fn with_items(name: impl Into<String>, items: Vec<Result<Record, SourceError>>) -> Self {
            Self {
                name: name.into(),
                items: Some(items),
                opens: Rc::default(),
                closes: Rc::default(),
                last_descriptor: Rc::default(),
            }
        }

        /// A source whose resource can never be opened.
        pub fn unavailable(name: impl Into<String>) -> Self {
            Self { items: None, ..Self::new(name, Vec::new()) }
        }

        pub fn open_count(&self) -> usize {
            self.opens.get()
        }

        pub fn close_count(&self) -> usize {
            self.closes.get()
        }

        pub fn last_descriptor(&self) -> Option<Descriptor> {
            self.last_descriptor.borrow().clone()
        }
    }

    impl RecordSource for MemorySource {
        fn describe(&self, _descriptor: &Descriptor) -> String {
            self.name.clone()
        }

        fn open(&self, descriptor: &Descriptor) -> Result<Box<dyn RecordHandle>, SourceError> {
            *self.last_descriptor.borrow_mut() = Some(descriptor.clone());
            let items = self
                .items
                .clone()
                .ok_or_else(|| SourceError::open(&self.name, "no such resource"))?;
            self.opens.set(self.opens.get() + 1);
            Ok(Box::new(MemoryHandle {
                items: items.into(),
                closes: Rc::clone(&self.closes),
                closed: false,
            }))
        }
    }

    struct MemoryHandle {
        items: VecDeque<Result<Record, SourceError>>,
        closes: Rc<Cell<usize>>,
        closed: bool,
    }

    impl RecordHandle for MemoryHandle {
        fn next_record(&mut self) -> Option<Result<Record, SourceError>> {
            self.items.pop_front()
        }

        fn close(&mut self) {
            if !self.closed {
                self.closed = true;
                self.closes.set(self.closes.get() + 1);
            }
        }
    }
}
