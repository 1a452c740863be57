//! Index-range pagination over the content store's post ordering.

use std::{fmt, num::NonZeroUsize};

use super::error::DomainError;

const DEFAULT_PAGE_SIZE: NonZeroUsize = match NonZeroUsize::new(6) {
    Some(size) => size,
    None => panic!("default page size must be non-zero"),
};

/// Number of posts rendered initially and appended by each "load more".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PageSize(NonZeroUsize);

impl PageSize {
    pub fn new(value: usize) -> Result<Self, DomainError> {
        NonZeroUsize::new(value)
            .map(Self)
            .ok_or_else(|| DomainError::validation("page_size", "must be greater than zero"))
    }

    pub fn get(self) -> usize {
        self.0.get()
    }
}

impl Default for PageSize {
    fn default() -> Self {
        Self(DEFAULT_PAGE_SIZE)
    }
}

impl fmt::Display for PageSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Half-open range `[start, end)` over posts ordered by publish date, newest first.
///
/// `end > start` always holds, so a request never asks for an empty page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PageRequest {
    start: usize,
    end: usize,
}

impl PageRequest {
    pub fn new(start: usize, end: usize) -> Result<Self, DomainError> {
        if end <= start {
            return Err(DomainError::validation(
                "page_request",
                format!("range end {end} must be greater than start {start}"),
            ));
        }
        Ok(Self { start, end })
    }

    /// The seed page: `[0, size)`.
    pub fn first(size: PageSize) -> Self {
        Self {
            start: 0,
            end: size.get(),
        }
    }

    /// The page that follows `loaded` items already on screen.
    pub fn following(loaded: usize, size: PageSize) -> Result<Self, DomainError> {
        let end = loaded.checked_add(size.get()).ok_or_else(|| {
            DomainError::validation("page_request", format!("range start {loaded} is too large"))
        })?;
        Self::new(loaded, end)
    }

    pub fn start(&self) -> usize {
        self.start
    }

    pub fn end(&self) -> usize {
        self.end
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// A range is never empty; provided for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        false
    }
}

impl fmt::Display for PageRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_page_size_is_six() {
        assert_eq!(PageSize::default().get(), 6);
    }

    #[test]
    fn zero_page_size_is_rejected() {
        let err = PageSize::new(0).expect_err("zero page size");
        assert!(matches!(
            err,
            DomainError::Validation {
                field: "page_size",
                ..
            }
        ));
    }

    #[test]
    fn empty_or_inverted_ranges_are_rejected() {
        assert!(PageRequest::new(3, 3).is_err());
        assert!(PageRequest::new(4, 2).is_err());
    }

    #[test]
    fn following_starts_at_loaded_count() {
        let size = PageSize::new(6).expect("page size");
        let request = PageRequest::following(12, size).expect("range");
        assert_eq!((request.start(), request.end()), (12, 18));
        assert_eq!(request.len(), 6);
        assert_eq!(request.to_string(), "[12, 18)");
    }

    #[test]
    fn following_rejects_overflowing_start() {
        let size = PageSize::default();
        assert!(PageRequest::following(usize::MAX - 2, size).is_err());
    }

    #[test]
    fn first_page_covers_page_size() {
        let request = PageRequest::first(PageSize::default());
        assert_eq!((request.start(), request.end()), (0, 6));
    }
}
