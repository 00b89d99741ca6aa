//! Canonical cache key definitions.
//!
//! Every cached value is reachable by exactly one key: two keys built from
//! semantically identical parameters compare equal regardless of construction
//! order or spelling, so no two keys can alias the same query.

use thiserror::Error;

use crate::application::pagination::PageRequest;
use crate::domain::records::{CollectionFilter, RecordId};
use crate::domain::types::EmploymentCategory;

/// Identity of a cached collection page: canonical filter + page coordinates.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CollectionKey {
    filter: CollectionFilter,
    page: u32,
    page_size: u32,
}

impl CollectionKey {
    pub fn builder() -> CollectionKeyBuilder {
        CollectionKeyBuilder::default()
    }

    pub fn filter(&self) -> &CollectionFilter {
        &self.filter
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// The same filter at another page.
    pub fn at_page(&self, page: u32) -> Self {
        Self {
            filter: self.filter.clone(),
            page,
            page_size: self.page_size,
        }
    }
}

/// Unified cache key, for operations addressing either slot class.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum QueryKey {
    Detail(RecordId),
    Collection(CollectionKey),
}

/// Key construction failure: a programmer error, never recovered silently.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum KeyError {
    #[error("required key parameter `{name}` is missing")]
    MissingParameter { name: &'static str },
    #[error("key parameter `{name}` must be at least 1")]
    OutOfRange { name: &'static str },
}

/// Builds a [`CollectionKey`], canonicalizing the filter and validating the
/// page coordinates. Setter order does not affect the resulting key.
#[derive(Debug, Default, Clone)]
pub struct CollectionKeyBuilder {
    category: Option<EmploymentCategory>,
    active: Option<bool>,
    search: Option<String>,
    page: Option<u32>,
    page_size: Option<u32>,
}

impl CollectionKeyBuilder {
    pub fn category(mut self, category: EmploymentCategory) -> Self {
        self.category = Some(category);
        self
    }

    pub fn active(mut self, active: bool) -> Self {
        self.active = Some(active);
        self
    }

    pub fn search(mut self, search: impl Into<String>) -> Self {
        self.search = Some(search.into());
        self
    }

    pub fn page(mut self, page: u32) -> Self {
        self.page = Some(page);
        self
    }

    pub fn page_size(mut self, page_size: u32) -> Self {
        self.page_size = Some(page_size);
        self
    }

    /// Set both page coordinates from a pagination request.
    pub fn paging(mut self, request: PageRequest) -> Self {
        self.page = Some(request.page);
        self.page_size = Some(request.page_size);
        self
    }

    pub fn build(self) -> Result<CollectionKey, KeyError> {
        let page = self
            .page
            .ok_or(KeyError::MissingParameter { name: "page" })?;
        let page_size = self
            .page_size
            .ok_or(KeyError::MissingParameter { name: "page_size" })?;
        if page == 0 {
            return Err(KeyError::OutOfRange { name: "page" });
        }
        if page_size == 0 {
            return Err(KeyError::OutOfRange { name: "page_size" });
        }
        Ok(CollectionKey {
            filter: CollectionFilter::new(self.category, self.active, self.search.as_deref()),
            page,
            page_size,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn setter_order_does_not_change_the_key() {
        let left = CollectionKey::builder()
            .page(1)
            .active(true)
            .category(EmploymentCategory::Permanent)
            .page_size(20)
            .build()
            .expect("valid key");
        let right = CollectionKey::builder()
            .category(EmploymentCategory::Permanent)
            .page_size(20)
            .active(true)
            .page(1)
            .build()
            .expect("valid key");

        assert_eq!(left, right);
    }

    #[test]
    fn search_spelling_does_not_change_the_key() {
        let left = CollectionKey::builder()
            .search("  Cruz ")
            .page(1)
            .page_size(20)
            .build()
            .expect("valid key");
        let right = CollectionKey::builder()
            .search("cruz")
            .page(1)
            .page_size(20)
            .build()
            .expect("valid key");

        assert_eq!(left, right);
    }

    #[test]
    fn missing_coordinates_fail_loudly() {
        let err = CollectionKey::builder()
            .page(1)
            .build()
            .expect_err("page size required");
        assert_eq!(err, KeyError::MissingParameter { name: "page_size" });

        let err = CollectionKey::builder()
            .page_size(20)
            .build()
            .expect_err("page required");
        assert_eq!(err, KeyError::MissingParameter { name: "page" });
    }

    #[test]
    fn zero_coordinates_are_out_of_range() {
        let err = CollectionKey::builder()
            .page(0)
            .page_size(20)
            .build()
            .expect_err("page zero rejected");
        assert_eq!(err, KeyError::OutOfRange { name: "page" });
    }

    #[test]
    fn paging_sets_both_coordinates() {
        let via_request = CollectionKey::builder()
            .active(true)
            .paging(PageRequest::new(2, 20))
            .build()
            .expect("valid key");
        let via_setters = CollectionKey::builder()
            .active(true)
            .page(2)
            .page_size(20)
            .build()
            .expect("valid key");

        assert_eq!(via_request, via_setters);
    }

    #[test]
    fn at_page_keeps_filter_and_size() {
        let key = CollectionKey::builder()
            .active(true)
            .page(1)
            .page_size(20)
            .build()
            .expect("valid key");
        let deeper = key.at_page(3);

        assert_eq!(deeper.page(), 3);
        assert_eq!(deeper.page_size(), 20);
        assert_eq!(deeper.filter(), key.filter());
        assert_ne!(deeper, key);
    }
}
