//! Page iteration over ordered primary keys
//!
//! Pages are requested either by offset or by cursor ("id greater than the
//! last seen id"). An explicit offset is only honored while nothing has been
//! read yet; once a page has been consumed, or when resuming after a known id,
//! every further page is requested by cursor. The two modes never mix within a
//! single request.

use crate::domain::EntityId;

/// One page request against an entity source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageRequest {
    /// Skip `offset` rows in id order, return up to `limit`
    Offset { offset: usize, limit: usize },
    /// Return up to `limit` rows with id strictly greater than `last_id`
    After { last_id: EntityId, limit: usize },
}

impl PageRequest {
    pub fn limit(&self) -> usize {
        match self {
            PageRequest::Offset { limit, .. } | PageRequest::After { limit, .. } => *limit,
        }
    }

    /// Apply this request to rows already sorted ascending by id
    pub fn slice<'a, T, F>(&self, sorted: &'a [T], id_of: F) -> &'a [T]
    where
        F: Fn(&T) -> EntityId,
    {
        let start = match *self {
            PageRequest::Offset { offset, .. } => offset.min(sorted.len()),
            PageRequest::After { last_id, .. } => sorted.partition_point(|row| id_of(row) <= last_id),
        };
        let end = start.saturating_add(self.limit()).min(sorted.len());
        &sorted[start..end]
    }
}

/// Tracks paging position for one export run
#[derive(Debug, Clone)]
pub struct Pager {
    page_size: usize,
    offset: Option<usize>,
    last_id: EntityId,
    remaining: Option<usize>,
    pages: usize,
    exhausted: bool,
}

impl Pager {
    /// `resume_after` is the last id already exported, `0` for a fresh run
    pub fn new(page_size: usize, offset: Option<usize>, resume_after: EntityId) -> Self {
        if resume_after > 0 && offset.is_some() {
            tracing::debug!(
                resume_after,
                "Ignoring explicit offset; resuming by cursor"
            );
        }

        Self {
            page_size: page_size.max(1),
            offset,
            last_id: resume_after,
            remaining: None,
            pages: 0,
            exhausted: false,
        }
    }

    /// Stop after `limit` records in total
    pub fn with_limit(mut self, limit: Option<usize>) -> Self {
        self.remaining = limit;
        self
    }

    /// The next request, or `None` once the source or the limit is exhausted
    pub fn next_request(&self) -> Option<PageRequest> {
        if self.exhausted {
            return None;
        }

        let limit = match self.remaining {
            Some(0) => return None,
            Some(remaining) => remaining.min(self.page_size),
            None => self.page_size,
        };

        match self.offset {
            Some(offset) if self.last_id == 0 && self.pages == 0 => {
                Some(PageRequest::Offset { offset, limit })
            }
            _ => Some(PageRequest::After {
                last_id: self.last_id,
                limit,
            }),
        }
    }

    /// Record a consumed page; `ids` must be in ascending order
    pub fn advance(&mut self, requested: &PageRequest, ids: &[EntityId]) {
        self.pages += 1;

        if let Some(&max_id) = ids.last() {
            self.last_id = self.last_id.max(max_id);
        }
        if let Some(remaining) = self.remaining.as_mut() {
            *remaining = remaining.saturating_sub(ids.len());
        }
        if ids.len() < requested.limit() {
            self.exhausted = true;
        }
    }

    pub fn last_id(&self) -> EntityId {
        self.last_id
    }

    /// Number of pages consumed so far
    pub fn pages(&self) -> usize {
        self.pages
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// True once the limit is used up
    pub fn limit_reached(&self) -> bool {
        self.remaining == Some(0)
    }
}
