use std::fmt;

use element_sys as sys;

use crate::mini::mini_object_wrapper;

mini_object_wrapper!(Query, QueryRef, sys::el_query);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryType {
    Position,
    Duration,
    Seeking,
    Unknown(u32),
}

impl QueryType {
    pub fn from_raw(raw: sys::el_query_type) -> Self {
        match raw {
            sys::EL_QUERY_POSITION => QueryType::Position,
            sys::EL_QUERY_DURATION => QueryType::Duration,
            sys::EL_QUERY_SEEKING => QueryType::Seeking,
            other => QueryType::Unknown(other),
        }
    }

    pub fn into_raw(self) -> sys::el_query_type {
        match self {
            QueryType::Position => sys::EL_QUERY_POSITION,
            QueryType::Duration => sys::EL_QUERY_DURATION,
            QueryType::Seeking => sys::EL_QUERY_SEEKING,
            QueryType::Unknown(other) => other,
        }
    }
}

impl Query {
    pub fn new(query_type: QueryType) -> Self {
        Self::from_new(unsafe { sys::el_query_new(query_type.into_raw()) })
    }

    pub fn position() -> Self {
        Self::new(QueryType::Position)
    }

    pub fn duration() -> Self {
        Self::new(QueryType::Duration)
    }

    pub fn seeking() -> Self {
        Self::new(QueryType::Seeking)
    }

    /// Mutable view for answering. Queries are never shared while in flight.
    pub fn as_mut(&mut self) -> &mut QueryRef {
        unsafe { QueryRef::from_mut_ptr(self.0.as_ptr()) }
    }
}

impl QueryRef {
    pub fn query_type(&self) -> QueryType {
        QueryType::from_raw(self.0.query_type)
    }

    /// Raw answer; -1 means unanswered or unknown.
    pub fn value(&self) -> i64 {
        self.0.value
    }

    pub fn set_value(&mut self, value: i64) {
        self.0.value = value;
    }

    /// The answer as an unsigned quantity, `None` when unknown.
    pub fn result(&self) -> Option<u64> {
        u64::try_from(self.0.value).ok()
    }

    pub fn seekable(&self) -> bool {
        self.0.seekable != sys::EL_FALSE
    }

    pub fn set_seekable(&mut self, seekable: bool) {
        self.0.seekable = sys::el_boolean_from(seekable);
    }
}

impl fmt::Debug for QueryRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Query")
            .field("type", &self.query_type())
            .field("value", &self.value())
            .field("seekable", &self.seekable())
            .finish()
    }
}
