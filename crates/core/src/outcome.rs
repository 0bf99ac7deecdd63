//! Total results for the public store boundary.
//!
//! Callers of the context store never get an error back: every operation
//! yields a value (empty or `false` on failure) plus, when something went
//! wrong, the reason. The reason is also logged once, here.

use crate::error::MemoryError;

#[derive(Debug, Clone)]
pub struct Outcome<T> {
    value: T,
    failure: Option<MemoryError>,
}

impl<T> Outcome<T> {
    pub fn ok(value: T) -> Self {
        Self { value, failure: None }
    }

    /// A degraded result: `value` stands in for what could not be computed.
    pub fn degraded(operation: &str, value: T, failure: MemoryError) -> Self {
        tracing::warn!(operation, error = %failure, "Context store operation degraded");
        Self {
            value,
            failure: Some(failure),
        }
    }

    pub fn succeeded(&self) -> bool {
        self.failure.is_none()
    }

    pub fn failure(&self) -> Option<&MemoryError> {
        self.failure.as_ref()
    }

    pub fn value(&self) -> &T {
        &self.value
    }

    pub fn into_value(self) -> T {
        self.value
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        Outcome {
            value: f(self.value),
            failure: self.failure,
        }
    }
}

impl<T: Default> Outcome<T> {
    /// Fold a fallible result into a total one, defaulting the value on error.
    pub fn from_result(operation: &str, result: Result<T, MemoryError>) -> Self {
        match result {
            Ok(value) => Self::ok(value),
            Err(e) => Self::degraded(operation, T::default(), e),
        }
    }
}
