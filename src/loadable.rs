//! A four-state wrapper for values that are fetched asynchronously.
//!
//! A `Loadable` is never mutated in place. Callers build a new one for every transition and
//! publish it as a whole, so an observer can never see a half-updated state.

use crate::Error;
use std::sync::Arc;

/// How far along a fetch is.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub enum Progress {
    #[default]
    Indeterminate,
    /// A fraction between 0.0 and 1.0.
    Fraction(f32),
}

/// The state of an asynchronously fetched value.
#[derive(Debug, Clone)]
pub enum Loadable<T> {
    /// Nothing has been fetched yet.
    Empty,
    /// A fetch is in flight.
    Loading(Progress),
    /// The value has arrived.
    Available(T),
    /// The fetch failed.
    Error(Arc<Error>),
}

impl<T> Default for Loadable<T> {
    fn default() -> Self {
        Loadable::Empty
    }
}

impl<T> Loadable<T> {
    pub fn empty() -> Self {
        Loadable::Empty
    }

    pub fn loading(progress: Option<f32>) -> Self {
        Loadable::Loading(progress.map_or(Progress::Indeterminate, Progress::Fraction))
    }

    pub fn available(value: T) -> Self {
        Loadable::Available(value)
    }

    pub fn error(error: impl Into<Arc<Error>>) -> Self {
        Loadable::Error(error.into())
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Loadable::Empty)
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, Loadable::Loading(_))
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Loadable::Available(_))
    }

    pub fn has_error(&self) -> bool {
        matches!(self, Loadable::Error(_))
    }

    /// The value, only in the `Available` state.
    pub fn value(&self) -> Option<&T> {
        match self {
            Loadable::Available(value) => Some(value),
            _ => None,
        }
    }

    pub fn into_value(self) -> Option<T> {
        match self {
            Loadable::Available(value) => Some(value),
            _ => None,
        }
    }

    pub fn progress(&self) -> Option<Progress> {
        match self {
            Loadable::Loading(progress) => Some(*progress),
            _ => None,
        }
    }

    pub fn error_ref(&self) -> Option<&Error> {
        match self {
            Loadable::Error(e) => Some(e.as_ref()),
            _ => None,
        }
    }

    /// Transforms the available value, carrying every other state across unchanged.
    pub fn map<U, F>(self, f: F) -> Loadable<U>
    where
        F: FnOnce(T) -> U,
    {
        match self {
            Loadable::Empty => Loadable::Empty,
            Loadable::Loading(p) => Loadable::Loading(p),
            Loadable::Available(value) => Loadable::Available(f(value)),
            Loadable::Error(e) => Loadable::Error(e),
        }
    }

    /// The lowercase state name: `empty`, `loading`, `available` or `error`.
    pub fn state_name(&self) -> &'static str {
        match self {
            Loadable::Empty => "empty",
            Loadable::Loading(_) => "loading",
            Loadable::Available(_) => "available",
            Loadable::Error(_) => "error",
        }
    }
}
