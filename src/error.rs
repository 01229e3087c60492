use thiserror::Error;

/// Errors surfaced by flow-space mutations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Error {
    /// The region supplied to an insert contains an empty interval and
    /// therefore covers no points.
    #[error("cannot insert an empty region")]
    EmptyRegion,

    /// The entry handle was invalidated by an insert or erase performed
    /// after it was obtained.
    #[error("entry handle no longer refers to a live element")]
    StaleEntry,
}

/// Failure to parse an [`Interval`] from its text form.
///
/// [`Interval`]: crate::Interval
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseIntervalError<E> {
    /// The input was empty or contained only separators.
    #[error("empty interval text")]
    Empty,

    /// An endpoint failed to parse as the metric type.
    #[error("invalid interval endpoint: {0}")]
    Endpoint(E),
}
