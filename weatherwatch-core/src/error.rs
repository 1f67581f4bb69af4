use thiserror::Error;

/// Failure kinds reported by the upstream adapters.
///
/// Adapters log the underlying cause and collapse it to one of these, so
/// callers never see transport errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LookupError {
    #[error("place could not be resolved")]
    NotFound,
    #[error("upstream data is unavailable")]
    Unavailable,
}

/// Errors returned by [`crate::report::Aggregator::full_report`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReportError {
    /// The place name did not resolve. Carries the normalized user input.
    #[error("Place '{name}' was not found.")]
    Resolution { name: String },

    /// Current conditions are mandatory; the report cannot be built without them.
    #[error("Could not get current weather for {place}.")]
    WeatherUnavailable { place: String },
}
