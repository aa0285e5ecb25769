use thiserror::Error;

/// Errors raised by the platform glue around the location service.
///
/// None of these ever reach the satellite store; a failed activation just
/// means no satellite updates arrive.
#[derive(Debug, Error)]
pub enum GnssError {
    #[error("Not authorized to use location services")]
    LocationUnauthorized,

    #[error("The app context has been lost")]
    AppContextLost,

    #[error("Location service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Invalid event payload: {0}")]
    InvalidPayload(#[from] serde_json::Error),
}
