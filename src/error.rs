use snafu::Snafu;

#[derive(Debug, Snafu)]
pub enum Error {
    /// The message body can never be ingested, no matter how many times the
    /// queue redelivers it. The drain loop acknowledges these after a single
    /// attempt.
    #[snafu(display("Invalid backup result payload: {message}"))]
    InvalidPayload { message: String },

    /// A payload did not match one producer format. Only becomes
    /// `InvalidPayload` once every known format has been ruled out.
    #[snafu(display("Payload extraction failed: {message}"))]
    PayloadExtract { message: String },

    #[snafu(display("Queue operation failed"))]
    Queue {
        #[snafu(source(false))]
        source: Option<eyre::Report>,
    },

    /// Failure from a downstream dependency that is expected to clear up on
    /// its own. Retried via queue redelivery up to the receive-count ceiling.
    #[snafu(display("Transient backend error"))]
    Transient {
        #[snafu(source(false))]
        source: Option<eyre::Report>,
    },

    #[snafu(whatever, display("{message}"))]
    Whatever {
        message: String,
        #[snafu(source(from(eyre::Report, Some)))]
        source: Option<eyre::Report>,
    },
}

impl From<eyre::Report> for Error {
    fn from(e: eyre::Report) -> Self {
        Self::Transient { source: Some(e) }
    }
}

impl Error {
    pub fn internal(e: impl Into<eyre::Report>) -> Self {
        Self::Transient {
            source: Some(e.into()),
        }
    }

    pub fn queue(e: impl Into<eyre::Report>) -> Self {
        Self::Queue {
            source: Some(e.into()),
        }
    }

    pub fn invalid_payload(message: impl Into<String>) -> Self {
        Self::InvalidPayload {
            message: message.into(),
        }
    }

    pub fn extract(message: impl Into<String>) -> Self {
        Self::PayloadExtract {
            message: message.into(),
        }
    }

    /// True for errors that no amount of redelivery will fix.
    pub fn is_invalid_payload(&self) -> bool {
        matches!(self, Self::InvalidPayload { .. })
    }
}
