use crate::models::ServiceKind;
use std::time::Duration;
use thiserror::Error;

/// Failure of an HTTP or SOAP exchange with the camera
#[derive(Debug, Error)]
pub enum TransportError {
    /// The request never produced a response (connection refused, timeout, body read)
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("{url} responded with HTTP {status}")]
    Status { url: String, status: u16 },

    /// The body was not well-formed XML
    #[error("XML parsing error: {0}")]
    Xml(String),

    /// The body parsed but lacks the structure the caller expects
    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

impl TransportError {
    pub fn request<E>(url: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        TransportError::Request {
            url: url.into(),
            source: Box::new(source),
        }
    }

    pub fn malformed(what: impl Into<String>) -> Self {
        TransportError::MalformedResponse(what.into())
    }
}

#[derive(Debug, Error)]
pub enum Error {
    /// No matching SSDP response arrived within the wait window
    #[error("camera not found: no SSDP response within {}ms", .0.as_millis())]
    DiscoveryTimeout(Duration),

    /// Any failure while fetching, parsing or classifying the service directory
    #[error("error when discovering available services")]
    Discovery(#[source] Box<Error>),

    #[error("{0} service not discovered yet")]
    ServiceNotFound(ServiceKind),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("tree not created, run generate_tree first")]
    TreeNotBuilt,

    #[error("no entry for {0} in date index")]
    RecordNotFound(String),

    #[error("invalid device URL: {0}")]
    InvalidUrl(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Wrap a sub-step failure of service discovery
    pub fn discovery(cause: Error) -> Self {
        match cause {
            already @ Error::Discovery(_) => already,
            other => Error::Discovery(Box::new(other)),
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_discovery_wraps_cause_once() {
        let err = Error::discovery(Error::InvalidUrl("bad".to_string()));
        let twice = Error::discovery(err);

        match &twice {
            Error::Discovery(inner) => assert!(matches!(**inner, Error::InvalidUrl(_))),
            other => panic!("Expected Discovery error, got {:?}", other),
        }
        assert!(twice.source().is_some());
    }

    #[test]
    fn test_timeout_message() {
        let err = Error::DiscoveryTimeout(Duration::from_millis(100));
        assert_eq!(err.to_string(), "camera not found: no SSDP response within 100ms");
    }

    #[test]
    fn test_service_not_found_message() {
        let err = Error::ServiceNotFound(ServiceKind::DigitalImaging);
        assert_eq!(err.to_string(), "DigitalImaging service not discovered yet");
    }
}
