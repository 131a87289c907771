//! Network link abstraction

use thiserror_no_std::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkError {
    #[error("association with the access point failed")]
    AssociationFailed,
    #[error("radio driver error: {0}")]
    Driver(&'static str),
}

/// Station-mode link to the access point.
pub trait NetworkLink {
    fn is_connected(&mut self) -> bool;
    fn reconnect(&mut self) -> impl Future<Output = Result<(), NetworkError>>;
}
