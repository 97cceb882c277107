use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SharedError {
    #[error("Unknown collection: {0}")]
    UnknownCollection(String),

    #[error("Record does not match {entity}: {reason}")]
    EntityDecode {
        entity: &'static str,
        reason: String,
    },
}
