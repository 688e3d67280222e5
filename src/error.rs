use thiserror::Error;

pub type Result<T, E = BlocksError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum BlocksError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid project file: {0}")]
    Format(String),
    #[error("unable to find blocks: project has no sprite target")]
    NoTarget,
    #[error("block {id} is referenced but missing from the target")]
    MalformedClosure { id: String },
    #[error("custom block definition {definition} has no procedures_prototype block")]
    MissingPrototype { definition: String },
}

impl From<serde_json::Error> for BlocksError {
    fn from(e: serde_json::Error) -> Self {
        if e.is_io() {
            BlocksError::Io(e.into())
        } else {
            BlocksError::Format(format!("malformed project.json: {}", e))
        }
    }
}

impl From<zip::result::ZipError> for BlocksError {
    fn from(e: zip::result::ZipError) -> Self {
        match e {
            zip::result::ZipError::Io(io) => BlocksError::Io(io),
            other => BlocksError::Format(other.to_string()),
        }
    }
}
