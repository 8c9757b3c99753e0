use thiserror::Error;

/// Failures of the editing core. Every variant means "this one edit did not
/// happen"; none of them leave the document partially modified.
#[derive(Debug, Error)]
pub enum EditorError {
    /// The document and schema disagree (unknown variant, missing list
    /// element type, attribute not declared on a variant).
    #[error("schema error: {0}")]
    Schema(String),

    /// The constructor-equivalent for a variant is missing or the source
    /// graph cannot be duplicated.
    #[error("cannot clone {variant}: {reason}")]
    CloneFailure { variant: String, reason: String },

    /// A paste/import/drop payload does not satisfy the destination list's
    /// element-type constraint.
    #[error("cannot place {payload} into a list of {constraint}")]
    TypeIncompatibility { payload: String, constraint: String },

    /// The requested destination is not a legal place for the element
    /// (no list at the target, or the target lies inside the moved subtree).
    #[error("invalid target: {0}")]
    InvalidTarget(String),

    #[error(transparent)]
    Codec(#[from] CodecError),
}

/// Decode/encode failure with the byte offset where it was detected.
#[derive(Debug, Error)]
#[error("{message} (at byte {offset})")]
pub struct CodecError {
    pub offset: u64,
    pub message: String,
}

impl CodecError {
    pub fn new(offset: u64, message: impl Into<String>) -> Self {
        Self {
            offset,
            message: message.into(),
        }
    }
}

pub type EditorResult<T> = Result<T, EditorError>;
