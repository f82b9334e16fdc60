//! Input validation limits for ids, type names and field names
//!
//! These checks are structural and always run, independent of whether a
//! [`Schema`](crate::schema::Schema) is attached to the graph.

/// Maximum length for entity/relation ids (256 bytes)
pub const MAX_ID_LEN: usize = 256;

/// Maximum length for entity/relation type names (128 bytes)
pub const MAX_TYPE_NAME_LEN: usize = 128;

/// Maximum length for custom field names (128 bytes)
pub const MAX_FIELD_NAME_LEN: usize = 128;

/// Upper bound accepted for undo stack sizes (10000)
pub const MAX_UNDO_SIZE: usize = 10_000;

/// Keys owned by the serialized entity/relation layout.
pub const RESERVED_FIELD_NAMES: [&str; 5] = ["id", "type", "metadata", "from", "to"];

/// Limit violation
#[derive(Debug, Clone, PartialEq)]
pub enum LimitError {
    EmptyId,
    IdTooLong { len: usize, max: usize },
    EmptyTypeName,
    TypeNameTooLong { len: usize, max: usize },
    EmptyFieldName,
    FieldNameTooLong { len: usize, max: usize },
    ReservedFieldName(String),
}

impl std::fmt::Display for LimitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyId => write!(f, "Id cannot be empty"),
            Self::IdTooLong { len, max } => {
                write!(f, "Id too long: {} bytes (max {})", len, max)
            }
            Self::EmptyTypeName => write!(f, "Type name cannot be empty"),
            Self::TypeNameTooLong { len, max } => {
                write!(f, "Type name too long: {} bytes (max {})", len, max)
            }
            Self::EmptyFieldName => write!(f, "Field name cannot be empty"),
            Self::FieldNameTooLong { len, max } => {
                write!(f, "Field name too long: {} bytes (max {})", len, max)
            }
            Self::ReservedFieldName(name) => {
                write!(f, "Field name is reserved: {}", name)
            }
        }
    }
}

impl std::error::Error for LimitError {}

/// Validate an entity or relation id
pub fn validate_id(id: &str) -> Result<(), LimitError> {
    if id.is_empty() {
        return Err(LimitError::EmptyId);
    }
    if id.len() > MAX_ID_LEN {
        return Err(LimitError::IdTooLong {
            len: id.len(),
            max: MAX_ID_LEN,
        });
    }
    Ok(())
}

/// Validate an entity or relation type name
pub fn validate_type_name(name: &str) -> Result<(), LimitError> {
    if name.is_empty() {
        return Err(LimitError::EmptyTypeName);
    }
    if name.len() > MAX_TYPE_NAME_LEN {
        return Err(LimitError::TypeNameTooLong {
            len: name.len(),
            max: MAX_TYPE_NAME_LEN,
        });
    }
    Ok(())
}

/// Validate a custom field name
pub fn validate_field_name(name: &str) -> Result<(), LimitError> {
    if name.is_empty() {
        return Err(LimitError::EmptyFieldName);
    }
    if name.len() > MAX_FIELD_NAME_LEN {
        return Err(LimitError::FieldNameTooLong {
            len: name.len(),
            max: MAX_FIELD_NAME_LEN,
        });
    }
    if RESERVED_FIELD_NAMES.contains(&name) {
        return Err(LimitError::ReservedFieldName(name.to_string()));
    }
    Ok(())
}

/// Validate every key of a custom field map
pub fn validate_field_names<'a>(
    names: impl IntoIterator<Item = &'a String>,
) -> Result<(), LimitError> {
    names.into_iter().try_for_each(|name| validate_field_name(name))
}
