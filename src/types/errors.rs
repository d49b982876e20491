use std::fmt;

// === AnchorError ===

/// Reasons a selection or a stored anchor cannot be mapped onto the live document.
#[derive(Debug, Clone, PartialEq)]
pub enum AnchorError {
    /// There is no selection, it is collapsed, or it contains only whitespace.
    EmptySelection,
    /// No ancestor of the selection start carries a message identifier.
    NoEnclosingMessage,
    /// A selection boundary is not a text node inside the message.
    UnresolvedBoundary,
    /// The resolved offsets do not describe a forward span.
    InvalidOffsets { start: usize, end: usize },
    /// The message with the given id is not in the document.
    MessageMissing(String),
    /// The offsets fall outside the message text or its content changed.
    Stale(String),
    /// No bookmark with the given id exists.
    UnknownBookmark(String),
}

impl fmt::Display for AnchorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnchorError::EmptySelection => write!(f, "Selection is empty"),
            AnchorError::NoEnclosingMessage => {
                write!(f, "Selection is not inside a message")
            }
            AnchorError::UnresolvedBoundary => {
                write!(f, "Selection boundary could not be resolved")
            }
            AnchorError::InvalidOffsets { start, end } => {
                write!(f, "Invalid anchor offsets: {}..{}", start, end)
            }
            AnchorError::MessageMissing(id) => write!(f, "Message not found: {}", id),
            AnchorError::Stale(id) => write!(f, "Stale anchor: {}", id),
            AnchorError::UnknownBookmark(id) => write!(f, "Bookmark not found: {}", id),
        }
    }
}

impl std::error::Error for AnchorError {}

// === StoreError ===

/// Errors returned by bookmark store mutations. None of them change the stored list.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreError {
    /// Bookmark with the given ID was not found.
    NotFound(String),
    /// An existing bookmark (id attached) already covers the same anchor.
    DuplicateAnchor(String),
    /// A bookmark with the same ID already exists.
    DuplicateId(String),
    /// The bookmark offsets violate `start < end`.
    InvalidAnchor { start: usize, end: usize },
    /// The new description is blank.
    EmptyDescription,
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::NotFound(id) => write!(f, "Bookmark not found: {}", id),
            StoreError::DuplicateAnchor(id) => {
                write!(f, "Anchor already bookmarked: {}", id)
            }
            StoreError::DuplicateId(id) => write!(f, "Bookmark already exists: {}", id),
            StoreError::InvalidAnchor { start, end } => {
                write!(f, "Invalid bookmark offsets: {}..{}", start, end)
            }
            StoreError::EmptyDescription => write!(f, "Bookmark description is empty"),
        }
    }
}

impl std::error::Error for StoreError {}

// === PersistenceError ===

/// Errors raised by a storage backend.
#[derive(Debug, Clone, PartialEq)]
pub enum PersistenceError {
    /// The backend is missing or refused the operation.
    Unavailable(String),
    /// Database operation failed.
    DatabaseError(String),
    /// Stored data could not be encoded or decoded.
    SerializationError(String),
}

impl fmt::Display for PersistenceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PersistenceError::Unavailable(msg) => write!(f, "Storage unavailable: {}", msg),
            PersistenceError::DatabaseError(msg) => {
                write!(f, "Storage database error: {}", msg)
            }
            PersistenceError::SerializationError(msg) => {
                write!(f, "Storage serialization error: {}", msg)
            }
        }
    }
}

impl std::error::Error for PersistenceError {}

impl From<rusqlite::Error> for PersistenceError {
    fn from(e: rusqlite::Error) -> Self {
        PersistenceError::DatabaseError(e.to_string())
    }
}

impl From<serde_json::Error> for PersistenceError {
    fn from(e: serde_json::Error) -> Self {
        PersistenceError::SerializationError(e.to_string())
    }
}

// === SettingsError ===

/// Errors related to settings management.
#[derive(Debug)]
pub enum SettingsError {
    /// An I/O error occurred while reading or writing settings.
    IoError(String),
    /// Failed to serialize or deserialize settings.
    SerializationError(String),
    /// The provided settings key is invalid.
    InvalidKey(String),
    /// The provided settings value is invalid.
    InvalidValue(String),
}

impl fmt::Display for SettingsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingsError::IoError(msg) => write!(f, "Settings I/O error: {}", msg),
            SettingsError::SerializationError(msg) => {
                write!(f, "Settings serialization error: {}", msg)
            }
            SettingsError::InvalidKey(key) => write!(f, "Invalid settings key: {}", key),
            SettingsError::InvalidValue(msg) => {
                write!(f, "Invalid settings value: {}", msg)
            }
        }
    }
}

impl std::error::Error for SettingsError {}
