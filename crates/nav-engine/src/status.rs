//! Status codes for navigation engine operations

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, Status>;

/// Status enum for engine operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    /// Operation was successful
    Success,
    /// Operation failed due to an unknown reason
    Failure,
    /// Provided parameter was invalid
    InvalidParam,
    /// Operation ran out of memory
    OutOfMemory,
    /// Polygon or tile reference does not resolve to live data
    InvalidRef,
    /// A tile already occupies the requested location or slot
    AlreadyExists,
    /// Value does not exist or is not found
    NotFound,
    /// Input data is corrupted or truncated
    DataCorrupted,
    /// Data has wrong magic number
    WrongMagic,
    /// Data has wrong version
    WrongVersion,
}

impl Status {
    /// Checks if the status is a failure
    pub fn is_failure(&self) -> bool {
        *self != Status::Success
    }

    /// Checks if the status is a success
    pub fn is_success(&self) -> bool {
        *self == Status::Success
    }

    /// Converts status to a result
    pub fn to_result<T>(self, value: T) -> Result<T> {
        if self.is_success() {
            Ok(value)
        } else {
            Err(self)
        }
    }
}

impl std::error::Error for Status {}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Status::Success => write!(f, "Success"),
            Status::Failure => write!(f, "Failure"),
            Status::InvalidParam => write!(f, "Invalid parameter"),
            Status::OutOfMemory => write!(f, "Out of memory"),
            Status::InvalidRef => write!(f, "Invalid reference"),
            Status::AlreadyExists => write!(f, "Value already exists"),
            Status::NotFound => write!(f, "Value not found"),
            Status::DataCorrupted => write!(f, "Data corrupted"),
            Status::WrongMagic => write!(f, "Wrong magic number"),
            Status::WrongVersion => write!(f, "Wrong version"),
        }
    }
}

impl From<std::io::Error> for Status {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::UnexpectedEof => Status::DataCorrupted,
            std::io::ErrorKind::OutOfMemory => Status::OutOfMemory,
            _ => Status::Failure,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_to_result() {
        assert_eq!(Status::Success.to_result(7), Ok(7));
        assert_eq!(Status::WrongMagic.to_result(7), Err(Status::WrongMagic));
        assert!(Status::OutOfMemory.is_failure());
    }

    #[test]
    fn test_short_read_maps_to_corruption() {
        let err = std::io::Error::from(std::io::ErrorKind::UnexpectedEof);
        assert_eq!(Status::from(err), Status::DataCorrupted);
    }
}
