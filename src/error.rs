use thiserror::Error;

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("Buffer too small: header at offset {offset} needs {required} bytes, {available} available")]
    Bounds {
        offset: usize,
        required: usize,
        available: usize,
    },

    #[error("Malformed address: {0}")]
    Format(String),

    #[error("Value {value} out of range for {field} (max {max})")]
    Range {
        field: &'static str,
        value: u32,
        max: u32,
    },

    #[error("Unsupported value: {0}")]
    UnsupportedValue(String),

    #[error("Payload overflow: {required} bytes needed, buffer holds {capacity}")]
    Overflow { required: usize, capacity: usize },

    #[error("Invalid {layer} header length: {length} bytes")]
    InvalidHeaderLength { layer: &'static str, length: usize },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, FrameError>;
