//! Error handling for the VME bridge core
//!
//! Every operation of the core ends in one of nine signed status codes. The
//! `ErrorCode` enum reproduces those codes bit-for-bit; `VmeError` carries the
//! diagnostic detail for Rust callers and always maps back to exactly one code.

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// ErrorCode - caller-visible status
// ============================================================================

/// Signed status returned across the bridge boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i32)]
pub enum ErrorCode {
    Success = 0,
    BusError = -1,
    CommError = -2,
    GenericError = -3,
    InvalidParam = -4,
    TimeoutError = -5,
    AlreadyOpenError = -6,
    MaxBoardCountError = -7,
    NotSupported = -8,
}

impl ErrorCode {
    /// All defined codes, in wire order
    pub const ALL: [ErrorCode; 9] = [
        ErrorCode::Success,
        ErrorCode::BusError,
        ErrorCode::CommError,
        ErrorCode::GenericError,
        ErrorCode::InvalidParam,
        ErrorCode::TimeoutError,
        ErrorCode::AlreadyOpenError,
        ErrorCode::MaxBoardCountError,
        ErrorCode::NotSupported,
    ];

    pub const fn as_raw(self) -> i32 {
        self as i32
    }

    pub fn from_raw(raw: i32) -> Option<Self> {
        Self::ALL.into_iter().find(|code| code.as_raw() == raw)
    }

    pub fn is_success(self) -> bool {
        self == ErrorCode::Success
    }

    /// CommError and MaxBoardCountError leave the handle unusable; the caller
    /// should close and reopen it.
    pub fn is_session_fatal(self) -> bool {
        matches!(self, ErrorCode::CommError | ErrorCode::MaxBoardCountError)
    }

    pub fn decode(self) -> &'static str {
        decode_error(self)
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.decode())
    }
}

impl TryFrom<i32> for ErrorCode {
    type Error = VmeError;

    fn try_from(raw: i32) -> Result<Self, Self::Error> {
        Self::from_raw(raw).ok_or_else(|| VmeError::invalid_param("code", format!("{raw}")))
    }
}

/// Diagnostic text for a status code. Stable across releases.
pub fn decode_error(code: ErrorCode) -> &'static str {
    match code {
        ErrorCode::Success => "Operation completed successfully",
        ErrorCode::BusError => "VME bus error during the cycle",
        ErrorCode::CommError => "Communication error",
        ErrorCode::GenericError => "Unspecified error",
        ErrorCode::InvalidParam => "Invalid parameter",
        ErrorCode::TimeoutError => "Timeout error",
        ErrorCode::AlreadyOpenError => "Device already open",
        ErrorCode::MaxBoardCountError => "Maximum number of devices exceeded",
        ErrorCode::NotSupported => "Not supported by the device",
    }
}

/// Like [`decode_error`] but for raw wire values, including undefined ones.
pub fn decode_raw(raw: i32) -> &'static str {
    match ErrorCode::from_raw(raw) {
        Some(code) => decode_error(code),
        None => "Unknown error code",
    }
}

// ============================================================================
// VmeError - Main error type
// ============================================================================

#[derive(Debug, Error)]
pub enum VmeError {
    // ======================================
    // Bus Errors
    // ======================================
    #[error("VME bus error at {address:#010x}")]
    BusError { address: u32 },

    // ======================================
    // Link Errors
    // ======================================
    #[error("Communication error: {0}")]
    Communication(String),

    #[error("Invalid or closed handle: {0}")]
    InvalidHandle(i32),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // ======================================
    // Validation Errors
    // ======================================
    #[error("Invalid parameter: {param}: {reason}")]
    InvalidParameter { param: String, reason: String },

    // ======================================
    // Wait Errors
    // ======================================
    #[error("Timeout waiting for {0}")]
    Timeout(String),

    // ======================================
    // Session Table Errors
    // ======================================
    #[error("Link already open: {0}")]
    AlreadyOpen(String),

    #[error("Maximum number of open devices reached ({0})")]
    MaxBoardCount(usize),

    // ======================================
    // Capability Errors
    // ======================================
    #[error("{feature} not supported by {board}")]
    NotSupported { board: String, feature: String },

    // ======================================
    // Async transfer bookkeeping
    // ======================================
    #[error("Asynchronous block transfer pending on handle {0}")]
    TransferPending(i32),

    #[error("No asynchronous block transfer pending on handle {0}")]
    NoTransferPending(i32),

    #[error("Generic error: {0}")]
    Generic(String),
}

/// Result type alias using VmeError
pub type VmeResult<T> = Result<T, VmeError>;

impl VmeError {
    pub fn communication(msg: impl Into<String>) -> Self {
        Self::Communication(msg.into())
    }

    pub fn invalid_param(param: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            param: param.into(),
            reason: reason.into(),
        }
    }

    pub fn timeout(what: impl Into<String>) -> Self {
        Self::Timeout(what.into())
    }

    pub fn not_supported(board: impl std::fmt::Display, feature: impl Into<String>) -> Self {
        Self::NotSupported {
            board: board.to_string(),
            feature: feature.into(),
        }
    }

    pub fn generic(msg: impl Into<String>) -> Self {
        Self::Generic(msg.into())
    }

    /// Build an error from a raw status reported by a transport.
    /// `Success` has no error form and maps to `GenericError`.
    pub fn from_code(code: ErrorCode, context: impl Into<String>) -> Self {
        let context = context.into();
        match code {
            ErrorCode::BusError => Self::BusError { address: 0 },
            ErrorCode::CommError => Self::Communication(context),
            ErrorCode::InvalidParam => Self::invalid_param(context, "rejected by device"),
            ErrorCode::TimeoutError => Self::Timeout(context),
            ErrorCode::AlreadyOpenError => Self::AlreadyOpen(context),
            ErrorCode::MaxBoardCountError => Self::MaxBoardCount(0),
            ErrorCode::NotSupported => Self::NotSupported {
                board: "device".to_string(),
                feature: context,
            },
            ErrorCode::Success | ErrorCode::GenericError => Self::Generic(context),
        }
    }

    /// Status code reported to callers for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::BusError { .. } => ErrorCode::BusError,
            Self::Communication(_) | Self::InvalidHandle(_) | Self::Io(_) => ErrorCode::CommError,
            Self::InvalidParameter { .. } => ErrorCode::InvalidParam,
            Self::Timeout(_) => ErrorCode::TimeoutError,
            Self::AlreadyOpen(_) => ErrorCode::AlreadyOpenError,
            Self::MaxBoardCount(_) => ErrorCode::MaxBoardCountError,
            Self::NotSupported { .. } => ErrorCode::NotSupported,
            Self::TransferPending(_) | Self::NoTransferPending(_) | Self::Generic(_) => {
                ErrorCode::GenericError
            },
        }
    }

    pub fn is_session_fatal(&self) -> bool {
        self.code().is_session_fatal()
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::BusError { .. } => ErrorCategory::Bus,
            Self::Communication(_) | Self::Io(_) => ErrorCategory::Link,
            Self::InvalidHandle(_) | Self::AlreadyOpen(_) | Self::MaxBoardCount(_) => {
                ErrorCategory::Session
            },
            Self::InvalidParameter { .. } => ErrorCategory::Validation,
            Self::Timeout(_) => ErrorCategory::Timeout,
            Self::NotSupported { .. } => ErrorCategory::Capability,
            Self::TransferPending(_) | Self::NoTransferPending(_) | Self::Generic(_) => {
                ErrorCategory::Internal
            },
        }
    }

    /// Level at which the core logs this failure
    pub fn log_level(&self) -> tracing::Level {
        use tracing::Level;
        match self.category() {
            ErrorCategory::Link | ErrorCategory::Internal => Level::ERROR,
            ErrorCategory::Bus | ErrorCategory::Timeout | ErrorCategory::Session => Level::WARN,
            ErrorCategory::Validation | ErrorCategory::Capability => Level::DEBUG,
        }
    }
}

/// Signed status of any core result
pub fn status_of<T>(result: &VmeResult<T>) -> i32 {
    match result {
        Ok(_) => ErrorCode::Success.as_raw(),
        Err(e) => e.code().as_raw(),
    }
}

/// Error category - used for classification and log levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Bus,
    Link,
    Session,
    Validation,
    Timeout,
    Capability,
    Internal,
}
