use thiserror::Error;

/// Error taxonomy of the registry. Validators and the reconciler return these
/// and the facade maps them 1:1 onto the RPC status surface.
#[derive(Debug, Error)]
pub enum Error {
	#[error("invalid argument: {0}")]
	InvalidArgument(String),
	#[error("not found: {0}")]
	NotFound(String),
	#[error("already exists: {0}")]
	AlreadyExists(String),
	#[error("failed precondition: {0}")]
	FailedPrecondition(String),
	#[error("conflict: {0}")]
	Conflict(String),
	#[error("internal: {0}")]
	Internal(String),
	#[error("unavailable: {0}")]
	Unavailable(String),
}

impl Error {
	pub fn invalid_argument(msg: impl Into<String>) -> Self {
		Error::InvalidArgument(msg.into())
	}
	pub fn not_found(msg: impl Into<String>) -> Self {
		Error::NotFound(msg.into())
	}
	pub fn already_exists(msg: impl Into<String>) -> Self {
		Error::AlreadyExists(msg.into())
	}
	pub fn failed_precondition(msg: impl Into<String>) -> Self {
		Error::FailedPrecondition(msg.into())
	}
	pub fn internal(msg: impl Into<String>) -> Self {
		Error::Internal(msg.into())
	}

	/// The wire status code name for this error kind.
	pub fn code(&self) -> &'static str {
		match self {
			Error::InvalidArgument(_) => "invalid-argument",
			Error::NotFound(_) => "not-found",
			Error::AlreadyExists(_) => "already-exists",
			Error::FailedPrecondition(_) => "failed-precondition",
			Error::Conflict(_) => "conflict",
			Error::Internal(_) => "internal",
			Error::Unavailable(_) => "unavailable",
		}
	}
}
