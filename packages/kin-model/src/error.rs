pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error(transparent)]
	SerdeJson(#[from] serde_json::Error),
	#[error("{path}: {message}")]
	Validation { path: String, message: String },
}
impl Error {
	pub(crate) fn validation(path: impl Into<String>, message: impl Into<String>) -> Self {
		Self::Validation { path: path.into(), message: message.into() }
	}
}

/// A value does not fit the declared type of its attribute.
///
/// Never surfaced to callers; the offending value is skipped where it occurs.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Value {value} is not a valid {expected}.")]
pub struct CoercionError {
	pub expected: crate::AttributeType,
	pub value: String,
}
