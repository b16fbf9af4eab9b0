use std::fmt::{Display, Formatter};

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
	#[error("Validation error: {message}")]
	Validation { message: String },
	#[error("Matcher '{matcher}' is missing required parameter '{variable}'.")]
	MissingParameter { matcher: String, variable: String },
	#[error("Backend error: {message}")]
	Backend { message: String },
	#[error("Job has already run; reset it before running it again.")]
	JobAlreadyRan,
	#[error("Batch must contain at least one job.")]
	EmptyBatch,
	#[error("Batch was interrupted: {message}")]
	Interrupted { message: String },
	#[error("{} of the batch jobs failed.", .failures.len())]
	Batch { failures: Vec<SlotFailure> },
}
impl Error {
	/// Error category as reported in responses.
	pub fn kind(&self) -> &'static str {
		match self {
			Self::Validation { .. } | Self::MissingParameter { .. } => "validation_error",
			Self::Backend { .. } => "backend_error",
			Self::JobAlreadyRan | Self::EmptyBatch | Self::Interrupted { .. } => "state_error",
			Self::Batch { .. } => "batch_error",
		}
	}
}
impl From<kin_model::Error> for Error {
	fn from(err: kin_model::Error) -> Self {
		Self::Validation { message: err.to_string() }
	}
}
impl From<kin_search::Error> for Error {
	fn from(err: kin_search::Error) -> Self {
		Self::Backend { message: err.to_string() }
	}
}

/// One failed job of an error-suppressing batch.
#[derive(Debug, Clone)]
pub struct SlotFailure {
	pub slot: usize,
	pub error: Box<Error>,
}
impl Display for SlotFailure {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		write!(f, "job {}: {}", self.slot, self.error)
	}
}
