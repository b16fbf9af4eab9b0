use std::{
	collections::VecDeque,
	future::Future,
	sync::{
		Arc, Mutex,
		atomic::{AtomicBool, AtomicUsize, Ordering},
	},
	time::Instant,
};

use serde::{Serialize, Serializer, ser::SerializeMap};
use serde_json::json;
use tokio::sync::oneshot;

use crate::{Error, Result, SlotFailure};

/// How a batch reacts to a failed job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchMode {
	/// The first failure completes the batch with that error; unstarted jobs never start.
	FailFast,
	/// Failures are recorded per slot and every job runs.
	ErrorSuppressing,
}
impl BatchMode {
	pub fn parse(raw: &str) -> Option<Self> {
		match raw {
			"fail_fast" => Some(Self::FailFast),
			"error_suppressing" => Some(Self::ErrorSuppressing),
			_ => None,
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchOptions {
	/// Maximum number of jobs in flight.
	pub concurrency: usize,
	pub mode: BatchMode,
}
impl Default for BatchOptions {
	fn default() -> Self {
		Self { concurrency: 4, mode: BatchMode::ErrorSuppressing }
	}
}
impl TryFrom<&kin_config::Batch> for BatchOptions {
	type Error = Error;

	fn try_from(cfg: &kin_config::Batch) -> Result<Self> {
		let mode = BatchMode::parse(&cfg.mode).ok_or_else(|| Error::Validation {
			message: format!("'{}' is not a batch mode.", cfg.mode),
		})?;

		Ok(Self { concurrency: cfg.concurrency.max(1), mode })
	}
}

/// Outcome of the job in one batch slot.
#[derive(Debug)]
pub struct BatchItem<T> {
	pub took_ms: u64,
	pub result: Result<T>,
}
impl<T> Serialize for BatchItem<T>
where
	T: Serialize,
{
	fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		let mut map = serializer.serialize_map(Some(2))?;

		map.serialize_entry("took_ms", &self.took_ms)?;

		match &self.result {
			Ok(value) => map.serialize_entry("result", value)?,
			Err(err) => map.serialize_entry(
				"error",
				&json!({ "type": err.kind(), "reason": err.to_string() }),
			)?,
		}

		map.end()
	}
}

/// Results in input order, regardless of completion order.
#[derive(Debug, Serialize)]
pub struct BatchResponse<T> {
	pub took_ms: u64,
	/// Whether any slot failed.
	pub errors: bool,
	pub items: Vec<BatchItem<T>>,
}
impl<T> BatchResponse<T> {
	/// One error carrying every slot failure, if there were any.
	pub fn combined_error(&self) -> Option<Error> {
		let failures = self
			.items
			.iter()
			.enumerate()
			.filter_map(|(slot, item)| {
				item.result
					.as_ref()
					.err()
					.map(|err| SlotFailure { slot, error: Box::new(err.clone()) })
			})
			.collect::<Vec<_>>();

		(!failures.is_empty()).then_some(Error::Batch { failures })
	}
}

enum Completion<T> {
	Filled(Vec<Option<BatchItem<T>>>),
	Failed(Error),
}

struct BatchState<I, T> {
	queue: Mutex<VecDeque<(usize, I)>>,
	slots: Mutex<Vec<Option<BatchItem<T>>>>,
	remaining: AtomicUsize,
	done: AtomicBool,
	completion: Mutex<Option<oneshot::Sender<Completion<T>>>>,
}
impl<I, T> BatchState<I, T> {
	/// Completes the batch. Only the first call has any effect.
	fn complete(&self, completion: Completion<T>) {
		let sender = self.completion.lock().unwrap_or_else(|err| err.into_inner()).take();

		if let Some(sender) = sender {
			let _ = sender.send(completion);
		}
	}
}

/// Runs `run` over every item with at most `options.concurrency` jobs in flight.
///
/// A new job starts as soon as a running one finishes. Results keep the input order.
pub async fn run_batch<I, T, F, Fut>(
	items: Vec<I>,
	options: BatchOptions,
	run: F,
) -> Result<BatchResponse<T>>
where
	I: Send + 'static,
	T: Send + 'static,
	F: Fn(I) -> Fut + Send + Sync + 'static,
	Fut: Future<Output = Result<T>> + Send + 'static,
{
	if items.is_empty() {
		return Err(Error::EmptyBatch);
	}

	let started = Instant::now();
	let total = items.len();
	let workers = options.concurrency.clamp(1, total);
	let (sender, receiver) = oneshot::channel();
	let state = Arc::new(BatchState {
		queue: Mutex::new(items.into_iter().enumerate().collect()),
		slots: Mutex::new((0..total).map(|_| None).collect()),
		remaining: AtomicUsize::new(total),
		done: AtomicBool::new(false),
		completion: Mutex::new(Some(sender)),
	});
	let run = Arc::new(run);

	tracing::debug!(jobs = total, workers, mode = ?options.mode, "Starting batch.");

	for _ in 0..workers {
		tokio::spawn(work(Arc::clone(&state), Arc::clone(&run), options.mode));
	}

	// Workers own the only handles to the state, so the sender is dropped if they all die.
	drop(state);

	let slots = match receiver.await {
		Ok(Completion::Filled(slots)) => slots,
		Ok(Completion::Failed(err)) => return Err(err),
		Err(_) => {
			return Err(Error::Interrupted {
				message: "Batch workers stopped before every job finished.".to_string(),
			});
		},
	};
	let items = slots.into_iter().flatten().collect::<Vec<_>>();

	if items.len() != total {
		return Err(Error::Interrupted { message: "Some batch slots were never filled.".to_string() });
	}

	let errors = items.iter().any(|item| item.result.is_err());
	let took_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

	tracing::info!(jobs = total, errors, took_ms, "Batch finished.");

	Ok(BatchResponse { took_ms, errors, items })
}

async fn work<I, T, F, Fut>(state: Arc<BatchState<I, T>>, run: Arc<F>, mode: BatchMode)
where
	F: Fn(I) -> Fut,
	Fut: Future<Output = Result<T>>,
{
	loop {
		if state.done.load(Ordering::Acquire) {
			return;
		}

		let next = state.queue.lock().unwrap_or_else(|err| err.into_inner()).pop_front();
		let Some((slot, item)) = next else { return };
		let started = Instant::now();
		let result = run(item).await;
		let took_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

		if let Err(err) = &result {
			tracing::warn!(slot, error = %err, "Batch job failed.");

			if mode == BatchMode::FailFast {
				if !state.done.swap(true, Ordering::AcqRel) {
					state.complete(Completion::Failed(err.clone()));
				}

				return;
			}
		}

		// A fail-fast batch may already be complete; late results are dropped.
		if state.done.load(Ordering::Acquire) {
			return;
		}

		state.slots.lock().unwrap_or_else(|err| err.into_inner())[slot] =
			Some(BatchItem { took_ms, result });

		if state.remaining.fetch_sub(1, Ordering::AcqRel) == 1
			&& !state.done.swap(true, Ordering::AcqRel)
		{
			let slots = std::mem::take(&mut *state.slots.lock().unwrap_or_else(|err| err.into_inner()));

			state.complete(Completion::Filled(slots));
		}
	}
}

#[cfg(test)]
mod tests {
	use std::time::Duration;

	use super::*;

	fn options(concurrency: usize, mode: BatchMode) -> BatchOptions {
		BatchOptions { concurrency, mode }
	}

	#[tokio::test]
	async fn empty_batches_are_rejected() {
		let result = run_batch(Vec::<u32>::new(), BatchOptions::default(), |n| async move { Ok(n) })
			.await;

		assert!(matches!(result, Err(Error::EmptyBatch)));
	}

	#[tokio::test]
	async fn results_keep_input_order() {
		let response = run_batch(
			vec![30_u64, 1, 10],
			options(3, BatchMode::ErrorSuppressing),
			|delay| async move {
				tokio::time::sleep(Duration::from_millis(delay)).await;

				Ok(delay)
			},
		)
		.await
		.expect("batch");
		let values =
			response.items.iter().map(|item| *item.result.as_ref().unwrap()).collect::<Vec<_>>();

		assert_eq!(values, vec![30, 1, 10]);
		assert!(!response.errors);
		assert!(response.combined_error().is_none());
	}

	#[tokio::test]
	async fn concurrency_is_bounded() {
		let in_flight = Arc::new(AtomicUsize::new(0));
		let peak = Arc::new(AtomicUsize::new(0));
		let (in_flight_job, peak_job) = (Arc::clone(&in_flight), Arc::clone(&peak));
		let response = run_batch((0..8).collect(), options(2, BatchMode::ErrorSuppressing), move |n: u32| {
			let in_flight = Arc::clone(&in_flight_job);
			let peak = Arc::clone(&peak_job);

			async move {
				let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;

				peak.fetch_max(now, Ordering::SeqCst);
				tokio::time::sleep(Duration::from_millis(5)).await;
				in_flight.fetch_sub(1, Ordering::SeqCst);

				Ok(n)
			}
		})
		.await
		.expect("batch");

		assert_eq!(response.items.len(), 8);
		assert!(peak.load(Ordering::SeqCst) <= 2);
	}

	#[tokio::test]
	async fn suppressed_failures_are_collected_per_slot() {
		let response = run_batch(vec![1_u32, 2, 3], options(2, BatchMode::ErrorSuppressing), |n| async move {
			if n == 2 {
				Err(Error::Backend { message: "boom".to_string() })
			} else {
				Ok(n)
			}
		})
		.await
		.expect("batch");

		assert!(response.errors);
		assert!(response.items[0].result.is_ok());
		assert!(response.items[2].result.is_ok());

		match response.combined_error() {
			Some(Error::Batch { failures }) => {
				assert_eq!(failures.len(), 1);
				assert_eq!(failures[0].slot, 1);
			},
			other => panic!("Unexpected combined error: {other:?}"),
		}

		let json = serde_json::to_value(&response).expect("json");

		assert_eq!(json["items"][1]["error"]["type"], "backend_error");
		assert_eq!(json["items"][0]["result"], 1);
	}

	#[tokio::test]
	async fn fail_fast_stops_launching_jobs() {
		let started = Arc::new(AtomicUsize::new(0));
		let counter = Arc::clone(&started);
		let result = run_batch((0..10).collect(), options(1, BatchMode::FailFast), move |n: u32| {
			counter.fetch_add(1, Ordering::SeqCst);

			async move {
				if n == 1 { Err(Error::Backend { message: format!("job {n} failed") }) } else { Ok(n) }
			}
		})
		.await;

		match result {
			Err(Error::Backend { message }) => assert_eq!(message, "job 1 failed"),
			other => panic!("Unexpected result: {other:?}"),
		}

		// Give a stray worker the chance to misbehave.
		tokio::time::sleep(Duration::from_millis(20)).await;

		assert_eq!(started.load(Ordering::SeqCst), 2);
	}
}
