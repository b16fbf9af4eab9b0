use std::{fs, path::PathBuf};

use clap::{
	Parser,
	builder::{
		Styles,
		styling::{AnsiColor, Effects},
	},
};
use color_eyre::eyre;
use serde_json::Value;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing_subscriber::EnvFilter;

use kin_service::{BatchMode, KinService};

#[derive(Debug, Parser)]
#[command(version, rename_all = "kebab", styles = styles())]
pub struct Args {
	#[arg(long, short = 'c', value_name = "FILE")]
	pub config: PathBuf,
	/// Job document, or a JSON array of them to run as a batch. Read from stdin when omitted.
	#[arg(long, short = 'i', value_name = "FILE")]
	pub input: Option<PathBuf>,
	/// Overrides `[batch] concurrency`.
	#[arg(long, value_name = "N")]
	pub concurrency: Option<usize>,
	/// Stop a batch at its first failed job.
	#[arg(long)]
	pub fail_fast: bool,
	/// Overrides `[resolution] max_hops`; negative means unlimited.
	#[arg(long, value_name = "N", allow_negative_numbers = true)]
	pub max_hops: Option<i32>,
	/// Include match explanations in every hit.
	#[arg(long)]
	pub explain: bool,
	#[arg(long)]
	pub pretty: bool,
}

pub async fn run(args: Args) -> color_eyre::Result<()> {
	let config = kin_config::load(&args.config)?;
	let filter =
		EnvFilter::try_new(&config.service.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

	tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

	let mut service = KinService::from_config(&config)?;

	if let Some(concurrency) = args.concurrency {
		if concurrency == 0 {
			return Err(eyre::eyre!("--concurrency must be greater than zero."));
		}

		service.batch.concurrency = concurrency;
	}
	if args.fail_fast {
		service.batch.mode = BatchMode::FailFast;
	}
	if let Some(max_hops) = args.max_hops {
		service.options.max_hops = max_hops;
	}
	if args.explain {
		service.options.include_explanation = true;
	}

	let raw = match args.input.as_ref() {
		Some(path) => fs::read_to_string(path)?,
		None => {
			let mut raw = String::new();

			tokio::io::stdin().read_to_string(&mut raw).await?;

			raw
		},
	};
	let input: Value = serde_json::from_str(&raw)?;
	let output = match input {
		Value::Array(jobs) => {
			tracing::info!(jobs = jobs.len(), "Resolving batch.");

			serde_json::to_value(service.resolve_batch(jobs).await?)?
		},
		job => serde_json::to_value(service.resolve(&job).await?)?,
	};
	let mut rendered =
		if args.pretty { serde_json::to_string_pretty(&output)? } else { serde_json::to_string(&output)? };

	rendered.push('\n');

	let mut stdout = tokio::io::stdout();

	stdout.write_all(rendered.as_bytes()).await?;
	stdout.flush().await?;

	Ok(())
}

fn styles() -> Styles {
	Styles::styled()
		.header(AnsiColor::Cyan.on_default() | Effects::BOLD)
		.usage(AnsiColor::Cyan.on_default() | Effects::BOLD)
		.literal(AnsiColor::Green.on_default() | Effects::BOLD)
		.placeholder(AnsiColor::Yellow.on_default())
}
