//! Local execution of DAG jobs: a bounded channel feeding a pool of worker
//! threads, each job running as its own OS process.

use anyhow::{Result, ensure};
use crossbeam::channel;
use orthotiles_core::jobs::Job;
use orthotiles_core::progress::ProgressBar;
use std::process::Command;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

/// Default worker count: host CPUs minus one, at least one.
pub fn default_processors() -> usize {
	num_cpus::get().saturating_sub(1).max(1)
}

/// Run all `jobs` on `processors` workers, displaying a progress bar.
///
/// Jobs of one batch are independent and may finish in any order. A job
/// fails when its process exits non-zero; the batch fails if any job failed,
/// after all jobs ran.
pub fn run_jobs(jobs: &[Job], processors: usize, message: &str) -> Result<()> {
	if jobs.is_empty() {
		return Ok(());
	}
	let processors = processors.max(1);
	let started = Instant::now();
	let bar = ProgressBar::new(message, jobs.len() as u64);
	let failures = AtomicUsize::new(0);

	let (sender, receiver) = channel::bounded::<&Job>(1);
	crossbeam::scope(|scope| {
		scope.spawn(move |_| {
			for job in jobs {
				if sender.send(job).is_err() {
					return;
				}
			}
		});

		for _ in 0..processors {
			let receiver = receiver.clone();
			let bar = bar.clone();
			let failures = &failures;
			scope.spawn(move |_| {
				for job in receiver.iter() {
					match Command::new(&job.command.program).args(&job.command.args).status() {
						Ok(status) if status.success() => {}
						Ok(status) => {
							log::error!("job '{}' failed: {status}", job.name);
							failures.fetch_add(1, Ordering::Relaxed);
						}
						Err(error) => {
							log::error!("job '{}' could not start: {error}", job.name);
							failures.fetch_add(1, Ordering::Relaxed);
						}
					}
					bar.inc(1);
				}
			});
		}
	})
	.unwrap();
	bar.finish();
	log::info!("{message}: {} job(s) in {:.2} s", jobs.len(), started.elapsed().as_secs_f64());

	let failed = failures.load(Ordering::Relaxed);
	ensure!(failed == 0, "{failed} of {} job(s) failed", jobs.len());
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use orthotiles_core::jobs::CommandLine;

	fn job(program: &str, args: &[&str]) -> Job {
		Job {
			name: "test".to_string(),
			command: CommandLine::new(program).args(args.iter().copied()),
		}
	}

	#[test]
	fn empty_batch_is_a_no_op() {
		assert!(run_jobs(&[], 4, "nothing").is_ok());
	}

	#[cfg(unix)]
	#[test]
	fn runs_jobs_and_reports_failures() {
		let ok = vec![job("true", &[]), job("true", &[]), job("true", &[])];
		assert!(run_jobs(&ok, 2, "ok").is_ok());

		let mixed = vec![job("true", &[]), job("false", &[])];
		let err = run_jobs(&mixed, 2, "mixed").unwrap_err();
		assert!(err.to_string().contains("1 of 2"));
	}

	#[cfg(unix)]
	#[test]
	fn missing_program_counts_as_failure() {
		let jobs = vec![job("/nonexistent/binary", &[])];
		assert!(run_jobs(&jobs, 1, "missing").is_err());
	}
}
