//! Simple terminal progress bar: message, hash bar, pos/len and percentage,
//! redrawn in place on stderr.

use std::io::{self, Write};
use std::sync::{Arc, Mutex};

const BAR_WIDTH: u64 = 50;

struct Inner {
	message: String,
	len: u64,
	pos: u64,
	finished: bool,
}

impl Inner {
	fn redraw(&self) {
		if self.len == 0 {
			return;
		}
		let pos = self.pos.min(self.len);
		let done = pos * BAR_WIDTH / self.len;
		let percent = pos * 100 / self.len;
		let mut stderr = io::stderr();
		let _ = write!(
			stderr,
			"\r{} |{}{}| {}/{} ({percent:>3}%)",
			self.message,
			"#".repeat(done as usize),
			"-".repeat((BAR_WIDTH - done) as usize),
			pos,
			self.len,
		);
		let _ = stderr.flush();
	}
}

/// A thread-safe progress bar handle; clones share the same state.
#[derive(Clone)]
pub struct ProgressBar {
	inner: Arc<Mutex<Inner>>,
}

impl ProgressBar {
	pub fn new(message: &str, len: u64) -> ProgressBar {
		let progress = ProgressBar {
			inner: Arc::new(Mutex::new(Inner {
				message: message.to_string(),
				len,
				pos: 0,
				finished: false,
			})),
		};
		progress.inner.lock().unwrap().redraw();
		progress
	}

	pub fn inc(&self, value: u64) {
		let mut inner = self.inner.lock().unwrap();
		inner.pos = inner.pos.saturating_add(value).min(inner.len);
		inner.redraw();
	}

	pub fn set_position(&self, value: u64) {
		let mut inner = self.inner.lock().unwrap();
		inner.pos = value.min(inner.len);
		inner.redraw();
	}

	/// Snap to the end and terminate the line.
	pub fn finish(&self) {
		let mut inner = self.inner.lock().unwrap();
		if inner.finished {
			return;
		}
		inner.pos = inner.len;
		inner.finished = true;
		inner.redraw();
		let _ = io::stderr().write_all(b"\n");
		let _ = io::stderr().flush();
	}
}
