//! Testing utilities for code built on the migration runner.

mod mock;

pub use mock::{MockConnection, MockLedgerRow};

use std::path::Path;
use std::sync::{Arc, Mutex};

use crate::migrations::LogSink;

/// A log sink that keeps every message for later assertions.
pub fn capture_sink() -> (LogSink, Arc<Mutex<Vec<String>>>) {
    let messages = Arc::new(Mutex::new(Vec::new()));
    let sink = {
        let messages = messages.clone();
        LogSink::new(move |m| {
            if let Ok(mut messages) = messages.lock() {
                messages.push(m.to_string());
            }
        })
    };
    (sink, messages)
}

/// Write a file into a migration folder fixture.
pub fn write_migration(dir: &Path, name: &str, content: &str) -> std::io::Result<()> {
    std::fs::create_dir_all(dir)?;
    std::fs::write(dir.join(name), content)
}
