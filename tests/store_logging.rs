//! Integration tests for the logging plugin's output.

mod common;

use std::io;
use std::sync::Arc;

use common::*;
use mvi_store::config::LogLevel;
use mvi_store::LoggingPlugin;
use parking_lot::Mutex;

/// In-memory log sink shared with the subscriber.
#[derive(Clone, Default)]
struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    fn lines(&self) -> Vec<String> {
        String::from_utf8_lossy(&self.0.lock())
            .lines()
            .map(str::to_string)
            .collect()
    }

    fn line_with(&self, needle: &str) -> String {
        self.lines()
            .into_iter()
            .find(|line| line.contains(needle))
            .unwrap_or_else(|| panic!("no log line with '{needle}' in {:?}", self.lines()))
    }
}

impl io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[tokio::test(flavor = "current_thread")]
async fn shared_logging_plugin_names_the_store_that_logged() {
    let logs = CapturedLogs::default();
    let subscriber = tracing_subscriber::fmt()
        .with_writer({
            let logs = logs.clone();
            move || logs.clone()
        })
        .with_ansi(false)
        .with_max_level(tracing::Level::INFO)
        .finish();
    let _guard = tracing::subscriber::set_default(subscriber);

    let logging = Arc::new(LoggingPlugin::new(LogLevel::Info));
    let left = counter_store().name("left").shared_plugin(logging.clone()).build();
    let right = counter_store().name("right").shared_plugin(logging.clone()).build();
    let (_left_scope, left_run) = start(&left);
    let (_right_scope, right_run) = start(&right);

    left.submit(CounterIntent::Add(1));
    right.submit(CounterIntent::Add(2));
    wait_for_count(&left, 1).await;
    wait_for_count(&right, 2).await;
    stop_and_join(&left, &left_run).await;
    stop_and_join(&right, &right_run).await;

    let from_left = logs.line_with("intent=Add(1)");
    assert!(from_left.contains("store=left"), "{from_left}");
    assert!(!from_left.contains("store=right"), "{from_left}");

    let from_right = logs.line_with("intent=Add(2)");
    assert!(from_right.contains("store=right"), "{from_right}");
    assert!(!from_right.contains("store=left"), "{from_right}");
}
