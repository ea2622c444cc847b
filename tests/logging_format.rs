use std::io;
use std::sync::{Arc, Mutex};

use fixture_yield::data::{SampleConfig, generate_history};
use fixture_yield::domain::{ClassifyPolicy, FilterParams, Stage};
use fixture_yield::engine::analyze;
use tracing::Level;
use tracing_subscriber::fmt::MakeWriter;

#[derive(Clone, Default)]
struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

struct BufferWriter(Arc<Mutex<Vec<u8>>>);

impl<'a> MakeWriter<'a> for SharedBuffer {
    type Writer = BufferWriter;

    fn make_writer(&'a self) -> Self::Writer {
        BufferWriter(Arc::clone(&self.0))
    }
}

impl io::Write for BufferWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut guard = self.0.lock().map_err(|_| io::Error::other("lock poisoned"))?;
        guard.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[test]
fn analysis_logs_one_json_summary_line() {
    let table = generate_history(&SampleConfig {
        days: 2,
        fixtures: 3,
        ..SampleConfig::default()
    })
    .expect("history");

    let sink = SharedBuffer::default();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(sink.clone())
        .json()
        .with_max_level(Level::INFO)
        .finish();

    let analysis = tracing::subscriber::with_default(subscriber, || {
        analyze(
            &table,
            &Stage::Fw.default_config(),
            ClassifyPolicy::default(),
            &FilterParams::default(),
        )
        .expect("analysis")
    });

    let bytes = sink.0.lock().expect("lock output").clone();
    let text = String::from_utf8(bytes).expect("utf8 log output");
    let line = text
        .lines()
        .find(|l| l.contains("analysis complete"))
        .expect("summary log line");
    let parsed: serde_json::Value = serde_json::from_str(line).expect("json log line");

    assert_eq!(parsed.get("level").and_then(|v| v.as_str()), Some("INFO"));
    let fields = parsed.get("fields").expect("fields object");
    assert_eq!(
        fields.get("rows").and_then(|v| v.as_u64()),
        Some(table.rows.len() as u64)
    );
    assert_eq!(
        fields.get("days").and_then(|v| v.as_u64()),
        Some(analysis.summary.dates.len() as u64)
    );
    assert_eq!(
        fields.get("fixture_column").and_then(|v| v.as_str()),
        Some("FwPC")
    );
}

#[test]
fn debug_partition_lines_are_filtered_at_info() {
    let table = generate_history(&SampleConfig::default()).expect("history");

    let sink = SharedBuffer::default();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(sink.clone())
        .json()
        .with_max_level(Level::INFO)
        .finish();

    tracing::subscriber::with_default(subscriber, || {
        analyze(
            &table,
            &Stage::Fw.default_config(),
            ClassifyPolicy::default(),
            &FilterParams::default(),
        )
        .expect("analysis")
    });

    let bytes = sink.0.lock().expect("lock output").clone();
    let text = String::from_utf8(bytes).expect("utf8 log output");
    for line in text.lines().filter(|l| !l.trim().is_empty()) {
        let parsed: serde_json::Value = serde_json::from_str(line).expect("json log line");
        assert_ne!(parsed.get("level").and_then(|v| v.as_str()), Some("DEBUG"));
    }
}
