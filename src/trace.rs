//! Chrome trace output (`-d trace`): one complete event per executed recipe,
//! loadable in about:tracing or Perfetto.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::sync::Mutex;
use std::time::Instant;

static TRACE: Mutex<Option<Trace>> = Mutex::new(None);

struct Trace {
    start: Instant,
    w: BufWriter<File>,
}

impl Trace {
    fn write_complete(&mut self, name: &str, span: (Instant, Instant)) -> std::io::Result<()> {
        writeln!(
            self.w,
            "{{ \"pid\": 0, \"name\": {:?}, \"ph\": \"X\", \"ts\": {}, \"dur\": {} }},",
            name,
            span.0.duration_since(self.start).as_micros(),
            span.1.duration_since(span.0).as_micros(),
        )
    }
}

pub fn open(path: &str) -> std::io::Result<()> {
    let mut w = BufWriter::new(File::create(path)?);
    writeln!(w, "[")?;
    *TRACE.lock().unwrap() = Some(Trace {
        start: Instant::now(),
        w,
    });
    Ok(())
}

/// Record a completed span.  No-op unless a trace is open; recipe runners
/// call this from whatever thread they run on.
pub fn write_complete(name: &str, start: Instant, end: Instant) {
    if let Some(trace) = TRACE.lock().unwrap().as_mut() {
        let _ = trace.write_complete(name, (start, end));
    }
}

pub fn close() {
    if let Some(mut trace) = TRACE.lock().unwrap().take() {
        let elapsed = trace.start.elapsed().as_micros();
        let _ = writeln!(
            trace.w,
            "{{ \"pid\": 0, \"name\": \"main\", \"ph\": \"X\", \"ts\": 0, \"dur\": {} }}\n]",
            elapsed
        );
        let _ = trace.w.flush();
    }
}
