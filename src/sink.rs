//! Output sinks for decoded records.
//!
//! The collector hands every decoded [`Record`] to a [`RecordSink`]. The
//! binary prints them with [`LinePrinter`]; tests usually pass an
//! `UnboundedSender<Record>` and read them back from the channel.

use std::io::{self, Write};

use tokio::sync::mpsc::UnboundedSender;

use crate::constants::RECORD_LABEL;
use crate::record::{decode_records, Record};

/// Destination for decoded records.
pub trait RecordSink: Send {
    /// Accept one record.
    fn emit(&mut self, record: &Record) -> io::Result<()>;

    /// Called once after every record of a connection has been emitted.
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Writes each record as a `Number <decimal>` line.
#[derive(Debug)]
pub struct LinePrinter<W> {
    out: W,
}

impl<W: Write> LinePrinter<W> {
    /// Print to an arbitrary writer.
    pub fn new(out: W) -> Self {
        Self { out }
    }

    /// Give back the underlying writer.
    pub fn into_inner(self) -> W {
        self.out
    }
}

impl LinePrinter<io::Stdout> {
    /// Print to standard output.
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write + Send> RecordSink for LinePrinter<W> {
    fn emit(&mut self, record: &Record) -> io::Result<()> {
        writeln!(self.out, "{RECORD_LABEL} {record}")
    }

    fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }
}

impl RecordSink for UnboundedSender<Record> {
    fn emit(&mut self, record: &Record) -> io::Result<()> {
        self.send(*record)
            .map_err(|_closed| io::Error::new(io::ErrorKind::BrokenPipe, "record receiver dropped"))
    }
}

/// Decode every complete record in `buffer` and hand it to `sink`.
///
/// Returns the number of records emitted. A partial trailing group is
/// skipped.
pub fn emit_records<S: RecordSink + ?Sized>(buffer: &[u8], sink: &mut S) -> io::Result<usize> {
    let mut emitted = 0;
    for record in decode_records(buffer) {
        sink.emit(&record)?;
        emitted += 1;
    }
    sink.flush()?;
    Ok(emitted)
}
