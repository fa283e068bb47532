use std::fs::OpenOptions;
use std::io::{self, BufWriter, Write};
use std::sync::{Arc, Mutex};

use anyhow::Error;
use log::LevelFilter;
use simplelog::{
    ColorChoice, CombinedLogger, Config, ConfigBuilder, TermLogger, TerminalMode, WriteLogger,
};

use crate::program::Program;

mod ideogram;
mod program;

/// Name of the log file written next to the executable.
const LOG_NAME: &str = "ideogram_harvester.log";

/// A buffered file writer for the log file that flushes periodically so a
/// crash loses at most a handful of lines.
struct BufferedFileWriter {
    inner: Arc<Mutex<BufWriter<std::fs::File>>>,
    line_count: Arc<Mutex<usize>>,
}

impl BufferedFileWriter {
    fn new() -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(LOG_NAME)?;

        Ok(Self {
            inner: Arc::new(Mutex::new(BufWriter::with_capacity(64 * 1024, file))),
            line_count: Arc::new(Mutex::new(0)),
        })
    }
}

impl Write for BufferedFileWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut writer = self
            .inner
            .lock()
            .map_err(|_| io::Error::other("Failed to acquire lock"))?;

        let size = writer.write(buf)?;

        if let Ok(mut count) = self.line_count.lock() {
            if buf.contains(&b'\n') {
                *count += buf.iter().filter(|&&b| b == b'\n').count();
                if *count % 50 == 0 {
                    writer.flush()?;
                }
            }
        }

        Ok(size)
    }

    fn flush(&mut self) -> io::Result<()> {
        let mut writer = self
            .inner
            .lock()
            .map_err(|_| io::Error::other("Failed to acquire lock"))?;
        writer.flush()
    }
}

impl Drop for BufferedFileWriter {
    fn drop(&mut self) {
        if let Ok(mut writer) = self.inner.lock() {
            let _ = writer.flush();
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    initialize_logger();

    let program = Program::new();
    program.run().await
}

/// Initializes the logger with preset filtering and a file copy of the log.
fn initialize_logger() {
    let mut config = ConfigBuilder::new();
    config.add_filter_allow_str("ideogram_harvester");

    let buffered_file_writer = match BufferedFileWriter::new() {
        Ok(writer) => writer,
        Err(e) => {
            eprintln!(
                "Failed to create log file writer: {}. Logging will only output to terminal.",
                e
            );
            let _ = TermLogger::init(
                LevelFilter::Info,
                Config::default(),
                TerminalMode::Mixed,
                ColorChoice::Auto,
            );
            return;
        }
    };

    if let Err(e) = CombinedLogger::init(vec![
        TermLogger::new(
            LevelFilter::Info,
            Config::default(),
            TerminalMode::Mixed,
            ColorChoice::Auto,
        ),
        WriteLogger::new(LevelFilter::max(), config.build(), buffered_file_writer),
    ]) {
        eprintln!(
            "Failed to initialize combined logger: {}. Falling back to terminal-only logging.",
            e
        );
        let _ = TermLogger::init(
            LevelFilter::Info,
            Config::default(),
            TerminalMode::Mixed,
            ColorChoice::Auto,
        );
    }
}
