//! Accumulates records for the run and flushes them in the format
//! selected by the output path's extension (spec.md §4.8).

use crate::format::{self, host_native_newline, OutputFormat, BOM};
use chatdl_core::record::ChatRecord;
use chatdl_core::Error;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

pub struct OutputSink {
    path: Option<PathBuf>,
    format: OutputFormat,
    newline: String,
    print_to_stdout: bool,
    plain_text_writer: Option<BufWriter<File>>,
    buffer: Vec<ChatRecord>,
}

impl OutputSink {
    /// `path` selects the on-disk format (absent = stdout only).
    /// `newline` is the operator's `--newline` (host-native if
    /// unset). `print_to_stdout` is false for `--hide-output` /
    /// `--log-file :none:`.
    pub fn new(
        path: Option<PathBuf>,
        newline: Option<String>,
        print_to_stdout: bool,
    ) -> Result<Self, Error> {
        let format = path
            .as_deref()
            .map(format::detect_format)
            .unwrap_or(OutputFormat::PlainText);
        let newline = newline.unwrap_or_else(|| host_native_newline().to_string());

        let plain_text_writer = match (&path, format) {
            (Some(p), OutputFormat::PlainText) => {
                // "at engine start, truncate the file"
                let mut file = File::create(p)?;
                file.write_all(BOM)?;
                Some(BufWriter::new(file))
            }
            _ => None,
        };

        Ok(Self {
            path,
            format,
            newline,
            print_to_stdout,
            plain_text_writer,
            buffer: Vec::new(),
        })
    }

    /// Appends one record: streams it to the plain-text file (if
    /// selected) and prints it to stdout unless suppressed and it
    /// isn't a ticker-mirror item (invariant iii).
    pub fn push(&mut self, record: ChatRecord) -> Result<(), Error> {
        if let Some(writer) = &mut self.plain_text_writer {
            writer.write_all(record.to_display_string().as_bytes())?;
            writer.write_all(self.newline.as_bytes())?;
        }
        if self.print_to_stdout && !record.is_ticker() {
            println!("{}", record.to_display_string());
        }
        self.buffer.push(record);
        Ok(())
    }

    pub fn records(&self) -> &[ChatRecord] {
        &self.buffer
    }

    /// Flushes the whole-buffer formats (JSON/CSV); plain text has
    /// already been streamed in `push`.
    pub fn finalize(mut self) -> Result<Vec<ChatRecord>, Error> {
        match (&self.path, self.format) {
            (Some(path), OutputFormat::Json) => {
                std::fs::write(path, format::render_json(&self.buffer)?)?;
            }
            (Some(path), OutputFormat::Csv) => {
                std::fs::write(path, format::render_csv(&self.buffer, &self.newline)?)?;
            }
            (_, OutputFormat::PlainText) => {
                if let Some(writer) = &mut self.plain_text_writer {
                    writer.flush()?;
                }
            }
            (None, _) => {}
        }
        Ok(self.buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatdl_core::record::AuthorType;

    fn record(message: &str) -> ChatRecord {
        ChatRecord {
            message: message.to_string(),
            author: Some("tester".into()),
            author_type: Some(AuthorType::None),
            ..Default::default()
        }
    }

    #[test]
    fn plain_text_truncates_and_streams() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.txt");
        std::fs::write(&path, "stale content").unwrap();

        let mut sink = OutputSink::new(Some(path.clone()), Some("\n".to_string()), false).unwrap();
        sink.push(record("hello")).unwrap();
        sink.push(record("world")).unwrap();
        sink.finalize().unwrap();

        let content = std::fs::read(&path).unwrap();
        assert!(content.starts_with(format::BOM));
        let text = String::from_utf8(content[format::BOM.len()..].to_vec()).unwrap();
        assert!(text.contains("hello"));
        assert!(text.contains("world"));
        assert!(!text.contains("stale content"));
    }

    #[test]
    fn json_output_is_written_on_finalize_not_push() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.json");

        let mut sink = OutputSink::new(Some(path.clone()), None, false).unwrap();
        sink.push(record("hi")).unwrap();
        assert!(!path.exists());
        sink.finalize().unwrap();
        assert!(path.exists());
        let content = std::fs::read(&path).unwrap();
        assert!(content.starts_with(format::BOM));
    }

    #[test]
    fn ticker_records_are_buffered_but_not_printed() {
        let mut sink = OutputSink::new(None, None, true).unwrap();
        let mut ticker = record("<<no message>>");
        ticker.ticker_duration = Some(30);
        sink.push(ticker).unwrap();
        let records = sink.finalize().unwrap();
        assert_eq!(records.len(), 1);
        assert!(records[0].is_ticker());
    }
}
