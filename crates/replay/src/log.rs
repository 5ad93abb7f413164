//! JSONL log reader.

use std::collections::HashSet;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use bytes::Bytes;
use tracing::{debug, info, warn};

use contracts::{
    ContractError, ImageMessage, InertialSample, LogMessage, LogSource, MalformedRecord,
    MessagePayload, Timestamp, Topic,
};

use crate::record::{camera_info_payload, LogRecord, RecordHeader, MESSAGES_FILE};

/// Reader counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LogReadStats {
    /// Non-empty lines read
    pub lines: u64,
    /// Records returned to the caller
    pub delivered: u64,
    /// Records skipped by the topic filter
    pub filtered: u64,
    /// Lines that were not UTF-8 JSON or did not match the record schema
    pub invalid: u64,
    /// Image records whose data file could not be read
    pub missing_data: u64,
}

/// Sequential reader over a `messages.jsonl` log
#[derive(Debug)]
pub struct JsonlLog {
    path: PathBuf,
    base_dir: PathBuf,
    reader: Option<BufReader<File>>,
    filter: Option<HashSet<Topic>>,
    buf: Vec<u8>,
    stats: LogReadStats,
}

impl JsonlLog {
    /// Open a log directory (containing `messages.jsonl`) or a `.jsonl` file.
    ///
    /// # Errors
    /// `LogOpen` if the file cannot be opened.
    pub fn open(path: &Path) -> Result<Self, ContractError> {
        let file_path = if path.is_dir() {
            path.join(MESSAGES_FILE)
        } else {
            path.to_path_buf()
        };
        let base_dir = file_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();

        let file = File::open(&file_path)
            .map_err(|e| ContractError::log_open(file_path.display().to_string(), e.to_string()))?;

        info!(path = %file_path.display(), "log opened");
        Ok(Self {
            path: file_path,
            base_dir,
            reader: Some(BufReader::new(file)),
            filter: None,
            buf: Vec::new(),
            stats: LogReadStats::default(),
        })
    }

    /// Deliver only records on `topics`; the rest are skipped undecoded.
    pub fn with_topic_filter(mut self, topics: impl IntoIterator<Item = Topic>) -> Self {
        self.filter = Some(topics.into_iter().collect());
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn stats(&self) -> LogReadStats {
        self.stats
    }

    fn accepts(&self, topic: &str) -> bool {
        self.filter.as_ref().map_or(true, |f| f.contains(topic))
    }

    fn into_message(&mut self, record: LogRecord) -> LogMessage {
        match record {
            LogRecord::CameraInfo {
                topic,
                stamp_ns,
                camera_name,
                model_type,
                image_width,
                image_height,
                parameters,
                position,
                orientation,
            } => LogMessage::new(
                topic,
                Timestamp::from_nanos(stamp_ns),
                MessagePayload::CameraInfo(camera_info_payload(
                    camera_name,
                    model_type,
                    image_width,
                    image_height,
                    parameters,
                    position,
                    orientation,
                )),
            ),
            LogRecord::Image {
                topic,
                stamp_ns,
                height,
                width,
                encoding,
                data_file,
            } => {
                let data = self.read_binary_file(&data_file);
                LogMessage::new(
                    topic,
                    Timestamp::from_nanos(stamp_ns),
                    MessagePayload::Image(ImageMessage {
                        height,
                        width,
                        encoding,
                        data,
                    }),
                )
            }
            LogRecord::Imu {
                topic,
                stamp_ns,
                angular_velocity,
                linear_acceleration,
                orientation,
            } => {
                let stamp = Timestamp::from_nanos(stamp_ns);
                LogMessage::new(
                    topic,
                    stamp,
                    MessagePayload::Imu(InertialSample {
                        stamp,
                        angular_velocity,
                        linear_acceleration,
                        orientation,
                    }),
                )
            }
        }
    }

    /// Unreadable files yield an empty payload, which later fails decode.
    fn read_binary_file(&mut self, relative_path: &str) -> Bytes {
        let path = self.base_dir.join(relative_path);
        match std::fs::read(&path) {
            Ok(data) => Bytes::from(data),
            Err(e) => {
                self.stats.missing_data += 1;
                warn!(path = %path.display(), error = %e, "Failed to read image data file");
                Bytes::new()
            }
        }
    }
}

impl LogSource for JsonlLog {
    fn next_message(&mut self) -> Result<Option<LogMessage>, ContractError> {
        loop {
            let Some(reader) = self.reader.as_mut() else {
                return Ok(None);
            };

            self.buf.clear();
            if reader.read_until(b'\n', &mut self.buf)? == 0 {
                return Ok(None);
            }
            if self.buf.iter().all(u8::is_ascii_whitespace) {
                continue;
            }
            self.stats.lines += 1;
            let line_no = self.stats.lines;

            let line = match std::str::from_utf8(&self.buf) {
                Ok(line) => line.trim(),
                Err(e) => {
                    self.stats.invalid += 1;
                    warn!(line = line_no, error = %e, "Skipping non UTF-8 log line");
                    continue;
                }
            };

            let header: RecordHeader<'_> = match serde_json::from_str(line) {
                Ok(header) => header,
                Err(e) => {
                    self.stats.invalid += 1;
                    warn!(line = line_no, error = %e, "Skipping malformed log line");
                    continue;
                }
            };
            if !self.accepts(&header.topic) {
                self.stats.filtered += 1;
                continue;
            }

            // The topic's consumer decides whether a bad record is fatal.
            let record: LogRecord = match serde_json::from_str(line) {
                Ok(record) => record,
                Err(e) => {
                    self.stats.invalid += 1;
                    warn!(line = line_no, topic = %header.topic, error = %e, "Malformed log record");
                    return Ok(Some(LogMessage::new(
                        &*header.topic,
                        Timestamp::from_nanos(0),
                        MessagePayload::Malformed(MalformedRecord {
                            line: line_no,
                            reason: e.to_string(),
                        }),
                    )));
                }
            };

            self.stats.delivered += 1;
            return Ok(Some(self.into_message(record)));
        }
    }

    fn close(&mut self) {
        if self.reader.take().is_some() {
            debug!(
                path = %self.path.display(),
                delivered = self.stats.delivered,
                filtered = self.stats.filtered,
                invalid = self.stats.invalid,
                "log closed"
            );
        }
    }
}
