//! JSONL log writer, producing logs [`JsonlLog`](crate::JsonlLog) can replay.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use contracts::{ContractError, LogMessage, MessagePayload};

use crate::record::{LogRecord, MESSAGES_FILE};

const IMAGE_DIR: &str = "images";

/// Writes `messages.jsonl` plus one binary file per image
#[derive(Debug)]
pub struct LogWriter {
    dir: PathBuf,
    out: BufWriter<File>,
    records: u64,
    images: u64,
}

impl LogWriter {
    /// Create (or truncate) a log in `dir`, creating the directory if needed.
    pub fn create(dir: &Path) -> Result<Self, ContractError> {
        fs::create_dir_all(dir.join(IMAGE_DIR))?;
        let file = File::create(dir.join(MESSAGES_FILE))?;
        Ok(Self {
            dir: dir.to_path_buf(),
            out: BufWriter::new(file),
            records: 0,
            images: 0,
        })
    }

    /// Append one message in stored order.
    pub fn write(&mut self, message: &LogMessage) -> Result<(), ContractError> {
        let record = match &message.payload {
            MessagePayload::CameraInfo(info) => {
                LogRecord::camera_info(message.topic.clone(), message.stamp, info)
            }
            MessagePayload::Imu(sample) => LogRecord::imu(message.topic.clone(), sample),
            MessagePayload::Image(image) => {
                let data_file = format!("{IMAGE_DIR}/{:08}.bin", self.images);
                fs::write(self.dir.join(&data_file), &image.data)?;
                self.images += 1;
                LogRecord::Image {
                    topic: message.topic.clone(),
                    stamp_ns: message.stamp.as_nanos(),
                    height: image.height,
                    width: image.width,
                    encoding: image.encoding,
                    data_file,
                }
            }
            MessagePayload::Malformed(record) => {
                return Err(ContractError::Io(std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    format!("cannot write malformed record from line {}", record.line),
                )));
            }
        };

        serde_json::to_writer(&mut self.out, &record)
            .map_err(|e| ContractError::Io(e.into()))?;
        self.out.write_all(b"\n")?;
        self.records += 1;
        Ok(())
    }

    pub fn write_messages<'a>(
        &mut self,
        messages: impl IntoIterator<Item = &'a LogMessage>,
    ) -> Result<(), ContractError> {
        for message in messages {
            self.write(message)?;
        }
        Ok(())
    }

    /// Records written so far
    pub fn records(&self) -> u64 {
        self.records
    }

    /// Flush and return the log directory.
    pub fn finish(mut self) -> Result<PathBuf, ContractError> {
        self.out.flush()?;
        Ok(self.dir)
    }
}
