/*******************************************************************************
* Copyright 2020 Stefan Majewsky <majewsky@gmx.net>
* SPDX-License-Identifier: Apache-2.0
* Refer to the file "LICENSE" for details.
*******************************************************************************/

use std::fs::File;
use std::io::{self, Write};
use std::path::Path;
use std::sync::Mutex;

////////////////////////////////////////////////////////////////////////////////
// struct LogFile

///A log file that is appended to from many threads.
///
///Every entry becomes one line prefixed with a `[YYYY-MM-DD HH:MM:SS]`
///timestamp. The line is rendered fully before the file handle is touched,
///then written and flushed in one critical section, so concurrent writers
///never interleave within a line.
pub struct LogFile {
    file: Mutex<File>,
}

impl LogFile {
    ///Creates (or truncates) the log file at `path`.
    pub fn create(path: &Path) -> io::Result<LogFile> {
        let file = File::create(path)?;
        Ok(LogFile {
            file: Mutex::new(file),
        })
    }

    ///Appends one timestamped line. Write failures are reported through the
    ///diagnostic log instead of propagating: losing a log line must not take
    ///down the transfer that produced it.
    pub fn line(&self, message: &str) {
        let stamped = format!(
            "[{}] {}\n",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
            message
        );
        let mut file = self.file.lock().unwrap();
        if let Err(e) = file.write_all(stamped.as_bytes()).and_then(|_| file.flush()) {
            log::error!("cannot write to log file: {}", e);
        }
    }
}
