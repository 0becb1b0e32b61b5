/*******************************************************************************
* Copyright 2020 Stefan Majewsky <majewsky@gmx.net>
* SPDX-License-Identifier: Apache-2.0
* Refer to the file "LICENSE" for details.
*******************************************************************************/

use std::fs;
use std::io;
use std::path::Path;

use crate::manager::{AddResult, ManagerInner};

#[derive(Clone, Debug, PartialEq, Eq)]
enum ConfigLine {
    ///Empty lines and `#` comments.
    Ignore,
    ///A line that is neither ignorable nor two whitespace-separated fields.
    Malformed,
    Pair { source: String, target: String },
}

fn classify_line(line: &str) -> ConfigLine {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return ConfigLine::Ignore;
    }
    let mut words = trimmed.split_whitespace();
    match (words.next(), words.next(), words.next()) {
        (Some(source), Some(target), None) => ConfigLine::Pair {
            source: source.into(),
            target: target.into(),
        },
        _ => ConfigLine::Malformed,
    }
}

///Loads the startup configuration: one sync pair per line, applied exactly
///as if each line had arrived as an `add` console command. Per-line
///failures are logged and loading continues; only an unreadable file is an
///error (and a startup failure for the caller).
pub(crate) fn load(manager: &ManagerInner, path: &Path) -> io::Result<()> {
    let contents = fs::read_to_string(path)?;
    for (index, line) in contents.lines().enumerate() {
        let line_number = index + 1;
        match classify_line(line) {
            ConfigLine::Ignore => continue,
            ConfigLine::Malformed => {
                log::error!(
                    "config line {}: expected two directory specifiers, got {:?}",
                    line_number,
                    line
                );
            }
            ConfigLine::Pair { source, target } => match manager.handle_add(&source, &target) {
                AddResult::Added => log::info!("loaded sync pair {} -> {}", source, target),
                AddResult::AlreadyExists => {
                    log::info!("config line {}: sync pair already exists: {}", line_number, source)
                }
                AddResult::Failed => {
                    log::error!("config line {}: cannot add sync pair {}", line_number, source)
                }
            },
        }
    }
    Ok(())
}
