/*******************************************************************************
* Copyright 2020 Stefan Majewsky <majewsky@gmx.net>
* SPDX-License-Identifier: Apache-2.0
* Refer to the file "LICENSE" for details.
*******************************************************************************/

use std::fs::{self, File};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use crate::common::proto::{self, ChunkCode, FrameReader, ProtocolError, ProtocolErrorKind, Request};

////////////////////////////////////////////////////////////////////////////////
// struct VerbConnection

///Serves the LIST/PULL/PUSH verbs on one accepted connection.
///
///The type is generic over its reader and writer so the verb handlers can
///be exercised against in-memory streams. The writer state of a PUSH
///session lives here, per connection: a PUSH begin on one connection can
///never disturb a PUSH in progress on another.
pub struct VerbConnection<R: BufRead, W: Write> {
    reader: FrameReader<R>,
    writer: W,
    root: PathBuf,
    push_file: Option<File>,
}

impl<R: BufRead, W: Write> VerbConnection<R, W> {
    pub fn new(root: PathBuf, reader: R, writer: W) -> VerbConnection<R, W> {
        VerbConnection {
            reader: FrameReader::new(reader),
            writer,
            root,
            push_file: None,
        }
    }

    ///Processes requests until the peer disconnects. Returns an error only
    ///for transport and framing failures; per-file problems are reported to
    ///the peer through the protocol and do not end the connection.
    pub fn serve(&mut self) -> io::Result<()> {
        loop {
            let request = match self.reader.read_request()? {
                None => return Ok(()),
                Some(request) => request,
            };
            log::debug!("received {:?}", request);
            match request {
                Request::List { dir } => self.handle_list(&dir)?,
                Request::Pull { path } => self.handle_pull(&path)?,
                Request::Push { path, chunk } => self.handle_push(&path, chunk)?,
            }
        }
    }

    ///Consumes the connection and returns its writer. (Used by tests to
    ///inspect the produced byte stream.)
    pub fn into_writer(self) -> W {
        self.writer
    }

    fn handle_list(&mut self, dir: &str) -> io::Result<()> {
        let dir_path = self.resolve(dir);
        match fs::read_dir(&dir_path) {
            Ok(entries) => {
                for entry in entries {
                    let entry = match entry {
                        Ok(entry) => entry,
                        Err(_) => continue,
                    };
                    let name = match entry.file_name().into_string() {
                        Ok(name) => name,
                        Err(_) => continue,
                    };
                    if name.starts_with('.') {
                        continue;
                    }
                    //only regular files; stat() through symlinks like plain ls
                    match fs::metadata(entry.path()) {
                        Ok(ref meta) if meta.is_file() => {}
                        _ => continue,
                    }
                    proto::write_list_entry(&mut self.writer, &name)?;
                }
            }
            //an unreadable directory is an empty listing; the sentinel must
            //go out either way or the peer would wait for it forever
            Err(e) => log::error!("cannot list {}: {}", dir_path.display(), e),
        }
        proto::write_list_end(&mut self.writer)
    }

    fn handle_pull(&mut self, path: &str) -> io::Result<()> {
        let file_path = self.resolve(path);
        let mut file = match File::open(&file_path) {
            Ok(file) => file,
            Err(e) => {
                log::error!("cannot open {} for reading: {}", file_path.display(), e);
                return proto::write_pull_error(&mut self.writer, &e.to_string());
            }
        };
        let size = match file.metadata() {
            Ok(meta) => meta.len(),
            Err(e) => {
                log::error!("cannot stat {}: {}", file_path.display(), e);
                return proto::write_pull_error(&mut self.writer, &e.to_string());
            }
        };
        proto::write_pull_size(&mut self.writer, size)?;
        io::copy(&mut file, &mut self.writer)?;
        Ok(())
    }

    fn handle_push(&mut self, path: &str, chunk: ChunkCode) -> io::Result<()> {
        match chunk {
            ChunkCode::Begin => {
                //also closes any file a misbehaving peer left open
                let file_path = self.resolve(path);
                self.push_file = match File::create(&file_path) {
                    Ok(file) => Some(file),
                    Err(e) => {
                        log::error!("cannot open {} for writing: {}", file_path.display(), e);
                        None
                    }
                };
            }
            ChunkCode::End => {
                self.push_file = None;
            }
            ChunkCode::Data(len) => {
                let mut payload = self.reader.payload(len);
                let copied = match self.push_file {
                    Some(ref mut file) => io::copy(&mut payload, file)?,
                    None => {
                        //the payload must leave the stream even if there is
                        //nowhere to put it, or the next frame would parse
                        //from the middle of it
                        log::error!("PUSH data for {} without an open file", path);
                        io::copy(&mut payload, &mut io::sink())?
                    }
                };
                if copied < len {
                    return Err(
                        ProtocolError::new("PUSH payload", ProtocolErrorKind::UnexpectedEof).into(),
                    );
                }
            }
        }
        Ok(())
    }

    //Strips one leading '/' and resolves the rest against the serving root.
    fn resolve(&self, path: &str) -> PathBuf {
        let relative = path.strip_prefix('/').unwrap_or(path);
        if relative.is_empty() {
            self.root.clone()
        } else {
            self.root.join(relative)
        }
    }
}
