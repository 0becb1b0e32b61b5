/*******************************************************************************
* Copyright 2020 Stefan Majewsky <majewsky@gmx.net>
* SPDX-License-Identifier: Apache-2.0
* Refer to the file "LICENSE" for details.
*******************************************************************************/

use std::io::{self, BufReader, Read};
use std::sync::Arc;

use crate::common::proto::{self, ProtocolError, ProtocolErrorKind};
use crate::common::{net, LogFile};
use crate::manager::pool::{JobRunner, SyncJob};
use crate::manager::registry::SyncRegistry;

////////////////////////////////////////////////////////////////////////////////
// struct TransferEngine

///The per-file transfer algorithm that workers execute.
///
///Each job opens two fresh connections: one to the source client (PULL) and
///one to the target client (PUSH). The file is streamed through in chunks
///of [CHUNK_SIZE](../common/proto/constant.CHUNK_SIZE.html) bytes and never
///held in memory as a whole, so the transferable file size is bounded only
///by the clients' filesystems.
///
///Every outcome is logged and reported to the registry; nothing propagates
///back to whoever enqueued the job.
pub struct TransferEngine {
    registry: Arc<SyncRegistry>,
    log: Arc<LogFile>,
}

enum TransferError {
    SourceConnect(io::Error),
    TargetConnect(io::Error),
    ///The source client answered the PULL with `-1 <errtext>`.
    PullRejected(String),
    ///IO or framing failure on the source (PULL) connection.
    SourceIo(io::Error),
    ///IO failure on the target (PUSH) connection.
    TargetIo(io::Error),
}

impl TransferEngine {
    pub fn new(registry: Arc<SyncRegistry>, log: Arc<LogFile>) -> TransferEngine {
        TransferEngine { registry, log }
    }

    //One line in the transfer log, in the fixed bracketed format consumed
    //by log-scraping tooling. LogFile::line() prepends the timestamp.
    fn log_outcome(&self, job: &SyncJob, worker_id: usize, verb: &str, status: &str, detail: &str) {
        self.log.line(&format!(
            "[{}] [{}] [{}] [{}] [{}] [{}]",
            job.source, job.target, worker_id, verb, status, detail
        ));
    }
}

impl JobRunner for TransferEngine {
    fn run(&self, worker_id: usize, job: SyncJob) {
        match transfer(&job) {
            Ok(byte_count) => {
                self.log_outcome(
                    &job,
                    worker_id,
                    "PULL",
                    "SUCCESS",
                    &format!("{} bytes pulled", byte_count),
                );
                self.log_outcome(
                    &job,
                    worker_id,
                    "PUSH",
                    "SUCCESS",
                    &format!("{} bytes pushed", byte_count),
                );
                self.registry.record_outcome(&job.source, true);
            }
            Err(e) => {
                let (verb, detail) = match e {
                    TransferError::SourceConnect(e) => {
                        ("PULL", format!("Connection failed to source: {}", e))
                    }
                    TransferError::TargetConnect(e) => {
                        ("PUSH", format!("Connection failed to target: {}", e))
                    }
                    TransferError::PullRejected(text) => {
                        ("PULL", format!("File: {} - {}", job.filename, text))
                    }
                    TransferError::SourceIo(e) => {
                        ("PULL", format!("File: {} - {}", job.filename, e))
                    }
                    TransferError::TargetIo(e) => {
                        ("PUSH", format!("File: {} - {}", job.filename, e))
                    }
                };
                self.log_outcome(&job, worker_id, verb, "ERROR", &detail);
                self.registry.record_outcome(&job.source, false);
            }
        }
    }
}

//The transfer algorithm itself. Returns the number of content bytes that
//were streamed from source to target.
fn transfer(job: &SyncJob) -> Result<u64, TransferError> {
    let source_path = format!("{}/{}", job.source.dir, job.filename);
    let target_path = format!("{}/{}", job.target.dir, job.filename);

    let mut source = net::dial(&job.source.endpoint).map_err(TransferError::SourceConnect)?;
    let mut target = net::dial(&job.target.endpoint).map_err(TransferError::TargetConnect)?;

    proto::write_pull_request(&mut source, &source_path).map_err(TransferError::SourceIo)?;

    //The size header ends at the first space, after which content bytes
    //begin immediately. Reading the header through a BufReader keeps any
    //content bytes that arrived in the same segment buffered: they simply
    //become the first bytes the chunk loop reads. This stays correct
    //however the TCP stack splits the response.
    let mut source = BufReader::new(source);
    let size = proto::read_pull_size(&mut source).map_err(TransferError::SourceIo)?;
    if size < 0 {
        return Err(TransferError::PullRejected(read_error_text(&mut source)));
    }
    let size = size as u64;

    proto::write_push_begin(&mut target, &target_path).map_err(TransferError::TargetIo)?;

    let mut transferred: u64 = 0;
    let mut buf = [0u8; proto::CHUNK_SIZE];
    while transferred < size {
        let want = (size - transferred).min(buf.len() as u64) as usize;
        let count = match source.read(&mut buf[..want]) {
            Ok(0) => {
                //the source promised more bytes than it delivered
                let e = ProtocolError::new("PULL content", ProtocolErrorKind::UnexpectedEof);
                return Err(TransferError::SourceIo(e.into()));
            }
            Ok(count) => count,
            Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(TransferError::SourceIo(e)),
        };
        proto::write_push_chunk(&mut target, &target_path, &buf[..count])
            .map_err(TransferError::TargetIo)?;
        transferred += count as u64;
    }

    proto::write_push_end(&mut target, &target_path).map_err(TransferError::TargetIo)?;
    Ok(transferred)
}

//After a negative size header the rest of the stream is the error message.
//The client sends it in one piece and keeps the connection open, so this
//takes what a single read returns instead of waiting for EOF.
fn read_error_text<R: Read>(source: &mut R) -> String {
    let mut buf = [0u8; 256];
    match source.read(&mut buf) {
        Ok(count) if count > 0 => String::from_utf8_lossy(&buf[..count]).trim_end().into(),
        _ => "unknown error".into(),
    }
}
