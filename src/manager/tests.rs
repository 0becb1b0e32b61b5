/*******************************************************************************
* Copyright 2020 Stefan Majewsky <majewsky@gmx.net>
* SPDX-License-Identifier: Apache-2.0
* Refer to the file "LICENSE" for details.
*******************************************************************************/

use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use crate::client::ClientServer;
use crate::manager::*;

//Spawns a client serving `root` on an ephemeral loopback port and returns
//that port. The serving thread lives until the test process exits.
fn spawn_client(root: &Path) -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    let server = ClientServer::new(root.to_path_buf());
    thread::spawn(move || {
        let _ = server.serve(listener);
    });
    port
}

//Builds a manager with an ephemeral console port, a fresh log file and an
//empty config. Returns the manager, the log file path, and the tempdir
//that keeps both alive.
fn start_manager(
    worker_count: usize,
    queue_capacity: usize,
) -> (Manager, PathBuf, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let logfile_path = dir.path().join("manager.log");
    let config_path = dir.path().join("config");
    fs::write(&config_path, "").unwrap();
    let options = ManagerOptions {
        port: 0,
        worker_count,
        queue_capacity,
        logfile_path: logfile_path.clone(),
        config_path: config_path.clone(),
    };
    let manager = Manager::new(&options).unwrap();
    manager.load_config(&options.config_path).unwrap();
    (manager, logfile_path, dir)
}

//Shuts the pool down, waits until every queued job has been processed, and
//returns the log file contents.
fn drain_and_read_log(mut manager: Manager, logfile_path: &Path) -> String {
    manager.pool.shutdown();
    manager.pool.join();
    fs::read_to_string(logfile_path).unwrap()
}

fn count(haystack: &str, needle: &str) -> usize {
    haystack.matches(needle).count()
}

#[test]
fn test_empty_source_creates_entry_but_no_jobs() {
    let files = tempfile::tempdir().unwrap();
    fs::create_dir(files.path().join("src")).unwrap();
    fs::create_dir(files.path().join("tgt")).unwrap();
    let port = spawn_client(files.path());

    let (manager, logfile_path, _dir) = start_manager(2, 4);
    let source = format!("/src@127.0.0.1:{}", port);
    let target = format!("/tgt@127.0.0.1:{}", port);

    assert_eq!(manager.inner.handle_add(&source, &target), AddResult::Added);
    assert_eq!(manager.inner.registry.len(), 1);
    assert!(manager.inner.queue.is_empty());

    let log = drain_and_read_log(manager, &logfile_path);
    assert_eq!(count(&log, "Started sync"), 1);
    assert_eq!(count(&log, "[PULL]"), 0);
    assert_eq!(count(&log, "[PUSH]"), 0);
    //the target directory stays untouched
    assert_eq!(fs::read_dir(files.path().join("tgt")).unwrap().count(), 0);
}

#[test]
fn test_three_small_files_round_trip() {
    let files = tempfile::tempdir().unwrap();
    fs::create_dir(files.path().join("src")).unwrap();
    fs::create_dir(files.path().join("tgt")).unwrap();
    fs::write(files.path().join("src/a"), b"A").unwrap();
    fs::write(files.path().join("src/b"), b"BB").unwrap();
    fs::write(files.path().join("src/c"), b"CCC").unwrap();
    let port = spawn_client(files.path());

    let (manager, logfile_path, _dir) = start_manager(2, 4);
    let source = format!("/src@127.0.0.1:{}", port);
    let target = format!("/tgt@127.0.0.1:{}", port);
    assert_eq!(manager.inner.handle_add(&source, &target), AddResult::Added);

    let log = drain_and_read_log(manager, &logfile_path);

    assert_eq!(fs::read(files.path().join("tgt/a")).unwrap(), b"A");
    assert_eq!(fs::read(files.path().join("tgt/b")).unwrap(), b"BB");
    assert_eq!(fs::read(files.path().join("tgt/c")).unwrap(), b"CCC");

    assert_eq!(count(&log, "[PULL] [SUCCESS]"), 3);
    assert_eq!(count(&log, "[PUSH] [SUCCESS]"), 3);
    assert_eq!(count(&log, "[ERROR]"), 0);
    //byte counts appear once each, in whatever completion order
    assert_eq!(count(&log, "[1 bytes pulled]"), 1);
    assert_eq!(count(&log, "[2 bytes pulled]"), 1);
    assert_eq!(count(&log, "[3 bytes pulled]"), 1);
}

#[test]
fn test_large_file_streams_in_chunks() {
    //larger than the chunk buffer, so the streaming loop runs many times
    let payload: Vec<u8> = (0..100_000u32).flat_map(|i| i.to_le_bytes()).collect();

    let files = tempfile::tempdir().unwrap();
    fs::create_dir(files.path().join("src")).unwrap();
    fs::create_dir(files.path().join("tgt")).unwrap();
    fs::write(files.path().join("src/blob"), &payload).unwrap();
    let port = spawn_client(files.path());

    let (manager, logfile_path, _dir) = start_manager(1, 2);
    let source = format!("/src@127.0.0.1:{}", port);
    let target = format!("/tgt@127.0.0.1:{}", port);
    assert_eq!(manager.inner.handle_add(&source, &target), AddResult::Added);

    let log = drain_and_read_log(manager, &logfile_path);
    assert_eq!(count(&log, "[PULL] [SUCCESS]"), 1);
    assert_eq!(fs::read(files.path().join("tgt/blob")).unwrap(), payload);
}

#[test]
fn test_duplicate_add_is_rejected() {
    let files = tempfile::tempdir().unwrap();
    fs::create_dir(files.path().join("src")).unwrap();
    fs::create_dir(files.path().join("tgt")).unwrap();
    let port = spawn_client(files.path());

    let (manager, logfile_path, _dir) = start_manager(1, 2);
    let source = format!("/src@127.0.0.1:{}", port);
    let target = format!("/tgt@127.0.0.1:{}", port);

    assert_eq!(manager.inner.handle_add(&source, &target), AddResult::Added);
    assert_eq!(
        manager.inner.handle_add(&source, &target),
        AddResult::AlreadyExists
    );
    assert_eq!(manager.inner.registry.len(), 1);

    let log = drain_and_read_log(manager, &logfile_path);
    assert_eq!(count(&log, &format!("Already in queue: {}", source)), 1);
}

#[test]
fn test_cancel_then_add_same_source() {
    let files = tempfile::tempdir().unwrap();
    fs::create_dir(files.path().join("src")).unwrap();
    fs::create_dir(files.path().join("tgt")).unwrap();
    let port = spawn_client(files.path());

    let (manager, _logfile_path, _dir) = start_manager(1, 2);
    let source = format!("/src@127.0.0.1:{}", port);
    let target = format!("/tgt@127.0.0.1:{}", port);

    assert_eq!(manager.inner.handle_add(&source, &target), AddResult::Added);
    assert_eq!(manager.inner.handle_cancel(&source), CancelResult::Stopped);

    //cancel deactivates but does not remove, so the same source is still a
    //duplicate
    assert_eq!(
        manager.inner.handle_add(&source, &target),
        AddResult::AlreadyExists
    );
    let pair = manager
        .inner
        .registry
        .find(&source.parse().unwrap())
        .unwrap();
    assert!(!pair.active);
}

#[test]
fn test_cancel_of_unknown_source() {
    let (manager, _logfile_path, _dir) = start_manager(1, 2);
    assert_eq!(
        manager.inner.handle_cancel("/never-added@127.0.0.1:9999"),
        CancelResult::NotSynchronized
    );
}

#[test]
fn test_add_with_malformed_specs_fails_cleanly() {
    let (manager, _logfile_path, _dir) = start_manager(1, 2);
    assert_eq!(
        manager.inner.handle_add("not-a-spec", "/tgt@127.0.0.1:9999"),
        AddResult::Failed
    );
    assert_eq!(
        manager.inner.handle_add("/src@127.0.0.1:9999", "not-a-spec"),
        AddResult::Failed
    );
    assert!(manager.inner.registry.is_empty());
}

#[test]
fn test_add_with_unreachable_source_keeps_entry() {
    let (manager, logfile_path, _dir) = start_manager(1, 2);
    //nothing listens on the target port of this spec
    let source = "/src@127.0.0.1:1";
    let target = "/tgt@127.0.0.1:1";

    assert_eq!(manager.inner.handle_add(source, target), AddResult::Failed);
    //matching the no-rollback rule, the entry stays registered
    assert_eq!(manager.inner.registry.len(), 1);

    let log = drain_and_read_log(manager, &logfile_path);
    assert_eq!(count(&log, "Failed to connect to source"), 1);
    assert_eq!(count(&log, "Failed to start sync"), 1);
}

#[test]
fn test_pull_failure_is_logged_and_contained() {
    let files = tempfile::tempdir().unwrap();
    fs::create_dir(files.path().join("src")).unwrap();
    fs::create_dir(files.path().join("tgt")).unwrap();
    let port = spawn_client(files.path());

    let (manager, logfile_path, _dir) = start_manager(1, 2);
    let source: crate::common::DirSpec = format!("/src@127.0.0.1:{}", port).parse().unwrap();
    let target: crate::common::DirSpec = format!("/tgt@127.0.0.1:{}", port).parse().unwrap();
    manager.inner.registry.add(source.clone(), target.clone());

    //enqueue a job for a file that does not exist at the source
    manager
        .inner
        .queue
        .push(SyncJob {
            source: source.clone(),
            target,
            filename: "ghost".into(),
        })
        .unwrap();

    let log = drain_and_read_log(manager, &logfile_path);
    assert_eq!(count(&log, "[PULL] [ERROR]"), 1);
    assert_eq!(count(&log, "[SUCCESS]"), 0);
    assert!(log.contains("File: ghost"), "log = {:?}", log);
}

#[test]
fn test_failed_transfer_bumps_error_count() {
    let files = tempfile::tempdir().unwrap();
    fs::create_dir(files.path().join("src")).unwrap();
    fs::create_dir(files.path().join("tgt")).unwrap();
    let port = spawn_client(files.path());

    let (mut manager, _logfile_path, _dir) = start_manager(1, 2);
    let source: crate::common::DirSpec = format!("/src@127.0.0.1:{}", port).parse().unwrap();
    let target: crate::common::DirSpec = format!("/tgt@127.0.0.1:{}", port).parse().unwrap();
    manager.inner.registry.add(source.clone(), target.clone());

    manager
        .inner
        .queue
        .push(SyncJob {
            source: source.clone(),
            target,
            filename: "ghost".into(),
        })
        .unwrap();
    manager.pool.shutdown();
    manager.pool.join();

    let pair = manager.inner.registry.find(&source).unwrap();
    assert_eq!(pair.error_count, 1);
    assert!(pair.last_sync_time.is_none());
}

#[test]
fn test_console_session_end_to_end() {
    let files = tempfile::tempdir().unwrap();
    fs::create_dir(files.path().join("src")).unwrap();
    fs::create_dir(files.path().join("tgt")).unwrap();
    fs::write(files.path().join("src/hello"), b"hello over the wire").unwrap();
    let client_port = spawn_client(files.path());

    let (manager, logfile_path, _dir) = start_manager(2, 4);
    let console_port = manager.listener.local_addr().unwrap().port();
    let manager_thread = thread::spawn(move || manager.run());

    let stream = TcpStream::connect(("127.0.0.1", console_port)).unwrap();
    stream
        .set_read_timeout(Some(Duration::from_secs(10)))
        .unwrap();
    let mut reader = BufReader::new(stream.try_clone().unwrap());
    let mut writer = stream;

    let mut send = |command: &str| -> String {
        writer.write_all(command.as_bytes()).unwrap();
        writer.write_all(b"\n").unwrap();
        let mut reply = String::new();
        reader.read_line(&mut reply).unwrap();
        reply.trim_end().to_string()
    };

    let source = format!("/src@127.0.0.1:{}", client_port);
    let target = format!("/tgt@127.0.0.1:{}", client_port);

    assert_eq!(
        send(&format!("add {} {}", source, target)),
        "Added sync pair successfully"
    );
    assert_eq!(
        send(&format!("add {} {}", source, target)),
        format!("Already in queue: {}", source)
    );
    assert_eq!(send("frobnicate all the things"), "Invalid command: frobnicate all the things");
    assert_eq!(
        send(&format!("cancel {}", source)),
        format!("Synchronization stopped for {}", source)
    );
    assert_eq!(send("shutdown"), "Shutting down manager...");

    //run() returns only after the queue has drained and everything joined
    manager_thread.join().unwrap().unwrap();

    assert_eq!(
        fs::read(files.path().join("tgt/hello")).unwrap(),
        b"hello over the wire"
    );
    let log = fs::read_to_string(&logfile_path).unwrap();
    assert_eq!(count(&log, "[PULL] [SUCCESS]"), 1);
    assert_eq!(count(&log, "Manager shutdown complete."), 1);
}

#[test]
fn test_config_file_is_applied_as_adds() {
    let files = tempfile::tempdir().unwrap();
    fs::create_dir(files.path().join("src")).unwrap();
    fs::create_dir(files.path().join("tgt")).unwrap();
    fs::write(files.path().join("src/seeded"), b"from config").unwrap();
    let port = spawn_client(files.path());

    let (manager, logfile_path, dir) = start_manager(1, 2);
    let config_path = dir.path().join("pairs.conf");
    fs::write(
        &config_path,
        format!(
            "# comment line\n\
             \n\
             /src@127.0.0.1:{port} /tgt@127.0.0.1:{port}\n\
             /src@127.0.0.1:{port} /tgt@127.0.0.1:{port}\n\
             malformed-line\n",
            port = port
        ),
    )
    .unwrap();
    manager.load_config(&config_path).unwrap();

    //the duplicate line and the malformed line were skipped
    assert_eq!(manager.inner.registry.len(), 1);

    let log = drain_and_read_log(manager, &logfile_path);
    assert_eq!(count(&log, "[PULL] [SUCCESS]"), 1);
    assert_eq!(
        fs::read(files.path().join("tgt/seeded")).unwrap(),
        b"from config"
    );
}

#[test]
fn test_missing_config_file_is_a_startup_error() {
    let (manager, _logfile_path, dir) = start_manager(1, 2);
    assert!(manager.load_config(&dir.path().join("no-such-config")).is_err());
}
