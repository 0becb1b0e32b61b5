/*******************************************************************************
* Copyright 2020 Stefan Majewsky <majewsky@gmx.net>
* SPDX-License-Identifier: Apache-2.0
* Refer to the file "LICENSE" for details.
*******************************************************************************/

use std::path::PathBuf;
use std::process;

use clap::Parser;

use dirsync::common::signal;
use dirsync::manager::{Manager, ManagerOptions};

///The central coordinator: accepts sync-pair declarations from consoles and
///drives file transfers between clients through a worker pool.
#[derive(Parser, Debug)]
#[command(name = "dirsync-manager")]
struct Args {
    ///Path of the manager log file (created or truncated at startup).
    #[arg(short = 'l', value_name = "LOGFILE")]
    logfile: PathBuf,
    ///Path of the startup config file, one sync pair per line.
    #[arg(short = 'c', value_name = "CONFIG")]
    config: PathBuf,
    ///Number of worker threads.
    #[arg(short = 'n', value_name = "WORKERS")]
    workers: usize,
    ///TCP port to accept console connections on.
    #[arg(short = 'p', value_name = "PORT")]
    port: u16,
    ///Capacity of the job queue.
    #[arg(short = 'b', value_name = "BUFFER_SIZE")]
    buffer_size: usize,
}

fn main() {
    belog::init();

    //clap would exit with status 2 on its own; all startup failures of this
    //process exit with status 1
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let _ = e.print();
            process::exit(1);
        }
    };
    if args.workers == 0 {
        log::error!("worker count must be positive");
        process::exit(1);
    }
    if args.buffer_size == 0 {
        log::error!("buffer size must be positive");
        process::exit(1);
    }

    if let Err(e) = signal::install() {
        log::error!("cannot install signal handlers: {}", e);
        process::exit(1);
    }

    let options = ManagerOptions {
        port: args.port,
        worker_count: args.workers,
        queue_capacity: args.buffer_size,
        logfile_path: args.logfile,
        config_path: args.config,
    };
    let manager = match Manager::new(&options) {
        Ok(manager) => manager,
        Err(e) => {
            log::error!("startup failed: {}", e);
            process::exit(1);
        }
    };
    if let Err(e) = manager.load_config(&options.config_path) {
        log::error!(
            "cannot read config file {}: {}",
            options.config_path.display(),
            e
        );
        process::exit(1);
    }
    for pair in manager.sync_pairs() {
        log::info!("synchronizing {} -> {}", pair.source, pair.target);
    }

    if let Err(e) = manager.run() {
        log::error!("manager failed: {}", e);
        process::exit(1);
    }
}
