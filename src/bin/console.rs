/*******************************************************************************
* Copyright 2020 Stefan Majewsky <majewsky@gmx.net>
* SPDX-License-Identifier: Apache-2.0
* Refer to the file "LICENSE" for details.
*******************************************************************************/

use std::io::{self, BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process;

use clap::Parser;

use dirsync::common::{net, Endpoint, LogFile};
use dirsync::manager::{parse_command, Command};

///The interactive command sender: forwards add/cancel/shutdown commands to
///a running manager and prints the replies.
//-h is taken by the host flag, matching the established CLI; clap's
//automatic help short flag is disabled to make room for it
#[derive(Parser, Debug)]
#[command(name = "dirsync-console", disable_help_flag = true)]
struct Args {
    ///Path of the console log file (created or truncated at startup).
    #[arg(short = 'l', value_name = "LOGFILE")]
    logfile: PathBuf,
    ///IPv4 address of the manager.
    #[arg(short = 'h', value_name = "HOST")]
    host: String,
    ///Console port of the manager.
    #[arg(short = 'p', value_name = "PORT")]
    port: u16,
}

fn main() {
    belog::init();

    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let _ = e.print();
            process::exit(1);
        }
    };

    let log = match LogFile::create(&args.logfile) {
        Ok(log) => log,
        Err(e) => {
            log::error!("cannot open log file {}: {}", args.logfile.display(), e);
            process::exit(1);
        }
    };

    let endpoint = Endpoint {
        host: args.host,
        port: args.port,
    };
    if let Err(e) = run(&endpoint, &log) {
        log::error!("console failed: {}", e);
        process::exit(1);
    }
}

fn run(endpoint: &Endpoint, log: &LogFile) -> io::Result<()> {
    let stream = match net::dial(endpoint) {
        Ok(stream) => stream,
        Err(e) => {
            log::error!("cannot connect to manager at {}: {}", endpoint, e);
            process::exit(1);
        }
    };
    let mut reader = BufReader::new(stream.try_clone()?);
    let mut writer = stream;

    println!("connected to manager at {}", endpoint);
    println!("type \"help\" for available commands");

    let stdin = io::stdin();
    let mut input = String::new();
    loop {
        print!("> ");
        io::stdout().flush()?;

        input.clear();
        if stdin.read_line(&mut input)? == 0 {
            return Ok(()); //EOF on stdin
        }
        let line = input.trim();
        if line.is_empty() {
            continue;
        }
        if line == "help" {
            print_help();
            continue;
        }

        //malformed commands are caught here instead of bothering the manager
        let command = match parse_command(line) {
            Some(command) => command,
            None => {
                eprintln!("invalid command: {} (type \"help\" for the syntax)", line);
                continue;
            }
        };

        log.line(&format!("Command {}", line));
        writer.write_all(line.as_bytes())?;
        writer.write_all(b"\n")?;

        let mut reply = String::new();
        if reader.read_line(&mut reply)? == 0 {
            log::error!("manager closed the connection");
            return Ok(());
        }
        print!("{}", reply);
        log.line(&format!("Response: {}", reply.trim_end()));

        if command == Command::Shutdown {
            println!("shutting down console...");
            return Ok(());
        }
    }
}

fn print_help() {
    println!("available commands:");
    println!("  add <source> <target>  start synchronizing a directory pair");
    println!("  cancel <source>        stop synchronizing a source directory");
    println!("  shutdown               shut down the manager");
    println!("  help                   show this message");
    println!("directories are specified as <dirpath>@<host>:<port>");
}
