/*******************************************************************************
* Copyright 2020 Stefan Majewsky <majewsky@gmx.net>
* SPDX-License-Identifier: Apache-2.0
* Refer to the file "LICENSE" for details.
*******************************************************************************/

use std::io::{self, BufRead, BufReader, Write};
use std::net::{SocketAddr, TcpStream};
use std::time::Duration;

use crate::common::net;
use crate::manager::{AddResult, CancelResult, ManagerInner};

///How long a console read blocks before the handler re-checks the shutdown
///flag.
const READ_TIMEOUT: Duration = Duration::from_secs(1);

////////////////////////////////////////////////////////////////////////////////
// enum Command

///A parsed console command.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    Add { source: String, target: String },
    Cancel { source: String },
    Shutdown,
}

///Parses one console input line. Returns None for anything that is not a
///well-formed command; the caller echoes the offending input back.
///Surplus tokens after a complete command are ignored.
pub fn parse_command(line: &str) -> Option<Command> {
    let mut words = line.split_whitespace();
    match words.next()? {
        "add" => Some(Command::Add {
            source: words.next()?.into(),
            target: words.next()?.into(),
        }),
        "cancel" => Some(Command::Cancel {
            source: words.next()?.into(),
        }),
        "shutdown" => Some(Command::Shutdown),
        _ => None,
    }
}

////////////////////////////////////////////////////////////////////////////////
// connection handler

///Runs the command loop for one accepted console connection. Each command
///gets exactly one reply line. The loop ends on EOF, on transport errors,
///on a `shutdown` command, or when the shutdown flag is raised elsewhere.
pub(crate) fn handle_connection(manager: &ManagerInner, stream: TcpStream, addr: SocketAddr) {
    match run_command_loop(manager, stream) {
        Ok(()) => log::info!("console connection from {} closed", addr),
        Err(e) => log::error!("console connection from {} aborted: {}", addr, e),
    }
}

fn run_command_loop(manager: &ManagerInner, stream: TcpStream) -> io::Result<()> {
    //a short read timeout keeps the loop responsive to the shutdown flag
    //even while no console input arrives
    stream.set_read_timeout(Some(READ_TIMEOUT))?;
    let mut reader = BufReader::new(stream.try_clone()?);
    let mut writer = stream;

    let mut line = String::new();
    loop {
        if manager.shutdown_requested() {
            return Ok(());
        }
        match reader.read_line(&mut line) {
            Ok(0) => return Ok(()), //EOF, console disconnected
            Ok(_) => {
                let input = line.trim();
                if let Some(Command::Shutdown) = parse_command(input) {
                    //reply first, then break the loop, then raise the flag;
                    //the accept loop notices it on its next poll
                    writer.write_all(b"Shutting down manager...\n")?;
                    manager.request_shutdown();
                    return Ok(());
                }
                let reply = dispatch(manager, input);
                writer.write_all(reply.as_bytes())?;
                writer.write_all(b"\n")?;
                line.clear();
            }
            //on a timeout, any partial line stays in `line` and the next
            //read_line continues appending to it
            Err(ref e) if net::is_timeout(e) => continue,
            Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
}

fn dispatch(manager: &ManagerInner, input: &str) -> String {
    match parse_command(input) {
        Some(Command::Add { source, target }) => match manager.handle_add(&source, &target) {
            AddResult::Added => "Added sync pair successfully".into(),
            AddResult::AlreadyExists => format!("Already in queue: {}", source),
            AddResult::Failed => "Error adding sync pair".into(),
        },
        Some(Command::Cancel { source }) => match manager.handle_cancel(&source) {
            CancelResult::Stopped => format!("Synchronization stopped for {}", source),
            CancelResult::NotSynchronized => {
                format!("Directory not being synchronized: {}", source)
            }
            CancelResult::Failed => "Error canceling synchronization".into(),
        },
        //shutdown is intercepted by the caller before dispatch
        Some(Command::Shutdown) => "Shutting down manager...".into(),
        None => format!("Invalid command: {}", input),
    }
}
