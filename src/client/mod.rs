/*******************************************************************************
* Copyright 2020 Stefan Majewsky <majewsky@gmx.net>
* SPDX-License-Identifier: Apache-2.0
* Refer to the file "LICENSE" for details.
*******************************************************************************/

/*!
The client is a deliberately small file server: it owns a root directory
and serves the LIST/PULL/PUSH verbs over it. Each accepted connection gets
its own thread and its own [VerbConnection](struct.VerbConnection.html), so
parallel manager workers are never serialized behind each other.

Incoming paths have one leading `/` stripped and are then interpreted
relative to the root directory (the binary passes the process working
directory).
*/

use std::io::{self, BufReader};
use std::net::{TcpListener, TcpStream};
use std::path::PathBuf;
use std::thread;

use crate::common::net;

mod handler;
pub use handler::*;


////////////////////////////////////////////////////////////////////////////////
// struct ClientServer

///The accept loop of the client process.
pub struct ClientServer {
    root: PathBuf,
}

impl ClientServer {
    pub fn new(root: PathBuf) -> ClientServer {
        ClientServer { root }
    }

    ///Binds the given port and serves connections forever.
    pub fn run(&self, port: u16) -> io::Result<()> {
        let listener = net::listen(port)?;
        log::info!("client listening on port {}", port);
        self.serve(listener)
    }

    ///Serves connections on an existing listener. Never returns except for
    ///fatal listener errors; connection-level errors only end the affected
    ///connection.
    pub fn serve(&self, listener: TcpListener) -> io::Result<()> {
        loop {
            match listener.accept() {
                Ok((stream, addr)) => {
                    log::info!("connection from {}", addr);
                    let root = self.root.clone();
                    thread::spawn(move || {
                        match serve_connection(root, stream) {
                            Ok(()) => log::info!("connection from {} closed", addr),
                            Err(e) => log::error!("connection from {} aborted: {}", addr, e),
                        }
                    });
                }
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    log::error!("accept failed: {}", e);
                    return Err(e);
                }
            }
        }
    }
}

fn serve_connection(root: PathBuf, stream: TcpStream) -> io::Result<()> {
    let reader = BufReader::new(stream.try_clone()?);
    VerbConnection::new(root, reader, stream).serve()
}
