/*******************************************************************************
* Copyright 2020 Stefan Majewsky <majewsky@gmx.net>
* SPDX-License-Identifier: Apache-2.0
* Refer to the file "LICENSE" for details.
*******************************************************************************/

use std::path::PathBuf;
use std::process;

use clap::Parser;

use dirsync::client::ClientServer;

///The per-host file server: serves LIST/PULL/PUSH over the process working
///directory.
#[derive(Parser, Debug)]
#[command(name = "dirsync-client")]
struct Args {
    ///TCP port to serve on.
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

    //incoming paths are resolved relative to the working directory, as
    //documented for the wire protocol
    let server = ClientServer::new(PathBuf::from("."));
    if let Err(e) = server.run(args.port) {
        log::error!("client failed: {}", e);
        process::exit(1);
    }
}
