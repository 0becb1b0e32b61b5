/*******************************************************************************
* Copyright 2020 Stefan Majewsky <majewsky@gmx.net>
* SPDX-License-Identifier: Apache-2.0
* Refer to the file "LICENSE" for details.
*******************************************************************************/

mod endpoint;
pub use endpoint::*;
mod logfile;
pub use logfile::*;

///Dial/listen helpers and timeout classification for blocking sockets.
pub mod net;
///The LIST/PULL/PUSH wire protocol: request parsing, response reading and
///writer helpers.
pub mod proto;
///SIGINT/SIGTERM handling via a process-wide atomic flag.
pub mod signal;
