/*******************************************************************************
* Copyright 2020 Stefan Majewsky <majewsky@gmx.net>
* SPDX-License-Identifier: Apache-2.0
* Refer to the file "LICENSE" for details.
*******************************************************************************/

/*!
A distributed directory-synchronization service with three cooperating
processes:

* The **client** (`dirsync-client`) is a per-host file server. It serves a
  local directory tree over TCP with three verbs: LIST (enumerate regular
  files in a directory), PULL (read a file) and PUSH (write a file in
  chunks).
* The **manager** (`dirsync-manager`) is the central coordinator. It accepts
  sync-pair declarations from consoles, lists files at source clients, and
  drives the per-file transfers through a bounded worker pool.
* The **console** (`dirsync-console`) is a thin interactive command sender
  that forwards `add`/`cancel`/`shutdown` commands to the manager.

A "sync" is a one-shot copy of all regular files visible at the source
directory at the moment the pair is added. There is no change watching, no
delta transfer and no deletion propagation.
*/

///Types and definitions shared by all three processes: endpoints, the wire
///protocol, networking helpers, logging and signal handling.
pub mod common;
///The client-side verb server (LIST/PULL/PUSH over a local directory).
pub mod client;
///The manager: sync-pair registry, worker pool, transfer engine and the
///console-facing TCP server.
pub mod manager;
