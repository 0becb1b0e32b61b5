/*******************************************************************************
* Copyright 2020 Stefan Majewsky <majewsky@gmx.net>
* SPDX-License-Identifier: Apache-2.0
* Refer to the file "LICENSE" for details.
*******************************************************************************/

use std::io::{self, Write};

//Requests (manager side). Each function emits exactly one frame; flushing
//is left to the caller since TcpStream writes are unbuffered anyway.

pub fn write_list_request<W: Write>(w: &mut W, dir: &str) -> io::Result<()> {
    write!(w, "LIST {}\n", dir)
}

pub fn write_pull_request<W: Write>(w: &mut W, path: &str) -> io::Result<()> {
    write!(w, "PULL {}\n", path)
}

pub fn write_push_begin<W: Write>(w: &mut W, path: &str) -> io::Result<()> {
    write!(w, "PUSH {} -1\n", path)
}

pub fn write_push_end<W: Write>(w: &mut W, path: &str) -> io::Result<()> {
    write!(w, "PUSH {} 0\n", path)
}

///Writes one data-bearing PUSH frame: the header announcing the chunk size,
///then the payload bytes directly after the separating space.
pub fn write_push_chunk<W: Write>(w: &mut W, path: &str, data: &[u8]) -> io::Result<()> {
    write!(w, "PUSH {} {} ", path, data.len())?;
    w.write_all(data)
}

//Responses (client side).

pub fn write_list_entry<W: Write>(w: &mut W, name: &str) -> io::Result<()> {
    write!(w, "{}\n", name)
}

///Writes the sentinel line that terminates a LIST response.
pub fn write_list_end<W: Write>(w: &mut W) -> io::Result<()> {
    w.write_all(b".\n")
}

///Writes the size header of a successful PULL response. The file content
///follows directly after the separating space.
pub fn write_pull_size<W: Write>(w: &mut W, size: u64) -> io::Result<()> {
    write!(w, "{} ", size)
}

pub fn write_pull_error<W: Write>(w: &mut W, message: &str) -> io::Result<()> {
    write!(w, "-1 {}", message)
}
