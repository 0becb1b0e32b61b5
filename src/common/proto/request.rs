/*******************************************************************************
* Copyright 2020 Stefan Majewsky <majewsky@gmx.net>
* SPDX-License-Identifier: Apache-2.0
* Refer to the file "LICENSE" for details.
*******************************************************************************/

use std::io::{self, BufRead, Read};

use super::{ProtocolError, ProtocolErrorKind};

////////////////////////////////////////////////////////////////////////////////
// enum Request

///The chunk code of a PUSH frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChunkCode {
    ///`-1`: open (or truncate) the target file for writing.
    Begin,
    ///`0`: close the target file.
    End,
    ///A positive value: exactly this many payload bytes follow the header.
    Data(u64),
}

///One request frame received by a client.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Request {
    List { dir: String },
    Pull { path: String },
    Push { path: String, chunk: ChunkCode },
}

////////////////////////////////////////////////////////////////////////////////
// struct FrameReader

///Reads request frames off a buffered byte stream.
///
///The reader consumes exactly one frame header per call; the payload of a
///`Push`/`Data` frame is deliberately left in the stream, because the
///caller decides where those bytes go (usually straight into a file). Use
///[`payload()`](#method.payload) to obtain a reader limited to the
///announced payload size.
pub struct FrameReader<R: BufRead> {
    inner: R,
}

impl<R: BufRead> FrameReader<R> {
    pub fn new(inner: R) -> FrameReader<R> {
        FrameReader { inner }
    }

    ///Returns a reader that yields exactly the `len` payload bytes of the
    ///most recently parsed `Data` frame.
    pub fn payload(&mut self, len: u64) -> io::Take<&mut R> {
        (&mut self.inner).take(len)
    }

    ///Reads the next request frame. Returns `Ok(None)` when the peer closed
    ///the connection at a frame boundary; EOF inside a frame is an error.
    pub fn read_request(&mut self) -> io::Result<Option<Request>> {
        //detect clean EOF before committing to a frame
        let first = match self.read_byte()? {
            None => return Ok(None),
            Some(b) => b,
        };

        let (verb, delim) = self.read_token(first, "request verb")?;
        match verb.as_str() {
            "LIST" => {
                let dir = self.read_line_argument(delim, "LIST directory")?;
                Ok(Some(Request::List { dir }))
            }
            "PULL" => {
                let path = self.read_line_argument(delim, "PULL path")?;
                Ok(Some(Request::Pull { path }))
            }
            "PUSH" => {
                if delim != b' ' {
                    return Err(self.error("PUSH path", ProtocolErrorKind::MissingArgument));
                }
                let (path, delim) = self.read_nonempty_token("PUSH path")?;
                if delim != b' ' {
                    return Err(self.error("PUSH chunk code", ProtocolErrorKind::MissingArgument));
                }
                let (code, delim) = self.read_nonempty_token("PUSH chunk code")?;
                let chunk = self.parse_chunk_code(&code, delim)?;
                Ok(Some(Request::Push { path, chunk }))
            }
            _ => Err(self.error("request verb", ProtocolErrorKind::UnknownVerb)),
        }
    }

    fn parse_chunk_code(&mut self, code: &str, delim: u8) -> io::Result<ChunkCode> {
        let context = "PUSH chunk code";
        match code.parse::<i64>() {
            Ok(-1) | Ok(0) => {
                //begin/end frames are newline-terminated; tolerate trailing
                //spaces before the newline
                if delim == b' ' {
                    self.read_to_newline(context)?;
                }
                if code.starts_with('-') {
                    Ok(ChunkCode::Begin)
                } else {
                    Ok(ChunkCode::End)
                }
            }
            Ok(n) if n > 0 => {
                //the single space after the chunk code separates header and
                //payload; a newline here means the payload cannot follow
                if delim != b' ' {
                    return Err(self.error(context, ProtocolErrorKind::MissingPayloadSeparator));
                }
                Ok(ChunkCode::Data(n as u64))
            }
            _ => Err(self.error(context, ProtocolErrorKind::InvalidChunkCode)),
        }
    }

    //Reads a token that started with the byte `first`, up to the next space
    //or newline. Returns the token and the delimiter that ended it.
    fn read_token(&mut self, first: u8, context: &'static str) -> io::Result<(String, u8)> {
        if first == b' ' || first == b'\n' {
            return Ok((String::new(), first));
        }
        let mut bytes = vec![first];
        loop {
            match self.read_byte()? {
                None => return Err(self.error(context, ProtocolErrorKind::UnexpectedEof)),
                Some(b) if b == b' ' || b == b'\n' => {
                    return self.finish_token(bytes, b, context);
                }
                Some(b) => bytes.push(b),
            }
        }
    }

    fn read_nonempty_token(&mut self, context: &'static str) -> io::Result<(String, u8)> {
        let first = match self.read_byte()? {
            None => return Err(self.error(context, ProtocolErrorKind::UnexpectedEof)),
            Some(b) => b,
        };
        let (token, delim) = self.read_token(first, context)?;
        if token.is_empty() {
            return Err(self.error(context, ProtocolErrorKind::MissingArgument));
        }
        Ok((token, delim))
    }

    fn finish_token(
        &self,
        bytes: Vec<u8>,
        delim: u8,
        context: &'static str,
    ) -> io::Result<(String, u8)> {
        match String::from_utf8(bytes) {
            Ok(token) => Ok((token, delim)),
            Err(_) => Err(self.error(context, ProtocolErrorKind::InvalidUtf8)),
        }
    }

    //Reads the remainder of the current line as a single argument (which
    //may contain spaces). `delim` is the delimiter that ended the previous
    //token; if it was already the newline, the argument is missing.
    fn read_line_argument(&mut self, delim: u8, context: &'static str) -> io::Result<String> {
        if delim == b'\n' {
            return Err(self.error(context, ProtocolErrorKind::MissingArgument));
        }
        let line = self.read_to_newline(context)?;
        if line.is_empty() {
            return Err(self.error(context, ProtocolErrorKind::MissingArgument));
        }
        Ok(line)
    }

    fn read_to_newline(&mut self, context: &'static str) -> io::Result<String> {
        let mut bytes = Vec::new();
        loop {
            match self.read_byte()? {
                None => return Err(self.error(context, ProtocolErrorKind::UnexpectedEof)),
                Some(b'\n') => break,
                Some(b) => bytes.push(b),
            }
        }
        let (line, _) = self.finish_token(bytes, b'\n', context)?;
        Ok(line)
    }

    fn read_byte(&mut self) -> io::Result<Option<u8>> {
        let mut buf = [0u8; 1];
        loop {
            match self.inner.read(&mut buf) {
                Ok(0) => return Ok(None),
                Ok(_) => return Ok(Some(buf[0])),
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
    }

    fn error(&self, context: &'static str, kind: ProtocolErrorKind) -> io::Error {
        ProtocolError::new(context, kind).into()
    }
}

////////////////////////////////////////////////////////////////////////////////
// response readers (manager side)

///Reads the size header of a PULL response: a decimal integer (negative for
///errors) terminated by a single space.
///
///The header is consumed byte by byte through the buffered reader, so it
///comes out correctly however the TCP stack split it across segments, and
///any content bytes beyond the space stay in the reader for the caller to
///stream.
pub fn read_pull_size<R: BufRead>(reader: &mut R) -> io::Result<i64> {
    let invalid = || -> io::Error {
        ProtocolError::new("PULL size header", ProtocolErrorKind::InvalidSizeHeader).into()
    };

    let mut digits = Vec::new();
    loop {
        let mut buf = [0u8; 1];
        match reader.read(&mut buf) {
            Ok(0) => {
                return Err(ProtocolError::new(
                    "PULL size header",
                    ProtocolErrorKind::UnexpectedEof,
                )
                .into())
            }
            Ok(_) if buf[0] == b' ' => break,
            Ok(_) => digits.push(buf[0]),
            Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
        //a well-formed header fits comfortably in 20 digits (i64 range);
        //anything longer is a stream that never contained the separator
        if digits.len() > 20 {
            return Err(invalid());
        }
    }

    std::str::from_utf8(&digits)
        .ok()
        .and_then(|s| s.parse::<i64>().ok())
        .ok_or_else(invalid)
}

///Reads a LIST response: filename lines up to (and including) the `.\n`
///sentinel. An immediate sentinel yields an empty listing.
pub fn read_list_response<R: BufRead>(reader: &mut R) -> io::Result<Vec<String>> {
    let mut names = Vec::new();
    loop {
        let mut line = String::new();
        let count = reader.read_line(&mut line)?;
        if count == 0 {
            return Err(
                ProtocolError::new("LIST response", ProtocolErrorKind::UnexpectedEof).into(),
            );
        }
        let name = line.trim_end_matches('\n');
        if name == "." {
            return Ok(names);
        }
        if !name.is_empty() {
            names.push(name.into());
        }
    }
}
