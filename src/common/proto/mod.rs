/*******************************************************************************
* Copyright 2020 Stefan Majewsky <majewsky@gmx.net>
* SPDX-License-Identifier: Apache-2.0
* Refer to the file "LICENSE" for details.
*******************************************************************************/

/*!
The wire protocol spoken between the manager and the clients. All framing is
line-oriented ASCII except for raw payload bytes following a header:

* `LIST <dir>\n` requests a directory listing. The response is one
  `<filename>\n` line per regular file, terminated by the sentinel line
  `.\n`. Filenames never contain `\n` and never start with `.`, so the
  sentinel is unambiguous.
* `PULL <path>\n` requests a file. The success response is the decimal file
  size, one space, then exactly that many content bytes. The error response
  is `-1 <errtext>` with no content.
* `PUSH <path> <n>` writes a file in chunks, keyed by the chunk code `n`:
  `-1` opens/truncates the file, `0` closes it, and a positive `n` announces
  exactly `n` payload bytes that follow the single space after `n`.

Everything here must tolerate TCP short reads: no function assumes that one
`read` yields one message. Requests are consumed token by token off a
buffered stream, and response readers consume until the required byte count
or sentinel is reached.
*/

use std::fmt;

mod format;
pub use format::*;
mod request;
pub use request::*;

#[cfg(test)]
mod tests;

///Buffer size for streaming file content, on both the client and the
///manager side of a transfer.
pub const CHUNK_SIZE: usize = 8192;

////////////////////////////////////////////////////////////////////////////////
// struct ProtocolError

///Enumeration of the kinds of errors that the parsing functions in this
///module can return. See [struct ProtocolError](struct.ProtocolError.html)
///for details.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProtocolErrorKind {
    ///The peer closed the connection in the middle of a frame.
    UnexpectedEof,
    ///A path or filename is not valid UTF-8.
    InvalidUtf8,
    ///A verb is missing its argument.
    MissingArgument,
    ///The first token of a request is not LIST, PULL or PUSH.
    UnknownVerb,
    ///The chunk code of a PUSH frame is not -1, 0 or a positive integer.
    InvalidChunkCode,
    ///A data-bearing PUSH frame is not followed by the single space that
    ///separates the chunk code from the payload.
    MissingPayloadSeparator,
    ///The size header of a PULL response is not a decimal integer followed
    ///by a space.
    InvalidSizeHeader,
}

use self::ProtocolErrorKind::*;

impl ProtocolErrorKind {
    ///Returns a human-readable name for this kind.
    pub fn to_str(&self) -> &'static str {
        match *self {
            UnexpectedEof => "unexpected EOF",
            InvalidUtf8 => "invalid UTF-8",
            MissingArgument => "missing argument",
            UnknownVerb => "unknown verb",
            InvalidChunkCode => "invalid chunk code",
            MissingPayloadSeparator => "missing payload separator",
            InvalidSizeHeader => "invalid size header",
        }
    }
}

impl fmt::Display for ProtocolErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.to_str())
    }
}

///An error type that is returned by the parsing functions in this module.
///
///Conversion into `std::io::Error` (as `ErrorKind::InvalidData`) is
///provided because protocol errors and transport errors are handled
///identically by all callers: the affected connection is abandoned.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProtocolError {
    ///What was being parsed when the error was encountered.
    pub context: &'static str,
    ///The kind of protocol error that was encountered.
    pub kind: ProtocolErrorKind,
}

impl ProtocolError {
    pub fn new(context: &'static str, kind: ProtocolErrorKind) -> ProtocolError {
        ProtocolError { context, kind }
    }
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "protocol error while reading {}: {}", self.context, self.kind)
    }
}

impl std::error::Error for ProtocolError {}

impl From<ProtocolError> for std::io::Error {
    fn from(err: ProtocolError) -> std::io::Error {
        std::io::Error::new(std::io::ErrorKind::InvalidData, err)
    }
}
