/*******************************************************************************
* Copyright 2020 Stefan Majewsky <majewsky@gmx.net>
* SPDX-License-Identifier: Apache-2.0
* Refer to the file "LICENSE" for details.
*******************************************************************************/

use std::fmt;
use std::str::FromStr;

////////////////////////////////////////////////////////////////////////////////
// struct SpecParseError

///Enumeration of the kinds of errors that [`DirSpec::from_str()`](struct.DirSpec.html)
///can return. See [struct SpecParseError](struct.SpecParseError.html) for details.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SpecParseErrorKind {
    ///The specifier does not contain an `@` separating directory and host.
    MissingAtSign,
    ///The part after the `@` does not contain a `:` separating host and port.
    MissingPortSeparator,
    ///The part after the `:` is not a valid nonzero port number.
    InvalidPort,
    ///The part before the `@` is empty.
    EmptyDirectory,
    ///The part between the `@` and the `:` is empty.
    EmptyHost,
}

use self::SpecParseErrorKind::*;

impl SpecParseErrorKind {
    ///Returns a human-readable name for this kind.
    pub fn to_str(&self) -> &'static str {
        match *self {
            MissingAtSign => "missing \"@\" between directory and host",
            MissingPortSeparator => "missing \":\" between host and port",
            InvalidPort => "invalid port number",
            EmptyDirectory => "empty directory path",
            EmptyHost => "empty host",
        }
    }
}

impl fmt::Display for SpecParseErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.to_str())
    }
}

///An error type that is returned by [`DirSpec::from_str()`](struct.DirSpec.html).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SpecParseError {
    ///The original specifier that was given as input to the parser.
    pub input: String,
    ///The kind of parse error that was encountered.
    pub kind: SpecParseErrorKind,
}

impl fmt::Display for SpecParseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "invalid directory specifier {:?}: {}", self.input, self.kind)
    }
}

impl std::error::Error for SpecParseError {}

////////////////////////////////////////////////////////////////////////////////
// struct Endpoint

///A network endpoint: an IPv4 host literal and a TCP port.
///
///The implementation of Display renders the `host:port` form used for
///dialing and inside log lines.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

////////////////////////////////////////////////////////////////////////////////
// struct DirSpec

///A directory specifier: a directory path served by a specific client
///endpoint, written as `<dirpath>@<host>:<port>`.
///
///Parsing locates the **last** `@` in the input (directory paths may contain
///`@` themselves) and then the first `:` after it.
///
///```
///# use dirsync::common::DirSpec;
///let spec: DirSpec = "/data/in@127.0.0.1:9001".parse().unwrap();
///assert_eq!(spec.dir, "/data/in");
///assert_eq!(spec.endpoint.host, "127.0.0.1");
///assert_eq!(spec.endpoint.port, 9001);
///assert_eq!(spec.to_string(), "/data/in@127.0.0.1:9001");
///```
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct DirSpec {
    pub dir: String,
    pub endpoint: Endpoint,
}

impl fmt::Display for DirSpec {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}@{}", self.dir, self.endpoint)
    }
}

impl FromStr for DirSpec {
    type Err = SpecParseError;

    fn from_str(input: &str) -> Result<DirSpec, SpecParseError> {
        let error = |kind| {
            Err(SpecParseError {
                input: input.into(),
                kind,
            })
        };

        let at_pos = match input.rfind('@') {
            Some(pos) => pos,
            None => return error(MissingAtSign),
        };
        let dir = &input[..at_pos];
        if dir.is_empty() {
            return error(EmptyDirectory);
        }

        let host_port = &input[at_pos + 1..];
        let colon_pos = match host_port.find(':') {
            Some(pos) => pos,
            None => return error(MissingPortSeparator),
        };
        let host = &host_port[..colon_pos];
        if host.is_empty() {
            return error(EmptyHost);
        }

        let port = match host_port[colon_pos + 1..].parse::<u16>() {
            Ok(0) | Err(_) => return error(InvalidPort),
            Ok(port) => port,
        };

        Ok(DirSpec {
            dir: dir.into(),
            endpoint: Endpoint {
                host: host.into(),
                port,
            },
        })
    }
}
