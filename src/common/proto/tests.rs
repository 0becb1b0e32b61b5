/*******************************************************************************
* Copyright 2020 Stefan Majewsky <majewsky@gmx.net>
* SPDX-License-Identifier: Apache-2.0
* Refer to the file "LICENSE" for details.
*******************************************************************************/

use std::io::{self, BufReader, Read};

use crate::common::proto::*;

///A reader that yields at most one byte per read() call, to simulate the
///worst-case TCP short-read behavior.
struct OneByteReader<R: Read>(R);

impl<R: Read> Read for OneByteReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        self.0.read(&mut buf[..1])
    }
}

fn reader(input: &[u8]) -> FrameReader<BufReader<OneByteReader<&[u8]>>> {
    //capacity 1 keeps even the BufReader from smoothing over short reads
    FrameReader::new(BufReader::with_capacity(1, OneByteReader(input)))
}

fn expect_protocol_error<T: std::fmt::Debug>(result: io::Result<T>, kind: ProtocolErrorKind) {
    let err = result.unwrap_err();
    assert_eq!(err.kind(), io::ErrorKind::InvalidData, "error = {:?}", err);
    let inner = err
        .get_ref()
        .and_then(|e| e.downcast_ref::<ProtocolError>())
        .unwrap_or_else(|| panic!("not a ProtocolError: {:?}", err));
    assert_eq!(inner.kind, kind);
}

#[test]
fn test_request_parsing() {
    let mut r = reader(b"LIST /some/dir\n");
    assert_eq!(
        r.read_request().unwrap(),
        Some(Request::List {
            dir: "/some/dir".into()
        })
    );
    assert_eq!(r.read_request().unwrap(), None);

    //arguments may contain spaces; the line ends them
    let mut r = reader(b"PULL /dir/with space/file\n");
    assert_eq!(
        r.read_request().unwrap(),
        Some(Request::Pull {
            path: "/dir/with space/file".into()
        })
    );
}

#[test]
fn test_push_session_parsing() {
    //a complete PUSH session: begin, one data chunk, end
    let mut input = Vec::new();
    input.extend_from_slice(b"PUSH /tgt/f -1\n");
    input.extend_from_slice(b"PUSH /tgt/f 5 hello");
    input.extend_from_slice(b"PUSH /tgt/f 0\n");
    let mut r = reader(&input);

    assert_eq!(
        r.read_request().unwrap(),
        Some(Request::Push {
            path: "/tgt/f".into(),
            chunk: ChunkCode::Begin,
        })
    );

    match r.read_request().unwrap() {
        Some(Request::Push {
            path,
            chunk: ChunkCode::Data(len),
        }) => {
            assert_eq!(path, "/tgt/f");
            assert_eq!(len, 5);
            let mut payload = Vec::new();
            r.payload(len).read_to_end(&mut payload).unwrap();
            assert_eq!(payload, b"hello");
        }
        other => panic!("unexpected request: {:?}", other),
    }

    assert_eq!(
        r.read_request().unwrap(),
        Some(Request::Push {
            path: "/tgt/f".into(),
            chunk: ChunkCode::End,
        })
    );
    assert_eq!(r.read_request().unwrap(), None);
}

#[test]
fn test_request_parse_errors() {
    expect_protocol_error(
        reader(b"FROB /x\n").read_request(),
        ProtocolErrorKind::UnknownVerb,
    );
    expect_protocol_error(
        reader(b"LIST\n").read_request(),
        ProtocolErrorKind::MissingArgument,
    );
    expect_protocol_error(
        reader(b"PULL \n").read_request(),
        ProtocolErrorKind::MissingArgument,
    );
    expect_protocol_error(
        reader(b"PUSH /x\n").read_request(),
        ProtocolErrorKind::MissingArgument,
    );
    expect_protocol_error(
        reader(b"PUSH /x nope\n").read_request(),
        ProtocolErrorKind::InvalidChunkCode,
    );
    expect_protocol_error(
        reader(b"PUSH /x -2\n").read_request(),
        ProtocolErrorKind::InvalidChunkCode,
    );
    //a data frame whose header is terminated by a newline has nowhere to
    //carry its payload
    expect_protocol_error(
        reader(b"PUSH /x 5\nhello").read_request(),
        ProtocolErrorKind::MissingPayloadSeparator,
    );
    //EOF in the middle of a frame is an error, EOF at a boundary is not
    expect_protocol_error(
        reader(b"PULL /half/a/fra").read_request(),
        ProtocolErrorKind::UnexpectedEof,
    );
    assert_eq!(reader(b"").read_request().unwrap(), None);
}

#[test]
fn test_pull_size_reading() {
    let mut r = BufReader::with_capacity(1, OneByteReader(&b"1234 content"[..]));
    assert_eq!(read_pull_size(&mut r).unwrap(), 1234);
    //everything after the space must still be in the stream
    let mut rest = String::new();
    r.read_to_string(&mut rest).unwrap();
    assert_eq!(rest, "content");

    let mut r = BufReader::new(&b"-1 No such file or directory"[..]);
    assert_eq!(read_pull_size(&mut r).unwrap(), -1);

    expect_protocol_error(
        read_pull_size(&mut BufReader::new(&b"12x34 "[..])),
        ProtocolErrorKind::InvalidSizeHeader,
    );
    expect_protocol_error(
        read_pull_size(&mut BufReader::new(&b"123"[..])),
        ProtocolErrorKind::UnexpectedEof,
    );
    expect_protocol_error(
        read_pull_size(&mut BufReader::new(&b"999999999999999999999999999 "[..])),
        ProtocolErrorKind::InvalidSizeHeader,
    );
}

#[test]
fn test_list_response_reading() {
    let mut r = BufReader::with_capacity(1, OneByteReader(&b"alpha\nbeta\ngamma\n.\n"[..]));
    assert_eq!(
        read_list_response(&mut r).unwrap(),
        vec!["alpha".to_string(), "beta".into(), "gamma".into()]
    );

    //an empty listing is just the sentinel
    let mut r = BufReader::new(&b".\n"[..]);
    assert_eq!(read_list_response(&mut r).unwrap(), Vec::<String>::new());

    //EOF before the sentinel invalidates the whole listing
    expect_protocol_error(
        read_list_response(&mut BufReader::new(&b"alpha\nbeta\n"[..])),
        ProtocolErrorKind::UnexpectedEof,
    );
}

#[test]
fn test_frame_writing() {
    let mut buf = Vec::new();
    write_list_request(&mut buf, "/src").unwrap();
    assert_eq!(buf, b"LIST /src\n");

    let mut buf = Vec::new();
    write_pull_request(&mut buf, "/src/file").unwrap();
    assert_eq!(buf, b"PULL /src/file\n");

    let mut buf = Vec::new();
    write_push_begin(&mut buf, "/tgt/file").unwrap();
    write_push_chunk(&mut buf, "/tgt/file", b"abc").unwrap();
    write_push_end(&mut buf, "/tgt/file").unwrap();
    assert_eq!(
        buf,
        b"PUSH /tgt/file -1\nPUSH /tgt/file 3 abcPUSH /tgt/file 0\n" as &[u8]
    );

    let mut buf = Vec::new();
    write_list_entry(&mut buf, "file1").unwrap();
    write_list_end(&mut buf).unwrap();
    assert_eq!(buf, b"file1\n.\n");

    let mut buf = Vec::new();
    write_pull_size(&mut buf, 42).unwrap();
    assert_eq!(buf, b"42 ");

    let mut buf = Vec::new();
    write_pull_error(&mut buf, "No such file").unwrap();
    assert_eq!(buf, b"-1 No such file");
}

#[test]
fn test_writer_reader_round_trip() {
    //frames produced by the writer side must parse on the reader side
    let mut buf = Vec::new();
    write_push_begin(&mut buf, "/t/a").unwrap();
    write_push_chunk(&mut buf, "/t/a", b"payload bytes").unwrap();
    write_push_end(&mut buf, "/t/a").unwrap();

    let mut r = reader(&buf);
    assert!(matches!(
        r.read_request().unwrap(),
        Some(Request::Push {
            chunk: ChunkCode::Begin,
            ..
        })
    ));
    match r.read_request().unwrap() {
        Some(Request::Push {
            chunk: ChunkCode::Data(len),
            ..
        }) => {
            let mut payload = Vec::new();
            r.payload(len).read_to_end(&mut payload).unwrap();
            assert_eq!(payload, b"payload bytes");
        }
        other => panic!("unexpected request: {:?}", other),
    }
    assert!(matches!(
        r.read_request().unwrap(),
        Some(Request::Push {
            chunk: ChunkCode::End,
            ..
        })
    ));
}
