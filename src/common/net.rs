/*******************************************************************************
* Copyright 2020 Stefan Majewsky <majewsky@gmx.net>
* SPDX-License-Identifier: Apache-2.0
* Refer to the file "LICENSE" for details.
*******************************************************************************/

use std::io;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::time::Duration;

use crate::common::Endpoint;

///How long accept loops sleep between polls of the shutdown flag.
const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(250);

///Connects to the given endpoint.
pub fn dial(endpoint: &Endpoint) -> io::Result<TcpStream> {
    TcpStream::connect((endpoint.host.as_str(), endpoint.port))
}

///Binds a listening socket on all interfaces.
pub fn listen(port: u16) -> io::Result<TcpListener> {
    TcpListener::bind(("0.0.0.0", port))
}

///Checks whether an IO error is a read timeout rather than a real failure.
///Timed-out reads surface as WouldBlock or TimedOut depending on platform.
pub fn is_timeout(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
    )
}

////////////////////////////////////////////////////////////////////////////////
// struct PollingListener

///A TCP listener whose accept loop periodically observes a shutdown flag.
///
///Blocking `accept()` would only return when a connection arrives, so a
///server waiting in it could never notice a shutdown request. This wrapper
///puts the listener into non-blocking mode and alternates between accept
///attempts and short sleeps, checking the flag on every round.
pub struct PollingListener {
    inner: TcpListener,
}

impl PollingListener {
    pub fn new(inner: TcpListener) -> io::Result<PollingListener> {
        inner.set_nonblocking(true)?;
        Ok(PollingListener { inner })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.inner.local_addr()
    }

    ///Waits for the next connection. Returns `Ok(None)` once `should_stop`
    ///reports true, without accepting further connections.
    ///
    ///Accepted streams are switched back to blocking mode before they are
    ///handed out; read timeouts are the caller's concern.
    pub fn accept<F: Fn() -> bool>(
        &self,
        should_stop: F,
    ) -> io::Result<Option<(TcpStream, SocketAddr)>> {
        loop {
            if should_stop() {
                return Ok(None);
            }
            match self.inner.accept() {
                Ok((stream, addr)) => {
                    stream.set_nonblocking(false)?;
                    return Ok(Some((stream, addr)));
                }
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => {
                    std::thread::sleep(ACCEPT_POLL_INTERVAL);
                }
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
    }
}
