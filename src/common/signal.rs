/*******************************************************************************
* Copyright 2020 Stefan Majewsky <majewsky@gmx.net>
* SPDX-License-Identifier: Apache-2.0
* Refer to the file "LICENSE" for details.
*******************************************************************************/

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};

//The handler may only perform async-signal-safe work, so the entire
//shutdown protocol is: store into this flag, return. Everything else
//(stopping accept loops, draining the worker pool) happens on regular
//threads that poll received() between blocking calls.
static RECEIVED: AtomicBool = AtomicBool::new(false);

extern "C" fn handle_signal(_signal: libc::c_int) {
    RECEIVED.store(true, Ordering::SeqCst);
}

///Installs the termination handler for SIGINT and SIGTERM.
pub fn install() -> io::Result<()> {
    unsafe {
        let mut action: libc::sigaction = std::mem::zeroed();
        action.sa_sigaction = handle_signal as extern "C" fn(libc::c_int) as usize;
        libc::sigemptyset(&mut action.sa_mask);
        for &signal in &[libc::SIGINT, libc::SIGTERM] {
            if libc::sigaction(signal, &action, std::ptr::null_mut()) != 0 {
                return Err(io::Error::last_os_error());
            }
        }
    }
    Ok(())
}

///Reports whether a termination signal has been received since startup.
pub fn received() -> bool {
    RECEIVED.load(Ordering::SeqCst)
}
