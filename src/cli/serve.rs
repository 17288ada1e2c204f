//-
// Copyright (c) 2020, Jason Lingle
//
// This file is part of Inboxd.
//
// Inboxd is free software: you can  redistribute it and/or modify it under the
// terms of  the GNU General Public  License as published by  the Free Software
// Foundation, either version  3 of the License, or (at  your option) any later
// version.
//
// Inboxd is distributed  in the hope that  it will be useful,  but WITHOUT ANY
// WARRANTY; without  even the implied  warranty of MERCHANTABILITY  or FITNESS
// FOR  A PARTICULAR  PURPOSE.  See the  GNU General  Public  License for  more
// details.
//
// You should have received a copy of the GNU General Public License along with
// Inboxd. If not, see <http://www.gnu.org/licenses/>.

use std::io;
use std::net::{TcpListener, TcpStream};
use std::os::unix::io::AsRawFd;
use std::sync::Arc;

use log::{error, info, warn};
use nix::sys::time::TimeValLike;

use crate::account::credentials::Credentials;
use crate::imap::command_processor::CommandProcessor;
use crate::imap::server::Server;
use crate::support::log_prefix::LogPrefix;
use crate::support::system_config::SystemConfig;

// Errors go to the log rather than stderr, which nobody may be reading
macro_rules! fatal {
    ($ex:ident, $($stuff:tt)*) => {{
        error!($($stuff)*);
        crate::support::sysexits::$ex.exit()
    }}
}

/// Listen on `server.listen` and run one session per connection, each on
/// its own thread. Never returns.
pub fn serve(system_config: SystemConfig) -> ! {
    let credentials = Arc::new(Credentials::new(system_config.users.clone()));
    let system_config = Arc::new(system_config);

    if credentials.is_empty() {
        warn!("No users are configured; nobody will be able to log in");
    }

    let listener = match TcpListener::bind(&system_config.server.listen) {
        Ok(listener) => listener,
        Err(e) => fatal!(
            EX_OSERR,
            "Failed to listen on {}: {}",
            system_config.server.listen,
            e
        ),
    };

    info!(
        "{} serving {} on {}",
        system_config.server.host_name,
        system_config.storage.mail_root.display(),
        system_config.server.listen
    );

    loop {
        let (stream, origin) = match listener.accept() {
            Ok(accepted) => accepted,
            Err(e) => {
                // Usually transient, e.g. the peer vanished before we got
                // to it or we are out of file descriptors for a moment.
                warn!("Failed to accept connection: {}", e);
                continue;
            }
        };

        let log_prefix = LogPrefix::new(origin.to_string());
        let processor = CommandProcessor::new(
            log_prefix.clone(),
            Arc::clone(&system_config),
            Arc::clone(&credentials),
        );

        let spawned = std::thread::Builder::new()
            .name(format!("session-{}", origin))
            .spawn(move || {
                if let Err(e) = run_session(stream, processor) {
                    warn!("{} Abnormal client disconnect: {}", log_prefix, e);
                }
            });

        if let Err(e) = spawned {
            error!("{} Failed to start session thread: {}", origin, e);
        }
    }
}

fn run_session(
    stream: TcpStream,
    processor: CommandProcessor,
) -> Result<(), crate::support::error::Error> {
    let log_prefix = processor.log_prefix().clone();
    configure_socket(&log_prefix, &stream);
    info!("{} Connection established", log_prefix);

    let stream_out = stream.try_clone()?;
    let mut server = Server::new(
        io::BufReader::new(stream),
        io::BufWriter::new(stream_out),
        processor,
    );

    server.run()?;
    info!("{} Normal client disconnect", log_prefix);
    Ok(())
}

fn configure_socket(log_prefix: &LogPrefix, stream: &TcpStream) {
    let fd = stream.as_raw_fd();
    if let Err(e) = nix::sys::socket::setsockopt(
        fd,
        nix::sys::socket::sockopt::ReceiveTimeout,
        &nix::sys::time::TimeVal::minutes(30),
    )
    .and_then(|_| {
        nix::sys::socket::setsockopt(
            fd,
            nix::sys::socket::sockopt::SendTimeout,
            &nix::sys::time::TimeVal::minutes(30),
        )
    }) {
        warn!("{} Unable to configure timeouts: {}", log_prefix, e);
    }

    if let Err(e) = stream.set_nodelay(true) {
        warn!("{} Unable to set TCP_NODELAY: {}", log_prefix, e);
    }
}
