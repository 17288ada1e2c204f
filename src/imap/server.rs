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

use std::borrow::Cow;
use std::io::{self, BufRead, Read, Write};
use std::sync::{Arc, Mutex};

use log::warn;

use super::command_processor::CommandProcessor;
use super::lex::LexWriter;
use super::response as r;
use super::syntax as s;
use crate::support::error::Error;

const MAX_CMDLINE: usize = 65536;

/// The connection loop of one session.
pub struct Server {
    read: Box<dyn BufRead + Send>,
    write: Arc<Mutex<Box<dyn Write + Send>>>,
    processor: CommandProcessor,
}

impl Server {
    pub fn new<R: BufRead + Send + 'static, W: Write + Send + 'static>(
        read: R,
        write: W,
        processor: CommandProcessor,
    ) -> Self {
        Server {
            read: Box::new(read),
            write: Arc::new(Mutex::new(Box::new(write))),
            processor,
        }
    }

    /// Run the server.
    ///
    /// Blocks until the client logs out or disconnects, or an error occurs.
    /// A disconnect between commands is a normal exit.
    pub fn run(&mut self) -> Result<(), Error> {
        self.send_response(self.processor.greet())?;

        let mut cmdline = Vec::<u8>::new();
        while !self.processor.logged_out() {
            cmdline.clear();
            match self.buffer_next_line(&mut cmdline)? {
                LineRead::Line => (),
                LineRead::TooLong => continue,
                LineRead::Eof => break,
            }

            let line = String::from_utf8_lossy(&cmdline);
            let command_line = match s::CommandLine::parse(&line) {
                Some(command_line) => command_line,
                None => continue,
            };

            let response = self.processor.handle_command(
                command_line,
                &response_sender(&self.write),
            );
            self.send_response(response)?;
        }

        Ok(())
    }

    /// Read the next line into `cmdline`, which must be empty.
    ///
    /// Both DOS newlines and bare LF are accepted. The line ending is
    /// removed from the buffer.
    ///
    /// A line longer than `MAX_CMDLINE` is discarded after sending an
    /// untagged `BAD`. EOF before any data is a clean end of the session;
    /// EOF in the middle of a line is an error.
    fn buffer_next_line(
        &mut self,
        cmdline: &mut Vec<u8>,
    ) -> Result<LineRead, Error> {
        let nread = self
            .read
            .by_ref()
            .take(MAX_CMDLINE as u64)
            .read_until(b'\n', cmdline)?;

        if 0 == nread {
            return Ok(LineRead::Eof);
        }

        if !cmdline.ends_with(b"\n") {
            if nread < MAX_CMDLINE {
                return Err(Error::Io(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "EOF reached before reading full line",
                )));
            }

            self.command_line_too_long()?;
            return Ok(LineRead::TooLong);
        }

        // Drop ending LF, and CR if there is one
        cmdline.pop();
        if cmdline.ends_with(b"\r") {
            cmdline.pop();
        }

        Ok(LineRead::Line)
    }

    /// Reject an overlong command line and skip the rest of it.
    fn command_line_too_long(&mut self) -> Result<(), Error> {
        warn!(
            "{} Discarding overlong command line",
            self.processor.log_prefix()
        );
        self.send_response(r::ResponseLine {
            tag: None,
            response: r::Response::Cond(r::CondResponse {
                cond: r::RespCondType::Bad,
                code: None,
                quip: Some(Cow::Borrowed("Command line too long")),
            }),
        })?;

        let mut discard = Vec::new();
        loop {
            discard.clear();
            let nread = self
                .read
                .by_ref()
                .take(MAX_CMDLINE as u64)
                .read_until(b'\n', &mut discard)?;
            if 0 == nread || discard.ends_with(b"\n") {
                return Ok(());
            }
        }
    }

    fn send_response(&mut self, r: r::ResponseLine<'_>) -> Result<(), Error> {
        let mut w = self.write.lock().unwrap();
        {
            let mut w = LexWriter::new(&mut *w);
            r.write_to(&mut w)?;
            w.verbatim_bytes(b"\r\n")?;
        }
        w.flush()?;
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum LineRead {
    Line,
    TooLong,
    Eof,
}

fn response_sender<'a>(
    w: &'a Arc<Mutex<Box<dyn Write + Send>>>,
) -> impl Fn(r::Response<'_>) + Send + Sync + 'a {
    move |response| {
        let mut w = w.lock().unwrap();
        let mut w = LexWriter::new(&mut *w);
        let _ = r::ResponseLine {
            tag: None,
            response,
        }
        .write_to(&mut w);
        let _ = w.verbatim_bytes(b"\r\n");
    }
}
