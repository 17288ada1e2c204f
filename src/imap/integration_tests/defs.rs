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

use std::collections::BTreeMap;
use std::fs;
use std::io::{self, BufRead, Read, Write};
use std::os::unix::net::UnixStream;
use std::path::PathBuf;
use std::sync::Arc;

use lazy_static::lazy_static;
use regex::bytes::Regex;
use tempfile::TempDir;

use crate::account::credentials::{hash_password, Credentials};
use crate::imap::command_processor::CommandProcessor;
use crate::imap::server::Server;
use crate::support::error::Error;
use crate::support::log_prefix::LogPrefix;
use crate::support::system_config::SystemConfig;

pub const SANTA: &str = "santa@polonorte.com";
pub const SANTA_PASSWORD: &str = "hohoho";
pub const ELF: &str = "elf@polonorte.com";
pub const ELF_PASSWORD: &str = "cookies";
pub const NO_DOMAIN: &str = "rudolph";

lazy_static! {
    static ref ELF_HASH: String = hash_password(ELF_PASSWORD).unwrap();
    static ref LITERAL_AT_EOL: Regex = Regex::new(r"\{([0-9]+)\}\r\n$").unwrap();
}

pub struct Setup {
    root: TempDir,
}

pub fn set_up() -> Setup {
    crate::init_test_log();
    Setup {
        root: TempDir::new().unwrap(),
    }
}

impl Setup {
    /// The directory holding the messages of `user`.
    pub fn user_dir(&self, user: &str) -> PathBuf {
        let mut parts = user.split('@');
        let local = parts.next().unwrap();
        let domain = parts.next().unwrap();
        self.root.path().join(domain).join(local)
    }

    /// Store a message file for `user`, creating the directory as needed.
    pub fn deliver(&self, user: &str, file_name: &str, content: &[u8]) {
        let dir = self.user_dir(user);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(file_name), content).unwrap();
    }

    /// The sorted names of the files in `user`'s directory.
    pub fn files(&self, user: &str) -> Vec<String> {
        let mut files: Vec<String> = fs::read_dir(self.user_dir(user))
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        files.sort();
        files
    }

    pub fn connect(&self, name: &'static str) -> TestClient {
        let (server_io, client_io) = UnixStream::pair().unwrap();

        let mut system_config = SystemConfig::default();
        system_config.storage.mail_root = self.root.path().to_owned();

        let mut users = BTreeMap::new();
        users.insert(SANTA.to_owned(), SANTA_PASSWORD.to_owned());
        users.insert(ELF.to_owned(), ELF_HASH.clone());
        users.insert(NO_DOMAIN.to_owned(), "red nose".to_owned());

        std::thread::spawn(move || {
            let processor = CommandProcessor::new(
                LogPrefix::new(name.to_owned()),
                Arc::new(system_config),
                Arc::new(Credentials::new(users)),
            );
            let server_out = server_io.try_clone().unwrap();
            let mut server = Server::new(
                io::BufReader::new(server_io),
                io::BufWriter::new(server_out),
                processor,
            );

            match server.run() {
                Ok(()) => (),
                Err(Error::Io(e))
                    if io::ErrorKind::UnexpectedEof == e.kind()
                        || io::ErrorKind::BrokenPipe == e.kind()
                        || io::ErrorKind::ConnectionReset == e.kind() =>
                {
                    ()
                }
                Err(e) => panic!("Unexpected server error: {}", e),
            }
        });

        TestClient {
            write: client_io.try_clone().unwrap(),
            read: io::BufReader::new(client_io),
        }
    }
}

/// A client which speaks raw protocol text.
pub struct TestClient {
    read: io::BufReader<UnixStream>,
    write: UnixStream,
}

impl TestClient {
    pub fn write_raw(&mut self, data: &[u8]) {
        self.write.write_all(data).unwrap();
    }

    /// Send `line` followed by CRLF.
    pub fn send(&mut self, line: &str) {
        self.write_raw(line.as_bytes());
        self.write_raw(b"\r\n");
    }

    /// Read one full response, including the content of any literals and
    /// the final line ending.
    ///
    /// Returns an empty buffer at EOF.
    pub fn read_response(&mut self) -> Vec<u8> {
        let mut buf = Vec::new();
        loop {
            if 0 == self.read.read_until(b'\n', &mut buf).unwrap() {
                return buf;
            }

            let literal_len = LITERAL_AT_EOL
                .captures(&buf)
                .and_then(|c| c.get(1))
                .map(|m| {
                    String::from_utf8_lossy(m.as_bytes()).parse::<u64>().unwrap()
                });
            match literal_len {
                Some(len) => {
                    let nread = (&mut self.read)
                        .take(len)
                        .read_to_end(&mut buf)
                        .unwrap();
                    assert_eq!(len as usize, nread, "EOF inside literal");
                }
                None => return buf,
            }
        }
    }

    /// Send `line`, whose first word is the tag, and read responses up to
    /// and including the tagged completion.
    ///
    /// The responses are returned as (lossy) strings with their line endings
    /// intact.
    pub fn command(&mut self, line: &str) -> Vec<String> {
        let tag = format!("{} ", line.split(' ').next().unwrap());
        self.send(line);

        let mut responses = Vec::new();
        loop {
            let response = self.read_response();
            assert!(!response.is_empty(), "EOF before completion of {}", line);
            let response = String::from_utf8_lossy(&response).into_owned();
            let done = response.starts_with(&tag);
            responses.push(response);
            if done {
                return responses;
            }
        }
    }

    /// Like `command()`, but returns the raw bytes of each response.
    pub fn command_bytes(&mut self, line: &str) -> Vec<Vec<u8>> {
        let tag = format!("{} ", line.split(' ').next().unwrap());
        self.send(line);

        let mut responses = Vec::new();
        loop {
            let response = self.read_response();
            assert!(!response.is_empty(), "EOF before completion of {}", line);
            let done = response.starts_with(tag.as_bytes());
            responses.push(response);
            if done {
                return responses;
            }
        }
    }
}

pub fn receive_line_like(client: &mut TestClient, pat: &str) {
    let buf = client.read_response();
    assert!(
        Regex::new(pat).unwrap().is_match(&buf),
        "Expected\n\
         match: {:?}\n\
         Got:   {:?}\n",
        pat,
        String::from_utf8_lossy(&buf)
    );
}

pub fn skip_greeting(client: &mut TestClient) {
    receive_line_like(client, r"^\* OK ");
}

pub fn quick_log_in(client: &mut TestClient) {
    skip_greeting(client);
    let responses =
        client.command(&format!("login LOGIN {} {}", SANTA, SANTA_PASSWORD));
    assert_eq!(1, responses.len());
    assert_tagged_ok(&responses[0]);
}

pub fn quick_select(client: &mut TestClient) {
    let responses = client.command("select SELECT INBOX");
    assert_tagged_ok(responses.last().unwrap());
}

fn assert_tagged(cond: &str, response: &str) {
    let pat = format!(r"^[^* ]+ {} ", cond);
    assert!(
        Regex::new(&pat).unwrap().is_match(response.as_bytes()),
        "Expected tagged {}, got {:?}",
        cond,
        response
    );
}

pub fn assert_tagged_ok(response: &str) {
    assert_tagged("OK", response);
}

pub fn assert_tagged_no(response: &str) {
    assert_tagged("NO", response);
}

pub fn assert_tagged_bad(response: &str) {
    assert_tagged("BAD", response);
}

/// A simple message with the given subject and body.
pub fn simple_message(subject: &str, body: &str) -> Vec<u8> {
    format!(
        "From: Santa Claus <santa@polonorte.com>\r\n\
         To: elf@polonorte.com\r\n\
         Subject: {}\r\n\
         Date: Thu, 24 Dec 2020 23:59:00 +0000\r\n\
         \r\n\
         {}\r\n",
        subject, body
    )
    .into_bytes()
}
