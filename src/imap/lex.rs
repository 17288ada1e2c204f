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

//! Utilities for *writing* values under IMAP's lexical rules.
//!
//! Strings taken from messages (envelope fields, mailbox names) are always
//! sent as quoted strings, with `\` and `"` escaped and line breaks folded
//! into spaces. Message content is always sent as a literal.

use std::io::{self, Write};

use chrono::prelude::*;

use crate::account::model::Flag;

#[derive(Debug)]
pub struct LexWriter<W> {
    writer: W,
}

impl<W: Write> LexWriter<W> {
    pub fn new(writer: W) -> Self {
        LexWriter { writer }
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.writer
    }

    pub fn verbatim(&mut self, s: &str) -> io::Result<()> {
        self.writer.write_all(s.as_bytes())
    }

    pub fn verbatim_bytes(&mut self, s: &[u8]) -> io::Result<()> {
        self.writer.write_all(s)
    }

    pub fn nil(&mut self) -> io::Result<()> {
        self.verbatim("NIL")
    }

    pub fn quoted(&mut self, s: &str) -> io::Result<()> {
        self.writer.write_all(b"\"")?;
        for ch in s.chars() {
            match ch {
                '\\' | '"' => write!(self.writer, "\\{}", ch)?,
                '\r' | '\n' => self.writer.write_all(b" ")?,
                ch => write!(self.writer, "{}", ch)?,
            }
        }
        self.writer.write_all(b"\"")
    }

    pub fn nstring(&mut self, s: &Option<impl AsRef<str>>) -> io::Result<()> {
        match s.as_ref() {
            None => self.nil(),
            Some(s) => self.quoted(s.as_ref()),
        }
    }

    /// Write `data` as a synchronising literal: `{len}` followed by a line
    /// break and exactly `data.len()` bytes.
    pub fn literal(&mut self, data: &[u8]) -> io::Result<()> {
        write!(self.writer, "{{{}}}\r\n", data.len())?;
        self.writer.write_all(data)
    }

    pub fn flag(&mut self, flag: &Flag) -> io::Result<()> {
        write!(self.writer, "{}", flag)
    }

    pub fn flags(&mut self, flags: &[Flag]) -> io::Result<()> {
        self.verbatim("(")?;
        for (ix, flag) in flags.iter().enumerate() {
            if ix > 0 {
                self.verbatim(" ")?;
            }
            self.flag(flag)?;
        }
        self.verbatim(")")
    }

    pub fn datetime(
        &mut self,
        datetime: &DateTime<FixedOffset>,
    ) -> io::Result<()> {
        write!(
            self.writer,
            "\"{}\"",
            datetime.format("%d-%b-%Y %H:%M:%S %z")
        )
    }

    pub fn num_u32(&mut self, value: u32) -> io::Result<()> {
        write!(self.writer, "{}", value)
    }

    pub fn num_usize(&mut self, value: usize) -> io::Result<()> {
        write!(self.writer, "{}", value)
    }
}
