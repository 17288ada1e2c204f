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

//! The responses this server can send, and how they are written.

use std::borrow::Cow;
use std::io::{self, Write};

use chrono::prelude::*;

use super::lex::LexWriter;
use crate::account::model::{Flag, Seqnum};
use crate::mime::envelope::{Envelope, EnvelopeAddress};

/// The fixed capability list.
pub const CAPABILITIES: &[&str] = &["IMAP4rev1", "AUTH=PLAIN"];

/// The name of the only mailbox.
pub const INBOX: &str = "INBOX";

/// A full response line, optionally tagged.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResponseLine<'a> {
    /// The tag, or `None` for an untagged (`*`) response.
    pub tag: Option<Cow<'a, str>>,
    pub response: Response<'a>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Response<'a> {
    Cond(CondResponse<'a>),
    Capability,
    Flags(Cow<'a, [Flag]>),
    Exists(u32),
    List(MailboxList<'a>),
    Lsub(MailboxList<'a>),
    Status(StatusResponse<'a>),
    Search(Vec<u32>),
    Fetch(FetchResponse<'a>),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RespCondType {
    Ok,
    No,
    Bad,
    Bye,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RespTextCode {
    ReadWrite,
    UidValidity(u32),
    UidNext(u32),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CondResponse<'a> {
    pub cond: RespCondType,
    pub code: Option<RespTextCode>,
    pub quip: Option<Cow<'a, str>>,
}

/// The payload of `LIST` and `LSUB` responses.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MailboxList<'a> {
    pub flags: Vec<&'static str>,
    pub delimiter: char,
    pub name: Cow<'a, str>,
}

impl MailboxList<'static> {
    /// The listing of the inbox.
    pub fn inbox() -> Self {
        MailboxList {
            flags: vec!["\\HasNoChildren"],
            delimiter: '/',
            name: Cow::Borrowed(INBOX),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StatusResponse<'a> {
    pub mailbox: Cow<'a, str>,
    pub messages: u32,
    pub uid_next: u32,
    pub unseen: u32,
    pub recent: u32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FetchResponse<'a> {
    pub seqnum: Seqnum,
    pub atts: Vec<MsgAtt<'a>>,
}

/// A single item within a `FETCH` response.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MsgAtt<'a> {
    Uid(u32),
    Rfc822Size(usize),
    Flags(Vec<Flag>),
    InternalDate(DateTime<FixedOffset>),
    Envelope(Box<Envelope>),
    /// Any item whose value is sent as a literal, such as `RFC822` or
    /// `BODY[HEADER]`.
    Literal {
        name: Cow<'a, str>,
        data: Cow<'a, [u8]>,
    },
}

impl<'a> ResponseLine<'a> {
    pub fn write_to(&self, w: &mut LexWriter<impl Write>) -> io::Result<()> {
        match self.tag {
            Some(ref tag) => w.verbatim(tag)?,
            None => w.verbatim("*")?,
        }
        w.verbatim(" ")?;
        self.response.write_to(w)
    }
}

impl<'a> Response<'a> {
    pub fn write_to(&self, w: &mut LexWriter<impl Write>) -> io::Result<()> {
        match *self {
            Response::Cond(ref cr) => cr.write_to(w),
            Response::Capability => {
                w.verbatim("CAPABILITY")?;
                for cap in CAPABILITIES {
                    w.verbatim(" ")?;
                    w.verbatim(cap)?;
                }
                Ok(())
            }
            Response::Flags(ref flags) => {
                w.verbatim("FLAGS ")?;
                w.flags(flags)
            }
            Response::Exists(n) => {
                w.num_u32(n)?;
                w.verbatim(" EXISTS")
            }
            Response::List(ref ml) => {
                w.verbatim("LIST ")?;
                ml.write_to(w)
            }
            Response::Lsub(ref ml) => {
                w.verbatim("LSUB ")?;
                ml.write_to(w)
            }
            Response::Status(ref sr) => sr.write_to(w),
            Response::Search(ref hits) => {
                w.verbatim("SEARCH")?;
                for hit in hits {
                    w.verbatim(" ")?;
                    w.num_u32(*hit)?;
                }
                Ok(())
            }
            Response::Fetch(ref fr) => fr.write_to(w),
        }
    }
}

impl<'a> CondResponse<'a> {
    fn write_to(&self, w: &mut LexWriter<impl Write>) -> io::Result<()> {
        w.verbatim(match self.cond {
            RespCondType::Ok => "OK",
            RespCondType::No => "NO",
            RespCondType::Bad => "BAD",
            RespCondType::Bye => "BYE",
        })?;

        if let Some(code) = self.code {
            w.verbatim(" [")?;
            match code {
                RespTextCode::ReadWrite => w.verbatim("READ-WRITE")?,
                RespTextCode::UidValidity(v) => {
                    w.verbatim("UIDVALIDITY ")?;
                    w.num_u32(v)?;
                }
                RespTextCode::UidNext(v) => {
                    w.verbatim("UIDNEXT ")?;
                    w.num_u32(v)?;
                }
            }
            w.verbatim("]")?;
        }

        if let Some(ref quip) = self.quip {
            w.verbatim(" ")?;
            // Free text must stay on one line
            w.verbatim(&quip.replace(|c: char| '\r' == c || '\n' == c, " "))?;
        }

        Ok(())
    }
}

impl<'a> MailboxList<'a> {
    fn write_to(&self, w: &mut LexWriter<impl Write>) -> io::Result<()> {
        w.verbatim("(")?;
        w.verbatim(&self.flags.join(" "))?;
        w.verbatim(") ")?;
        w.quoted(&self.delimiter.to_string())?;
        w.verbatim(" ")?;
        w.quoted(&self.name)
    }
}

impl<'a> StatusResponse<'a> {
    fn write_to(&self, w: &mut LexWriter<impl Write>) -> io::Result<()> {
        w.verbatim("STATUS ")?;
        w.quoted(&self.mailbox)?;
        w.verbatim(" (MESSAGES ")?;
        w.num_u32(self.messages)?;
        w.verbatim(" UIDNEXT ")?;
        w.num_u32(self.uid_next)?;
        w.verbatim(" UNSEEN ")?;
        w.num_u32(self.unseen)?;
        w.verbatim(" RECENT ")?;
        w.num_u32(self.recent)?;
        w.verbatim(")")
    }
}

impl<'a> FetchResponse<'a> {
    fn write_to(&self, w: &mut LexWriter<impl Write>) -> io::Result<()> {
        w.num_u32(self.seqnum.get())?;
        w.verbatim(" FETCH (")?;
        for (ix, att) in self.atts.iter().enumerate() {
            if ix > 0 {
                w.verbatim(" ")?;
            }
            att.write_to(w)?;
        }
        w.verbatim(")")
    }
}

impl<'a> MsgAtt<'a> {
    fn write_to(&self, w: &mut LexWriter<impl Write>) -> io::Result<()> {
        match *self {
            MsgAtt::Uid(uid) => {
                w.verbatim("UID ")?;
                w.num_u32(uid)
            }
            MsgAtt::Rfc822Size(size) => {
                w.verbatim("RFC822.SIZE ")?;
                w.num_usize(size)
            }
            MsgAtt::Flags(ref flags) => {
                w.verbatim("FLAGS ")?;
                w.flags(flags)
            }
            MsgAtt::InternalDate(ref dt) => {
                w.verbatim("INTERNALDATE ")?;
                w.datetime(dt)
            }
            MsgAtt::Envelope(ref env) => {
                w.verbatim("ENVELOPE ")?;
                write_envelope(w, env)
            }
            MsgAtt::Literal { ref name, ref data } => {
                w.verbatim(name)?;
                w.verbatim(" ")?;
                w.literal(data)
            }
        }
    }
}

fn write_envelope(
    w: &mut LexWriter<impl Write>,
    env: &Envelope,
) -> io::Result<()> {
    w.verbatim("(")?;
    w.nstring(&env.date)?;
    w.verbatim(" ")?;
    w.nstring(&env.subject)?;
    for addresses in &[
        &env.from,
        &env.sender,
        &env.reply_to,
        &env.to,
        &env.cc,
        &env.bcc,
    ] {
        w.verbatim(" ")?;
        write_addresses(w, addresses)?;
    }
    w.verbatim(" ")?;
    w.nstring(&env.in_reply_to)?;
    w.verbatim(" ")?;
    w.nstring(&env.message_id)?;
    w.verbatim(")")
}

fn write_addresses(
    w: &mut LexWriter<impl Write>,
    addresses: &[EnvelopeAddress],
) -> io::Result<()> {
    if addresses.is_empty() {
        return w.nil();
    }

    w.verbatim("(")?;
    for address in addresses {
        w.verbatim("(")?;
        w.quoted(&address.name)?;
        w.verbatim(" ")?;
        w.nil()?;
        w.verbatim(" ")?;
        w.quoted(&address.local)?;
        w.verbatim(" ")?;
        w.quoted(&address.domain)?;
        w.verbatim(")")?;
    }
    w.verbatim(")")
}
