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

use chrono::prelude::*;

use super::encoded_word::ew_decode_all;
use super::header::{parse_address_list, Address};
use super::message::Message;

/// The `ENVELOPE` structure, in the order the fields are sent.
///
/// Only a subset of the fields carry information of their own. `sender`,
/// `cc`, `bcc` and `in_reply_to` are always empty, and `reply_to` is a copy
/// of `from`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Envelope {
    /// The raw `Date` header, or the time the envelope was built if the
    /// message has none.
    pub date: Option<String>,
    /// The `Subject` header, decoded.
    pub subject: Option<String>,
    pub from: Vec<EnvelopeAddress>,
    pub sender: Vec<EnvelopeAddress>,
    pub reply_to: Vec<EnvelopeAddress>,
    pub to: Vec<EnvelopeAddress>,
    pub cc: Vec<EnvelopeAddress>,
    pub bcc: Vec<EnvelopeAddress>,
    pub in_reply_to: Option<String>,
    /// The `Message-ID` header, or a synthesised one.
    pub message_id: Option<String>,
}

/// One address in an envelope.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvelopeAddress {
    /// The display name, falling back to the local part.
    pub name: String,
    /// Source routing is always discarded; the field is always NIL.
    pub routing: (),
    pub local: String,
    pub domain: String,
}

impl From<Address> for EnvelopeAddress {
    fn from(address: Address) -> Self {
        let local = address.local;
        EnvelopeAddress {
            name: address.name.unwrap_or_else(|| local.clone()),
            routing: (),
            local,
            domain: address.domain,
        }
    }
}

impl Envelope {
    /// Build the envelope of `message`.
    ///
    /// `uid` and `domain` are used to synthesise a message ID of the form
    /// `<msg{uid}@{domain}>` when the message has none.
    pub fn of(message: &Message<'_>, uid: u32, domain: &str) -> Self {
        let from = addresses(message.header("From"));

        Envelope {
            date: Some(
                message
                    .header("Date")
                    .filter(|d| !d.is_empty())
                    .map(str::to_owned)
                    .unwrap_or_else(|| Local::now().to_rfc2822()),
            ),
            subject: message
                .header("Subject")
                .filter(|s| !s.is_empty())
                .map(|s| ew_decode_all(s).into_owned()),
            reply_to: from.clone(),
            from,
            sender: vec![],
            to: addresses(message.header("To")),
            cc: vec![],
            bcc: vec![],
            in_reply_to: None,
            message_id: Some(
                message
                    .header("Message-ID")
                    .filter(|id| !id.is_empty())
                    .map(str::to_owned)
                    .unwrap_or_else(|| format!("<msg{}@{}>", uid, domain)),
            ),
        }
    }
}

fn addresses(value: Option<&str>) -> Vec<EnvelopeAddress> {
    value
        .map(parse_address_list)
        .unwrap_or_default()
        .into_iter()
        .map(EnvelopeAddress::from)
        .collect()
}
