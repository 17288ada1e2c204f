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

//! Parsing of received command lines.
//!
//! Parsing happens in two stages. `CommandLine::parse` only splits off the
//! tag and recognises the verb; the raw argument tail is kept so that the
//! session can check whether the verb is permitted before looking at the
//! arguments. The verb-specific parsers further down then interpret the tail.

use bitflags::bitflags;
use nom::{
    branch::alt,
    bytes::complete::{escaped_transform, is_a, is_not, tag_no_case as kw},
    character::complete::{char, digit1},
    combinator::{all_consuming, map, map_res, opt},
    multi::{separated_list, separated_nonempty_list},
    sequence::{delimited, pair, preceded, separated_pair, terminated},
    IResult,
};

use crate::account::model::{Flag, StoreOp};

/// A recognised command verb.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verb<'a> {
    Capability,
    Authenticate,
    LogIn,
    LogOut,
    Noop,
    Select,
    List,
    Lsub,
    Status,
    Fetch,
    UidFetch,
    Store,
    UidStore,
    Expunge,
    Search,
    /// A verb this server does not know, as sent.
    Unknown(&'a str),
    /// `UID` followed by anything other than `FETCH` or `STORE`.
    UnknownUid(&'a str),
}

/// A command line split into tag, verb, and the still-unparsed arguments.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CommandLine<'a> {
    pub tag: &'a str,
    pub verb: Verb<'a>,
    /// Everything after the verb, with leading whitespace removed.
    pub args: &'a str,
}

impl<'a> CommandLine<'a> {
    /// Split `line` into tag, verb, and arguments.
    ///
    /// Returns `None` if the line is blank; such lines are ignored entirely.
    /// A line with a tag but no verb yields `Verb::Unknown("")`.
    pub fn parse(line: &'a str) -> Option<Self> {
        let (args, (tag, verb)) =
            pair(token, opt(preceded(space, token)))(line.trim()).ok()?;
        let args = args.trim_start();

        let (verb, args) = match verb {
            None => (Verb::Unknown(""), args),
            Some(verb) => recognise_verb(verb, args),
        };

        Some(CommandLine { tag, verb, args })
    }
}

fn recognise_verb<'a>(verb: &'a str, args: &'a str) -> (Verb<'a>, &'a str) {
    let simple = match verb.to_ascii_uppercase().as_str() {
        "CAPABILITY" => Verb::Capability,
        "AUTHENTICATE" => Verb::Authenticate,
        "LOGIN" => Verb::LogIn,
        "LOGOUT" => Verb::LogOut,
        "NOOP" => Verb::Noop,
        "SELECT" => Verb::Select,
        "LIST" => Verb::List,
        "LSUB" => Verb::Lsub,
        "STATUS" => Verb::Status,
        "FETCH" => Verb::Fetch,
        "STORE" => Verb::Store,
        "EXPUNGE" => Verb::Expunge,
        "SEARCH" => Verb::Search,
        "UID" => {
            let (sub, rest) = split_token(args);
            return match sub.to_ascii_uppercase().as_str() {
                "FETCH" => (Verb::UidFetch, rest),
                "STORE" => (Verb::UidStore, rest),
                _ => (Verb::UnknownUid(sub), rest),
            };
        }
        _ => Verb::Unknown(verb),
    };

    (simple, args)
}

fn token(i: &str) -> IResult<&str, &str> {
    is_not(" \t")(i)
}

fn space(i: &str) -> IResult<&str, &str> {
    is_a(" \t")(i)
}

/// Split the first whitespace-delimited token off `s`.
///
/// Returns the token (empty if there is none) and the remainder with leading
/// whitespace removed.
pub fn split_token(s: &str) -> (&str, &str) {
    let s = s.trim_start();
    match token(s) {
        Ok((rest, tok)) => (tok, rest.trim_start()),
        Err(_) => ("", s),
    }
}

fn quoted(i: &str) -> IResult<&str, String> {
    alt((
        map(kw("\"\""), |_| String::new()),
        delimited(
            char('"'),
            escaped_transform(is_not("\\\""), '\\', |i: &str| {
                alt((kw("\\"), kw("\"")))(i)
            }),
            char('"'),
        ),
    ))(i)
}

// A quoted string, or a bare token with any stray quotes stripped
fn astring(i: &str) -> IResult<&str, String> {
    alt((
        quoted,
        map(token, |t: &str| t.trim_matches('"').to_owned()),
    ))(i)
}

/// Parse the arguments of `LOGIN`, returning the user name and password.
pub fn parse_log_in(args: &str) -> Option<(String, String)> {
    terminated(separated_pair(astring, space, astring), opt(space))(args)
        .ok()
        .map(|(_, creds)| creds)
}

/// Parse a lone mailbox name, as for `SELECT`.
///
/// Anything after the mailbox name is ignored.
pub fn parse_mailbox(args: &str) -> Option<String> {
    astring(args).ok().map(|(_, name)| name)
}

/// Parse the arguments of `STATUS`, returning the mailbox name and the raw
/// item list. The item list must be present but is otherwise ignored.
pub fn parse_status(args: &str) -> Option<(String, &str)> {
    let (items, mailbox) = terminated(astring, space)(args).ok()?;
    if items.trim().is_empty() {
        None
    } else {
        Some((mailbox, items.trim()))
    }
}

/// Split the sequence number or set off the front of `args`, requiring that
/// something follows it.
pub fn parse_sequence_and_items(args: &str) -> Option<(&str, &str)> {
    let (seq, items) = split_token(args);
    if seq.is_empty() || items.is_empty() {
        None
    } else {
        Some((seq, items))
    }
}

/// What a plain `FETCH` returns, decided by looking for well-known item
/// names anywhere in the (case-insensitive) item specification.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FetchSection {
    /// The whole message, echoed as `RFC822`.
    Rfc822,
    /// The whole message, echoed as `BODY[]`.
    Body,
    /// The reconstructed header block.
    Header,
    /// The decoded text part.
    Text,
}

impl FetchSection {
    /// Unrecognised item specifications fall back to `Rfc822`.
    pub fn of(spec: &str) -> Self {
        let spec = spec.to_ascii_uppercase();
        let has = |item: &str| {
            spec.contains(&format!("BODY[{}]", item))
                || spec.contains(&format!("BODY.PEEK[{}]", item))
        };

        if spec.contains("RFC822") {
            FetchSection::Rfc822
        } else if has("") {
            FetchSection::Body
        } else if has("HEADER") {
            FetchSection::Header
        } else if has("TEXT") {
            FetchSection::Text
        } else {
            FetchSection::Rfc822
        }
    }

    /// The data item name used in the response.
    pub fn name(self) -> &'static str {
        match self {
            FetchSection::Rfc822 => "RFC822",
            FetchSection::Body => "BODY[]",
            FetchSection::Header => "BODY[HEADER]",
            FetchSection::Text => "BODY[TEXT]",
        }
    }
}

/// The UIDs selected by a `UID FETCH`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UidRange {
    /// `N`
    Just(u32),
    /// `N:M`, or `N:*` if the end is `None`.
    Range(u32, Option<u32>),
    /// Anything that could not be understood means every message.
    All,
}

impl UidRange {
    pub fn parse(s: &str) -> Self {
        fn number(i: &str) -> IResult<&str, u32> {
            map_res(digit1, str::parse)(i)
        }

        let range = alt((
            map(
                separated_pair(
                    number,
                    char(':'),
                    alt((map(char('*'), |_| None), map(number, Some))),
                ),
                |(start, end)| UidRange::Range(start, end),
            ),
            map(number, UidRange::Just),
        ));

        all_consuming(range)(s)
            .map(|(_, range)| range)
            .unwrap_or(UidRange::All)
    }

    /// Return whether `uid` is selected, given `max` as the UID of the last
    /// message.
    pub fn contains(self, uid: u32, max: u32) -> bool {
        match self {
            UidRange::Just(n) => n == uid,
            UidRange::Range(start, end) => {
                start <= uid && uid <= end.unwrap_or(max)
            }
            UidRange::All => uid >= 1 && uid <= max,
        }
    }
}

bitflags! {
    /// The data items requested by a `UID FETCH`.
    pub struct FetchAttrs: u32 {
        const UID = 1 << 0;
        const FLAGS = 1 << 1;
        const INTERNALDATE = 1 << 2;
        const RFC822_SIZE = 1 << 3;
        const ENVELOPE = 1 << 4;
        const RFC822 = 1 << 5;
        const HEADER_FIELDS = 1 << 6;
        /// Any other `BODY[...]` section or unknown item.
        const OTHER = 1 << 7;
    }
}

/// A parsed `UID FETCH` item list.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UidFetchItems {
    pub attrs: FetchAttrs,
    /// The field names of a `HEADER.FIELDS` section, as given.
    pub header_fields: Vec<String>,
    /// Whether that section was `HEADER.FIELDS.NOT`.
    pub header_fields_not: bool,
}

impl UidFetchItems {
    /// Parse a parenthesised or bare list of fetch data items.
    ///
    /// Anything unparseable yields an empty set of attributes.
    pub fn parse(spec: &str) -> Self {
        let mut items = UidFetchItems {
            attrs: FetchAttrs::empty(),
            header_fields: vec![],
            header_fields_not: false,
        };

        let atts = match fetch_att_list(spec.trim()) {
            Ok((_, atts)) => atts,
            Err(_) => return items,
        };

        for (name, section) in atts {
            let name = name.to_ascii_uppercase();
            match (name.as_str(), section) {
                ("BODY", Some(section)) | ("BODY.PEEK", Some(section)) => {
                    match header_fields_section(section) {
                        Ok((_, (not, fields))) => {
                            items.attrs |= FetchAttrs::HEADER_FIELDS;
                            items.header_fields_not = not;
                            items.header_fields =
                                fields.into_iter().map(str::to_owned).collect();
                        }
                        Err(_) => items.attrs |= FetchAttrs::OTHER,
                    }
                }
                ("UID", None) => items.attrs |= FetchAttrs::UID,
                ("FLAGS", None) => items.attrs |= FetchAttrs::FLAGS,
                ("INTERNALDATE", None) => {
                    items.attrs |= FetchAttrs::INTERNALDATE
                }
                ("RFC822.SIZE", None) => items.attrs |= FetchAttrs::RFC822_SIZE,
                ("ENVELOPE", None) => items.attrs |= FetchAttrs::ENVELOPE,
                ("RFC822", None) => items.attrs |= FetchAttrs::RFC822,
                _ => items.attrs |= FetchAttrs::OTHER,
            }
        }

        items
    }

    /// The name under which the requested header fields are returned.
    pub fn header_fields_name(&self) -> String {
        format!(
            "BODY[HEADER.FIELDS{} ({})]",
            if self.header_fields_not { ".NOT" } else { "" },
            self.header_fields.join(" ")
        )
    }
}

fn fetch_att(i: &str) -> IResult<&str, (&str, Option<&str>)> {
    terminated(
        pair(
            is_not(" \t()[]<"),
            opt(delimited(char('['), map(opt(is_not("]")), Option::unwrap_or_default), char(']'))),
        ),
        // Partial fetch suffix, which is ignored
        opt(delimited(char('<'), is_not(">"), char('>'))),
    )(i)
}

fn fetch_att_list(i: &str) -> IResult<&str, Vec<(&str, Option<&str>)>> {
    all_consuming(alt((
        delimited(
            terminated(char('('), opt(space)),
            separated_list(space, fetch_att),
            preceded(opt(space), char(')')),
        ),
        separated_nonempty_list(space, fetch_att),
    )))(i)
}

fn header_fields_section(i: &str) -> IResult<&str, (bool, Vec<&str>)> {
    all_consuming(preceded(
        kw("HEADER.FIELDS"),
        pair(
            map(opt(kw(".NOT")), |not| not.is_some()),
            preceded(
                opt(space),
                delimited(
                    terminated(char('('), opt(space)),
                    separated_list(space, is_not(" \t()")),
                    preceded(opt(space), char(')')),
                ),
            ),
        ),
    ))(i)
}

/// Parse the tail of `STORE` following the sequence number.
///
/// `+FLAGS` adds and `-FLAGS` removes; any other item name leaves the flags
/// alone. The flags may be parenthesised or given bare. Unparseable input is
/// treated as an item that changes nothing.
pub fn parse_store(args: &str) -> (StoreOp, Vec<Flag>) {
    fn flag(i: &str) -> IResult<&str, Flag> {
        map(is_not(" \t()"), |f: &str| {
            f.parse().unwrap_or_else(|e| match e {})
        })(i)
    }

    fn flag_list(i: &str) -> IResult<&str, Vec<Flag>> {
        alt((
            delimited(
                terminated(char('('), opt(space)),
                separated_list(space, flag),
                preceded(opt(space), char(')')),
            ),
            separated_list(space, flag),
        ))(i)
    }

    let parsed: IResult<&str, (&str, Vec<Flag>)> =
        pair(terminated(token, opt(space)), flag_list)(args.trim());
    let (item, flags) = match parsed {
        Ok((_, parsed)) => parsed,
        Err(_) => return (StoreOp::Keep, vec![]),
    };

    let item = item.to_ascii_uppercase();
    let op = if item.starts_with("+FLAGS") {
        StoreOp::Add
    } else if item.starts_with("-FLAGS") {
        StoreOp::Remove
    } else {
        StoreOp::Keep
    };

    (op, flags)
}
