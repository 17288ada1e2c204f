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

//! Utilities for working with RFC 2822 header blocks and the structured
//! header values the server needs to understand.

use memchr::memchr;
use nom::{
    branch::alt,
    bytes::complete::{is_a, is_not, take, take_while1},
    character::complete::char,
    combinator::{map, opt, recognize},
    multi::{
        fold_many0, many0, many0_count, many1, many1_count,
        separated_nonempty_list,
    },
    sequence::{delimited, pair, preceded, terminated, tuple},
    IResult,
};

use super::encoded_word::ew_decode_all;

/// A single header field, unfolded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Header {
    pub name: String,
    /// The raw value with line folding removed and surrounding whitespace
    /// trimmed. Encoded words are not decoded.
    pub value: String,
}

/// One mailbox from an address list.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Address {
    /// The display name, with quoting removed and encoded words decoded.
    pub name: Option<String>,
    pub local: String,
    pub domain: String,
}

/// A `Content-Type` or `Content-Disposition` value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContentValue {
    /// The value itself (e.g. `text/plain` or `attachment`), lower-cased.
    pub value: String,
    /// Parameters, names lower-cased, in the order given.
    pub params: Vec<(String, String)>,
}

impl ContentValue {
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|&&(ref k, _)| k == name)
            .map(|&(_, ref v)| &**v)
    }

    /// Whether any parameter is `name` or an RFC 2231 variant of it.
    pub fn has_param_family(&self, name: &str) -> bool {
        self.params.iter().any(|&(ref k, _)| {
            k == name
                || (k.starts_with(name) && k[name.len()..].starts_with('*'))
        })
    }
}

/// Split `message` at the first empty line into the header block and the
/// body.
///
/// The returned header block excludes the empty line. If there is no empty
/// line, the whole message is taken as the header block.
pub fn split_message(message: &[u8]) -> (&[u8], &[u8]) {
    let mut pos = 0;
    while let Some(nl) = memchr(b'\n', &message[pos..]) {
        let line = &message[pos..pos + nl];
        if line.is_empty() || line == b"\r" {
            return (&message[..pos], &message[pos + nl + 1..]);
        }
        pos += nl + 1;
    }

    (message, &[])
}

/// Break a header block into its fields.
///
/// Continuation lines are joined to the field they continue. Lines which
/// are neither fields nor continuations (such as an mbox `From ` line) are
/// ignored. The input is interpreted as UTF-8, lossily.
pub fn parse_headers(block: &[u8]) -> Vec<Header> {
    let mut headers: Vec<Header> = Vec::new();
    let text = String::from_utf8_lossy(block);

    for line in text.split('\n') {
        let line = line.strip_suffix('\r').unwrap_or(line);
        if line.starts_with(' ') || line.starts_with('\t') {
            if let Some(last) = headers.last_mut() {
                last.value.push_str(line);
            }
            continue;
        }

        let colon = match line.find(':') {
            Some(colon) => colon,
            None => continue,
        };
        let name = line[..colon].trim_end();
        if name.is_empty() || name.contains(' ') {
            continue;
        }

        headers.push(Header {
            name: name.to_owned(),
            value: line[colon + 1..].to_owned(),
        });
    }

    for header in &mut headers {
        let trimmed = header.value.trim();
        if trimmed.len() != header.value.len() {
            header.value = trimmed.to_owned();
        }
    }

    headers
}

/// Parse an address list header (`From`, `To`, etc).
///
/// Group syntax is flattened into its members. Parsing stops at the first
/// thing that cannot be understood; whatever was parsed up to that point is
/// returned.
pub fn parse_address_list(value: &str) -> Vec<Address> {
    match address_list(value.as_bytes()) {
        Ok((_, addresses)) => addresses,
        Err(_) => vec![],
    }
}

/// Parse a `Content-Type` header value.
///
/// Returns `None` if the value is not of the form `type/subtype`.
pub fn parse_content_type(value: &str) -> Option<ContentValue> {
    content_type(value.as_bytes()).ok().map(|(_, ct)| ct)
}

/// Parse a `Content-Disposition` header value.
pub fn parse_content_disposition(value: &str) -> Option<ContentValue> {
    content_disposition(value.as_bytes()).ok().map(|(_, cd)| cd)
}

fn lossy(b: &[u8]) -> String {
    String::from_utf8_lossy(b).into_owned()
}

fn is_atext(ch: u8) -> bool {
    ch.is_ascii_alphanumeric()
        || b"!#$%&'*+-/=?^_`{|}~".contains(&ch)
        // RFC 6532
        || ch >= 0x80
}

// RFC 2045 token
fn is_token_char(ch: u8) -> bool {
    ch > b' ' && ch < 0x7F && !b"()<>@,;:\\\"/[]?=".contains(&ch)
}

// RFC 2822 3.2.2, 8-bit clean
fn quoted_pair(i: &[u8]) -> IResult<&[u8], &[u8]> {
    preceded(char('\\'), take(1usize))(i)
}

// RFC 2822 3.2.3. Line endings are treated as plain whitespace since the
// header has already been unfolded.
fn fws(i: &[u8]) -> IResult<&[u8], &[u8]> {
    map(is_a(" \t\r\n"), |_| &b" "[..])(i)
}

fn comment(i: &[u8]) -> IResult<&[u8], ()> {
    map(
        delimited(
            char('('),
            many0_count(alt((
                map(is_not("()\\ \t\r\n"), |_| ()),
                map(quoted_pair, |_| ()),
                map(fws, |_| ()),
                comment,
            ))),
            char(')'),
        ),
        |_| (),
    )(i)
}

fn cfws(i: &[u8]) -> IResult<&[u8], ()> {
    map(many1_count(alt((map(fws, |_| ()), comment))), |_| ())(i)
}

fn atom(i: &[u8]) -> IResult<&[u8], &[u8]> {
    delimited(opt(cfws), take_while1(is_atext), opt(cfws))(i)
}

fn quoted_string(i: &[u8]) -> IResult<&[u8], Vec<u8>> {
    delimited(
        pair(opt(cfws), char('"')),
        fold_many0(
            alt((is_not(" \t\r\n\\\""), quoted_pair, fws)),
            Vec::new(),
            |mut acc: Vec<u8>, item| {
                acc.extend_from_slice(item);
                acc
            },
        ),
        pair(char('"'), opt(cfws)),
    )(i)
}

fn word(i: &[u8]) -> IResult<&[u8], Vec<u8>> {
    alt((map(atom, <[u8]>::to_vec), quoted_string))(i)
}

// RFC 2822 3.2.6 phrase, plus the obsolete form which allows bare '.' as in
// `John Q. Public`.
fn phrase(i: &[u8]) -> IResult<&[u8], String> {
    map(
        many1(alt((
            map(word, Some),
            map(terminated(char('.'), opt(cfws)), |_| None),
        ))),
        |pieces| {
            let mut name = String::new();
            for piece in pieces {
                match piece {
                    Some(word) => {
                        if !name.is_empty() {
                            name.push(' ');
                        }
                        name.push_str(&String::from_utf8_lossy(&word));
                    }
                    None => name.push('.'),
                }
            }
            ew_decode_all(&name).into_owned()
        },
    )(i)
}

// RFC 2822 3.4.1, including obs-local-part
fn local_part(i: &[u8]) -> IResult<&[u8], Vec<u8>> {
    map(separated_nonempty_list(char('.'), word), |words| {
        words.join(&b"."[..])
    })(i)
}

fn domain_literal(i: &[u8]) -> IResult<&[u8], Vec<u8>> {
    delimited(
        pair(opt(cfws), char('[')),
        fold_many0(
            alt((is_not("[]\\ \t\r\n"), quoted_pair, fws)),
            vec![b'['],
            |mut acc: Vec<u8>, item| {
                acc.extend_from_slice(item);
                acc
            },
        ),
        pair(char(']'), opt(cfws)),
    )(i)
    .map(|(i, mut literal)| {
        literal.push(b']');
        (i, literal)
    })
}

fn domain(i: &[u8]) -> IResult<&[u8], Vec<u8>> {
    alt((
        map(separated_nonempty_list(char('.'), atom), |parts| {
            parts.join(&b"."[..])
        }),
        domain_literal,
    ))(i)
}

fn addr_spec(i: &[u8]) -> IResult<&[u8], (Vec<u8>, Vec<u8>)> {
    pair(local_part, preceded(char('@'), domain))(i)
}

// RFC 2822 4.4 obsolete source route, which is discarded
fn obs_route(i: &[u8]) -> IResult<&[u8], &[u8]> {
    recognize(tuple((
        char('@'),
        domain,
        many0_count(tuple((many1_count(char(',')), opt(cfws), char('@'), domain))),
        char(':'),
    )))(i)
}

fn angle_addr(i: &[u8]) -> IResult<&[u8], (Vec<u8>, Vec<u8>)> {
    delimited(
        tuple((opt(cfws), char('<'), opt(obs_route))),
        addr_spec,
        pair(char('>'), opt(cfws)),
    )(i)
}

fn mailbox(i: &[u8]) -> IResult<&[u8], Address> {
    map(
        alt((
            pair(opt(phrase), angle_addr),
            map(addr_spec, |addr| (None, addr)),
        )),
        |(name, (local, domain))| Address {
            name: name.filter(|n| !n.is_empty()),
            local: lossy(&local),
            domain: lossy(&domain),
        },
    )(i)
}

fn list_delim(i: &[u8]) -> IResult<&[u8], ()> {
    map(many1_count(tuple((opt(cfws), char(','), opt(cfws)))), |_| ())(i)
}

fn mailbox_list(i: &[u8]) -> IResult<&[u8], Vec<Address>> {
    delimited(
        opt(list_delim),
        separated_nonempty_list(list_delim, mailbox),
        opt(list_delim),
    )(i)
}

fn group(i: &[u8]) -> IResult<&[u8], Vec<Address>> {
    map(
        tuple((
            phrase,
            char(':'),
            opt(mailbox_list),
            opt(cfws),
            char(';'),
            opt(cfws),
        )),
        |(_, _, boxes, _, _, _)| boxes.unwrap_or_default(),
    )(i)
}

fn address(i: &[u8]) -> IResult<&[u8], Vec<Address>> {
    alt((map(mailbox, |m| vec![m]), group))(i)
}

fn address_list(i: &[u8]) -> IResult<&[u8], Vec<Address>> {
    map(
        delimited(
            opt(list_delim),
            separated_nonempty_list(list_delim, address),
            opt(list_delim),
        ),
        |groups| groups.into_iter().flatten().collect(),
    )(i)
}

fn token(i: &[u8]) -> IResult<&[u8], &[u8]> {
    delimited(opt(cfws), take_while1(is_token_char), opt(cfws))(i)
}

fn parameter(i: &[u8]) -> IResult<&[u8], (String, String)> {
    map(
        preceded(
            pair(char(';'), opt(cfws)),
            pair(
                terminated(token, char('=')),
                alt((quoted_string, map(token, <[u8]>::to_vec))),
            ),
        ),
        |(name, value)| (lossy(name).to_ascii_lowercase(), lossy(&value)),
    )(i)
}

fn content_type(i: &[u8]) -> IResult<&[u8], ContentValue> {
    map(
        tuple((token, char('/'), token, many0(parameter))),
        |(typ, _, subtype, params)| ContentValue {
            value: format!("{}/{}", lossy(typ), lossy(subtype))
                .to_ascii_lowercase(),
            params,
        },
    )(i)
}

fn content_disposition(i: &[u8]) -> IResult<&[u8], ContentValue> {
    map(pair(token, many0(parameter)), |(disposition, params)| {
        ContentValue {
            value: lossy(disposition).to_ascii_lowercase(),
            params,
        }
    })(i)
}

/// Render headers back into a header block, `Name: value` per line, ending
/// with the empty line that separates it from the body.
pub fn write_header_block<'a>(
    headers: impl IntoIterator<Item = &'a Header>,
) -> Vec<u8> {
    let mut block = Vec::new();
    for header in headers {
        block.extend_from_slice(header.name.as_bytes());
        block.extend_from_slice(b": ");
        block.extend_from_slice(header.value.as_bytes());
        block.extend_from_slice(b"\r\n");
    }
    block.extend_from_slice(b"\r\n");
    block
}
