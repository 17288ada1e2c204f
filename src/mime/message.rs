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

//! Read-only access to a stored message.

use encoding_rs::{Encoding, UTF_8};
use log::debug;
use memchr::memchr;

use super::header::*;
use super::quoted_printable::qp_decode;

// Bounds recursion through nested multiparts and attached messages.
const MAX_DEPTH: u32 = 20;

/// A stored message, split into its header fields and body.
#[derive(Clone, Debug)]
pub struct Message<'a> {
    raw: &'a [u8],
    headers: Vec<Header>,
    body: &'a [u8],
}

impl<'a> Message<'a> {
    pub fn parse(raw: &'a [u8]) -> Self {
        let (header_block, body) = split_message(raw);
        Message {
            raw,
            headers: parse_headers(header_block),
            body,
        }
    }

    /// The exact bytes of the message as stored.
    pub fn raw(&self) -> &'a [u8] {
        self.raw
    }

    /// The size of the message in bytes, as reported by `RFC822.SIZE`.
    pub fn size(&self) -> usize {
        self.raw.len()
    }

    pub fn headers(&self) -> &[Header] {
        &self.headers
    }

    /// Return the value of the first header called `name`, ignoring case.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case(name))
            .map(|h| &*h.value)
    }

    /// Reconstruct the header block from the parsed fields, in their
    /// original order.
    pub fn header_block(&self) -> Vec<u8> {
        write_header_block(&self.headers)
    }

    /// Reconstruct a header block containing only the fields named in
    /// `names` (compared case-insensitively), in their original order.
    ///
    /// If `exclude` is set, the named fields are left out instead.
    pub fn header_fields<S: AsRef<str>>(
        &self,
        names: &[S],
        exclude: bool,
    ) -> Vec<u8> {
        write_header_block(self.headers.iter().filter(|h| {
            exclude
                != names
                    .iter()
                    .any(|n| n.as_ref().eq_ignore_ascii_case(&h.name))
        }))
    }

    /// Extract the human-readable text of the message.
    ///
    /// For a multipart message, this is the first `text/plain` part which
    /// does not have a file name, searched depth-first. For anything else,
    /// it is the decoded body. Content transfer encoding is removed and the
    /// declared charset (default UTF-8) is decoded, with undecodable
    /// sequences replaced by U+FFFD.
    pub fn text(&self) -> String {
        if is_multipart(&self.headers) {
            find_plain_text(&self.headers, self.body, 0).unwrap_or_default()
        } else {
            decode_body(&self.headers, self.body)
        }
    }
}

fn content_type(headers: &[Header]) -> Option<ContentValue> {
    headers
        .iter()
        .find(|h| h.name.eq_ignore_ascii_case("Content-Type"))
        .and_then(|h| parse_content_type(&h.value))
}

fn is_multipart(headers: &[Header]) -> bool {
    content_type(headers).map_or(false, |ct| ct.value.starts_with("multipart/"))
}

fn has_file_name(headers: &[Header]) -> bool {
    let by_disposition = headers
        .iter()
        .filter(|h| h.name.eq_ignore_ascii_case("Content-Disposition"))
        .filter_map(|h| parse_content_disposition(&h.value))
        .any(|cd| cd.has_param_family("filename"));
    by_disposition
        || content_type(headers).map_or(false, |ct| ct.has_param_family("name"))
}

fn find_plain_text(
    headers: &[Header],
    body: &[u8],
    depth: u32,
) -> Option<String> {
    if depth > MAX_DEPTH {
        debug!("Giving up on text search at depth {}", depth);
        return None;
    }

    let ct = content_type(headers);
    let media_type = ct.as_ref().map_or("text/plain", |ct| &*ct.value);

    if media_type.starts_with("multipart/") {
        let boundary = ct.as_ref().and_then(|ct| ct.param("boundary"))?;
        split_multipart(body, boundary).into_iter().find_map(|part| {
            let (part_headers, part_body) = split_message(part);
            find_plain_text(&parse_headers(part_headers), part_body, depth + 1)
        })
    } else if "message/rfc822" == media_type {
        let (inner_headers, inner_body) = split_message(body);
        find_plain_text(&parse_headers(inner_headers), inner_body, depth + 1)
    } else if "text/plain" == media_type && !has_file_name(headers) {
        Some(decode_body(headers, body))
    } else {
        None
    }
}

/// Split a multipart body into the raw content of its parts.
///
/// The preamble and epilogue are discarded. An unterminated final part runs
/// to the end of the body.
fn split_multipart<'a>(body: &'a [u8], boundary: &str) -> Vec<&'a [u8]> {
    let delimiter = format!("--{}", boundary);
    let mut parts = Vec::new();
    let mut part_start: Option<usize> = None;
    let mut pos = 0;

    while pos < body.len() {
        let line_end =
            memchr(b'\n', &body[pos..]).map_or(body.len(), |nl| pos + nl + 1);
        let line = trim_end(&body[pos..line_end]);

        if line.starts_with(delimiter.as_bytes()) {
            let tail = &line[delimiter.len()..];
            if tail.is_empty() || b"--" == tail {
                if let Some(start) = part_start.take() {
                    parts.push(strip_line_ending(&body[start..pos]));
                }

                if b"--" == tail {
                    return parts;
                }

                part_start = Some(line_end);
            }
        }

        pos = line_end;
    }

    if let Some(start) = part_start {
        parts.push(&body[start..]);
    }

    parts
}

fn trim_end(mut line: &[u8]) -> &[u8] {
    while let Some((&last, rest)) = line.split_last() {
        if !last.is_ascii_whitespace() {
            break;
        }
        line = rest;
    }
    line
}

// The line ending before a delimiter belongs to the delimiter.
fn strip_line_ending(part: &[u8]) -> &[u8] {
    let part = part.strip_suffix(b"\n").unwrap_or(part);
    part.strip_suffix(b"\r").unwrap_or(part)
}

fn decode_body(headers: &[Header], body: &[u8]) -> String {
    let transfer_encoding = headers
        .iter()
        .find(|h| h.name.eq_ignore_ascii_case("Content-Transfer-Encoding"))
        .map(|h| h.value.trim().to_ascii_lowercase());

    let decoded: Vec<u8> = match transfer_encoding.as_ref().map(|s| &**s) {
        Some("base64") => {
            let compact: Vec<u8> = body
                .iter()
                .copied()
                .filter(|b| !b.is_ascii_whitespace())
                .collect();
            match base64::decode(&compact) {
                Ok(decoded) => decoded,
                Err(e) => {
                    debug!("Undecodable base64 body, using raw: {}", e);
                    body.to_vec()
                }
            }
        }
        Some("quoted-printable") => qp_decode(body).into_owned(),
        _ => body.to_vec(),
    };

    let encoding = content_type(headers)
        .and_then(|ct| ct.param("charset").map(str::to_owned))
        .and_then(|charset| Encoding::for_label_no_replacement(charset.as_bytes()))
        .unwrap_or(UTF_8);

    encoding.decode_with_bom_removal(&decoded).0.into_owned()
}
