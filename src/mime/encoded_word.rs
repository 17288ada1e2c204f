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

//! RFC 2047 "encoded words" in unstructured header text.

use std::borrow::Cow;

use encoding_rs::Encoding;
use lazy_static::lazy_static;
use regex::Regex;

use super::quoted_printable::qp_decode;

lazy_static! {
    static ref ENCODED_WORD: Regex =
        Regex::new(r"=\?([!->@-~]+)\?([!->@-~]+)\?([!->@-~]*)\?=").unwrap();
}

/// Decode every encoded word in `text`.
///
/// Whitespace between two adjacent encoded words is dropped, but is kept
/// everywhere else. Encoded words naming an unknown charset or transfer
/// encoding are left as they are.
pub fn ew_decode_all(text: &str) -> Cow<str> {
    if !text.contains("=?") {
        return Cow::Borrowed(text);
    }

    let mut out = String::with_capacity(text.len());
    let mut last_end = 0;
    let mut prev_was_decoded = false;

    for captures in ENCODED_WORD.captures_iter(text) {
        let whole = captures.get(0).unwrap();
        let between = &text[last_end..whole.start()];
        let decoded = ew_decode(
            captures.get(1).unwrap().as_str(),
            captures.get(2).unwrap().as_str(),
            captures.get(3).unwrap().as_str(),
        );

        let is_linear_ws = between.chars().all(|c| c.is_ascii_whitespace());
        if !(prev_was_decoded && decoded.is_some() && is_linear_ws) {
            out.push_str(between);
        }

        match decoded {
            Some(decoded) => {
                out.push_str(&decoded);
                prev_was_decoded = true;
            }
            None => {
                out.push_str(whole.as_str());
                prev_was_decoded = false;
            }
        }

        last_end = whole.end();
    }

    out.push_str(&text[last_end..]);
    Cow::Owned(out)
}

fn ew_decode(
    charset: &str,
    transfer_encoding: &str,
    content: &str,
) -> Option<String> {
    // RFC 2231 allows a language suffix, as in `us-ascii*en`
    let charset = charset.split('*').next().unwrap_or(charset);
    let encoding = Encoding::for_label_no_replacement(charset.as_bytes())?;

    let bytes: Cow<[u8]> = if transfer_encoding.eq_ignore_ascii_case("q") {
        // _ is always ASCII space, whatever the charset
        let unescaped = content.replace('_', " ");
        Cow::Owned(qp_decode(unescaped.as_bytes()).into_owned())
    } else if transfer_encoding.eq_ignore_ascii_case("b") {
        Cow::Owned(base64::decode(content).ok()?)
    } else {
        return None;
    };

    Some(encoding.decode_with_bom_removal(&bytes).0.into_owned())
}
