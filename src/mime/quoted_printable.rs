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

use memchr::memchr;

/// Undo RFC 2045 quoted-printable encoding.
///
/// `=XX` escapes become the byte they name and soft line breaks (`=`
/// followed by a DOS or UNIX line ending) vanish. Anything else, including
/// malformed escapes and a trailing lone `=`, is passed through unchanged,
/// so this never fails.
pub fn qp_decode(s: &[u8]) -> Cow<[u8]> {
    let first = match memchr(b'=', s) {
        Some(ix) => ix,
        None => return Cow::Borrowed(s),
    };

    let mut out = Vec::with_capacity(s.len());
    out.extend_from_slice(&s[..first]);

    let mut rest = &s[first..];
    while let Some(ix) = memchr(b'=', rest) {
        out.extend_from_slice(&rest[..ix]);
        let escape = &rest[ix + 1..];

        if escape.starts_with(b"\r\n") {
            rest = &escape[2..];
        } else if escape.starts_with(b"\n") {
            rest = &escape[1..];
        } else if let Some(byte) = escape
            .get(..2)
            .and_then(|hex| Some((hex_value(hex[0])?, hex_value(hex[1])?)))
            .map(|(hi, lo)| hi << 4 | lo)
        {
            out.push(byte);
            rest = &escape[2..];
        } else {
            out.push(b'=');
            rest = escape;
        }
    }
    out.extend_from_slice(rest);

    Cow::Owned(out)
}

fn hex_value(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}
