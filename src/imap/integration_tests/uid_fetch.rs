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

use super::defs::*;

const SANTA_ADDRESS: &str = "((\"Santa Claus\" NIL \"santa\" \"polonorte.com\"))";
const ELF_ADDRESS: &str = "((\"elf\" NIL \"elf\" \"polonorte.com\"))";

fn three_messages(setup: &Setup) -> Vec<Vec<u8>> {
    let messages = vec![
        simple_message("One", "1"),
        simple_message("=?UTF-8?Q?Dos_=E2=98=83?=", "2"),
        simple_message("Three", "3"),
    ];
    for (ix, message) in messages.iter().enumerate() {
        setup.deliver(SANTA, &format!("{}.eml", ix + 1), message);
    }
    messages
}

fn uids(responses: &[String]) -> Vec<String> {
    responses[..responses.len() - 1].to_vec()
}

#[test]
fn uid_ranges() {
    let setup = set_up();
    three_messages(&setup);

    let mut client = setup.connect("uidrange");
    quick_log_in(&mut client);
    quick_select(&mut client);

    let responses = client.command("a1 UID FETCH 1:* (UID FLAGS)");
    assert_eq!(
        vec![
            "* 1 FETCH (UID 1 FLAGS ())\r\n",
            "* 2 FETCH (UID 2 FLAGS ())\r\n",
            "* 3 FETCH (UID 3 FLAGS ())\r\n",
        ],
        uids(&responses)
    );
    assert_eq!("a1 OK UID FETCH completed\r\n", responses[3]);

    let responses = client.command("a2 UID FETCH 2:3 (FLAGS)");
    assert_eq!(
        vec![
            "* 2 FETCH (UID 2 FLAGS ())\r\n",
            "* 3 FETCH (UID 3 FLAGS ())\r\n",
        ],
        uids(&responses)
    );

    let responses = client.command("a3 UID FETCH 3 (UID)");
    assert_eq!(vec!["* 3 FETCH (UID 3 FLAGS ())\r\n"], uids(&responses));

    let responses = client.command("a4 UID FETCH 2:10 (UID)");
    assert_eq!(2, uids(&responses).len());

    // Backwards and out of range select nothing
    let responses = client.command("a5 UID FETCH 3:2 (UID)");
    assert_eq!(vec!["a5 OK UID FETCH completed\r\n"], responses);
    let responses = client.command("a6 UID FETCH 7 (UID)");
    assert_eq!(vec!["a6 OK UID FETCH completed\r\n"], responses);

    // Anything not understood means everything
    for seq in &["*", "1,3", "junk"] {
        let responses = client.command(&format!("a7 UID FETCH {} (UID)", seq));
        assert_eq!(3, uids(&responses).len(), "for {}", seq);
    }

    let responses = client.command("a8 UID FETCH");
    assert_tagged_bad(&responses[0]);
}

#[test]
fn uid_fetch_header_fields() {
    let setup = set_up();
    let messages = three_messages(&setup);

    let mut client = setup.connect("uidhdrfl");
    quick_log_in(&mut client);
    quick_select(&mut client);

    let responses = client.command(
        "a1 UID FETCH 2 (UID RFC822.SIZE FLAGS \
         BODY.PEEK[HEADER.FIELDS (From Subject)])",
    );
    assert_eq!(2, responses.len());

    let fields = "From: Santa Claus <santa@polonorte.com>\r\n\
                  Subject: =?UTF-8?Q?Dos_=E2=98=83?=\r\n\
                  \r\n";
    assert_eq!(
        format!(
            "* 2 FETCH (UID 2 RFC822.SIZE {} FLAGS () \
             INTERNALDATE \"01-Jan-2020 00:00:00 +0000\" \
             ENVELOPE (\"Thu, 24 Dec 2020 23:59:00 +0000\" \"Dos ☃\" \
             {} NIL {} {} NIL NIL NIL \"<msg2@polonorte.com>\") \
             BODY[HEADER.FIELDS (From Subject)] {{{}}}\r\n{})\r\n",
            messages[1].len(),
            SANTA_ADDRESS,
            SANTA_ADDRESS,
            ELF_ADDRESS,
            fields.len(),
            fields
        ),
        responses[0]
    );

    let responses = client.command(
        "a2 UID FETCH 1 (BODY.PEEK[HEADER.FIELDS.NOT (From To Subject)])",
    );
    assert!(
        responses[0].ends_with(
            "BODY[HEADER.FIELDS.NOT (From To Subject)] {41}\r\n\
             Date: Thu, 24 Dec 2020 23:59:00 +0000\r\n\r\n)\r\n"
        ),
        "Unexpected response: {:?}",
        responses[0]
    );
}

#[test]
fn uid_fetch_rfc822() {
    let setup = set_up();
    setup.deliver(
        SANTA,
        "1.eml",
        b"From: \"Mrs. \\\"Claus\\\"\" <senora@polonorte.com>\r\n\
          Message-ID: <cookies@polonorte.com>\r\n\
          \r\n\
          Milk\r\n",
    );

    let mut client = setup.connect("uidrfc82");
    quick_log_in(&mut client);
    quick_select(&mut client);

    let responses = client.command_bytes("a1 UID FETCH 1:* RFC822");
    assert_eq!(2, responses.len());
    let response = String::from_utf8(responses[0].clone()).unwrap();

    let prefix = "* 1 FETCH (UID 1 RFC822.SIZE 92 FLAGS () ENVELOPE (\"";
    assert!(response.starts_with(prefix), "Got {:?}", response);
    // The date is the current time since the message has none
    let rest = &response[prefix.len()..];
    let date_end = rest.find('"').unwrap();
    assert!(chrono::DateTime::parse_from_rfc2822(&rest[..date_end]).is_ok());
    assert_eq!(
        " NIL ((\"Mrs. \\\"Claus\\\"\" NIL \"senora\" \"polonorte.com\")) NIL \
         ((\"Mrs. \\\"Claus\\\"\" NIL \"senora\" \"polonorte.com\")) \
         NIL NIL NIL NIL \"<cookies@polonorte.com>\") RFC822 {92}\r\n\
         From: \"Mrs. \\\"Claus\\\"\" <senora@polonorte.com>\r\n\
         Message-ID: <cookies@polonorte.com>\r\n\
         \r\n\
         Milk\r\n)\r\n",
        &rest[date_end + 1..]
    );
}

#[test]
fn uid_survives_noop() {
    let setup = set_up();
    three_messages(&setup);

    let mut client = setup.connect("uidnoop");
    quick_log_in(&mut client);
    quick_select(&mut client);

    let before = client.command("a1 UID FETCH 1 (UID)");
    let responses = client.command("a2 NOOP");
    assert_eq!(vec!["a2 OK NOOP completed\r\n"], responses);
    let after = client.command("a1 UID FETCH 1 (UID)");
    assert_eq!(before, after);
}
