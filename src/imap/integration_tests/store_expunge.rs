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

fn deliver_numbered(setup: &Setup, count: u32) {
    for ix in 1..=count {
        setup.deliver(
            SANTA,
            &format!("{:02}.eml", ix),
            &simple_message("Numbered", &format!("message {}", ix)),
        );
    }
}

fn text_of(client: &mut TestClient, seqnum: u32) -> String {
    let responses = client.command(&format!("t FETCH {} BODY[TEXT]", seqnum));
    assert_eq!(2, responses.len(), "Unexpected: {:?}", responses);
    responses[0].clone()
}

fn text_response(seqnum: u32, n: u32) -> String {
    let body = format!("message {}\r\n", n);
    format!(
        "* {} FETCH (BODY[TEXT] {{{}}}\r\n{})\r\n",
        seqnum,
        body.len(),
        body
    )
}

#[test]
fn store_adds_and_removes_flags() {
    let setup = set_up();
    deliver_numbered(&setup, 2);

    let mut client = setup.connect("stoflags");
    quick_log_in(&mut client);
    quick_select(&mut client);

    let responses = client.command("a1 STORE 1 +FLAGS (\\Seen \\Flagged)");
    assert_eq!(
        vec![
            "* 1 FETCH (FLAGS (\\Flagged \\Seen))\r\n",
            "a1 OK STORE completed\r\n",
        ],
        responses
    );

    let responses = client.command("a2 STORE 1 -FLAGS (\\SEEN)");
    assert_eq!("* 1 FETCH (FLAGS (\\Flagged))\r\n", responses[0]);

    // No prefix: reported but unchanged
    let responses = client.command("a3 STORE 1 FLAGS (\\Answered)");
    assert_eq!("* 1 FETCH (FLAGS (\\Flagged))\r\n", responses[0]);

    let responses = client.command("a4 UID STORE 2 +FLAGS.SILENT ($Important)");
    assert_eq!(
        vec![
            "* 2 FETCH (FLAGS ($Important))\r\n",
            "a4 OK UID STORE completed\r\n",
        ],
        responses
    );

    // Sequence numbers need not exist
    let responses = client.command("a5 STORE 40 +FLAGS (\\Seen)");
    assert_eq!("* 40 FETCH (FLAGS (\\Seen))\r\n", responses[0]);
    let responses = client.command("a6 SELECT INBOX");
    assert_eq!("* 2 EXISTS\r\n", responses[1]);

    let responses = client.command("a7 STORE first +FLAGS (\\Seen)");
    assert_eq!(vec!["a7 BAD Invalid sequence number\r\n"], responses);
    let responses = client.command("a8 STORE");
    assert_tagged_bad(&responses[0]);
    let responses = client.command("a9 STORE 1");
    assert_eq!(vec!["a9 BAD Missing or malformed arguments\r\n"], responses);
    let responses = client.command("a10 STORE 0 +FLAGS (\\Seen)");
    assert_eq!(vec!["a10 NO No such message\r\n"], responses);
}

#[test]
fn store_deleted_removes_immediately() {
    let setup = set_up();
    deliver_numbered(&setup, 3);

    let mut client = setup.connect("stodelet");
    quick_log_in(&mut client);
    quick_select(&mut client);

    client.command("a1 STORE 3 +FLAGS (\\Seen)");
    let responses = client.command("a2 STORE 2 +FLAGS (\\Deleted)");
    assert_eq!(
        vec![
            "* 2 FETCH (FLAGS (\\Deleted))\r\n",
            "a2 OK STORE completed\r\n",
        ],
        responses
    );
    assert_eq!(vec!["01.eml", "03.eml"], setup.files(SANTA));

    let responses = client.command("a3 STATUS INBOX (MESSAGES)");
    assert_eq!(
        "* STATUS \"INBOX\" (MESSAGES 2 UIDNEXT 3 UNSEEN 0 RECENT 0)\r\n",
        responses[0]
    );

    // The old third message is now the second, and every flag is gone
    assert_eq!(text_response(2, 3), text_of(&mut client, 2));
    let responses = client.command("a4 STORE 2 +FLAGS ()");
    assert_eq!("* 2 FETCH (FLAGS ())\r\n", responses[0]);

    let responses = client.command("a5 FETCH 3 RFC822");
    assert_eq!(vec!["a5 NO No such message\r\n"], responses);
}

#[test]
fn expunge_after_noncontiguous_deletes() {
    let setup = set_up();
    deliver_numbered(&setup, 5);

    let mut client = setup.connect("stoexpun");
    quick_log_in(&mut client);
    quick_select(&mut client);

    let responses = client.command("a1 EXPUNGE");
    assert_eq!(vec!["a1 OK EXPUNGE completed\r\n"], responses);
    assert_eq!(5, setup.files(SANTA).len());

    client.command("a2 STORE 1 +FLAGS (\\Deleted)");
    // Everything shifted down by one, so this is the original fourth message
    client.command("a3 STORE 3 +FLAGS (\\Deleted)");

    // Storing \Deleted already removed both; nothing is left flagged
    let responses = client.command("a4 EXPUNGE");
    assert_eq!(vec!["a4 OK EXPUNGE completed\r\n"], responses);

    assert_eq!(vec!["02.eml", "03.eml", "05.eml"], setup.files(SANTA));
    assert_eq!(text_response(1, 2), text_of(&mut client, 1));
    assert_eq!(text_response(2, 3), text_of(&mut client, 2));
    assert_eq!(text_response(3, 5), text_of(&mut client, 3));
}

#[test]
fn three_message_scenario() {
    let setup = set_up();
    deliver_numbered(&setup, 3);

    let mut client = setup.connect("stoscena");
    quick_log_in(&mut client);
    let responses = client.command("a1 SELECT INBOX");
    assert_eq!("* 3 EXISTS\r\n", responses[1]);

    client.command("a2 STORE 2 +FLAGS (\\Deleted)");
    let responses = client.command("a3 EXPUNGE");
    assert_tagged_ok(&responses[0]);

    let responses = client.command("a4 STATUS INBOX (MESSAGES)");
    assert_eq!(
        "* STATUS \"INBOX\" (MESSAGES 2 UIDNEXT 3 UNSEEN 0 RECENT 0)\r\n",
        responses[0]
    );
    assert_eq!(text_response(2, 3), text_of(&mut client, 2));
}

#[test]
fn deleted_file_already_gone() {
    let setup = set_up();
    deliver_numbered(&setup, 2);

    let mut client = setup.connect("stogone");
    quick_log_in(&mut client);
    quick_select(&mut client);

    std::fs::remove_file(setup.user_dir(SANTA).join("01.eml")).unwrap();
    let responses = client.command("a1 STORE 1 +FLAGS (\\Deleted)");
    assert_tagged_ok(&responses[1]);

    let responses = client.command("a2 SELECT INBOX");
    assert_eq!("* 1 EXISTS\r\n", responses[1]);
    assert_eq!(text_response(1, 2), text_of(&mut client, 1));
}
