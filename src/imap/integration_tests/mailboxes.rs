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

#[test]
fn select_reports_snapshot() {
    let setup = set_up();
    for ix in 1..=3 {
        setup.deliver(
            SANTA,
            &format!("{}.eml", ix),
            &simple_message("Hi", &ix.to_string()),
        );
    }

    let mut client = setup.connect("mbxselec");
    quick_log_in(&mut client);

    let responses = client.command("a1 SELECT INBOX");
    assert_eq!(
        vec![
            "* FLAGS (\\Answered \\Flagged \\Draft \\Deleted \\Seen)\r\n",
            "* 3 EXISTS\r\n",
            "* OK [UIDVALIDITY 1] UIDs valid\r\n",
            "* OK [UIDNEXT 4] Predicted next UID\r\n",
            "a1 OK [READ-WRITE] SELECT completed\r\n",
        ],
        responses
    );

    // The snapshot was taken at login
    setup.deliver(SANTA, "4.eml", &simple_message("Late", "4"));
    let responses = client.command("a2 select \"inbox\"");
    assert_eq!("* 3 EXISTS\r\n", responses[1]);
}

#[test]
fn select_only_knows_inbox() {
    let setup = set_up();
    let mut client = setup.connect("mbxnxsel");
    quick_log_in(&mut client);

    let responses = client.command("a1 SELECT Archive");
    assert_eq!(vec!["a1 NO Folder not found\r\n"], responses);

    let responses = client.command("a2 SELECT");
    assert_tagged_bad(&responses[0]);

    let responses = client.command("a3 FETCH 1 RFC822");
    assert_eq!(vec!["a3 NO Must select a mailbox first\r\n"], responses);
}

#[test]
fn missing_directory_is_empty_mailbox() {
    let setup = set_up();
    let mut client = setup.connect("mbxempty");
    quick_log_in(&mut client);

    let responses = client.command("a1 SELECT INBOX");
    assert_eq!("* 0 EXISTS\r\n", responses[1]);
    assert_eq!("* OK [UIDNEXT 1] Predicted next UID\r\n", responses[3]);
}

#[test]
fn only_message_files_count() {
    let setup = set_up();
    setup.deliver(SANTA, "1.eml", &simple_message("a", "a"));
    setup.deliver(SANTA, "2.EML", &simple_message("b", "b"));
    setup.deliver(SANTA, "notes.txt", b"not a message");
    setup.deliver(SANTA, "eml", b"no extension");
    std::fs::create_dir(setup.user_dir(SANTA).join("sub.eml")).unwrap();

    let mut client = setup.connect("mbxfilte");
    quick_log_in(&mut client);

    let responses = client.command("a1 SELECT INBOX");
    assert_eq!("* 2 EXISTS\r\n", responses[1]);
}

#[test]
fn list_and_lsub_ignore_arguments() {
    let setup = set_up();
    let mut client = setup.connect("mbxlist");
    quick_log_in(&mut client);

    for args in &["\"\" *", "\"\" \"%\"", "foo bar", ""] {
        let responses = client.command(&format!("a1 LIST {}", args));
        assert_eq!(
            vec![
                "* LIST (\\HasNoChildren) \"/\" \"INBOX\"\r\n",
                "a1 OK LIST completed\r\n",
            ],
            responses
        );

        let responses = client.command(&format!("a2 LSUB {}", args));
        assert_eq!(
            vec![
                "* LSUB (\\HasNoChildren) \"/\" \"INBOX\"\r\n",
                "a2 OK LSUB completed\r\n",
            ],
            responses
        );
    }
}

#[test]
fn status_reports_counts() {
    let setup = set_up();
    setup.deliver(SANTA, "1.eml", &simple_message("a", "a"));
    setup.deliver(SANTA, "2.eml", &simple_message("b", "b"));

    let mut client = setup.connect("mbxstatu");
    quick_log_in(&mut client);

    // No selection needed
    let responses =
        client.command("a1 STATUS INBOX (MESSAGES UIDNEXT UNSEEN RECENT)");
    assert_eq!(
        vec![
            "* STATUS \"INBOX\" (MESSAGES 2 UIDNEXT 3 UNSEEN 0 RECENT 0)\r\n",
            "a1 OK STATUS completed\r\n",
        ],
        responses
    );

    // The name is echoed without being checked
    let responses = client.command("a2 STATUS \"Some \\\"Box\\\"\" (MESSAGES)");
    assert_eq!(
        "* STATUS \"Some \\\"Box\\\"\" (MESSAGES 2 UIDNEXT 3 UNSEEN 0 RECENT 0)\r\n",
        responses[0]
    );

    let responses = client.command("a3 STATUS INBOX");
    assert_eq!(1, responses.len());
    assert_tagged_bad(&responses[0]);
}
