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
fn greeting_and_capabilities() {
    let setup = set_up();
    let mut client = setup.connect("authcapa");

    receive_line_like(&mut client, r"^\* OK IMAP4rev1 Service Ready\r\n$");

    let responses = client.command("a1 CAPABILITY");
    assert_eq!(
        vec![
            "* CAPABILITY IMAP4rev1 AUTH=PLAIN\r\n",
            "a1 OK CAPABILITY completed\r\n",
        ],
        responses
    );
}

#[test]
fn log_in_with_plain_and_hashed_secrets() {
    let setup = set_up();

    let mut client = setup.connect("authplai");
    skip_greeting(&mut client);
    let responses =
        client.command(&format!("a1 LOGIN {} {}", SANTA, SANTA_PASSWORD));
    assert_eq!(vec!["a1 OK LOGIN completed\r\n"], responses);

    let mut client = setup.connect("authhash");
    skip_greeting(&mut client);
    let responses =
        client.command(&format!("a1 login \"{}\" \"{}\"", ELF, ELF_PASSWORD));
    assert_eq!(vec!["a1 OK LOGIN completed\r\n"], responses);
}

#[test]
fn log_in_failures() {
    let setup = set_up();
    let mut client = setup.connect("authfail");
    skip_greeting(&mut client);

    let responses = client.command(&format!("a1 LOGIN {} hunter2", SANTA));
    assert_eq!(1, responses.len());
    assert_tagged_no(&responses[0]);

    let responses = client.command(&format!("a2 LOGIN {} {}", ELF, SANTA_PASSWORD));
    assert_tagged_no(&responses[0]);

    let responses = client.command("a3 LOGIN nobody@polonorte.com hohoho");
    assert_tagged_no(&responses[0]);

    // Credentials match, but the user name cannot be mapped to a directory
    let responses = client.command(&format!("a4 LOGIN {} \"red nose\"", NO_DOMAIN));
    assert_eq!(
        vec!["a4 NO User name must have the form user@domain\r\n"],
        responses
    );

    let responses = client.command("a5 LOGIN");
    assert_tagged_bad(&responses[0]);
    let responses = client.command(&format!("a6 LOGIN {}", SANTA));
    assert_tagged_bad(&responses[0]);

    // Still not logged in
    let responses = client.command("a7 SELECT INBOX");
    assert_eq!(vec!["a7 NO Must authenticate first\r\n"], responses);
}

#[test]
fn authenticate_is_refused() {
    let setup = set_up();
    let mut client = setup.connect("authauth");
    skip_greeting(&mut client);

    let responses = client.command("a1 AUTHENTICATE PLAIN");
    assert_eq!(
        vec!["a1 NO AUTHENTICATE PLAIN is not supported, use LOGIN\r\n"],
        responses
    );

    let responses = client.command("a2 AUTHENTICATE CRAM-MD5");
    assert_tagged_no(&responses[0]);

    let responses = client.command("a3 AUTHENTICATE");
    assert_tagged_bad(&responses[0]);
}

#[test]
fn commands_require_authentication() {
    let setup = set_up();
    let mut client = setup.connect("authreqd");
    skip_greeting(&mut client);

    for command in &[
        "SELECT INBOX",
        "LIST \"\" *",
        "LSUB \"\" *",
        "STATUS INBOX (MESSAGES)",
        "FETCH 1 RFC822",
        "UID FETCH 1:* (UID)",
        "STORE 1 +FLAGS (\\Seen)",
        "EXPUNGE",
        "SEARCH ALL",
    ] {
        let responses = client.command(&format!("x {}", command));
        assert_eq!(
            vec!["x NO Must authenticate first\r\n"],
            responses,
            "for {}",
            command
        );
    }

    let responses = client.command("n NOOP");
    assert_eq!(vec!["n OK NOOP completed\r\n"], responses);
}

#[test]
fn relogin_switches_account() {
    let setup = set_up();
    setup.deliver(SANTA, "1.eml", &simple_message("Santa's", "list"));
    setup.deliver(ELF, "1.eml", &simple_message("Elf's", "toys"));
    setup.deliver(ELF, "2.eml", &simple_message("Elf's", "more toys"));

    let mut client = setup.connect("authrelo");
    quick_log_in(&mut client);
    quick_select(&mut client);

    // A failed login leaves the session as it was
    let responses = client.command(&format!("a1 LOGIN {} wrong", ELF));
    assert_tagged_no(&responses[0]);
    let responses = client.command("a2 FETCH 1 BODY[TEXT]");
    assert_eq!("* 1 FETCH (BODY[TEXT] {6}\r\nlist\r\n)\r\n", responses[0]);

    let responses =
        client.command(&format!("a3 LOGIN {} {}", ELF, ELF_PASSWORD));
    assert_tagged_ok(&responses[0]);

    // Logging in again drops the selection
    let responses = client.command("a4 FETCH 1 BODY[TEXT]");
    assert_eq!(vec!["a4 NO Must select a mailbox first\r\n"], responses);

    let responses = client.command("a5 SELECT INBOX");
    assert_eq!("* 2 EXISTS\r\n", responses[1]);
}
