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
use std::convert::TryFrom;
use std::sync::Arc;

use chrono::prelude::*;
use log::{error, info, warn};

use super::response::*;
use super::syntax as s;
use crate::account::{
    account::Account, credentials::Credentials, mailbox::Mailbox, model::*,
};
use crate::mime::{envelope::Envelope, message::Message};
use crate::support::{
    error::Error, log_prefix::LogPrefix, system_config::SystemConfig,
};

macro_rules! map_error {
    ($this:expr) => {{
        let log_prefix = &$this.log_prefix;
        move |e| catch_all_error_handling(log_prefix, e)
    }};

    ($this:expr, $($($kind:ident)|+ => ($cond:ident, $code:expr),)+) => {{
        let log_prefix = &$this.log_prefix;
        move |e| match e {
            $($(Error::$kind)|* => Response::Cond(CondResponse {
                cond: RespCondType::$cond,
                code: $code,
                quip: Some(Cow::Owned(e.to_string())),
            }),)*
            e => catch_all_error_handling(log_prefix, e),
        }
    }};
}

// A macro rather than a method so that only the `inbox` field is borrowed.
macro_rules! inbox {
    ($this:expr) => {
        $this.inbox.as_mut().ok_or_else(|| must_authenticate())
    };
}

/// Where the session is in the protocol's state machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum SessionState {
    NotAuthenticated,
    Authenticated,
    Selected,
}

/// Receives parsed command lines and emits responses.
///
/// Each instance is one client session. It owns the session's snapshot of
/// the inbox, which is taken at login and only changed by the session's own
/// `STORE` and `EXPUNGE` commands.
pub struct CommandProcessor {
    log_prefix: LogPrefix,
    system_config: Arc<SystemConfig>,
    credentials: Arc<Credentials>,

    account: Option<Account>,
    inbox: Option<Mailbox>,
    selected: bool,

    logged_out: bool,
}

type CmdResult = Result<Response<'static>, Response<'static>>;

type PartialResult<T> = Result<T, Response<'static>>;

/// Function used to send untagged responses before the tagged completion.
pub type SendResponse<'a> = &'a (dyn Send + Sync + Fn(Response<'_>));

impl CommandProcessor {
    pub fn new(
        log_prefix: LogPrefix,
        system_config: Arc<SystemConfig>,
        credentials: Arc<Credentials>,
    ) -> Self {
        CommandProcessor {
            log_prefix,
            system_config,
            credentials,

            account: None,
            inbox: None,
            selected: false,

            logged_out: false,
        }
    }

    pub fn log_prefix(&self) -> &LogPrefix {
        &self.log_prefix
    }

    /// Whether `LOGOUT` has completed, after which the connection is to be
    /// closed.
    pub fn logged_out(&self) -> bool {
        self.logged_out
    }

    pub fn state(&self) -> SessionState {
        if self.inbox.is_none() {
            SessionState::NotAuthenticated
        } else if !self.selected {
            SessionState::Authenticated
        } else {
            SessionState::Selected
        }
    }

    pub fn greet(&self) -> ResponseLine<'static> {
        ResponseLine {
            tag: None,
            response: Response::Cond(CondResponse {
                cond: RespCondType::Ok,
                code: None,
                quip: Some(Cow::Borrowed("IMAP4rev1 Service Ready")),
            }),
        }
    }

    /// Handle one command line.
    ///
    /// `sender` is called with each untagged response, in order. Returns the
    /// tagged completion.
    pub fn handle_command<'a>(
        &mut self,
        command_line: s::CommandLine<'a>,
        sender: SendResponse<'_>,
    ) -> ResponseLine<'a> {
        let res = self
            .check_state(command_line.verb)
            .and_then(|()| self.dispatch(command_line, sender));

        let res = match res {
            Ok(res) => res,
            Err(res) => res,
        };

        ResponseLine {
            tag: Some(Cow::Borrowed(command_line.tag)),
            response: res,
        }
    }

    fn check_state(&self, verb: s::Verb<'_>) -> PartialResult<()> {
        let required = match verb {
            s::Verb::Capability
            | s::Verb::Authenticate
            | s::Verb::LogIn
            | s::Verb::LogOut
            | s::Verb::Noop
            | s::Verb::Unknown(_)
            | s::Verb::UnknownUid(_) => SessionState::NotAuthenticated,

            s::Verb::Select
            | s::Verb::List
            | s::Verb::Lsub
            | s::Verb::Status => SessionState::Authenticated,

            s::Verb::Fetch
            | s::Verb::UidFetch
            | s::Verb::Store
            | s::Verb::UidStore
            | s::Verb::Expunge
            | s::Verb::Search => SessionState::Selected,
        };

        let current = self.state();
        if current >= required {
            Ok(())
        } else if SessionState::NotAuthenticated == current {
            Err(must_authenticate())
        } else {
            Err(no("Must select a mailbox first"))
        }
    }

    fn dispatch(
        &mut self,
        command_line: s::CommandLine<'_>,
        sender: SendResponse<'_>,
    ) -> CmdResult {
        let args = command_line.args;
        match command_line.verb {
            s::Verb::Capability => self.cmd_capability(sender),
            s::Verb::Authenticate => self.cmd_authenticate(args),
            s::Verb::LogIn => self.cmd_log_in(args),
            s::Verb::LogOut => self.cmd_log_out(sender),
            s::Verb::Noop => completed("NOOP"),
            s::Verb::Select => self.cmd_select(args, sender),
            s::Verb::List => self.cmd_list(sender),
            s::Verb::Lsub => self.cmd_lsub(sender),
            s::Verb::Status => self.cmd_status(args, sender),
            s::Verb::Fetch => self.cmd_fetch(args, sender),
            s::Verb::UidFetch => self.cmd_uid_fetch(args, sender),
            s::Verb::Store => self.cmd_store("STORE", args, sender),
            s::Verb::UidStore => self.cmd_store("UID STORE", args, sender),
            s::Verb::Expunge => self.cmd_expunge(),
            s::Verb::Search => self.cmd_search(sender),
            s::Verb::Unknown("") => Err(bad("Missing command")),
            s::Verb::UnknownUid("") => Err(bad("Missing UID command")),
            s::Verb::Unknown(verb) => Err(bad(format!(
                "Unrecognised command {}",
                sanitise_echo(verb)
            ))),
            s::Verb::UnknownUid(sub) => Err(bad(format!(
                "Unrecognised UID command {}",
                sanitise_echo(sub)
            ))),
        }
    }

    fn cmd_capability(&mut self, sender: SendResponse<'_>) -> CmdResult {
        sender(Response::Capability);
        completed("CAPABILITY")
    }

    fn cmd_authenticate(&mut self, args: &str) -> CmdResult {
        let (mechanism, _) = s::split_token(args);
        if mechanism.is_empty() {
            Err(missing_arguments())
        } else if mechanism.eq_ignore_ascii_case("PLAIN") {
            Err(no("AUTHENTICATE PLAIN is not supported, use LOGIN"))
        } else {
            Err(no("Unsupported authentication mechanism"))
        }
    }

    fn cmd_log_in(&mut self, args: &str) -> CmdResult {
        let (user_name, password) =
            s::parse_log_in(args).ok_or_else(missing_arguments)?;

        if !self.credentials.verify(&user_name, &password) {
            info!(
                "{} Rejected login for {:?}",
                self.log_prefix,
                sanitise_echo(&user_name)
            );
            return Err(no("LOGIN failed: bad user name or password"));
        }

        let account = Account::new(
            self.log_prefix.clone(),
            &self.system_config.storage.mail_root,
            &user_name,
        )
        .map_err(map_error! {
            self,
            MalformedUserName => (No, None),
        })?;

        self.log_prefix.set_user(user_name);
        let inbox = match account
            .load_inbox(&self.system_config.storage.message_extension)
        {
            Ok(inbox) => inbox,
            Err(e) => {
                match self.account {
                    Some(ref previous) => {
                        self.log_prefix.set_user(previous.user_name().to_owned())
                    }
                    None => self.log_prefix.clear_user(),
                }
                return Err(catch_all_error_handling(&self.log_prefix, e));
            }
        };

        info!("{} Login successful", self.log_prefix);
        self.account = Some(account);
        self.inbox = Some(inbox);
        self.selected = false;
        completed("LOGIN")
    }

    fn cmd_log_out(&mut self, sender: SendResponse<'_>) -> CmdResult {
        sender(Response::Cond(CondResponse {
            cond: RespCondType::Bye,
            code: None,
            quip: Some(Cow::Borrowed("IMAP4rev1 Server logging out")),
        }));
        self.logged_out = true;
        completed("LOGOUT")
    }

    fn cmd_select(&mut self, args: &str, sender: SendResponse<'_>) -> CmdResult {
        let name = s::parse_mailbox(args).ok_or_else(missing_arguments)?;
        if !name.eq_ignore_ascii_case(INBOX) {
            return Err(no("Folder not found"));
        }

        let count = message_count(inbox!(self)?);
        sender(Response::Flags(Cow::Borrowed(ADVERTISED_FLAGS)));
        sender(Response::Exists(count));
        sender(Response::Cond(CondResponse {
            cond: RespCondType::Ok,
            code: Some(RespTextCode::UidValidity(1)),
            quip: Some(Cow::Borrowed("UIDs valid")),
        }));
        sender(Response::Cond(CondResponse {
            cond: RespCondType::Ok,
            code: Some(RespTextCode::UidNext(count.saturating_add(1))),
            quip: Some(Cow::Borrowed("Predicted next UID")),
        }));

        self.selected = true;
        Ok(Response::Cond(CondResponse {
            cond: RespCondType::Ok,
            code: Some(RespTextCode::ReadWrite),
            quip: Some(Cow::Borrowed("SELECT completed")),
        }))
    }

    // The reference and pattern arguments of LIST and LSUB are ignored;
    // there is only ever the one mailbox.
    fn cmd_list(&mut self, sender: SendResponse<'_>) -> CmdResult {
        sender(Response::List(MailboxList::inbox()));
        completed("LIST")
    }

    fn cmd_lsub(&mut self, sender: SendResponse<'_>) -> CmdResult {
        sender(Response::Lsub(MailboxList::inbox()));
        completed("LSUB")
    }

    fn cmd_status(&mut self, args: &str, sender: SendResponse<'_>) -> CmdResult {
        let (mailbox, _) =
            s::parse_status(args).ok_or_else(missing_arguments)?;
        let count = message_count(inbox!(self)?);

        sender(Response::Status(StatusResponse {
            mailbox: Cow::Owned(mailbox),
            messages: count,
            uid_next: count.saturating_add(1),
            unseen: 0,
            recent: 0,
        }));
        completed("STATUS")
    }

    fn cmd_fetch(&mut self, args: &str, sender: SendResponse<'_>) -> CmdResult {
        let (seq, items) =
            s::parse_sequence_and_items(args).ok_or_else(missing_arguments)?;
        let seqnum = parse_seqnum(seq)?;
        let log_prefix = &self.log_prefix;
        let inbox = inbox!(self)?;
        let raw = inbox.read(seqnum).map_err(|e| match e {
            Error::NxMessage => no(e.to_string()),
            e => {
                warn!(
                    "{} Failed to read message {}: {}",
                    log_prefix, seqnum, e
                );
                no(format!("Error reading message: {}", e))
            }
        })?;

        let section = s::FetchSection::of(items);
        let data = match section {
            s::FetchSection::Rfc822 | s::FetchSection::Body => {
                Cow::Borrowed(&raw[..])
            }
            s::FetchSection::Header => {
                Cow::Owned(Message::parse(&raw).header_block())
            }
            s::FetchSection::Text => {
                Cow::Owned(Message::parse(&raw).text().into_bytes())
            }
        };

        sender(Response::Fetch(FetchResponse {
            seqnum,
            atts: vec![MsgAtt::Literal {
                name: Cow::Borrowed(section.name()),
                data,
            }],
        }));
        completed("FETCH")
    }

    fn cmd_uid_fetch(
        &mut self,
        args: &str,
        sender: SendResponse<'_>,
    ) -> CmdResult {
        let (seq, items) =
            s::parse_sequence_and_items(args).ok_or_else(missing_arguments)?;
        let range = s::UidRange::parse(seq);
        let items = s::UidFetchItems::parse(items);

        let domain = self
            .account
            .as_ref()
            .map(|a| a.domain().to_owned())
            .unwrap_or_default();
        let log_prefix = &self.log_prefix;
        let inbox = inbox!(self)?;
        let max = message_count(inbox);

        for seqnum in inbox.seqnums() {
            let uid = seqnum.get();
            if !range.contains(uid, max) {
                continue;
            }

            let wants_content = items
                .attrs
                .intersects(s::FetchAttrs::HEADER_FIELDS | s::FetchAttrs::RFC822);
            let raw = if wants_content {
                inbox.read(seqnum).unwrap_or_else(|e| {
                    warn!(
                        "{} Failed to read message {}: {}",
                        log_prefix, seqnum, e
                    );
                    Vec::new()
                })
            } else {
                Vec::new()
            };

            let atts = if !wants_content {
                vec![MsgAtt::Uid(uid), MsgAtt::Flags(vec![])]
            } else {
                let message = Message::parse(&raw);
                let envelope =
                    Box::new(Envelope::of(&message, uid, &domain));

                if items.attrs.contains(s::FetchAttrs::HEADER_FIELDS) {
                    vec![
                        MsgAtt::Uid(uid),
                        MsgAtt::Rfc822Size(message.size()),
                        MsgAtt::Flags(vec![]),
                        MsgAtt::InternalDate(placeholder_internal_date()),
                        MsgAtt::Envelope(envelope),
                        MsgAtt::Literal {
                            name: Cow::Owned(items.header_fields_name()),
                            data: Cow::Owned(message.header_fields(
                                &items.header_fields,
                                items.header_fields_not,
                            )),
                        },
                    ]
                } else {
                    vec![
                        MsgAtt::Uid(uid),
                        MsgAtt::Rfc822Size(message.size()),
                        MsgAtt::Flags(vec![]),
                        MsgAtt::Envelope(envelope),
                        MsgAtt::Literal {
                            name: Cow::Borrowed("RFC822"),
                            data: Cow::Borrowed(&raw[..]),
                        },
                    ]
                }
            };

            sender(Response::Fetch(FetchResponse { seqnum, atts }));
        }

        completed("UID FETCH")
    }

    fn cmd_store(
        &mut self,
        verb: &'static str,
        args: &str,
        sender: SendResponse<'_>,
    ) -> CmdResult {
        let (seq, rest) = s::split_token(args);
        if seq.is_empty() {
            return Err(missing_arguments());
        }

        if rest.trim().is_empty() {
            return Err(missing_arguments());
        }

        let seqnum = parse_seqnum(seq)?;
        let (op, flags) = s::parse_store(rest);
        let response = inbox!(self)?.store(seqnum, op, &flags);

        sender(Response::Fetch(FetchResponse {
            seqnum,
            atts: vec![MsgAtt::Flags(response.flags)],
        }));
        completed(verb)
    }

    fn cmd_expunge(&mut self) -> CmdResult {
        let expunged = inbox!(self)?.expunge();
        info!(
            "{} Expunged {} message(s)",
            self.log_prefix,
            expunged.len()
        );
        completed("EXPUNGE")
    }

    // Search criteria are not evaluated; the result is always the same.
    fn cmd_search(&mut self, sender: SendResponse<'_>) -> CmdResult {
        sender(Response::Search(vec![1, 2, 3]));
        completed("SEARCH")
    }
}

fn message_count(inbox: &Mailbox) -> u32 {
    u32::try_from(inbox.len()).unwrap_or(u32::MAX)
}

/// Parse a single sequence number.
///
/// Anything that is not a number is `BAD`. A number which cannot name a
/// message at all (zero, negative, too large) is `NO`, the same as one past
/// the end of the mailbox.
fn parse_seqnum(seq: &str) -> PartialResult<Seqnum> {
    let digits = if seq.starts_with('-') { &seq[1..] } else { seq };
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(bad("Invalid sequence number"));
    }

    if seq.starts_with('-') {
        return Err(no(Error::NxMessage.to_string()));
    }

    seq.parse::<u32>()
        .ok()
        .and_then(Seqnum::of)
        .ok_or_else(|| no(Error::NxMessage.to_string()))
}

fn placeholder_internal_date() -> DateTime<FixedOffset> {
    FixedOffset::east(0).ymd(2020, 1, 1).and_hms(0, 0, 0)
}

// Keeps echoed client text short and on one line.
fn sanitise_echo(s: &str) -> String {
    s.chars().filter(|c| !c.is_control()).take(64).collect()
}

fn completed(verb: &'static str) -> CmdResult {
    Ok(Response::Cond(CondResponse {
        cond: RespCondType::Ok,
        code: None,
        quip: Some(Cow::Owned(format!("{} completed", verb))),
    }))
}

fn no(quip: impl Into<Cow<'static, str>>) -> Response<'static> {
    Response::Cond(CondResponse {
        cond: RespCondType::No,
        code: None,
        quip: Some(quip.into()),
    })
}

fn bad(quip: impl Into<Cow<'static, str>>) -> Response<'static> {
    Response::Cond(CondResponse {
        cond: RespCondType::Bad,
        code: None,
        quip: Some(quip.into()),
    })
}

fn must_authenticate() -> Response<'static> {
    no("Must authenticate first")
}

fn missing_arguments() -> Response<'static> {
    bad("Missing or malformed arguments")
}

fn catch_all_error_handling(
    log_prefix: &LogPrefix,
    e: Error,
) -> Response<'static> {
    error!("{} Unhandled internal error: {}", log_prefix, e);
    no(format!("Internal error: {}", e))
}
