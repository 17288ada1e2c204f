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

use std::fmt;
use std::path::{Path, PathBuf};

use log::info;

use super::mailbox::Mailbox;
use crate::support::error::Error;
use crate::support::log_prefix::LogPrefix;

/// An authenticated user's view of the mail store.
///
/// The account `user@domain` keeps its messages in
/// `<mail_root>/<domain>/<user>/`. Nothing here creates that directory; if
/// it does not exist, the account simply has no messages.
#[derive(Clone)]
pub struct Account {
    log_prefix: LogPrefix,
    user_name: String,
    root: PathBuf,
}

impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Account({} @ {})", self.user_name, self.root.display())
    }
}

impl Account {
    /// Resolve the account for `user_name` under `mail_root`.
    ///
    /// `user_name` must contain exactly one `@`, and both halves must be
    /// usable as a single path component.
    pub fn new(
        log_prefix: LogPrefix,
        mail_root: &Path,
        user_name: &str,
    ) -> Result<Self, Error> {
        let mut parts = user_name.split('@');
        let (local, domain) = match (parts.next(), parts.next(), parts.next())
        {
            (Some(local), Some(domain), None) => (local, domain),
            _ => return Err(Error::MalformedUserName),
        };

        if !is_path_component(local) || !is_path_component(domain) {
            return Err(Error::MalformedUserName);
        }

        Ok(Account {
            log_prefix,
            user_name: user_name.to_owned(),
            root: mail_root.join(domain).join(local),
        })
    }

    pub fn user_name(&self) -> &str {
        &self.user_name
    }

    /// The part of the user name after the `@`.
    pub fn domain(&self) -> &str {
        self.user_name
            .rsplit('@')
            .next()
            .unwrap_or(&self.user_name)
    }

    /// The directory holding this account's message files.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Take a snapshot of the account's inbox.
    ///
    /// Files are considered messages if their extension matches
    /// `message_extension`, ignoring case.
    pub fn load_inbox(&self, message_extension: &str) -> Result<Mailbox, Error> {
        let mailbox = Mailbox::load(
            self.log_prefix.clone(),
            self.root.clone(),
            message_extension,
        )?;
        info!(
            "{} Loaded {} message(s) from {}",
            self.log_prefix,
            mailbox.len(),
            self.root.display()
        );
        Ok(mailbox)
    }
}

// Excludes anything that could escape `mail_root` or name a hidden file.
fn is_path_component(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('.')
        && !name.contains('/')
        && !name.contains('\\')
        && !name.contains(|c: char| c.is_control())
}
