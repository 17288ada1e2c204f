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

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// The system-wide configuration for Inboxd.
///
/// This is stored in a file named `inboxd.toml` under the Inboxd system root,
/// which is typically `/usr/local/etc/inboxd` or `/etc/inboxd`.
#[derive(Clone, Debug, Deserialize, Serialize, Default)]
pub struct SystemConfig {
    /// Options for the listening socket.
    #[serde(default)]
    pub server: ServerConfig,

    /// Where and how messages are stored.
    #[serde(default)]
    pub storage: StorageConfig,

    /// The accounts which may log in, mapping `user@domain` to its secret.
    ///
    /// A secret starting with `$argon2` is an encoded Argon2 hash as produced
    /// by `inboxd hash-password`. Anything else is compared verbatim.
    #[serde(default)]
    pub users: BTreeMap<String, String>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// The address to listen on.
    pub listen: String,
    /// The host name to report in the greeting and logs.
    pub host_name: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            listen: "0.0.0.0:143".to_owned(),
            host_name: "localhost".to_owned(),
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageConfig {
    /// The root of the mail store.
    ///
    /// The messages of `user@domain` live in `<mail_root>/<domain>/<user>/`,
    /// one file per message. If relative, this is resolved against the
    /// system root.
    pub mail_root: PathBuf,

    /// The file extension which identifies message files in a user
    /// directory. Matched case-insensitively. Other files are ignored.
    pub message_extension: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig {
            mail_root: PathBuf::new(),
            message_extension: "eml".to_owned(),
        }
    }
}
