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

use log::warn;
use rand::{rngs::OsRng, Rng};

use crate::support::error::Error;

/// The table of users permitted to log in.
///
/// Each user maps to a secret, which is either an encoded Argon2 hash
/// (recognised by its `$argon2` prefix) or a plain password compared
/// verbatim.
#[derive(Clone, Debug, Default)]
pub struct Credentials {
    users: BTreeMap<String, String>,
}

impl Credentials {
    pub fn new(users: BTreeMap<String, String>) -> Self {
        Credentials { users }
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    /// Return whether `password` is the secret of `user_name`.
    ///
    /// Unknown users never verify. A stored hash which cannot be decoded is
    /// logged and treated as a mismatch.
    pub fn verify(&self, user_name: &str, password: &str) -> bool {
        let secret = match self.users.get(user_name) {
            Some(secret) => secret,
            None => return false,
        };

        match check_secret(secret, password) {
            Ok(matches) => matches,
            Err(e) => {
                warn!("Unusable secret configured for {}: {}", user_name, e);
                false
            }
        }
    }
}

fn check_secret(secret: &str, password: &str) -> Result<bool, Error> {
    if secret.starts_with("$argon2") {
        argon2::verify_encoded(secret, password.as_bytes())
            .map_err(|_| Error::BadCredentialHash)
    } else {
        Ok(secret == password)
    }
}

/// Produce an encoded Argon2 hash of `password` suitable for the `[users]`
/// table of the configuration.
pub fn hash_password(password: &str) -> Result<String, Error> {
    let salt: [u8; 16] = OsRng.gen();
    let config = argon2::Config {
        mem_cost: 4096,
        time_cost: 3,
        lanes: 1,
        thread_mode: argon2::ThreadMode::Sequential,
        variant: argon2::Variant::Argon2i,
        version: argon2::Version::Version13,
        ..argon2::Config::default()
    };
    Ok(argon2::hash_encoded(password.as_bytes(), &salt, &config)?)
}
