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

use crate::account::credentials;
use crate::support::sysexits::*;

pub fn hash_password() {
    let password = match rpassword::read_password_from_tty(Some("Password: "))
    {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Failed to read password: {}", e);
            EX_IOERR.exit()
        }
    };

    if password.is_empty() {
        eprintln!("Refusing to hash an empty password");
        EX_USAGE.exit();
    }

    let confirm =
        match rpassword::read_password_from_tty(Some("Confirm password: ")) {
            Ok(p) => p,
            Err(e) => {
                eprintln!("Failed to read password: {}", e);
                EX_IOERR.exit()
            }
        };

    if password != confirm {
        eprintln!("Passwords don't match");
        EX_USAGE.exit();
    }

    match credentials::hash_password(&password) {
        Ok(hash) => println!("{}", hash),
        Err(e) => {
            eprintln!("Failed to hash password: {}", e);
            EX_SOFTWARE.exit()
        }
    }
}
