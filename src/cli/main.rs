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

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use structopt::StructOpt;

use crate::support::sysexits::*;
use crate::support::system_config::SystemConfig;

#[derive(StructOpt)]
#[structopt(max_term_width = 80)]
enum Command {
    /// Serve IMAP over TCP, one thread per connection.
    Serve(ServeOptions),
    /// Prompt for a password and print its hash.
    ///
    /// The output is suitable for use as the secret of an entry in the
    /// `[users]` table of `inboxd.toml`.
    HashPassword,
}

#[derive(StructOpt)]
pub(super) struct ServeOptions {
    /// The directory containing `inboxd.toml` and `logging.toml`
    /// [default: /etc/inboxd or /usr/local/etc/inboxd]
    #[structopt(long, parse(from_os_str))]
    root: Option<PathBuf>,

    /// The root of the mail store, overriding `storage.mail_root`.
    ///
    /// Messages of `user@domain` are read from
    /// `<mail-storage>/<domain>/<user>/`.
    #[structopt(short = "s", long, parse(from_os_str))]
    mail_storage: Option<PathBuf>,

    /// The TCP port to listen on, overriding the port of `server.listen`.
    #[structopt(short, long)]
    port: Option<u16>,

    /// The level at which to log when writing to a terminal.
    #[structopt(long, default_value = "info")]
    log_level: log::LevelFilter,
}

pub fn main() {
    // Clap's "exit" method returns 1, but 64 (EX_USAGE) is preferable for
    // argument errors.
    let cmd = match Command::clap().get_matches_safe() {
        Ok(matches) => Command::from_clap(&matches),
        Err(e) => {
            if clap::ErrorKind::HelpDisplayed == e.kind
                || clap::ErrorKind::VersionDisplayed == e.kind
            {
                println!("{}", e.message);
                std::process::exit(0)
            } else {
                eprintln!("{}", e.message);
                EX_USAGE.exit()
            }
        }
    };

    match cmd {
        Command::Serve(options) => serve(options),
        Command::HashPassword => super::passwd::hash_password(),
    }
}

fn serve(options: ServeOptions) {
    let root = options.root.clone().unwrap_or_else(|| {
        if Path::new("/etc/inboxd/inboxd.toml").is_file() {
            "/etc/inboxd".to_owned().into()
        } else if Path::new("/usr/local/etc/inboxd/inboxd.toml").is_file() {
            "/usr/local/etc/inboxd".to_owned().into()
        } else {
            // Everything can come from the command line.
            PathBuf::from(".")
        }
    });

    let system_config_path = root.join("inboxd.toml");
    let mut system_config = if system_config_path.is_file() {
        load_system_config(&system_config_path)
    } else {
        SystemConfig::default()
    };

    if let Some(port) = options.port {
        system_config.server.listen =
            with_port(&system_config.server.listen, port);
    }

    // A path given on the command line is relative to the working
    // directory; one from the config file is relative to the root.
    let mail_root = match options.mail_storage {
        Some(mail_storage) => mail_storage,
        None if system_config.storage.mail_root.as_os_str().is_empty() => {
            eprintln!(
                "No mail storage configured; set `storage.mail_root` in\n\
                 '{}' or pass --mail-storage.",
                system_config_path.display()
            );
            EX_CONFIG.exit()
        }
        None => root.join(&system_config.storage.mail_root),
    };

    if !mail_root.is_dir() {
        eprintln!("'{}' seems to be missing", mail_root.display());
        EX_CONFIG.exit();
    }

    let mail_root = match mail_root.canonicalize() {
        Ok(mr) => mr,
        Err(e) => {
            eprintln!(
                "Unable to canonicalise '{}': {}",
                mail_root.display(),
                e
            );
            EX_IOERR.exit()
        }
    };
    system_config.storage.mail_root = mail_root;

    init_logging(&root, options.log_level);

    super::serve::serve(system_config);
}

fn load_system_config(path: &Path) -> SystemConfig {
    let mut system_config_toml = Vec::new();
    if let Err(e) = fs::File::open(path)
        .and_then(|mut f| f.read_to_end(&mut system_config_toml))
    {
        eprintln!("Error reading '{}': {}", path.display(), e);
        EX_CONFIG.exit();
    }

    match toml::from_slice(&system_config_toml) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error in config file at '{}': {}", path.display(), e);
            EX_CONFIG.exit()
        }
    }
}

/// Replace the port of `listen`, or append one if it has none.
fn with_port(listen: &str, port: u16) -> String {
    let host = match listen.rfind(':') {
        // `[::1]` has colons but no port
        Some(ix) if !listen[ix..].contains(']') => &listen[..ix],
        _ => listen,
    };

    format!("{}:{}", host, port)
}

fn init_logging(root: &Path, level: log::LevelFilter) {
    if Ok(true) == nix::unistd::isatty(2) {
        // Running interactively; ignore logging configuration and just write
        // to stderr.
        crate::init_simple_log(level);
    } else {
        let log_config_file = root.join("logging.toml");
        if log_config_file.is_file() {
            if let Err(e) = log4rs::init_file(
                &log_config_file,
                log4rs::file::Deserializers::new(),
            ) {
                eprintln!(
                    "Failed to initialise logging from '{}': {}",
                    log_config_file.display(),
                    e
                );
                EX_CONFIG.exit();
            }
        } else {
            let formatter = syslog::Formatter3164 {
                facility: syslog::Facility::LOG_MAIL,
                hostname: None,
                process: env!("CARGO_PKG_NAME").to_owned(),
                pid: nix::unistd::getpid().as_raw(),
            };

            let logger = match syslog::unix(formatter) {
                Ok(logger) => logger,
                Err(e) => {
                    eprintln!("Failed to connect to syslog: {}", e);
                    EX_OSERR.exit()
                }
            };

            if let Err(e) =
                log::set_boxed_logger(Box::new(syslog::BasicLogger::new(logger)))
                    .map(|_| log::set_max_level(log::LevelFilter::Info))
            {
                eprintln!("Failed to initialise logging: {}", e);
                EX_SOFTWARE.exit();
            }
        }
    }
}
