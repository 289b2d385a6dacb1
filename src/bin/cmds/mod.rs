pub mod add;
pub mod init;
pub mod login;
pub mod logout;
pub mod package;
pub mod pull;
pub mod push;
pub mod run;
pub mod update;

use clap::{App, ArgMatches};
use kpm::err::Res;

pub type Exec = fn(&ArgMatches, bool) -> Res<String>;

pub fn subcommands() -> Vec<App<'static, 'static>> {
    vec![
        init::cli(),
        add::cli(),
        update::cli(),
        package::cli(),
        push::cli(),
        pull::cli(),
        login::cli(),
        logout::cli(),
        run::cli(),
    ]
}

pub fn execute(cmd: &str) -> Option<Exec> {
    match cmd {
        "init" => Some(init::exec),
        "add" => Some(add::exec),
        "update" => Some(update::exec),
        "package" => Some(package::exec),
        "push" => Some(push::exec),
        "pull" => Some(pull::exec),
        "login" => Some(login::exec),
        "logout" => Some(logout::exec),
        "run" => Some(run::exec),
        _ => None,
    }
}
