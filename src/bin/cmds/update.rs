use clap::{App, ArgMatches, SubCommand};
use kpm::client::Client;
use kpm::config::Settings;
use kpm::err::Res;
use kpm::util::build_logger;
use std::env::current_dir;

pub fn cli() -> App<'static, 'static> {
    SubCommand::with_name("update")
        .about("Re-verifies and refetches the project's whole dependency graph")
}

pub fn exec(_args: &ArgMatches, verbose: bool) -> Res<String> {
    let project = current_dir()?;
    let mut client = Client::new(Settings::from_env(), build_logger(verbose))?;

    client.update(&project)?;
    Ok("updated dependencies".to_string())
}
