use clap::{App, ArgMatches, SubCommand};
use kpm::client::Client;
use kpm::config::Settings;
use kpm::err::Res;
use kpm::util::build_logger;
use std::env::current_dir;

pub fn cli() -> App<'static, 'static> {
    SubCommand::with_name("init").about("Initializes a kpm project in the current directory")
}

pub fn exec(_args: &ArgMatches, verbose: bool) -> Res<String> {
    let project = current_dir()?;
    let client = Client::new(Settings::from_env(), build_logger(verbose))?;
    client.init_empty(&project)?;
    Ok(format!("initialized project at {}", project.display()))
}
