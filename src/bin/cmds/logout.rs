use clap::{App, Arg, ArgMatches, SubCommand};
use kpm::client::Client;
use kpm::config::Settings;
use kpm::err::Res;
use kpm::util::build_logger;

pub fn cli() -> App<'static, 'static> {
    SubCommand::with_name("logout")
        .about("Removes stored credentials for an OCI registry host")
        .arg(Arg::with_name("host").takes_value(true).required(true))
}

pub fn exec(args: &ArgMatches, verbose: bool) -> Res<String> {
    let client = Client::new(Settings::from_env(), build_logger(verbose))?;

    let host = args.value_of("host").unwrap();
    client.logout(host)?;
    Ok(format!("logged out of {}", host))
}
