use clap::{App, Arg, ArgMatches, SubCommand};
use kpm::client::Client;
use kpm::config::Settings;
use kpm::err::Res;
use kpm::util::build_logger;

pub fn cli() -> App<'static, 'static> {
    SubCommand::with_name("login")
        .about("Stores credentials for an OCI registry host")
        .arg(Arg::with_name("host").takes_value(true).required(true))
        .arg(Arg::with_name("user").takes_value(true).required(true))
        .arg(Arg::with_name("password").takes_value(true).required(true))
}

pub fn exec(args: &ArgMatches, verbose: bool) -> Res<String> {
    let client = Client::new(Settings::from_env(), build_logger(verbose))?;

    let host = args.value_of("host").unwrap();
    let user = args.value_of("user").unwrap();
    let pass = args.value_of("password").unwrap();

    client.login(host, user, pass)?;
    Ok(format!("logged in to {}", host))
}
