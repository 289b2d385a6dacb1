use clap::{App, Arg, ArgMatches, SubCommand};
use kpm::client::Client;
use kpm::config::Settings;
use kpm::err::Res;
use kpm::util::build_logger;
use std::env::current_dir;

pub fn cli() -> App<'static, 'static> {
    SubCommand::with_name("package")
        .about("Resolves the project and packages it into a distributable tar")
        .arg(
            Arg::with_name("vendor")
                .long("vendor")
                .help("Materialize dependencies under vendor/ before packaging"),
        )
}

pub fn exec(args: &ArgMatches, verbose: bool) -> Res<String> {
    let project = current_dir()?;
    let mut client = Client::new(Settings::from_env(), build_logger(verbose))?;

    let path = client.package(&project, args.is_present("vendor"))?;
    Ok(format!("created {}", path.display()))
}
