use clap::{App, Arg, ArgMatches, SubCommand};
use kpm::client::Client;
use kpm::config::Settings;
use kpm::err::Res;
use kpm::util::build_logger;
use std::env::current_dir;

pub fn cli() -> App<'static, 'static> {
    SubCommand::with_name("pull")
        .about("Fetches a single dependency immediately, without re-verifying the rest of the graph")
        .arg(
            Arg::with_name("source")
                .takes_value(true)
                .required(true)
                .help("`<name>[:<tag>]` or an `oci://registry/repository` URL"),
        )
        .arg(
            Arg::with_name("tag")
                .long("tag")
                .takes_value(true)
                .help("Tag to pin, if the source doesn't already specify one"),
        )
}

pub fn exec(args: &ArgMatches, verbose: bool) -> Res<String> {
    let project = current_dir()?;
    let mut client = Client::new(Settings::from_env(), build_logger(verbose))?;

    let source = args.value_of("source").unwrap();
    let tag = args.value_of("tag").map(|s| s.to_string());
    let dep = client.parse_oci_option(source, tag)?;
    let name = dep.name.clone();

    client.pull(&project, dep)?;
    Ok(format!("pulled `{}`", name))
}
