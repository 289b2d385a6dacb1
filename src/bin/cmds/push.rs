use clap::{App, Arg, ArgMatches, SubCommand};
use kpm::client::Client;
use kpm::config::Settings;
use kpm::err::Res;
use kpm::util::build_logger;
use std::collections::HashMap;
use std::env::current_dir;

pub fn cli() -> App<'static, 'static> {
    SubCommand::with_name("push")
        .about("Packages the project and pushes it to an OCI registry")
        .arg(Arg::with_name("registry").takes_value(true).required(true))
        .arg(Arg::with_name("repository").takes_value(true).required(true))
        .arg(Arg::with_name("tag").takes_value(true).required(true))
        .arg(
            Arg::with_name("annotation")
                .long("annotation")
                .short("a")
                .takes_value(true)
                .multiple(true)
                .number_of_values(1)
                .help("key=value annotation, may be repeated"),
        )
}

pub fn exec(args: &ArgMatches, verbose: bool) -> Res<String> {
    let project = current_dir()?;
    let mut client = Client::new(Settings::from_env(), build_logger(verbose))?;

    let registry = args.value_of("registry").unwrap();
    let repository = args.value_of("repository").unwrap();
    let tag = args.value_of("tag").unwrap();

    let mut annotations = HashMap::new();
    if let Some(values) = args.values_of("annotation") {
        for kv in values {
            if let Some(idx) = kv.find('=') {
                annotations.insert(kv[..idx].to_string(), kv[idx + 1..].to_string());
            }
        }
    }

    let path = client.push(&project, registry, repository, tag, annotations)?;
    Ok(format!(
        "pushed {} as {}/{}:{}",
        path.display(),
        registry,
        repository,
        tag
    ))
}
