use clap::{App, Arg, ArgMatches, SubCommand};
use kpm::client::{Client, CompileOpts};
use kpm::config::Settings;
use kpm::err::Res;
use kpm::util::build_logger;
use std::env::current_dir;

pub fn cli() -> App<'static, 'static> {
    SubCommand::with_name("run")
        .about("Resolves the project's dependencies and invokes the compiler")
        .arg(
            Arg::with_name("entry")
                .multiple(true)
                .help("Entry files to compile (defaults to the manifest's entries)"),
        )
        .arg(
            Arg::with_name("vendor")
                .long("vendor")
                .help("Force vendor mode for this invocation"),
        )
}

pub fn exec(args: &ArgMatches, verbose: bool) -> Res<String> {
    let project = current_dir()?;
    let mut client = Client::new(Settings::from_env(), build_logger(verbose))?;

    let entries: Vec<String> = args
        .values_of("entry")
        .map(|v| v.map(String::from).collect())
        .unwrap_or_default();

    let opts = CompileOpts {
        vendor: if args.is_present("vendor") {
            Some(true)
        } else {
            None
        },
        entries,
    };

    client.compile_with_opts(&project, opts)
}
