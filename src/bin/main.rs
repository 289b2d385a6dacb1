#[macro_use]
extern crate clap;

mod cmds;

use clap::{App, Arg};
use console::style;
use kpm::err::{Error, ErrorKind};
use std::process::exit;

fn cli() -> App<'static, 'static> {
    App::new("kpm")
        .about("Dependency resolution and acquisition engine for a configuration/DSL package manager")
        .version(crate_version!())
        .arg(
            Arg::with_name("verbose")
                .short("v")
                .long("verbose")
                .help("Emit diagnostic logging to stderr")
                .global(true),
        )
        .subcommands(cmds::subcommands())
}

fn go() -> Result<String, Error> {
    let args = cli().get_matches();
    let verbose = args.is_present("verbose");

    let (cmd, subcommand_args) = match args.subcommand() {
        (cmd, Some(args)) => (cmd, args),
        _ => {
            cli().print_help().ok();
            println!();
            return Ok(String::new());
        }
    };

    let exec = cmds::execute(cmd)
        .ok_or_else(|| ErrorKind::InvalidFlag(format!("unknown subcommand `{}`", cmd)))?;
    exec(subcommand_args, verbose)
}

fn main() {
    match go() {
        Ok(msg) => {
            if !msg.is_empty() {
                println!("{}", msg);
            }
            exit(0);
        }
        Err(e) => {
            eprintln!("{} {}", style("error:").red().bold(), e);
            exit(1);
        }
    }
}
