mod cmd;

use argh::FromArgs;

#[derive(FromArgs, PartialEq, Debug)]
/// Tools for working with Colony Wars: Red Sun game formats.
struct TopLevel {
    #[argh(subcommand)]
    command: SubCommand,
}

#[derive(FromArgs, PartialEq, Debug)]
#[argh(subcommand)]
pub enum SubCommand {
    Model(cmd::model::Args),
    Rsc(cmd::rsc::Args),
    Sstate(cmd::sstate::Args),
    Tim(cmd::tim::Args),
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp(None)
        .format_target(false)
        .format_level(false)
        .init();

    let args: TopLevel = argh::from_env();
    let result = match args.command {
        SubCommand::Model(args) => cmd::model::run(args),
        SubCommand::Rsc(args) => cmd::rsc::run(args),
        SubCommand::Sstate(args) => cmd::sstate::run(args),
        SubCommand::Tim(args) => cmd::tim::run(args),
    };
    if let Err(e) = result {
        eprintln!("Failed: {e:?}");
        std::process::exit(1);
    }
}
