//! Entry point: parses argv, builds the shared [`Context`], and dispatches
//! to the matching `cmd::*` function.

use std::process::ExitCode;

use clap::Parser;

use mport_cli::context::{Context, Verbosity};
use mport_cli::settings::{Settings, DEFAULT_CONFIG_PATH};
use mport_cli::{cmd, Cli, Commands, ConfigCommands, MirrorCommands};
use mport_schema::{MportError, PrecheckError};

fn main() -> ExitCode {
    let cli = Cli::parse();

    let verbosity = if cli.quiet {
        Verbosity::Quiet
    } else if cli.verbose {
        Verbosity::Verbose
    } else {
        Verbosity::Brief
    };
    init_tracing(verbosity);

    let config_path = std::path::PathBuf::from(DEFAULT_CONFIG_PATH);
    let settings = match Settings::load(&config_path) {
        Ok(s) => s,
        Err(err) => {
            eprintln!("error: failed to parse {}: {err}", config_path.display());
            return ExitCode::from(2);
        }
    };

    let mut ctx = match Context::open(cli.chroot.as_ref(), settings, cli.force, cli.skip_refresh, verbosity, cli.download_dir.clone()) {
        Ok(ctx) => ctx,
        Err(err) => {
            eprintln!("error: {err}");
            return ExitCode::from(2);
        }
    };

    match run(&mut ctx, cli.command, &config_path) {
        Ok(code) => ExitCode::from(u8::try_from(code).unwrap_or(2)),
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::from(exit_code_for(&err))
        }
    }
}

fn run(ctx: &mut Context, command: Commands, config_path: &std::path::Path) -> anyhow::Result<i32> {
    match command {
        Commands::Install { automatic, packages } => cmd::acquire::install(ctx, automatic, &packages),
        Commands::Add { automatic, files } => cmd::acquire::add(ctx, automatic, &files),
        Commands::Delete { packages } => cmd::remove::delete(ctx, &packages),
        Commands::Deleteall => cmd::remove::deleteall(ctx),
        Commands::Update { packages } => cmd::maintenance::update(ctx, &packages),
        Commands::Upgrade => cmd::maintenance::upgrade(ctx),
        Commands::Autoremove => cmd::maintenance::autoremove(ctx),
        Commands::Clean => cmd::maintenance::clean(ctx),
        Commands::Verify { recompute, packages } => cmd::maintenance::verify(ctx, recompute, &packages),
        Commands::Search { terms } => cmd::query::search(ctx, &terms),
        Commands::Info { package } => cmd::query::info(ctx, &package),
        Commands::List { filter } => cmd::query::list(ctx, filter.as_deref()),
        Commands::Which { quiet, origin_only, path } => cmd::query::which(ctx, quiet, origin_only, &path),
        Commands::Stats => cmd::query::stats(ctx),
        Commands::Index => cmd::mirror::refresh(ctx),
        Commands::Mirror { command } => match command {
            MirrorCommands::List => cmd::mirror::mirror_list(ctx),
            MirrorCommands::Select { country } => cmd::mirror::mirror_select(ctx, &country),
        },
        Commands::Download { with_depends, packages } => cmd::acquire::download(ctx, with_depends, &packages),
        Commands::Config { command } => match command {
            ConfigCommands::List => {
                cmd::admin::config::list(ctx);
                Ok(0)
            }
            ConfigCommands::Get { key } => cmd::admin::config::get(ctx, &key),
            ConfigCommands::Set { key, value } => cmd::admin::config::set(ctx, &key, &value, config_path),
        },
        Commands::Audit { depends_on, package } => cmd::maintenance::audit(ctx, depends_on, package.as_deref()),
        Commands::Lock { package } => cmd::admin::lock(ctx, &package),
        Commands::Unlock { package } => cmd::admin::unlock(ctx, &package),
        Commands::Locks => cmd::admin::locks(ctx),
        Commands::Cpe { package } => cmd::admin::cpe(ctx, package.as_deref()),
        Commands::Purl { package } => cmd::admin::purl(ctx, package.as_deref()),
        Commands::Import { file } => cmd::admin::import(ctx, &file),
        Commands::Export { file } => cmd::admin::export(ctx, &file),
        Commands::Version { terse, v1, v2 } => Ok(cmd::admin::version_compare(terse, &v1, &v2)),
        Commands::Completions { shell } => {
            print_completions(shell);
            Ok(0)
        }
    }
}

fn print_completions(shell: clap_complete::Shell) {
    use clap::CommandFactory;
    clap_complete::generate(shell, &mut Cli::command(), "mport", &mut std::io::stdout());
}

fn exit_code_for(err: &anyhow::Error) -> u8 {
    if let Some(mport_err) = err.downcast_ref::<MportError>() {
        return u8::try_from(mport_err.exit_code()).unwrap_or(2);
    }
    if err.downcast_ref::<PrecheckError>().is_some() {
        return 2;
    }
    2
}

fn init_tracing(verbosity: Verbosity) {
    let level = match verbosity {
        Verbosity::Quiet => tracing::Level::ERROR,
        Verbosity::Brief => tracing::Level::WARN,
        Verbosity::Verbose => tracing::Level::DEBUG,
    };
    let _ = tracing_subscriber::fmt().with_max_level(level).with_writer(std::io::stderr).try_init();
}
