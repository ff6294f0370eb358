use std::{
    io::{self, BufRead},
    path::PathBuf,
    sync::Arc,
};

use clap::{Arg, ArgAction, Command, value_parser};
use csvdb::{
    error::Result,
    server::{ConnectionServer, ServerConfig},
    sql::engine::QueryEngine,
    storage::{cache::TableCache, source::FileSource},
};
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt};

fn main() -> Result<()> {
    let matches = Command::new("csvdb")
        .about("In-memory CSV table store with blocking queries, served over HTTP")
        .subcommand_required(true)
        .subcommand(
            Command::new("serve")
                .about("Accept queries at /sql-air?query=... and serve static files")
                .arg(
                    Arg::new("listen")
                        .long("listen")
                        .value_name("ADDR")
                        .default_value("127.0.0.1:8080")
                        .help("Listen address"),
                )
                .arg(
                    Arg::new("max-workers")
                        .long("max-workers")
                        .value_name("N")
                        .value_parser(value_parser!(usize))
                        .default_value("20")
                        .help("Maximum number of connections handled at once"),
                )
                .arg(
                    Arg::new("root")
                        .long("root")
                        .value_name("DIR")
                        .value_parser(value_parser!(PathBuf))
                        .default_value(".")
                        .help("Directory static files are served from"),
                ),
        )
        .subcommand(
            Command::new("run")
                .about("Execute statements from the arguments, or line by line from stdin")
                .arg(
                    Arg::new("execute")
                        .short('e')
                        .long("execute")
                        .value_name("STATEMENT")
                        .action(ArgAction::Append)
                        .help("Statement to execute (repeatable)"),
                ),
        )
        .get_matches();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).with_writer(io::stderr).init();

    let engine = QueryEngine::new(Arc::new(TableCache::new(FileSource::new())));

    match matches.subcommand() {
        Some(("serve", args)) => {
            let config = ServerConfig {
                addr: args.get_one::<String>("listen").cloned().unwrap_or_default(),
                max_workers: args.get_one::<usize>("max-workers").copied().unwrap_or(1),
                doc_root: args.get_one::<PathBuf>("root").cloned().unwrap_or_default(),
            };
            ConnectionServer::bind(config, engine)?.run()
        }
        Some(("run", args)) => match args.get_many::<String>("execute") {
            Some(statements) => {
                for sql in statements {
                    run(&engine, sql);
                }
                Ok(())
            }
            None => {
                info!("reading statements from stdin");
                for line in io::stdin().lock().lines() {
                    let line = line?;
                    if !line.trim().is_empty() {
                        run(&engine, &line);
                    }
                }
                Ok(())
            }
        },
        _ => Ok(()),
    }
}

/// Prints the result, or the error in the same form the server sends it
fn run(engine: &QueryEngine, sql: &str) {
    match engine.execute(sql) {
        Ok(result) => print!("{}", result),
        Err(err) => println!("Error: {}", err),
    }
}
