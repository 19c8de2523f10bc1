use arbor_query::cli::{self, CliError, RunOptions};
use arbor_query::{ResponseFormat, ResponseShape};
use clap::{Parser as ClapParser, Subcommand};
use std::io::{self, Read};
use tracing_subscriber::EnvFilter;

#[derive(ClapParser)]
#[command(name = "arbor")]
#[command(about = "Arbor - filter and project JSON records with hierarchical query documents")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate a query document against a JSON object of records
    Run {
        /// The query document (JSON)
        query: String,

        /// Records JSON (reads from stdin if not provided)
        #[arg(short, long)]
        input: Option<String>,

        /// Variables JSON object
        #[arg(long)]
        variables: Option<String>,

        /// Return projected results or the matching records
        #[arg(short, long, value_enum, default_value = "results")]
        format: ResponseFormat,

        /// Assemble the response as an object, an array or a single record
        #[arg(short, long, value_enum, default_value = "object")]
        shape: ResponseShape,

        /// Pretty-print the output
        #[arg(short, long)]
        pretty: bool,
    },

    /// Build a query document and print a summary of it
    Check {
        /// The query document (JSON)
        query: String,
    },
}

fn main() {
    let filter = EnvFilter::try_from_env("ARBOR_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run {
            query,
            input,
            variables,
            format,
            shape,
            pretty,
        } => run(
            RunOptions {
                query,
                input,
                variables,
                format,
                shape,
            },
            pretty,
        ),
        Commands::Check { query } => cli::execute_check(&query).map(|summary| println!("{}", summary)),
    };

    if let Err(e) = result {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}

fn run(mut options: RunOptions, pretty: bool) -> Result<(), CliError> {
    if options.input.is_none() && !atty::is(atty::Stream::Stdin) {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        options.input = Some(buffer);
    }

    let output = cli::execute_run(&options)?;
    let json = if pretty {
        arbor_query::to_json_pretty(&output)
    } else {
        arbor_query::to_json(&output)
    };
    println!("{}", json);
    Ok(())
}
