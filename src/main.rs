// Main entry point for the csvql CLI
// This loads a delimited file and provides an interactive shell to query it

use anyhow::{Context, Result};
use clap::{Parser as ClapParser, ValueEnum};
use csvql::{LoadOptions, QueryExecutor, QueryParser, QueryResult, Table};
use log::debug;
use std::io::{self, Write};
use std::path::PathBuf;

/// csvql - query a CSV file with a small subset of SQL
#[derive(ClapParser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// CSV file to load (prompted for when omitted)
    file: Option<PathBuf>,

    /// Execute a single query and exit
    #[arg(short, long)]
    execute: Option<String>,

    /// Output format for query results
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
    format: OutputFormat,

    /// Field delimiter (a single ASCII character)
    #[arg(short, long, default_value = ",", value_parser = parse_delimiter)]
    delimiter: u8,

    /// Table name (defaults to the file name without extension)
    #[arg(short, long)]
    table: Option<String>,

    /// Trim whitespace around headers and cells
    #[arg(long)]
    trim: bool,

    /// Enable debug logging (RUST_LOG takes precedence)
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

fn parse_delimiter(s: &str) -> std::result::Result<u8, String> {
    match s.as_bytes() {
        [b] if b.is_ascii() => Ok(*b),
        _ => Err(format!("delimiter must be a single ASCII character, got {:?}", s)),
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    let interactive = args.execute.is_none();
    if interactive {
        println!("╔════════════════════════════════════════════╗");
        println!("║          csvql Interactive Shell           ║");
        println!("║     Query CSV files with a bit of SQL      ║");
        println!("╚════════════════════════════════════════════╝");
        println!();
    }

    let path = match args.file {
        Some(path) => path,
        None => prompt_for_path()?,
    };

    let options = LoadOptions {
        delimiter: args.delimiter,
        trim: args.trim,
    };
    let mut table = Table::from_csv(&path, &options)
        .with_context(|| format!("failed to load '{}'", path.display()))?;
    if let Some(name) = args.table {
        table.name = name;
    }

    let executor = QueryExecutor::new(table);

    // If a query was provided, execute it and exit
    if let Some(sql) = args.execute {
        return execute_query(&executor, &sql, args.format);
    }

    println!(
        "Loaded table '{}' ({} rows)",
        executor.table().name,
        executor.table().row_count()
    );
    println!("Type a query, '.help' for help, or 'exit' to quit");

    repl(|command| match command {
        Command::Schema => {
            print_schema(executor.table());
            Ok(())
        }
        Command::Explain(sql) => explain(sql),
        Command::Query(sql) => execute_query(&executor, sql, args.format),
        // Handled by the loop itself
        Command::Exit | Command::Help => Ok(()),
    })
}

/// One line of REPL input
#[derive(Debug, PartialEq)]
enum Command<'a> {
    Exit,
    Help,
    Schema,
    Explain(&'a str),
    Query(&'a str),
}

impl<'a> Command<'a> {
    /// Built-in commands match case-insensitively; anything else is a query
    fn parse(input: &'a str) -> Self {
        const EXPLAIN: &str = ".explain";

        let lower = input.to_ascii_lowercase();
        match lower.as_str() {
            "exit" | "quit" | ".exit" | ".quit" => Command::Exit,
            ".help" => Command::Help,
            ".schema" => Command::Schema,
            // Lowercasing ASCII keeps byte offsets, so the prefix length is valid in `input`
            _ if lower.starts_with(EXPLAIN) => Command::Explain(input[EXPLAIN.len()..].trim()),
            _ => Command::Query(input),
        }
    }
}

/// Ask for the file to load, like the interactive program always did
fn prompt_for_path() -> Result<PathBuf> {
    print!("Enter CSV file path: ");
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;

    let path = input.trim();
    if path.is_empty() {
        anyhow::bail!("no CSV file given");
    }
    Ok(PathBuf::from(path))
}

/// REPL (Read-Eval-Print Loop) implementation
///
/// Built-in commands are handled here; everything else goes to `execute_fn`.
/// An error from `execute_fn` is printed and the loop keeps going.
fn repl<F>(mut execute_fn: F) -> Result<()>
where
    F: FnMut(Command) -> Result<()>,
{
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("\nsql> ");
        stdout.flush()?;

        let mut input = String::new();
        if stdin.read_line(&mut input)? == 0 {
            // End of input
            println!();
            break;
        }

        let input = input.trim();
        if input.is_empty() {
            continue;
        }

        let command = Command::parse(input);
        match command {
            Command::Exit => {
                println!("Goodbye!");
                break;
            }
            Command::Help => {
                print_help();
                continue;
            }
            _ => {}
        }

        if let Err(e) = execute_fn(command) {
            println!("Error: {}", e);
        }
    }

    Ok(())
}

/// Run one query against the loaded table and print the result
fn execute_query(executor: &QueryExecutor, sql: &str, format: OutputFormat) -> Result<()> {
    let result = executor.run(sql)?;
    print_result(&result, format)
}

fn print_result(result: &QueryResult, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Table => println!("{}", result.format()),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&result.to_json())?),
    }
    Ok(())
}

/// Show the parsed form of a query without running it
fn explain(sql: &str) -> Result<()> {
    let query = QueryParser::parse(sql)?;
    debug!("Explaining {:?}", query);
    println!("{}", serde_json::to_string_pretty(&query)?);
    Ok(())
}

fn print_schema(table: &Table) {
    println!("Table '{}' ({} rows)", table.name, table.row_count());
    for (i, column) in table.get_schema().columns.iter().enumerate() {
        println!("  {:>3}  {}", i + 1, column);
    }
}

/// Print help information
fn print_help() {
    println!("╔════════════════════════════════════════════╗");
    println!("║                csvql Help                  ║");
    println!("╚════════════════════════════════════════════╝");
    println!();
    println!("Special Commands:");
    println!("  .help              Show this help message");
    println!("  .schema            List the columns of the loaded table");
    println!("  .explain <query>   Show how a query is parsed");
    println!("  exit, quit         Exit the shell (.exit and .quit work too)");
    println!();
    println!("Supported Queries:");
    println!();
    println!("  SELECT * FROM people");
    println!("  SELECT name, age FROM people WHERE age > 30");
    println!("  SELECT name FROM people WHERE city = 'New York'");
    println!("  SELECT COUNT(*) FROM people WHERE age >= 18");
    println!("  SELECT COUNT(email) FROM people");
    println!();
    println!("Notes:");
    println!("  - Keywords are case-insensitive; column names are not");
    println!("  - WHERE takes one condition: =, !=, <>, >, <, >=, <=");
    println!("  - Text values go in single quotes; unquoted numbers compare numerically");
    println!("  - COUNT(column) skips cells that are empty or the text NULL");
    println!();
}
