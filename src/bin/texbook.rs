//! texbook - render a LaTeX book to HTML or Quarto

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgAction, Parser};
use tracing::Level;

use texbook::{Book, Config, Report, Target};

#[derive(Parser)]
#[command(name = "texbook")]
#[command(version, about = "Render a LaTeX book to HTML or Quarto pages", long_about = None)]
#[command(after_help = "EXAMPLES:
    texbook                       Render every chapter described by ./book.toml
    texbook -t quarto -o quarto   Write a Quarto book project to ./quarto
    texbook 3 4                   Render only chapters 3 and 4")]
struct Cli {
    /// Book configuration file
    #[arg(short, long, value_name = "FILE", default_value = "book.toml")]
    config: PathBuf,

    /// Output flavor (html or quarto), overriding the config
    #[arg(short, long)]
    target: Option<Target>,

    /// Output directory, overriding the config
    #[arg(short, long, value_name = "DIR")]
    out: Option<PathBuf>,

    /// Render chapters on a thread pool
    #[arg(long)]
    parallel: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// Chapter ordinals to render; all when omitted
    #[arg(value_name = "CHAPTER")]
    chapters: Vec<usize>,
}

fn level(verbosity: u8) -> Level {
    match verbosity {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .without_time()
        .with_writer(std::io::stderr)
        .with_max_level(level(cli.verbose))
        .init();

    match run(&cli) {
        Ok(report) => {
            summarize(&report);
            if report.is_success() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> texbook::Result<Report> {
    let mut config = Config::load(&cli.config)?;
    if let Some(target) = cli.target {
        config.target = target;
    }
    if let Some(out) = &cli.out {
        config.out_dir = out.clone();
    }
    if cli.parallel {
        config.parallel = true;
    }

    let book = Book::open(config)?;
    book.render(&cli.chapters)
}

fn summarize(report: &Report) {
    for chapter in &report.chapters {
        println!("Wrote {}", chapter.output.display());
    }
    for chapter in report.with_diagnostics() {
        println!("Chapter {}:", chapter.ordinal);
        for diagnostic in chapter.diagnostics.iter() {
            println!("  {diagnostic}");
        }
    }
    for (ordinal, error) in &report.failures {
        eprintln!("error: chapter {ordinal}: {error}");
    }
    for path in &report.index_files {
        println!("Wrote {}", path.display());
    }
}
