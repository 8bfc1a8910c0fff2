use anyhow::Context;
use clap::{Parser, Subcommand};
use graphdef_convert::{GraphConverter, OutputFormat};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

pub type Result<T> = anyhow::Result<T>;

#[derive(Parser)]
#[command(name = "graphdef-convert")]
#[command(about = "Convert TensorFlow GraphDef protobufs between text and binary", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a text-format GraphDef and write it out (binary unless --as-text).
    Convert {
        #[arg(short = 'i', long, default_value = "graph.pbtxt")]
        input: PathBuf,

        #[arg(short = 'o', long, default_value = "graph.pb")]
        out: PathBuf,

        /// Write canonical text format instead of binary.
        #[arg(long)]
        as_text: bool,
    },

    /// Decode a binary GraphDef and print it in text format.
    Dump {
        #[arg(short = 'i', long, default_value = "graph.pb")]
        input: PathBuf,

        /// Write to a file instead of stdout.
        #[arg(short = 'o', long)]
        out: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let converter = GraphConverter::new();

    match cli.cmd {
        Commands::Convert {
            input,
            out,
            as_text,
        } => {
            let format = if as_text {
                OutputFormat::Text
            } else {
                OutputFormat::Binary
            };
            let graph = converter
                .convert(&input, &out, format)
                .with_context(|| format!("convert {} -> {}", input.display(), out.display()))?;
            info!(nodes = graph.node.len(), ?format, "conversion finished");
            println!("Wrote {}", out.display());
        }
        Commands::Dump { input, out } => {
            let graph = converter
                .read_binary(&input)
                .with_context(|| format!("dump {}", input.display()))?;
            match out {
                Some(out) => {
                    converter
                        .write_text(&graph, &out)
                        .with_context(|| format!("write {}", out.display()))?;
                    println!("Wrote {}", out.display());
                }
                None => print!("{}", converter.serialize_text(&graph)),
            }
        }
    }

    Ok(())
}
