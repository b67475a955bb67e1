use std::io::{BufRead, Write};
use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use log::warn;

use sondeo::pipeline::split_topics;
use sondeo::RunRequest;

#[derive(Parser, Debug)]
#[command(name = "sondeo")]
#[command(about = "Collects social media posts on a topic and analyzes their sentiment")]
#[command(version)]
pub struct Cli {
    /// Path to the configuration file
    #[arg(short, long, global = true, env = "SONDEO_CONFIG")]
    pub config: Option<PathBuf>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the whole pipeline once: `run <topic>` or, with no topic, prompt for it
    Run {
        /// Topic words; a leading phase number (legacy form) is ignored
        args: Vec<String>,

        /// Items to collect per topic
        #[arg(short, long)]
        items: Option<u32>,
    },
    /// Serve the web dashboard
    Serve {
        #[arg(long, default_value = "127.0.0.1:5000")]
        addr: String,
    },
    /// Aggregate the results directory and print the report as JSON
    Aggregate {
        /// Results directory (defaults to the configured one)
        #[arg(long)]
        dir: Option<PathBuf>,
    },
}

/// Topic from `run` arguments. `run 2 ram ddr5` is the legacy form and
/// yields `ram ddr5`.
pub fn topic_from_args(args: &[String]) -> Option<String> {
    let args = match args {
        [phase, rest @ ..] if !rest.is_empty() && phase.parse::<u8>().is_ok() => {
            warn!("Phase argument '{}' is ignored, running the whole pipeline", phase);
            rest
        }
        _ => args,
    };
    let topic = args.join(" ").trim().to_string();
    (!topic.is_empty()).then_some(topic)
}

/// Asks for the item count and a comma separated topic list.
pub fn prompt_request<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
    default_items: u32,
    default_topic: Option<&str>,
) -> Result<RunRequest> {
    write!(output, "Items per topic [{}]: ", default_items)?;
    output.flush()?;
    let mut line = String::new();
    input.read_line(&mut line)?;
    let items = match line.trim() {
        "" => default_items,
        value => match value.parse::<u32>() {
            Ok(n) if n > 0 => n,
            _ => {
                warn!("Invalid item count '{}', using {}", value, default_items);
                default_items
            }
        },
    };

    match default_topic {
        Some(topic) => write!(output, "Topics, comma separated [{}]: ", topic)?,
        None => write!(output, "Topics, comma separated: ")?,
    }
    output.flush()?;
    line.clear();
    input.read_line(&mut line)?;
    let mut topics = split_topics(&line);
    if topics.is_empty() {
        match default_topic {
            Some(topic) => topics.push(topic.to_string()),
            None => bail!("No topic given"),
        }
    }

    Ok(RunRequest {
        topics,
        items_per_topic: Some(items),
    })
}
