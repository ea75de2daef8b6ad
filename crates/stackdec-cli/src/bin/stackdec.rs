use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

use stackdec_cli::commands::{
    config_ops, decode_ops, model_ops, server_ops, wg_ops, SearchOverrides,
};
use stackdec_cli::{init_logging_with, EXIT_ERROR};

macro_rules! die {
    ($result:expr, $($arg:tt)*) => {
        $result.unwrap_or_else(|e| {
            eprintln!($($arg)*, e);
            process::exit(EXIT_ERROR);
        })
    };
}

#[derive(Parser)]
#[command(name = "stackdec", about = "Phrase-based multi-stack decoder", version)]
struct Cli {
    /// Write JSON trace events to <dir>/stackdec-trace.jsonl (needs the
    /// `trace` feature)
    #[arg(long, global = true)]
    trace_dir: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Translate sentences, one per line
    Decode {
        /// Engine config (TOML)
        config: PathBuf,
        /// Input file (stdin when omitted or "-")
        #[arg(short, long)]
        input: Option<PathBuf>,
        /// One JSON object per sentence with status, score and alignment
        #[arg(long)]
        json: bool,
        /// Save each sentence's word graph as <dir>/<line>.wg
        #[arg(long)]
        wg_dir: Option<PathBuf>,
        #[command(flatten)]
        search: SearchOverrides,
    },
    /// Check whether each reference translation is reachable
    Verify {
        config: PathBuf,
        /// Source sentences, one per line
        source: PathBuf,
        /// Reference translations, one per line
        reference: PathBuf,
        #[command(flatten)]
        search: SearchOverrides,
    },
    /// Complete user prefixes for one sentence
    Prefix {
        config: PathBuf,
        /// Raw source sentence
        source: String,
        /// Raw prefixes, completed in turn
        prefixes: Vec<String>,
        /// Word rejected right after the prefix (repeatable)
        #[arg(long = "reject")]
        rejected: Vec<String>,
        #[command(flatten)]
        search: SearchOverrides,
    },
    /// Word graph tools
    Wg {
        #[command(subcommand)]
        command: WgCommand,
    },
    /// Model conversion and training
    Model {
        #[command(subcommand)]
        command: ModelCommand,
    },
    /// Decoder settings
    Settings {
        #[command(subcommand)]
        command: SettingsCommand,
    },
    /// Serve JSON-lines requests over TCP
    Serve {
        config: PathBuf,
        #[arg(long, default_value = "127.0.0.1:7878")]
        addr: String,
        #[arg(long, default_value = "4")]
        workers: usize,
    },
    /// Send one JSON request to a server
    Client {
        #[arg(long, default_value = "127.0.0.1:7878")]
        addr: SocketAddr,
        /// Request object, e.g. '{"op":"translate","user":1,"source":"la casa"}'
        request: String,
    },
}

#[derive(Subcommand)]
enum WgCommand {
    /// Show state, arc and final counts
    Info { file: PathBuf },
    /// Print the best path
    Best { file: PathBuf },
    /// Print the n best distinct translations
    Nbest {
        file: PathBuf,
        #[arg(short, long, default_value = "10")]
        n: usize,
    },
    /// Drop arcs far below the best arc into their state
    Prune {
        file: PathBuf,
        #[arg(long)]
        threshold: f64,
        output: PathBuf,
    },
    /// Rescore arcs under new weights ("lm 0.5 , distortion 1")
    Reweight {
        file: PathBuf,
        #[arg(long)]
        weights: String,
        output: PathBuf,
    },
}

#[derive(Subcommand)]
enum ModelCommand {
    /// Convert a phrase table to binary form
    ConvertTable { input: PathBuf, output: PathBuf },
    /// Train a language model from a corpus and save it in binary form
    ConvertLm {
        input: PathBuf,
        output: PathBuf,
        #[arg(long, default_value = "3")]
        order: usize,
        #[arg(long, default_value = "0.7")]
        lambda: f64,
    },
    /// Update the configured models from a parallel corpus
    Train {
        config: PathBuf,
        source: PathBuf,
        reference: PathBuf,
        /// Output phrase table (binary)
        table_out: PathBuf,
        /// Output language model (binary)
        lm_out: PathBuf,
    },
}

#[derive(Subcommand)]
enum SettingsCommand {
    /// Print the default settings TOML
    Export,
    /// Validate a settings file
    Validate { file: PathBuf },
}

fn main() {
    let cli = Cli::parse();
    init_logging_with(cli.trace_dir.as_deref());
    let mut stdout = io::stdout().lock();

    match cli.command {
        Command::Decode {
            config,
            input,
            json,
            wg_dir,
            search,
        } => {
            let code = die!(
                decode_ops::decode_cmd(
                    &config,
                    input.as_deref(),
                    &search,
                    json,
                    wg_dir.as_deref(),
                    &mut stdout,
                ),
                "Error: {}"
            );
            process::exit(code);
        }
        Command::Verify {
            config,
            source,
            reference,
            search,
        } => {
            let covered = die!(
                decode_ops::verify_cmd(&config, &source, &reference, &search, &mut stdout),
                "Error: {}"
            );
            eprintln!("{covered} pairs covered");
        }
        Command::Prefix {
            config,
            source,
            prefixes,
            rejected,
            search,
        } => {
            die!(
                decode_ops::prefix_cmd(&config, &source, &prefixes, &rejected, &search, &mut stdout),
                "Error: {}"
            );
        }
        Command::Wg { command } => match command {
            WgCommand::Info { file } => {
                die!(wg_ops::wg_info(&file, &mut stdout), "Error: {}");
            }
            WgCommand::Best { file } => {
                die!(wg_ops::wg_best(&file, &mut stdout), "Error: {}");
            }
            WgCommand::Nbest { file, n } => {
                die!(wg_ops::wg_nbest(&file, n, &mut stdout), "Error: {}");
            }
            WgCommand::Prune {
                file,
                threshold,
                output,
            } => {
                let flagged = die!(wg_ops::wg_prune(&file, threshold, &output), "Error: {}");
                eprintln!("{flagged} arcs pruned -> {}", output.display());
            }
            WgCommand::Reweight {
                file,
                weights,
                output,
            } => {
                die!(wg_ops::wg_reweight(&file, &weights, &output), "Error: {}");
            }
        },
        Command::Model { command } => match command {
            ModelCommand::ConvertTable { input, output } => {
                die!(model_ops::convert_phrase_table(&input, &output), "Error: {}");
            }
            ModelCommand::ConvertLm {
                input,
                output,
                order,
                lambda,
            } => {
                die!(
                    model_ops::convert_lm(&input, &output, order, lambda),
                    "Error: {}"
                );
            }
            ModelCommand::Train {
                config,
                source,
                reference,
                table_out,
                lm_out,
            } => {
                let pairs = die!(
                    model_ops::train_cmd(&config, &source, &reference, &table_out, &lm_out),
                    "Error: {}"
                );
                eprintln!("trained on {pairs} sentence pairs");
            }
        },
        Command::Settings { command } => match command {
            SettingsCommand::Export => config_ops::settings_export(),
            SettingsCommand::Validate { file } => {
                let summary = die!(config_ops::settings_validate(&file), "Error: {}");
                println!("{summary}");
            }
        },
        Command::Serve {
            config,
            addr,
            workers,
        } => {
            die!(server_ops::serve_cmd(&config, &addr, workers), "Error: {}");
        }
        Command::Client { addr, request } => {
            let response = die!(server_ops::client_request(addr, &request), "Error: {}");
            println!("{response}");
        }
    }
}
