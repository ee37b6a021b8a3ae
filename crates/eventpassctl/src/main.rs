/*
 *  Copyright 2025 Eventpass Developers
 *
 *  Licensed under the Apache License, Version 2.0 (the "License");
 *  you may not use this file except in compliance with the License.
 *  You may obtain a copy of the License at
 *
 *      http://www.apache.org/licenses/LICENSE-2.0
 *
 *  Unless required by applicable law or agreed to in writing, software
 *  distributed under the License is distributed on an "AS IS" BASIS,
 *  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 *  See the License for the specific language governing permissions and
 *  limitations under the License.
 */

//! eventpassctl - Command-line interface for issuing and verifying event passes.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod commands;
mod config;

/// Issue, verify and inspect signed event passes
#[derive(Parser)]
#[command(name = "eventpassctl")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file (can also be set via EVENTPASS_CONFIG)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only log errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Issue a single pass
    Issue {
        /// Attendee name printed on the pass
        #[arg(long)]
        name: String,

        /// Event name
        #[arg(long)]
        event: String,

        /// Ticket type, e.g. "VIP"
        #[arg(long, default_value = "General Admission")]
        ticket_type: String,

        /// Serial number; derived from --event-id and --attendee-id when omitted
        #[arg(long)]
        serial: Option<String>,

        /// Event identifier used to derive the serial number
        #[arg(long, requires = "attendee_id", conflicts_with = "serial")]
        event_id: Option<u64>,

        /// Attendee identifier used to derive the serial number
        #[arg(long, requires = "event_id", conflicts_with = "serial")]
        attendee_id: Option<u64>,

        /// PNG icon image
        #[arg(long)]
        icon: PathBuf,

        /// PNG logo image
        #[arg(long)]
        logo: PathBuf,

        /// Output archive path [default: <serial>.pkpass]
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Replace an existing file at the output path
        #[arg(long)]
        overwrite: bool,

        /// Write the signing certificate (PEM) to this path
        #[arg(long)]
        certificate_out: Option<PathBuf>,
    },

    /// Issue every pass listed in a batch file
    Batch {
        /// TOML batch file
        file: PathBuf,

        /// Directory for the archives [default: batch file's output_dir]
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Replace existing archives
        #[arg(long)]
        overwrite: bool,
    },

    /// Verify an archive against an issuer certificate
    Verify {
        /// Pass archive
        archive: PathBuf,

        /// Issuer certificate (PEM)
        #[arg(long)]
        certificate: PathBuf,
    },

    /// Show the contents of an archive
    Inspect {
        /// Pass archive
        archive: PathBuf,

        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Human)]
        format: OutputFormat,
    },

    /// Manage the persistent signing identity
    Identity {
        #[command(subcommand)]
        command: IdentityCommands,
    },

    /// Print the serial number derived from attendee and event identifiers
    DeriveSerial {
        /// Attendee name
        #[arg(long)]
        name: String,

        /// Event identifier
        #[arg(long)]
        event_id: u64,

        /// Attendee identifier
        #[arg(long)]
        attendee_id: u64,
    },
}

#[derive(Subcommand)]
pub enum IdentityCommands {
    /// Generate a new identity in the store directory
    Init {
        /// Replace an existing identity
        #[arg(long)]
        force: bool,
    },
    /// Show the stored identity
    Show,
    /// Write the stored certificate (PEM) for distribution to verifiers
    ExportCertificate {
        /// Destination PEM file
        #[arg(short, long)]
        output: PathBuf,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Human,
    Json,
}

fn init_tracing(cli: &Cli) {
    let filter = if cli.quiet {
        EnvFilter::new("error")
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is fine.
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(&cli);

    match cli.command {
        Commands::Issue {
            name,
            event,
            ticket_type,
            serial,
            event_id,
            attendee_id,
            icon,
            logo,
            output,
            overwrite,
            certificate_out,
        } => {
            let args = commands::issue::IssueArgs {
                name,
                event,
                ticket_type,
                serial,
                event_id,
                attendee_id,
                icon,
                logo,
                output,
                overwrite,
                certificate_out,
            };
            commands::issue::run(cli.config.as_deref(), args).await?;
        }
        Commands::Batch {
            file,
            output_dir,
            overwrite,
        } => {
            commands::batch::run(cli.config.as_deref(), &file, output_dir, overwrite).await?;
        }
        Commands::Verify {
            archive,
            certificate,
        } => {
            commands::verify::run(&archive, &certificate)?;
        }
        Commands::Inspect { archive, format } => {
            commands::inspect::run(&archive, format)?;
        }
        Commands::Identity { command } => match command {
            IdentityCommands::Init { force } => {
                commands::identity::init(cli.config.as_deref(), force).await?;
            }
            IdentityCommands::Show => {
                commands::identity::show(cli.config.as_deref()).await?;
            }
            IdentityCommands::ExportCertificate { output } => {
                commands::identity::export_certificate(cli.config.as_deref(), &output).await?;
            }
        },
        Commands::DeriveSerial {
            name,
            event_id,
            attendee_id,
        } => {
            println!(
                "{}",
                eventpass::derive_serial_number(&name, event_id, attendee_id)
            );
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_issue_requires_both_derivation_ids() {
        let result = Cli::try_parse_from([
            "eventpassctl", "issue", "--name", "Kai", "--event", "Comic Con 2025",
            "--event-id", "7", "--icon", "icon.png", "--logo", "logo.png",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_issue_serial_conflicts_with_derivation() {
        let result = Cli::try_parse_from([
            "eventpassctl", "issue", "--name", "Kai", "--event", "Comic Con 2025",
            "--serial", "KAI2025-CCON", "--event-id", "7", "--attendee-id", "42",
            "--icon", "icon.png", "--logo", "logo.png",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_identity_export_parses() {
        let cli = Cli::try_parse_from([
            "eventpassctl", "-c", "eventpass.toml", "identity", "export-certificate",
            "--output", "issuer.pem",
        ])
        .unwrap();

        assert_eq!(cli.config, Some(PathBuf::from("eventpass.toml")));
        assert!(matches!(
            cli.command,
            Commands::Identity {
                command: IdentityCommands::ExportCertificate { .. }
            }
        ));
    }
}
