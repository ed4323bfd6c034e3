pub mod commands;

use std::path::PathBuf;

#[derive(clap::Subcommand, Debug)]
pub enum PostgresqlCommands {
    /// Restore a backup onto this node
    Restore {
        /// Restore strategy (pg_dump, pg_basebackup, pg_basebackup_incremental)
        #[clap(long, default_value = "pg_basebackup_incremental")]
        strategy: String,

        /// Storage location of the backup
        #[clap(long)]
        location: String,

        /// MD5 checksum of the backup; verification is skipped when empty
        #[clap(long, default_value = "")]
        checksum: String,

        /// Configuration file
        #[clap(long)]
        config: Option<PathBuf>,
    },

    /// Print the backup chain a backup belongs to, oldest first
    ShowChain {
        /// Storage location of the backup
        #[clap(long)]
        location: String,

        /// MD5 checksum of the backup
        #[clap(long, default_value = "")]
        checksum: String,

        /// Configuration file
        #[clap(long)]
        config: Option<PathBuf>,
    },

    /// Print the effective configuration with secrets masked
    ShowConfig {
        /// Configuration file
        #[clap(long)]
        config: Option<PathBuf>,
    },
}
