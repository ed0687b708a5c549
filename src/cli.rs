use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// sqlgenie - Find SQL anti-patterns and suggest safer rewrites
#[derive(Parser, Debug)]
#[command(name = "sqlgenie")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Analyze SQL queries for anti-patterns
    Analyze {
        /// Path to SQL queries file (use - for stdin)
        #[arg(short, long, conflicts_with = "sql", required_unless_present = "sql")]
        queries: Option<PathBuf>,

        /// Inline SQL to analyze
        #[arg(long)]
        sql: Option<String>,

        /// Path to DDL (CREATE TABLE / CREATE INDEX) used for column
        /// expansion and unique-key checks
        #[arg(short, long)]
        schema: Option<PathBuf>,

        /// SQL dialect for parsing (defaults to the configured dialect)
        #[arg(long, value_enum)]
        dialect: Option<Dialect>,

        /// Output format
        #[arg(short = 'f', long, value_enum, default_value = "text")]
        output_format: Format,

        /// Comma-separated rule ids to run (default: all)
        #[arg(long, value_delimiter = ',')]
        rules: Option<Vec<String>>,

        /// Comma-separated rule ids to skip
        #[arg(long, value_delimiter = ',')]
        disable: Vec<String>,

        /// Lowest severity to report
        #[arg(long, value_enum)]
        min_severity: Option<SeverityArg>,

        /// Maximum query length in characters
        #[arg(long)]
        max_query_length: Option<usize>,

        /// Debug logging and always print the optimized query
        #[arg(short, long)]
        verbose: bool,

        /// Disable colored output
        #[arg(long)]
        no_color: bool
    },

    /// List the built-in rules
    Rules {
        /// Output format
        #[arg(short = 'f', long, value_enum, default_value = "text")]
        output_format: Format
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum Dialect {
    Generic,
    Mysql,
    Postgresql,
    Sqlite,
    Clickhouse
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum Format {
    Text,
    Json,
    Yaml
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum SeverityArg {
    Info,
    Warning,
    Critical
}
