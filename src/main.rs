//! # sqlgenie
//!
//! Static analysis of SQL queries for structural anti-patterns, with
//! human-readable suggestions and a best-effort rewritten query.
//!
//! `sqlgenie` parses each statement, normalizes it into a small syntax tree
//! that keeps byte offsets into your text, and runs a set of independent
//! rules over it in parallel. Findings that carry a safe edit are applied to
//! the original text; everything else is reported as advice.
//!
//! # Quick Start
//!
//! ```bash
//! # Analyze a file
//! sqlgenie analyze -q queries.sql
//!
//! # Inline query, with table metadata for column expansion
//! sqlgenie analyze --sql "SELECT * FROM users" -s schema.sql
//!
//! # Stream queries from stdin, JSON output
//! echo "SELECT DISTINCT id FROM users" | sqlgenie analyze -q - -f json
//!
//! # List rules
//! sqlgenie rules
//! ```
//!
//! # Configuration
//!
//! Configuration is loaded from (in order of precedence):
//!
//! 1. Command-line arguments
//! 2. Environment variables (`SQLGENIE_MIN_SEVERITY`,
//!    `SQLGENIE_MAX_QUERY_LENGTH`, `SQLGENIE_RULES`)
//! 3. `.sqlgenie.toml` in current directory
//! 4. `~/.config/sqlgenie/config.toml`
//!
//! ## Example Configuration
//!
//! ```toml
//! [analyzer]
//! max_query_length = 100000
//! dialect = "postgresql"
//!
//! [rules]
//! disabled = ["or-to-in"]
//! min_severity = "warning"
//! ```
//!
//! # Rules
//!
//! | ID | Severity | Description |
//! |----|----------|-------------|
//! | select-star | Warning | `*` in the select list; expanded when the schema is known |
//! | redundant-distinct | Info | `DISTINCT` over rows already unique; removed |
//! | missing-where | Critical | Full scan, or `UPDATE`/`DELETE` without `WHERE` |
//! | implicit-cross-join | Critical | Tables not related by any join predicate |
//! | non-sargable-predicate | Warning | Function or arithmetic on a filtered column |
//! | leading-wildcard | Warning | `LIKE '%...'` |
//! | or-to-in | Info | `a = 1 OR a = 2 OR a = 3`; rewritten to `IN` |
//! | large-offset | Warning | `OFFSET` above 1000 |
//! | not-in-subquery | Warning | `NOT IN (SELECT ...)` and NULLs |
//! | union-without-all | Info | `UNION` deduplication cost |
//! | scalar-subquery | Warning | Subquery in the select list |
//!
//! # Exit Codes
//!
//! - `0` - No findings, or only informational ones
//! - `1` - Warnings found
//! - `2` - Critical findings
//! - `3` - A statement could not be analyzed, or the run failed

use std::process;

use clap::Parser;
use sqlgenie::{
    app::{AnalyzeParams, EXIT_FAILURE, run_analyze, run_rules},
    cli::{Cli, Commands},
    config::Config,
    error::AppResult,
    logging
};

fn main() {
    match run() {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(EXIT_FAILURE);
        }
    }
}

fn run() -> AppResult<i32> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Analyze {
            queries,
            sql,
            schema,
            dialect,
            output_format,
            rules,
            disable,
            min_severity,
            max_query_length,
            verbose,
            no_color
        } => {
            logging::init(verbose);
            let config = Config::load()?;
            let params = AnalyzeParams {
                queries_path: queries.map(|p| p.display().to_string()),
                sql,
                schema_path: schema.map(|p| p.display().to_string()),
                dialect,
                output_format,
                rules,
                disable,
                min_severity,
                max_query_length,
                verbose,
                no_color
            };
            let result = run_analyze(params, config)?;
            println!("{}", result.output);
            Ok(result.exit_code)
        }
        Commands::Rules {
            output_format
        } => {
            logging::init(false);
            println!("{}", run_rules(output_format));
            Ok(0)
        }
    }
}
