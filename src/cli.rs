//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use gwas_library::{DEFAULT_LIST_LIMIT, DEFAULT_POPULAR_LIMIT, Sex};

/// Number of rejected entries printed by `inspect` unless overridden.
pub const DEFAULT_MAX_ISSUES: usize = 20;

/// Ingest and query the GWAS summary-statistics library.
///
/// Seeds the library from a manifest of GWAS result files (and a phenotype
/// catalog), then lists, searches and ranks the stored entries.
#[derive(Parser, Debug)]
#[command(name = "gwas-library")]
#[command(author, version, about)]
pub struct Args {
    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Config file (default: $XDG_CONFIG_HOME/gwas-library/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// SQLite database file (overrides config and GWAS_LIBRARY_DB)
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Seed the library and phenotype catalog if they are empty
    Seed {
        /// GWAS manifest (TSV or CSV)
        #[arg(long)]
        manifest: Option<PathBuf>,

        /// Phenotype catalog (JSON array of {id, name})
        #[arg(long)]
        catalog: Option<PathBuf>,
    },

    /// Parse and validate a manifest without touching the database
    Inspect {
        /// GWAS manifest (TSV or CSV)
        manifest: PathBuf,

        /// Maximum rejected entries to print
        #[arg(long, default_value_t = DEFAULT_MAX_ISSUES)]
        max_issues: usize,
    },

    /// List library entries, most downloaded first
    List {
        /// Full-text search over name, description, code and filename
        #[arg(short, long)]
        search: Option<String>,

        /// Restrict to one sex stratum (both_sexes, male, female)
        #[arg(long)]
        sex: Option<Sex>,

        /// Maximum entries to show (0 for no limit)
        #[arg(short, long, default_value_t = DEFAULT_LIST_LIMIT)]
        limit: u32,

        /// Entries to skip
        #[arg(long, default_value_t = 0)]
        offset: u32,
    },

    /// Show the most downloaded entries
    Popular {
        /// Number of entries to show
        #[arg(short, long, default_value_t = DEFAULT_POPULAR_LIMIT)]
        limit: u32,
    },

    /// Show one entry as JSON
    Show {
        /// Entry file id (manifest filename)
        file_id: String,
    },
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_seed_default_args_parses_successfully() {
        let args = Args::try_parse_from(["gwas-library", "seed"]).unwrap();
        assert_eq!(args.verbose, 0);
        assert!(!args.quiet);
        assert!(args.config.is_none());
        assert!(matches!(
            args.command,
            Command::Seed {
                manifest: None,
                catalog: None
            }
        ));
    }

    #[test]
    fn test_cli_subcommand_required() {
        let result = Args::try_parse_from(["gwas-library"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_verbose_flag_increments_count() {
        let args = Args::try_parse_from(["gwas-library", "-vv", "popular"]).unwrap();
        assert_eq!(args.verbose, 2);

        // Global flags may follow the subcommand.
        let args = Args::try_parse_from(["gwas-library", "popular", "--verbose"]).unwrap();
        assert_eq!(args.verbose, 1);
    }

    #[test]
    fn test_cli_quiet_and_db_flags() {
        let args =
            Args::try_parse_from(["gwas-library", "-q", "--db", "lib.db", "show", "x.tsv"]).unwrap();
        assert!(args.quiet);
        assert_eq!(args.db, Some(PathBuf::from("lib.db")));
        assert!(matches!(args.command, Command::Show { file_id } if file_id == "x.tsv"));
    }

    #[test]
    fn test_cli_list_defaults() {
        let args = Args::try_parse_from(["gwas-library", "list"]).unwrap();
        match args.command {
            Command::List {
                search,
                sex,
                limit,
                offset,
            } => {
                assert!(search.is_none());
                assert!(sex.is_none());
                assert_eq!(limit, DEFAULT_LIST_LIMIT);
                assert_eq!(offset, 0);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_cli_list_sex_filter_parses() {
        let args = Args::try_parse_from(["gwas-library", "list", "--sex", "female"]).unwrap();
        assert!(matches!(
            args.command,
            Command::List {
                sex: Some(Sex::Female),
                ..
            }
        ));
    }

    #[test]
    fn test_cli_list_invalid_sex_rejected() {
        let result = Args::try_parse_from(["gwas-library", "list", "--sex", "unknown"]);
        let err = result.unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn test_cli_inspect_requires_manifest() {
        let err = Args::try_parse_from(["gwas-library", "inspect"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);

        let args =
            Args::try_parse_from(["gwas-library", "inspect", "m.tsv", "--max-issues", "3"]).unwrap();
        assert!(matches!(
            args.command,
            Command::Inspect { max_issues: 3, .. }
        ));
    }

    #[test]
    fn test_cli_popular_limit() {
        let args = Args::try_parse_from(["gwas-library", "popular", "-l", "3"]).unwrap();
        assert!(matches!(args.command, Command::Popular { limit: 3 }));
    }

    #[test]
    fn test_cli_version_flag_shows_version() {
        let err = Args::try_parse_from(["gwas-library", "--version"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayVersion);
    }
}
