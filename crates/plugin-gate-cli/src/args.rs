use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// Long help for `generate-registry`; the field list mirrors what the
/// generator writes for each entry.
pub const GENERATE_REGISTRY_ABOUT: &str = "\
Validate every plugin under the plugins directory and write the registry document.

Plugins that fail validation are left out and reported as warnings. Entries are
sorted by name and the file is replaced atomically, so repeated runs over the
same plugin trees produce identical bytes.

Each entry carries:
  name         manifest name (equals the plugin directory name)
  source       relative path to the plugin directory
  description  manifest description
  version      manifest version
  author       manifest author
  category     manifest category
  homepage     manifest homepage, when present
  keywords     manifest keywords, sorted and deduplicated
  components   artifact kinds the manifest declares (commands, agents, hooks, skills)";

#[derive(Parser)]
#[command(name = "plugin-gate")]
#[command(about = "Admission pipeline for a Claude Code plugin marketplace")]
#[command(version)]
pub struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Quiet output (errors only)
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Marketplace root (holds marketplace.toml, plugins/, fixtures/)
    #[arg(long, global = true, default_value = ".")]
    pub root: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
#[allow(clippy::enum_variant_names)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Elvish,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum Bar {
    /// Minimally acceptable for submission
    #[default]
    Admission,
    /// Publish-ready in automated checks
    Confidence,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run schema and structural validation against a plugin directory
    Validate {
        /// Plugin directory (marketplace root with --marketplace)
        path: PathBuf,

        /// Check the registry document under PATH against the plugin trees it lists
        #[arg(long)]
        marketplace: bool,
    },

    /// Compute the 0-100 quality score of a plugin directory
    Score {
        /// Plugin directory
        plugin_dir: PathBuf,

        /// Emit the score report as JSON
        #[arg(long)]
        json: bool,

        /// Threshold the exit code is judged against
        #[arg(long, value_enum, default_value_t = Bar::Admission)]
        bar: Bar,
    },

    /// Create a new plugin from the built-in template
    Scaffold {
        /// Plugin name (lowercase-hyphenated)
        name: String,

        /// Manifest description
        #[arg(long)]
        description: Option<String>,

        /// Author name (default: scaffold.author from marketplace.toml)
        #[arg(long)]
        author: Option<String>,
    },

    /// Regenerate the registry document from all plugins
    #[command(long_about = GENERATE_REGISTRY_ABOUT)]
    GenerateRegistry,

    /// Check every fixture against its expected outcome
    RunFixtures {
        /// Fixture table (default: fixtures/fixtures.toml under the root)
        #[arg(long)]
        fixtures: Option<PathBuf>,

        /// Worker threads (default: available parallelism)
        #[arg(long)]
        workers: Option<usize>,
    },

    /// Scaffold, validate, score, generate, and verify a throwaway plugin
    RunE2e {
        /// Only replay a journal left by an interrupted run
        #[arg(long)]
        recover: bool,
    },

    /// Manage marketplace.toml
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Write a commented marketplace.toml if none exists
    Init,

    /// List all config values
    List,

    /// Get a config value
    Get {
        /// Config key (e.g., scoring.confidence_bar)
        key: String,
    },

    /// Set a config value
    Set {
        /// Config key (e.g., scoring.admission_bar)
        key: String,

        /// Value to set (empty clears optional keys)
        value: String,
    },

    /// Show config file path
    Path,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use plugin_gate_core::ENTRY_FIELDS;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn generate_registry_help_lists_written_fields_only() {
        let listed: Vec<&str> = GENERATE_REGISTRY_ABOUT
            .lines()
            .skip_while(|line| !line.starts_with("Each entry carries"))
            .skip(1)
            .filter_map(|line| line.split_whitespace().next())
            .collect();
        assert_eq!(listed, ENTRY_FIELDS);
    }

    #[test]
    fn score_defaults_to_admission_bar() {
        let cli = Cli::try_parse_from(["plugin-gate", "score", "plugins/demo"]).unwrap();
        match cli.command {
            Commands::Score { bar, json, .. } => {
                assert_eq!(bar, Bar::Admission);
                assert!(!json);
            }
            _ => panic!("expected score"),
        }
    }

    #[test]
    fn unknown_flag_is_rejected() {
        let err = Cli::try_parse_from(["plugin-gate", "validate", "x", "--bogus"])
            .err()
            .unwrap();
        assert_eq!(err.exit_code(), 2);
    }
}
