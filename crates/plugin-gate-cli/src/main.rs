use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{CommandFactory, Parser};
use clap_complete::generate;
use colored::Colorize;

use plugin_gate_core::config::{Config, ScoreBar};
use plugin_gate_core::harness::{self, E2eRunner, FixtureRunner};
use plugin_gate_core::registry::{check_marketplace, RegistryGenerator, RegistryLock};
use plugin_gate_core::scaffold::{ScaffoldRequest, Scaffolder, TemplateScaffolder};
use plugin_gate_core::score::{ScoreReport, Scorer};
use plugin_gate_core::validate::validate_plugin;
use plugin_gate_core::{GateError, Result};

mod args;
mod signal;
use args::{Bar, Cli, Commands, ConfigAction, Shell};

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    let root = cli.root;
    tracing::debug!(root = %root.display(), "resolved marketplace root");
    let result = match cli.command {
        Commands::Validate { path, marketplace } => {
            if marketplace {
                handle_validate_marketplace(&path)
            } else {
                handle_validate(&path)
            }
        }
        Commands::Score {
            plugin_dir,
            json,
            bar,
        } => handle_score(&root, &plugin_dir, json, bar),
        Commands::Scaffold {
            name,
            description,
            author,
        } => handle_scaffold(&root, name, description, author),
        Commands::GenerateRegistry => handle_generate(&root),
        Commands::RunFixtures { fixtures, workers } => {
            handle_run_fixtures(&root, fixtures, workers)
        }
        Commands::RunE2e { recover } => handle_run_e2e(&root, recover),
        Commands::Config { action } => handle_config(action, &root),
        Commands::Completions { shell } => {
            handle_completions(shell);
            Ok(())
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", "[ERROR]".red().bold(), e);
            ExitCode::from(e.exit_code() as u8)
        }
    }
}

fn init_tracing(verbose: bool, quiet: bool) {
    use tracing_subscriber::EnvFilter;

    let level = if verbose {
        "debug"
    } else if quiet {
        "error"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("plugin_gate={level},plugin_gate_core={level},warn"))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn handle_completions(shell: Shell) {
    let mut cmd = Cli::command();
    let shell = match shell {
        Shell::Bash => clap_complete::Shell::Bash,
        Shell::Zsh => clap_complete::Shell::Zsh,
        Shell::Fish => clap_complete::Shell::Fish,
        Shell::PowerShell => clap_complete::Shell::PowerShell,
        Shell::Elvish => clap_complete::Shell::Elvish,
    };
    generate(shell, &mut cmd, "plugin-gate", &mut io::stdout());
}

fn handle_validate(plugin_dir: &Path) -> Result<()> {
    let result = validate_plugin(plugin_dir)?;
    let plugin = result.plugin.clone();
    let manifest = result.into_manifest()?;

    println!(
        "{} {} {} passed schema and structural validation",
        "[OK]".green().bold(),
        plugin,
        manifest.version.dimmed()
    );
    Ok(())
}

fn handle_validate_marketplace(root: &Path) -> Result<()> {
    let config = Config::load(root)?;
    let check = check_marketplace(root, &config)?;

    for name in &check.remote {
        println!("{} {} is hosted elsewhere, not checked", "[SKIP]".yellow(), name);
    }
    if !check.passed() {
        return Err(GateError::Validation {
            plugin: check.registry.display().to_string(),
            violations: check.violations,
        });
    }

    println!(
        "{} {} lists {} valid plugin(s)",
        "[OK]".green().bold(),
        check.registry.display(),
        check.checked
    );
    Ok(())
}

fn handle_score(root: &Path, plugin_dir: &Path, json: bool, bar: Bar) -> Result<()> {
    if !plugin_dir.is_dir() {
        return Err(GateError::PluginNotFound {
            path: plugin_dir.to_path_buf(),
        });
    }
    let config = Config::load(root)?;
    let report = Scorer::new(&config.scoring).score(plugin_dir);
    let bar = match bar {
        Bar::Admission => ScoreBar::Admission,
        Bar::Confidence => ScoreBar::Confidence,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_score(&report, config.scoring.threshold(bar), bar);
    }

    if !report.meets(&config.scoring, bar) {
        return Err(GateError::BelowThreshold {
            plugin: report.plugin,
            score: report.total,
            bar: bar.as_str().to_string(),
        });
    }
    Ok(())
}

fn print_score(report: &ScoreReport, threshold: u32, bar: ScoreBar) {
    println!();
    println!("{} {}", "Score:".bold(), report.plugin);
    println!();
    for category in &report.categories {
        let line = format!(
            "  {:<24} {:>2}/{}",
            category.category.label(),
            category.score,
            category.max
        );
        if category.score == category.max {
            println!("{}", line.green());
        } else {
            println!("{}", line.yellow());
            for note in &category.notes {
                println!("      {}", note.dimmed());
            }
        }
    }
    println!();
    let total = format!("{}/100", report.total);
    let status = if report.total >= threshold {
        total.green().bold()
    } else {
        total.red().bold()
    };
    println!("  Total: {} ({} bar: {})", status, bar.as_str(), threshold);
    println!();
}

fn handle_scaffold(
    root: &Path,
    name: String,
    description: Option<String>,
    author: Option<String>,
) -> Result<()> {
    let config = Config::load(root)?;
    let scaffolder = TemplateScaffolder::new(config.plugins_dir(root), &config);
    let dir = scaffolder.scaffold(&ScaffoldRequest {
        name: name.clone(),
        description,
        author,
    })?;

    println!();
    println!("{} {}", "Created:".green(), dir.display());
    println!();
    println!("Next steps:");
    println!("  1. Edit commands/{}.md and README.md", name);
    println!("  2. plugin-gate validate {}", dir.display());
    println!("  3. plugin-gate score {}", dir.display());
    Ok(())
}

fn handle_generate(root: &Path) -> Result<()> {
    let config = Config::load(root)?;
    let generator = RegistryGenerator::new(root, &config);
    let _lock = RegistryLock::acquire(&generator.registry_path())?;
    let report = generator.generate()?;

    for excluded in &report.excluded {
        println!("{} {} excluded", "[WARN]".yellow(), excluded.plugin);
        for violation in &excluded.violations {
            println!("    {}", violation.to_string().dimmed());
        }
    }
    let state = if report.changed { "written" } else { "unchanged" };
    println!(
        "{} {} {} ({} plugin(s))",
        "[OK]".green().bold(),
        report.path.display(),
        state,
        report.accepted.len()
    );
    Ok(())
}

fn handle_run_fixtures(
    root: &Path,
    fixtures: Option<PathBuf>,
    workers: Option<usize>,
) -> Result<()> {
    let config = Config::load(root)?;
    let mut runner = FixtureRunner::new(root, &config);
    if let Some(workers) = workers {
        runner = runner.with_workers(workers);
    }
    let report = match fixtures {
        Some(path) => runner.run(&harness::load_cases(&path)?)?,
        None => runner.run_default()?,
    };

    for outcome in &report.outcomes {
        let score = outcome
            .score
            .map(|s| format!(" score {}", s))
            .unwrap_or_default();
        if outcome.matched() {
            println!("{} {}{}", "[OK]".green(), outcome.name, score.dimmed());
        } else {
            println!("{} {}{}", "[FAIL]".red().bold(), outcome.name, score);
            for mismatch in &outcome.mismatches {
                println!("    {}", mismatch);
            }
        }
    }
    println!();
    println!(
        "{}/{} fixtures matched",
        report.matched_count(),
        report.outcomes.len()
    );
    report.into_result().map(|_| ())
}

fn handle_run_e2e(root: &Path, recover_only: bool) -> Result<()> {
    let config = Config::load(root)?;
    if recover_only {
        let mut lock = RegistryLock::acquire(&config.registry_path(root))?;
        return match harness::recover(root, &mut lock)? {
            None => {
                println!("Nothing to recover.");
                Ok(())
            }
            Some(errors) if errors.is_empty() => {
                println!("{} Restored state from interrupted run", "[OK]".green().bold());
                Ok(())
            }
            Some(errors) => Err(GateError::Harness { failures: errors }),
        };
    }

    let interrupt = signal::install_interrupt_flag()?;
    let scaffolder = TemplateScaffolder::new(config.plugins_dir(root), &config);
    let report = E2eRunner::new(root, &config, scaffolder)
        .with_interrupt(interrupt)
        .run()?;

    if report.recovered {
        println!("{} Replayed journal from an interrupted run", "[WARN]".yellow());
    }
    for step in &report.completed {
        println!("{} {} {}", "[OK]".green(), step, report.plugin.dimmed());
    }
    if let Some(failure) = &report.failure {
        println!("{} {}", "[FAIL]".red().bold(), failure);
    }
    for error in &report.cleanup {
        println!("{} cleanup: {}", "[FAIL]".red().bold(), error);
    }
    if report.interrupted && report.cleanup.is_empty() {
        println!("{} Interrupted; scaffold removed and registry restored", "[WARN]".yellow());
    }
    report.into_result().map(|_| ())
}

fn handle_config(action: ConfigAction, root: &Path) -> Result<()> {
    match action {
        ConfigAction::Init => {
            let path = Config::init(root)?;
            println!("{} {}", "Initialized:".green(), path.display());
        }
        ConfigAction::Set { key, value } => {
            let mut config = Config::load(root)?;
            config.set(&key, &value)?;
            config.save(root)?;
            println!("{} {} = {}", "Set:".green(), key, value);
        }
        ConfigAction::List => {
            let config = Config::load(root)?;
            println!();
            for (key, value) in config.list() {
                println!("{} = {}", key.cyan(), value);
            }
            println!();
        }
        ConfigAction::Get { key } => {
            let config = Config::load(root)?;
            match config.get(&key) {
                Some(value) => println!("{}", value),
                None => {
                    return Err(GateError::Usage {
                        message: format!("unknown config key: {}", key),
                    });
                }
            }
        }
        ConfigAction::Path => {
            println!("{}", Config::path(root).display());
        }
    }

    Ok(())
}
