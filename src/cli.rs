//! The command line interface for the simulator.
use crate::log;
use crate::output::write_premium_grid;
use crate::settings::Settings;
use crate::simulator::quote::savings_breakdown;
use crate::simulator::{Field, Simulator};
use crate::store::{KeyValueStore, MemoryStore};
use crate::tariff::Tariff;
use crate::tier::Tier;
use crate::units::{format_income, format_price};
use ::log::info;
use anyhow::{Context, Result, ensure};
use clap::{Args, CommandFactory, Parser, Subcommand};
use itertools::Itertools;
use std::fmt::Write;
use std::path::{Path, PathBuf};
use strum::IntoEnumIterator;

pub mod session;
use session::SessionSubcommands;
pub mod settings;
use settings::SettingsSubcommands;
pub mod tariff;
use tariff::TariffSubcommands;

/// The command line interface for the simulator.
#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// The available commands.
    #[command(subcommand)]
    command: Option<Commands>,
    /// Flag to provide the CLI docs as markdown
    #[arg(long, hide = true)]
    markdown_help: bool,
}

/// The answers to quote for
#[derive(Args, Default)]
pub struct QuoteOpts {
    /// Monthly income in euros
    #[arg(short, long)]
    pub income: Option<String>,
    /// Household covered: single, couple or family
    #[arg(short, long)]
    pub family_status: Option<String>,
    /// Chronic pathology: none, endometriosis, cardiovascular, diabetes, cancer, mentalHealth
    /// or other
    #[arg(short, long)]
    pub pathology: Option<String>,
    /// Print the quote as JSON
    #[arg(long)]
    pub json: bool,
}

/// The available commands.
#[derive(Subcommand)]
enum Commands {
    /// Compute a premium quote.
    Quote {
        /// The answers to quote for
        #[command(flatten)]
        opts: QuoteOpts,
        /// Path to a tariff file to use instead of the configured one.
        #[arg(long)]
        tariff: Option<PathBuf>,
    },
    /// Write quotes for every income bracket, household and pathology to a CSV file.
    Grid {
        /// Path of the CSV file to write.
        #[arg(short, long, default_value = crate::output::PREMIUM_GRID_FILE_NAME)]
        output: PathBuf,
        /// Path to a tariff file to use instead of the configured one.
        #[arg(long)]
        tariff: Option<PathBuf>,
    },
    /// List the pricing tiers on offer.
    Tiers {
        /// Path to a tariff file to use instead of the configured one.
        #[arg(long)]
        tariff: Option<PathBuf>,
    },
    /// Work with the saved simulator session.
    Session {
        /// The available subcommands for the saved session.
        #[command(subcommand)]
        subcommand: SessionSubcommands,
    },
    /// Work with tariff files.
    Tariff {
        /// The available subcommands for tariff files.
        #[command(subcommand)]
        subcommand: TariffSubcommands,
    },
    /// Manage program settings.
    Settings {
        /// The available subcommands for managing settings.
        #[command(subcommand)]
        subcommand: SettingsSubcommands,
    },
}

impl Commands {
    /// Execute the supplied CLI command
    fn execute(self) -> Result<()> {
        match self {
            Self::Quote { opts, tariff } => handle_quote_command(&opts, tariff.as_deref(), None),
            Self::Grid { output, tariff } => handle_grid_command(&output, tariff.as_deref(), None),
            Self::Tiers { tariff } => handle_tiers_command(tariff.as_deref(), None),
            Self::Session { subcommand } => subcommand.execute(),
            Self::Tariff { subcommand } => subcommand.execute(),
            Self::Settings { subcommand } => subcommand.execute(),
        }
    }
}

/// Parse CLI arguments and start Solenna
pub fn run_cli() -> Result<()> {
    let cli = Cli::parse();

    // Invoked as: `$ solenna --markdown-help`
    if cli.markdown_help {
        clap_markdown::print_help_markdown::<Cli>();
        return Ok(());
    }

    let Some(command) = cli.command else {
        let help_str = Cli::command().render_long_help().to_string();
        println!("{help_str}");
        return Ok(());
    };

    command.execute()
}

/// Use the given settings, or load them from the settings file
fn load_settings(settings: Option<Settings>) -> Result<Settings> {
    match settings {
        Some(settings) => Ok(settings),
        None => Settings::load().context("Failed to load settings."),
    }
}

/// Initialise the program logger, unless an earlier command already has
fn init_logging(settings: &Settings) -> Result<()> {
    if log::is_logger_initialised() {
        return Ok(());
    }

    log::init(Some(&settings.log_level)).context("Failed to initialise logging.")
}

/// Load settings, start logging and load the tariff.
///
/// A tariff file given on the command line takes precedence over the one in the settings.
fn prepare(settings: Option<Settings>, tariff_path: Option<&Path>) -> Result<(Settings, Tariff)> {
    let settings = load_settings(settings)?;
    init_logging(&settings)?;

    let tariff_path = tariff_path.or(settings.tariff_file.as_deref());
    let tariff = Tariff::load(tariff_path).context("Failed to load tariff.")?;
    if let Some(path) = tariff_path {
        info!("Loaded tariff from {}", path.display());
    }

    Ok((settings, tariff))
}

/// Fail with the simulator's validation errors, if it has any
pub(crate) fn ensure_valid<S: KeyValueStore>(simulator: &Simulator<S>) -> Result<()> {
    let messages = simulator.errors().values().join("\n");
    ensure!(simulator.is_valid(), "Invalid answers:\n{messages}");

    Ok(())
}

/// Describe the simulator's current quote for display.
///
/// Nothing is shown for the quote if one has not been computed.
pub fn describe_quote<S: KeyValueStore>(simulator: &Simulator<S>) -> String {
    let input = simulator.input();
    let mut out = String::new();
    writeln!(
        out,
        "Answers: {} income, {}, pathology {}",
        format_income(input.income),
        input.family_status,
        input.pathology
    )
    .unwrap();

    let Some(result) = simulator.result() else {
        writeln!(out, "No quote has been computed").unwrap();
        return out;
    };

    writeln!(
        out,
        "Monthly premium: {}",
        format_price(result.total_monthly_premium)
    )
    .unwrap();
    writeln!(out, "  Base premium: {}", format_price(result.base_premium)).unwrap();
    writeln!(
        out,
        "  Family supplement: {}",
        format_price(result.family_supplement)
    )
    .unwrap();
    writeln!(
        out,
        "  Chronic pathology pack: {}",
        format_price(result.pathology_supplement)
    )
    .unwrap();
    writeln!(out, "Annual premium: {}", format_price(result.annual_premium)).unwrap();
    if input.has_chronic_condition() {
        writeln!(
            out,
            "Coverage ceiling: {}",
            format_price(result.potential_annual_savings)
        )
        .unwrap();
        writeln!(
            out,
            "Estimated savings: {}",
            format_price(simulator.estimated_savings())
        )
        .unwrap();

        let breakdown = savings_breakdown(simulator.tariff(), input.pathology, input.income);
        writeln!(
            out,
            "  With the pathology pack alone: {} a year, {:.0}% of the ceiling",
            format_price(breakdown.net_savings),
            breakdown.savings_ratio
        )
        .unwrap();
    }
    let tier = simulator.recommended_tier();
    writeln!(
        out,
        "Recommended tier: {tier} (from {}/month)",
        format_price(tier.base_price())
    )
    .unwrap();
    writeln!(out, "Coverage:").unwrap();
    for item in &result.coverage_description {
        writeln!(out, "  - {item}").unwrap();
    }

    out
}

/// Describe the pricing tiers: their prices, the incomes they are recommended for and what
/// they include.
pub fn describe_tiers(tariff: &Tariff) -> String {
    let mut out = String::new();
    for tier in Tier::iter() {
        let highlight = if tier.is_highlighted() {
            " (most popular)"
        } else {
            ""
        };
        writeln!(
            out,
            "{tier}: from {}/month{highlight}",
            format_price(tier.base_price())
        )
        .unwrap();

        let incomes = match tariff.tier_thresholds.income_range(tier) {
            (None, Some(upper)) => format!("below {}", format_price(upper)),
            (Some(lower), Some(upper)) => {
                format!("from {} up to {}", format_price(lower), format_price(upper))
            }
            (Some(lower), None) => format!("from {}", format_price(lower)),
            (None, None) => "of any amount".to_string(),
        };
        writeln!(out, "  Recommended for incomes {incomes}").unwrap();
        for feature in tier.features() {
            writeln!(out, "  - {feature}").unwrap();
        }
    }

    out
}

/// Compute a quote for the given answers, which are validated first.
///
/// Answers which are left out take their default values.
pub fn quote(opts: &QuoteOpts, tariff: Tariff, settings: &Settings) -> Result<Simulator> {
    let mut options = settings.simulator_options();
    options.persist_state = false;
    options.auto_calculate = true;
    let mut simulator = Simulator::new(tariff, MemoryStore::default(), options);

    let answers = [
        (Field::Income, &opts.income),
        (Field::FamilyStatus, &opts.family_status),
        (Field::Pathology, &opts.pathology),
    ];
    for (field, raw) in answers {
        if let Some(raw) = raw {
            simulator.update_field_str(field, raw);
        }
    }

    ensure_valid(&simulator)?;
    simulator.flush();

    Ok(simulator)
}

/// Handle the `quote` command.
pub fn handle_quote_command(
    opts: &QuoteOpts,
    tariff_path: Option<&Path>,
    settings: Option<Settings>,
) -> Result<()> {
    let (settings, tariff) = prepare(settings, tariff_path)?;
    let simulator = quote(opts, tariff, &settings)?;

    if opts.json {
        println!("{}", simulator.export_snapshot());
    } else {
        print!("{}", describe_quote(&simulator));
    }

    Ok(())
}

/// Handle the `tiers` command.
pub fn handle_tiers_command(tariff_path: Option<&Path>, settings: Option<Settings>) -> Result<()> {
    let (_, tariff) = prepare(settings, tariff_path)?;
    print!("{}", describe_tiers(&tariff));

    Ok(())
}

/// Handle the `grid` command.
pub fn handle_grid_command(
    output_path: &Path,
    tariff_path: Option<&Path>,
    settings: Option<Settings>,
) -> Result<()> {
    let (_, tariff) = prepare(settings, tariff_path)?;

    let count = write_premium_grid(&tariff, output_path).with_context(|| {
        format!(
            "Failed to write premium grid: {}",
            output_path.display()
        )
    })?;
    info!("Wrote {count} quotes to {}", output_path.display());

    Ok(())
}
