use clap::{Parser, Subcommand};
use colored::*;

mod api;
mod config;
mod errors;
mod export;
mod models;
mod pipeline;

#[derive(Parser)]
#[command(name = "ticketflow")]
#[command(version = "0.1.0")]
#[command(about = "Pull, flatten, and export support tickets", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Set up API credentials and the export destination
    Init,

    /// Extract tickets over a date range and export them as CSV
    Run {
        /// First day of the range (YYYY-MM-DD); defaults to the configured start date
        #[arg(long)]
        start_date: Option<String>,

        /// Last day of the range (YYYY-MM-DD); defaults to today
        #[arg(long)]
        end_date: Option<String>,

        /// Extract only ticket ids and their actions, via offset pagination
        #[arg(long)]
        actions_only: bool,

        /// Keep only rows created by this email address (repeatable)
        #[arg(long = "allow-email")]
        allow_emails: Vec<String>,

        /// Write the CSV here instead of the configured file name
        #[arg(long)]
        out: Option<std::path::PathBuf>,

        /// Skip handing the CSV to the export sink
        #[arg(long)]
        no_store: bool,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Display current configuration (with masked secrets)
    Show,

    /// Set a specific configuration value
    Set {
        /// Configuration key (e.g., api.token, export.destination)
        key: String,
        /// New value
        value: String,
    },

    /// Get the path to the config file
    Path,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    println!("{}", "Ticketflow v0.1.0".bright_cyan().bold());
    println!();

    let result = match cli.command {
        Commands::Init => handle_init(),

        Commands::Run {
            start_date,
            end_date,
            actions_only,
            allow_emails,
            out,
            no_store,
        } => {
            handle_run(
                start_date.as_deref(),
                end_date.as_deref(),
                actions_only,
                &allow_emails,
                out.as_deref(),
                no_store,
            )
            .await
        }

        Commands::Config { action } => handle_config(action),
    };

    if let Err(e) = result {
        eprintln!("\n{}", e);
        std::process::exit(1);
    }

    println!();
}

async fn handle_run(
    start_date: Option<&str>,
    end_date: Option<&str>,
    actions_only: bool,
    allow_emails: &[String],
    out: Option<&std::path::Path>,
    no_store: bool,
) -> anyhow::Result<()> {
    use config::settings::Settings;
    use export::sink::{DirectorySink, ExportSink};
    use pipeline::{ExtractOptions, FieldsMode};

    let settings = Settings::load()?;

    // Date-range problems are configuration errors: fatal before any
    // network call is attempted.
    let start = match start_date {
        Some(input) => parse_day(input)?,
        None => parse_day(&settings.extract.default_start_date)?,
    };
    let end = match end_date {
        Some(input) => parse_day(input)?,
        None => chrono::Local::now().date_naive(),
    };
    if start > end {
        return Err(anyhow::anyhow!(
            "{}",
            errors::TicketFlowError::InvalidDateRange(format!(
                "start date {} is after end date {}",
                start, end
            ))
        ));
    }

    let fields_mode = if actions_only {
        FieldsMode::ActionsOnly
    } else {
        FieldsMode::Full
    };

    println!(
        "{}",
        format!("Extracting tickets from {} to {}...", start, end)
            .cyan()
            .bold()
    );
    println!();

    let client = api::tickets::TicketClient::new(
        settings.api.base_url.clone(),
        settings.api.token.clone(),
    )?;

    let options = ExtractOptions {
        start,
        end,
        fields_mode,
        team_exclusion: settings.api.team_exclusion.clone(),
        page_size: settings.extract.page_size,
    };

    let report = pipeline::run_extraction(&client, &options, |done, total| {
        println!("{}", format!("  Window {}/{} fetched", done, total).dimmed());
    })
    .await?;

    println!();
    for warning in &report.warnings {
        println!("{}", format!("  ⚠ {}", warning).yellow());
    }
    if !report.warnings.is_empty() {
        println!(
            "{}",
            format!(
                "  Continuing with partial data ({} of {} windows failed)",
                report.warnings.len(),
                report.windows_completed
            )
            .yellow()
        );
        println!();
    }

    let mut table = report.table;

    if fields_mode == FieldsMode::Full {
        pipeline::rename::rename_columns(&mut table, &settings.field_labels);
        table.push_column(
            "execution_timestamp",
            serde_json::json!(chrono::Local::now()
                .format("%d/%m/%Y %H:%M:%S")
                .to_string()),
        );
    }

    if !allow_emails.is_empty() {
        let before = table.row_count();
        pipeline::retain_allowed_emails(&mut table, allow_emails);
        println!(
            "{}",
            format!(
                "  Creator allow-list kept {} of {} rows",
                table.row_count(),
                before
            )
            .dimmed()
        );
    }

    println!(
        "  {} {} rows × {} columns",
        "Table:".bold(),
        table.row_count().to_string().bright_white(),
        table.column_count().to_string().bright_white()
    );

    let file_name = if actions_only {
        settings.export.actions_file_name.clone()
    } else {
        settings.export.file_name.clone()
    };

    let bytes = export::csv::to_csv_bytes(&table)?;
    let local_path = out
        .map(|path| path.to_path_buf())
        .unwrap_or_else(|| std::path::PathBuf::from(&file_name));
    std::fs::write(&local_path, &bytes)?;
    println!(
        "  {} {}",
        "Saved:".bold(),
        local_path.display().to_string().bright_white()
    );

    if no_store {
        println!();
        println!("{}", "Done (export sink skipped)".green().bold());
        return Ok(());
    }

    match DirectorySink.store(&bytes, &file_name, &settings.export.destination) {
        Ok(()) => {
            println!(
                "  {} {}/{}",
                "Stored:".bold(),
                settings.export.destination.bright_white(),
                file_name.bright_white()
            );
            println!();
            println!("{}", "Extraction complete!".green().bold());
            Ok(())
        }
        Err(e) => {
            // The table and local file survive a sink failure.
            println!(
                "{}",
                format!("  Local file kept at {}", local_path.display()).yellow()
            );
            Err(anyhow::anyhow!(
                "{}",
                errors::TicketFlowError::SinkFailed(e.to_string())
            ))
        }
    }
}

fn parse_day(input: &str) -> anyhow::Result<chrono::NaiveDate> {
    chrono::NaiveDate::parse_from_str(input.trim(), "%Y-%m-%d").map_err(|_| {
        anyhow::anyhow!(
            "{}",
            errors::TicketFlowError::InvalidDateRange(format!(
                "'{}' is not a valid YYYY-MM-DD date",
                input
            ))
        )
    })
}

fn handle_init() -> anyhow::Result<()> {
    use config::settings::*;

    println!("{}", "Ticketflow Configuration Setup".cyan().bold());
    println!();
    println!(
        "{}",
        "This will store your settings in ~/.ticketflow/config.toml".dimmed()
    );
    println!(
        "{}",
        "The file will be created with read-only permissions (600)".dimmed()
    );
    println!();

    println!("{}", "Ticket API".bold());
    let base_url = prompt_with_default(
        "API base URL",
        "https://api.movidesk.com/public/v1",
    )?;
    println!();
    println!(
        "{}",
        "The access token can also be supplied per run via TICKETFLOW_TOKEN".dimmed()
    );
    let token = prompt_password("Access token")?;
    let team_exclusion = prompt("Team to exclude from extraction (leave empty for none)")?;

    println!();
    println!("{}", "Export".bold());
    let destination = prompt("Export destination directory")?;

    println!();
    println!("{}", "Extraction".bold());
    let default_start_date = prompt_with_default("Default start date (YYYY-MM-DD)", "2025-04-01")?;
    parse_day(&default_start_date)?;

    let settings = Settings {
        api: ApiConfig {
            base_url,
            token,
            team_exclusion: if team_exclusion.is_empty() {
                None
            } else {
                Some(team_exclusion)
            },
        },
        export: ExportConfig {
            destination,
            file_name: "tickets.csv".to_string(),
            actions_file_name: "actions.csv".to_string(),
        },
        extract: ExtractConfig {
            default_start_date,
            page_size: 1000,
        },
        field_labels: Default::default(),
    };

    settings.save()?;

    let config_path = Settings::config_dir()?.join("config.toml");
    println!();
    println!("{}", "Configuration saved!".green().bold());
    println!(
        "  Location: {}",
        config_path.display().to_string().bright_white()
    );
    println!();
    println!("{}", "Keep your access token secure!".yellow());
    println!("{}", "  Never commit config.toml to git".dimmed());
    println!(
        "{}",
        "  Custom-field labels go under [field_labels] in the config file".dimmed()
    );

    Ok(())
}

fn prompt(message: &str) -> anyhow::Result<String> {
    use std::io::Write;
    print!("{}: ", message.bright_white());
    std::io::stdout().flush()?;
    let mut input = String::new();
    std::io::stdin().read_line(&mut input)?;
    Ok(input.trim().to_string())
}

fn prompt_password(message: &str) -> anyhow::Result<String> {
    use std::io::Write;
    print!("{}: ", message.bright_white());
    std::io::stdout().flush()?;
    let mut input = String::new();
    std::io::stdin().read_line(&mut input)?;
    Ok(input.trim().to_string())
}

fn prompt_with_default(message: &str, default: &str) -> anyhow::Result<String> {
    use std::io::Write;
    print!("{} [{}]: ", message.bright_white(), default.dimmed());
    std::io::stdout().flush()?;
    let mut input = String::new();
    std::io::stdin().read_line(&mut input)?;
    let trimmed = input.trim();
    if trimmed.is_empty() {
        Ok(default.to_string())
    } else {
        Ok(trimmed.to_string())
    }
}

fn handle_config(action: ConfigAction) -> anyhow::Result<()> {
    use config::settings::Settings;

    match action {
        ConfigAction::Show => {
            let settings = Settings::load()?;

            println!("{}", "Current Configuration".cyan().bold());
            println!();

            println!("{}", "[api]".bold());
            println!(
                "  {} {}",
                "base_url:".dimmed(),
                settings.api.base_url.bright_white()
            );
            println!(
                "  {} {}",
                "token:".dimmed(),
                mask_secret(&settings.api.token).yellow()
            );
            if let Some(team) = &settings.api.team_exclusion {
                println!("  {} {}", "team_exclusion:".dimmed(), team.bright_white());
            }

            println!();
            println!("{}", "[export]".bold());
            println!(
                "  {} {}",
                "destination:".dimmed(),
                settings.export.destination.bright_white()
            );
            println!(
                "  {} {}",
                "file_name:".dimmed(),
                settings.export.file_name.bright_white()
            );
            println!(
                "  {} {}",
                "actions_file_name:".dimmed(),
                settings.export.actions_file_name.bright_white()
            );

            println!();
            println!("{}", "[extract]".bold());
            println!(
                "  {} {}",
                "default_start_date:".dimmed(),
                settings.extract.default_start_date.bright_white()
            );
            println!(
                "  {} {}",
                "page_size:".dimmed(),
                settings.extract.page_size.to_string().bright_white()
            );

            if !settings.field_labels.is_empty() {
                println!();
                println!("{}", "[field_labels]".bold());
                let mut labels: Vec<_> = settings.field_labels.iter().collect();
                labels.sort();
                for (column, label) in labels {
                    println!("  {} {}", format!("{}:", column).dimmed(), label.bright_white());
                }
            }

            Ok(())
        }

        ConfigAction::Set { key, value } => {
            let mut settings = Settings::load()?;

            let parts: Vec<&str> = key.split('.').collect();
            if parts.len() != 2 {
                return Err(anyhow::anyhow!(
                    "Invalid key format. Use format: section.field (e.g., api.token)"
                ));
            }

            match (parts[0], parts[1]) {
                ("api", "base_url") => settings.api.base_url = value.clone(),
                ("api", "token") => settings.api.token = value.clone(),
                ("api", "team_exclusion") => {
                    settings.api.team_exclusion = if value.is_empty() {
                        None
                    } else {
                        Some(value.clone())
                    }
                }
                ("export", "destination") => settings.export.destination = value.clone(),
                ("export", "file_name") => settings.export.file_name = value.clone(),
                ("export", "actions_file_name") => {
                    settings.export.actions_file_name = value.clone()
                }
                ("extract", "default_start_date") => {
                    parse_day(&value)?;
                    settings.extract.default_start_date = value.clone();
                }
                ("extract", "page_size") => {
                    settings.extract.page_size = value
                        .parse()
                        .map_err(|_| anyhow::anyhow!("page_size must be a positive integer"))?;
                }
                _ => return Err(anyhow::anyhow!("Unknown configuration key: {}", key)),
            }

            settings.save()?;

            println!(
                "{}",
                format!("✓ Updated {} to: {}", key, value).green().bold()
            );
            println!();
            println!("{}", "Configuration saved successfully!".green());

            Ok(())
        }

        ConfigAction::Path => {
            let config_path = Settings::config_dir()?.join("config.toml");
            println!("{}", config_path.display());
            Ok(())
        }
    }
}

fn mask_secret(secret: &str) -> String {
    format!(
        "{}***{}",
        &secret[..4.min(secret.len())],
        &secret[secret.len().saturating_sub(4)..]
    )
}
