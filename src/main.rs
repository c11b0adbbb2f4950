use std::path::Path;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use cut_planner::app::App;
use cut_planner::client::SERVICE_WAKING_MESSAGE;
use cut_planner::config::Config;
use cut_planner::render;
use cut_planner::session::{CallbackListener, SessionManager};
use cut_planner::store::{CredentialStore, Draft};
use cut_planner::types::{Board, Cut, HistoryEntry};

#[derive(Parser)]
#[command(
    name = "cut_planner",
    about = "Plan lumber purchases and cutting layouts with the remote optimizer"
)]
struct Cli {
    /// Optimizer service base URL (overrides environment and config file)
    #[arg(long, global = true)]
    api_base: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Edit the required cuts
    Cut {
        #[command(subcommand)]
        action: CutAction,
    },
    /// Edit the available boards
    Board {
        #[command(subcommand)]
        action: BoardAction,
    },
    /// Show the current cuts, boards, and last result
    Show,
    /// Submit the current problem to the optimizer
    Optimize {
        /// Project name to save the run under
        #[arg(long)]
        project: Option<String>,
    },
    /// Check whether the optimizer service is awake
    Status,
    /// Log in through the identity provider
    Login,
    /// Log out and discard the stored credentials
    Logout,
    /// Show who is currently logged in
    Whoami,
    /// Browse saved optimization runs
    History {
        #[command(subcommand)]
        action: HistoryAction,
    },
}

#[derive(Subcommand)]
enum CutAction {
    /// Add a cut as WxHxL:qty (e.g. 2x4x24:3); omit for a starter cut
    Add { spec: Option<String> },
    /// Set one field (width, height, length, or quantity) of cut INDEX
    Set {
        index: usize,
        field: String,
        value: String,
    },
    /// Remove cut INDEX
    Rm { index: usize },
}

#[derive(Subcommand)]
enum BoardAction {
    /// Add a board as WxHxL:price (e.g. 2x4x96:8.50); omit for a starter board
    Add { spec: Option<String> },
    /// Set one field (width, height, length, or price) of board INDEX
    Set {
        index: usize,
        field: String,
        value: String,
    },
    /// Remove board INDEX
    Rm { index: usize },
}

#[derive(Subcommand)]
enum HistoryAction {
    /// List saved runs, newest first
    List {
        #[arg(long, default_value_t = 1)]
        page: u64,
    },
    /// Show one saved run without touching the current problem
    Show { id: String },
    /// Replace the current problem and result with a saved run
    Load { id: String },
    /// Delete a saved run
    Delete { id: String },
}

fn parse_dimensions(s: &str) -> Result<(f64, f64, f64), String> {
    let parts: Vec<&str> = s.split('x').collect();
    if parts.len() != 3 {
        return Err(format!("invalid dimensions '{}', expected WxHxL", s));
    }
    let width = parse_positive(parts[0], "width", s)?;
    let height = parse_positive(parts[1], "height", s)?;
    let length = parse_positive(parts[2], "length", s)?;
    Ok((width, height, length))
}

fn parse_positive(part: &str, name: &str, whole: &str) -> Result<f64, String> {
    let value = part
        .parse::<f64>()
        .map_err(|_| format!("invalid {} in '{}'", name, whole))?;
    if !value.is_finite() || value <= 0.0 {
        return Err(format!("{} must be positive in '{}'", name, whole));
    }
    Ok(value)
}

fn parse_cut(s: &str) -> Result<Cut, String> {
    let parts: Vec<&str> = s.split(':').collect();
    if parts.len() != 2 {
        return Err(format!("invalid cut '{}', expected WxHxL:qty", s));
    }
    let (width, height, length) = parse_dimensions(parts[0])?;
    let quantity = parts[1]
        .parse::<u64>()
        .map_err(|_| format!("invalid quantity in '{}'", s))?;
    if quantity == 0 {
        return Err(format!("quantity must be non-zero in '{}'", s));
    }
    Ok(Cut::new(width, height, length, quantity))
}

fn parse_board(s: &str) -> Result<Board, String> {
    let parts: Vec<&str> = s.split(':').collect();
    if parts.len() != 2 {
        return Err(format!("invalid board '{}', expected WxHxL:price", s));
    }
    let (width, height, length) = parse_dimensions(parts[0])?;
    let price = parts[1]
        .parse::<f64>()
        .map_err(|_| format!("invalid price in '{}'", s))?;
    if !price.is_finite() || price < 0.0 {
        return Err(format!("price must be non-negative in '{}'", s));
    }
    Ok(Board::new(width, height, length, price))
}

fn save_draft(app: &App, path: &Path) -> cut_planner::Result<()> {
    Draft {
        problem: app.problem.clone(),
        solution: app.solution.clone(),
    }
    .save(path)
}

fn print_entry(entry: &HistoryEntry) -> Result<(), cut_planner::Error> {
    let problem = cut_planner::types::Problem {
        cuts: entry.cuts.clone(),
        boards: entry.boards.clone(),
        project_name: entry.project_name.clone(),
    };
    println!("Saved {}", entry.created_at.format("%Y-%m-%d %H:%M"));
    print!("{}", render::render_problem(&problem));
    let report = cut_planner::report::build_report(&entry.boards, &entry.solution)?;
    println!();
    print!("{}", render::render_report(&report));
    Ok(())
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = Config::resolve(cli.api_base.as_deref())?;
    config.ensure_data_dir()?;
    let draft_path = config.draft_path();

    let store = CredentialStore::new(config.credential_path());
    let session = SessionManager::new(&config.api_base, store)?;
    let mut app = App::new(&config.api_base, session)?;

    let draft = Draft::load(&draft_path)?;
    app.problem = draft.problem;
    app.solution = draft.solution;

    match cli.command {
        Command::Cut { action } => {
            match action {
                CutAction::Add { spec: Some(spec) } => {
                    app.problem
                        .cuts
                        .push(parse_cut(&spec).map_err(anyhow::Error::msg)?);
                }
                CutAction::Add { spec: None } => app.problem.add_cut(),
                CutAction::Set {
                    index,
                    field,
                    value,
                } => {
                    let field = field.parse().map_err(anyhow::Error::msg)?;
                    app.problem.update_cut(index, field, &value);
                }
                CutAction::Rm { index } => app.problem.remove_cut(index),
            }
            save_draft(&app, &draft_path)?;
            print!("{}", render::render_problem(&app.problem));
        }

        Command::Board { action } => {
            match action {
                BoardAction::Add { spec: Some(spec) } => {
                    app.problem
                        .boards
                        .push(parse_board(&spec).map_err(anyhow::Error::msg)?);
                }
                BoardAction::Add { spec: None } => app.problem.add_board(),
                BoardAction::Set {
                    index,
                    field,
                    value,
                } => {
                    let field = field.parse().map_err(anyhow::Error::msg)?;
                    app.problem.update_board(index, field, &value);
                }
                BoardAction::Rm { index } => app.problem.remove_board(index),
            }
            save_draft(&app, &draft_path)?;
            print!("{}", render::render_problem(&app.problem));
        }

        Command::Show => {
            print!("{}", render::render_problem(&app.problem));
            if let Some(report) = app.report()? {
                println!();
                print!("{}", render::render_report(&report));
            }
        }

        Command::Optimize { project } => {
            app.session_mut().restore().await;
            if project.is_some() {
                app.problem.project_name = project;
            }
            let result = app.optimize().await;
            save_draft(&app, &draft_path)?;
            result?;
            if let Some(report) = app.report()? {
                print!("{}", render::render_report(&report));
            }
            if app.session().identity().is_some() {
                println!("\nSaved to your history.");
            }
        }

        Command::Status => {
            if app.ping().await {
                println!("The optimizer is awake.");
            } else {
                println!("{SERVICE_WAKING_MESSAGE}");
            }
        }

        Command::Login => {
            let listener = CallbackListener::bind().await?;
            let redirect = listener.redirect_url();
            let url = app.session().begin_login(Some(&redirect)).await?;
            println!("Open this URL in your browser to log in:\n\n  {url}\n");
            println!("Waiting for the login to complete...");
            let params = listener.wait_for_callback().await?;
            app.session_mut().complete_login(params).await?;
            match app.session().identity() {
                Some(identity) => println!("Logged in as {}.", identity.name),
                None => println!("Login did not complete. Try again."),
            }
        }

        Command::Logout => {
            app.logout()?;
            println!("Logged out.");
        }

        Command::Whoami => {
            app.session_mut().restore().await;
            match app.session().identity() {
                Some(identity) => match &identity.email {
                    Some(email) => println!("Logged in as {} <{}>.", identity.name, email),
                    None => println!("Logged in as {}.", identity.name),
                },
                None => println!("Not logged in."),
            }
        }

        Command::History { action } => {
            app.session_mut().restore().await;
            match action {
                HistoryAction::List { page } => {
                    let page = app.open_history(page).await?;
                    print!("{}", render::render_history_page(page));
                }
                HistoryAction::Show { id } => {
                    let entry = app.fetch_entry(&id).await?;
                    print_entry(&entry)?;
                }
                HistoryAction::Load { id } => {
                    app.reload_entry(&id).await?;
                    save_draft(&app, &draft_path)?;
                    println!("Loaded. Current problem replaced.\n");
                    print!("{}", render::render_problem(&app.problem));
                }
                HistoryAction::Delete { id } => {
                    let page = app.delete_entry(&id).await?;
                    println!("Deleted.\n");
                    print!("{}", render::render_history_page(page));
                }
            }
        }
    }

    Ok(())
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    // Crash reporting only when a DSN is configured; the guard must outlive
    // the runtime so panics get flushed.
    let _sentry = std::env::var("SENTRY_DSN").ok().map(|dsn| {
        sentry::init((
            dsn,
            sentry::ClientOptions {
                release: sentry::release_name!(),
                ..Default::default()
            },
        ))
    });

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = runtime.block_on(run(cli)) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
