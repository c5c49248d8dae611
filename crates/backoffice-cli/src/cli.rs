//! Argument parsing and command dispatch.

use backoffice_telemetry::{
    CommandSpanGuard, DEFAULT_LOG_LEVEL, LogFormat, LoggingConfig, compiled_build_sha, init_logging,
};
use clap::{Args, Parser, Subcommand, ValueEnum};
use url::Url;
use uuid::Uuid;

use crate::client::{AppContext, CliResult, parse_key_value, parse_url};
use crate::commands::catalog::{handle_model_get, handle_search};
use crate::commands::report::{
    handle_report_action, handle_report_bulk, handle_report_link, handle_report_list,
};
use crate::commands::view::{handle_view_action, handle_view_get, handle_view_post};
use crate::output::print_messages;

const DEFAULT_API_URL: &str = "http://127.0.0.1:8000/backoffice/api/";
const DEFAULT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_SLOW_MS: u64 = 1000;

/// Parses CLI arguments, executes the requested command, and prints any
/// server notifications. Returns the process exit code.
pub async fn run() -> i32 {
    let cli = Cli::parse();
    let trace_id = Uuid::new_v4().to_string();

    if let Err(err) = init_logging(&LoggingConfig {
        level: &cli.log_level,
        format: cli.log_format,
        build_sha: compiled_build_sha(),
    }) {
        eprintln!("warning: {err:#}");
    }
    let _span = CommandSpanGuard::new(command_label(&cli.command), &trace_id);

    let ctx = match AppContext::from_cli(&cli, &trace_id) {
        Ok(ctx) => ctx,
        Err(err) => {
            eprintln!("error: {}", err.display_message());
            return err.exit_code();
        }
    };

    let result = dispatch(cli.command, &ctx, cli.output).await;
    print_messages(&ctx.notifications.drain());

    match result {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("error: {}", err.display_message());
            err.exit_code()
        }
    }
}

async fn dispatch(command: Command, ctx: &AppContext, output: OutputFormat) -> CliResult<()> {
    match command {
        Command::View(view) => match view {
            ViewCommand::Get(args) => handle_view_get(ctx, args, output).await,
            ViewCommand::Post(args) => handle_view_post(ctx, args, output).await,
            ViewCommand::Action(args) => handle_view_action(ctx, args, output).await,
        },
        Command::Report(report) => match report {
            ReportCommand::Ls(args) => handle_report_list(ctx, args, output).await,
            ReportCommand::Action(args) => handle_report_action(ctx, args, output).await,
            ReportCommand::Bulk(args) => handle_report_bulk(ctx, args, output).await,
            ReportCommand::Link(args) => handle_report_link(ctx, args).await,
        },
        Command::Model(ModelCommand::Get(args)) => handle_model_get(ctx, args, output).await,
        Command::Search(args) => handle_search(ctx, args, output).await,
    }
}

const fn command_label(command: &Command) -> &'static str {
    match command {
        Command::View(ViewCommand::Get(_)) => "view_get",
        Command::View(ViewCommand::Post(_)) => "view_post",
        Command::View(ViewCommand::Action(_)) => "view_action",
        Command::Report(ReportCommand::Ls(_)) => "report_ls",
        Command::Report(ReportCommand::Action(_)) => "report_action",
        Command::Report(ReportCommand::Bulk(_)) => "report_bulk",
        Command::Report(ReportCommand::Link(_)) => "report_link",
        Command::Model(ModelCommand::Get(_)) => "model_get",
        Command::Search(_) => "search",
    }
}

#[derive(Parser)]
#[command(name = "backoffice", about = "Command-line client for back-office views and reports")]
pub(crate) struct Cli {
    #[arg(
        long,
        global = true,
        env = "BACKOFFICE_API_URL",
        value_parser = parse_url,
        default_value = DEFAULT_API_URL
    )]
    pub(crate) api_url: Url,
    #[arg(
        long,
        global = true,
        env = "BACKOFFICE_REPORT_URL",
        value_parser = parse_url,
        help = "Base URL lazy report fragments resolve against (defaults to the API URL)"
    )]
    pub(crate) report_url: Option<Url>,
    #[arg(
        long,
        global = true,
        env = "BACKOFFICE_COOKIE",
        help = "Cookie header sent with every request; its csrftoken cookie is also sent as X-CSRFToken"
    )]
    pub(crate) cookie: Option<String>,
    #[arg(
        long,
        global = true,
        env = "BACKOFFICE_HTTP_TIMEOUT_SECS",
        default_value_t = DEFAULT_TIMEOUT_SECS
    )]
    pub(crate) timeout: u64,
    #[arg(
        long,
        global = true,
        env = "BACKOFFICE_SLOW_MS",
        default_value_t = DEFAULT_SLOW_MS
    )]
    pub(crate) slow_ms: u64,
    #[arg(
        long,
        global = true,
        env = "BACKOFFICE_LOG_LEVEL",
        default_value = DEFAULT_LOG_LEVEL
    )]
    pub(crate) log_level: String,
    #[arg(
        long,
        global = true,
        env = "BACKOFFICE_LOG_FORMAT",
        default_value = "auto",
        value_parser = parse_log_format
    )]
    pub(crate) log_format: LogFormat,
    #[arg(
        long = "output",
        alias = "format",
        global = true,
        value_enum,
        default_value_t = OutputFormat::Table,
        help = "Select output format for commands that render structured data"
    )]
    pub(crate) output: OutputFormat,
    #[command(subcommand)]
    pub(crate) command: Command,
}

#[derive(Subcommand)]
pub(crate) enum Command {
    #[command(subcommand)]
    View(ViewCommand),
    #[command(subcommand)]
    Report(ReportCommand),
    #[command(subcommand)]
    Model(ModelCommand),
    /// Search every registered model.
    Search(SearchArgs),
}

#[derive(Subcommand)]
pub(crate) enum ViewCommand {
    /// Fetch a view's rendered content.
    Get(ViewTargetArgs),
    /// Post a form to a view.
    Post(ViewPostArgs),
    /// Invoke a method on a view.
    Action(ViewActionArgs),
}

#[derive(Subcommand)]
pub(crate) enum ReportCommand {
    /// List one page of a report.
    Ls(ReportListArgs),
    /// Run an action on one report row.
    Action(ReportActionArgs),
    /// Run a bulk action on selected rows.
    Bulk(ReportBulkArgs),
    /// Print the navigation URL of a link action.
    Link(ReportLinkArgs),
}

#[derive(Subcommand)]
pub(crate) enum ModelCommand {
    /// Show one model instance with its tabs and relations.
    Get(ModelGetArgs),
}

#[derive(Args, Debug, Clone)]
pub(crate) struct ViewTargetArgs {
    /// Slug of the view.
    #[arg(long)]
    pub(crate) slug: String,
    /// Extra view parameter as `key=value`; may be repeated.
    #[arg(long = "param", value_parser = parse_key_value)]
    pub(crate) params: Vec<(String, String)>,
}

#[derive(Args, Debug, Clone)]
pub(crate) struct ViewPostArgs {
    #[command(flatten)]
    pub(crate) target: ViewTargetArgs,
    /// Form field as `name=value`; may be repeated.
    #[arg(long = "field", value_parser = parse_key_value)]
    pub(crate) fields: Vec<(String, String)>,
}

#[derive(Args, Debug, Clone)]
pub(crate) struct ViewActionArgs {
    #[command(flatten)]
    pub(crate) target: ViewTargetArgs,
    /// Method to invoke.
    #[arg(long)]
    pub(crate) method: String,
    /// JSON parameters for the method.
    #[arg(long, default_value = "{}")]
    pub(crate) params_json: String,
    /// Refetch the view after the call succeeds.
    #[arg(long)]
    pub(crate) reload: bool,
    /// Suffix appended to the action endpoint, e.g. `?page=2`.
    #[arg(long)]
    pub(crate) suffix: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub(crate) struct ReportQueryArgs {
    #[command(flatten)]
    pub(crate) target: ViewTargetArgs,
    /// Page to load.
    #[arg(long)]
    pub(crate) page: Option<u32>,
    /// Ordering field, `-` prefixed for descending.
    #[arg(long, allow_hyphen_values = true)]
    pub(crate) order: Option<String>,
    /// Filter as `key=value`; may be repeated.
    #[arg(long = "filter", value_parser = parse_key_value)]
    pub(crate) filters: Vec<(String, String)>,
}

#[derive(Args, Debug, Clone)]
pub(crate) struct ReportListArgs {
    #[command(flatten)]
    pub(crate) query: ReportQueryArgs,
}

#[derive(Args, Debug, Clone)]
pub(crate) struct ReportActionArgs {
    #[command(flatten)]
    pub(crate) query: ReportQueryArgs,
    /// Row identifier.
    pub(crate) item_id: String,
    /// Action method.
    pub(crate) method: String,
    /// Confirm actions that ask for confirmation.
    #[arg(long)]
    pub(crate) yes: bool,
    /// Serialized form data for form actions.
    #[arg(long)]
    pub(crate) data: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub(crate) struct ReportBulkArgs {
    #[command(flatten)]
    pub(crate) query: ReportQueryArgs,
    /// Bulk action method.
    pub(crate) method: String,
    /// Rows to select.
    pub(crate) item_ids: Vec<String>,
    /// Select every row matching the query.
    #[arg(long)]
    pub(crate) global: bool,
    /// Confirm actions that ask for confirmation.
    #[arg(long)]
    pub(crate) yes: bool,
}

#[derive(Args, Debug, Clone)]
pub(crate) struct ReportLinkArgs {
    #[command(flatten)]
    pub(crate) query: ReportQueryArgs,
    /// Row identifier.
    pub(crate) item_id: String,
    /// Link action method.
    pub(crate) method: String,
}

#[derive(Args, Debug, Clone)]
pub(crate) struct ModelGetArgs {
    /// Model slug, e.g. `user`.
    #[arg(long)]
    pub(crate) model: String,
    /// Primary key of the instance.
    #[arg(long)]
    pub(crate) pk: String,
}

#[derive(Args, Debug, Clone)]
pub(crate) struct SearchArgs {
    /// Search text.
    pub(crate) q: String,
    /// Result page to show.
    #[arg(long)]
    pub(crate) page: Option<u32>,
    /// Only list hits for this model slug.
    #[arg(long)]
    pub(crate) filter_model: Option<String>,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub(crate) enum OutputFormat {
    Table,
    Json,
}

fn parse_log_format(input: &str) -> Result<LogFormat, String> {
    input.parse()
}
