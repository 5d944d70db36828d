//! Command-line interface for the discoboard binary.
//!
//! `sync` mirrors a local catalog into a new board; `plan` prints the epoch
//! grouping of a local catalog without touching the network.

use std::{
    io,
    path::PathBuf,
    process,
    sync::Arc,
};

use clap::{ArgAction, Args, Parser, Subcommand};
use discoboard::{
    BoardClient, BoardCredentials, Entry, Epoch, Error, MetadataClient, MetadataCredentials,
    Orchestrator, SyncReport, SyncSettings, build_client, group_into_epochs, load_catalog,
    load_settings,
};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Command line interface mirroring a dated catalog into a project board.
#[derive(Debug, Parser,)]
#[command(name = "discoboard", version, about = "Mirror a dated catalog into a project board")]
struct Cli
{
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand,)]
/// Supported commands exposed by the CLI.
enum Command
{
    /// Create a board from the local catalog with covers from the metadata service.
    Sync(SyncArgs,),
    /// Print the epoch grouping of the local catalog as JSON.
    Plan(PlanArgs,),
}

#[derive(Debug, Args,)]
/// Arguments accepted by the `sync` subcommand.
struct SyncArgs
{
    /// Path to the local catalog file.
    #[arg(long = "catalog", value_name = "PATH", default_value = "discography.txt")]
    catalog: PathBuf,

    /// Optional YAML settings document.
    #[arg(long = "settings", value_name = "PATH")]
    settings: Option<PathBuf,>,

    /// Subject whose catalog is mirrored (overrides settings).
    #[arg(long = "subject", value_name = "NAME")]
    subject: Option<String,>,

    /// Board title (overrides settings).
    #[arg(long = "board-name", value_name = "NAME")]
    board_name: Option<String,>,

    /// Wait for every cover attachment before reporting completion.
    #[arg(long = "await-attachments", action = ArgAction::SetTrue)]
    await_attachments: bool,

    #[command(flatten)]
    credentials: CredentialArgs,
}

#[derive(Debug, Args,)]
/// Service credentials, taken from flags or the environment.
struct CredentialArgs
{
    /// Metadata service client identifier.
    #[arg(long = "metadata-client-id", env = "SPOTIFY_CLIENT_ID", hide_env_values = true)]
    metadata_client_id: String,

    /// Metadata service client secret.
    #[arg(long = "metadata-client-secret", env = "SPOTIFY_CLIENT_SECRET", hide_env_values = true)]
    metadata_client_secret: String,

    /// Board service API key.
    #[arg(long = "board-api-key", env = "TRELLO_API_KEY", hide_env_values = true)]
    board_api_key: String,

    /// Board service user token.
    #[arg(long = "board-user-token", env = "TRELLO_USER_TOKEN", hide_env_values = true)]
    board_user_token: String,
}

impl CredentialArgs
{
    fn metadata(&self,) -> MetadataCredentials
    {
        MetadataCredentials {
            client_id:     self.metadata_client_id.clone(),
            client_secret: self.metadata_client_secret.clone(),
        }
    }

    fn board(&self,) -> BoardCredentials
    {
        BoardCredentials {
            api_key:    self.board_api_key.clone(),
            user_token: self.board_user_token.clone(),
        }
    }
}

#[derive(Debug, Args,)]
/// Arguments accepted by the `plan` subcommand.
struct PlanArgs
{
    /// Path to the local catalog file.
    #[arg(long = "catalog", value_name = "PATH", default_value = "discography.txt")]
    catalog: PathBuf,

    /// Output formatted JSON for easier inspection.
    #[arg(long = "pretty", action = ArgAction::SetTrue)]
    pretty: bool,
}

/// Entry point that reports errors and sets the appropriate exit status.
fn main()
{
    init_tracing();

    if let Err(error,) = run() {
        eprintln!("{}", error.to_display_string());
        process::exit(1,);
    }
}

fn init_tracing()
{
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info",),);
    tracing_subscriber::fmt().with_env_filter(filter,).with_writer(io::stderr,).init();
}

/// Executes the CLI using parsed arguments.
///
/// # Errors
///
/// Propagates catalog, settings, authentication and board creation errors.
/// Failures of single lists, cards or covers are logged and do not fail the
/// run.
fn run() -> Result<(), Error,>
{
    let cli = Cli::parse();

    match cli.command {
        Command::Sync(args,) => run_sync(args,),
        Command::Plan(args,) => run_plan(&args,),
    }
}

fn run_plan(args: &PlanArgs,) -> Result<(), Error,>
{
    let epochs = group_into_epochs(load_catalog(&args.catalog,)?,);

    let stdout = io::stdout();
    let mut handle = stdout.lock();
    write_plan(&mut handle, &epochs, args.pretty,)
}

fn write_plan<W: io::Write,>(writer: &mut W, epochs: &[Epoch<Entry,>], pretty: bool,) -> Result<(), Error,>
{
    if pretty {
        serde_json::to_writer_pretty(writer, epochs,)?;
    } else {
        serde_json::to_writer(writer, epochs,)?;
    }

    Ok((),)
}

/// Applies command-line overrides on top of the settings document.
fn resolve_settings(args: &SyncArgs,) -> Result<SyncSettings, Error,>
{
    let mut settings = match &args.settings {
        Some(path,) => load_settings(path,)?,
        None => SyncSettings::default(),
    };

    if let Some(subject,) = &args.subject {
        settings.subject = subject.clone();
    }
    if let Some(board_name,) = &args.board_name {
        settings.board_name = Some(board_name.clone(),);
    }
    settings.await_attachments |= args.await_attachments;

    settings.validate()?;
    Ok(settings,)
}

fn run_sync(args: SyncArgs,) -> Result<(), Error,>
{
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| Error::validation(format!("failed to start async runtime: {e}"),),)?;

    runtime.block_on(sync(&args,),)
}

async fn sync(args: &SyncArgs,) -> Result<(), Error,>
{
    let settings = resolve_settings(args,)?;
    let local = group_into_epochs(load_catalog(&args.catalog,)?,);
    info!("Loaded {} epochs from {}", local.len(), args.catalog.display());

    let http = build_client()?;
    let board = BoardClient::with_base(
        http.clone(),
        settings.endpoints.board_api.as_str(),
        args.credentials.board(),
        settings.request_quota(),
    )?;
    let metadata = MetadataClient::connect(
        http,
        settings.metadata_endpoints(),
        &args.credentials.metadata(),
        settings.retry_policy(),
    )
    .await?;

    let subject = metadata.resolve_subject(&settings.subject,).await?;
    let remote = group_into_epochs(metadata.list_catalog(&subject, settings.paging(),).await?,);

    let total: usize = local.iter().map(|epoch| epoch.members.len(),).sum();
    let orchestrator = Orchestrator::new(Arc::new(board,), Arc::new(metadata,), settings.sync_options(),)
        .with_progress(card_progress(total,)?,);
    let report = orchestrator.run(&local, &remote,).await?;

    finish(report,).await;
    Ok((),)
}

fn card_progress(total: usize,) -> Result<ProgressBar, Error,>
{
    let style = ProgressStyle::default_bar()
        .template("{spinner:.yellow} [{elapsed_precise}] {bar:30.cyan} {pos}/{len} cards",)
        .map_err(|e| Error::validation(format!("invalid progress template: {e}"),),)?;

    Ok(ProgressBar::new(total as u64,).with_style(style,),)
}

/// Logs the report and drains detached attachments before the process exits.
async fn finish(report: SyncReport,)
{
    for failure in report.failures() {
        warn!("{}", failure);
    }
    info!(
        "Board {}: {} lists, {} cards",
        report.board_id,
        report.lists_created(),
        report.cards_created()
    );

    if report.pending.is_empty() {
        return;
    }

    info!("Waiting for {} cover attachments", report.pending.len());
    let summary = report.pending.wait().await;
    info!("Attached {} covers, {} failed", summary.attached, summary.failed);
}

#[cfg(test)]
mod tests
{
    use std::{fs, io::Cursor, path::Path};

    use clap::Parser;
    use discoboard::{Entry, Epoch};
    use tempfile::tempdir;

    use super::{Cli, Command, PlanArgs, SyncArgs, resolve_settings, run_plan, write_plan};

    const CREDENTIALS: [&str; 8] = [
        "--metadata-client-id",
        "id",
        "--metadata-client-secret",
        "secret",
        "--board-api-key",
        "key",
        "--board-user-token",
        "token",
    ];

    fn parse_sync(extra: &[&str],) -> SyncArgs
    {
        let mut argv = vec![env!("CARGO_PKG_NAME"), "sync"];
        argv.extend(CREDENTIALS,);
        argv.extend(extra,);

        match Cli::try_parse_from(argv,).expect("failed to parse CLI",).command {
            Command::Sync(args,) => args,
            other => panic!("unexpected command variant: {other:?}"),
        }
    }

    #[test]
    fn sync_defaults_to_local_catalog_file()
    {
        let args = parse_sync(&[],);

        assert_eq!(args.catalog, Path::new("discography.txt"));
        assert!(args.settings.is_none());
        assert!(!args.await_attachments);
        assert_eq!(args.credentials.board().user_token, "token");
        assert_eq!(args.credentials.metadata().client_id, "id");
    }

    #[test]
    fn flags_override_settings_document()
    {
        let temp = tempdir().expect("failed to create tempdir",);
        let settings_path = temp.path().join("settings.yaml",);
        fs::write(&settings_path, "subject: Joni Mitchell\nretry:\n  max_attempts: 2\n",)
            .expect("failed to write settings",);

        let args = parse_sync(&[
            "--settings",
            settings_path.to_str().expect("utf8",),
            "--subject",
            "Nina Simone",
            "--await-attachments",
        ],);
        let settings = resolve_settings(&args,).expect("valid settings",);

        assert_eq!(settings.subject, "Nina Simone");
        assert_eq!(settings.board_name(), "Nina Simone's discography");
        assert_eq!(settings.retry.max_attempts, 2);
        assert!(settings.await_attachments);
    }

    #[test]
    fn blank_subject_flag_is_rejected()
    {
        let args = parse_sync(&["--subject", " "],);
        let error = resolve_settings(&args,).expect_err("expected validation error",);

        match error {
            discoboard::Error::Validation {
                message,
            } => assert_eq!(message, "subject must not be empty"),
            other => panic!("unexpected error variant: {other:?}"),
        }
    }

    #[test]
    fn plan_pretty_flag_uses_pretty_writer()
    {
        let cli = Cli::try_parse_from([env!("CARGO_PKG_NAME"), "plan", "--catalog", "albums.txt", "--pretty",],)
            .expect("failed to parse CLI",);

        let args = match cli.command {
            Command::Plan(args,) => args,
            other => panic!("unexpected command variant: {other:?}"),
        };
        assert!(args.pretty);
        assert_eq!(args.catalog, Path::new("albums.txt"));

        let epochs = vec![Epoch {
            key:     "197".to_owned(),
            members: vec![Entry::new(1976, "Desire",)],
        }];
        let mut buffer = Cursor::new(Vec::new(),);
        write_plan(&mut buffer, &epochs, args.pretty,).expect("failed to serialize plan",);

        let output = String::from_utf8(buffer.into_inner(),).expect("invalid UTF-8",);
        assert!(output.starts_with("[\n  {\n    \"key\": \"197\""));
    }

    #[test]
    fn compact_plan_lists_epochs_in_order()
    {
        let epochs = vec![
            Epoch {
                key: "196".to_owned(), members: vec![Entry::new(1962, "Bob Dylan",)],
            },
            Epoch {
                key: "197".to_owned(), members: vec![Entry::new(1976, "Desire",)],
            },
        ];
        let mut buffer = Cursor::new(Vec::new(),);
        write_plan(&mut buffer, &epochs, false,).expect("failed to serialize plan",);

        let output = String::from_utf8(buffer.into_inner(),).expect("invalid UTF-8",);
        assert_eq!(
            output,
            r#"[{"key":"196","members":[{"year":1962,"name":"Bob Dylan"}]},{"key":"197","members":[{"year":1976,"name":"Desire"}]}]"#
        );
    }

    #[test]
    fn plan_reports_malformed_catalog()
    {
        let temp = tempdir().expect("failed to create tempdir",);
        let catalog = temp.path().join("discography.txt",);
        fs::write(&catalog, "1976 Desire\n76 Street Legal\n",).expect("failed to write catalog",);

        let error = run_plan(&PlanArgs {
            catalog, pretty: false,
        },)
        .expect_err("expected malformed record",);

        match error {
            discoboard::Error::MalformedRecord {
                line,
                content,
            } => {
                assert_eq!(line, 2);
                assert_eq!(content, "76 Street Legal");
            }
            other => panic!("unexpected error variant: {other:?}"),
        }
    }
}
