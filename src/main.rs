//! `pushbullet` - command-line client for the Pushbullet API.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand};
use pushbullet_sdk::api::{
    ApiClient, ApiClientOptions, DeviceUpdate, FileUpload, NewDevice, OctetStreamDetector,
    PushBuilder, PushQuery, Targets, API_BASE_URL,
};
use pushbullet_sdk::retry::{retry_api, RetryPolicy};
use pushbullet_sdk::stream::{StreamClient, StreamError, StreamEvent, StreamSession};
use secrecy::SecretString;
use serde::Serialize;
use tracing::warn;
use tracing_subscriber::EnvFilter;

const RECONNECT_DELAY: Duration = Duration::from_secs(1);

#[derive(Parser, Debug)]
#[command(name = "pushbullet")]
#[command(version, about = "Send and receive Pushbullet pushes", long_about = None)]
struct Cli {
    /// Access token from the account settings page
    #[arg(long, env = "PUSHBULLET_API_KEY", hide_env_values = true, global = true)]
    api_key: Option<String>,

    /// REST API root
    #[arg(long, default_value = API_BASE_URL, global = true)]
    api_url: String,

    /// Realtime stream base URL
    #[arg(long, global = true)]
    stream_url: Option<String>,

    /// Print raw JSON instead of the short human form
    #[arg(long, global = true)]
    json: bool,

    /// Enable debug logging on stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    // === Devices ===
    /// List devices on the account
    Devices,

    /// Register a new device
    DeviceAdd { nickname: String },

    /// Change a device nickname
    DeviceRename { iden: String, nickname: String },

    /// Remove a device
    DeviceDelete { iden: String },

    // === Pushes ===
    /// Push a note
    Note {
        title: String,
        body: Vec<String>,
        #[command(flatten)]
        target: TargetArgs,
    },

    /// Push a link
    Link {
        title: String,
        url: String,
        body: Vec<String>,
        #[command(flatten)]
        target: TargetArgs,
    },

    /// Push a checklist
    List {
        title: String,
        items: Vec<String>,
        #[command(flatten)]
        target: TargetArgs,
    },

    /// Push a street address
    Address {
        name: String,
        address: Vec<String>,
        #[command(flatten)]
        target: TargetArgs,
    },

    /// Upload a file and push it
    File {
        path: PathBuf,
        /// MIME type; defaults to application/octet-stream
        #[arg(long)]
        file_type: Option<String>,
        /// Message sent along with the file
        #[arg(long)]
        body: Option<String>,
        #[command(flatten)]
        target: TargetArgs,
    },

    /// List push history, newest first
    Pushes {
        #[arg(long)]
        limit: Option<usize>,
        /// Only pushes modified after this unix timestamp
        #[arg(long)]
        modified_after: Option<f64>,
    },

    /// Mark a push as dismissed
    PushDismiss { iden: String },

    /// Delete a push
    PushDelete { iden: String },

    // === Account ===
    /// Show the account that owns the key
    User,

    /// List contacts
    Contacts,

    /// Delete a contact
    ContactDelete { iden: String },

    /// Print live events until interrupted
    Stream,
}

/// Push destination; at most one may be given.
#[derive(Args, Debug, Default)]
struct TargetArgs {
    /// Device iden
    #[arg(long)]
    device: Option<String>,
    /// Recipient email address
    #[arg(long)]
    email: Option<String>,
    /// Channel tag
    #[arg(long)]
    channel: Option<String>,
    /// OAuth client iden
    #[arg(long)]
    client: Option<String>,
}

impl From<TargetArgs> for Targets {
    fn from(args: TargetArgs) -> Self {
        Self {
            device_iden: args.device,
            email: args.email,
            channel_tag: args.channel,
            client_iden: args.client,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            return if err.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

struct CliContext {
    api_key: Option<String>,
    api_url: String,
    stream_url: Option<String>,
    json: bool,
    policy: RetryPolicy,
}

impl CliContext {
    fn client(&self) -> Result<ApiClient> {
        let api_key = self
            .api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| anyhow!("missing API key: pass --api-key or set PUSHBULLET_API_KEY"))?;
        let options = ApiClientOptions {
            base_url: self.api_url.clone(),
            ..ApiClientOptions::default()
        };
        ApiClient::with_options(SecretString::new(api_key), options)
            .context("failed to build API client")
    }

    /// Prints `value` as JSON, or the human line when `--json` is off.
    fn emit<T: Serialize>(&self, value: &T, human: impl FnOnce() -> String) -> Result<()> {
        if self.json {
            println!("{}", serde_json::to_string_pretty(value)?);
        } else {
            println!("{}", human());
        }
        Ok(())
    }

    fn ok(&self) {
        if !self.json {
            println!("OK");
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let ctx = CliContext {
        api_key: cli.api_key,
        api_url: cli.api_url,
        stream_url: cli.stream_url,
        json: cli.json,
        policy: RetryPolicy::interactive(),
    };

    match cli.command {
        Commands::Devices => {
            let client = ctx.client()?;
            let devices = retry_api(&ctx.policy, |_| client.list_devices()).await?;
            if ctx.json {
                return ctx.emit(&devices, String::new);
            }
            for device in devices.iter().filter(|device| device.active) {
                println!("{} {}", device.iden, device.display_name());
            }
            Ok(())
        }
        Commands::DeviceAdd { nickname } => {
            let client = ctx.client()?;
            let device = client.create_device(&NewDevice::named(nickname)).await?;
            ctx.emit(&device, || "OK".to_string())
        }
        Commands::DeviceRename { iden, nickname } => {
            let client = ctx.client()?;
            let update = DeviceUpdate {
                nickname: Some(nickname),
                ..DeviceUpdate::default()
            };
            let device = client.update_device(&iden, &update).await?;
            ctx.emit(&device, || "OK".to_string())
        }
        Commands::DeviceDelete { iden } => {
            ctx.client()?.delete_device(&iden).await?;
            ctx.ok();
            Ok(())
        }
        Commands::Note {
            title,
            body,
            target,
        } => {
            let builder = PushBuilder::note(title, body.join(" "));
            send_push(&ctx, builder.targets(target.into())).await
        }
        Commands::Link {
            title,
            url,
            body,
            target,
        } => {
            let builder = PushBuilder::link(title, url).body(body.join(" "));
            send_push(&ctx, builder.targets(target.into())).await
        }
        Commands::List {
            title,
            items,
            target,
        } => send_push(&ctx, PushBuilder::list(title, items).targets(target.into())).await,
        Commands::Address {
            name,
            address,
            target,
        } => {
            let builder = PushBuilder::address(name, address.join(" "));
            send_push(&ctx, builder.targets(target.into())).await
        }
        Commands::File {
            path,
            file_type,
            body,
            target,
        } => {
            let target = Targets::from(target).resolve()?;
            let client = ctx.client()?;
            let mut upload = FileUpload::from_path(&path)
                .await
                .with_context(|| format!("failed to read {}", path.display()))?;
            upload.file_type = file_type;
            upload.body = body;
            let push = client
                .push_file(upload, target, &OctetStreamDetector)
                .await?;
            ctx.emit(&push, || "OK".to_string())
        }
        Commands::Pushes {
            limit,
            modified_after,
        } => {
            let client = ctx.client()?;
            let query = PushQuery {
                modified_after,
                limit,
                ..PushQuery::default()
            };
            let pushes = retry_api(&ctx.policy, |_| client.list_pushes(&query)).await?;
            if ctx.json {
                return ctx.emit(&pushes, String::new);
            }
            for push in &pushes {
                println!("{} {} {}", push.iden, push.kind.as_str(), push_summary(push));
            }
            Ok(())
        }
        Commands::PushDismiss { iden } => {
            let push = ctx.client()?.dismiss_push(&iden).await?;
            ctx.emit(&push, || "OK".to_string())
        }
        Commands::PushDelete { iden } => {
            ctx.client()?.delete_push(&iden).await?;
            ctx.ok();
            Ok(())
        }
        Commands::User => {
            let client = ctx.client()?;
            let user = retry_api(&ctx.policy, |_| client.current_user()).await?;
            ctx.emit(&user, || format!("{} {} {}", user.iden, user.email, user.name))
        }
        Commands::Contacts => {
            let client = ctx.client()?;
            let contacts = retry_api(&ctx.policy, |_| client.list_contacts()).await?;
            if ctx.json {
                return ctx.emit(&contacts, String::new);
            }
            for contact in &contacts {
                println!("{} {} {}", contact.iden, contact.email, contact.name);
            }
            Ok(())
        }
        Commands::ContactDelete { iden } => {
            ctx.client()?.delete_contact(&iden).await?;
            ctx.ok();
            Ok(())
        }
        Commands::Stream => stream(&ctx).await,
    }
}

async fn send_push(ctx: &CliContext, builder: PushBuilder) -> Result<()> {
    let push = builder.build()?;
    let created = ctx.client()?.create_push(&push).await?;
    ctx.emit(&created, || {
        if created.is_created() {
            "OK".to_string()
        } else {
            format!("accepted {}", created.iden)
        }
    })
}

async fn stream(ctx: &CliContext) -> Result<()> {
    let client = ctx.client()?;
    let mut connector = StreamClient::from_api(&client);
    if let Some(url) = &ctx.stream_url {
        connector = connector.with_endpoint(url.clone());
    }
    let mut session = StreamSession::new(client, connector);

    let cancel = session.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });

    session.connect().await.context("failed to open stream")?;
    loop {
        match session.next_event().await {
            Ok(event) => print_event(ctx, &event)?,
            Err(StreamError::Cancelled) => return Ok(()),
            Err(StreamError::ConnectionClosed) => {
                warn!(event = "stream_reconnect", delay_ms = RECONNECT_DELAY.as_millis() as u64);
                let cancel = session.cancel_token();
                tokio::select! {
                    _ = cancel.cancelled() => return Ok(()),
                    _ = tokio::time::sleep(RECONNECT_DELAY) => {}
                }
                match session.connect().await {
                    Ok(()) => {}
                    Err(StreamError::Cancelled) => return Ok(()),
                    Err(err) => return Err(err).context("failed to reconnect stream"),
                }
            }
            Err(err) => return Err(err.into()),
        }
    }
}

fn print_event(ctx: &CliContext, event: &StreamEvent) -> Result<()> {
    if ctx.json {
        let line = match event {
            StreamEvent::Push(push) => serde_json::to_string(push)?,
            StreamEvent::Ephemeral(ephemeral) => serde_json::to_string(ephemeral)?,
        };
        println!("{line}");
        return Ok(());
    }
    match event {
        StreamEvent::Push(push) => {
            println!("push {} {} {}", push.iden, push.kind.as_str(), push_summary(push));
        }
        StreamEvent::Ephemeral(ephemeral) => println!(
            "mirror {}: {} {}",
            ephemeral.application_name.as_deref().unwrap_or("unknown"),
            ephemeral.title.as_deref().unwrap_or_default(),
            ephemeral.body.as_deref().unwrap_or_default()
        ),
    }
    Ok(())
}

fn push_summary(push: &pushbullet_sdk::api::Push) -> &str {
    [
        push.title.as_deref(),
        push.name.as_deref(),
        push.file_name.as_deref(),
        push.body.as_deref(),
        push.url.as_deref(),
    ]
    .into_iter()
    .flatten()
    .find(|text| !text.is_empty())
    .unwrap_or("")
}
