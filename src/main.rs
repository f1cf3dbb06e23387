use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tokio::signal;
use tracing::{Level, info, warn};
use webagent::{
    api::{ApiClient, GenerateRequest, RegisterRequest},
    auth::{AuthSession, FileTokenStore},
    config::{ClientConfig, DEFAULT_API_URL, PreviewConfig},
    observability::{LoggingConfig, init_logging, parse_level},
    preview,
    view::TerminalView,
    workspace::{DriveOutcome, GenerationObserver, Workspace},
};

#[derive(Parser, Debug)]
#[command(name = "webagent")]
#[command(about = "Describe a website, stream the generated page, preview it locally")]
#[command(long_about = r#"
webagent - terminal client for the website generator

Examples:
  webagent login --username alice --password secret
  webagent generate --prompt "Landing page for a bakery" --out bakery.html --preview
  webagent generate --image mockup.png --show-code
"#)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug)]
struct GlobalArgs {
    #[arg(long, global = true, env = "WEBAGENT_API_URL", default_value = DEFAULT_API_URL)]
    api_url: String,

    #[arg(long, global = true, default_value_t = 60)]
    timeout_secs: u64,

    #[arg(long, global = true, default_value_t = 30)]
    stream_timeout_secs: u64,

    #[arg(long, global = true, env = "WEBAGENT_TOKEN_FILE")]
    token_file: Option<PathBuf>,

    #[arg(long, global = true, default_value = "warn", value_parser = ["trace", "debug", "info", "warn", "error"])]
    log_level: String,

    #[arg(long, global = true)]
    log_dir: Option<String>,

    #[arg(long, global = true, default_value_t = false)]
    log_json: bool,

    #[arg(long, global = true, default_value = "127.0.0.1")]
    preview_host: String,

    #[arg(long, global = true, default_value_t = 5173)]
    preview_port: u16,
}

impl GlobalArgs {
    fn to_client_config(&self) -> ClientConfig {
        ClientConfig {
            api_url: self.api_url.clone(),
            request_timeout_secs: self.timeout_secs,
            stream_timeout_secs: self.stream_timeout_secs,
            token_file: self.token_file.clone(),
            preview: PreviewConfig {
                host: self.preview_host.clone(),
                port: self.preview_port,
            },
            ..Default::default()
        }
    }

    fn to_logging_config(&self) -> LoggingConfig {
        LoggingConfig {
            level: parse_level(&self.log_level).unwrap_or(Level::WARN),
            json_format: self.log_json,
            log_dir: self.log_dir.clone(),
            ..Default::default()
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create an account and log in
    Register {
        #[arg(long)]
        name: String,
        #[arg(long, env = "WEBAGENT_PASSWORD")]
        password: String,
        /// Key the backend uses for the upstream model provider
        #[arg(long)]
        api_key: String,
    },
    Login {
        #[arg(long)]
        username: String,
        #[arg(long, env = "WEBAGENT_PASSWORD")]
        password: String,
    },
    Logout,
    /// Show the logged-in user
    Whoami,
    UpdateApiKey {
        #[arg(long)]
        new_api_key: String,
        #[arg(long, env = "WEBAGENT_PASSWORD")]
        current_password: String,
    },
    /// List design styles
    Styles,
    SiteTypes,
    Templates,
    /// Describe a design image without generating code
    AnalyzeImage { path: PathBuf },
    /// Generate a website
    Generate(GenerateArgs),
}

#[derive(Args, Debug)]
struct GenerateArgs {
    #[arg(long, conflicts_with = "image")]
    prompt: Option<String>,

    /// Design image to build the site from
    #[arg(long)]
    image: Option<PathBuf>,

    #[arg(long)]
    style: Option<String>,

    #[arg(long)]
    site_type: Option<String>,

    /// Earlier page to refine
    #[arg(long, requires = "prompt")]
    previous_html: Option<PathBuf>,

    #[arg(long, requires = "previous_html")]
    previous_prompt: Option<String>,

    #[arg(long, default_value = "index.html")]
    out: PathBuf,

    /// Serve the page on the preview address while and after generating
    #[arg(long, default_value_t = false)]
    preview: bool,

    /// Stream the code section to the terminal too
    #[arg(long, default_value_t = false)]
    show_code: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let _log_guard = init_logging(cli.global.to_logging_config());

    let config = cli.global.to_client_config();
    config.validate()?;

    actix_web::rt::System::new().block_on(run(cli.command, config))
}

async fn run(command: Commands, config: ClientConfig) -> Result<()> {
    let api = ApiClient::new(&config.api_url, config.request_timeout())?;
    let token_path = config.token_path()?;
    let session = AuthSession::new(api, FileTokenStore::new(token_path));

    match command {
        Commands::Register {
            name,
            password,
            api_key,
        } => {
            let request = RegisterRequest {
                name,
                password,
                api_key,
            };
            let user = session.register(&request).await?;
            println!("Registered and logged in as {}", user.name);
        }
        Commands::Login { username, password } => {
            let user = session.login(&username, &password).await?;
            println!("Logged in as {}", user.name);
        }
        Commands::Logout => {
            session.logout()?;
            println!("Logged out");
        }
        Commands::Whoami => {
            let user = session
                .current_user()
                .await
                .context("Not authenticated, run `webagent login`")?;
            println!("{} ({})", user.name, user.id);
        }
        Commands::UpdateApiKey {
            new_api_key,
            current_password,
        } => {
            session
                .update_api_key(&new_api_key, &current_password)
                .await?;
            println!("API key updated");
        }
        Commands::Styles => print_json(&session.api().design_styles().await)?,
        Commands::SiteTypes => print_json(&session.api().site_types().await)?,
        Commands::Templates => print_json(&session.api().templates().await)?,
        Commands::AnalyzeImage { path } => {
            let access_token = session.access_token().await?;
            let analysis = session
                .api()
                .analyze_image(access_token.as_deref(), &path)
                .await?;
            println!("{}", analysis.description);
        }
        Commands::Generate(args) => generate(&session, &config, args).await?,
    }
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn generate(
    session: &AuthSession<FileTokenStore>,
    config: &ClientConfig,
    args: GenerateArgs,
) -> Result<()> {
    if args.image.is_none() && args.prompt.as_deref().is_none_or(|p| p.trim().is_empty()) {
        bail!("Please enter a prompt or upload an image");
    }

    let access_token = session
        .access_token()
        .await
        .context("Session expired, please log in again")?;
    let access_token = access_token.as_deref();
    let api = session.api();

    let request = match &args.prompt {
        Some(prompt) => {
            let previous_html = match &args.previous_html {
                Some(path) => Some(read_previous_html(path).await?),
                None => None,
            };
            Some(GenerateRequest {
                prompt: prompt.clone(),
                style: args.style.clone(),
                site_type: args.site_type.clone(),
                previous_html,
                previous_prompt: args.previous_prompt.clone(),
            })
        }
        None => None,
    };

    let workspace = Workspace::new(config.decoder_config(), config.stream_timeout());

    let preview_handle = if args.preview {
        let (server, addr) = preview::bind(&config.preview, workspace.subscribe())
            .context("Failed to start preview server")?;
        let handle = server.handle();
        let task = tokio::spawn(server);
        eprintln!("Preview at http://{}/", addr);
        Some((handle, task))
    } else {
        None
    };

    // Image analysis happens before the generation starts.
    let description = match &args.image {
        Some(path) => {
            eprintln!("Analyzing {}...", path.display());
            let analysis = api
                .analyze_image(access_token, path)
                .await
                .context("Image analysis failed")?;
            Some(analysis.description)
        }
        None => None,
    };

    let mut view = TerminalView::new(std::io::stderr(), args.show_code);
    let mut generation = workspace.begin();
    let stream = match (&request, &description) {
        (_, Some(description)) => api.generate_from_description(access_token, description).await,
        (Some(request), None) => api.generate(access_token, request).await,
        (None, None) => bail!("Please enter a prompt or upload an image"),
    };

    let outcome = match stream {
        Ok(stream) => generation.drive(stream, &mut view).await,
        Err(e) => {
            let reason = e.to_string();
            let id = generation.id();
            for event in generation.fail(&reason).events() {
                view.on_event(id, event);
            }
            DriveOutcome::Failed { reason }
        }
    };

    let result = match outcome {
        DriveOutcome::Finished(sections) => match sections.code.text() {
            Some(code) => {
                tokio::fs::write(&args.out, code)
                    .await
                    .with_context(|| format!("Failed to write {}", args.out.display()))?;
                eprintln!("\nWrote {}", args.out.display());
                Ok(())
            }
            None => {
                warn!("Stream ended without a code section");
                eprintln!("\nNo code section in the response; nothing written");
                Ok(())
            }
        },
        DriveOutcome::Failed { reason } => Err(anyhow::anyhow!("Generation failed: {}", reason)),
        DriveOutcome::Superseded => Err(anyhow::anyhow!("Generation was superseded")),
    };

    if let Some((handle, task)) = preview_handle {
        eprintln!("Press Ctrl+C to stop the preview");
        tokio::select! {
            served = task => {
                served
                    .context("Preview server task panicked")?
                    .context("Preview server stopped")?;
            }
            _ = signal::ctrl_c() => {
                info!("Received Ctrl+C, stopping preview server");
                handle.stop(true).await;
            }
        }
    }

    result
}

async fn read_previous_html(path: &Path) -> Result<String> {
    tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))
}
