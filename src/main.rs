use clap::{CommandFactory, Parser};
use proxmox_cloud_rs::api::{self, AppState};
use proxmox_cloud_rs::auth::TokenIssuer;
use proxmox_cloud_rs::bot::{self, AdminList, BotService};
use proxmox_cloud_rs::cli::{Args, Commands, RunMode};
use proxmox_cloud_rs::logging::{self, LogOptions};
use proxmox_cloud_rs::proxmox::ProxmoxClient;
use proxmox_cloud_rs::settings::Settings;
use proxmox_cloud_rs::store::Store;
use std::process;
use std::sync::Arc;
use tracing::{error, info};

fn apply_overrides(settings: &mut Settings, args: &Args) {
    macro_rules! overlay {
        ($($field:ident),*) => {
            $(if let Some(v) = &args.$field {
                settings.$field = Some(v.clone());
            })*
        };
    }
    overlay!(
        host,
        port,
        node,
        token_id,
        token_secret,
        telegram_token,
        database_path,
        secret_key,
        http_host,
        http_port
    );
    if !args.admin_ids.is_empty() {
        settings.admin_ids = args.admin_ids.clone();
    }
    // A false flag keeps whatever the config file says.
    if args.no_verify_ssl {
        settings.no_verify_ssl = Some(true);
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    if let Some(Commands::Completions { shell }) = &args.command {
        let mut cmd = Args::command();
        let name = cmd.get_name().to_string();
        clap_complete::generate(*shell, &mut cmd, name, &mut std::io::stdout());
        return;
    }

    let _guard = match logging::init(&LogOptions::from(&args)) {
        Ok(g) => g,
        Err(e) => {
            eprintln!("Failed to initialize logging: {:#}", e);
            process::exit(1);
        }
    };

    let mut settings = match Settings::new(args.config.as_deref()) {
        Ok(s) => s,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            process::exit(1);
        }
    };
    apply_overrides(&mut settings, &args);

    if let Err(e) = settings.validate(args.mode) {
        error!("Configuration error: {}", e);
        process::exit(1);
    }

    if let Err(e) = run(settings, args.mode).await {
        error!("{:#}", e);
        process::exit(1);
    }
}

async fn run(settings: Settings, mode: RunMode) -> anyhow::Result<()> {
    // validate() guarantees these are present
    let host = settings.host.clone().unwrap_or_default();
    let node = settings.node.clone().unwrap_or_default();
    let verify_ssl = !settings.no_verify_ssl.unwrap_or(false);

    info!("Connecting to Proxmox at {}:{} (node {})", host, settings.port(), node);
    let mut client = ProxmoxClient::new(&host, settings.port(), &node, verify_ssl)?
        .with_defaults(settings.provision_defaults());
    client.set_api_token(
        settings.token_id.as_deref().unwrap_or_default(),
        settings.token_secret.as_deref().unwrap_or_default(),
    );
    let client = Arc::new(client);

    let store = Store::open(settings.database_path())?;
    let timings = settings.timings();

    let bot_task = async {
        if !mode.runs_bot() {
            return std::future::pending().await;
        }
        let admins = AdminList::new(settings.admin_ids.iter().copied());
        info!("Telegram bot enabled for {} admin(s)", admins.len());
        let service = Arc::new(BotService::new(client.clone(), store.clone(), admins, timings));
        bot::run(
            settings.telegram_token.as_deref().unwrap_or_default(),
            service,
        )
        .await
    };

    let api_task = async {
        if !mode.runs_api() {
            return std::future::pending().await;
        }
        let state = AppState {
            proxmox: client.clone(),
            store: store.clone(),
            tokens: TokenIssuer::new(
                settings.secret_key.as_deref().unwrap_or_default(),
                settings.token_ttl_hours(),
            ),
            ip_timeout: timings.ip_timeout,
        };
        api::serve(state, settings.http_host(), settings.http_port()).await
    };

    // Either front end stopping (Ctrl-C or failure) shuts the process down.
    tokio::select! {
        res = bot_task => res,
        res = api_task => res,
    }
}
