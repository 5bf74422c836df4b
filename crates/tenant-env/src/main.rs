//! `tenant-env` command-line entry point.

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use log::info;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tenant_env::config::{CacheSettings, ResolverSettings};
use tenant_env::server::{TenantConfigState, build_admin_router, build_router, serve};
use tenant_env::{EffectiveConfig, ErrorPolicy, TenantKey, init_logging};

/// Command-line options.
#[derive(Parser)]
#[command(name = "tenant-env", version, about = "Subdomain-keyed env overlays")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the tenant key derived from a host
    Key {
        host: String,
    },
    /// Print the effective configuration for a host
    Resolve {
        /// Base env file; overlays are looked up beside it
        #[arg(long, default_value = ".env")]
        base: PathBuf,
        /// Directory holding overlay files instead of the base file's directory
        #[arg(long)]
        overlay_dir: Option<PathBuf>,
        /// Serve the base configuration when the overlay is broken
        #[arg(long)]
        fallback: bool,
        /// Print JSON instead of KEY=VALUE lines
        #[arg(long)]
        json: bool,
        host: String,
    },
    /// Serve tenant-resolved routes and the admin cache API
    Serve {
        /// Optional path to a tenant-env.json5 settings file
        #[arg(long)]
        config: Option<PathBuf>,
        /// Listen address override
        #[arg(long)]
        bind: Option<SocketAddr>,
        /// Admin listen address override; keep it on an internal interface
        #[arg(long)]
        admin_bind: Option<SocketAddr>,
        /// Base env file override
        #[arg(long)]
        base: Option<PathBuf>,
    },
}

/// Entry point for the tenant-env CLI.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();
    let cli = Cli::parse();

    match cli.command {
        Command::Key { host } => {
            println!("{}", render_key(TenantKey::from_host(&host).as_ref()));
        }
        Command::Resolve {
            base,
            overlay_dir,
            fallback,
            json,
            host,
        } => {
            let settings = ResolverSettings {
                base,
                overlay_dir,
                cache: CacheSettings {
                    enabled: false,
                    ..CacheSettings::default()
                },
                on_error: if fallback {
                    ErrorPolicy::FallbackToBase
                } else {
                    ErrorPolicy::Reject
                },
                ..ResolverSettings::default()
            };
            let config = resolve(&settings, &host)?;
            if json {
                println!("{}", serde_json::to_string_pretty(config.values())?);
            } else {
                print!("{}", render_env(&config));
            }
        }
        Command::Serve {
            config,
            bind,
            admin_bind,
            base,
        } => {
            let mut settings = match config {
                Some(path) => ResolverSettings::load_from_path(&path)
                    .with_context(|| format!("loading settings from {}", path.display()))?,
                None => ResolverSettings::default(),
            };
            if let Some(bind) = bind {
                settings.server.bind = bind;
            }
            if let Some(admin_bind) = admin_bind {
                settings.server.admin_bind = admin_bind;
            }
            if let Some(base) = base {
                settings.base = base;
            }
            settings.validate()?;
            run_server(settings).await?;
        }
    }
    Ok(())
}

fn resolve(settings: &ResolverSettings, host: &str) -> anyhow::Result<EffectiveConfig> {
    if host.trim().is_empty() {
        bail!("host must not be empty");
    }
    let resolver = settings
        .build_resolver()
        .with_context(|| format!("loading base config {}", settings.base.display()))?;
    let config = resolver
        .resolve_with_policy(host, settings.on_error)
        .with_context(|| format!("resolving config for {host}"))?;
    Ok(config)
}

async fn run_server(settings: ResolverSettings) -> anyhow::Result<()> {
    let resolver = settings
        .build_resolver()
        .with_context(|| format!("loading base config {}", settings.base.display()))?;
    info!(
        "starting server (bind={}, admin_bind={}, base={}, cache={}, on_error={:?})",
        settings.server.bind,
        settings.server.admin_bind,
        settings.base.display(),
        settings.cache.enabled,
        settings.on_error
    );
    let state = TenantConfigState::new(Arc::new(resolver), settings.on_error);
    let admin_state = state.clone();
    tokio::try_join!(
        async {
            serve(build_router(state), settings.server.bind)
                .await
                .context("serving tenant http")
        },
        async {
            serve(build_admin_router(admin_state), settings.server.admin_bind)
                .await
                .context("serving admin http")
        },
    )?;
    Ok(())
}

fn render_key(tenant: Option<&TenantKey>) -> String {
    tenant.map_or_else(|| "-".to_string(), ToString::to_string)
}

/// `KEY=VALUE` lines sorted by key.
fn render_env(config: &EffectiveConfig) -> String {
    config
        .iter()
        .map(|(key, value)| format!("{key}={value}\n"))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tenant_env_test_utils::EnvFixture;

    fn settings(fixture: &EnvFixture, policy: ErrorPolicy) -> ResolverSettings {
        ResolverSettings {
            base: fixture.base_path(),
            on_error: policy,
            ..ResolverSettings::default()
        }
    }

    #[test]
    fn cli_parses_resolve_flags() {
        let cli = Cli::try_parse_from([
            "tenant-env",
            "resolve",
            "--base",
            "conf/.env",
            "--fallback",
            "alpha.example.com",
        ])
        .expect("parse");
        match cli.command {
            Command::Resolve {
                base,
                fallback,
                json,
                host,
                ..
            } => {
                assert_eq!(base, PathBuf::from("conf/.env"));
                assert!(fallback);
                assert!(!json);
                assert_eq!(host, "alpha.example.com");
            }
            _ => panic!("expected resolve"),
        }
    }

    #[test]
    fn cli_parses_serve_listeners() {
        let cli = Cli::try_parse_from([
            "tenant-env",
            "serve",
            "--bind",
            "0.0.0.0:8080",
            "--admin-bind",
            "127.0.0.1:9090",
        ])
        .expect("parse");
        match cli.command {
            Command::Serve {
                bind, admin_bind, ..
            } => {
                assert_eq!(bind.map(|addr| addr.port()), Some(8080));
                assert_eq!(admin_bind.map(|addr| addr.port()), Some(9090));
            }
            _ => panic!("expected serve"),
        }
    }

    #[test]
    fn renders_keys() {
        assert_eq!(
            render_key(TenantKey::from_host("Alpha.example.com:80").as_ref()),
            "alpha"
        );
        assert_eq!(render_key(TenantKey::from_host(".example.com").as_ref()), "-");
    }

    #[test]
    fn resolves_and_renders_sorted_env() {
        let fixture = EnvFixture::new("APP_NAME=Main\nREGION=eu\n");
        fixture.write_overlay("alpha", "FEATURE_X=on\nAPP_NAME=Alpha\n");

        let config =
            resolve(&settings(&fixture, ErrorPolicy::Reject), "alpha.example.com").expect("resolve");
        assert_eq!(
            render_env(&config),
            "APP_NAME=Alpha\nFEATURE_X=on\nREGION=eu\n"
        );
    }

    #[test]
    fn resolve_respects_error_policy() {
        let fixture = EnvFixture::new("APP_NAME=Main\n");
        fixture.write_overlay("alpha", "NOVALUE\n");

        let err = resolve(&settings(&fixture, ErrorPolicy::Reject), "alpha.example.com")
            .expect_err("reject");
        assert!(format!("{err:#}").contains("alpha"));

        let config = resolve(
            &settings(&fixture, ErrorPolicy::FallbackToBase),
            "alpha.example.com",
        )
        .expect("fallback");
        assert_eq!(render_env(&config), "APP_NAME=Main\n");
    }

    #[test]
    fn resolve_rejects_empty_host() {
        let fixture = EnvFixture::new("APP_NAME=Main\n");
        resolve(&settings(&fixture, ErrorPolicy::Reject), "  ").expect_err("empty host");
    }
}
