//! Point d'entrée de suribrows-nav.
//!
//! Usage :
//!   suribrows-nav [--config PATH] classify <URL> [--referrer URL] [--main-frame]
//!   suribrows-nav [--config PATH] route <URL>
//!
//! Exemples :
//!   cargo run -- classify https://ads.example.com/x --main-frame
//!   cargo run -- classify https://coinhive.com/lib.js --referrer https://news.test/
//!   cargo run -- route mailto:a@b.com

use std::env;
use std::error::Error;
use std::path::PathBuf;

use suribrows_nav::config::Config;
use suribrows_nav::error::ExternalAppError;
use suribrows_nav::filter::FilterVerdict;
use suribrows_nav::host::{AppLauncher, PreferenceStore, Resolution};
use suribrows_nav::intent::IntentSpec;
use suribrows_nav::scheme::SchemeRouter;
use url::Url;

const USAGE: &str = "usage: suribrows-nav [--config PATH] classify <URL> [--referrer URL] [--main-frame]\n       suribrows-nav [--config PATH] route <URL>";

enum Command {
    Classify {
        url: Url,
        referrer: Option<Url>,
        main_frame: bool,
    },
    Route {
        url: Url,
    },
}

fn main() -> Result<(), Box<dyn Error>> {
    // ── 1. Logging / Tracing ───────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // ── 2. Parse command-line flags ────────────────────────────────────
    let args: Vec<String> = env::args().skip(1).collect();
    let (config_path, command) = match parse_args(&args) {
        Ok(parsed) => parsed,
        Err(message) => {
            eprintln!("{message}\n{USAGE}");
            std::process::exit(2);
        }
    };

    // ── 3. Configuration ───────────────────────────────────────────────
    let config = match &config_path {
        Some(path) => Config::load_from(path)?,
        None => Config::load(),
    };

    // ── 4. Commande ────────────────────────────────────────────────────
    match command {
        Command::Classify {
            url,
            referrer,
            main_frame,
        } => {
            let (chain, errors) = config.filter_chain();
            for e in &errors {
                tracing::warn!(error = %e, "resource rule dropped");
            }
            let verdict = chain.classify(&url, referrer.as_ref(), main_frame)?;
            println!("{}", describe_verdict(&verdict));
        }
        Command::Route { url } => {
            let router = SchemeRouter::new(
                &config.general.internal_scheme,
                config.navigation.share_unknown_scheme,
            );
            let mut host = CliHost { config, config_path };
            let outcome = router.route(&url, &mut host);
            println!("{outcome:?}");
        }
    }
    Ok(())
}

fn parse_args(args: &[String]) -> Result<(Option<PathBuf>, Command), String> {
    let mut config_path = None;
    let mut referrer = None;
    let mut main_frame = false;
    let mut positional = Vec::new();

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--config" => {
                let path = iter.next().ok_or("--config needs a path")?;
                config_path = Some(PathBuf::from(path));
            }
            "--referrer" => {
                let value = iter.next().ok_or("--referrer needs a URL")?;
                referrer = Some(parse_url(value)?);
            }
            "--main-frame" => main_frame = true,
            other if other.starts_with("--") => return Err(format!("unknown flag {other}")),
            other => positional.push(other),
        }
    }

    let command = match positional.as_slice() {
        ["classify", url] => Command::Classify {
            url: parse_url(url)?,
            referrer,
            main_frame,
        },
        ["route", url] => Command::Route {
            url: parse_url(url)?,
        },
        _ => return Err("expected a command".to_string()),
    };
    Ok((config_path, command))
}

/// Parse une URL ; sans schéma, ajoute "https://".
fn parse_url(input: &str) -> Result<Url, String> {
    Url::parse(input)
        .or_else(|_| Url::parse(&format!("https://{input}")))
        .map_err(|e| format!("URL invalide '{input}': {e}"))
}

fn describe_verdict(verdict: &FilterVerdict) -> String {
    match verdict {
        FilterVerdict::Allow => "allow".to_string(),
        FilterVerdict::BlockMainFrame { pattern, .. } => match pattern {
            Some(p) => format!("block main frame ({p})"),
            None => "block main frame".to_string(),
        },
        FilterVerdict::BlockSubresource => "block subresource".to_string(),
        FilterVerdict::ServeSynthetic(response) => format!(
            "serve synthetic {} ({} bytes)",
            response.mime_type,
            response.body.len()
        ),
    }
}

/// No app is launched from the command line; the home page lives in the
/// config file.
struct CliHost {
    config: Config,
    config_path: Option<PathBuf>,
}

impl AppLauncher for CliHost {
    fn resolve_external_app(&self, _intent: &IntentSpec) -> Resolution {
        Resolution::NotFound
    }

    fn launch(&mut self, _intent: &IntentSpec) -> Result<(), ExternalAppError> {
        Err(ExternalAppError::NotFound)
    }
}

impl PreferenceStore for CliHost {
    fn home_page(&self) -> String {
        self.config.general.home_page.clone()
    }

    fn set_home_page(&mut self, url: &str) {
        self.config.general.home_page = url.to_string();
        let saved = match &self.config_path {
            Some(path) => self.config.save_to(path),
            None => self.config.save(),
        };
        if let Err(e) = saved {
            tracing::warn!(error = %e, "home page not persisted");
        }
    }
}
