use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Local;
use color_eyre::Result;
use color_eyre::eyre::{Report, WrapErr, bail, eyre};
use paths::PathContext;
use settings::SettingsStore;
use tokio::sync::mpsc::UnboundedReceiver;
use trackfit::code::CodeImage;
use trackfit::record::DATE_FORMAT;
use trackfit::{
    Category, CounterStore, FileCounterStore, FormFields, FormSession, Notice, Notifier,
    SessionError, Severity, next_identifier,
};
use trackfit_config::{
    Export, SettingField, Sheets, apply_setting, build_trackfit_settings_store, session_config,
};

use crate::cli::{Cmd, ConfigAction, IssueArgs};
use crate::form::FormRunner;
use crate::sink::EndpointSink;

/// Everything a command needs, opened once per invocation.
pub struct Environment {
    pub paths: PathContext,
    pub settings: SettingsStore,
    pub counters: Arc<FileCounterStore>,
}

impl Environment {
    pub fn open(paths: PathContext) -> Result<Self> {
        let settings_file = paths.settings_file(None);
        let settings = build_trackfit_settings_store(&settings_file)
            .wrap_err_with(|| format!("failed to load {}", settings_file.display()))?;
        let counters = FileCounterStore::open(paths.counters_file())
            .wrap_err("failed to open the counter store")?;
        Ok(Self {
            paths,
            settings,
            counters: Arc::new(counters),
        })
    }

    /// A form session wired to the configured endpoint.
    pub fn session(&self, notifier: Notifier) -> Result<FormSession<EndpointSink>> {
        let sheets = self.settings.get::<Sheets>()?;
        let sink = EndpointSink::from_settings(&sheets)?;
        let config = session_config(&self.settings)?;
        Ok(FormSession::builder(self.counters.clone(), sink)
            .notifier(notifier)
            .config(config)
            .build())
    }

    pub fn export_target(&self) -> Result<PathBuf> {
        Ok(self
            .settings
            .get::<Export>()?
            .target(&self.paths.exports_dir()))
    }
}

pub async fn run(cmd: Cmd, env: &Environment) -> Result<()> {
    match cmd {
        Cmd::Categories => categories(env),
        Cmd::Preview { category } => preview(env, &category),
        Cmd::Issue(args) => issue(env, args).await,
        Cmd::Counters => counters(env),
        Cmd::Form => {
            let (notifier, notices) = Notifier::channel();
            let session = env.session(notifier)?;
            let runner = FormRunner::new(session, notices, env.export_target()?)
                .with_codes_dir(env.paths.codes_dir());
            let stdin = tokio::io::BufReader::new(tokio::io::stdin());
            runner.run(stdin, &mut std::io::stdout()).await
        }
        Cmd::Config { action } => config(env, action),
    }
}

fn categories(env: &Environment) -> Result<()> {
    for category in Category::all() {
        let lease = next_identifier(env.counters.as_ref(), category)?;
        println!(
            "{:<3} {:<14} next {}",
            category.prefix(),
            category.label(),
            lease.identifier
        );
    }
    Ok(())
}

fn preview(env: &Environment, input: &str) -> Result<()> {
    let Some(category) = Category::lookup(input) else {
        bail!("{input:?} is not a known category, see `trackfit categories`");
    };
    let lease = next_identifier(env.counters.as_ref(), category)?;
    println!("{}", lease.identifier);
    Ok(())
}

async fn issue(env: &Environment, args: IssueArgs) -> Result<()> {
    let (notifier, mut notices) = Notifier::channel();
    let mut session = env.session(notifier)?;

    if session.select_category(&args.category)?.is_none() {
        bail!(
            "{:?} is not a known category, see `trackfit categories`",
            args.category
        );
    }

    let fields = FormFields {
        vendor: args.vendor,
        batch: args.batch,
        supply_date: args
            .supply_date
            .unwrap_or_else(|| Local::now().date_naive().format(DATE_FORMAT).to_string()),
        warranty: args.warranty,
    };

    let receipt = match session.submit(&fields) {
        Ok(receipt) => receipt,
        Err(SessionError::Validation(err)) => {
            print_notices(&mut notices);
            bail!("record rejected: {err}");
        }
        Err(err) => return Err(err.into()),
    };

    println!("{}", receipt.record.summary());
    println!("Status: {}", receipt.record.status);
    if let Some(image) = &receipt.image {
        println!("{}", image.text);
        let target = args.svg.unwrap_or_else(|| {
            env.paths
                .codes_dir()
                .join(format!("{}.svg", receipt.record.identifier))
        });
        save_svg(image, &target)?;
    }

    session.flush().await;
    if let Some(path) = args.export {
        session.export(&path)?;
    }
    print_notices(&mut notices);
    Ok(())
}

fn counters(env: &Environment) -> Result<()> {
    let entries = env.counters.entries()?;
    if entries.is_empty() {
        println!("no counters stored yet");
    }
    for (key, value) in entries {
        println!("{key} = {value}");
    }
    Ok(())
}

fn config(env: &Environment, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => {
            println!("# {}", env.settings.file_path().display());
            for field in SettingField::ALL {
                println!("{field} = {:?}", field.current(&env.settings)?);
            }
        }
        ConfigAction::Set { key, value } => {
            let field: SettingField = key.parse().map_err(setting_error)?;
            apply_setting(&env.settings, field, &value).map_err(setting_error)?;
            println!("{field} = {:?}", field.current(&env.settings)?);
        }
    }
    Ok(())
}

/// Keeps the whole context chain of a settings error in the report.
fn setting_error(err: anyhow::Error) -> Report {
    eyre!("{err:#}")
}

pub fn save_svg(image: &CodeImage, target: &Path) -> Result<()> {
    if let Some(dir) = target.parent() {
        fs::create_dir_all(dir)?;
    }
    fs::write(target, &image.svg)
        .wrap_err_with(|| format!("failed to write {}", target.display()))?;
    tracing::info!(path = %target.display(), "code saved");
    Ok(())
}

pub fn notice_line(notice: &Notice) -> String {
    let tag = match notice.severity() {
        Severity::Info => "info",
        Severity::Warning => "warning",
        Severity::Error => "error",
    };
    format!("[{tag}] {notice}")
}

fn print_notices(notices: &mut UnboundedReceiver<Notice>) {
    while let Ok(notice) = notices.try_recv() {
        println!("{}", notice_line(&notice));
    }
}
