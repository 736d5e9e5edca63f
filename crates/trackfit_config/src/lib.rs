//! TrackFit configuration on top of the `settings` crate.
//!
//! Each section is one struct implementing `Settings`; defaults live in the
//! `Default` impls and the settings file only holds deviations from them.
//!
//! Adding a section:
//!   1. Define the struct + `Default`.
//!   2. `impl Settings for Xxx { const SECTION: &str = "xxx"; }`
//!   3. Register it in `build_trackfit_settings_store()` and, if it should be
//!      editable from the CLI, add a `SettingField` variant.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, anyhow, bail};
use serde::{Deserialize, Serialize};
use settings::{Settings, SettingsError, SettingsStore};
use trackfit::code::{CodePayload, DEFAULT_CODE_SIZE};
use trackfit::export::DEFAULT_EXPORT_FILE;
use trackfit::session::DEFAULT_UNVERIFIED_VENDOR;
use trackfit::{SessionConfig, SubmitFormat};

/// File name of the settings file inside the project root.
pub const SETTINGS_FILE_NAME: &str = "trackfit.settings.toml";

/* ------------------------------------------------------------------------- */
/* Section Models                                                            */
/* ------------------------------------------------------------------------- */

/// Spreadsheet endpoint. An empty endpoint disables submission.
#[derive(Clone, Serialize, Deserialize, Debug, Default, PartialEq, Eq)]
pub struct Sheets {
    pub endpoint: String,
    pub format: SubmitFormat,
}

impl Sheets {
    pub fn endpoint(&self) -> Option<&str> {
        let endpoint = self.endpoint.trim();
        (!endpoint.is_empty()).then_some(endpoint)
    }
}

impl Settings for Sheets {
    const SECTION: &'static str = "sheets";

    fn validate(&self) -> Result<(), SettingsError> {
        match self.endpoint() {
            Some(url) if !(url.starts_with("http://") || url.starts_with("https://")) => {
                Err(SettingsError::InvalidValue {
                    section: Self::SECTION,
                    field: "endpoint",
                    reason: format!("{url:?} is not an http(s) URL"),
                })
            }
            _ => Ok(()),
        }
    }
}

#[derive(Clone, Copy, Serialize, Deserialize, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PayloadMode {
    #[default]
    Record,
    Lookup,
}

/// What the generated code encodes, and at which size.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct Code {
    pub payload: PayloadMode,
    /// Base URL for `payload = "lookup"`; `?id=<identifier>` is appended.
    pub lookup_base_url: String,
    pub size: u32, // pixels
}

impl Default for Code {
    fn default() -> Self {
        Self {
            payload: PayloadMode::Record,
            lookup_base_url: String::new(),
            size: DEFAULT_CODE_SIZE,
        }
    }
}

impl Code {
    pub const MIN_SIZE: u32 = 21;
    pub const MAX_SIZE: u32 = 2000;

    pub fn to_payload(&self) -> CodePayload {
        match self.payload {
            PayloadMode::Record => CodePayload::Record,
            PayloadMode::Lookup => CodePayload::Lookup {
                base_url: self.lookup_base_url.trim().to_string(),
            },
        }
    }
}

impl Settings for Code {
    const SECTION: &'static str = "code";

    fn validate(&self) -> Result<(), SettingsError> {
        if self.payload == PayloadMode::Lookup && self.lookup_base_url.trim().is_empty() {
            return Err(SettingsError::InvalidValue {
                section: Self::SECTION,
                field: "lookup_base_url",
                reason: "required when payload = \"lookup\"".into(),
            });
        }
        if !(Self::MIN_SIZE..=Self::MAX_SIZE).contains(&self.size) {
            return Err(SettingsError::InvalidValue {
                section: Self::SECTION,
                field: "size",
                reason: format!(
                    "{} is outside {}..={}",
                    self.size,
                    Self::MIN_SIZE,
                    Self::MAX_SIZE
                ),
            });
        }
        Ok(())
    }
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct Inspection {
    /// Vendor name that marks a record for extra inspection.
    pub unverified_vendor: String,
}

impl Default for Inspection {
    fn default() -> Self {
        Self {
            unverified_vendor: DEFAULT_UNVERIFIED_VENDOR.into(),
        }
    }
}

impl Settings for Inspection {
    const SECTION: &'static str = "inspection";

    fn validate(&self) -> Result<(), SettingsError> {
        if self.unverified_vendor.trim().is_empty() {
            return Err(SettingsError::InvalidValue {
                section: Self::SECTION,
                field: "unverified_vendor",
                reason: "must not be empty".into(),
            });
        }
        Ok(())
    }
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct Export {
    pub file_name: String,
}

impl Default for Export {
    fn default() -> Self {
        Self {
            file_name: DEFAULT_EXPORT_FILE.into(),
        }
    }
}

impl Export {
    /// Export target inside `dir`.
    pub fn target(&self, dir: &Path) -> PathBuf {
        dir.join(&self.file_name)
    }
}

impl Settings for Export {
    const SECTION: &'static str = "export";

    fn validate(&self) -> Result<(), SettingsError> {
        let name = self.file_name.trim();
        if name.is_empty() || name.contains(['/', '\\']) || !name.ends_with(".xlsx") {
            return Err(SettingsError::InvalidValue {
                section: Self::SECTION,
                field: "file_name",
                reason: format!("{name:?} must be a plain *.xlsx file name"),
            });
        }
        Ok(())
    }
}

/* ------------------------------------------------------------------------- */
/* Store                                                                     */
/* ------------------------------------------------------------------------- */

/// Opens the settings file at `path` and registers every section.
pub fn build_trackfit_settings_store(
    path: impl Into<PathBuf>,
) -> Result<SettingsStore, SettingsError> {
    let store = SettingsStore::builder().with_settings_file(path).build()?;
    store.register::<Sheets>()?;
    store.register::<Code>()?;
    store.register::<Inspection>()?;
    store.register::<Export>()?;
    Ok(store)
}

/// Session behaviour derived from the registered sections.
pub fn session_config(store: &SettingsStore) -> Result<SessionConfig, SettingsError> {
    let sheets = store.get::<Sheets>()?;
    let code = store.get::<Code>()?;
    let inspection = store.get::<Inspection>()?;
    Ok(SessionConfig {
        payload: code.to_payload(),
        code_size: code.size,
        unverified_vendor: inspection.unverified_vendor.clone(),
        format: sheets.format,
    })
}

/* ------------------------------------------------------------------------- */
/* Field Updates                                                             */
/* ------------------------------------------------------------------------- */

/// Every field that can be set from the command line, addressed as
/// `section.field`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SettingField {
    SheetsEndpoint,
    SheetsFormat,
    CodePayload,
    CodeLookupBaseUrl,
    CodeSize,
    InspectionUnverifiedVendor,
    ExportFileName,
}

impl SettingField {
    pub const ALL: [SettingField; 7] = [
        SettingField::SheetsEndpoint,
        SettingField::SheetsFormat,
        SettingField::CodePayload,
        SettingField::CodeLookupBaseUrl,
        SettingField::CodeSize,
        SettingField::InspectionUnverifiedVendor,
        SettingField::ExportFileName,
    ];

    pub fn key(self) -> &'static str {
        match self {
            SettingField::SheetsEndpoint => "sheets.endpoint",
            SettingField::SheetsFormat => "sheets.format",
            SettingField::CodePayload => "code.payload",
            SettingField::CodeLookupBaseUrl => "code.lookup_base_url",
            SettingField::CodeSize => "code.size",
            SettingField::InspectionUnverifiedVendor => "inspection.unverified_vendor",
            SettingField::ExportFileName => "export.file_name",
        }
    }

    /// Current value as text.
    pub fn current(self, store: &SettingsStore) -> Result<String, SettingsError> {
        Ok(match self {
            SettingField::SheetsEndpoint => store.get::<Sheets>()?.endpoint.clone(),
            SettingField::SheetsFormat => format_name(store.get::<Sheets>()?.format).into(),
            SettingField::CodePayload => match store.get::<Code>()?.payload {
                PayloadMode::Record => "record".into(),
                PayloadMode::Lookup => "lookup".into(),
            },
            SettingField::CodeLookupBaseUrl => store.get::<Code>()?.lookup_base_url.clone(),
            SettingField::CodeSize => store.get::<Code>()?.size.to_string(),
            SettingField::InspectionUnverifiedVendor => {
                store.get::<Inspection>()?.unverified_vendor.clone()
            }
            SettingField::ExportFileName => store.get::<Export>()?.file_name.clone(),
        })
    }
}

impl fmt::Display for SettingField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for SettingField {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim();
        SettingField::ALL
            .into_iter()
            .find(|field| field.key() == key)
            .ok_or_else(|| anyhow!("unknown setting {key:?}"))
    }
}

fn format_name(format: SubmitFormat) -> &'static str {
    match format {
        SubmitFormat::Json => "json",
        SubmitFormat::Form => "form",
    }
}

/// Parses `value` for `field` and persists it. Invalid values leave the
/// stored settings untouched.
pub fn apply_setting(store: &SettingsStore, field: SettingField, value: &str) -> anyhow::Result<()> {
    let value = value.trim();
    let result = match field {
        SettingField::SheetsEndpoint => {
            let endpoint = value.to_string();
            store.update::<Sheets, _>(|s| s.endpoint = endpoint)
        }
        SettingField::SheetsFormat => {
            let format = match value {
                "json" => SubmitFormat::Json,
                "form" => SubmitFormat::Form,
                other => bail!("format must be \"json\" or \"form\", got {other:?}"),
            };
            store.update::<Sheets, _>(|s| s.format = format)
        }
        SettingField::CodePayload => {
            let mode = match value {
                "record" => PayloadMode::Record,
                "lookup" => PayloadMode::Lookup,
                other => bail!("payload must be \"record\" or \"lookup\", got {other:?}"),
            };
            store.update::<Code, _>(|c| c.payload = mode)
        }
        SettingField::CodeLookupBaseUrl => {
            let url = value.to_string();
            store.update::<Code, _>(|c| c.lookup_base_url = url)
        }
        SettingField::CodeSize => {
            let size: u32 = value
                .parse()
                .with_context(|| format!("code.size must be a whole number, got {value:?}"))?;
            store.update::<Code, _>(|c| c.size = size)
        }
        SettingField::InspectionUnverifiedVendor => {
            let vendor = value.to_string();
            store.update::<Inspection, _>(|i| i.unverified_vendor = vendor)
        }
        SettingField::ExportFileName => {
            let name = value.to_string();
            store.update::<Export, _>(|e| e.file_name = name)
        }
    };
    result.with_context(|| format!("failed to set {field}"))?;
    tracing::info!(%field, value, "setting applied");
    Ok(())
}
