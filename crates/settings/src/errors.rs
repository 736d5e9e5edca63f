use thiserror::Error;

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("toml parse error: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("toml serialize error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("section not registered")]
    NotRegistered,

    #[error("invalid: {0}")]
    Invalid(&'static str),

    #[error("invalid value for {section}.{field}: {reason}")]
    InvalidValue {
        section: &'static str,
        field: &'static str,
        reason: String,
    },
}
