//! Line-driven version of the inventory form.
//!
//! Every line is one command: set a field, submit, reset or export. Notices
//! from background submissions are printed as they arrive.

use std::io::Write;
use std::path::PathBuf;

use color_eyre::Result;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc::UnboundedReceiver;
use trackfit::submit::RecordSink;
use trackfit::{FormFields, FormSession, Notice, SessionError};

use crate::commands::{notice_line, save_svg};

const HELP: &str = "\
commands:
  category <label|prefix>   select the fitting category (locked after submit)
  vendor <name>             set the vendor
  batch <number>            set the batch number
  date <YYYY-MM-DD>         set the supply date
  warranty <years>          set the warranty in whole years
  submit                    issue the next identifier for the form
  reset                     unlock the category and clear the identifier
  export [path]             write all records of this session to .xlsx
  show                      print the current form
  help                      this text
  quit                      wait for pending submissions and leave";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormCommand {
    Category(String),
    Vendor(String),
    Batch(String),
    Date(String),
    Warranty(String),
    Submit,
    Reset,
    Export(Option<PathBuf>),
    Show,
    Help,
    Quit,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ParseError {
    #[error("unknown command {0:?}, type `help`")]
    Unknown(String),
    #[error("`{0}` needs a value")]
    MissingValue(&'static str),
}

/// `Ok(None)` for blank lines.
pub fn parse_line(line: &str) -> Result<Option<FormCommand>, ParseError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let (word, rest) = line
        .split_once(char::is_whitespace)
        .map(|(word, rest)| (word, rest.trim()))
        .unwrap_or((line, ""));

    let value = |name: &'static str| {
        if rest.is_empty() {
            Err(ParseError::MissingValue(name))
        } else {
            Ok(rest.to_string())
        }
    };

    let command = match word.to_ascii_lowercase().as_str() {
        "category" | "type" => FormCommand::Category(value("category")?),
        "vendor" => FormCommand::Vendor(value("vendor")?),
        "batch" => FormCommand::Batch(value("batch")?),
        "date" => FormCommand::Date(value("date")?),
        "warranty" => FormCommand::Warranty(value("warranty")?),
        "submit" => FormCommand::Submit,
        "reset" => FormCommand::Reset,
        "export" => FormCommand::Export((!rest.is_empty()).then(|| PathBuf::from(rest))),
        "show" => FormCommand::Show,
        "help" | "?" => FormCommand::Help,
        "quit" | "exit" => FormCommand::Quit,
        _ => return Err(ParseError::Unknown(word.to_string())),
    };
    Ok(Some(command))
}

pub struct FormRunner<S: RecordSink> {
    session: FormSession<S>,
    notices: UnboundedReceiver<Notice>,
    fields: FormFields,
    export_target: PathBuf,
    codes_dir: Option<PathBuf>,
}

impl<S: RecordSink> FormRunner<S> {
    pub fn new(
        session: FormSession<S>,
        notices: UnboundedReceiver<Notice>,
        export_target: PathBuf,
    ) -> Self {
        Self {
            session,
            notices,
            fields: FormFields::default(),
            export_target,
            codes_dir: None,
        }
    }

    /// Save every generated code as `<dir>/<identifier>.svg`.
    pub fn with_codes_dir(mut self, dir: PathBuf) -> Self {
        self.codes_dir = Some(dir);
        self
    }

    pub async fn run<R, W>(mut self, input: R, out: &mut W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: Write,
    {
        writeln!(out, "TrackFit form, type `help` for commands.")?;
        let mut lines = input.lines();

        loop {
            tokio::select! {
                Some(notice) = self.notices.recv() => {
                    writeln!(out, "{}", notice_line(&notice))?;
                }
                line = lines.next_line() => {
                    let Some(line) = line? else { break };
                    match parse_line(&line) {
                        Ok(Some(FormCommand::Quit)) => break,
                        Ok(Some(command)) => self.handle(command, out)?,
                        Ok(None) => {}
                        Err(err) => writeln!(out, "{err}")?,
                    }
                }
            }
        }

        self.session.flush().await;
        while let Ok(notice) = self.notices.try_recv() {
            writeln!(out, "{}", notice_line(&notice))?;
        }
        Ok(())
    }

    fn handle<W: Write>(&mut self, command: FormCommand, out: &mut W) -> Result<()> {
        match command {
            FormCommand::Category(input) => match self.session.select_category(&input) {
                Ok(Some(identifier)) => writeln!(out, "QR ID: {identifier}")?,
                Ok(None) => writeln!(out, "QR ID: (none, {input:?} is not a category)")?,
                // Locked: the notice says it.
                Err(SessionError::CategoryLocked) => {}
                Err(err) => return Err(err.into()),
            },
            FormCommand::Vendor(value) => self.fields.vendor = value,
            FormCommand::Batch(value) => self.fields.batch = value,
            FormCommand::Date(value) => self.fields.supply_date = value,
            FormCommand::Warranty(value) => self.fields.warranty = value,
            FormCommand::Submit => match self.session.submit(&self.fields) {
                Ok(receipt) => {
                    writeln!(out, "{}", receipt.record.summary())?;
                    writeln!(out, "Status: {}", receipt.record.status)?;
                    if let Some(image) = &receipt.image {
                        writeln!(out, "{}", image.text)?;
                        if let Some(dir) = &self.codes_dir {
                            let target = dir.join(format!("{}.svg", receipt.record.identifier));
                            save_svg(image, &target)?;
                        }
                    }
                }
                Err(SessionError::Validation(_)) => {}
                Err(err) => return Err(err.into()),
            },
            // Field values stay filled in for the next record.
            FormCommand::Reset => self.session.reset(),
            FormCommand::Export(path) => {
                let path = path.unwrap_or_else(|| self.export_target.clone());
                match self.session.export(&path) {
                    Ok(_) | Err(SessionError::Export(trackfit::ExportError::Empty)) => {}
                    Err(err) => writeln!(out, "export failed: {err}")?,
                }
            }
            FormCommand::Show => self.show(out)?,
            FormCommand::Help => writeln!(out, "{HELP}")?,
            FormCommand::Quit => {}
        }
        Ok(())
    }

    fn show<W: Write>(&self, out: &mut W) -> Result<()> {
        let category = self
            .session
            .selected()
            .map(|c| c.label())
            .unwrap_or("-");
        let lock = if self.session.is_locked() { " (locked)" } else { "" };
        writeln!(out, "Category: {category}{lock}")?;
        writeln!(
            out,
            "QR ID:    {}",
            self.session.displayed_identifier().unwrap_or("-")
        )?;
        writeln!(out, "Vendor:   {}", self.fields.vendor)?;
        writeln!(out, "Batch:    {}", self.fields.batch)?;
        writeln!(out, "Date:     {}", self.fields.supply_date)?;
        writeln!(out, "Warranty: {}", self.fields.warranty)?;
        if let Some(status) = self.session.status() {
            writeln!(out, "Status:   {status}")?;
        }
        writeln!(out, "Records:  {}", self.session.log().len())?;
        Ok(())
    }
}
