use std::sync::OnceLock;

use color_eyre::Result;

static INIT: OnceLock<()> = OnceLock::new();

/// Installs the eyre report and panic hooks once.
pub fn init() -> Result<()> {
    if INIT.get().is_some() {
        return Ok(());
    }

    // try_into_hooks does not panic when a theme is already set
    let (panic_hook, eyre_hook) = color_eyre::config::HookBuilder::default()
        .capture_span_trace_by_default(false)
        .display_location_section(cfg!(debug_assertions))
        .display_env_section(false)
        .try_into_hooks()?;
    eyre_hook.install()?;

    std::panic::set_hook(Box::new(move |panic_info| {
        let report = panic_hook.panic_report(panic_info);
        tracing::error!("panic: {}", report);
        eprintln!("{report}");
    }));

    let _ = INIT.set(());
    Ok(())
}
