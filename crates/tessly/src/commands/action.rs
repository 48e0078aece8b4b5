//! `tessly action`: dispatch one vehicle action.

use strum::IntoEnumIterator;

use tessly_core::{Action, DispatchOutcome, Scalar, Vehicle};

use crate::cli::{ActionArgs, GlobalOpts};
use crate::error::CliError;
use crate::output;

/// Comma-separated action point identifiers, for help text.
pub fn available_actions() -> String {
    Action::iter()
        .map(Action::ident)
        .collect::<Vec<_>>()
        .join(", ")
}

fn detail(outcome: &DispatchOutcome) -> String {
    let (command, result) = match &outcome.command {
        Some(c) if c.success => (c.command.to_owned(), "confirmed".to_owned()),
        Some(c) => (
            c.command.to_owned(),
            c.error.clone().unwrap_or_else(|| "not confirmed".into()),
        ),
        None => ("-".into(), "no command sent".into()),
    };
    let mut pairs = vec![
        ("Action", outcome.action.ident().to_owned()),
        ("Value", outcome.value.to_string()),
        ("Command", command),
        ("Result", result),
    ];
    if let Some(reset) = &outcome.reset {
        pairs.push(("Reset to", reset.to_string()));
    }
    output::detail_table(&pairs)
}

pub async fn handle(
    vehicle: &Vehicle,
    args: &ActionArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let Ok(requested) = args.value.parse::<Scalar>();
    let outcome = vehicle.request_action(&args.ident, &requested).await?;

    let rendered = output::render_single(&global.output, &outcome, detail, |o| {
        format!("{}={}", o.action.ident(), o.value)
    });
    output::print_output(&rendered, global.quiet);

    match outcome.command {
        Some(c) if !c.success => Err(CliError::CommandFailed {
            command: c.command.into(),
            reason: c
                .error
                .unwrap_or_else(|| "The vehicle did not report result=true.".into()),
        }),
        _ => Ok(()),
    }
}
