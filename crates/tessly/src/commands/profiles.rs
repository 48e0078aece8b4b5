//! `tessly profiles`: the display profile registry.

use tabled::Tabled;

use tessly_core::{Profile, ProfileKind};

use crate::cli::GlobalOpts;
use crate::output;

#[derive(Tabled)]
struct ProfileRow {
    #[tabled(rename = "Name")]
    name: &'static str,
    #[tabled(rename = "Kind")]
    kind: &'static str,
    #[tabled(rename = "Suffix")]
    suffix: &'static str,
    #[tabled(rename = "Min")]
    min: f64,
    #[tabled(rename = "Max")]
    max: f64,
    #[tabled(rename = "Step")]
    step: f64,
}

fn row(p: &Profile) -> ProfileRow {
    ProfileRow {
        name: p.name,
        kind: match p.kind {
            ProfileKind::Numeric => "numeric",
            ProfileKind::Lock => "lock",
            ProfileKind::Switch => "switch",
        },
        suffix: p.suffix.trim(),
        min: p.min,
        max: p.max,
        step: p.step,
    }
}

pub fn handle(global: &GlobalOpts) {
    let rendered = output::render_list(&global.output, &Profile::ALL, row, |p| p.name.to_owned());
    output::print_output(&rendered, global.quiet);
}
