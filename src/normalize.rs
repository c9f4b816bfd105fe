use std::collections::BTreeSet;

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;

use crate::filter::{normalize, parse_assignment, FilterSet, FilterValue, ImageFilters};
use crate::telemetry::{self};
use crate::telemetry::ops::browse::NormalizePhase;

/// `scrollfeed normalize ...`
#[derive(Args, Debug)]
pub struct NormalizeCmd {
    /// Ambient filter, repeatable (e.g. --ambient period=Week)
    #[arg(long = "ambient", value_parser = parse_assignment)]
    pub ambient: Vec<(String, FilterValue)>,
    /// Override, repeatable; wins over ambient. `key=` clears the key.
    #[arg(long = "set", value_parser = parse_assignment)]
    pub overrides: Vec<(String, FilterValue)>,
    #[arg(long, default_value_t = false)]
    pub with_tags: bool,
}

/// Build the ambient and override sets from CLI assignments.
pub(crate) fn assemble(
    ambient: &[(String, FilterValue)],
    overrides: &[(String, FilterValue)],
    with_tags: bool,
) -> (FilterSet, FilterSet) {
    let ambient: FilterSet = ambient.iter().cloned().collect();
    let mut overrides: FilterSet = overrides.iter().cloned().collect();
    if with_tags {
        overrides.insert("withTags", true);
    }
    (ambient, overrides)
}

/// The image feed filters `merged` carries, in wire form. Fails when a known
/// filter holds a value the feed does not accept.
pub(crate) fn typed_filters(merged: &FilterSet) -> Result<FilterSet> {
    let typed = ImageFilters::from_filter_set(merged).context("invalid image filter")?;
    Ok(typed.to_filter_set())
}

pub fn run(args: NormalizeCmd) -> Result<()> {
    let log = telemetry::normalize();
    let _g = log
        .root_span_kv([
            ("ambient", args.ambient.len().to_string()),
            ("set", args.overrides.len().to_string()),
            ("with_tags", args.with_tags.to_string()),
        ])
        .entered();

    let _s = log.span(&NormalizePhase::Merge).entered();
    let (ambient, overrides) = assemble(&args.ambient, &args.overrides, args.with_tags);
    let merged = normalize(&ambient, &overrides);
    let typed = typed_filters(&merged)?;
    let dropped: Vec<String> = ambient
        .iter()
        .chain(overrides.iter())
        .map(|(k, _)| k.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .filter(|k| merged.get(k).is_none())
        .collect();
    drop(_s);

    let _o = log.span(&NormalizePhase::Output).entered();
    let key = merged.canonical_key();
    if !dropped.is_empty() {
        log.debug_kv("empty filters dropped", [("keys", dropped.join(","))]);
    }
    if telemetry::config::json_mode() {
        #[derive(Serialize)]
        struct NormalizeResult<'a> { key: &'a str, filters: &'a FilterSet, typed: &'a FilterSet, dropped: &'a [String] }
        log.result(&NormalizeResult { key: &key, filters: &merged, typed: &typed, dropped: &dropped })?;
    } else {
        println!("{key}");
    }
    Ok(())
}
