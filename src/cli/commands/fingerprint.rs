//! fingerprint command - Print repository fingerprints

use anyhow::Result;
use serde_json::json;

use super::Services;
use crate::cache::{FingerprintReport, RepositoryFingerprinter, SkipReason};
use crate::cli::Context;

/// Print the filtered fingerprint, the all-repositories fingerprint, or the
/// available-packages cache key.
pub fn fingerprint(ctx: &Context, all: bool, key: bool, json: bool) -> Result<()> {
    let services = Services::load(ctx)?;
    let fingerprinter = RepositoryFingerprinter::new(services.registry, ctx.verbosity());

    if key {
        let key = fingerprinter.available_packages_key();
        if json {
            println!("{}", json!({ "key": key.as_str() }));
        } else {
            println!("{}", key);
        }
        return Ok(());
    }

    let report = if all {
        fingerprinter.all_report()
    } else {
        fingerprinter.filtered_report()
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report_json(&report))?);
    } else {
        println!("{}", report.fingerprint);
        if ctx.debug {
            for id in &report.included {
                eprintln!("  included: {}", id);
            }
            for skipped in &report.skipped {
                eprintln!("  skipped: {} ({})", skipped.id, reason(skipped.reason));
            }
        }
    }
    Ok(())
}

fn reason(reason: SkipReason) -> &'static str {
    match reason {
        SkipReason::Unavailable => "unavailable",
        SkipReason::Corrupted => "corrupted",
    }
}

fn report_json(report: &FingerprintReport) -> serde_json::Value {
    json!({
        "fingerprint": report.fingerprint.as_str(),
        "branch": report.branch,
        "included": report.included.iter().map(|id| id.as_str()).collect::<Vec<_>>(),
        "skipped": report
            .skipped
            .iter()
            .map(|s| json!({ "id": s.id.as_str(), "reason": reason(s.reason) }))
            .collect::<Vec<_>>(),
    })
}
