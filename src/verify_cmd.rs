//! `verify`: run the gateway's checks on a saved envelope, without a store.

use std::path::Path;

use crate::BenchResult;
use crate::core::AcceptedSubmission;
use crate::storage::load_envelope;
use crate::verify::{VerificationPolicy, parse_envelope, verify_submission};

/// Verify the envelope at `path`; a rejection is returned as `BenchError::Rejected`.
pub fn verify_file(path: &Path, policy: &VerificationPolicy) -> BenchResult<AcceptedSubmission> {
    let envelope = parse_envelope(load_envelope(path)?)?;
    Ok(verify_submission(envelope, policy)?)
}

pub fn run(path: &Path, tolerance: Option<f64>) -> BenchResult<()> {
    let mut policy = VerificationPolicy::default();
    if let Some(t) = tolerance {
        policy = policy.with_tolerance(t);
    }
    policy.validate()?;

    let accepted = verify_file(path, &policy)?;
    let declared = accepted.envelope.reference_index;
    println!("{}: accepted", path.display());
    println!("  uuid              {}", accepted.envelope.uuid);
    println!("  profile           {}", accepted.envelope.config_name);
    println!("  declared index    {declared:.2}");
    println!(
        "  recomputed index  {:.2} (scoring v{})",
        accepted.server_score, accepted.scoring_version
    );
    println!(
        "  deviation         {:.3}%",
        (declared - accepted.server_score).abs() / accepted.server_score * 100.0
    );
    Ok(())
}
