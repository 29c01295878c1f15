use anyhow::{Result, bail};

use epl_predictor::auth::{DEFAULT_ITERATIONS, hash_password, verify_password};

// Prints a secrets-file value for `--password <pw>` (optionally `--iterations <n>`).
fn main() -> Result<()> {
    let args = std::env::args().skip(1).collect::<Vec<_>>();
    let Some(password) = flag_value(&args, "--password") else {
        bail!("usage: hash_password --password <pw> [--iterations <n>]");
    };
    let iterations = match flag_value(&args, "--iterations") {
        Some(raw) => raw.parse::<u32>()?.max(1),
        None => DEFAULT_ITERATIONS,
    };

    let stored = hash_password(&password, iterations);
    if !verify_password(&stored, &password) {
        bail!("generated hash failed to verify");
    }
    println!("{stored}");
    Ok(())
}

fn flag_value(args: &[String], flag: &str) -> Option<String> {
    let prefix = format!("{flag}=");
    for (idx, arg) in args.iter().enumerate() {
        if let Some(value) = arg.strip_prefix(&prefix) {
            if !value.is_empty() {
                return Some(value.to_string());
            }
        }
        if arg == flag {
            let Some(next) = args.get(idx + 1) else {
                continue;
            };
            return Some(next.clone());
        }
    }
    None
}
