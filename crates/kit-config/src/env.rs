// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::collections::BTreeSet;
use std::env;

use regex::Regex;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EnvSubstError {
    #[error("missing required environment variable(s): {0}")]
    MissingVars(String),
}

fn placeholder_re() -> Regex {
    // ${env://VAR} or ${env://VAR:-default}. The default may be empty
    // (`${env://VAR:-}`) and may contain anything but `}`.
    Regex::new(r"\$\{env://([A-Za-z_][A-Za-z0-9_]*)(?::-([^}]*))?\}").expect("static regex")
}

/// Substitute `${env://VAR}` / `${env://VAR:-default}` placeholders in raw
/// config text. Performed once, before YAML parsing, on the
/// whole document. A variable with no default that is unset in the process
/// environment is a hard error that enumerates every missing name — not
/// just the first one encountered — so a misconfigured environment can be
/// fixed in one pass.
pub fn substitute(text: &str) -> Result<String, EnvSubstError> {
    let re = placeholder_re();
    let mut missing = BTreeSet::new();

    for caps in re.captures_iter(text) {
        let var = &caps[1];
        if caps.get(2).is_none() && env::var(var).is_err() {
            missing.insert(var.to_string());
        }
    }
    if !missing.is_empty() {
        let names: Vec<String> = missing.into_iter().collect();
        return Err(EnvSubstError::MissingVars(names.join(", ")));
    }

    let replaced = re.replace_all(text, |caps: &regex::Captures| {
            let var = &caps[1];
            match env::var(var) {
                Ok(v) => v,
                Err(_) => caps.get(2).map(|m| m.as_str().to_string()).unwrap_or_default(),
            }
    });
    Ok(replaced.into_owned())
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    // `std::env::set_var` is process-global; serialise these tests.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn substitutes_set_variable() {
        let _g = ENV_LOCK.lock().unwrap();
        env::set_var("KIT_TEST_VAR_A", "hello");
        let out = substitute("key: ${env://KIT_TEST_VAR_A}").unwrap();
        assert_eq!(out, "key: hello");
        env::remove_var("KIT_TEST_VAR_A");
    }

    #[test]
    fn falls_back_to_default_when_unset() {
        let _g = ENV_LOCK.lock().unwrap();
        env::remove_var("KIT_TEST_VAR_B");
        let out = substitute("key: ${env://KIT_TEST_VAR_B:-fallback}").unwrap();
        assert_eq!(out, "key: fallback");
    }

    #[test]
    fn set_variable_overrides_default() {
        let _g = ENV_LOCK.lock().unwrap();
        env::set_var("KIT_TEST_VAR_C", "real");
        let out = substitute("key: ${env://KIT_TEST_VAR_C:-fallback}").unwrap();
        assert_eq!(out, "key: real");
        env::remove_var("KIT_TEST_VAR_C");
    }

    #[test]
    fn missing_without_default_is_a_hard_error_naming_every_variable() {
        let _g = ENV_LOCK.lock().unwrap();
        env::remove_var("KIT_TEST_VAR_D");
        env::remove_var("KIT_TEST_VAR_E");
        let err = substitute("a: ${env://KIT_TEST_VAR_D}\nb: ${env://KIT_TEST_VAR_E}").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("KIT_TEST_VAR_D"));
        assert!(msg.contains("KIT_TEST_VAR_E"));
    }

    #[test]
    fn idempotent_on_input_without_placeholders() {
        let _g = ENV_LOCK.lock().unwrap();
        let input = "plain: text\nno: placeholders here";
        assert_eq!(substitute(input).unwrap(), input);
    }

    #[test]
    fn empty_default_substitutes_to_empty_string() {
        let _g = ENV_LOCK.lock().unwrap();
        env::remove_var("KIT_TEST_VAR_F");
        let out = substitute("key: '${env://KIT_TEST_VAR_F:-}'").unwrap();
        assert_eq!(out, "key: ''");
    }
}
