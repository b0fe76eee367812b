//! `${VAR}` / `${VAR:-default}` interpolation for backend option strings
//! (spec §6). Resolution order: the query's `variables` map, then process
//! environment, then the literal default; an unresolved reference with no
//! default is a configuration error.

use crate::errors::{EngineError, EngineResult};
use std::collections::HashMap;

/// Resolve every `${...}` reference in `input`. Braces must be balanced;
/// `$` not followed by `{` is left untouched.
pub fn interpolate(input: &str, variables: &HashMap<String, String>) -> EngineResult<String> {
    let mut out = String::with_capacity(input.len());
    let bytes = input.as_bytes();
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'$' && bytes.get(i + 1) == Some(&b'{') {
            let close = input[i + 2..].find('}').ok_or_else(|| {
                EngineError::configuration(format!(
                    "unterminated variable reference in {input:?}"
                ))
            })?;
            let body = &input[i + 2..i + 2 + close];
            out.push_str(&resolve(body, variables)?);
            i += 2 + close + 1;
        } else {
            let ch = input[i..].chars().next().unwrap();
            out.push(ch);
            i += ch.len_utf8();
        }
    }

    Ok(out)
}

fn resolve(body: &str, variables: &HashMap<String, String>) -> EngineResult<String> {
    let (name, default) = match body.split_once(":-") {
        Some((name, default)) => (name, Some(default)),
        None => (body, None),
    };

    if let Some(value) = variables.get(name) {
        return Ok(value.clone());
    }
    if let Ok(value) = std::env::var(name) {
        return Ok(value);
    }
    if let Some(default) = default {
        return Ok(default.to_string());
    }
    Err(EngineError::configuration(format!(
        "unresolved variable reference '${{{name}}}'"
    )))
}

/// Resolve every string value in a backend option map in place.
pub fn interpolate_map(
    options: &HashMap<String, String>,
    variables: &HashMap<String, String>,
) -> EngineResult<HashMap<String, String>> {
    options
        .iter()
        .map(|(k, v)| interpolate(v, variables).map(|v| (k.clone(), v)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_from_variables_map() {
        let mut vars = HashMap::new();
        vars.insert("INDEX".to_string(), "app-logs".to_string());
        assert_eq!(
            interpolate("logs-${INDEX}-*", &vars).unwrap(),
            "logs-app-logs-*"
        );
    }

    #[test]
    fn falls_back_to_default() {
        let vars = HashMap::new();
        assert_eq!(
            interpolate("${MISSING:-fallback}", &vars).unwrap(),
            "fallback"
        );
    }

    #[test]
    fn unresolved_without_default_is_configuration_error() {
        let vars = HashMap::new();
        assert!(interpolate("${NOPE}", &vars).is_err());
    }

    #[test]
    fn literal_dollar_without_brace_passes_through() {
        let vars = HashMap::new();
        assert_eq!(interpolate("cost: $5", &vars).unwrap(), "cost: $5");
    }

    #[test]
    fn unterminated_reference_is_an_error() {
        let vars = HashMap::new();
        assert!(interpolate("${UNCLOSED", &vars).is_err());
    }
}
