//! Translator for the `local-cmd` backend: substitutes query fields into a
//! user-provided command template string (spec §4.4 "local-cmd").

use crate::models::Query;
use crate::util::interpolate::interpolate;
use std::collections::HashMap;

/// Substitute `${size}`, `${since}`, `${until}`, `${filter}`, plus every
/// entry in `query.variables`, into `template` using the same `${VAR}` /
/// `${VAR:-default}` syntax as backend option interpolation.
pub fn render_template(template: &str, query: &Query, filter_rendered: &str) -> crate::errors::EngineResult<String> {
    let mut scope: HashMap<String, String> = query.variables.clone();
    scope.entry("filter".to_string()).or_insert_with(|| filter_rendered.to_string());
    if let Some(size) = query.size {
        scope.entry("size".to_string()).or_insert_with(|| size.to_string());
    }
    interpolate(template, &scope)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitutes_filter_and_size() {
        let mut query = Query::new();
        query.size = Some(100);
        let rendered = render_template("grep ${filter} file.log | head -${size}", &query, "error").unwrap();
        assert_eq!(rendered, "grep error file.log | head -100");
    }

    #[test]
    fn custom_variables_take_precedence_over_builtins() {
        let mut query = Query::new();
        query.variables.insert("size".to_string(), "5".to_string());
        query.size = Some(100);
        let rendered = render_template("head -${size}", &query, "").unwrap();
        assert_eq!(rendered, "head -5");
    }
}
