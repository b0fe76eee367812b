//! End-to-end exercise of the engine facade against the one backend that
//! can be driven deterministically without external infrastructure: a
//! `local_cmd` adapter shelling out to `printf`. Covers config loading,
//! adapter memoization, `${VAR}` interpolation, and `query_many` fan-out
//! through the aggregator.

use std::collections::HashMap;

use logviewer_engine::config::{BackendConfig, BackendType, Config};
use logviewer_engine::{Engine, Query};

fn config_with(cmd: &str) -> Config {
    let mut backends = HashMap::new();
    backends.insert(
        "local".to_string(),
        BackendConfig {
            backend_type: BackendType::LocalCmd,
            options: HashMap::from([("cmd".to_string(), cmd.to_string())]),
        },
    );
    Config { backends }
}

#[tokio::test]
async fn queries_a_local_command_and_parses_its_output() {
    let config = config_with("printf 'first line\\nsecond line\\n'");
    let engine = Engine::new(config);

    let result = engine.query("local", Query::new()).await.expect("query should succeed");
    let messages: Vec<&str> = result.initial.iter().map(|e| e.message.as_str()).collect();
    assert_eq!(messages, vec!["first line", "second line"]);
}

#[tokio::test]
async fn unknown_backend_name_is_a_configuration_error() {
    let config = config_with("printf 'unused\\n'");
    let engine = Engine::new(config);

    let err = engine.query("does-not-exist", Query::new()).await.unwrap_err();
    assert!(err.to_string().contains("does-not-exist"));
}

#[tokio::test]
async fn query_many_merges_across_repeated_backend_invocations() {
    let mut backends = HashMap::new();
    backends.insert(
        "a".to_string(),
        BackendConfig {
            backend_type: BackendType::LocalCmd,
            options: HashMap::from([("cmd".to_string(), "printf 'from a\\n'".to_string())]),
        },
    );
    backends.insert(
        "b".to_string(),
        BackendConfig {
            backend_type: BackendType::LocalCmd,
            options: HashMap::from([("cmd".to_string(), "printf 'from b\\n'".to_string())]),
        },
    );
    let engine = Engine::new(Config { backends });

    let result = engine
        .query_many(&["a".to_string(), "b".to_string()], Query::new())
        .await
        .expect("both backends should succeed");

    let mut messages: Vec<&str> = result.initial.iter().map(|e| e.message.as_str()).collect();
    messages.sort_unstable();
    assert_eq!(messages, vec!["from a", "from b"]);
}

#[tokio::test]
async fn interpolates_variables_from_the_query_into_the_command_template() {
    let config = config_with("printf '%s\\n' \"${word}\"");
    let engine = Engine::new(config);

    let mut query = Query::new();
    query.variables.insert("word".to_string(), "hello-variable".to_string());

    let result = engine.query("local", query).await.expect("query should succeed");
    assert_eq!(result.initial.len(), 1);
    assert_eq!(result.initial[0].message, "hello-variable");
}
