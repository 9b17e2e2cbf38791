use crate::config::{
    AppConfig, CliOverrides, DEFAULT_API_VERSION, FileConfig, PartialServiceConfig,
    load_project_config,
};
use std::fs;
use tempfile::TempDir;

const CONN_ENDPOINT: &str = "https://westus.api.azureml.ms/agents/v1.0/subscriptions/s1/resourceGroups/rg1/providers/Microsoft.MachineLearningServices/workspaces/p1";

fn endpoint_layer(endpoint: &str) -> FileConfig {
    FileConfig {
        endpoint: Some(endpoint.into()),
        ..FileConfig::default()
    }
}

fn conn_layer(conn: &str) -> FileConfig {
    FileConfig {
        connection_string: Some(conn.into()),
        ..FileConfig::default()
    }
}

#[test]
fn test_load_project_config() {
    let temp_dir = TempDir::new().unwrap();
    let project_root = temp_dir.path();

    let arelay_dir = project_root.join(".arelay");
    fs::create_dir_all(&arelay_dir).unwrap();

    let config_content = r#"
model = "gpt-4o"
agent_name = "weather-bot"
connection_string = "eastus.api.azureml.ms;sub;rg;proj"

[service]
max_retries = 5
tool_timeout_ms = 1500
"#;

    fs::write(arelay_dir.join("config.toml"), config_content).unwrap();

    let project_cfg = load_project_config(project_root).unwrap();

    assert_eq!(project_cfg.model, Some("gpt-4o".to_string()));
    assert_eq!(project_cfg.agent_name, Some("weather-bot".to_string()));

    let service = project_cfg.service.unwrap();
    assert_eq!(service.max_retries, Some(5));
    assert_eq!(service.tool_timeout_ms, Some(1500));
    assert_eq!(service.retry_base_ms, None);
}

#[test]
fn test_load_project_config_not_exists() {
    let temp_dir = TempDir::new().unwrap();
    let project_cfg = load_project_config(temp_dir.path()).unwrap();
    assert_eq!(project_cfg, FileConfig::default());
}

#[test]
fn test_load_project_config_invalid_toml_is_an_error() {
    let temp_dir = TempDir::new().unwrap();
    let arelay_dir = temp_dir.path().join(".arelay");
    fs::create_dir_all(&arelay_dir).unwrap();
    fs::write(arelay_dir.join("config.toml"), "model = [unclosed").unwrap();

    let err = load_project_config(temp_dir.path()).unwrap_err();
    assert!(format!("{err:#}").contains("parse config file"));
}

#[test]
fn test_resolve_priority() {
    let cli = CliOverrides {
        endpoint: Some("http://localhost:9000/agents".into()),
        model: Some("gpt-4.1".into()),
        api_token: Some("cli-token".into()),
        ..CliOverrides::default()
    };
    let env = FileConfig {
        api_token: Some("env-token".into()),
        model: Some("env-model".into()),
        ..FileConfig::default()
    };
    let project = FileConfig {
        model: Some("project-model".into()),
        instructions: Some("Be brief".into()),
        service: Some(PartialServiceConfig {
            max_retries: Some(1),
            ..PartialServiceConfig::default()
        }),
        ..FileConfig::default()
    };
    let global = FileConfig {
        agent_name: Some("global-agent".into()),
        instructions: Some("ignored".into()),
        service: Some(PartialServiceConfig {
            max_retries: Some(9),
            retry_base_ms: Some(250),
            ..PartialServiceConfig::default()
        }),
        ..FileConfig::default()
    };

    let cfg = AppConfig::resolve(cli, env, project, global).unwrap();
    assert_eq!(cfg.endpoint, "http://localhost:9000/agents");
    assert_eq!(cfg.model, "gpt-4.1");
    assert_eq!(cfg.api_token.as_deref(), Some("cli-token"));
    assert_eq!(cfg.agent_name, "global-agent");
    assert_eq!(cfg.instructions, "Be brief");
    assert_eq!(cfg.service.max_retries, 1);
    assert_eq!(cfg.service.retry_base_ms, 250);
    assert_eq!(cfg.service.api_version, DEFAULT_API_VERSION);
}

#[test]
fn test_resolve_endpoint_from_connection_string() {
    let cli = CliOverrides {
        connection_string: Some("westus.api.azureml.ms;s1;rg1;p1".into()),
        ..CliOverrides::default()
    };
    let cfg = AppConfig::resolve(
        cli,
        FileConfig::default(),
        FileConfig::default(),
        FileConfig::default(),
    )
    .unwrap();
    assert_eq!(cfg.endpoint, CONN_ENDPOINT);
}

#[test]
fn test_endpoint_layers_resolve_top_down() {
    // project endpoint beats a global connection string
    let cfg = AppConfig::resolve(
        CliOverrides::default(),
        FileConfig::default(),
        endpoint_layer("https://project.example"),
        conn_layer("global.host;s;r;p"),
    )
    .unwrap();
    assert_eq!(cfg.endpoint, "https://project.example");

    // CLI connection string beats an env endpoint
    let cli = CliOverrides {
        connection_string: Some("westus.api.azureml.ms;s1;rg1;p1".into()),
        ..CliOverrides::default()
    };
    let cfg = AppConfig::resolve(
        cli,
        endpoint_layer("https://env.example"),
        FileConfig::default(),
        FileConfig::default(),
    )
    .unwrap();
    assert_eq!(cfg.endpoint, CONN_ENDPOINT);

    // within one layer the explicit endpoint wins
    let both = FileConfig {
        endpoint: Some("https://both.example".into()),
        connection_string: Some("westus.api.azureml.ms;s1;rg1;p1".into()),
        ..FileConfig::default()
    };
    let cfg = AppConfig::resolve(
        CliOverrides::default(),
        both,
        FileConfig::default(),
        FileConfig::default(),
    )
    .unwrap();
    assert_eq!(cfg.endpoint, "https://both.example");
}

#[test]
fn test_resolve_requires_an_endpoint() {
    let err = AppConfig::resolve(
        CliOverrides::default(),
        FileConfig::default(),
        FileConfig::default(),
        FileConfig::default(),
    )
    .unwrap_err();
    assert!(err.to_string().contains("no agent service endpoint"));
}

#[test]
fn test_resolve_rejects_bad_connection_string() {
    let cli = CliOverrides {
        connection_string: Some("only;three;parts".into()),
        ..CliOverrides::default()
    };
    let err = AppConfig::resolve(
        cli,
        FileConfig::default(),
        FileConfig::default(),
        FileConfig::default(),
    )
    .unwrap_err();
    assert!(format!("{err:#}").contains("connection string"));
}
