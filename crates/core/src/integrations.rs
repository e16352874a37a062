//! Static catalog of known integrations.
//!
//! The catalog is the single lookup table behind both halves of the configuration
//! contract: [`crate::resolver::ConfigResolver`] reads `required` and `env` to decide
//! whether an integration is usable, and [`crate::protocol`] reads `help_options` and
//! `docs_url` to build the `config_required` envelope.

/// Base URL for per-integration docs; unknown integrations get `<base>/<id>` too.
pub const DOCS_BASE_URL: &str = "https://docs.incidentfox.ai/integrations";

/// A named minimum an integration needs before it can run.
///
/// Satisfied only when every config key in `keys` is present and truthy. The name is
/// what gets reported in `missing_fields`, so it may differ from the keys (AWS reports
/// `credentials` for the access key pair).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RequiredField {
    pub name: &'static str,
    pub keys: &'static [&'static str],
}

/// Fills `key` from the first set variable in `vars`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EnvBinding {
    pub key: &'static str,
    pub vars: &'static [&'static str],
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IntegrationSpec {
    pub id: &'static str,
    pub display_name: &'static str,
    pub required: &'static [RequiredField],
    pub env: &'static [EnvBinding],
    pub help_options: &'static [&'static str],
}

impl IntegrationSpec {
    pub fn docs_url(&self) -> String {
        docs_url(self.id)
    }

    pub fn env_vars(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.env.iter().flat_map(|binding| binding.vars.iter().copied())
    }
}

const fn field(name: &'static str, keys: &'static [&'static str]) -> RequiredField {
    RequiredField { name, keys }
}

const fn bind(key: &'static str, vars: &'static [&'static str]) -> EnvBinding {
    EnvBinding { key, vars }
}

pub static CATALOG: &[IntegrationSpec] = &[
    IntegrationSpec {
        id: "github",
        display_name: "GitHub",
        required: &[field("token", &["token"])],
        env: &[bind("token", &["GITHUB_TOKEN", "GH_TOKEN"]), bind("base_url", &["GITHUB_API_URL"])],
        help_options: &[
            "Create a personal access token at https://github.com/settings/tokens with `repo` and `read:org` scopes",
            "Add the token to your team's GitHub integration in team settings",
            "Or set the GITHUB_TOKEN environment variable for local runs",
        ],
    },
    IntegrationSpec {
        id: "gitlab",
        display_name: "GitLab",
        required: &[field("token", &["token"])],
        env: &[bind("token", &["GITLAB_TOKEN"]), bind("base_url", &["GITLAB_URL"])],
        help_options: &[
            "Create a personal access token with `read_api` scope in GitLab user settings",
            "Add the token (and your instance URL if self-hosted) in team settings",
            "Or set GITLAB_TOKEN and GITLAB_URL environment variables",
        ],
    },
    IntegrationSpec {
        id: "aws",
        display_name: "AWS",
        required: &[field("credentials", &["access_key_id", "secret_access_key"])],
        env: &[
            bind("access_key_id", &["AWS_ACCESS_KEY_ID"]),
            bind("secret_access_key", &["AWS_SECRET_ACCESS_KEY"]),
            bind("session_token", &["AWS_SESSION_TOKEN"]),
            bind("region", &["AWS_REGION", "AWS_DEFAULT_REGION"]),
        ],
        help_options: &[
            "Create an IAM user or role with read-only access to the services you want to query",
            "Add the access key ID, secret access key and default region in team settings",
            "Or set AWS_ACCESS_KEY_ID, AWS_SECRET_ACCESS_KEY and AWS_REGION environment variables",
        ],
    },
    IntegrationSpec {
        id: "slack",
        display_name: "Slack",
        required: &[field("bot_token", &["bot_token"])],
        env: &[bind("bot_token", &["SLACK_BOT_TOKEN"]), bind("app_token", &["SLACK_APP_TOKEN"])],
        help_options: &[
            "Install the IncidentFox Slack app to your workspace",
            "Copy the Bot User OAuth Token (starts with `xoxb-`) into team settings",
            "Or set the SLACK_BOT_TOKEN environment variable",
        ],
    },
    IntegrationSpec {
        id: "datadog",
        display_name: "Datadog",
        required: &[field("api_key", &["api_key"]), field("app_key", &["app_key"])],
        env: &[
            bind("api_key", &["DATADOG_API_KEY", "DD_API_KEY"]),
            bind("app_key", &["DATADOG_APP_KEY", "DD_APP_KEY"]),
            bind("site", &["DATADOG_SITE", "DD_SITE"]),
        ],
        help_options: &[
            "Create an API key and an application key in Datadog organization settings",
            "Add both keys (and your Datadog site, e.g. datadoghq.eu) in team settings",
            "Or set DATADOG_API_KEY and DATADOG_APP_KEY environment variables",
        ],
    },
    IntegrationSpec {
        id: "grafana",
        display_name: "Grafana",
        required: &[field("url", &["url"]), field("api_key", &["api_key"])],
        env: &[bind("url", &["GRAFANA_URL"]), bind("api_key", &["GRAFANA_API_KEY"])],
        help_options: &[
            "Create a service account token with Viewer role in Grafana",
            "Add the Grafana URL and token in team settings",
            "Or set GRAFANA_URL and GRAFANA_API_KEY environment variables",
        ],
    },
    IntegrationSpec {
        id: "pagerduty",
        display_name: "PagerDuty",
        required: &[field("api_key", &["api_key"])],
        env: &[bind("api_key", &["PAGERDUTY_API_KEY"])],
        help_options: &[
            "Create a read-only REST API key in PagerDuty under Integrations > API Access Keys",
            "Add the key in team settings",
            "Or set the PAGERDUTY_API_KEY environment variable",
        ],
    },
    IntegrationSpec {
        id: "opsgenie",
        display_name: "Opsgenie",
        required: &[field("api_key", &["api_key"])],
        env: &[bind("api_key", &["OPSGENIE_API_KEY"])],
        help_options: &[
            "Create an API integration key in Opsgenie settings",
            "Add the key in team settings",
            "Or set the OPSGENIE_API_KEY environment variable",
        ],
    },
    IntegrationSpec {
        id: "kafka",
        display_name: "Kafka",
        required: &[field("bootstrap_servers", &["bootstrap_servers"])],
        env: &[
            bind("bootstrap_servers", &["KAFKA_BOOTSTRAP_SERVERS"]),
            bind("sasl_username", &["KAFKA_SASL_USERNAME"]),
            bind("sasl_password", &["KAFKA_SASL_PASSWORD"]),
            bind("security_protocol", &["KAFKA_SECURITY_PROTOCOL"]),
        ],
        help_options: &[
            "Collect the bootstrap server list for your cluster (host:port, comma separated)",
            "Add the servers and SASL credentials if required in team settings",
            "Or set KAFKA_BOOTSTRAP_SERVERS (and KAFKA_SASL_USERNAME/KAFKA_SASL_PASSWORD)",
        ],
    },
    IntegrationSpec {
        id: "mysql",
        display_name: "MySQL",
        required: &[field("host", &["host"]), field("user", &["user"])],
        env: &[
            bind("host", &["MYSQL_HOST"]),
            bind("port", &["MYSQL_PORT"]),
            bind("user", &["MYSQL_USER"]),
            bind("password", &["MYSQL_PASSWORD"]),
            bind("database", &["MYSQL_DATABASE"]),
        ],
        help_options: &[
            "Create a read-only database user for IncidentFox",
            "Add host, port, user, password and database in team settings",
            "Or set MYSQL_HOST, MYSQL_USER and MYSQL_PASSWORD environment variables",
        ],
    },
    IntegrationSpec {
        id: "postgresql",
        display_name: "PostgreSQL",
        required: &[field("host", &["host"]), field("user", &["user"])],
        env: &[
            bind("host", &["POSTGRES_HOST", "PGHOST"]),
            bind("port", &["POSTGRES_PORT", "PGPORT"]),
            bind("user", &["POSTGRES_USER", "PGUSER"]),
            bind("password", &["POSTGRES_PASSWORD", "PGPASSWORD"]),
            bind("database", &["POSTGRES_DB", "PGDATABASE"]),
        ],
        help_options: &[
            "Create a read-only database role for IncidentFox",
            "Add host, port, user, password and database in team settings",
            "Or set POSTGRES_HOST, POSTGRES_USER and POSTGRES_PASSWORD environment variables",
        ],
    },
    IntegrationSpec {
        id: "elasticsearch",
        display_name: "Elasticsearch",
        required: &[field("url", &["url"])],
        env: &[
            bind("url", &["ELASTICSEARCH_URL"]),
            bind("api_key", &["ELASTICSEARCH_API_KEY"]),
            bind("username", &["ELASTICSEARCH_USERNAME"]),
            bind("password", &["ELASTICSEARCH_PASSWORD"]),
        ],
        help_options: &[
            "Create an API key or read-only user in Elasticsearch",
            "Add the cluster URL and credentials in team settings",
            "Or set ELASTICSEARCH_URL and ELASTICSEARCH_API_KEY environment variables",
        ],
    },
    IntegrationSpec {
        id: "coralogix",
        display_name: "Coralogix",
        required: &[field("api_key", &["api_key"]), field("domain", &["domain"])],
        env: &[bind("api_key", &["CORALOGIX_API_KEY"]), bind("domain", &["CORALOGIX_DOMAIN"])],
        help_options: &[
            "Create a Logs Query API key in Coralogix",
            "Add the key and your Coralogix domain (e.g. eu2.coralogix.com) in team settings",
            "Or set CORALOGIX_API_KEY and CORALOGIX_DOMAIN environment variables",
        ],
    },
    IntegrationSpec {
        id: "kubernetes",
        display_name: "Kubernetes",
        required: &[field("kubeconfig", &["kubeconfig"])],
        env: &[bind("kubeconfig", &["KUBECONFIG"]), bind("context", &["KUBE_CONTEXT"])],
        help_options: &[
            "Create a read-only service account and export its kubeconfig",
            "Upload the kubeconfig in team settings",
            "Or set the KUBECONFIG environment variable to a kubeconfig file path",
        ],
    },
    IntegrationSpec {
        id: "jira",
        display_name: "Jira",
        required: &[field("url", &["url"]), field("email", &["email"]), field("api_token", &["api_token"])],
        env: &[
            bind("url", &["JIRA_URL"]),
            bind("email", &["JIRA_EMAIL"]),
            bind("api_token", &["JIRA_API_TOKEN"]),
        ],
        help_options: &[
            "Create an API token at https://id.atlassian.com/manage-profile/security/api-tokens",
            "Add your Jira URL, account email and token in team settings",
            "Or set JIRA_URL, JIRA_EMAIL and JIRA_API_TOKEN environment variables",
        ],
    },
    IntegrationSpec {
        id: "confluence",
        display_name: "Confluence",
        required: &[field("url", &["url"]), field("email", &["email"]), field("api_token", &["api_token"])],
        env: &[
            bind("url", &["CONFLUENCE_URL"]),
            bind("email", &["CONFLUENCE_EMAIL"]),
            bind("api_token", &["CONFLUENCE_API_TOKEN"]),
        ],
        help_options: &[
            "Create an API token at https://id.atlassian.com/manage-profile/security/api-tokens",
            "Add your Confluence URL, account email and token in team settings",
            "Or set CONFLUENCE_URL, CONFLUENCE_EMAIL and CONFLUENCE_API_TOKEN environment variables",
        ],
    },
    IntegrationSpec {
        id: "sentry",
        display_name: "Sentry",
        required: &[field("auth_token", &["auth_token"]), field("organization", &["organization"])],
        env: &[
            bind("auth_token", &["SENTRY_AUTH_TOKEN"]),
            bind("organization", &["SENTRY_ORG"]),
            bind("base_url", &["SENTRY_URL"]),
        ],
        help_options: &[
            "Create an internal integration or auth token with `event:read` and `project:read` scopes",
            "Add the token and organization slug in team settings",
            "Or set SENTRY_AUTH_TOKEN and SENTRY_ORG environment variables",
        ],
    },
    IntegrationSpec {
        id: "snowflake",
        display_name: "Snowflake",
        required: &[field("account", &["account"]), field("user", &["user"]), field("password", &["password"])],
        env: &[
            bind("account", &["SNOWFLAKE_ACCOUNT"]),
            bind("user", &["SNOWFLAKE_USER"]),
            bind("password", &["SNOWFLAKE_PASSWORD"]),
            bind("warehouse", &["SNOWFLAKE_WAREHOUSE"]),
            bind("database", &["SNOWFLAKE_DATABASE"]),
        ],
        help_options: &[
            "Create a read-only Snowflake user and warehouse for IncidentFox",
            "Add account identifier, user, password and warehouse in team settings",
            "Or set SNOWFLAKE_ACCOUNT, SNOWFLAKE_USER and SNOWFLAKE_PASSWORD environment variables",
        ],
    },
    IntegrationSpec {
        id: "splunk",
        display_name: "Splunk",
        required: &[field("url", &["url"]), field("token", &["token"])],
        env: &[bind("url", &["SPLUNK_URL"]), bind("token", &["SPLUNK_TOKEN"])],
        help_options: &[
            "Create an authentication token in Splunk under Settings > Tokens",
            "Add the Splunk management URL and token in team settings",
            "Or set SPLUNK_URL and SPLUNK_TOKEN environment variables",
        ],
    },
    IntegrationSpec {
        id: "newrelic",
        display_name: "New Relic",
        required: &[field("api_key", &["api_key"]), field("account_id", &["account_id"])],
        env: &[bind("api_key", &["NEWRELIC_API_KEY"]), bind("account_id", &["NEWRELIC_ACCOUNT_ID"])],
        help_options: &[
            "Create a User API key in New Relic",
            "Add the key and your account ID in team settings",
            "Or set NEWRELIC_API_KEY and NEWRELIC_ACCOUNT_ID environment variables",
        ],
    },
];

pub fn lookup(integration_id: &str) -> Option<&'static IntegrationSpec> {
    CATALOG.iter().find(|spec| spec.id == integration_id)
}

/// Catalog display name, or the id with its first letter upper-cased.
pub fn display_name(integration_id: &str) -> String {
    if let Some(spec) = lookup(integration_id) {
        return spec.display_name.to_string();
    }

    let mut chars = integration_id.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

pub fn docs_url(integration_id: &str) -> String {
    format!("{DOCS_BASE_URL}/{integration_id}")
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::{display_name, docs_url, lookup, CATALOG};

    #[test]
    fn catalog_ids_are_unique() {
        let ids: HashSet<_> = CATALOG.iter().map(|spec| spec.id).collect();
        assert_eq!(ids.len(), CATALOG.len());
    }

    #[test]
    fn every_required_key_has_an_env_binding() {
        for spec in CATALOG {
            for required in spec.required {
                for key in required.keys {
                    assert!(
                        spec.env.iter().any(|binding| binding.key == *key),
                        "{} requires `{key}` but no env var fills it",
                        spec.id
                    );
                }
            }
            assert!(!spec.help_options.is_empty(), "{} has no help options", spec.id);
        }
    }

    #[test]
    fn aws_reports_credentials_as_one_required_field() {
        let aws = lookup("aws").expect("aws in catalog");
        assert_eq!(aws.required.len(), 1);
        assert_eq!(aws.required[0].name, "credentials");
        assert!(aws.env_vars().any(|var| var == "AWS_ACCESS_KEY_ID"));
    }

    #[test]
    fn unknown_integration_gets_title_cased_name() {
        assert_eq!(display_name("github"), "GitHub");
        assert_eq!(display_name("honeycomb"), "Honeycomb");
        assert_eq!(display_name(""), "");
    }

    #[test]
    fn docs_url_follows_integration_id() {
        assert_eq!(docs_url("slack"), "https://docs.incidentfox.ai/integrations/slack");
        assert_eq!(
            lookup("slack").map(|spec| spec.docs_url()),
            Some("https://docs.incidentfox.ai/integrations/slack".to_string())
        );
    }
}
