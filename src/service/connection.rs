use std::str::FromStr;

use crate::service::ServiceError;

/// Project connection string: `<HostName>;<SubscriptionId>;<ResourceGroup>;<ProjectName>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectConnection {
    pub host: String,
    pub subscription_id: String,
    pub resource_group: String,
    pub project_name: String,
}

impl ProjectConnection {
    pub fn endpoint(&self) -> String {
        format!(
            "https://{}/agents/v1.0/subscriptions/{}/resourceGroups/{}/providers/Microsoft.MachineLearningServices/workspaces/{}",
            self.host, self.subscription_id, self.resource_group, self.project_name
        )
    }
}

impl FromStr for ProjectConnection {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.trim().split(';').map(str::trim).collect();
        match parts.as_slice() {
            [host, sub, rg, project] if parts.iter().all(|p| !p.is_empty()) => {
                let host = host
                    .trim_start_matches("https://")
                    .trim_end_matches('/')
                    .to_string();
                Ok(Self {
                    host,
                    subscription_id: sub.to_string(),
                    resource_group: rg.to_string(),
                    project_name: project.to_string(),
                })
            }
            _ => Err(ServiceError::InvalidEndpoint(format!(
                "expected <HostName>;<SubscriptionId>;<ResourceGroup>;<ProjectName>, got {} part(s)",
                parts.len()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_connection_string() {
        let conn: ProjectConnection = "eastus.api.azureml.ms;1234-abcd;my-rg;my-project"
            .parse()
            .unwrap();
        assert_eq!(conn.host, "eastus.api.azureml.ms");
        assert_eq!(
            conn.endpoint(),
            "https://eastus.api.azureml.ms/agents/v1.0/subscriptions/1234-abcd/resourceGroups/my-rg/providers/Microsoft.MachineLearningServices/workspaces/my-project"
        );
    }

    #[test]
    fn strips_scheme_from_host() {
        let conn: ProjectConnection = "https://host.example/;s;r;p".parse().unwrap();
        assert_eq!(conn.host, "host.example");
    }

    #[test]
    fn rejects_malformed_strings() {
        assert!("host;sub;rg".parse::<ProjectConnection>().is_err());
        assert!("host;;rg;proj".parse::<ProjectConnection>().is_err());
        assert!("a;b;c;d;e".parse::<ProjectConnection>().is_err());
    }
}
