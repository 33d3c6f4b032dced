//! Pulumi Cloud stream catalog
//!
//! The catalog is static and closed: every stream the tap can extract is a
//! [`StreamId`] variant with one [`StreamDefinition`].

use super::types::{ReplicationKey, ServerFilter, StreamDefinition};
use crate::error::{Error, Result};
use crate::pagination::PaginationStrategy;
use crate::partition::{ContextField, PartitionSource};
use crate::types::BookmarkKind;
use std::str::FromStr;

/// Page size for `page`/`pageSize` endpoints
const PAGE_SIZE: u32 = 100;

/// Plan-gated organization features answer 403 for lower tiers
const PLAN_GATED: &[u16] = &[403];

/// Stack-scoped endpoints answer 404 for stacks without the resource
const STACK_OPTIONAL: &[u16] = &[403, 404];

// ============================================================================
// Child context mappings
// ============================================================================

const STACK_FIELDS: &[ContextField] = &[
    ContextField::same("org_name"),
    ContextField::same("project_name"),
    ContextField::same("stack_name"),
];
const SCHEDULE_FIELDS: &[ContextField] = &[ContextField::new("scheduled_action_id", "id")];
const TEAM_FIELDS: &[ContextField] = &[ContextField::new("team_name", "name")];
const ISSUER_FIELDS: &[ContextField] = &[ContextField::new("issuer_id", "id")];
const POLICY_GROUP_FIELDS: &[ContextField] = &[ContextField::new("policy_group_name", "name")];
const POLICY_PACK_FIELDS: &[ContextField] = &[ContextField::new("policy_pack_name", "name")];
const WEBHOOK_FIELDS: &[ContextField] = &[ContextField::new("webhook_name", "name")];

const fn child(stream: &'static str, fields: &'static [ContextField]) -> PartitionSource {
    PartitionSource::Parent { stream, fields }
}

const ORGS: PartitionSource = PartitionSource::Organizations;
const STACK_CHILD: PartitionSource = child("stacks", STACK_FIELDS);

// ============================================================================
// StreamId
// ============================================================================

macro_rules! stream_ids {
    ($($variant:ident => $name:literal),+ $(,)?) => {
        /// Identifier of a catalog stream
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum StreamId {
            $(
                #[doc = concat!("`", $name, "`")]
                $variant,
            )+
        }

        impl StreamId {
            /// Every stream, in catalog order
            pub const ALL: &'static [StreamId] = &[$(StreamId::$variant),+];

            /// Stream name
            pub const fn name(self) -> &'static str {
                match self {
                    $(StreamId::$variant => $name,)+
                }
            }
        }

        impl FromStr for StreamId {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self> {
                match s {
                    $($name => Ok(StreamId::$variant),)+
                    _ => Err(Error::StreamNotFound { stream: s.to_string() }),
                }
            }
        }
    };
}

stream_ids! {
    Stacks => "stacks",
    StackDetails => "stack_details",
    StackUpdates => "stack_updates",
    StackResources => "stack_resources",
    StackPolicyGroups => "stack_policy_groups",
    StackPolicyPacks => "stack_policy_packs",
    StackPreviews => "stack_previews",
    StackDeployments => "stack_deployments",
    StackSchedules => "stack_schedules",
    StackScheduledDeploymentHistory => "stack_scheduled_deployment_history",
    OrganizationMembers => "organization_members",
    OrganizationTeams => "organization_teams",
    OrganizationAccessTokens => "organization_access_tokens",
    OrganizationTeamMembers => "organization_team_members",
    OrganizationTeamStacks => "organization_team_stacks",
    OrganizationTeamEnvironments => "organization_team_environments",
    OrganizationTeamAccessTokens => "organization_team_access_tokens",
    OrganizationOidcIssuers => "organization_oidc_issuers",
    OrganizationOidcIssuerPolicies => "organization_oidc_issuer_policies",
    OrganizationAgentPools => "organization_agent_pools",
    PolicyGroupsList => "policy_groups_list",
    PolicyGroups => "policy_groups",
    PolicyPacks => "policy_packs",
    LatestPolicyPacks => "latest_policy_packs",
    DailyRumUsage => "daily_rum_usage",
    Environments => "environments",
    OrganizationWebhooks => "organization_webhooks",
    OrganizationWebhookDeliveries => "organization_webhook_deliveries",
    StackWebhooks => "stack_webhooks",
    StackWebhookDeliveries => "stack_webhook_deliveries",
    AuditLogs => "audit_logs",
}

impl std::fmt::Display for StreamId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl StreamId {
    /// Definition of this stream
    #[allow(clippy::too_many_lines)]
    pub fn definition(self) -> StreamDefinition {
        use StreamId as S;
        let name = self.name();

        match self {
            // ---------------------------------------------------------------
            // Stacks
            // ---------------------------------------------------------------
            S::Stacks => StreamDefinition::new(name, "/api/user/stacks", "$.stacks[*]", ORGS)
                .query(&[("organization", "{org_name}")])
                .paginated(PaginationStrategy::continuation_token())
                .keys(&["org_name", "project_name", "stack_name"]),
            S::StackDetails => StreamDefinition::new(
                name,
                "/api/stacks/{org_name}/{project_name}/{stack_name}",
                "$",
                STACK_CHILD,
            )
            .keys(&["org_name", "project_name", "stack_name"]),
            S::StackUpdates => StreamDefinition::new(
                name,
                "/api/stacks/{org_name}/{project_name}/{stack_name}/updates",
                "$.updates[*]",
                STACK_CHILD,
            )
            .paginated(PaginationStrategy::page_number(PAGE_SIZE))
            .keys(&["org_name", "project_name", "stack_name", "version"])
            // Newest first.
            .incremental(ReplicationKey {
                field: "version",
                kind: BookmarkKind::Numeric,
                sorted: false,
                server_filter: None,
            }),
            S::StackResources => StreamDefinition::new(
                name,
                "/api/stacks/{org_name}/{project_name}/{stack_name}/export",
                "$.deployment.resources[*]",
                STACK_CHILD,
            )
            .keys(&["org_name", "project_name", "stack_name", "urn"])
            .tolerate(STACK_OPTIONAL),
            S::StackPolicyGroups => StreamDefinition::new(
                name,
                "/api/stacks/{org_name}/{project_name}/{stack_name}/policygroups",
                "$.policyGroups[*]",
                STACK_CHILD,
            )
            .keys(&["org_name", "project_name", "stack_name", "name"]),
            S::StackPolicyPacks => StreamDefinition::new(
                name,
                "/api/stacks/{org_name}/{project_name}/{stack_name}/policypacks",
                "$.requiredPolicies[*]",
                STACK_CHILD,
            )
            .keys(&["org_name", "project_name", "stack_name", "name", "version"]),
            S::StackPreviews => StreamDefinition::new(
                name,
                "/api/stacks/{org_name}/{project_name}/{stack_name}/updates/latest/previews",
                "$.updates[*]",
                STACK_CHILD,
            )
            .paginated(PaginationStrategy::page_number(PAGE_SIZE))
            .keys(&["org_name", "project_name", "stack_name", "version"])
            .tolerate(STACK_OPTIONAL),
            S::StackDeployments => StreamDefinition::new(
                name,
                "/api/stacks/{org_name}/{project_name}/{stack_name}/deployments",
                "$.deployments[*]",
                STACK_CHILD,
            )
            .paginated(PaginationStrategy::page_number(PAGE_SIZE))
            .keys(&["id"])
            .tolerate(STACK_OPTIONAL),
            S::StackSchedules => StreamDefinition::new(
                name,
                "/api/stacks/{org_name}/{project_name}/{stack_name}/deployments/schedules",
                "$.schedules[*]",
                STACK_CHILD,
            )
            .keys(&["id"])
            .tolerate(STACK_OPTIONAL),
            S::StackScheduledDeploymentHistory => StreamDefinition::new(
                name,
                "/api/stacks/{org_name}/{project_name}/{stack_name}/deployments/schedules/{scheduled_action_id}/history",
                "$.scheduleHistoryEvents[*]",
                child("stack_schedules", SCHEDULE_FIELDS),
            )
            .keys(&["id"])
            .tolerate(STACK_OPTIONAL),

            // ---------------------------------------------------------------
            // Organization
            // ---------------------------------------------------------------
            S::OrganizationMembers => StreamDefinition::new(
                name,
                "/api/orgs/{org_name}/members",
                "$.members[*]",
                ORGS,
            )
            .query(&[("type", "backend")])
            .paginated(PaginationStrategy::continuation_token())
            .keys(&["org_name", "user_name"]),
            S::OrganizationTeams => StreamDefinition::new(
                name,
                "/api/orgs/{org_name}/teams",
                "$.teams[*]",
                ORGS,
            )
            .keys(&["org_name", "name"]),
            S::OrganizationAccessTokens => StreamDefinition::new(
                name,
                "/api/orgs/{org_name}/tokens",
                "$.tokens[*]",
                ORGS,
            )
            .keys(&["id"])
            .tolerate(PLAN_GATED),
            S::OrganizationTeamMembers => StreamDefinition::new(
                name,
                "/api/orgs/{org_name}/teams/{team_name}",
                "$.members[*]",
                child("organization_teams", TEAM_FIELDS),
            )
            .keys(&["org_name", "team_name", "github_login"]),
            S::OrganizationTeamStacks => StreamDefinition::new(
                name,
                "/api/orgs/{org_name}/teams/{team_name}",
                "$.stacks[*]",
                child("organization_teams", TEAM_FIELDS),
            )
            .keys(&["org_name", "team_name", "project_name", "stack_name"]),
            S::OrganizationTeamEnvironments => StreamDefinition::new(
                name,
                "/api/orgs/{org_name}/teams/{team_name}",
                "$.environments[*]",
                child("organization_teams", TEAM_FIELDS),
            )
            .keys(&["org_name", "team_name", "project_name", "env_name"]),
            S::OrganizationTeamAccessTokens => StreamDefinition::new(
                name,
                "/api/orgs/{org_name}/teams/{team_name}/tokens",
                "$.tokens[*]",
                child("organization_teams", TEAM_FIELDS),
            )
            .keys(&["id"])
            .tolerate(PLAN_GATED),
            S::OrganizationOidcIssuers => StreamDefinition::new(
                name,
                "/api/orgs/{org_name}/oidc/issuers",
                "$.oidcIssuers[*]",
                ORGS,
            )
            .keys(&["id"])
            .tolerate(PLAN_GATED),
            S::OrganizationOidcIssuerPolicies => StreamDefinition::new(
                name,
                "/api/orgs/{org_name}/auth/policies/oidcissuers/{issuer_id}",
                "$.policies[*]",
                child("organization_oidc_issuers", ISSUER_FIELDS),
            )
            .keys(&["id"])
            .tolerate(PLAN_GATED),
            S::OrganizationAgentPools => StreamDefinition::new(
                name,
                "/api/orgs/{org_name}/agent-pools",
                "$.agentPools[*]",
                ORGS,
            )
            .keys(&["id"])
            .tolerate(PLAN_GATED),

            // ---------------------------------------------------------------
            // Policies
            // ---------------------------------------------------------------
            S::PolicyGroupsList => StreamDefinition::new(
                name,
                "/api/orgs/{org_name}/policygroups",
                "$.policyGroups[*]",
                ORGS,
            )
            .keys(&["org_name", "name"]),
            S::PolicyGroups => StreamDefinition::new(
                name,
                "/api/orgs/{org_name}/policygroups/{policy_group_name}",
                "$",
                child("policy_groups_list", POLICY_GROUP_FIELDS),
            )
            .keys(&["org_name", "policy_group_name"]),
            S::PolicyPacks => StreamDefinition::new(
                name,
                "/api/orgs/{org_name}/policypacks",
                "$.policyPacks[*]",
                ORGS,
            )
            .keys(&["org_name", "name"]),
            S::LatestPolicyPacks => StreamDefinition::new(
                name,
                "/api/orgs/{org_name}/policypacks/{policy_pack_name}/latest",
                "$",
                child("policy_packs", POLICY_PACK_FIELDS),
            )
            .keys(&["org_name", "policy_pack_name"]),

            // ---------------------------------------------------------------
            // Usage and environments
            // ---------------------------------------------------------------
            S::DailyRumUsage => StreamDefinition::new(
                name,
                "/api/orgs/{org_name}/resources/summary",
                "$.summary[*]",
                ORGS,
            )
            .query(&[("granularity", "daily"), ("lookbackDays", "365")])
            .keys(&["org_name", "year", "month", "day"]),
            S::Environments => StreamDefinition::new(
                name,
                "/api/esc/environments/{org_name}",
                "$.environments[*]",
                ORGS,
            )
            .paginated(PaginationStrategy::continuation_token())
            .keys(&["org_name", "project", "name"]),

            // ---------------------------------------------------------------
            // Webhooks
            // ---------------------------------------------------------------
            S::OrganizationWebhooks => StreamDefinition::new(
                name,
                "/api/orgs/{org_name}/hooks",
                "$[*]",
                ORGS,
            )
            .keys(&["org_name", "name"]),
            S::OrganizationWebhookDeliveries => StreamDefinition::new(
                name,
                "/api/orgs/{org_name}/hooks/{webhook_name}/deliveries",
                "$[*]",
                child("organization_webhooks", WEBHOOK_FIELDS),
            )
            .keys(&["id"]),
            S::StackWebhooks => StreamDefinition::new(
                name,
                "/api/stacks/{org_name}/{project_name}/{stack_name}/hooks",
                "$[*]",
                STACK_CHILD,
            )
            .keys(&["org_name", "project_name", "stack_name", "name"]),
            S::StackWebhookDeliveries => StreamDefinition::new(
                name,
                "/api/stacks/{org_name}/{project_name}/{stack_name}/hooks/{webhook_name}/deliveries",
                "$[*]",
                child("stack_webhooks", WEBHOOK_FIELDS),
            )
            .keys(&["id"]),

            // ---------------------------------------------------------------
            // Audit logs
            // ---------------------------------------------------------------
            S::AuditLogs => StreamDefinition::new(
                name,
                "/api/orgs/{org_name}/auditlogs",
                "$.auditLogEvents[*]",
                ORGS,
            )
            .paginated(PaginationStrategy::continuation_token())
            .keys(&["org_name", "timestamp", "event", "description"])
            // Newest first.
            .incremental(ReplicationKey {
                field: "timestamp",
                kind: BookmarkKind::UnixTime,
                sorted: false,
                server_filter: Some(ServerFilter { param: "startTime" }),
            })
            .tolerate(PLAN_GATED),
        }
    }
}

// ============================================================================
// Catalog
// ============================================================================

/// Set of stream definitions known to the tap
#[derive(Debug, Clone)]
pub struct Catalog {
    streams: Vec<StreamDefinition>,
}

impl Catalog {
    /// The Pulumi Cloud catalog
    pub fn pulumi() -> Self {
        Self::new(StreamId::ALL.iter().map(|id| id.definition()).collect())
    }

    /// Catalog of arbitrary definitions
    pub fn new(streams: Vec<StreamDefinition>) -> Self {
        Self { streams }
    }

    /// Look up a stream by name
    pub fn get(&self, name: &str) -> Option<&StreamDefinition> {
        self.streams.iter().find(|s| s.name == name)
    }

    /// Look up a stream, failing for unknown names
    pub fn require(&self, name: &str) -> Result<&StreamDefinition> {
        self.get(name).ok_or_else(|| Error::StreamNotFound {
            stream: name.to_string(),
        })
    }

    /// Streams partitioned by records of `parent`
    pub fn children(&self, parent: &str) -> Vec<&StreamDefinition> {
        self.streams
            .iter()
            .filter(|s| s.parent() == Some(parent))
            .collect()
    }

    /// All stream names, in catalog order
    pub fn names(&self) -> Vec<&'static str> {
        self.streams.iter().map(|s| s.name).collect()
    }

    /// Iterate over the definitions
    pub fn iter(&self) -> impl Iterator<Item = &StreamDefinition> {
        self.streams.iter()
    }

    /// Number of streams
    pub fn len(&self) -> usize {
        self.streams.len()
    }

    /// Whether the catalog is empty
    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }
}
