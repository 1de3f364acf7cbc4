//! Dry run: what a deployment would execute, without touching a transport.

use crate::deployment::Deployment;
use crate::hook::{Hook, Phase};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlannedOperation {
    pub phase: Phase,
    pub destination: String,
    pub command: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlannedHook {
    pub name: String,
    pub run_ensure: bool,
    pub ignore_failure: bool,
    pub operations: Vec<PlannedOperation>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelinePlan {
    pub deployment: String,
    pub vsn: String,
    pub env: String,
    pub build_at: String,
    pub publish_to: String,
    pub hooks: Vec<PlannedHook>,
}

impl PlannedHook {
    fn from_hook(hook: &Hook) -> Self {
        Self {
            name: hook.name.clone(),
            run_ensure: hook.run_ensure,
            ignore_failure: hook.ignore_failure,
            operations: hook
                .operations()
                .map(|(phase, op)| PlannedOperation {
                    phase,
                    destination: op.destination.to_string(),
                    command: op.render(),
                })
                .collect(),
        }
    }
}

pub fn plan(deployment: &Deployment) -> PipelinePlan {
    PipelinePlan {
        deployment: deployment.name.clone(),
        vsn: deployment.vsn.clone(),
        env: deployment.env.clone(),
        build_at: deployment.build_at.to_string(),
        publish_to: deployment.publish_to.to_string(),
        hooks: deployment.hooks().iter().map(PlannedHook::from_hook).collect(),
    }
}
